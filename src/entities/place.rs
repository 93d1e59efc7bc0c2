use serde::{Deserialize, Serialize};

use crate::entities::Coordinates;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaceSuggestion {
    pub name: String,
    pub coordinates: Coordinates,
}

pub type PlaceSuggestions = Vec<PlaceSuggestion>;
