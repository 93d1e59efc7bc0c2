mod nominatim;
mod openrouteservice;

pub use nominatim::Nominatim;
pub use openrouteservice::OpenRouteService;
