pub mod api;
pub mod config;
pub mod engine;
pub mod entities;
pub mod error;
pub mod external;
pub mod presentation;
pub mod server;

#[cfg(test)]
mod testing;
