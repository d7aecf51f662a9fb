//! HTTP API handlers for lyrics-resolver

pub mod health;
pub mod lyrics;

pub use health::health_routes;
pub use lyrics::lyrics_routes;
