//! napbridge service — wires the stream listener to the Postgres store and
//! serves the health endpoint.

pub mod app;
pub mod health;
pub mod settings;

pub use settings::Settings;
