// Crate root library declaration and module exports.
pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod logging;
pub mod models;
pub mod state;
