pub mod cert;
pub mod core;
pub mod middleware;

pub use crate::client::core::ApiClient;
