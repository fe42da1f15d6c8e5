// poolcop-api: Async Rust client for the PoolCopilot cloud API

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use auth::{TOKEN_LIFETIME, TOKEN_REQUEST_BUDGET, Token};
pub use client::{DEFAULT_BASE_URL, PoolCopilotClient, TOKEN_HEADER};
pub use error::Error;
pub use models::TokenResponse;
pub use transport::TransportConfig;
