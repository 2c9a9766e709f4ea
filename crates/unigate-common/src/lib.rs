pub mod config;
pub mod error;

pub use config::{AuthKind, Endpoint, EndpointUpsert, GatewayConfig};
pub use error::GatewayError;
