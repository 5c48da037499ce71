//! Subsonic API surface of the gateway.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;

pub use auth::{GatewayAuth, RequestContext};
pub use error::ApiError;
pub use response::{Format, GatewayResponse};
pub use router::{AppState, GatewayRouterExt, create_router};
