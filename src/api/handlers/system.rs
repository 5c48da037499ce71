//! System handlers (ping).

use crate::api::auth::GatewayAuth;
use crate::api::response::GatewayResponse;
use crate::value::Object;

/// GET/POST /rest/ping[.view]
///
/// Auth check only; the negotiator supplies status and version.
pub async fn ping(auth: GatewayAuth) -> GatewayResponse {
    GatewayResponse::content(auth.format, Object::new())
}
