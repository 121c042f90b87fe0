//! Request extractors.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use tracing::warn;

use super::error::ApiError;

/// The peer address of the connection, used as the quota identity.
///
/// Forwarding headers are deliberately ignored: without a trusted proxy in
/// front, `X-Forwarded-For` lets any client mint fresh quota identities.
/// When no peer address is available the request is rejected, since quota
/// cannot be attributed to anyone.
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

impl ClientIp {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            Some(ConnectInfo(addr)) => Ok(ClientIp(addr.ip().to_string())),
            None => {
                warn!("Request without a peer address");
                Err(ApiError::unknown_client())
            }
        }
    }
}
