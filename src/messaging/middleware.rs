//! Handshake middleware pipeline.
//!
//! Middlewares run sequentially over the upgrade request before a raw
//! connection is promoted to a [`super::socket::Socket`]; the first error
//! aborts the handshake. The pipeline is executed by explicit iteration;
//! each step is awaited before the next starts.

use async_trait::async_trait;
use axum::http::HeaderMap;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use std::net::SocketAddr;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum MiddlewareError {
    #[error("handshake rejected: {0}")]
    Rejected(String),
}

/// The authenticated identity recovered during the handshake, immutable for
/// the connection's lifetime. An absent user means the connection is
/// unauthenticated; identity-scoped actions must then be rejected.
#[derive(Debug, Clone, Default)]
pub struct HandshakeSession {
    user: Option<SessionUser>,
}

#[derive(Debug, Clone)]
pub struct SessionUser {
    pub uid: String,
}

impl HandshakeSession {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_uid(uid: impl Into<String>) -> Self {
        Self {
            user: Some(SessionUser { uid: uid.into() }),
        }
    }

    pub fn uid(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.uid.as_str())
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

/// Everything a middleware can inspect or amend during the handshake.
pub struct HandshakeContext {
    pub addr: SocketAddr,
    pub headers: HeaderMap,
    pub session: HandshakeSession,
}

impl HandshakeContext {
    pub fn new(addr: SocketAddr, headers: HeaderMap) -> Self {
        Self {
            addr,
            headers,
            session: HandshakeSession::anonymous(),
        }
    }

    fn cookie(&self, name: &str) -> Option<String> {
        let raw = self.headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
        raw.split(';').find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
    }
}

#[async_trait]
pub trait HandshakeMiddleware: Send + Sync {
    async fn handle(&self, ctx: &mut HandshakeContext) -> Result<(), MiddlewareError>;
}

/// Runs the chain in registration order; the first error aborts.
pub async fn run_pipeline(
    middlewares: &[Arc<dyn HandshakeMiddleware>],
    ctx: &mut HandshakeContext,
) -> Result<(), MiddlewareError> {
    for middleware in middlewares {
        middleware.handle(ctx).await?;
    }
    Ok(())
}

/// Recovers the opaque user identity from the `session` cookie.
///
/// The cookie value is base64 JSON (`{"user":{"uid":...}}`) accompanied by a
/// `session.sig` HMAC cookie. An absent, malformed or badly signed cookie
/// leaves the connection unauthenticated rather than aborting the
/// handshake; only identity-scoped actions will later be rejected.
pub struct SessionParser {
    keys: Vec<String>,
}

impl SessionParser {
    pub fn new(keys: Vec<String>) -> Self {
        Self { keys }
    }

    /// Signature over `session=<value>`, verifiable against any configured
    /// key so keys can be rotated.
    fn signature_matches(&self, cookie_value: &str, signature: &str) -> bool {
        let Ok(provided) = URL_SAFE_NO_PAD.decode(signature) else {
            return false;
        };
        self.keys.iter().any(|key| {
            let mut mac =
                HmacSha256::new_from_slice(key.as_bytes()).expect("hmac accepts any key length");
            mac.update(format!("session={cookie_value}").as_bytes());
            let expected = mac.finalize().into_bytes();
            expected.as_slice().ct_eq(provided.as_slice()).into()
        })
    }

    /// Builds a signed cookie header value for `uid`. Used by tests and by
    /// tooling that needs to mint sessions against a known key.
    pub fn encode_session(&self, uid: &str) -> String {
        let payload = serde_json::json!({ "user": { "uid": uid } });
        let value = STANDARD.encode(payload.to_string());
        let mut mac = HmacSha256::new_from_slice(
            self.keys
                .first()
                .map(String::as_bytes)
                .unwrap_or_default(),
        )
        .expect("hmac accepts any key length");
        mac.update(format!("session={value}").as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("session={value}; session.sig={signature}")
    }
}

#[async_trait]
impl HandshakeMiddleware for SessionParser {
    async fn handle(&self, ctx: &mut HandshakeContext) -> Result<(), MiddlewareError> {
        let Some(value) = ctx.cookie("session") else {
            return Ok(());
        };

        if !self.keys.is_empty() {
            let Some(signature) = ctx.cookie("session.sig") else {
                tracing::warn!(addr = %ctx.addr, "session cookie without signature");
                return Ok(());
            };
            if !self.signature_matches(&value, &signature) {
                tracing::warn!(addr = %ctx.addr, "session cookie signature mismatch");
                return Ok(());
            }
        }

        let Some(decoded) = STANDARD
            .decode(&value)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<Value>(&bytes).ok())
        else {
            tracing::warn!(addr = %ctx.addr, "malformed session cookie");
            return Ok(());
        };

        if let Some(uid) = decoded
            .get("user")
            .and_then(|user| user.get("uid"))
            .and_then(Value::as_str)
        {
            ctx.session = HandshakeSession::for_uid(uid);
        }
        Ok(())
    }
}
