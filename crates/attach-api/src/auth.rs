//! Session and permission seams.
//!
//! User authentication and channel permissions are owned by the surrounding
//! chat server; the file service reaches them through [`SessionProvider`] and
//! [`PermissionChecker`]. The [`Session`] extractor resolves the bearer token
//! through whatever provider the state was built with.

use crate::error::HttpAppError;
use crate::state::AppState;
use async_trait::async_trait;
use attach_core::AppError;
use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use std::collections::HashMap;
use std::sync::Arc;

/// Authenticated session for one request.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub user_id: String,
}

/// Resolves bearer tokens to sessions.
pub trait SessionProvider: Send + Sync {
    fn session_for_token(&self, token: &str) -> Option<Session>;
}

/// Channel permission checks, resolved by the chat layer.
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    /// May the session upload files into the channel?
    async fn can_upload_to_channel(&self, session: &Session, channel_id: &str) -> bool;

    /// May the session read the channel containing the given post?
    async fn can_read_channel_of_post(&self, session: &Session, post_id: &str) -> bool;
}

impl FromRequestParts<Arc<AppState>> for Session {
    type Rejection = HttpAppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| {
            HttpAppError::from(AppError::Unauthorized("missing session token".to_string()))
        })?;

        state.sessions.session_for_token(&token).ok_or_else(|| {
            HttpAppError::from(AppError::Unauthorized("invalid or expired session".to_string()))
        })
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

/// Token-to-session map. Backs the dev server and tests; a real deployment
/// plugs the chat server's session service in instead.
#[derive(Default)]
pub struct StaticSessionProvider {
    sessions: HashMap<String, Session>,
}

impl StaticSessionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(mut self, token: &str, session: Session) -> Self {
        self.sessions.insert(token.to_string(), session);
        self
    }
}

impl SessionProvider for StaticSessionProvider {
    fn session_for_token(&self, token: &str) -> Option<Session> {
        self.sessions.get(token).cloned()
    }
}

/// Grants every permission. Dev-server default.
pub struct AllowAllPermissions;

#[async_trait]
impl PermissionChecker for AllowAllPermissions {
    async fn can_upload_to_channel(&self, _session: &Session, _channel_id: &str) -> bool {
        true
    }

    async fn can_read_channel_of_post(&self, _session: &Session, _post_id: &str) -> bool {
        true
    }
}
