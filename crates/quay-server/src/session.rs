//! Session middleware and the handler-side session handle.
//!
//! The middleware opens the session before the handler runs and commits it
//! with the handler's response status afterwards, attaching at most one
//! `Set-Cookie` header. A request that never completes is never committed.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{
        HeaderMap, HeaderValue, Request,
        header::{COOKIE, SET_COOKIE},
        request::Parts,
    },
    middleware::Next,
    response::Response,
};
use quay_session::{ResponseOutcome, Session, SessionModel, find_token};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{Result, ServerError};
use crate::state::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Middleware
// ─────────────────────────────────────────────────────────────────────────────

/// Session middleware function.
///
/// Injects a [`SessionHandle`] into request extensions for handlers to use.
pub async fn session_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response> {
    let token = session_token(request.headers(), &state.sessions.config().cookie_name);
    let session = state.sessions.begin(token.as_deref()).await?;

    let handle = SessionHandle::new(session);
    request.extensions_mut().insert(handle.clone());

    let mut response = next.run(request).await;

    let Some(session) = handle.take().await else {
        warn!("Session was taken before commit");
        return Ok(response);
    };

    let outcome = ResponseOutcome::from_status(response.status().as_u16());
    if let Some(cookie) = state.sessions.commit(session, outcome).await? {
        let value = HeaderValue::from_str(&cookie.header_value())
            .map_err(|e| ServerError::Internal(format!("Invalid Set-Cookie header: {}", e)))?;
        response.headers_mut().append(SET_COOKIE, value);
        debug!(removal = cookie.is_removal(), "Attached session cookie");
    }

    Ok(response)
}

/// Find the session token among the request's `Cookie` headers.
fn session_token(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|header| find_token(header, name))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handle
// ─────────────────────────────────────────────────────────────────────────────

/// The current request's session, as seen by handlers.
///
/// ```ignore
/// use quay_server::SessionHandle;
///
/// async fn visits(session: SessionHandle) -> Result<String> {
///     let mut visits = session.get_or_default::<Visits>().await?;
///     visits.count += 1;
///     session.set(visits.clone()).await?;
///     Ok(visits.count.to_string())
/// }
/// ```
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Mutex<Option<Session>>>,
}

impl SessionHandle {
    fn new(session: Session) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(session))),
        }
    }

    async fn take(&self) -> Option<Session> {
        self.inner.lock().await.take()
    }

    /// Read a model. Absent models are a `404`.
    pub async fn get<T: SessionModel>(&self) -> Result<T> {
        let mut guard = self.inner.lock().await;
        Ok(open(&mut guard)?.get::<T>().await?)
    }

    /// Read a model, or its default if absent.
    pub async fn get_or_default<T: SessionModel>(&self) -> Result<T> {
        let mut guard = self.inner.lock().await;
        Ok(open(&mut guard)?.get_or_default::<T>().await?)
    }

    /// Check whether a model is present.
    pub async fn has<T: SessionModel>(&self) -> Result<bool> {
        let mut guard = self.inner.lock().await;
        Ok(open(&mut guard)?.has::<T>().await?)
    }

    /// Store a model.
    pub async fn set<T: SessionModel>(&self, value: T) -> Result<()> {
        let mut guard = self.inner.lock().await;
        open(&mut guard)?.set(value);
        Ok(())
    }

    /// Store a model until the next successful response.
    pub async fn flash<T: SessionModel>(&self, value: T) -> Result<()> {
        let mut guard = self.inner.lock().await;
        open(&mut guard)?.flash(value);
        Ok(())
    }

    /// Remove a model.
    pub async fn unset<T: SessionModel>(&self) -> Result<()> {
        let mut guard = self.inner.lock().await;
        open(&mut guard)?.unset::<T>();
        Ok(())
    }

    /// Drop all session data and issue a fresh identity.
    pub async fn clear(&self) -> Result<()> {
        let mut guard = self.inner.lock().await;
        open(&mut guard)?.clear();
        Ok(())
    }

    /// Issue a fresh identity, keeping the data.
    pub async fn renew(&self) -> Result<()> {
        let mut guard = self.inner.lock().await;
        open(&mut guard)?.renew();
        Ok(())
    }

    /// Whether the request arrived without a live session.
    pub async fn is_new(&self) -> Result<bool> {
        let mut guard = self.inner.lock().await;
        Ok(open(&mut guard)?.is_new())
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle").finish_non_exhaustive()
    }
}

fn open(slot: &mut Option<Session>) -> Result<&mut Session> {
    slot.as_mut()
        .ok_or_else(|| ServerError::Internal("Session already committed".to_string()))
}

impl<S> FromRequestParts<S> for SessionHandle
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<SessionHandle>()
            .cloned()
            .ok_or_else(|| ServerError::Internal("Session middleware not installed".to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
