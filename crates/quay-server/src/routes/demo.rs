//! Demo endpoints exercising the session engine.
//!
//! - `GET /visits` counts requests per session
//! - `POST /flash` stores a one-shot message and redirects to `GET /flash`
//! - `POST /login` stores an account and renews the session identity
//! - `GET /whoami` reports the stored account
//! - `POST /logout` clears the session

use axum::{
    Json, Router,
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
};
use quay_session::SessionModel;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, ServerError};
use crate::session::SessionHandle;
use crate::state::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Session models
// ─────────────────────────────────────────────────────────────────────────────

/// Number of requests made with the session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Visits {
    pub count: u64,
}

impl SessionModel for Visits {
    const KEY: &'static str = "demo.visits";
    const SCHEMA: &'static str = "count:u64";

    fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// One-shot message shown after a redirect.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlashMessage {
    pub text: String,
}

impl SessionModel for FlashMessage {
    const KEY: &'static str = "demo.flash";
    const SCHEMA: &'static str = "text:string";

    fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Signed-in user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Account {
    pub user: String,
}

impl SessionModel for Account {
    const KEY: &'static str = "demo.account";
    const SCHEMA: &'static str = "user:string";

    fn is_empty(&self) -> bool {
        self.user.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request / response bodies
// ─────────────────────────────────────────────────────────────────────────────

/// Response for `GET /visits`.
#[derive(Debug, Serialize, Deserialize)]
pub struct VisitsResponse {
    pub visits: u64,
    pub new_session: bool,
}

/// Body for `POST /flash`.
#[derive(Debug, Serialize, Deserialize)]
pub struct FlashRequest {
    pub message: String,
}

/// Response for `GET /flash`.
#[derive(Debug, Serialize, Deserialize)]
pub struct FlashResponse {
    pub message: Option<String>,
}

/// Body for `POST /login`.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub user: String,
}

/// Response for `GET /whoami` and `POST /login`.
#[derive(Debug, Serialize, Deserialize)]
pub struct WhoAmIResponse {
    pub user: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Count this request.
pub async fn visits_handler(session: SessionHandle) -> Result<Json<VisitsResponse>> {
    let new_session = session.is_new().await?;
    let mut visits = session.get_or_default::<Visits>().await?;
    visits.count += 1;
    session.set(visits.clone()).await?;

    Ok(Json(VisitsResponse {
        visits: visits.count,
        new_session,
    }))
}

/// Store a flash message and redirect to where it is shown.
pub async fn flash_handler(
    session: SessionHandle,
    Json(request): Json<FlashRequest>,
) -> Result<Redirect> {
    if request.message.is_empty() {
        return Err(ServerError::BadRequest("message must not be empty".to_string()));
    }

    session
        .flash(FlashMessage {
            text: request.message,
        })
        .await?;

    Ok(Redirect::to("/flash"))
}

/// Show the pending flash message, if any.
pub async fn show_flash_handler(session: SessionHandle) -> Result<Json<FlashResponse>> {
    let message = if session.has::<FlashMessage>().await? {
        Some(session.get::<FlashMessage>().await?.text)
    } else {
        None
    };

    Ok(Json(FlashResponse { message }))
}

/// Sign in. The session identity is renewed so a pre-login token cannot
/// be used to reach the signed-in session.
pub async fn login_handler(
    session: SessionHandle,
    Json(request): Json<LoginRequest>,
) -> Result<Json<WhoAmIResponse>> {
    if request.user.trim().is_empty() {
        return Err(ServerError::BadRequest("user must not be empty".to_string()));
    }

    session
        .set(Account {
            user: request.user.clone(),
        })
        .await?;
    session.renew().await?;

    info!(user = %request.user, "User signed in");

    Ok(Json(WhoAmIResponse {
        user: Some(request.user),
    }))
}

/// Report the signed-in user.
pub async fn whoami_handler(session: SessionHandle) -> Result<Json<WhoAmIResponse>> {
    let user = if session.has::<Account>().await? {
        Some(session.get::<Account>().await?.user)
    } else {
        None
    };

    Ok(Json(WhoAmIResponse { user }))
}

/// Sign out, dropping everything in the session.
pub async fn logout_handler(session: SessionHandle) -> Result<StatusCode> {
    session.clear().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create demo routes. The session middleware must be layered on top.
pub fn demo_routes() -> Router<AppState> {
    Router::new()
        .route("/visits", get(visits_handler))
        .route("/flash", post(flash_handler).get(show_flash_handler))
        .route("/login", post(login_handler))
        .route("/whoami", get(whoami_handler))
        .route("/logout", post(logout_handler))
}
