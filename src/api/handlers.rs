//! HTTP request handlers

use super::types::{ChatRequest, ChatResponse, ErrorResponse, HealthResponse};
use super::AppState;
use crate::error::DialogError;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

const SESSION_COOKIE: &str = "session_id";
const SESSION_HEADER: &str = "x-session-id";

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(welcome))
        .route("/api/chat", post(chat))
        .route("/api/health", get(health))
        .with_state(state)
}

async fn welcome() -> &'static str {
    "Welcome to the Chatbot server!"
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        active_conversations: state.manager.active_sessions().await,
    })
}

// ============================================================
// Chat
// ============================================================

async fn chat(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<(CookieJar, HeaderMap, Json<ChatResponse>), AppError> {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Unreadable chat body");
            ChatRequest::default()
        }
    };

    let Some(message) = request.message.as_deref() else {
        return Err(AppError::BadRequest("Message is required".to_string()));
    };
    let session_id = resolve_session_id(&jar, &headers, request.session_id.as_deref());

    let outcome = state.manager.handle_turn(&session_id, message).await?;
    tracing::debug!(
        session_id = %outcome.session_id,
        phase = ?outcome.phase,
        closed = outcome.session_closed,
        "Chat turn complete"
    );

    let mut response_headers = HeaderMap::new();
    let jar = if outcome.session_closed {
        // Always send the removal, even if this request carried no cookie
        let mut removal = Cookie::build((SESSION_COOKIE, "")).path("/").build();
        removal.make_removal();
        jar.add(removal)
    } else {
        match HeaderValue::from_str(&session_id) {
            Ok(value) => {
                response_headers.insert(SESSION_HEADER, value);
            }
            Err(_) => {
                tracing::warn!(session_id = %session_id, "Session id is not a valid header value");
            }
        }
        let max_age =
            time::Duration::try_from(state.cookie_max_age).unwrap_or(time::Duration::HOUR);
        jar.add(
            Cookie::build((SESSION_COOKIE, session_id))
                .http_only(true)
                .same_site(SameSite::Strict)
                .max_age(max_age)
                .path("/"),
        )
    };

    Ok((jar, response_headers, Json(ChatResponse::from(outcome))))
}

/// First non-empty of cookie, header, body; otherwise a fresh id
fn resolve_session_id(jar: &CookieJar, headers: &HeaderMap, body: Option<&str>) -> String {
    let cookie = jar.get(SESSION_COOKIE).map(Cookie::value);
    let header = headers.get(SESSION_HEADER).and_then(|v| v.to_str().ok());

    [cookie, header, body]
        .into_iter()
        .flatten()
        .find(|id| !id.is_empty())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), ToString::to_string)
}

// ============================================================
// Error Handling
// ============================================================

enum AppError {
    BadRequest(String),
    Internal(String),
}

impl From<DialogError> for AppError {
    fn from(e: DialogError) -> Self {
        match e {
            DialogError::Input(msg) => AppError::BadRequest(msg),
            DialogError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse::new(msg)),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("Something went wrong").with_details(msg),
            ),
        };

        (status, Json(body)).into_response()
    }
}
