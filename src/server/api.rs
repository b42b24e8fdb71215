use crate::assistant::ReplySource;
use crate::cli::Args;
use crate::locale::{ Locale, ParseLocaleError };
use crate::models::chat::Message;
use crate::pricing::{ self, PricingError, Quote, MATERIALS };
use crate::session::{ Session, SessionError, SessionStore };
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    routing::get,
    Router,
    Json,
    extract::{ State, Query, Path },
    response::{ IntoResponse, Response },
    http::StatusCode,
};
use serde::{ Deserialize, Serialize };
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub default_locale: Locale,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Unprocessable(String),
    Unavailable(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Unprocessable(m) => (StatusCode::UNPROCESSABLE_ENTITY, m),
            ApiError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound(_) => ApiError::NotFound(e.to_string()),
            SessionError::LimitReached(_) => ApiError::Unavailable(e.to_string()),
        }
    }
}

impl From<PricingError> for ApiError {
    fn from(e: PricingError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<ParseLocaleError> for ApiError {
    fn from(e: ParseLocaleError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

fn parse_locale(raw: Option<&str>, default: Locale) -> Result<Locale, ApiError> {
    match raw {
        Some(s) => Ok(s.parse()?),
        None => Ok(default),
    }
}

#[derive(Deserialize, Default)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub locale: Option<String>,
}

#[derive(Deserialize)]
pub struct LocaleRequest {
    pub locale: String,
}

#[derive(Deserialize)]
pub struct SendRequest {
    pub text: String,
    #[serde(default)]
    pub locale: Option<String>,
}

#[derive(Deserialize)]
pub struct LocaleQuery {
    pub locale: Option<String>,
}

#[derive(Deserialize)]
pub struct QuoteQuery {
    pub width: f64,
    pub height: f64,
    pub material: String,
}

#[derive(Serialize)]
struct SessionView {
    session_id: String,
    locale: Locale,
    pending: bool,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct SendResponse {
    reply: Message,
    source: ReplySource,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct MaterialView {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    price_per_sqm: f64,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/sessions", axum::routing::post(create_session_handler))
        .route("/api/sessions/{id}", get(get_session_handler).delete(delete_session_handler))
        .route("/api/sessions/{id}/locale", axum::routing::put(set_locale_handler))
        .route("/api/sessions/{id}/messages", axum::routing::post(send_message_handler))
        .route("/api/materials", get(materials_handler))
        .route("/api/quote", get(quote_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_http_server(
    http_port: u16,
    state: AppState,
    args: Args,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = format!("0.0.0.0:{}", http_port).parse::<SocketAddr>()?;
    let app = router(state);

    match (args.enable_tls, &args.tls_cert_path, &args.tls_key_path) {
        (true, Some(cert_path), Some(key_path)) => {
            info!("Starting HTTPS API server on: https://{}", addr);
            let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                cert_path,
                key_path
            ).await?;

            tokio::spawn(async move {
                let result = axum_server::bind_rustls(addr, tls_config)
                    .serve(app.into_make_service())
                    .await;

                if let Err(e) = result {
                    error!("HTTPS server error: {}", e);
                }
            });
        }
        (true, _, _) => {
            error!("--enable-tls requires both --tls-cert-path and --tls-key-path.");
            return Err("TLS enabled without cert/key".into());
        }
        _ => {
            info!("Starting HTTP API server on: http://{}", addr);
            let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
                format!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e)
            })?;

            tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                    error!("HTTP server error: {}", e);
                }
            });
        }
    }

    Ok(())
}

/// While a turn holds the lock, the last recorded snapshot is served.
fn view(session_id: String, session: &Session) -> SessionView {
    let pending = session.pending.is_set();
    let (locale, messages) = match session.assistant.try_lock() {
        Ok(assistant) => (assistant.locale(), assistant.messages().to_vec()),
        Err(_) => {
            let snapshot = session.snapshot();
            (snapshot.locale, snapshot.messages)
        }
    };
    SessionView { session_id, locale, pending, messages }
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

async fn create_session_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let locale = parse_locale(req.locale.as_deref(), state.default_locale)?;
    let (id, session) = state.sessions.create(locale).await?;
    Ok((StatusCode::CREATED, Json(view(id, &session))))
}

async fn get_session_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.sessions.get(&id).await?;
    Ok(Json(view(id, &session)))
}

async fn delete_session_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.sessions.remove(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_locale_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<LocaleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let locale: Locale = req.locale.parse()?;
    let session = state.sessions.get(&id).await?;
    let mut assistant = session.assistant.lock().await;
    assistant.initialize(locale);
    session.record(&assistant);
    let view = SessionView {
        session_id: id,
        locale: assistant.locale(),
        pending: false,
        messages: assistant.messages().to_vec(),
    };
    Ok(Json(view))
}

async fn send_message_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SendRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.text.trim().is_empty() {
        return Err(ApiError::Unprocessable("Message text must not be empty".into()));
    }
    let session = state.sessions.get(&id).await?;

    // Runs on its own task so a client hanging up cannot abandon the turn.
    let turn = tokio::spawn(async move {
        let mut assistant = session.assistant.lock().await;
        let locale = parse_locale(req.locale.as_deref(), assistant.locale())?;
        let reply = assistant
            .send(&req.text, locale).await
            .ok_or_else(|| ApiError::Unprocessable("Message text must not be empty".into()))?;
        session.record(&assistant);

        let response = SendResponse {
            reply: reply.message,
            source: reply.source,
            messages: assistant.messages().to_vec(),
        };
        Ok::<_, ApiError>(response)
    });

    let response = turn.await.map_err(|e| {
        error!("Turn for session {} failed: {}", id, e);
        ApiError::Internal("Failed to complete the turn".into())
    })??;
    Ok(Json(response))
}

async fn materials_handler(
    State(state): State<AppState>,
    Query(query): Query<LocaleQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let locale = parse_locale(query.locale.as_deref(), state.default_locale)?;
    let materials: Vec<MaterialView> = MATERIALS.iter()
        .map(|m| MaterialView {
            id: m.id,
            name: m.name(locale),
            description: m.description(locale),
            price_per_sqm: m.price_per_sqm,
        })
        .collect();
    Ok(Json(materials))
}

async fn quote_handler(Query(query): Query<QuoteQuery>) -> Result<Json<Quote>, ApiError> {
    let quote = pricing::estimate(query.width, query.height, &query.material)?;
    Ok(Json(quote))
}
