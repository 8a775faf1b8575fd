use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    Extension, Json, Router,
    extract::{Request, State},
    http::{self, HeaderName, HeaderValue, Method, StatusCode},
    middleware::{Next, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::Utc;
use platform_authz::{Auth, Authz, Guard, enforce};
use platform_db::DbPool;
use sea_orm::{ConnectionTrait, EntityTrait, Statement};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    entities::{sessions, users},
    graphql::{RequestAuth, SchemaType},
};

pub const SESSION_COOKIE: &str = "session";

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub authz: Authz,
    pub schema: SchemaType,
    pub config: Arc<AppConfig>,
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    addr: SocketAddr,
}

impl ServeConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::from((host, port)),
        }
    }
}

pub async fn serve(config: ServeConfig, state: AppState) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(%config.addr, "server listening");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    let listed = !allowed.is_empty();
    let allow_origin = if listed {
        AllowOrigin::list(allowed)
    } else {
        AllowOrigin::any()
    };
    CorsLayer::new()
        .allow_credentials(listed)
        .allow_headers([http::header::CONTENT_TYPE, http::header::ACCEPT])
        .allow_methods([Method::POST, Method::GET])
        .allow_origin(allow_origin)
}

pub fn build_router(state: AppState) -> Router {
    let request_id = MakeRequestUuid;
    let header_name = HeaderName::from_static("x-request-id");
    let redirect_back = state.config.html_redirect_back;
    let publish =
        Guard::permissions(state.authz.clone(), "publish|edit").redirect_back(redirect_back);
    let admin = Guard::roles(state.authz.clone(), "admin").redirect_back(redirect_back);
    let moderation = Guard::role_or_permission(state.authz.clone(), "moderator|moderate")
        .redirect_back(redirect_back);

    Router::new()
        .route("/health", get(health_handler))
        .route("/graphql", post(graphql_handler))
        .route("/logout", post(logout_handler))
        .route(
            "/articles/publish",
            get(publish_handler).layer(from_fn_with_state(publish, enforce::<users::Model>)),
        )
        .route(
            "/admin",
            get(admin_handler).layer(from_fn_with_state(admin, enforce::<users::Model>)),
        )
        .route(
            "/moderation",
            get(moderation_handler).layer(from_fn_with_state(moderation, enforce::<users::Model>)),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), request_id))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_allowed_origins))
                .layer(from_fn_with_state(state.clone(), authenticate)),
        )
        .with_state(state)
}

/// Resolves the session cookie into an [`Auth`] extension. Missing, unknown
/// and expired sessions all yield a guest.
async fn authenticate(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let user = match load_session_user(&state, &jar).await {
        Ok(user) => user,
        Err(err) => {
            warn!(error = %err, "session lookup failed");
            return HttpError::internal(err).into_response();
        }
    };
    let auth = match user {
        Some(user) => Auth::authenticated(user),
        None => Auth::guest(),
    };
    request.extensions_mut().insert::<RequestAuth>(auth);
    next.run(request).await
}

async fn load_session_user(
    state: &AppState,
    jar: &CookieJar,
) -> anyhow::Result<Option<users::Model>> {
    let Some(session_id) = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
    else {
        return Ok(None);
    };
    let Some(session) = sessions::Entity::find_by_id(session_id)
        .one(&state.pool)
        .await?
    else {
        return Ok(None);
    };
    if session.expires_at.with_timezone(&Utc) < Utc::now() {
        sessions::Entity::delete_by_id(session_id)
            .exec(&state.pool)
            .await?;
        return Ok(None);
    }
    Ok(users::Entity::find_by_id(session.user_id)
        .one(&state.pool)
        .await?)
}

async fn graphql_handler(
    State(state): State<AppState>,
    Extension(auth): Extension<RequestAuth>,
    request: GraphQLRequest,
) -> GraphQLResponse {
    let request = request.into_inner().data(auth);
    state.schema.execute(request).await.into()
}

async fn logout_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> HttpResult<(CookieJar, StatusCode)> {
    if let Some(session_id) = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
    {
        sessions::Entity::delete_by_id(session_id)
            .exec(&state.pool)
            .await
            .map_err(|err| HttpError::internal(err.into()))?;
    }
    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/").build());
    Ok((jar, StatusCode::NO_CONTENT))
}

async fn publish_handler(Extension(auth): Extension<RequestAuth>) -> Json<Greeting> {
    Greeting::for_user(&auth, "publishing desk")
}

async fn admin_handler(Extension(auth): Extension<RequestAuth>) -> Json<Greeting> {
    Greeting::for_user(&auth, "administration")
}

async fn moderation_handler(Extension(auth): Extension<RequestAuth>) -> Json<Greeting> {
    Greeting::for_user(&auth, "moderation queue")
}

#[derive(Debug, Serialize)]
struct Greeting {
    area: &'static str,
    user: Option<String>,
}

impl Greeting {
    fn for_user(auth: &RequestAuth, area: &'static str) -> Json<Self> {
        Json(Self {
            area,
            user: auth.user().map(|user| user.email.clone()),
        })
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let backend = state.pool.get_database_backend();
    let db_ok = state
        .pool
        .execute(Statement::from_string(backend, "SELECT 1".to_string()))
        .await
        .is_ok();
    Json(HealthResponse {
        ok: db_ok,
        db_ok,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    db_ok: bool,
    version: &'static str,
}

type HttpResult<T> = Result<T, HttpError>;

#[derive(Debug)]
struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    fn internal(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for CTRL+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    ctrl_c.await;

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    };
}
