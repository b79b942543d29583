use crate::{
    api::handlers::{auth, health, root},
    cli::globals::GlobalArgs,
    provider::HttpIdentityProvider,
    store::PgStore,
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, post},
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;
mod openapi;
pub mod response;

pub use openapi::openapi;

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(
    port: u16,
    dsn: String,
    globals: &GlobalArgs,
    auth_config: auth::AuthConfig,
) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let base_url =
        Url::parse(&globals.provider_url).context("Invalid identity provider base URL")?;
    let provider = HttpIdentityProvider::new(base_url, globals.provider_key.clone())?;

    let auth_state = Arc::new(auth::AuthState::new(
        auth_config,
        Arc::new(provider),
        Arc::new(PgStore::new(pool.clone())),
    ));

    // Mobile clients ignore CORS, the open origin is for the Swagger UI and
    // local development against the API
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any);

    let app = Router::new()
        .merge(SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", openapi::openapi()))
        .route("/", get(root::root))
        .route("/health", get(health::health).options(health::health))
        .route("/api/auth/register", post(auth::register::register))
        .route("/api/auth/login", post(auth::login::login))
        .route("/api/auth/login-totp", post(auth::login::login_totp))
        .route(
            "/api/auth/verify-email",
            get(auth::verification::verify_email),
        )
        .route(
            "/api/auth/resend-verification",
            post(auth::verification::resend_verification),
        )
        .route("/api/auth/logout", post(auth::session::logout))
        .route(
            "/api/verification/enable-2fa",
            post(auth::twofactor::enable_2fa),
        )
        .route(
            "/api/verification/verify-2fa",
            post(auth::twofactor::verify_2fa),
        )
        .route(
            "/api/verification/disable-2fa",
            post(auth::twofactor::disable_2fa),
        )
        .route(
            "/api/verification/security-status",
            get(auth::twofactor::security_status),
        )
        .route(
            "/api/biometric/enable",
            post(auth::biometric::enable_biometric),
        )
        .route(
            "/api/biometric/disable",
            post(auth::biometric::disable_biometric),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(auth_state))
                .layer(Extension(pool)),
        );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down gracefully");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down gracefully");
        }
    }
}
