use anyhow::{Context, Result};
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request},
    middleware,
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
use tracing::{debug_span, info, Span};
use ulid::Ulid;
use utoipa::OpenApi;

use crate::cli::globals::GlobalArgs;
use crate::kliento::session::{DynSessionIssuer, JwtSessionIssuer};

pub mod handlers;
pub mod password;
pub mod session;
pub mod store;

#[allow(unused_imports)]
use crate::kliento::handlers::{
    health, health::__path_health, logout, logout::__path_logout, profile,
    profile::__path_profile, signin, signin::__path_signin, signup, signup::__path_signup, update,
    update::__path_update,
};

#[derive(OpenApi)]
#[openapi(
    paths(health, signup, signin, profile, update, logout),
    components(
        schemas(
            signup::SignupRequest,
            signin::SigninRequest,
            update::UpdateRequest,
            store::CustomerProfile
        )
    ),
    tags(
        (name = "customer", description = "Customer accounts API"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Build the router and serve until ctrl-c.
/// # Errors
/// Returns an error if the database or the listener cannot be set up.
pub async fn new(port: u16, dsn: String, globals: &GlobalArgs) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let issuer: DynSessionIssuer = Arc::new(JwtSessionIssuer::new(
        &globals.session_secret,
        Duration::from_secs(globals.session_ttl_seconds),
    ));

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_origin(Any);

    // Routes behind the session middleware; the claim it attaches is what
    // the profile/update/logout handlers key their queries on.
    let account = Router::new()
        .route(
            "/customer/profile",
            get(handlers::profile).patch(handlers::update),
        )
        .route("/customer/logout", post(handlers::logout))
        .route_layer(middleware::from_fn(session::authenticate));

    let app = Router::new()
        .route("/customer/signup", post(handlers::signup))
        .route("/customer/signin", post(handlers::signin))
        .merge(account)
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
                .layer(Extension(issuer))
                .layer(Extension(pool.clone())),
        )
        .route("/health", get(handlers::health).options(handlers::health))
        .layer(Extension(pool));

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let path = request.uri().path();
    let request_id = headers
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", path, ?headers, request_id)
}
