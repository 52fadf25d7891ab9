use crate::{
    api::handlers::{auth, books},
    cli::globals::ServerConfig,
    covers::CoverClient,
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::{get, post},
    Extension, Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, services::ServeDir, set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

pub mod flash;
pub(crate) mod handlers;
mod schema;
pub(crate) mod views;

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: String, settings: ServerConfig) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    schema::init(&pool).await?;

    let covers = CoverClient::new()?;
    let config = Arc::new(settings);

    // Every book route sits behind the session guard; unauthenticated
    // requests are redirected to the login form with a flash.
    let book_routes = Router::new()
        .route("/book-tracker", get(books::list))
        .route("/add", get(books::add_form).post(books::create))
        .route("/book/:id", get(books::show))
        .route("/edit/:id", get(books::edit_form).post(books::update))
        .route("/delete/:id", post(books::remove))
        .route_layer(middleware::from_fn(auth::session::require_session));

    let app = Router::new()
        .route("/", get(handlers::root))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", get(auth::logout))
        .route("/auth/google", get(auth::oauth::google_start))
        .route(
            "/auth/google/book-tracker",
            get(auth::oauth::google_callback),
        )
        .merge(book_routes)
        .nest_service("/images", ServeDir::new("public/images"))
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
                .layer(Extension(config))
                .layer(Extension(covers))
                .layer(Extension(pool)),
        );

    let listener = TcpListener::bind(format!("[::]:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
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
