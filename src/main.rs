use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use whatsapp_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    middleware, routes, AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(pool);

    let base_routes = Router::new().route("/health", get(routes::health::health));

    let api = Router::new()
        .route(
            "/api/conversations",
            get(routes::conversations::list_conversations),
        )
        .route(
            "/api/conversations/stats",
            get(routes::conversations::get_conversation_stats),
        )
        .route(
            "/api/conversations/:wa_id",
            get(routes::conversations::get_conversation)
                .patch(routes::conversations::update_conversation),
        )
        .route(
            "/api/messages/conversation/:wa_id",
            get(routes::messages::get_conversation_messages),
        )
        .route("/api/messages/send", post(routes::messages::send_message))
        .route(
            "/api/messages/status/:id",
            axum::routing::patch(routes::messages::update_message_status),
        )
        .route(
            "/api/messages/:id",
            axum::routing::delete(routes::messages::delete_message),
        )
        .layer(axum::middleware::from_fn_with_state(
            middleware::rate_limit::new_rps_state(config.api_rps),
            middleware::rate_limit::rps_middleware,
        ));

    let webhook_routes = Router::new().route(
        "/webhook",
        get(routes::webhook::verify_webhook).post(routes::webhook::receive_webhook),
    );

    let realtime_routes = Router::new().route("/ws", get(routes::realtime::ws_handler));

    let app = base_routes
        .merge(api)
        .merge(webhook_routes)
        .merge(realtime_routes)
        .with_state(app_state)
        .layer(middleware::cors::permissive_cors())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024));

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
