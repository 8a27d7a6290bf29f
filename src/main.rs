use actix_web::{web, App, HttpServer};
use std::sync::Arc;

use fan_chat_service::services::account_service::PgAccountStore;
use fan_chat_service::services::message_service::PgMessageStore;
use fan_chat_service::websocket::PresenceRegistry;
use fan_chat_service::{config, db, error, logging, routes, state::AppState};

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    logging::init_tracing();
    let cfg = Arc::new(config::Config::from_env()?);

    let pool = db::init_pool(&cfg.database_url).await?;
    db::run_migrations(&pool).await?;

    let state = AppState {
        registry: PresenceRegistry::new(),
        config: cfg.clone(),
        accounts: Arc::new(PgAccountStore::new(pool.clone())),
        messages: Arc::new(PgMessageStore::new(pool)),
    };

    let bind_addr = format!("0.0.0.0:{}", cfg.port);
    tracing::info!(%bind_addr, "starting fan-chat-service");

    HttpServer::new(move || {
        let cors = actix_cors::Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .service(routes::auth::register)
            .service(routes::auth::login)
            .service(routes::chat::conversation)
            .service(routes::wsroute::ws_handler)
            .route("/health", web::get().to(|| async { "OK" }))
    })
    .bind(&bind_addr)
    .map_err(|e| error::AppError::StartServer(format!("bind: {e}")))?
    .run()
    .await
    .map_err(|e| error::AppError::StartServer(format!("run server: {e}")))
}
