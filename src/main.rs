use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use smartspend::application::auth_service::AuthService;
use smartspend::application::expense_service::ExpenseService;
use smartspend::data::expense_repository::InMemoryExpenseRepository;
use smartspend::data::user_repository::InMemoryUserRepository;
use smartspend::infrastructure::config::AppConfig;
use smartspend::infrastructure::logging::init_logging;
use smartspend::presentation::auth::{login, signup, verify};
use smartspend::presentation::handlers::{
    AppState, create_expense, delete_expense, health_check, list_expenses, update_expense,
};
use smartspend::presentation::middleware::{JwtAuthMiddleware, RequestTraceMiddleware};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = AppConfig::from_env()?;
    info!(bind_addr = %config.bind_addr, "Configuration loaded");

    let user_repository = InMemoryUserRepository::new();
    let expense_repository = InMemoryExpenseRepository::new();

    let auth_service = Arc::new(AuthService::new(
        Arc::new(user_repository),
        config.jwt_secret.clone(),
    ));
    let expense_service = ExpenseService::new(Arc::new(expense_repository));

    let state = web::Data::new(AppState {
        auth_service,
        expense_service,
    });

    let jwt_secret = config.jwt_secret.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            // Outer to inner: tracing, CORS (preflights never hit auth),
            // then the bearer check
            .wrap(JwtAuthMiddleware::new(jwt_secret.clone()))
            .wrap(Cors::permissive())
            .wrap(RequestTraceMiddleware)
            .service(
                web::scope("/api")
                    .route("/health", web::get().to(health_check))
                    .route("/auth/signup", web::post().to(signup))
                    .route("/auth/login", web::post().to(login))
                    .route("/auth/verify", web::get().to(verify))
                    .route("/expenses", web::get().to(list_expenses))
                    .route("/expenses", web::post().to(create_expense))
                    .route("/expenses/{id}", web::put().to(update_expense))
                    .route("/expenses/{id}", web::delete().to(delete_expense)),
            )
    });

    let server = server.bind(config.bind_addr.as_str())?;
    info!(address = %config.bind_addr, "Starting HTTP server");
    server.run().await?;
    Ok(())
}
