use crate::application::auth_service::AuthService;
use crate::application::expense_service::ExpenseService;
use crate::data::expense_repository::InMemoryExpenseRepository;
use crate::data::user_repository::InMemoryUserRepository;
use crate::domain::error::DomainError;
use crate::domain::expense::{ExpenseFields, ExpenseRecord};
use crate::presentation::middleware::AuthenticatedUser;
use actix_web::{FromRequest, HttpMessage, HttpResponse, ResponseError, web};
use chrono::Utc;
use serde::Serialize;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

pub struct AppState {
    pub auth_service: Arc<AuthService<InMemoryUserRepository>>,
    pub expense_service: ExpenseService<InMemoryExpenseRepository>,
}

// Uniform error response format
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    details: serde_json::Value,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Email already exists")]
    DuplicateEmail,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Database error: {0}")]
    Database(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        match self {
            ApiError::Validation(_) => actix_web::http::StatusCode::BAD_REQUEST,
            ApiError::DuplicateEmail => actix_web::http::StatusCode::BAD_REQUEST,
            // 400 rather than 401: a failed login is a bad request, not a
            // challenge to re-authenticate
            ApiError::InvalidCredentials => actix_web::http::StatusCode::BAD_REQUEST,
            ApiError::InvalidToken => actix_web::http::StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => actix_web::http::StatusCode::NOT_FOUND,
            ApiError::Internal(_) => actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Database(_) => actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error_msg = self.to_string();

        let details = serde_json::json!({ "message": error_msg });

        match self {
            ApiError::Internal(_) | ApiError::Database(_) => {
                error!(error = %error_msg, status = %status, "Request failed")
            }
            _ => warn!(error = %error_msg, status = %status, "Request rejected"),
        }

        let error_response = ErrorResponse {
            error: error_msg,
            details,
        };

        HttpResponse::build(status).json(error_response)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<DomainError>() {
            Some(DomainError::Validation(msg)) => ApiError::Validation(msg.clone()),
            Some(DomainError::DuplicateEmail) => ApiError::DuplicateEmail,
            Some(DomainError::InvalidCredentials) => ApiError::InvalidCredentials,
            Some(DomainError::InvalidToken) => ApiError::InvalidToken,
            Some(DomainError::NotFound(msg)) => ApiError::NotFound(msg.clone()),
            Some(DomainError::Internal(msg)) => ApiError::Internal(msg.clone()),
            None => ApiError::Database(err.to_string()),
        }
    }
}

// AuthenticatedUser extractor
impl FromRequest for AuthenticatedUser {
    type Error = ApiError;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(
        req: &actix_web::HttpRequest,
        _payload: &mut actix_web::dev::Payload,
    ) -> Self::Future {
        let user = req.extensions().get::<AuthenticatedUser>().cloned();
        Box::pin(async move { user.ok_or(ApiError::InvalidToken) })
    }
}

// Handlers

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    timestamp: String,
}

#[derive(Serialize)]
struct ExpenseListResponse {
    expenses: Vec<ExpenseRecord>,
}

#[derive(Serialize)]
struct ExpenseResponse {
    expense: ExpenseRecord,
}

#[derive(Serialize)]
struct DeleteResponse {
    success: bool,
}

#[instrument]
pub async fn health_check() -> HttpResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now().to_rfc3339(),
    };
    HttpResponse::Ok().json(response)
}

#[instrument(skip(state, user), fields(owner_id = %user.user_id))]
pub async fn list_expenses(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
) -> Result<HttpResponse, ApiError> {
    let expenses = state
        .expense_service
        .list(&user.user_id)
        .await
        .map_err(ApiError::from)?;

    let response = ExpenseListResponse {
        expenses: expenses.into_iter().map(ExpenseRecord::from).collect(),
    };
    Ok(HttpResponse::Ok().json(response))
}

#[instrument(skip(state, user, req), fields(owner_id = %user.user_id, expense_id))]
pub async fn create_expense(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    req: web::Json<ExpenseFields>,
) -> Result<HttpResponse, ApiError> {
    let expense = state
        .expense_service
        .create(&user.user_id, req.into_inner())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create expense");
            ApiError::from(e)
        })?;
    tracing::Span::current().record("expense_id", expense.id.as_str());

    info!("Expense created");
    Ok(HttpResponse::Ok().json(ExpenseResponse {
        expense: expense.into(),
    }))
}

#[instrument(skip(state, user, req), fields(owner_id = %user.user_id, expense_id = %*path))]
pub async fn update_expense(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<String>,
    req: web::Json<ExpenseFields>,
) -> Result<HttpResponse, ApiError> {
    let expense_id = path.into_inner();
    let expense = state
        .expense_service
        .update(&user.user_id, &expense_id, req.into_inner())
        .await
        .map_err(|e| {
            warn!(expense_id = %expense_id, error = %e, "Failed to update expense");
            ApiError::from(e)
        })?;

    info!("Expense updated");
    Ok(HttpResponse::Ok().json(ExpenseResponse {
        expense: expense.into(),
    }))
}

#[instrument(skip(state, user), fields(owner_id = %user.user_id, expense_id = %*path))]
pub async fn delete_expense(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let expense_id = path.into_inner();
    state
        .expense_service
        .delete(&user.user_id, &expense_id)
        .await
        .map_err(|e| {
            warn!(expense_id = %expense_id, error = %e, "Failed to delete expense");
            ApiError::from(e)
        })?;

    info!("Expense deleted");
    Ok(HttpResponse::Ok().json(DeleteResponse { success: true }))
}
