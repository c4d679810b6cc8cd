use crate::domain::user::{Login, Signup, User};
use crate::presentation::handlers::{ApiError, AppState};
use crate::presentation::middleware::AuthenticatedUser;
use actix_web::{HttpResponse, web};
use serde::Serialize;
use tracing::{error, info, instrument};

#[derive(Serialize)]
pub struct UserPayload {
    pub id: String,
    pub email: String,
    pub name: String,
}

impl From<User> for UserPayload {
    fn from(user: User) -> Self {
        UserPayload {
            id: user.id,
            email: user.email,
            name: user.name,
        }
    }
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserPayload,
}

#[derive(Serialize)]
pub struct VerifyResponse {
    pub user: UserPayload,
}

#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn signup(
    state: web::Data<AppState>,
    req: web::Json<Signup>,
) -> Result<HttpResponse, ApiError> {
    info!("Signup request received");

    let (user, token) = state.auth_service.signup(req.into_inner()).await.map_err(|e| {
        error!(error = %e, "Failed to sign up user");
        ApiError::from(e)
    })?;

    info!(user_id = %user.id, "User signed up");
    Ok(HttpResponse::Ok().json(AuthResponse {
        token,
        user: user.into(),
    }))
}

#[instrument(skip(state, req), fields(email = %req.email))]
pub async fn login(
    state: web::Data<AppState>,
    req: web::Json<Login>,
) -> Result<HttpResponse, ApiError> {
    info!("Login request received");

    let (user, token) = state.auth_service.login(req.into_inner()).await.map_err(|e| {
        error!(error = %e, "Failed to login");
        ApiError::from(e)
    })?;

    info!(user_id = %user.id, "Login successful");
    Ok(HttpResponse::Ok().json(AuthResponse {
        token,
        user: user.into(),
    }))
}

/// Echoes the identity the bearer token asserts, so a client can restore its
/// session after reload without resending credentials. The middleware has
/// already verified the token by the time this runs.
#[instrument(skip(user), fields(user_id = %user.user_id))]
pub async fn verify(user: AuthenticatedUser) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(VerifyResponse {
        user: UserPayload {
            id: user.user_id,
            email: user.email,
            name: user.name,
        },
    }))
}
