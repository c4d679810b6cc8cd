use crate::domain::error::DomainError;
use crate::domain::repository::UserRepository;
use crate::domain::user::{Login, Signup, User};
use crate::infrastructure::security::{
    TokenIdentity, hash_password, issue_token, verify_password, verify_token,
};
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

pub struct AuthService<R: UserRepository> {
    user_repository: Arc<R>,
    jwt_secret: String,
}

impl<R: UserRepository> AuthService<R> {
    pub fn new(user_repository: Arc<R>, jwt_secret: String) -> Self {
        Self {
            user_repository,
            jwt_secret,
        }
    }

    /// Creates the account and immediately issues a token: signup implies
    /// login.
    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn signup(&self, req: Signup) -> Result<(User, String)> {
        if req.name.trim().is_empty() || req.email.trim().is_empty() || req.password.is_empty() {
            return Err(
                DomainError::Validation("name, email and password are required".to_string())
                    .into(),
            );
        }

        if self
            .user_repository
            .find_user_by_email(&req.email)
            .await?
            .is_some()
        {
            warn!(email = %req.email, "Signup rejected, email already registered");
            return Err(DomainError::DuplicateEmail.into());
        }

        let password_hash = hash_password(&req.password).map_err(|e| {
            error!(error = %e, "Failed to hash password");
            DomainError::Internal(format!("Failed to hash password: {}", e))
        })?;

        let user = User {
            id: Uuid::new_v4().to_string(),
            name: req.name,
            email: req.email,
            password_hash,
        };

        debug!(user_id = %user.id, "Saving user to repository");
        self.user_repository.save_user(user.clone()).await?;

        let token = self.issue(&user)?;

        info!(user_id = %user.id, email = %user.email, "User signed up");
        Ok((user, token))
    }

    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn login(&self, req: Login) -> Result<(User, String)> {
        let user = self
            .user_repository
            .find_user_by_email(&req.email)
            .await?
            .ok_or_else(|| {
                warn!(email = %req.email, "Login failed, unknown email");
                DomainError::InvalidCredentials
            })?;

        let is_valid = verify_password(&req.password, &user.password_hash).map_err(|e| {
            error!(error = %e, "Failed to verify password");
            DomainError::Internal(format!("Failed to verify password: {}", e))
        })?;

        if !is_valid {
            warn!(user_id = %user.id, "Login failed, wrong password");
            return Err(DomainError::InvalidCredentials.into());
        }

        let token = self.issue(&user)?;

        info!(user_id = %user.id, email = %user.email, "Login successful");
        Ok((user, token))
    }

    /// Echoes the identity a token asserts. Pure check against the signing
    /// secret; the credential store is not consulted.
    #[instrument(skip(self, token))]
    pub fn verify(&self, token: &str) -> Result<TokenIdentity> {
        verify_token(token, &self.jwt_secret).map_err(|e| {
            warn!(error = %e, "Token verification failed");
            DomainError::InvalidToken.into()
        })
    }

    fn issue(&self, user: &User) -> Result<String> {
        issue_token(user, &self.jwt_secret).map_err(|e| {
            error!(error = %e, "Failed to issue token");
            DomainError::Internal(format!("Failed to issue token: {}", e)).into()
        })
    }
}
