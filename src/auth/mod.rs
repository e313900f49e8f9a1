//! Authentication and authorization.
//!
//! Sessions are stateless HS256 JWTs carrying the user id and role; the role
//! is asserted per request from the token, never re-read from the store.
//! Passwords are hashed with argon2. Role checks go through the policy table
//! in [`policy`].

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString};
use argon2::{Argon2, PasswordVerifier};
use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header, request::Parts},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::entities::user;
use crate::errors::ServiceError;
use crate::models::Role;

pub mod policy;

pub use policy::{is_allowed, Operation};

/// JWT claims for an access token.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Authenticated caller extracted from the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i32,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    /// Policy gate; returns `Forbidden` when the caller's role may not
    /// perform the operation.
    pub fn require(&self, operation: Operation) -> Result<(), ServiceError> {
        if policy::is_allowed(operation, self.role) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "role {} may not perform {}",
                self.role, operation
            )))
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub access_token_expiration: Duration,
}

/// Issues and validates tokens, and verifies login credentials.
#[derive(Clone)]
pub struct AuthService {
    config: AuthConfig,
    db: Arc<DatabaseConnection>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: SessionUser,
}

#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub role: Role,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self { config, db }
    }

    /// Hashes a password for storage.
    pub fn hash_password(password: &str) -> Result<String, ServiceError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| ServiceError::InternalError(format!("password hashing failed: {e}")))
    }

    fn verify_password(password: &str, stored_hash: &str) -> bool {
        PasswordHash::new(stored_hash)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    }

    /// Verifies credentials and issues an access token.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse, ServiceError> {
        let account = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&*self.db)
            .await?;

        // Run the verifier even without a match so response timing does not
        // reveal which emails exist.
        let (hash, account) = match account {
            Some(account) => (account.password_hash.clone(), Some(account)),
            None => (Self::dummy_hash(), None),
        };
        let verified = Self::verify_password(password, &hash);

        let account = match (verified, account) {
            (true, Some(account)) => account,
            _ => {
                warn!(email, "login rejected");
                return Err(ServiceError::AuthError("invalid credentials".to_string()));
            }
        };

        let role = Role::from_str(&account.role).map_err(|_| {
            ServiceError::InternalError(format!("stored role is invalid for user {}", account.id))
        })?;
        let token = self.issue_token(&account)?;
        info!(user_id = account.id, "login succeeded");

        Ok(TokenResponse {
            access_token: token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_expiration.as_secs() as i64,
            user: SessionUser {
                id: account.id,
                email: account.email,
                name: account.name,
                role,
            },
        })
    }

    fn issue_token(&self, account: &user::Model) -> Result<String, ServiceError> {
        let now = Utc::now();
        let exp = now + chrono::Duration::seconds(self.config.access_token_expiration.as_secs() as i64);
        let claims = Claims {
            sub: account.id.to_string(),
            email: account.email.clone(),
            name: account.name.clone(),
            role: account.role.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| ServiceError::InternalError(format!("token creation failed: {e}")))
    }

    /// Issues a token for an existing account without a credential check.
    /// Used by the user-creation flow and by test harnesses.
    pub fn token_for(&self, account: &user::Model) -> Result<String, ServiceError> {
        self.issue_token(account)
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, ServiceError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.jwt_issuer]);
        validation.set_audience(&[&self.config.jwt_audience]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                ServiceError::AuthError("token expired".to_string())
            }
            _ => ServiceError::AuthError("invalid token".to_string()),
        })
    }

    fn dummy_hash() -> String {
        // Any well-formed PHC string works; verification will fail.
        "$argon2id$v=19$m=19456,t=2,p=1$YWJjZGVmZ2hpamtsbW5vcA$L8note3RQmYSSLDUlYv1GZlyNsP9+i1DdDRTpyDzRD8"
            .to_string()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_service = parts
            .extensions
            .get::<Arc<AuthService>>()
            .cloned()
            .ok_or_else(|| {
                ServiceError::InternalError("auth service not available".to_string())
            })?;

        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ServiceError::AuthError("missing bearer token".to_string()))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| ServiceError::AuthError("missing bearer token".to_string()))?
            .trim();

        let claims = auth_service.validate_token(token)?;
        let user_id = claims
            .sub
            .parse::<i32>()
            .map_err(|_| ServiceError::AuthError("invalid token subject".to_string()))?;
        let role = Role::from_str(&claims.role)
            .map_err(|_| ServiceError::AuthError("invalid token role".to_string()))?;

        Ok(AuthUser {
            user_id,
            email: claims.email,
            role,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

async fn login(
    State(auth): State<Arc<AuthService>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ServiceError> {
    request.validate()?;
    let response = auth.login(&request.email, &request.password).await?;
    Ok(Json(response))
}

pub fn auth_routes() -> Router<Arc<AuthService>> {
    Router::new().route("/login", post(login))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::DatabaseConnection;

    fn service() -> AuthService {
        AuthService::new(
            AuthConfig {
                jwt_secret: "unit-test-secret".to_string(),
                jwt_issuer: "signcraft-api".to_string(),
                jwt_audience: "signcraft-dashboard".to_string(),
                access_token_expiration: Duration::from_secs(3600),
            },
            Arc::new(DatabaseConnection::Disconnected),
        )
    }

    fn account(role: &str) -> user::Model {
        let now = Utc::now();
        user::Model {
            id: 7,
            email: "ops@signcraft.test".to_string(),
            name: "Ops".to_string(),
            password_hash: String::new(),
            role: role.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn issued_tokens_validate_and_carry_role() {
        let svc = service();
        let token = svc.token_for(&account("MANAGER")).unwrap();
        let claims = svc.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.role, "MANAGER");
    }

    #[test]
    fn tokens_from_a_different_secret_are_rejected() {
        let svc = service();
        let other = AuthService::new(
            AuthConfig {
                jwt_secret: "some-other-secret".to_string(),
                jwt_issuer: "signcraft-api".to_string(),
                jwt_audience: "signcraft-dashboard".to_string(),
                access_token_expiration: Duration::from_secs(3600),
            },
            Arc::new(DatabaseConnection::Disconnected),
        );
        let token = other.token_for(&account("ADMIN")).unwrap();
        assert!(matches!(
            svc.validate_token(&token),
            Err(ServiceError::AuthError(_))
        ));
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = AuthService::hash_password("hunter2").unwrap();
        assert!(AuthService::verify_password("hunter2", &hash));
        assert!(!AuthService::verify_password("hunter3", &hash));
    }

    #[test]
    fn require_enforces_policy() {
        let admin = AuthUser {
            user_id: 1,
            email: "a@x.test".into(),
            role: Role::Admin,
        };
        let worker = AuthUser {
            user_id: 2,
            email: "w@x.test".into(),
            role: Role::Worker,
        };
        assert!(admin.require(Operation::OrderDelete).is_ok());
        assert!(matches!(
            worker.require(Operation::OrderCreate),
            Err(ServiceError::Forbidden(_))
        ));
    }
}
