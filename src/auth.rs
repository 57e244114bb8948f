//! # Authentication
//!
//! Two-step sign in: username and password first, then a six digit code mailed to the account's
//! email address. Only after both does the caller get a session token.
//!
//! - Passwords are stored as Argon2id PHC strings
//! - Sessions are HS256 JWTs valid for 24 hours, sent back as an HttpOnly `token` cookie and in
//!   the response body
//! - Handlers ask for [`AuthUser`] or [`AdminUser`], which read `Authorization: Bearer <jwt>` or
//!   the cookie
use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use axum::{
    extract::FromRequestParts,
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
    },
};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::{Rng, distributions::Alphanumeric, rngs::OsRng};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::Config,
    database::Repository,
    error::AppError,
    models::{Role, User},
    state::AppState,
};

pub const TOKEN_COOKIE: &str = "token";
pub const TOKEN_TTL_SECS: i64 = 24 * 60 * 60;
const ISSUER: &str = "procure";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

#[derive(Clone)]
pub struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Keys {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    pub fn issue(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(TOKEN_TTL_SECS)).timestamp(),
            iss: ISSUER.to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::InternalError(Box::new(e)))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|_| AppError::Unauthorized)
    }
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::internal(format!("password hashing failed: {e}")))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Looks the user up and checks the password. Unknown users and wrong
/// passwords are indistinguishable to the caller.
pub async fn authenticate(
    repository: &dyn Repository,
    username: &str,
    password: &str,
) -> Result<User, AppError> {
    let user = repository
        .user_by_username(username.trim())
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !verify_password(password, &user.password_hash) {
        return Err(AppError::InvalidCredentials);
    }

    Ok(user)
}

/// Creates the `admin` account when no admin exists yet.
pub async fn bootstrap_admin(repository: &dyn Repository, config: &Config) -> Result<(), AppError> {
    if repository.count_admins().await? > 0 {
        return Ok(());
    }

    let password = match &config.admin_password {
        Some(password) => password.clone(),
        None => {
            let generated: String = OsRng
                .sample_iter(&Alphanumeric)
                .take(20)
                .map(char::from)
                .collect();
            warn!("ADMIN_PASSWORD not set, generated admin password: {generated}");
            generated
        }
    };

    let admin = User {
        id: Uuid::new_v4(),
        username: "admin".to_string(),
        email: config.admin_email.clone().unwrap_or_default(),
        password_hash: hash_password(&password)?,
        role: Role::Admin,
        created_at: Utc::now(),
    };
    repository.insert_user(&admin).await?;

    info!("Admin account created");
    Ok(())
}

pub fn session_cookie(token: &str) -> String {
    format!(
        "{TOKEN_COOKIE}={token}; Max-Age={TOKEN_TTL_SECS}; Path=/; HttpOnly; SameSite=Lax"
    )
}

pub fn expired_cookie() -> String {
    format!("{TOKEN_COOKIE}=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax")
}

fn bearer(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
}

fn cookie(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Any signed-in user.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer(parts)
            .or_else(|| cookie(parts, TOKEN_COOKIE))
            .ok_or(AppError::Unauthorized)?;

        state.keys.verify(&token).map(AuthUser)
    }
}

/// A signed-in admin.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Claims);

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;

        if claims.role != Role::Admin {
            return Err(AppError::Forbidden);
        }
        Ok(AdminUser(claims))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            username: "jane".to_string(),
            email: "jane@example.com".to_string(),
            password_hash: String::new(),
            role,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_password_round_trip() {
        let hash = hash_password("correct horse").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
        assert!(!verify_password("correct horse", "not a hash"));
    }

    #[test]
    fn test_token_claims() {
        let keys = Keys::new(b"test-secret");
        let user = user(Role::Admin);

        let claims = keys.verify(&keys.issue(&user).unwrap()).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::Admin);
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_SECS);
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let token = Keys::new(b"one").issue(&user(Role::User)).unwrap();

        assert!(matches!(
            Keys::new(b"two").verify(&token),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn test_token_sources() {
        let (parts, _) = Request::builder()
            .header(COOKIE, "theme=dark; token=abc.def.ghi")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(cookie(&parts, TOKEN_COOKIE).as_deref(), Some("abc.def.ghi"));
        assert_eq!(bearer(&parts), None);

        let (parts, _) = Request::builder()
            .header(AUTHORIZATION, "Bearer xyz")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(bearer(&parts).as_deref(), Some("xyz"));
    }
}
