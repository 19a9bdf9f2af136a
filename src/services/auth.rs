//! Authentication service: passwords, tokens and caller resolution

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use rand::RngCore;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{CurrentUser, TokenKind, User, UserClaims},
    repository::Repository,
};

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

pub fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Random URL-safe password built from `length` random bytes
pub fn generate_password(length: usize) -> String {
    let mut bytes = vec![0u8; length];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Access and refresh token issued at login
#[derive(Debug, Clone)]
pub struct Tokens {
    pub access: String,
    pub refresh: String,
}

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    fn issue(&self, user: &User, kind: TokenKind) -> AppResult<String> {
        let now = Utc::now();
        let lifetime = match kind {
            TokenKind::Access => Duration::minutes(self.config.access_token_minutes),
            TokenKind::Refresh => Duration::days(self.config.refresh_token_days),
        };

        let claims = UserClaims {
            sub: user.login.clone(),
            user_id: user.id,
            rights: user.rights,
            kind,
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
        };

        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    fn decode(&self, token: &str, expected: TokenKind) -> AppResult<UserClaims> {
        let claims = UserClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|e| AppError::Authentication(format!("Invalid token: {}", e)))?;

        if claims.kind != expected {
            return Err(AppError::Authentication("Wrong token type".to_string()));
        }
        Ok(claims)
    }

    /// Reload the token's user; tokens of deleted users are rejected
    async fn load_user(&self, claims: &UserClaims) -> AppResult<User> {
        match self.repository.users.get_by_id(claims.user_id).await {
            Ok(user) => Ok(user),
            Err(AppError::NotFound(_)) => {
                Err(AppError::Authentication("User no longer exists".to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Check credentials and issue a token pair
    pub async fn login(&self, login: &str, password: &str) -> AppResult<(Tokens, User)> {
        let user = self
            .repository
            .users
            .get_by_login(login)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid login or password".to_string()))?;

        if !verify_password(&user.password, password)? {
            return Err(AppError::Authentication("Invalid login or password".to_string()));
        }

        let tokens = Tokens {
            access: self.issue(&user, TokenKind::Access)?,
            refresh: self.issue(&user, TokenKind::Refresh)?,
        };

        tracing::info!(user_id = user.id, "User logged in");
        Ok((tokens, user))
    }

    /// New access token from a refresh token, with the user's current rights
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<String> {
        let claims = self.decode(refresh_token, TokenKind::Refresh)?;
        let user = self.load_user(&claims).await?;
        self.issue(&user, TokenKind::Access)
    }

    /// Resolve the caller of a request from its access token
    pub async fn authenticate(&self, access_token: &str) -> AppResult<CurrentUser> {
        let claims = self.decode(access_token, TokenKind::Access)?;
        let user = self.load_user(&claims).await?;
        Ok(CurrentUser::from(&user))
    }
}
