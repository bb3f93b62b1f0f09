//! Credential and session management
//!
//! Passwords are hashed with Argon2. Sessions are a pair of HS256 JWTs:
//! a short-lived access token and a longer-lived refresh token, both
//! delivered as hardened cookies and carrying an identity snapshot.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{SessionUser, TokenType, UserClaims},
};

/// Freshly signed tokens
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Tokens plus the cookies that carry them
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub user: SessionUser,
    pub tokens: TokenPair,
    pub access_cookie: Cookie<'static>,
    pub refresh_cookie: Cookie<'static>,
}

impl IssuedSession {
    /// Add both cookies to a response jar
    pub fn into_jar(self, jar: CookieJar) -> (CookieJar, SessionUser, TokenPair) {
        let jar = jar.add(self.refresh_cookie).add(self.access_cookie);
        (jar, self.user, self.tokens)
    }
}

#[derive(Clone)]
pub struct SessionManager {
    config: AuthConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SessionManager {
    pub fn new(config: AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[config.jwt_issuer.as_str()]);
        validation.set_audience(&[config.jwt_audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            config,
        }
    }

    /// Hash a password using Argon2 with a fresh random salt
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }

    /// Check a password against a stored hash.
    /// A mismatch is `Ok(false)`; an unparsable hash is an error.
    pub fn verify_password(&self, hash: &str, password: &str) -> AppResult<bool> {
        let parsed_hash =
            PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;
        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AppError::Internal(format!("Failed to verify password: {}", e))),
        }
    }

    /// Sign an access/refresh pair for the identity and build their cookies
    pub fn issue(&self, user: &SessionUser) -> AppResult<IssuedSession> {
        let access_token = self.sign(user, TokenType::Access, self.config.access_token_ttl_seconds)?;
        let refresh_token = self.sign(user, TokenType::Refresh, self.config.refresh_token_ttl_seconds)?;

        Ok(IssuedSession {
            user: user.clone(),
            access_cookie: self.build_cookie(
                &self.config.access_cookie_name,
                access_token.clone(),
                self.config.access_token_ttl_seconds,
            ),
            refresh_cookie: self.refresh_cookie(&refresh_token),
            tokens: TokenPair {
                access_token,
                refresh_token,
            },
        })
    }

    /// Cookie carrying a refresh token
    pub fn refresh_cookie(&self, refresh_token: &str) -> Cookie<'static> {
        self.build_cookie(
            &self.config.refresh_cookie_name,
            refresh_token.to_string(),
            self.config.refresh_token_ttl_seconds,
        )
    }

    /// Cookies that clear both tokens on the client
    pub fn expired_cookies(&self) -> [Cookie<'static>; 2] {
        [
            self.expired_cookie(&self.config.access_cookie_name),
            self.expired_cookie(&self.config.refresh_cookie_name),
        ]
    }

    /// Read the refresh cookie from the jar and verify it
    pub fn verify_and_extract(&self, jar: &CookieJar) -> AppResult<UserClaims> {
        let cookie = jar
            .get(&self.config.refresh_cookie_name)
            .ok_or_else(|| AppError::MissingCredential(format!("{} cookie not present", self.config.refresh_cookie_name)))?;
        self.verify(cookie.value(), TokenType::Refresh)
    }

    /// Verify a bearer access token
    pub fn verify_access_token(&self, token: &str) -> AppResult<UserClaims> {
        self.verify(token, TokenType::Access)
    }

    fn verify(&self, token: &str, expected: TokenType) -> AppResult<UserClaims> {
        let data = decode::<UserClaims>(token, &self.decoding_key, &self.validation).map_err(map_jwt_error)?;
        if data.claims.token_type != expected {
            return Err(AppError::Authentication("Wrong token type".to_string()));
        }
        Ok(data.claims)
    }

    fn sign(&self, user: &SessionUser, token_type: TokenType, ttl_seconds: i64) -> AppResult<String> {
        let now = Utc::now().timestamp();
        let claims = UserClaims {
            sub: user.id.to_string(),
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
            iat: now,
            exp: now + ttl_seconds,
            jti: Uuid::new_v4(),
            token_type,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    fn build_cookie(&self, name: &str, value: String, ttl_seconds: i64) -> Cookie<'static> {
        let ttl = time::Duration::seconds(ttl_seconds);
        let mut builder = Cookie::build((name.to_string(), value))
            .path(self.config.cookie_path.clone())
            .http_only(true)
            .secure(true)
            .same_site(SameSite::None)
            .max_age(ttl)
            .expires(OffsetDateTime::now_utc() + ttl);
        if let Some(domain) = &self.config.cookie_domain {
            builder = builder.domain(domain.clone());
        }
        builder.build()
    }

    fn expired_cookie(&self, name: &str) -> Cookie<'static> {
        let mut builder = Cookie::build((name.to_string(), String::new()))
            .path(self.config.cookie_path.clone())
            .http_only(true)
            .secure(true)
            .same_site(SameSite::None)
            .max_age(time::Duration::ZERO)
            .expires(OffsetDateTime::UNIX_EPOCH);
        if let Some(domain) = &self.config.cookie_domain {
            builder = builder.domain(domain.clone());
        }
        builder.build()
    }
}

fn map_jwt_error(e: jsonwebtoken::errors::Error) -> AppError {
    match e.kind() {
        ErrorKind::ExpiredSignature => AppError::TokenExpired,
        ErrorKind::InvalidIssuer => AppError::InvalidIssuer,
        ErrorKind::InvalidAlgorithm => AppError::Authentication("Unexpected signing algorithm".to_string()),
        ErrorKind::InvalidSignature => AppError::Authentication("Invalid token signature".to_string()),
        _ => AppError::Authentication(format!("Invalid token: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn config() -> AuthConfig {
        AuthConfig {
            jwt_secret: "test-secret-with-enough-entropy".to_string(),
            ..AuthConfig::default()
        }
    }

    fn staff() -> SessionUser {
        SessionUser {
            id: 7,
            email: "clerk@libris.test".to_string(),
            role: Role::Staff,
        }
    }

    #[test]
    fn test_password_hash_and_verify() {
        let session = SessionManager::new(config());
        let hash = session.hash_password("correct horse").unwrap();

        assert_ne!(hash, "correct horse");
        assert!(session.verify_password(&hash, "correct horse").unwrap());
        assert!(!session.verify_password(&hash, "Correct Horse").unwrap());
    }

    #[test]
    fn test_same_password_gets_distinct_hashes() {
        let session = SessionManager::new(config());
        let a = session.hash_password("same password").unwrap();
        let b = session.hash_password("same password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_garbage_hash_is_an_error() {
        let session = SessionManager::new(config());
        assert!(matches!(
            session.verify_password("not-a-phc-string", "whatever"),
            Err(AppError::Internal(_))
        ));
    }

    #[test]
    fn test_refresh_cookie_round_trip_keeps_snapshot() {
        let session = SessionManager::new(config());
        let issued = session.issue(&staff()).unwrap();

        let jar = CookieJar::new().add(issued.refresh_cookie.clone());
        let claims = session.verify_and_extract(&jar).unwrap();

        assert_eq!(claims.snapshot(), staff());
        assert_eq!(claims.role, Role::Staff);
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.token_type, TokenType::Refresh);
        assert_eq!(claims.exp - claims.iat, 86400);
    }

    #[test]
    fn test_access_token_round_trip() {
        let session = SessionManager::new(config());
        let issued = session.issue(&staff()).unwrap();

        let claims = session.verify_access_token(&issued.tokens.access_token).unwrap();
        assert_eq!(claims.user_id(), 7);
        assert_eq!(claims.exp - claims.iat, 60);
    }

    #[test]
    fn test_token_types_are_not_interchangeable() {
        let session = SessionManager::new(config());
        let issued = session.issue(&staff()).unwrap();

        assert!(matches!(
            session.verify_access_token(&issued.tokens.refresh_token),
            Err(AppError::Authentication(_))
        ));

        let jar = CookieJar::new().add(session.refresh_cookie(&issued.tokens.access_token));
        assert!(matches!(session.verify_and_extract(&jar), Err(AppError::Authentication(_))));
    }

    #[test]
    fn test_missing_cookie() {
        let session = SessionManager::new(config());
        assert!(matches!(
            session.verify_and_extract(&CookieJar::new()),
            Err(AppError::MissingCredential(_))
        ));
    }

    #[test]
    fn test_expired_token() {
        let session = SessionManager::new(AuthConfig {
            refresh_token_ttl_seconds: -5,
            ..config()
        });
        let issued = session.issue(&staff()).unwrap();
        let jar = CookieJar::new().add(issued.refresh_cookie);

        assert!(matches!(session.verify_and_extract(&jar), Err(AppError::TokenExpired)));
    }

    #[test]
    fn test_foreign_secret_is_rejected() {
        let session = SessionManager::new(config());
        let forger = SessionManager::new(AuthConfig {
            jwt_secret: "some-other-secret".to_string(),
            ..config()
        });
        let forged = forger.issue(&staff()).unwrap();

        assert!(matches!(
            session.verify_access_token(&forged.tokens.access_token),
            Err(AppError::Authentication(_))
        ));
    }

    #[test]
    fn test_foreign_algorithm_is_rejected() {
        let cfg = config();
        let session = SessionManager::new(cfg.clone());
        let now = Utc::now().timestamp();
        let claims = UserClaims {
            sub: "7".to_string(),
            id: 7,
            email: "clerk@libris.test".to_string(),
            role: Role::Admin,
            iss: cfg.jwt_issuer.clone(),
            aud: cfg.jwt_audience.clone(),
            iat: now,
            exp: now + 60,
            jti: Uuid::new_v4(),
            token_type: TokenType::Access,
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(cfg.jwt_secret.as_bytes()),
        )
        .unwrap();

        assert!(matches!(session.verify_access_token(&token), Err(AppError::Authentication(_))));
    }

    #[test]
    fn test_wrong_issuer() {
        let session = SessionManager::new(config());
        let other = SessionManager::new(AuthConfig {
            jwt_issuer: "someone-else".to_string(),
            ..config()
        });
        let issued = other.issue(&staff()).unwrap();

        assert!(matches!(
            session.verify_access_token(&issued.tokens.access_token),
            Err(AppError::InvalidIssuer)
        ));
    }

    #[test]
    fn test_cookie_attributes() {
        let session = SessionManager::new(AuthConfig {
            cookie_domain: Some("libris.test".to_string()),
            ..config()
        });
        let issued = session.issue(&staff()).unwrap();
        let cookie = &issued.refresh_cookie;

        assert_eq!(cookie.name(), "refresh_token");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::None));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.domain(), Some("libris.test"));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(86400)));

        assert_eq!(issued.access_cookie.name(), "access_token");
        assert_eq!(issued.access_cookie.max_age(), Some(time::Duration::seconds(60)));
    }

    #[test]
    fn test_expired_cookies_clear_both_tokens() {
        let session = SessionManager::new(config());
        let [access, refresh] = session.expired_cookies();

        assert_eq!(access.name(), "access_token");
        assert_eq!(refresh.name(), "refresh_token");
        assert_eq!(refresh.value(), "");
        assert_eq!(refresh.max_age(), Some(time::Duration::ZERO));
    }
}
