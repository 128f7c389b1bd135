// src/services/token.rs

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::{
    common::error::AppError,
    models::auth::{Claims, PASSWORD_RESET_PURPOSE},
};

/// Sujeito extraído de um token válido.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSubject {
    pub subject: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// Emite e verifica os JWT (HS256). Não sabe nada de principals: só do `sub`.
#[derive(Clone)]
pub struct TokenService {
    secret: Arc<str>,
    session_ttl: Duration,
    reset_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, session_ttl: Duration, reset_ttl: Duration) -> Self {
        Self {
            secret: Arc::from(secret),
            session_ttl,
            reset_ttl,
        }
    }

    pub fn issue_session(&self, subject: &str) -> Result<String, AppError> {
        self.issue(subject, self.session_ttl, None)
    }

    pub fn issue_password_reset(&self, subject: &str) -> Result<String, AppError> {
        self.issue(subject, self.reset_ttl, Some(PASSWORD_RESET_PURPOSE))
    }

    /// Token de sessão não pode carregar `purpose` (um token de reset não abre sessão).
    pub fn verify_session(&self, token: &str) -> Result<VerifiedSubject, AppError> {
        let claims = self.decode(token)?;
        if claims.purpose.is_some() {
            return Err(AppError::InvalidToken);
        }
        Ok(verified(claims))
    }

    /// Exige `purpose` igual à marca de redefinição de senha.
    pub fn verify_password_reset(&self, token: &str) -> Result<VerifiedSubject, AppError> {
        let claims = self.decode(token)?;
        if claims.purpose.as_deref() != Some(PASSWORD_RESET_PURPOSE) {
            return Err(AppError::InvalidToken);
        }
        Ok(verified(claims))
    }

    fn issue(&self, subject: &str, ttl: Duration, purpose: Option<&str>) -> Result<String, AppError> {
        let now = Utc::now();
        let expires_at = now + ttl;

        let claims = Claims {
            sub: subject.to_string(),
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
            purpose: purpose.map(str::to_string),
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )?)
    }

    // Assinatura e expiração são checadas pelo `Validation::default()`.
    fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| {
            tracing::debug!("Token rejeitado: {}", e);
            AppError::InvalidToken
        })?;

        Ok(token_data.claims)
    }
}

fn verified(claims: Claims) -> VerifiedSubject {
    VerifiedSubject {
        issued_at: DateTime::from_timestamp(claims.iat as i64, 0).unwrap_or_default(),
        expires_at: DateTime::from_timestamp(claims.exp as i64, 0).unwrap_or_default(),
        subject: claims.sub,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("segredo-de-teste", Duration::hours(1), Duration::minutes(15))
    }

    #[test]
    fn session_token_round_trip() {
        let tokens = service();
        let token = tokens.issue_session("ana@example.com").unwrap();

        let verified = tokens.verify_session(&token).unwrap();
        assert_eq!(verified.subject, "ana@example.com");
        assert!(verified.issued_at <= Utc::now());
        assert!(verified.expires_at > Utc::now());
    }

    #[test]
    fn reset_token_cannot_open_a_session() {
        let tokens = service();
        let reset = tokens.issue_password_reset("5511999998888").unwrap();

        assert!(matches!(tokens.verify_session(&reset), Err(AppError::InvalidToken)));
        assert_eq!(tokens.verify_password_reset(&reset).unwrap().subject, "5511999998888");
    }

    #[test]
    fn session_token_is_not_a_reset_token() {
        let tokens = service();
        let session = tokens.issue_session("ana@example.com").unwrap();
        assert!(matches!(
            tokens.verify_password_reset(&session),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn wrong_purpose_is_rejected() {
        let tokens = service();
        let token = tokens
            .issue("ana@example.com", Duration::minutes(5), Some("email_confirmation"))
            .unwrap();
        assert!(tokens.verify_password_reset(&token).is_err());
    }

    #[test]
    fn expired_and_foreign_tokens_are_rejected() {
        let tokens = service();
        let expired = tokens
            .issue("ana@example.com", Duration::hours(-2), None)
            .unwrap();
        assert!(matches!(tokens.verify_session(&expired), Err(AppError::InvalidToken)));

        let other = TokenService::new("outro-segredo", Duration::hours(1), Duration::minutes(15));
        let foreign = other.issue_session("ana@example.com").unwrap();
        assert!(tokens.verify_session(&foreign).is_err());
        assert!(tokens.verify_session("nem-um-jwt").is_err());
    }
}
