use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenClaims {
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing or malformed credentials")]
    MissingToken,
    #[error("Invalid or expired token: {0}")]
    InvalidToken(String),
    #[error("Authentication failed: {0}")]
    Verification(String),
}

/// Verify a bearer JWT and return its claims. The token `sub` is the user id
/// every downstream component keys on.
pub fn verify_token(secret: &str, token: &str) -> Result<TokenClaims, AuthError> {
    decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature
        | ErrorKind::ImmatureSignature
        | ErrorKind::InvalidToken
        | ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm => AuthError::InvalidToken(e.to_string()),
        _ => AuthError::Verification(e.to_string()),
    })
}

/// Strip the `Bearer ` prefix from an Authorization header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    header_value.strip_prefix("Bearer ").map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, get_current_timestamp, EncodingKey, Header};

    fn make_token(secret: &str, exp_offset: i64) -> String {
        let now = get_current_timestamp() as usize;
        let claims = TokenClaims {
            sub: Uuid::new_v4(),
            exp: (now as i64 + exp_offset) as usize,
            iat: now,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn accepts_valid_token() {
        let token = make_token("topsecret", 900);
        let claims = verify_token("topsecret", &token).unwrap();
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = make_token("topsecret", 900);
        let err = verify_token("othersecret", &token).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[test]
    fn rejects_expired_token() {
        let token = make_token("topsecret", -900);
        let err = verify_token("topsecret", &token).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[test]
    fn strips_bearer_prefix() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("Basic abc"), None);
    }
}
