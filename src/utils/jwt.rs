use crate::entities::UserRole;
use crate::error::{AppError, AppResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // account id
    pub email: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
    pub token_type: String,
}

/// The verified caller of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub account_id: i32,
    pub role: UserRole,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Checks signature and expiry of a bearer token before any claim is trusted.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> AppResult<Identity>;
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expires_in: i64,
}

impl JwtService {
    pub fn new(secret: &str, access_expires_in: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_expires_in: access_expires_in,
        }
    }

    pub fn generate_access_token(
        &self,
        account_id: i32,
        email: &str,
        role: UserRole,
    ) -> AppResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.access_token_expires_in);

        let claims = Claims {
            sub: account_id.to_string(),
            email: email.to_string(),
            role: role.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            token_type: "access".to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(AppError::JwtError)
    }

    pub fn verify_token(&self, token: &str) -> AppResult<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(AppError::JwtError)
    }

    pub fn verify_access_token(&self, token: &str) -> AppResult<Claims> {
        let claims = self.verify_token(token)?;

        if claims.token_type != "access" {
            return Err(AppError::AuthError("Invalid access token type".to_string()));
        }

        Ok(claims)
    }

    pub fn get_access_token_expires_in(&self) -> i64 {
        self.access_token_expires_in
    }
}

impl TokenVerifier for JwtService {
    fn verify(&self, token: &str) -> AppResult<Identity> {
        let claims = self.verify_access_token(token)?;
        let account_id = claims
            .sub
            .parse::<i32>()
            .map_err(|_| AppError::AuthError("Invalid subject claim".to_string()))?;
        let role = claims
            .role
            .parse::<UserRole>()
            .map_err(AppError::AuthError)?;
        Ok(Identity { account_id, role })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issued_token_verifies_to_identity() {
        let jwt = JwtService::new("secret", 3600);
        let token = jwt
            .generate_access_token(42, "parent@example.com", UserRole::Admin)
            .unwrap();
        let identity = jwt.verify(&token).unwrap();
        assert_eq!(identity.account_id, 42);
        assert!(identity.is_admin());
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let issuer = JwtService::new("one", 3600);
        let verifier = JwtService::new("two", 3600);
        let token = issuer
            .generate_access_token(1, "a@example.com", UserRole::Member)
            .unwrap();
        assert!(matches!(verifier.verify(&token), Err(AppError::JwtError(_))));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        // well past the default 60s leeway
        let jwt = JwtService::new("secret", -3600);
        let token = jwt
            .generate_access_token(1, "a@example.com", UserRole::Member)
            .unwrap();
        assert!(jwt.verify(&token).is_err());
    }

    #[test]
    fn test_non_numeric_subject_is_rejected() {
        let jwt = JwtService::new("secret", 3600);
        let now = Utc::now();
        let claims = Claims {
            sub: "abc".to_string(),
            email: "a@example.com".to_string(),
            role: "member".to_string(),
            exp: (now + Duration::hours(1)).timestamp(),
            iat: now.timestamp(),
            token_type: "access".to_string(),
        };
        let token = encode(&Header::default(), &claims, &jwt.encoding_key).unwrap();
        assert!(matches!(jwt.verify(&token), Err(AppError::AuthError(_))));
    }
}
