use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::types::Claims;

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_hours: i64,
    refresh_token_days: i64,
}

impl JwtService {
    pub fn new(secret: &str, expiration_hours: i64, refresh_token_days: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            expiration_hours,
            refresh_token_days,
        }
    }

    pub fn generate_token(
        &self,
        user_id: Uuid,
        email: &str,
        roles: Vec<String>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let exp = now + Duration::hours(self.expiration_hours);

        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            roles,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &Validation::default())?;
        Ok(token_data.claims)
    }

    /// Opaque refresh token and its expiry; the token is persisted on the user row.
    pub fn generate_refresh_token(&self) -> (String, DateTime<Utc>) {
        let token = Uuid::new_v4().to_string();
        let expires_at = Utc::now() + Duration::days(self.refresh_token_days);
        (token, expires_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_roles() {
        let service = JwtService::new("test-secret", 1, 30);
        let user_id = Uuid::new_v4();
        let token = service
            .generate_token(user_id, "ops@example.com", vec!["Admin".into(), "Viewer".into()])
            .unwrap();

        let claims = service.verify_token(&token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.roles, vec!["Admin".to_string(), "Viewer".to_string()]);
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let issuer = JwtService::new("secret-a", 1, 30);
        let verifier = JwtService::new("secret-b", 1, 30);
        let token = issuer.generate_token(Uuid::new_v4(), "a@b.c", vec![]).unwrap();
        assert!(verifier.verify_token(&token).is_err());
    }

    #[test]
    fn refresh_tokens_expire_in_the_future() {
        let service = JwtService::new("s", 1, 7);
        let (token, expires_at) = service.generate_refresh_token();
        assert!(!token.is_empty());
        assert!(expires_at > Utc::now() + Duration::days(6));
    }
}
