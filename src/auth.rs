use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::debug;

use crate::models::Claims;

/// Signs and checks the bearer tokens handed out at login.
///
/// Built once at startup from the configured secret and shared by every
/// worker. Tokens are stateless: the only bound on their lifetime is `exp`.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // no clock skew allowance
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    pub fn issue(&self, user_id: i64, username: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            user_id,
            username: username.to_string(),
            iat: unix_seconds(now),
            exp: unix_seconds(now + self.ttl),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    /// Returns the token's claims, or `None` for anything that is not a
    /// well-formed, correctly signed, unexpired token naming a user.
    pub fn verify(&self, token: &str) -> Option<Claims> {
        match decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) if data.claims.user_id > 0 && !data.claims.username.is_empty() => {
                Some(data.claims)
            }
            Ok(_) => {
                debug!("token rejected: missing user claims");
                None
            }
            Err(err) => {
                debug!("token rejected: {err}");
                None
            }
        }
    }
}

fn unix_seconds(at: DateTime<Utc>) -> u64 {
    u64::try_from(at.timestamp()).unwrap_or(0)
}

/// Pulls the token out of an `Authorization: Bearer <token>` header value.
pub fn extract_token(header: Option<&str>) -> Option<&str> {
    let token = header?.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    const SECRET: &[u8] = b"test-secret";

    fn service() -> TokenService {
        TokenService::new(SECRET, Duration::hours(1))
    }

    #[test]
    fn issued_token_verifies_to_the_same_user() {
        let tokens = service();
        let token = tokens.issue(42, "alice").unwrap();

        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.user_id, 42);
        assert_eq!(claims.username, "alice");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = TokenService::new(SECRET, Duration::seconds(-120));
        let token = tokens.issue(1, "alice").unwrap();
        assert!(tokens.verify(&token).is_none());
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let token = TokenService::new(b"other-secret", Duration::hours(1))
            .issue(1, "alice")
            .unwrap();
        assert!(service().verify(&token).is_none());
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let tokens = service();
        let alice = tokens.issue(1, "alice").unwrap();
        let mallory = tokens.issue(2, "mallory").unwrap();

        let alice_parts: Vec<&str> = alice.split('.').collect();
        let mallory_parts: Vec<&str> = mallory.split('.').collect();
        let forged = format!("{}.{}.{}", alice_parts[0], mallory_parts[1], alice_parts[2]);

        assert!(tokens.verify(&forged).is_none());
        assert!(tokens.verify("not.a.token").is_none());
        assert!(tokens.verify("").is_none());
    }

    #[test]
    fn token_without_user_claims_is_rejected() {
        #[derive(Serialize)]
        struct Bare {
            exp: u64,
        }

        let exp = unix_seconds(Utc::now() + Duration::hours(1));
        let token = encode(
            &Header::new(Algorithm::HS256),
            &Bare { exp },
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert!(service().verify(&token).is_none());
    }

    #[test]
    fn token_for_user_zero_is_rejected() {
        let tokens = service();
        let token = tokens.issue(0, "ghost").unwrap();
        assert!(tokens.verify(&token).is_none());
    }

    #[test]
    fn claim_timestamps_are_whole_unix_seconds() {
        let at = DateTime::from_timestamp(4_102_444_800, 0).unwrap();
        assert_eq!(unix_seconds(at), 4_102_444_800);

        let before_epoch = DateTime::from_timestamp(-5, 0).unwrap();
        assert_eq!(unix_seconds(before_epoch), 0);
    }

    #[test]
    fn extracts_bearer_tokens_only() {
        assert_eq!(extract_token(Some("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(extract_token(Some("Bearer   abc  ")), Some("abc"));
        assert_eq!(extract_token(None), None);
        assert_eq!(extract_token(Some("Bearer ")), None);
        assert_eq!(extract_token(Some("Bearer")), None);
        assert_eq!(extract_token(Some("Basic dXNlcjpwYXNz")), None);
        assert_eq!(extract_token(Some("bearer abc")), None);
    }
}
