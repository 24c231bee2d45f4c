//! Signed claims exchanged with the proxy: the bearer token sent to the control
//! endpoint and validation of the `Grip-Sig` header the proxy sends us.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Lifetime of control-endpoint tokens.
pub const TOKEN_TTL_SECS: i64 = 600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ControlClaims {
    iss: String,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct ExpiringClaims {
    exp: i64,
}

/// HS256 token over `{iss: realm, exp: now + 600}`.
pub fn make_token(realm: &str, secret: &[u8]) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = ControlClaims {
        iss: realm.to_string(),
        exp: chrono::Utc::now().timestamp() + TOKEN_TTL_SECS,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
}

/// Whether `token` was signed with `key` and has not yet expired.
pub fn validate_sig(token: &str, key: &[u8]) -> bool {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.validate_aud = false;
    validation.set_required_spec_claims(&["exp"]);

    match decode::<ExpiringClaims>(token, &DecodingKey::from_secret(key), &validation) {
        Ok(data) => data.claims.exp > chrono::Utc::now().timestamp(),
        Err(e) => {
            debug!("grip signature rejected: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(claims: &serde_json::Value, key: &[u8]) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(key)).unwrap()
    }

    #[test]
    fn token_claims() {
        let token = make_token("realm", b"secret").unwrap();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        let data =
            decode::<ControlClaims>(&token, &DecodingKey::from_secret(b"secret"), &validation)
                .unwrap();
        assert_eq!(data.claims.iss, "realm");
        let ttl = data.claims.exp - chrono::Utc::now().timestamp();
        assert!((TOKEN_TTL_SECS - 5..=TOKEN_TTL_SECS).contains(&ttl));
    }

    #[test]
    fn valid_sig() {
        let exp = chrono::Utc::now().timestamp() + 3600;
        let token = sign(&serde_json::json!({"iss": "hello", "exp": exp}), b"key==");
        assert!(validate_sig(&token, b"key=="));
    }

    #[test]
    fn wrong_key() {
        let exp = chrono::Utc::now().timestamp() + 3600;
        let token = sign(&serde_json::json!({"iss": "hello", "exp": exp}), b"key==");
        assert!(!validate_sig(&token, b"wrong_key"));
    }

    #[test]
    fn expired() {
        let exp = chrono::Utc::now().timestamp() - 3600;
        let token = sign(&serde_json::json!({"iss": "hello", "exp": exp}), b"key==");
        assert!(!validate_sig(&token, b"key=="));
    }

    #[test]
    fn missing_exp() {
        let token = sign(&serde_json::json!({"iss": "hello"}), b"key==");
        assert!(!validate_sig(&token, b"key=="));
    }

    #[test]
    fn garbage() {
        assert!(!validate_sig("not-a-token", b"key"));
    }
}
