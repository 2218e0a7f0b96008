use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::AppError;
use crate::models::authenticated_user::AuthenticatedUser;
use crate::models::session_claims::SessionClaims;
use crate::security::token_codec;

type HmacSha256 = Hmac<Sha256>;

// Wire format: header.payload.signature, each section codec-encoded. The
// signature covers the first two encoded sections joined by the dot, so a
// verifier recomputes it without trusting the payload first.
const TOKEN_ALGORITHM: &str = "HS256";
const TOKEN_TYPE: &str = "session";

#[derive(Debug, Serialize, Deserialize)]
struct TokenHeader {
    alg: String,
    typ: String,
}

/// Mints and verifies stateless session tokens. There is no server-side
/// session record: a token is valid until its expiry or a key rotation,
/// whichever comes first.
pub struct SessionTokenService {
    key: Vec<u8>,
}

impl SessionTokenService {
    /// Builds the service from the process-wide signing secret. An empty
    /// secret is refused so the process cannot start with a guessable key.
    pub fn new(secret: &str) -> Result<Self, AppError> {
        if secret.trim().is_empty() {
            return Err(AppError::Configuration(
                "Session token secret must not be empty".to_string(),
            ));
        }

        let fingerprint = hex::encode(Sha256::digest(secret.as_bytes()));
        info!(
            "Session token service initialized (key fingerprint: {})",
            &fingerprint[..8]
        );

        Ok(Self {
            key: secret.as_bytes().to_vec(),
        })
    }

    /// Mints a signed token for the given identity, valid for `ttl` from now.
    pub fn mint(
        &self,
        subject_id: &str,
        external_id: &str,
        ttl: Duration,
    ) -> Result<String, AppError> {
        self.mint_at(subject_id, external_id, ttl, Utc::now())
    }

    fn mint_at(
        &self,
        subject_id: &str,
        external_id: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| AppError::Internal("Failed to calculate token expiration time".to_string()))?;

        let header = TokenHeader {
            alg: TOKEN_ALGORITHM.to_string(),
            typ: TOKEN_TYPE.to_string(),
        };
        let claims = SessionClaims {
            sub: subject_id.to_string(),
            ext: external_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let header_section = token_codec::encode(&serde_json::to_vec(&header)?);
        let claims_section = token_codec::encode(&serde_json::to_vec(&claims)?);
        let signing_input = format!("{}.{}", header_section, claims_section);
        let signature = self.sign(signing_input.as_bytes())?;

        debug!("Minted session token for {} (exp: {})", subject_id, claims.exp);
        Ok(format!("{}.{}", signing_input, token_codec::encode(&signature)))
    }

    /// Verifies a presented token and returns its identity fields. Fails with
    /// a distinct error per cause: malformed structure, signature mismatch,
    /// or expiry.
    pub fn verify(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        self.verify_at(token, Utc::now())
    }

    fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<AuthenticatedUser, AppError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(AppError::MalformedToken);
        }

        // Signature first: nothing in the payload is trusted until the MAC
        // over the two transmitted sections checks out.
        let signing_input = format!("{}.{}", parts[0], parts[1]);
        let expected = self.sign(signing_input.as_bytes())?;
        let presented = token_codec::decode(parts[2])?;
        if !bool::from(expected.ct_eq(&presented)) {
            return Err(AppError::InvalidSignature);
        }

        let header: TokenHeader =
            serde_json::from_slice(&token_codec::decode(parts[0])?).map_err(|_| AppError::MalformedToken)?;
        if header.alg != TOKEN_ALGORITHM || header.typ != TOKEN_TYPE {
            return Err(AppError::MalformedToken);
        }

        let claims: SessionClaims =
            serde_json::from_slice(&token_codec::decode(parts[1])?).map_err(|_| AppError::MalformedToken)?;

        if now.timestamp() >= claims.exp {
            debug!("Rejected expired session token for {}", claims.sub);
            return Err(AppError::ExpiredToken);
        }

        Ok(AuthenticatedUser {
            subject_id: claims.sub,
            external_id: claims.ext,
        })
    }

    fn sign(&self, input: &[u8]) -> Result<Vec<u8>, AppError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| AppError::Internal(format!("Failed to create HMAC: {}", e)))?;
        mac.update(input);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn service() -> SessionTokenService {
        SessionTokenService::new("test-signing-secret-0123456789abcdef").unwrap()
    }

    #[test]
    fn mint_then_verify_returns_the_same_identity() {
        let service = service();
        let token = service
            .mint("user-42", "user-42@idp.example.com", Duration::hours(1))
            .unwrap();

        let user = service.verify(&token).unwrap();
        assert_eq!(user.subject_id, "user-42");
        assert_eq!(user.external_id, "user-42@idp.example.com");
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(matches!(
            SessionTokenService::new("   "),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn wrong_part_count_is_malformed() {
        let service = service();
        assert!(matches!(service.verify("onlyone"), Err(AppError::MalformedToken)));
        assert!(matches!(service.verify("two.parts"), Err(AppError::MalformedToken)));
        assert!(matches!(
            service.verify("a.b.c.d"),
            Err(AppError::MalformedToken)
        ));
    }

    #[test]
    fn garbage_sections_are_malformed() {
        let service = service();
        assert!(matches!(
            service.verify("!!.??.@@"),
            Err(AppError::MalformedToken)
        ));
    }

    #[test]
    fn flipping_any_single_character_invalidates_the_token() {
        let service = service();
        let token = service
            .mint("user-42", "user-42@idp.example.com", Duration::hours(1))
            .unwrap();

        for index in 0..token.len() {
            let original = token.as_bytes()[index] as char;
            let replacement = if original == 'A' { 'B' } else { 'A' };
            if original == replacement {
                continue;
            }

            let mut tampered: Vec<u8> = token.as_bytes().to_vec();
            tampered[index] = replacement as u8;
            let tampered = String::from_utf8(tampered).unwrap();

            let result = service.verify(&tampered);
            assert!(
                matches!(
                    result,
                    Err(AppError::InvalidSignature) | Err(AppError::MalformedToken)
                ),
                "tampering at index {} was not rejected",
                index
            );
        }
    }

    #[test]
    fn zero_ttl_token_is_already_expired() {
        let service = service();
        let token = service.mint("user-42", "ext", Duration::zero()).unwrap();
        assert!(matches!(service.verify(&token), Err(AppError::ExpiredToken)));
    }

    #[test]
    fn zero_ttl_token_is_rejected_at_its_own_issue_instant() {
        let service = service();
        let now = Utc::now();
        let token = service.mint_at("user-42", "ext", Duration::zero(), now).unwrap();
        assert!(matches!(
            service.verify_at(&token, now),
            Err(AppError::ExpiredToken)
        ));
    }

    #[test]
    fn token_expires_after_its_ttl() {
        let service = service();
        let issued = Utc::now() - Duration::hours(2);
        let token = service
            .mint_at("user-42", "ext", Duration::hours(1), issued)
            .unwrap();
        assert!(matches!(service.verify(&token), Err(AppError::ExpiredToken)));
    }

    #[test]
    fn token_from_a_different_key_is_rejected() {
        let minting = SessionTokenService::new("first-secret-first-secret").unwrap();
        let verifying = SessionTokenService::new("second-secret-second-secret").unwrap();

        let token = minting.mint("user-42", "ext", Duration::hours(1)).unwrap();
        assert!(matches!(
            verifying.verify(&token),
            Err(AppError::InvalidSignature)
        ));
    }
}
