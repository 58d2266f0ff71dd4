//! Credential codec: issues and verifies compact HS256 bearer tokens.
//!
//! Wire format is the usual three dot-separated URL-safe base64 segments
//! (header, claims, signature). Verification is a pure function of the token
//! and the shared secret, so a single codec is shared by every worker
//! without locking.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use tracing::warn;

use crate::claims::{Claims, TokenError, WireClaims};
use crate::roles::{Role, canonical_roles};

pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

impl core::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8], lifetime: Duration) -> Self {
        // Expiry is checked by the caller against an explicit `now` so the
        // boundary is exact; the library only checks the signature and shape.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            lifetime,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Build and sign a token for `subject` valid from `now` for the configured lifetime.
    ///
    /// Roles are embedded as `ROLE_*` authorities in canonical (sorted, deduped) order.
    pub fn issue(
        &self,
        subject: &str,
        roles: &[Role],
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        if subject.trim().is_empty() {
            return Err(TokenError::EmptySubject);
        }

        let exp = now
            .checked_add_signed(self.lifetime)
            .filter(|exp| *exp > now)
            .ok_or_else(|| TokenError::Encoding("token expiry out of range".to_string()))?;

        let claims = WireClaims {
            sub: subject.to_string(),
            roles: canonical_roles(roles).iter().map(Role::authority).collect(),
            iat: now,
            exp,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verify the signature and decode the claim set.
    ///
    /// Does not check expiry. Tampering, a foreign secret, or algorithm
    /// substitution yields [`TokenError::InvalidSignature`]; anything that does
    /// not parse yields [`TokenError::Malformed`].
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        if token.split('.').count() != 3 {
            return Err(TokenError::Malformed);
        }

        let data = jsonwebtoken::decode::<WireClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidAlgorithmName => {
                    warn!(kind = ?e.kind(), "token signature rejected");
                    TokenError::InvalidSignature
                }
                _ => TokenError::Malformed,
            })?;

        Claims::from_wire(data.claims)
    }

    /// Verify and additionally reject tokens at or past their expiry.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let claims = self.verify(token)?;
        if claims.is_expired(now) {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use proptest::prelude::*;

    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET, Duration::hours(1))
    }

    #[test]
    fn issued_token_has_three_segments() {
        let token = codec().issue("alice", &[Role::User], t0()).unwrap();
        assert_eq!(token.split('.').count(), 3);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        );
    }

    #[test]
    fn claims_carry_prefixed_roles_and_lifetime() {
        let codec = codec();
        let token = codec.issue("alice", &[Role::Admin, Role::User], t0()).unwrap();
        let claims = codec.verify(&token).unwrap();

        assert_eq!(claims.subject(), "alice");
        assert_eq!(claims.authorities(), vec!["ROLE_USER", "ROLE_ADMIN"]);
        assert_eq!(claims.issued_at(), t0());
        assert_eq!(claims.expires_at(), t0() + Duration::hours(1));
    }

    #[test]
    fn empty_subject_is_refused() {
        assert_eq!(
            codec().issue("  ", &[Role::User], t0()),
            Err(TokenError::EmptySubject)
        );
    }

    #[test]
    fn unrepresentable_lifetimes_fail_instead_of_panicking() {
        let huge = TokenCodec::new(SECRET, Duration::seconds(1_000_000_000_000_000));
        assert!(matches!(
            huge.issue("alice", &[Role::User], t0()),
            Err(TokenError::Encoding(_))
        ));

        let negative = TokenCodec::new(SECRET, Duration::seconds(-1));
        assert!(matches!(
            negative.issue("alice", &[Role::User], t0()),
            Err(TokenError::Encoding(_))
        ));
    }

    #[test]
    fn expiry_boundary_is_exact() {
        let codec = codec();
        let token = codec.issue("alice", &[Role::User], t0()).unwrap();
        let lifetime = codec.lifetime();

        assert!(codec.verify_at(&token, t0() + lifetime - Duration::seconds(1)).is_ok());
        assert_eq!(
            codec.verify_at(&token, t0() + lifetime),
            Err(TokenError::Expired)
        );
        assert_eq!(
            codec.verify_at(&token, t0() + lifetime + Duration::days(3)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn foreign_secret_is_an_invalid_signature() {
        let token = codec().issue("alice", &[Role::User], t0()).unwrap();
        let other = TokenCodec::new(b"another-secret-another-secret-00", Duration::hours(1));
        assert_eq!(other.verify(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn structural_garbage_is_malformed() {
        let codec = codec();
        assert_eq!(codec.verify(""), Err(TokenError::Malformed));
        assert_eq!(codec.verify("abc"), Err(TokenError::Malformed));
        assert_eq!(codec.verify("a.b"), Err(TokenError::Malformed));
        assert_eq!(codec.verify("a.b.c.d"), Err(TokenError::Malformed));
        assert_eq!(codec.verify("!!.??.**"), Err(TokenError::Malformed));
    }

    #[test]
    fn alg_none_is_rejected() {
        use base64::Engine;
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;

        let token = codec().issue("alice", &[Role::Admin], t0()).unwrap();
        let payload = token.split('.').nth(1).unwrap();
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let forged = format!("{header}.{payload}.");

        assert!(codec().verify(&forged).is_err());
    }

    fn role_subset() -> impl Strategy<Value = Vec<Role>> {
        proptest::sample::subsequence(Role::ALL.to_vec(), 0..=Role::ALL.len())
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 64,
            .. ProptestConfig::default()
        })]

        #[test]
        fn round_trip_preserves_subject_and_roles(
            subject in "[a-z][a-z0-9_]{0,11}",
            roles in role_subset(),
        ) {
            let codec = codec();
            let token = codec.issue(&subject, &roles, t0()).unwrap();
            let claims = codec.verify(&token).unwrap();

            prop_assert_eq!(claims.subject(), subject.as_str());
            let mut expected = roles.clone();
            expected.sort();
            prop_assert_eq!(claims.roles(), expected.as_slice());
        }

        #[test]
        fn single_byte_tamper_never_verifies(
            index in any::<proptest::sample::Index>(),
            replacement in proptest::char::range('!', '~'),
        ) {
            let codec = codec();
            let token = codec.issue("alice", &[Role::User], t0()).unwrap();
            let mut bytes = token.into_bytes();
            let i = index.index(bytes.len());
            prop_assume!(bytes[i] != replacement as u8);
            bytes[i] = replacement as u8;
            let tampered = String::from_utf8(bytes).unwrap();

            let err = codec.verify(&tampered).unwrap_err();
            prop_assert!(matches!(err, TokenError::InvalidSignature | TokenError::Malformed));
        }
    }
}
