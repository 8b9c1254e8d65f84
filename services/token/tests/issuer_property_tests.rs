//! Property-based tests for token issuance.
//!
//! Uses proptest with 20 iterations per property; each case signs a real token.

use jsonwebtoken::{decode, decode_header, Validation};
use key_common::{InMemoryKeyHistory, SigningAlgorithm};
use proptest::prelude::*;
use std::sync::Arc;
use test_utils::{
    audience_strategy, authorities_strategy, subject_strategy, validity_minutes_strategy,
};
use token_service::jwt::Claims;
use token_service::{KeySpec, SigningKeyManager, TokenIssuer, TokenRequest};

fn issuer() -> (Arc<SigningKeyManager>, TokenIssuer) {
    let manager = Arc::new(SigningKeyManager::new(
        KeySpec::new(SigningAlgorithm::ES256, 2048),
        Arc::new(InMemoryKeyHistory::new(3).unwrap()),
    ));
    manager.rotate().unwrap();
    let issuer =
        TokenIssuer::new(Arc::clone(&manager), "https://auth.example.com", "default-api", 15);
    (manager, issuer)
}

fn relaxed_validation() -> Validation {
    let mut validation = Validation::new(jsonwebtoken::Algorithm::ES256);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    validation
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// Issued tokens verify with the active public key and carry the request.
    #[test]
    fn prop_issued_token_round_trips(
        subject in subject_strategy(),
        audience in audience_strategy(),
        authorities in authorities_strategy(),
        validity in validity_minutes_strategy(),
    ) {
        let (manager, issuer) = issuer();

        let issued = issuer
            .issue(
                TokenRequest::new(subject.clone())
                    .audience(audience.clone())
                    .authorities(authorities.clone())
                    .validity_minutes(validity),
            )
            .unwrap();

        let record = manager.active_public_key().unwrap();
        let header = decode_header(&issued.token).unwrap();
        prop_assert_eq!(header.kid.as_deref(), Some(record.kid()));

        let key = record.decoding_key().unwrap();
        let decoded = decode::<Claims>(&issued.token, &key, &relaxed_validation())
            .unwrap()
            .claims;
        prop_assert_eq!(&decoded.sub, &subject);
        prop_assert_eq!(&decoded.aud, &audience);
        prop_assert_eq!(&decoded.authorities, &authorities);
        prop_assert_eq!(decoded.exp - decoded.iat, validity * 60);
    }
}

#[test]
fn test_tokens_signed_before_rotation_verify_with_history() {
    let (manager, issuer) = issuer();
    let old = issuer.issue(TokenRequest::new("user-1")).unwrap();

    manager.rotate().unwrap();
    let new = issuer.issue(TokenRequest::new("user-1")).unwrap();

    assert_ne!(old.kid, new.kid);
    let history = manager.key_history();
    for issued in [&old, &new] {
        let record = history.iter().find(|r| r.kid() == issued.kid).unwrap();
        let key = record.decoding_key().unwrap();
        let decoded = decode::<Claims>(&issued.token, &key, &relaxed_validation());
        assert!(decoded.is_ok());
    }
}

#[test]
fn test_rsa_and_pss_tokens_verify() {
    for algorithm in [SigningAlgorithm::RS256, SigningAlgorithm::PS384] {
        let manager = Arc::new(SigningKeyManager::new(
            KeySpec::new(algorithm, 2048),
            Arc::new(InMemoryKeyHistory::new(1).unwrap()),
        ));
        let record = manager.rotate().unwrap();
        let issued = TokenIssuer::new(Arc::clone(&manager), "iss", "aud", 5)
            .issue(TokenRequest::new("user"))
            .unwrap();

        let mut validation = relaxed_validation();
        validation.algorithms = vec![algorithm.jwt_algorithm()];
        let decoded = decode::<Claims>(&issued.token, &record.decoding_key().unwrap(), &validation);
        assert!(decoded.is_ok(), "{algorithm} token failed to verify");
    }
}
