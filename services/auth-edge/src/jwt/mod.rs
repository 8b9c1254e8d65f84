//! Token parsing, claims and verification.

pub mod claims;
pub mod token;
pub mod verifier;

pub use claims::{Audience, Claims, Presence};
pub use token::{ClaimRequirements, SignatureValidated, Token, TokenState, Unvalidated, Validated};
pub use verifier::{TokenHeader, TokenVerifier};
