//! Token Service library.
//!
//! Provides signing-key generation and rotation, token issuance, rotation
//! event publishing and JWKS projection of the public key history.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod jwks;
pub mod jwt;
pub mod signing;

// Re-exports for convenience
pub use config::{Config, KeyIdStrategy, KeySpec};
pub use error::TokenError;
pub use jwt::{IssuedToken, TokenIssuer, TokenRequest};
pub use signing::{ActiveSigningKey, KeyRotationService, RotationTrigger, SigningKeyManager};
