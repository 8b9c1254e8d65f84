//! Auth Edge - bearer token verification against a rotating key set.
//!
//! The edge mirrors the issuer's public keys from rotation events into a
//! bounded local cache and verifies tokens against it with a type-state
//! pipeline. Authentication can optionally consult a token blacklist and a
//! user directory.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod authenticator;
pub mod config;
pub mod contracts;
pub mod distribution;
pub mod error;
pub mod jwt;

pub use authenticator::{
    extract_bearer, AuthContext, Authenticator, StrictCollaborators, AUTHORIZATION_HEADER,
    BEARER_PREFIX,
};
pub use config::{AuthMode, Config, ConfigError};
pub use contracts::{HistoryResolver, PublicKeyResolver, TokenBlacklist, UserDetails, UserDirectory};
pub use distribution::{spawn_rotation_listener, KeyDistributionCache};
pub use error::{AuthEdgeError, AuthenticationFailure, ErrorCode};
pub use jwt::{ClaimRequirements, Claims, Token, TokenVerifier, Validated};
