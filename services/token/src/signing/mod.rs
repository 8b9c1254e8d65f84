//! Signing key generation, lifecycle and rotation.

pub mod key_pair;
pub mod manager;
pub mod rotation;

pub use key_pair::ActiveKeyPair;
pub use manager::{ActiveSigningKey, SigningKeyManager};
pub use rotation::{KeyRotationService, RotationTrigger};
