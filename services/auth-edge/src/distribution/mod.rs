//! Verifier-side mirror of the issuer's public keys.
//!
//! The issuer announces each rotation with a [`key_common::RotationEvent`];
//! the cache applies events idempotently and the listener feeds it from a
//! broadcast channel.

mod cache;
mod listener;

pub use cache::KeyDistributionCache;
pub use listener::spawn_rotation_listener;
