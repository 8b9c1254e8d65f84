//! JSON Web Key Set projection of the key history.

pub mod publisher;

pub use publisher::{Jwk, Jwks, JwksPublisher};
