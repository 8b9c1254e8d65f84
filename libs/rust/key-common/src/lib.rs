//! Shared signing-key primitives for the auth-platform issuer and its verifiers.
//!
//! This crate provides:
//! - `KeyRecord` public key metadata and the supported signing algorithms
//! - `KeyHistory`, the bounded FIFO retention contract, with in-memory and
//!   file-backed implementations
//! - `RotationEvent` and the publisher contract used to propagate new keys
//! - Clock abstraction and tracing setup

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod error;
pub mod events;
pub mod history;
pub mod model;
pub mod tracing_config;

pub use clock::{Clock, SystemClock};
pub use error::KeyError;
pub use events::{BroadcastRotationChannel, RotationEvent, RotationPublisher};
pub use history::{Admission, FileKeyHistory, InMemoryKeyHistory, KeyHistory};
pub use model::{KeyFamily, KeyRecord, SigningAlgorithm, MIN_KEY_SIZE_BITS};
pub use tracing_config::{init_tracing, TracingConfig, AUDIT_TARGET};
