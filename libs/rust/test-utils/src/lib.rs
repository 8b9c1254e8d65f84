//! Shared test utilities for the signing-key and token crates.
//!
//! This crate provides:
//! - Proptest generators for key records, subjects and authorities
//! - Mock implementations of the clock and the rotation publisher
//! - Test fixtures: ready-to-use signing keys and claim sets

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod mocks;

pub use generators::*;
