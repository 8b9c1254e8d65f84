//! Token claims, requests and issuance.

pub mod builder;
pub mod claims;
pub mod issuer;

pub use builder::TokenRequest;
pub use claims::{Claims, RESERVED_CLAIMS};
pub use issuer::{IssuedToken, TokenIssuer};
