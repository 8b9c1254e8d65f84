//! Token request builder.

use jsonwebtoken::Header;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::TokenError;
use crate::jwt::claims::RESERVED_CLAIMS;

/// Default token type tag.
pub const ACCESS_TOKEN_TYPE: &str = "access";

/// Everything needed to issue one token.
///
/// Issuance time, expiry and issuer come from the issuer; the algorithm and
/// key id come from the active signing key.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenRequest {
    pub(crate) subject: String,
    pub(crate) audience: Option<String>,
    pub(crate) token_type: String,
    pub(crate) validity_minutes: Option<i64>,
    pub(crate) header_params: BTreeMap<String, String>,
    pub(crate) authorities: BTreeSet<String>,
    pub(crate) claims: Map<String, Value>,
}

impl TokenRequest {
    /// Start a request for `subject`.
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            audience: None,
            token_type: ACCESS_TOKEN_TYPE.to_string(),
            validity_minutes: None,
            header_params: BTreeMap::new(),
            authorities: BTreeSet::new(),
            claims: Map::new(),
        }
    }

    /// Set the audience; the issuer's default applies otherwise.
    #[must_use]
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Set the token type tag.
    #[must_use]
    pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = token_type.into();
        self
    }

    /// Set the validity; the issuer's default applies otherwise.
    #[must_use]
    pub const fn validity_minutes(mut self, minutes: i64) -> Self {
        self.validity_minutes = Some(minutes);
        self
    }

    /// Add a header parameter.
    ///
    /// Only `typ`, `cty`, `jku`, `x5u`, `x5t` and `x5t#S256` are accepted at
    /// issuance; `alg` and `kid` always come from the signing key.
    #[must_use]
    pub fn header_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.header_params.insert(name.into(), value.into());
        self
    }

    /// Grant an authority.
    #[must_use]
    pub fn authority(mut self, authority: impl Into<String>) -> Self {
        self.authorities.insert(authority.into());
        self
    }

    /// Grant several authorities.
    #[must_use]
    pub fn authorities<I, S>(mut self, authorities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authorities.extend(authorities.into_iter().map(Into::into));
        self
    }

    /// Add a custom claim.
    #[must_use]
    pub fn claim(mut self, name: impl Into<String>, value: Value) -> Self {
        self.claims.insert(name.into(), value);
        self
    }

    /// Subject of the token.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub(crate) fn validate(&self) -> Result<(), TokenError> {
        if self.subject.trim().is_empty() {
            return Err(TokenError::InvalidRequest("subject is required".to_string()));
        }
        if self.token_type.trim().is_empty() {
            return Err(TokenError::InvalidRequest("token type is required".to_string()));
        }
        if let Some(reserved) = self
            .claims
            .keys()
            .find(|name| RESERVED_CLAIMS.contains(&name.as_str()))
        {
            return Err(TokenError::InvalidRequest(format!(
                "claim {reserved} is set by the issuer"
            )));
        }
        Ok(())
    }

    pub(crate) fn build_header(&self) -> Result<Header, TokenError> {
        let mut header = Header::default();
        for (name, value) in &self.header_params {
            match name.as_str() {
                "typ" => header.typ = Some(value.clone()),
                "cty" => header.cty = Some(value.clone()),
                "jku" => header.jku = Some(value.clone()),
                "x5u" => header.x5u = Some(value.clone()),
                "x5t" => header.x5t = Some(value.clone()),
                "x5t#S256" => header.x5t_s256 = Some(value.clone()),
                "alg" | "kid" => {
                    return Err(TokenError::InvalidHeader(format!(
                        "{name} is set by the signing key"
                    )))
                }
                other => {
                    return Err(TokenError::InvalidHeader(format!(
                        "unsupported header parameter {other}"
                    )))
                }
            }
        }
        Ok(header)
    }
}
