//! Claims of a verified token.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Whether an extracted value counts as present.
///
/// Empty strings, collections and maps count as absent, the same as a
/// missing claim.
pub trait Presence {
    /// `false` for empty values.
    fn is_present(&self) -> bool;
}

impl Presence for String {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl Presence for &str {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl<T> Presence for Vec<T> {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl<T> Presence for BTreeSet<T> {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl<T, S> Presence for HashSet<T, S> {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl<K, V> Presence for BTreeMap<K, V> {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl<K, V, S> Presence for HashMap<K, V, S> {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl Presence for Map<String, Value> {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl Presence for Value {
    fn is_present(&self) -> bool {
        match self {
            Self::Null => false,
            Self::String(s) => s.is_present(),
            Self::Array(items) => items.is_present(),
            Self::Object(map) => map.is_present(),
            Self::Bool(_) | Self::Number(_) => true,
        }
    }
}

impl Presence for i64 {
    fn is_present(&self) -> bool {
        true
    }
}

impl Presence for bool {
    fn is_present(&self) -> bool {
        true
    }
}

impl Presence for Audience {
    fn is_present(&self) -> bool {
        self.iter().any(|aud| !aud.is_empty())
    }
}

/// `aud` claim, a single string or an array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// `"aud": "orders-api"`
    Single(String),
    /// `"aud": ["orders-api", "billing-api"]`
    Many(Vec<String>),
}

impl Default for Audience {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl Audience {
    /// Iterate over the audience values.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let values: &[String] = match self {
            Self::Single(aud) => std::slice::from_ref(aud),
            Self::Many(auds) => auds,
        };
        values.iter().map(String::as_str)
    }

    /// Whether `audience` is one of the values.
    #[must_use]
    pub fn contains(&self, audience: &str) -> bool {
        self.iter().any(|aud| aud == audience)
    }
}

/// Claims as read back from a token.
///
/// Registered claims the issuer always writes are typed; everything else
/// lands in `custom`. Missing registered claims deserialize to empty values
/// and fail validation later instead of failing the decode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer
    #[serde(default)]
    pub iss: String,
    /// Subject
    #[serde(default)]
    pub sub: String,
    /// Audience
    #[serde(default)]
    pub aud: Audience,
    /// Issued-at, seconds since the epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Expiry, seconds since the epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Granted authorities
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub authorities: BTreeSet<String>,
    /// Every other claim
    #[serde(flatten)]
    pub custom: Map<String, Value>,
}

impl Claims {
    /// Token type tag, if the issuer set one.
    #[must_use]
    pub fn token_type(&self) -> Option<&str> {
        self.custom.get("token_type").and_then(Value::as_str)
    }

    /// Whether the token grants any of `required`.
    #[must_use]
    pub fn grants_any<'a, I>(&self, required: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        required
            .into_iter()
            .any(|authority| self.authorities.contains(authority))
    }
}
