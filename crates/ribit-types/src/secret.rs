//! Redacting wrapper for sensitive configuration values.
//!
//! [`SecretString`] holds the Matrix access token so that it cannot leak
//! through `Debug` formatting, log output, or re-serialized config dumps.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A string that is redacted everywhere except [`reveal`](SecretString::reveal).
///
/// - `Debug` and `Display` print `[redacted]` (empty values print as empty)
/// - `Serialize` always emits `""`
/// - `Deserialize` accepts a plain string
#[derive(Clone, Default)]
pub struct SecretString(String);

impl SecretString {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The actual value. Call only at the point of use (e.g. when
    /// building an Authorization header).
    pub fn reveal(&self) -> &str {
        &self.0
    }

    /// Whether no value is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("\"\"")
        } else {
            f.write_str("\"[redacted]\"")
        }
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            Ok(())
        } else {
            f.write_str("[redacted]")
        }
    }
}

impl Serialize for SecretString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(SecretString(String::deserialize(deserializer)?))
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        SecretString(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        SecretString(s.to_owned())
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
