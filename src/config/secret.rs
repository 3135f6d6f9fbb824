//! Secret configuration values
//!
//! Connection strings and storage keys are held in `secrecy::Secret`, so
//! they are zeroed on drop, redacted in `Debug` output, and only readable
//! through `expose_secret()`.
//!
//! ```rust
//! use secrecy::ExposeSecret;
//! use tidemark::config::secret_string;
//!
//! let dsn = secret_string("postgresql://etl:pw@db/app".to_string());
//! assert_eq!(dsn.expose_secret().as_str(), "postgresql://etl:pw@db/app");
//! assert!(!format!("{:?}", dsn).contains("pw@"));
//! ```

use secrecy::{CloneableSecret, DebugSecret, Secret, SerializableSecret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

/// String payload of a [`SecretString`]
///
/// There is no `Display`; the value is read through `as_str()` after an
/// explicit `expose_secret()`.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SecretValue(String);

impl CloneableSecret for SecretValue {}
impl DebugSecret for SecretValue {}
impl SerializableSecret for SecretValue {}

impl SecretValue {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Serialize for SecretValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretValue)
    }
}

/// A configuration string that is redacted in logs and zeroed on drop
pub type SecretString = Secret<SecretValue>;

/// Wraps a plain string read from an environment override
#[inline]
pub fn secret_string(value: String) -> SecretString {
    Secret::new(SecretValue(value))
}
