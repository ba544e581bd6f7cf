use derive_more::Display;
use serde::{Deserialize, Serialize};
use validator::validate_email;

/// A syntactically valid, normalized email address.
///
/// Addresses are trimmed and lower-cased, so the value can be used directly as
/// the identity key of a subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[display(fmt = "{}", _0)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    /// Normalize a raw address into the form used as a store key, without
    /// checking its syntax.
    pub fn normalize(raw: &str) -> String {
        raw.trim().to_lowercase()
    }
}

impl TryFrom<String> for Email {
    type Error = String;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        let value = Self::normalize(&value);
        if validate_email(&value) {
            Ok(Self(value))
        } else {
            Err("Please provide a valid email address".into())
        }
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
