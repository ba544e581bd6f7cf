use derive_more::Display;
use serde::{Deserialize, Serialize};

/// The side of the marketplace an entrant signs up for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Role {
    #[display(fmt = "customer")]
    Customer,
    #[display(fmt = "provider")]
    Provider,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Provider => "provider",
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "customer" => Ok(Self::Customer),
            "provider" => Ok(Self::Provider),
            _ => Err("Role must be either 'customer' or 'provider'".into()),
        }
    }
}

impl From<Role> for &'static str {
    fn from(value: Role) -> Self {
        value.as_str()
    }
}
