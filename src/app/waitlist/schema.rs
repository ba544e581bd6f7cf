use serde::{Deserialize, Serialize};

use crate::domain::subscriber::{NewSubscriber, Subscriber};

/// Missing fields deserialize as empty strings so that they are reported by
/// the same validation as blank ones.
#[derive(Deserialize)]
pub struct JoinRequestBody {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
}

impl TryFrom<JoinRequestBody> for NewSubscriber {
    type Error = String;
    fn try_from(value: JoinRequestBody) -> Result<Self, Self::Error> {
        let name = value.name.try_into()?;
        let email = value.email.try_into()?;
        let role = value.role.try_into()?;
        Ok(Self { name, email, role })
    }
}

#[derive(Serialize)]
pub struct JoinResponseBody {
    pub success: bool,
    pub message: String,
    pub count: u64,
}

#[derive(Serialize)]
pub struct CountResponseBody {
    pub count: u64,
}

#[derive(Serialize)]
pub struct SubscribersResponseBody {
    pub subscribers: Vec<Subscriber>,
}

#[derive(Serialize)]
pub struct SubscribersFailureBody {
    pub success: bool,
    pub message: String,
    pub subscribers: Vec<Subscriber>,
}

#[derive(Serialize)]
pub struct DeleteResponseBody {
    pub success: bool,
    pub message: String,
}

#[derive(Deserialize)]
pub struct BulkEmailRequestBody {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub emails: Vec<String>,
}

#[derive(Serialize)]
pub struct BulkEmailResponseBody {
    pub success: bool,
    pub message: String,
    pub sent: Vec<String>,
    pub failed: Vec<FailedRecipient>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct FailedRecipient {
    pub email: String,
    pub error: String,
}
