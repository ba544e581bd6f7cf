pub mod email;
pub mod name;
pub mod role;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use self::email::Email;
use self::name::Name;
use self::role::Role;

/// A validated join request that has not been admitted yet.
#[derive(Debug)]
pub struct NewSubscriber {
    pub name: Name,
    pub email: Email,
    pub role: Role,
}

/// A persisted waitlist entrant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub name: Name,
    pub email: Email,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

impl Subscriber {
    /// Admit a new subscriber now.
    ///
    /// The timestamp is truncated to microseconds, which is the finest
    /// resolution every store backend can hold.
    pub fn admit(new_subscriber: NewSubscriber) -> Self {
        Self {
            name: new_subscriber.name,
            email: new_subscriber.email,
            role: new_subscriber.role,
            joined_at: Utc::now().trunc_subsecs(6),
        }
    }
}
