//! Reference entities the ticket engine points at but does not own.
//!
//! Users, departments, clients, devices, contacts and the reason taxonomy are
//! maintained elsewhere; tickets only carry their ids and the engine reads
//! them back to render cards and detail records.

use std::collections::HashMap;

use itertools::Itertools as _;
use serde::{Deserialize, Serialize};

use crate::ticket::{self, Ticket};

pub mod user {
    use serde::{Deserialize, Serialize};

    uuid_id!(
        /// Staff account id, as issued by the identity collaborator.
        Id
    );

    #[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Role {
        /// Field engineer: sees the tickets assigned to them.
        User,

        /// Sees every ticket of their department.
        Coordinator,

        #[serde(other)]
        Other,
    }
}

pub mod department {
    uuid_id!(Id);
}

pub mod client {
    uuid_id!(Id);
}

pub mod device {
    uuid_id!(Id);
}

pub mod contact {
    uuid_id!(Id);
}

pub mod reason {
    use derive_more::Display;
    use serde::{Deserialize, Serialize};

    /// Reasons are keyed by short textual codes rather than uuids.
    #[derive(
        Clone,
        Debug,
        Default,
        Deserialize,
        Display,
        Eq,
        Hash,
        Ord,
        PartialEq,
        PartialOrd,
        Serialize,
    )]
    #[serde(transparent)]
    pub struct Id(String);

    impl Id {
        pub fn as_str(&self) -> &str {
            &self.0
        }
    }

    impl From<&str> for Id {
        fn from(value: &str) -> Self {
            Self(value.to_owned())
        }
    }

    impl From<String> for Id {
        fn from(value: String) -> Self {
            Self(value)
        }
    }
}

#[derive(Clone, Debug)]
pub struct User {
    pub id: user::Id,
    pub first_name: String,
    pub last_name: String,
    pub department: Option<department::Id>,
    /// Last ticket this user touched through a lifecycle update.
    pub latest_ticket: Option<ticket::Id>,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_owned()
    }
}

#[derive(Clone, Debug)]
pub struct Department {
    pub id: department::Id,
    pub title: String,
}

#[derive(Clone, Debug)]
pub struct Client {
    pub id: client::Id,
    pub title: String,
    pub address: String,
}

#[derive(Clone, Debug)]
pub struct Device {
    pub id: device::Id,
    pub serial_number: String,
    /// Title of the device's classificator (its model).
    pub model: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Contact {
    pub id: contact::Id,
    pub name: String,
    pub position: Option<String>,
    pub phone: String,
    pub email: String,
}

/// Entry of the reason taxonomy.
///
/// Besides the title a reason carries three phrasings of the same work, so a
/// ticket can describe it as planned, ongoing or done depending on its status.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Reason {
    pub id: reason::Id,
    pub title: String,
    pub past: Option<String>,
    pub present: Option<String>,
    pub future: Option<String>,
}

impl Reason {
    /// The phrasing matching where a ticket in `status` stands: future
    /// while pending, present while in work, past once finished.
    pub fn phrased_for(&self, status: ticket::Status) -> Option<&str> {
        use ticket::Status as S;

        match status {
            S::Created | S::Assigned => self.future.as_deref(),
            S::InWork | S::Cancelled => self.present.as_deref(),
            S::WorksDone | S::Closed => self.past.as_deref(),
        }
    }
}

/// Ids to resolve in one [`Store::catalog`] round trip.
///
/// [`Store::catalog`]: crate::store::Store::catalog
#[derive(Clone, Debug, Default)]
pub struct Keys {
    pub users: Vec<user::Id>,
    pub departments: Vec<department::Id>,
    pub clients: Vec<client::Id>,
    pub devices: Vec<device::Id>,
    pub reasons: Vec<reason::Id>,
}

impl Keys {
    /// Everything a card of each of `tickets` shows.
    pub fn for_cards(tickets: &[Ticket]) -> Self {
        Self {
            users: tickets.iter().filter_map(|t| t.executor).unique().collect(),
            departments: tickets
                .iter()
                .filter_map(|t| t.department)
                .unique()
                .collect(),
            clients: tickets.iter().map(|t| t.client).unique().collect(),
            devices: tickets.iter().map(|t| t.device).unique().collect(),
            reasons: tickets
                .iter()
                .map(|t| t.reason.clone())
                .unique()
                .collect(),
        }
    }
}

/// Resolved reference entities, keyed by id. Ids that do not exist are
/// simply absent.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    pub users: HashMap<user::Id, User>,
    pub departments: HashMap<department::Id, Department>,
    pub clients: HashMap<client::Id, Client>,
    pub devices: HashMap<device::Id, Device>,
    pub reasons: HashMap<reason::Id, Reason>,
}
