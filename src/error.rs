use std::{error::Error as StdError, fmt};

use derive_more::From;

use crate::{
    catalog::{client, contact, department, device, reason, user},
    ticket,
};

/// Failure of a ticket operation, shared by the engine and every store.
#[derive(Debug, From)]
pub enum Error {
    /// Caller-supplied input is incomplete or not allowed.
    #[from]
    Validation(Invalid),

    /// A record the operation requires does not exist.
    #[from]
    NotFound(Missing),

    /// The ticket is not in a state that allows the requested transition.
    #[from]
    Conflict(ticket::InvalidTransition),

    /// The database failed. Passed through as is; nothing is retried.
    #[from]
    Storage(tokio_postgres::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(e) => write!(f, "validation failed: {e}"),
            Self::NotFound(e) => write!(f, "{e} not found"),
            Self::Conflict(e) => e.fmt(f),
            Self::Storage(e) => write!(f, "storage failure: {e}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Storage(e) => Some(e),
            Self::Validation(_) | Self::NotFound(_) | Self::Conflict(_) => None,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Invalid {
    MissingField(&'static str),
    ImmutableDepartment,
    ClosedAtWithoutTerminalStatus,
    UnknownField(String),
    MalformedFilters(String),
}

impl fmt::Display for Invalid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(name) => write!(f, "`{name}` is required"),
            Self::ImmutableDepartment => {
                f.write_str("department cannot be changed after creation")
            }
            Self::ClosedAtWithoutTerminalStatus => {
                f.write_str("`closedAt` requires a closed or cancelled status")
            }
            Self::UnknownField(field) => {
                write!(f, "tickets cannot be searched by `{field}`")
            }
            Self::MalformedFilters(e) => write!(f, "malformed filters: {e}"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Missing {
    Ticket(ticket::Id),
    User(user::Id),
    Department(department::Id),
    Client(client::Id),
    Device(device::Id),
    Contact(contact::Id),
    Reason(reason::Id),
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ticket(id) => write!(f, "ticket {id}"),
            Self::User(id) => write!(f, "user {id}"),
            Self::Department(id) => write!(f, "department {id}"),
            Self::Client(id) => write!(f, "client {id}"),
            Self::Device(id) => write!(f, "device {id}"),
            Self::Contact(id) => write!(f, "contact {id}"),
            Self::Reason(id) => write!(f, "reason `{id}`"),
        }
    }
}
