use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    api,
    catalog::{client, department, device, reason, Contact},
};

pub use crate::ticket::{Close, Draft, Id, Patch, Status};

/// Denormalized list row: what list screens show without the full record.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: Id,
    pub number: i64,
    pub urgent: bool,
    pub status: Status,
    /// Reason title.
    pub reason: Option<String>,
    pub result: Option<String>,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub assigned_end: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub work_started_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub work_finished_at: Option<OffsetDateTime>,
    /// Executor display name.
    pub executor: Option<String>,
    /// Department title.
    pub department: Option<String>,
    pub device_serial_number: Option<String>,
    pub device_model: Option<String>,
    pub client_name: Option<String>,
    pub client_address: Option<String>,
}

/// Full ticket record with its references resolved.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Details {
    pub id: Id,
    pub number: i64,
    pub ticket_type: String,
    pub status: Status,
    pub urgent: bool,
    pub reason_id: reason::Id,
    /// Reason phrased for the current status: future tense while pending,
    /// present while in work, past once done.
    pub reason: Option<String>,
    pub description: Option<String>,
    pub result: Option<String>,
    pub recommendation: Option<String>,
    pub used_materials: Vec<String>,
    pub double_signed: bool,
    pub reference_ticket: Option<Id>,

    pub author: Option<api::User>,
    pub assigned_by: Option<api::User>,
    pub executor: Option<api::User>,
    pub department_id: Option<department::Id>,
    pub department: Option<String>,
    pub client: Option<ClientRef>,
    pub device: Option<DeviceRef>,
    pub contact_person: Option<Contact>,

    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub assigned_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub planned_start: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub planned_end: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub assigned_start: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub assigned_end: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub work_started_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub work_finished_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub closed_at: Option<OffsetDateTime>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRef {
    pub id: client::Id,
    pub name: String,
    pub address: String,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRef {
    pub id: device::Id,
    pub serial_number: String,
    pub model: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Closed {
    pub ticket: Details,
    pub follow_up: Option<Details>,
}
