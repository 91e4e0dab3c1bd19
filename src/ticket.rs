//! The ticket record and the rules that mutate it.
//!
//! Every change of a stored ticket goes through [`Patch::apply`] or
//! [`Close::apply`], both of which consult [`Status::check_transition`], so
//! the lifecycle is enforced in one place whatever backend persists it.

use std::fmt;

use enum_utils::TryFromRepr;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    api::timestamp,
    catalog::{client, contact, department, device, reason, user},
    Error, Invalid, Missing,
};

uuid_id!(Id);

#[derive(Clone, Debug, PartialEq)]
pub struct Ticket {
    pub id: Id,
    /// Human-readable sequence number assigned by the store.
    pub number: i64,
    pub ticket_type: String,
    pub reason: reason::Id,
    pub urgent: bool,

    pub client: client::Id,
    pub device: device::Id,
    pub contact_person: Option<contact::Id>,
    pub author: user::Id,
    /// Inherited from the author on creation and never changed afterwards.
    pub department: Option<department::Id>,
    pub assigned_by: Option<user::Id>,
    pub executor: Option<user::Id>,

    pub created_at: OffsetDateTime,
    pub assigned_at: Option<OffsetDateTime>,
    pub planned_start: Option<OffsetDateTime>,
    pub planned_end: Option<OffsetDateTime>,
    pub assigned_start: Option<OffsetDateTime>,
    pub assigned_end: Option<OffsetDateTime>,
    pub work_started_at: Option<OffsetDateTime>,
    pub work_finished_at: Option<OffsetDateTime>,
    pub closed_at: Option<OffsetDateTime>,

    pub status: Status,
    pub result: Option<String>,
    pub recommendation: Option<String>,
    pub used_materials: Vec<String>,
    pub description: Option<String>,

    /// Ticket whose closure spawned this one.
    pub reference_ticket: Option<Id>,
    pub double_signed: bool,
}

impl Ticket {
    pub fn references(&self) -> References<'_> {
        References {
            client: self.client,
            device: self.device,
            reason: &self.reason,
            author: self.author,
            department: self.department,
            assigned_by: self.assigned_by,
            executor: self.executor,
            contact_person: self.contact_person,
        }
    }

    /// Whether the committed window has passed while work is still open.
    pub fn is_overdue(&self, now: OffsetDateTime) -> bool {
        !self.status.is_terminal()
            && self.assigned_end.is_some_and(|end| end < now)
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    PartialEq,
    Serialize,
    TryFromRepr,
)]
#[repr(u8)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    /// Registered, nobody is assigned yet.
    Created = 1,

    /// An executor and a time window are assigned.
    Assigned = 2,

    /// The executor is on site.
    InWork = 3,

    /// Work is finished and awaits closure.
    WorksDone = 4,

    /// Result is recorded. Terminal.
    Closed = 5,

    /// Dropped before completion. Terminal.
    Cancelled = 6,
}

impl Status {
    pub const ALL: [Self; 6] = [
        Self::Created,
        Self::Assigned,
        Self::InWork,
        Self::WorksDone,
        Self::Closed,
        Self::Cancelled,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Assigned => "assigned",
            Self::InWork => "inWork",
            Self::WorksDone => "worksDone",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Checks `self -> to` against the lifecycle:
    ///
    /// ```text
    /// created -> assigned -> inWork -> worksDone -> closed
    ///    \__________\___________\__________\______> cancelled
    /// ```
    ///
    /// Staying in the same open status is allowed. Terminal statuses are
    /// final.
    pub fn check_transition(self, to: Self) -> Result<(), InvalidTransition> {
        use Status as S;

        let allowed = (self == to && !self.is_terminal())
            || matches!(
                (self, to),
                (S::Created, S::Assigned)
                    | (S::Assigned, S::InWork)
                    | (S::InWork, S::WorksDone)
                    | (S::WorksDone, S::Closed)
            )
            || (!self.is_terminal() && to == S::Cancelled);

        if allowed {
            Ok(())
        } else {
            Err(InvalidTransition { from: self, to })
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InvalidTransition {
    pub from: Status,
    pub to: Status,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ticket cannot move from `{}` to `{}`", self.from, self.to)
    }
}

/// Catalog records a ticket points at. Each of them must exist for the
/// ticket to be stored.
#[derive(Clone, Copy, Debug)]
pub struct References<'a> {
    pub client: client::Id,
    pub device: device::Id,
    pub reason: &'a reason::Id,
    pub author: user::Id,
    pub department: Option<department::Id>,
    pub assigned_by: Option<user::Id>,
    pub executor: Option<user::Id>,
    pub contact_person: Option<contact::Id>,
}

impl References<'_> {
    /// Each reference paired with the error reporting its absence, in a
    /// fixed order. Unset optional references are `None`.
    pub fn required(&self) -> [Option<Missing>; 8] {
        [
            Some(Missing::Client(self.client)),
            Some(Missing::Device(self.device)),
            Some(Missing::Reason(self.reason.clone())),
            Some(Missing::User(self.author)),
            self.department.map(Missing::Department),
            self.assigned_by.map(Missing::User),
            self.executor.map(Missing::User),
            self.contact_person.map(Missing::Contact),
        ]
    }
}

/// Ticket intake as submitted by a caller.
///
/// Required fields are optional here so that their absence is reported as a
/// validation error naming the field rather than as a decoding failure.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub author: Option<user::Id>,
    pub client: Option<client::Id>,
    pub device: Option<device::Id>,
    pub reason: Option<reason::Id>,
    pub ticket_type: Option<String>,
    pub assigned_by: Option<user::Id>,
    pub executor: Option<user::Id>,
    pub contact_person: Option<contact::Id>,
    #[serde(default)]
    pub urgent: bool,
    #[serde(default, with = "timestamp::option")]
    pub planned_start: Option<OffsetDateTime>,
    #[serde(default, with = "timestamp::option")]
    pub planned_end: Option<OffsetDateTime>,
    #[serde(default, with = "timestamp::option")]
    pub assigned_start: Option<OffsetDateTime>,
    #[serde(default, with = "timestamp::option")]
    pub assigned_end: Option<OffsetDateTime>,
    pub description: Option<String>,
}

impl Draft {
    /// Turns the draft into an insertable ticket owned by `department`.
    pub fn into_new(
        self,
        department: Option<department::Id>,
    ) -> Result<NewTicket, Invalid> {
        let missing = Invalid::MissingField;
        let ticket_type = self
            .ticket_type
            .filter(|t| !t.trim().is_empty())
            .ok_or(missing("ticketType"))?;

        Ok(NewTicket {
            author: self.author.ok_or(missing("author"))?,
            client: self.client.ok_or(missing("client"))?,
            device: self.device.ok_or(missing("device"))?,
            reason: self.reason.ok_or(missing("reason"))?,
            ticket_type,
            department,
            assigned_by: self.assigned_by,
            executor: self.executor,
            contact_person: self.contact_person,
            urgent: self.urgent,
            planned_start: self.planned_start,
            planned_end: self.planned_end,
            assigned_start: self.assigned_start,
            assigned_end: self.assigned_end,
            description: self.description,
            reference_ticket: None,
        })
    }
}

/// Validated ticket awaiting its id, number and creation time from a store.
#[derive(Clone, Debug, PartialEq)]
pub struct NewTicket {
    pub author: user::Id,
    pub client: client::Id,
    pub device: device::Id,
    pub reason: reason::Id,
    pub ticket_type: String,
    pub department: Option<department::Id>,
    pub assigned_by: Option<user::Id>,
    pub executor: Option<user::Id>,
    pub contact_person: Option<contact::Id>,
    pub urgent: bool,
    pub planned_start: Option<OffsetDateTime>,
    pub planned_end: Option<OffsetDateTime>,
    pub assigned_start: Option<OffsetDateTime>,
    pub assigned_end: Option<OffsetDateTime>,
    pub description: Option<String>,
    pub reference_ticket: Option<Id>,
}

impl NewTicket {
    pub fn references(&self) -> References<'_> {
        References {
            client: self.client,
            device: self.device,
            reason: &self.reason,
            author: self.author,
            department: self.department,
            assigned_by: self.assigned_by,
            executor: self.executor,
            contact_person: self.contact_person,
        }
    }

    /// The ticket spawned by closing `original` with a recommendation
    /// addressed to `department`.
    pub fn follow_up(
        original: &Ticket,
        recommendation: &str,
        department: department::Id,
        author: user::Id,
    ) -> Self {
        Self {
            author,
            client: original.client,
            device: original.device,
            reason: original.reason.clone(),
            ticket_type: original.ticket_type.clone(),
            department: Some(department),
            assigned_by: None,
            executor: None,
            contact_person: original.contact_person,
            urgent: false,
            planned_start: None,
            planned_end: None,
            assigned_start: None,
            assigned_end: None,
            description: Some(recommendation.to_owned()),
            reference_ticket: Some(original.id),
        }
    }

    pub fn into_ticket(
        self,
        id: Id,
        number: i64,
        created_at: OffsetDateTime,
    ) -> Ticket {
        Ticket {
            id,
            number,
            ticket_type: self.ticket_type,
            reason: self.reason,
            urgent: self.urgent,
            client: self.client,
            device: self.device,
            contact_person: self.contact_person,
            author: self.author,
            department: self.department,
            assigned_by: self.assigned_by,
            executor: self.executor,
            created_at,
            assigned_at: None,
            planned_start: self.planned_start,
            planned_end: self.planned_end,
            assigned_start: self.assigned_start,
            assigned_end: self.assigned_end,
            work_started_at: None,
            work_finished_at: None,
            closed_at: None,
            status: Status::Created,
            result: None,
            recommendation: None,
            used_materials: Vec::new(),
            description: self.description,
            reference_ticket: self.reference_ticket,
            double_signed: false,
        }
    }
}

/// Sparse update: absent fields leave the stored value untouched.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Patch {
    pub status: Option<Status>,
    #[serde(default, with = "timestamp::option")]
    pub work_started_at: Option<OffsetDateTime>,
    #[serde(default, with = "timestamp::option")]
    pub work_finished_at: Option<OffsetDateTime>,
    pub result: Option<String>,
    pub recommendation: Option<String>,
    pub department: Option<department::Id>,
    #[serde(default, with = "timestamp::option")]
    pub closed_at: Option<OffsetDateTime>,
    #[serde(default, with = "timestamp::option")]
    pub assigned_at: Option<OffsetDateTime>,
    pub assigned_by: Option<user::Id>,
    pub executor: Option<user::Id>,
    pub description: Option<String>,
    #[serde(default, with = "timestamp::option")]
    pub assigned_start: Option<OffsetDateTime>,
    #[serde(default, with = "timestamp::option")]
    pub assigned_end: Option<OffsetDateTime>,
    pub used_materials: Option<Vec<String>>,
}

impl Patch {
    /// Applies the patch to `ticket`, or leaves it untouched on error.
    ///
    /// Moving to a terminal status stamps `closed_at` with `now` unless the
    /// patch carries its own `closed_at`. Once set, `closed_at` is final.
    pub fn apply(
        &self,
        ticket: &mut Ticket,
        now: OffsetDateTime,
    ) -> Result<(), Error> {
        if self.department.is_some_and(|d| ticket.department != Some(d)) {
            return Err(Invalid::ImmutableDepartment.into());
        }
        if let Some(status) = self.status {
            ticket.status.check_transition(status)?;
        }
        let status = self.status.unwrap_or(ticket.status);
        if self.closed_at.is_some() {
            if !status.is_terminal() {
                return Err(Invalid::ClosedAtWithoutTerminalStatus.into());
            }
            if ticket.status.is_terminal() {
                let from = ticket.status;
                return Err(InvalidTransition { from, to: status }.into());
            }
        }

        if status.is_terminal() && ticket.closed_at.is_none() {
            ticket.closed_at = Some(now);
        }
        ticket.status = status;

        fn set<T: Clone>(field: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                field.clone_from(v);
            }
        }
        fn set_opt<T: Clone>(field: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                field.clone_from(value);
            }
        }

        set_opt(&mut ticket.closed_at, &self.closed_at);
        set_opt(&mut ticket.work_started_at, &self.work_started_at);
        set_opt(&mut ticket.work_finished_at, &self.work_finished_at);
        set_opt(&mut ticket.result, &self.result);
        set_opt(&mut ticket.recommendation, &self.recommendation);
        set_opt(&mut ticket.assigned_at, &self.assigned_at);
        set_opt(&mut ticket.assigned_by, &self.assigned_by);
        set_opt(&mut ticket.executor, &self.executor);
        set_opt(&mut ticket.description, &self.description);
        set_opt(&mut ticket.assigned_start, &self.assigned_start);
        set_opt(&mut ticket.assigned_end, &self.assigned_end);
        set(&mut ticket.used_materials, &self.used_materials);

        Ok(())
    }
}

/// Closure of a ticket whose work is done.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Close {
    pub id: Id,
    pub result: String,
    #[serde(with = "timestamp")]
    pub closed_at: OffsetDateTime,
    pub recommendation: Option<String>,
    /// Department the recommendation is addressed to.
    pub department: Option<department::Id>,
    #[serde(default)]
    pub double_signed: bool,
}

impl Close {
    pub fn apply(&self, ticket: &mut Ticket) -> Result<(), InvalidTransition> {
        if ticket.status != Status::WorksDone {
            return Err(InvalidTransition {
                from: ticket.status,
                to: Status::Closed,
            });
        }

        ticket.status = Status::Closed;
        ticket.result = Some(self.result.clone());
        ticket.closed_at = Some(self.closed_at);
        ticket.double_signed = self.double_signed;
        if let Some(recommendation) = self.recommendation() {
            ticket.recommendation = Some(recommendation.to_owned());
        }
        Ok(())
    }

    fn recommendation(&self) -> Option<&str> {
        self.recommendation
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }

    /// Follow-up ticket to insert alongside the closure, if both a
    /// recommendation and a target department are given.
    pub fn follow_up(
        &self,
        original: &Ticket,
        author: user::Id,
    ) -> Option<NewTicket> {
        let recommendation = self.recommendation()?;
        let department = self.department?;
        Some(NewTicket::follow_up(original, recommendation, department, author))
    }
}
