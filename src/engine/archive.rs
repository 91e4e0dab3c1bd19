//! Historical search over tickets of one client, device or executor.

use std::{cmp::Reverse, collections::BTreeMap};

use itertools::Itertools as _;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::{
    api::archive::{
        DeviceFacet, Facets, Filters, GroupBy, Listing, ReasonFacet, Response,
        StatusBucket,
    },
    catalog::{client, department, device, user, Catalog},
    store::ArchiveSnapshot,
    ticket::Ticket,
    Error, Invalid, Missing,
};

use super::{card, Engine};

/// What the archive is searched by.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Subject {
    Client(client::Id),
    Device(device::Id),
    Executor(user::Id),
}

impl Subject {
    /// Only `client`, `device` and `executor` are searchable.
    pub fn parse(field: &str, id: Uuid) -> Result<Self, Invalid> {
        match field {
            "client" => Ok(Self::Client(id.into())),
            "device" => Ok(Self::Device(id.into())),
            "executor" => Ok(Self::Executor(id.into())),
            other => Err(Invalid::UnknownField(other.to_owned())),
        }
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        match *self {
            Self::Client(id) => ticket.client == id,
            Self::Device(id) => ticket.device == id,
            Self::Executor(id) => ticket.executor == Some(id),
        }
    }
}

/// Base predicate of an archive search. Facets are computed over the tickets
/// it admits, before the optional refinements narrow the list.
#[derive(Clone, Copy, Debug)]
pub struct Base {
    pub subject: Subject,
    pub department: department::Id,
    pub bucket: StatusBucket,
}

impl Base {
    pub fn admits(&self, ticket: &Ticket) -> bool {
        self.subject.matches(ticket)
            && ticket.department == Some(self.department)
            && ticket.executor.is_some()
            && self.bucket.admits(ticket.status)
    }
}

/// Optional refinements of `filters`, all of which must hold.
fn refines(filters: &Filters, ticket: &Ticket) -> bool {
    filters.reason.as_ref().map_or(true, |r| ticket.reason == *r)
        && filters.date_start.map_or(true, |at| ticket.created_at >= at)
        && filters.date_end.map_or(true, |at| ticket.created_at <= at)
        && filters.device_id.map_or(true, |d| ticket.device == d)
}

/// Bucket of `ticket` in a grouped listing.
///
/// Closed tickets are counted in the month their work finished, everything
/// else in the month it was registered.
fn group_key(
    group_by: GroupBy,
    bucket: StatusBucket,
    ticket: &Ticket,
) -> String {
    match group_by {
        GroupBy::Month => {
            let at = match bucket {
                StatusBucket::Closed => {
                    ticket.work_finished_at.unwrap_or(ticket.created_at)
                }
                StatusBucket::InProgress | StatusBucket::All => {
                    ticket.created_at
                }
            };
            format!("{:04}-{:02}", at.year(), u8::from(at.month()))
        }
        GroupBy::Reason => ticket.reason.to_string(),
    }
}

fn facets(subject: Subject, tickets: &[Ticket], catalog: &Catalog) -> Facets {
    let reasons = tickets
        .iter()
        .map(|t| &t.reason)
        .unique()
        .map(|id| ReasonFacet {
            id: id.clone(),
            title: catalog.reasons.get(id).map(|r| r.title.clone()),
        })
        .collect();

    let devices = matches!(subject, Subject::Client(_)).then(|| {
        tickets
            .iter()
            .map(|t| t.device)
            .unique()
            .map(|id| DeviceFacet {
                id,
                title: catalog.devices.get(&id).and_then(|d| d.model.clone()),
            })
            .collect()
    });

    let available_dates = tickets
        .iter()
        .map(|t| t.created_at)
        .sorted_unstable_by_key(|at| Reverse(*at))
        .dedup()
        .collect();

    Facets {
        available_dates,
        reasons,
        devices,
    }
}

impl Engine {
    /// Tickets of the caller's department filed against `field` = `id`,
    /// oldest first, along with the filter values available in that scope.
    #[instrument(skip(self, filters))]
    pub async fn archive(
        &self,
        field: &str,
        id: Uuid,
        filters: &Filters,
        acting: user::Id,
    ) -> Result<Response, Error> {
        let subject = Subject::parse(field, id)?;

        let user = self
            .store
            .user(acting)
            .await?
            .ok_or(Missing::User(acting))?;
        let ArchiveSnapshot {
            tickets: base,
            catalog,
        } = match user.department {
            Some(department) => {
                let scope = Base {
                    subject,
                    department,
                    bucket: filters.status,
                };
                self.store.archive(&scope).await?
            }
            None => ArchiveSnapshot::default(),
        };

        let facets = facets(subject, &base, &catalog);

        let refined = base.iter().filter(|t| refines(filters, t));
        let tickets = match filters.group_by {
            None => {
                Listing::Tickets(refined.map(|t| card(t, &catalog)).collect())
            }
            Some(group_by) => {
                let mut groups = BTreeMap::<_, Vec<_>>::new();
                for t in refined {
                    groups
                        .entry(group_key(group_by, filters.status, t))
                        .or_default()
                        .push(card(t, &catalog));
                }
                Listing::GroupedTickets(groups)
            }
        };

        debug!(scope = base.len(), "archive searched");
        Ok(Response {
            tickets,
            filters: facets,
        })
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::ticket::{tests::ticket, Status};

    #[test]
    fn rejects_unlisted_fields() {
        let id = Uuid::from_u128(5);

        assert_eq!(
            Subject::parse("device", id),
            Ok(Subject::Device(device::Id::from(5))),
        );
        assert_eq!(
            Subject::parse("status", id),
            Err(Invalid::UnknownField("status".into())),
        );
        assert!(Subject::parse("client; drop table tickets", id).is_err());
    }

    #[test]
    fn base_requires_executor_and_department() {
        let base = Base {
            subject: Subject::Client(client::Id::from(1)),
            department: department::Id::from(1),
            bucket: StatusBucket::Closed,
        };
        let mut t = ticket(Status::Closed);
        assert!(!base.admits(&t));

        t.executor = Some(user::Id::from(3));
        assert!(base.admits(&t));

        t.department = Some(department::Id::from(2));
        assert!(!base.admits(&t));

        let t = Ticket {
            executor: Some(user::Id::from(3)),
            ..ticket(Status::InWork)
        };
        assert!(!base.admits(&t));
    }

    #[test]
    fn closed_months_follow_work_finished() {
        let t = Ticket {
            created_at: datetime!(2024-01-30 10:00 UTC),
            work_finished_at: Some(datetime!(2024-02-02 16:00 UTC)),
            ..ticket(Status::Closed)
        };

        assert_eq!(
            group_key(GroupBy::Month, StatusBucket::Closed, &t),
            "2024-02",
        );
        assert_eq!(group_key(GroupBy::Month, StatusBucket::All, &t), "2024-01");
        assert_eq!(
            group_key(GroupBy::Reason, StatusBucket::Closed, &t),
            "maintenance",
        );

        let unfinished = Ticket {
            work_finished_at: None,
            ..t
        };
        assert_eq!(
            group_key(GroupBy::Month, StatusBucket::Closed, &unfinished),
            "2024-01",
        );
    }

    #[test]
    fn date_range_is_inclusive() {
        let t = ticket(Status::Closed);
        let filters = Filters {
            date_start: Some(t.created_at),
            date_end: Some(t.created_at),
            ..Filters::default()
        };
        assert!(refines(&filters, &t));

        let filters = Filters {
            reason: Some("other".into()),
            ..Filters::default()
        };
        assert!(!refines(&filters, &t));
    }

    #[test]
    fn device_facets_only_for_clients() {
        let tickets = [ticket(Status::Closed), ticket(Status::Closed)];
        let catalog = Catalog::default();

        let by_client = facets(
            Subject::Client(client::Id::from(1)),
            &tickets,
            &catalog,
        );
        assert_eq!(by_client.reasons.len(), 1);
        assert_eq!(by_client.reasons[0].title, None);
        assert_eq!(by_client.devices.map(|d| d.len()), Some(1));

        let by_device = facets(
            Subject::Device(device::Id::from(1)),
            &tickets,
            &catalog,
        );
        assert_eq!(by_device.devices, None);
    }

    #[test]
    fn available_dates_are_distinct_newest_first() {
        let at = |created_at| Ticket {
            created_at,
            ..ticket(Status::Closed)
        };
        let tickets = [
            at(datetime!(2024-01-10 09:00 UTC)),
            at(datetime!(2024-03-01 09:00 UTC)),
            at(datetime!(2024-01-10 09:00 UTC)),
        ];

        let facets = facets(
            Subject::Device(device::Id::from(1)),
            &tickets,
            &Catalog::default(),
        );
        assert_eq!(
            facets.available_dates,
            [
                datetime!(2024-03-01 09:00 UTC),
                datetime!(2024-01-10 09:00 UTC),
            ],
        );
    }
}
