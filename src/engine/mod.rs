//! Ticket lifecycle, work listing and archive search on top of a [`Store`].

pub mod archive;
pub mod listing;

use futures::{future::OptionFuture, FutureExt as _};
use itertools::Itertools as _;
use time::OffsetDateTime;
use tracing::{info, instrument};

use crate::{
    api::{
        self,
        ticket::{ClientRef, DeviceRef},
        Card, Details, Identity,
    },
    catalog::{self, reason, Catalog, Keys},
    store::{Closed, Store},
    ticket::{self, Close, Draft, Patch, Ticket},
    Error, Invalid, Missing,
};

pub struct Engine {
    store: Box<dyn Store>,
}

impl Engine {
    pub fn new(store: impl Store + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    pub fn store(&self) -> &dyn Store {
        &*self.store
    }

    /// Registers a ticket on behalf of its author, in the author's
    /// department.
    #[instrument(skip_all, fields(author = ?draft.author))]
    pub async fn create_ticket(&self, draft: Draft) -> Result<Ticket, Error> {
        let author = draft.author.ok_or(Invalid::MissingField("author"))?;
        let author = self
            .store
            .user(author)
            .await?
            .ok_or(Missing::User(author))?;

        let new = draft.into_new(author.department)?;
        let ticket = self.store.create_ticket(new).await?;

        info!(ticket = %ticket.id, number = ticket.number, "ticket created");
        Ok(ticket)
    }

    #[instrument(skip(self, patch))]
    pub async fn update_ticket(
        &self,
        id: ticket::Id,
        patch: &Patch,
        acting: catalog::user::Id,
    ) -> Result<Ticket, Error> {
        let ticket = self
            .store
            .update_ticket(id, patch, acting, OffsetDateTime::now_utc())
            .await?;

        info!(status = %ticket.status, "ticket updated");
        Ok(ticket)
    }

    /// Closes a ticket whose work is done. A closure carrying both a
    /// recommendation and a department spawns a follow-up ticket for that
    /// department.
    #[instrument(skip(self, close), fields(ticket = %close.id))]
    pub async fn close_ticket(
        &self,
        close: &Close,
        acting: catalog::user::Id,
    ) -> Result<Closed, Error> {
        let closed = self.store.close_ticket(close, acting).await?;

        match &closed.follow_up {
            Some(follow_up) => info!(
                follow_up = %follow_up.id,
                department = ?follow_up.department,
                "ticket closed, follow-up created",
            ),
            None => info!("ticket closed"),
        }
        Ok(closed)
    }

    #[instrument(skip(self))]
    pub async fn delete_ticket(&self, id: ticket::Id) -> Result<(), Error> {
        self.store.delete_ticket(id).await?;
        info!("ticket deleted");
        Ok(())
    }

    pub async fn ticket(&self, id: ticket::Id) -> Result<Details, Error> {
        let ticket = self
            .store
            .ticket(id)
            .await?
            .ok_or(Missing::Ticket(id))?;
        self.details(ticket).await
    }

    /// Resolves every reference of `ticket` into a detail record.
    pub async fn details(&self, ticket: Ticket) -> Result<Details, Error> {
        let keys = Keys {
            users: [Some(ticket.author), ticket.assigned_by, ticket.executor]
                .into_iter()
                .flatten()
                .unique()
                .collect(),
            departments: ticket.department.into_iter().collect(),
            clients: vec![ticket.client],
            devices: vec![ticket.device],
            reasons: vec![ticket.reason.clone()],
        };
        let contact = OptionFuture::from(
            ticket.contact_person.map(|id| self.store.contact(id)),
        )
        .map(|found| found.transpose().map(Option::flatten));
        let (catalog, contact_person) =
            tokio::try_join!(self.store.catalog(&keys), contact)?;

        let user = |id: catalog::user::Id| {
            catalog.users.get(&id).map(api::User::from)
        };

        Ok(Details {
            id: ticket.id,
            number: ticket.number,
            ticket_type: ticket.ticket_type,
            status: ticket.status,
            urgent: ticket.urgent,
            reason: catalog
                .reasons
                .get(&ticket.reason)
                .and_then(|r| r.phrased_for(ticket.status))
                .map(str::to_owned),
            reason_id: ticket.reason,
            description: ticket.description,
            result: ticket.result,
            recommendation: ticket.recommendation,
            used_materials: ticket.used_materials,
            double_signed: ticket.double_signed,
            reference_ticket: ticket.reference_ticket,
            author: user(ticket.author),
            assigned_by: ticket.assigned_by.and_then(user),
            executor: ticket.executor.and_then(user),
            department_id: ticket.department,
            department: ticket
                .department
                .and_then(|id| catalog.departments.get(&id))
                .map(|d| d.title.clone()),
            client: catalog.clients.get(&ticket.client).map(|c| ClientRef {
                id: c.id,
                name: c.title.clone(),
                address: c.address.clone(),
            }),
            device: catalog.devices.get(&ticket.device).map(|d| DeviceRef {
                id: d.id,
                serial_number: d.serial_number.clone(),
                model: d.model.clone(),
            }),
            contact_person,
            created_at: ticket.created_at,
            assigned_at: ticket.assigned_at,
            planned_start: ticket.planned_start,
            planned_end: ticket.planned_end,
            assigned_start: ticket.assigned_start,
            assigned_end: ticket.assigned_end,
            work_started_at: ticket.work_started_at,
            work_finished_at: ticket.work_finished_at,
            closed_at: ticket.closed_at,
        })
    }

    /// Contact person of a ticket, if it has one.
    pub async fn ticket_contact(
        &self,
        id: ticket::Id,
    ) -> Result<Option<catalog::Contact>, Error> {
        let ticket = self
            .store
            .ticket(id)
            .await?
            .ok_or(Missing::Ticket(id))?;
        match ticket.contact_person {
            Some(contact) => self.store.contact(contact).await,
            None => Ok(None),
        }
    }

    pub async fn reasons(&self) -> Result<Vec<catalog::Reason>, Error> {
        self.store.reasons().await
    }

    pub async fn reason(
        &self,
        id: &reason::Id,
    ) -> Result<catalog::Reason, Error> {
        self.store
            .reason(id)
            .await?
            .ok_or_else(|| Missing::Reason(id.clone()).into())
    }

    /// The caller's current work, most pressing first.
    #[instrument(skip(self))]
    pub async fn list_tickets(
        &self,
        identity: Identity,
    ) -> Result<Vec<Card>, Error> {
        let Some(scope) = listing::scope_for(identity) else {
            return Ok(Vec::new());
        };
        let tickets = scope.tickets(self.store()).await?;
        let tickets = listing::prioritize(tickets, OffsetDateTime::now_utc());
        self.cards(&tickets).await
    }

    /// Renders `tickets` as cards, keeping their order.
    pub(crate) async fn cards(
        &self,
        tickets: &[Ticket],
    ) -> Result<Vec<Card>, Error> {
        let catalog = self.store.catalog(&Keys::for_cards(tickets)).await?;
        Ok(tickets.iter().map(|t| card(t, &catalog)).collect())
    }
}

fn card(ticket: &Ticket, catalog: &Catalog) -> Card {
    let client = catalog.clients.get(&ticket.client);
    let device = catalog.devices.get(&ticket.device);

    Card {
        id: ticket.id,
        number: ticket.number,
        urgent: ticket.urgent,
        status: ticket.status,
        reason: catalog.reasons.get(&ticket.reason).map(|r| r.title.clone()),
        result: ticket.result.clone(),
        description: ticket.description.clone(),
        created_at: ticket.created_at,
        assigned_end: ticket.assigned_end,
        work_started_at: ticket.work_started_at,
        work_finished_at: ticket.work_finished_at,
        executor: ticket
            .executor
            .and_then(|id| catalog.users.get(&id))
            .map(catalog::User::display_name),
        department: ticket
            .department
            .and_then(|id| catalog.departments.get(&id))
            .map(|d| d.title.clone()),
        device_serial_number: device.map(|d| d.serial_number.clone()),
        device_model: device.and_then(|d| d.model.clone()),
        client_name: client.map(|c| c.title.clone()),
        client_address: client.map(|c| c.address.clone()),
    }
}
