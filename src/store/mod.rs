//! Persistence boundary of the ticket engine.
//!
//! A [`Store`] owns the schema invariants and the transaction boundaries:
//! every writer method is all-or-nothing, and [`Store::archive`] reads its
//! snapshot inside a single read-only transaction. The ticket rules
//! themselves live in [`crate::ticket`] and are called by each backend from
//! within its transaction.

pub mod memory;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    catalog::{self, contact, department, reason, user, Catalog, Keys},
    engine::archive,
    ticket::{self, Close, NewTicket, Patch, Ticket},
    Error,
};

#[async_trait]
pub trait Store: Send + Sync {
    async fn user(&self, id: user::Id) -> Result<Option<catalog::User>, Error>;

    async fn contact(
        &self,
        id: contact::Id,
    ) -> Result<Option<catalog::Contact>, Error>;

    async fn reason(
        &self,
        id: &reason::Id,
    ) -> Result<Option<catalog::Reason>, Error>;

    async fn reasons(&self) -> Result<Vec<catalog::Reason>, Error>;

    /// Resolves all `keys` at once. Unknown ids are left out.
    async fn catalog(&self, keys: &Keys) -> Result<Catalog, Error>;

    async fn ticket(&self, id: ticket::Id) -> Result<Option<Ticket>, Error>;

    /// Inserts a ticket in `created` status.
    ///
    /// Fails with [`Error::NotFound`] if any record it references is
    /// unknown.
    async fn create_ticket(&self, new: NewTicket) -> Result<Ticket, Error>;

    /// Applies `patch` to the ticket and points `acting`'s latest ticket at
    /// it, in one transaction. The patched ticket must only reference
    /// existing records.
    async fn update_ticket(
        &self,
        id: ticket::Id,
        patch: &Patch,
        acting: user::Id,
        now: OffsetDateTime,
    ) -> Result<Ticket, Error>;

    /// Closes the ticket, inserts its follow-up if the closure asks for one,
    /// and points `acting`'s latest ticket at it, in one transaction.
    async fn close_ticket(
        &self,
        close: &Close,
        acting: user::Id,
    ) -> Result<Closed, Error>;

    /// Removes the ticket for good. Unknown ids are not an error.
    async fn delete_ticket(&self, id: ticket::Id) -> Result<(), Error>;

    async fn tickets_by_executor(
        &self,
        executor: user::Id,
    ) -> Result<Vec<Ticket>, Error>;

    async fn tickets_by_department(
        &self,
        department: department::Id,
    ) -> Result<Vec<Ticket>, Error>;

    /// Tickets admitted by `base`, oldest first, along with the catalog
    /// entries their cards show, read in one read-only transaction.
    async fn archive(
        &self,
        base: &archive::Base,
    ) -> Result<ArchiveSnapshot, Error>;
}

#[derive(Clone, Debug, Default)]
pub struct ArchiveSnapshot {
    pub tickets: Vec<Ticket>,
    pub catalog: Catalog,
}

#[derive(Clone, Debug)]
pub struct Closed {
    pub ticket: Ticket,
    pub follow_up: Option<Ticket>,
}
