//! In-process [`Store`] keeping everything in a mutex-guarded state.
//!
//! Writers run against a copy of the state which replaces the original only
//! when the whole operation succeeds, which gives the same all-or-nothing
//! behaviour as the database transactions.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    catalog::{
        self, client, contact, department, device, reason, user, Catalog, Keys,
    },
    engine::archive,
    ticket::{self, Close, NewTicket, Patch, References, Ticket},
    Error, Missing,
};

use super::{ArchiveSnapshot, Closed};

#[derive(Clone, Default)]
pub struct Store(Arc<Mutex<State>>);

#[derive(Clone, Default)]
struct State {
    users: HashMap<user::Id, catalog::User>,
    departments: HashMap<department::Id, catalog::Department>,
    clients: HashMap<client::Id, catalog::Client>,
    devices: HashMap<device::Id, catalog::Device>,
    contacts: HashMap<contact::Id, catalog::Contact>,
    reasons: BTreeMap<reason::Id, catalog::Reason>,
    tickets: HashMap<ticket::Id, Ticket>,
    last_number: i64,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: catalog::User) {
        self.with(|s| s.users.insert(user.id, user));
    }

    pub fn insert_department(&self, department: catalog::Department) {
        self.with(|s| s.departments.insert(department.id, department));
    }

    pub fn insert_client(&self, client: catalog::Client) {
        self.with(|s| s.clients.insert(client.id, client));
    }

    pub fn insert_device(&self, device: catalog::Device) {
        self.with(|s| s.devices.insert(device.id, device));
    }

    pub fn insert_contact(&self, contact: catalog::Contact) {
        self.with(|s| s.contacts.insert(contact.id, contact));
    }

    pub fn insert_reason(&self, reason: catalog::Reason) {
        self.with(|s| s.reasons.insert(reason.id.clone(), reason));
    }

    /// Stores `ticket` as is, bypassing the lifecycle. Meant for seeding
    /// history.
    pub fn insert_ticket(&self, ticket: Ticket) {
        self.with(|s| {
            s.last_number = s.last_number.max(ticket.number);
            s.tickets.insert(ticket.id, ticket)
        });
    }

    fn with<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    fn transaction<T>(
        &self,
        f: impl FnOnce(&mut State) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        let mut draft = state.clone();
        let out = f(&mut draft)?;
        *state = draft;
        Ok(out)
    }
}

impl State {
    fn exists(&self, record: &Missing) -> bool {
        match record {
            Missing::Ticket(id) => self.tickets.contains_key(id),
            Missing::User(id) => self.users.contains_key(id),
            Missing::Department(id) => self.departments.contains_key(id),
            Missing::Client(id) => self.clients.contains_key(id),
            Missing::Device(id) => self.devices.contains_key(id),
            Missing::Contact(id) => self.contacts.contains_key(id),
            Missing::Reason(id) => self.reasons.contains_key(id),
        }
    }

    fn require(&self, references: &References<'_>) -> Result<(), Error> {
        match references
            .required()
            .into_iter()
            .flatten()
            .find(|record| !self.exists(record))
        {
            Some(missing) => Err(missing.into()),
            None => Ok(()),
        }
    }

    fn resolve(&self, keys: &Keys) -> Catalog {
        fn pick<K, V>(from: &HashMap<K, V>, keys: &[K]) -> HashMap<K, V>
        where
            K: Clone + Eq + std::hash::Hash,
            V: Clone,
        {
            keys.iter()
                .filter_map(|k| from.get(k).map(|v| (k.clone(), v.clone())))
                .collect()
        }

        Catalog {
            users: pick(&self.users, &keys.users),
            departments: pick(&self.departments, &keys.departments),
            clients: pick(&self.clients, &keys.clients),
            devices: pick(&self.devices, &keys.devices),
            reasons: keys
                .reasons
                .iter()
                .filter_map(|id| {
                    Some((id.clone(), self.reasons.get(id)?.clone()))
                })
                .collect(),
        }
    }

    fn insert(&mut self, new: NewTicket) -> Result<Ticket, Error> {
        self.require(&new.references())?;

        self.last_number += 1;
        let ticket = new.into_ticket(
            ticket::Id::new(),
            self.last_number,
            OffsetDateTime::now_utc(),
        );
        self.tickets.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    fn stamp_latest_ticket(
        &mut self,
        user: user::Id,
        ticket: ticket::Id,
    ) -> Result<(), Error> {
        let user = self.users.get_mut(&user).ok_or(Missing::User(user))?;
        user.latest_ticket = Some(ticket);
        Ok(())
    }

    fn tickets_where(&self, f: impl Fn(&Ticket) -> bool) -> Vec<Ticket> {
        self.tickets.values().filter(|t| f(t)).cloned().collect()
    }
}

#[async_trait]
impl super::Store for Store {
    async fn user(&self, id: user::Id) -> Result<Option<catalog::User>, Error> {
        Ok(self.with(|s| s.users.get(&id).cloned()))
    }

    async fn contact(
        &self,
        id: contact::Id,
    ) -> Result<Option<catalog::Contact>, Error> {
        Ok(self.with(|s| s.contacts.get(&id).cloned()))
    }

    async fn reason(
        &self,
        id: &reason::Id,
    ) -> Result<Option<catalog::Reason>, Error> {
        Ok(self.with(|s| s.reasons.get(id).cloned()))
    }

    async fn reasons(&self) -> Result<Vec<catalog::Reason>, Error> {
        Ok(self.with(|s| s.reasons.values().cloned().collect()))
    }

    async fn catalog(&self, keys: &Keys) -> Result<Catalog, Error> {
        Ok(self.with(|s| s.resolve(keys)))
    }

    async fn ticket(&self, id: ticket::Id) -> Result<Option<Ticket>, Error> {
        Ok(self.with(|s| s.tickets.get(&id).cloned()))
    }

    async fn create_ticket(&self, new: NewTicket) -> Result<Ticket, Error> {
        self.transaction(|s| s.insert(new))
    }

    async fn update_ticket(
        &self,
        id: ticket::Id,
        patch: &Patch,
        acting: user::Id,
        now: OffsetDateTime,
    ) -> Result<Ticket, Error> {
        self.transaction(|s| {
            let mut ticket =
                s.tickets.get(&id).cloned().ok_or(Missing::Ticket(id))?;
            patch.apply(&mut ticket, now)?;
            s.require(&ticket.references())?;
            s.tickets.insert(id, ticket.clone());
            s.stamp_latest_ticket(acting, id)?;
            Ok(ticket)
        })
    }

    async fn close_ticket(
        &self,
        close: &Close,
        acting: user::Id,
    ) -> Result<Closed, Error> {
        self.transaction(|s| {
            let ticket = s
                .tickets
                .get_mut(&close.id)
                .ok_or(Missing::Ticket(close.id))?;
            close.apply(ticket)?;
            let ticket = ticket.clone();

            let follow_up = close
                .follow_up(&ticket, acting)
                .map(|new| s.insert(new))
                .transpose()?;
            s.stamp_latest_ticket(acting, ticket.id)?;

            Ok(Closed { ticket, follow_up })
        })
    }

    async fn delete_ticket(&self, id: ticket::Id) -> Result<(), Error> {
        self.with(|s| s.tickets.remove(&id));
        Ok(())
    }

    async fn tickets_by_executor(
        &self,
        executor: user::Id,
    ) -> Result<Vec<Ticket>, Error> {
        Ok(self.with(|s| s.tickets_where(|t| t.executor == Some(executor))))
    }

    async fn tickets_by_department(
        &self,
        department: department::Id,
    ) -> Result<Vec<Ticket>, Error> {
        Ok(self.with(|s| s.tickets_where(|t| t.department == Some(department))))
    }

    async fn archive(
        &self,
        base: &archive::Base,
    ) -> Result<ArchiveSnapshot, Error> {
        Ok(self.with(|s| {
            let mut tickets = s.tickets_where(|t| base.admits(t));
            tickets.sort_by_key(|t| (t.created_at, t.number));
            let catalog = s.resolve(&Keys::for_cards(&tickets));
            ArchiveSnapshot { tickets, catalog }
        }))
    }
}
