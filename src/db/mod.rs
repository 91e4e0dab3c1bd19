//! PostgreSQL [`Store`](crate::store::Store) over `tokio-postgres`.
//!
//! The schema lives in `schema.sql` at the repository root.

mod catalog;
mod ticket;

use std::error::Error as StdError;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio_postgres::{
    tls::NoTlsStream,
    types::{
        accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql,
        Type,
    },
    NoTls, Socket,
};
use uuid::Uuid;

use crate::{
    catalog::{client, contact, department, device, reason, user, Catalog, Keys},
    config,
    engine::archive,
    store::{self, ArchiveSnapshot, Closed},
    ticket::{self as model, Close, NewTicket, Patch, Ticket},
    Error, Missing,
};

pub type Connection = tokio_postgres::Connection<Socket, NoTlsStream>;

pub async fn connect(
    config: &config::Db,
) -> Result<(Client, Connection), tokio_postgres::Error> {
    tokio_postgres::connect(&config.url, NoTls)
        .await
        .map(|(client, connection)| (Client(Mutex::new(client)), connection))
}

/// Single connection shared by all requests. Writers hold the lock for the
/// whole transaction.
pub struct Client(Mutex<tokio_postgres::Client>);

macro_rules! uuid_sql {
    ($($id:ty),* $(,)?) => {$(
        impl FromSql<'_> for $id {
            accepts!(UUID);

            fn from_sql(
                ty: &Type,
                raw: &[u8],
            ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
                Uuid::from_sql(ty, raw).map(<$id>::from)
            }
        }

        impl ToSql for $id {
            accepts!(UUID);

            to_sql_checked!();

            fn to_sql(
                &self,
                ty: &Type,
                out: &mut BytesMut,
            ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
                self.as_uuid().to_sql(ty, out)
            }
        }
    )*};
}

uuid_sql!(
    user::Id,
    department::Id,
    client::Id,
    device::Id,
    contact::Id,
    model::Id,
);

impl FromSql<'_> for reason::Id {
    accepts!(TEXT, VARCHAR);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        String::from_sql(ty, raw).map(Self::from)
    }
}

impl ToSql for reason::Id {
    accepts!(TEXT, VARCHAR);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.as_str().to_sql(ty, out)
    }
}

#[async_trait]
impl store::Store for Client {
    async fn user(
        &self,
        id: user::Id,
    ) -> Result<Option<crate::catalog::User>, Error> {
        Ok(catalog::user(&*self.0.lock().await, id).await?)
    }

    async fn contact(
        &self,
        id: contact::Id,
    ) -> Result<Option<crate::catalog::Contact>, Error> {
        Ok(catalog::contact(&*self.0.lock().await, id).await?)
    }

    async fn reason(
        &self,
        id: &reason::Id,
    ) -> Result<Option<crate::catalog::Reason>, Error> {
        Ok(catalog::reason(&*self.0.lock().await, id).await?)
    }

    async fn reasons(&self) -> Result<Vec<crate::catalog::Reason>, Error> {
        Ok(catalog::reasons(&*self.0.lock().await).await?)
    }

    async fn catalog(&self, keys: &Keys) -> Result<Catalog, Error> {
        Ok(catalog::resolve(&*self.0.lock().await, keys).await?)
    }

    async fn ticket(&self, id: model::Id) -> Result<Option<Ticket>, Error> {
        Ok(ticket::select(&*self.0.lock().await, id).await?)
    }

    async fn create_ticket(&self, new: NewTicket) -> Result<Ticket, Error> {
        let mut client = self.0.lock().await;
        let tx = client.transaction().await?;
        let ticket = ticket::insert(&tx, new).await?;
        tx.commit().await?;
        Ok(ticket)
    }

    async fn update_ticket(
        &self,
        id: model::Id,
        patch: &Patch,
        acting: user::Id,
        now: OffsetDateTime,
    ) -> Result<Ticket, Error> {
        let mut client = self.0.lock().await;
        let tx = client.transaction().await?;

        let mut ticket = ticket::select_for_update(&tx, id)
            .await?
            .ok_or(Missing::Ticket(id))?;
        patch.apply(&mut ticket, now)?;
        ticket::require(&tx, &ticket.references()).await?;
        ticket::write(&tx, &ticket).await?;
        catalog::stamp_latest_ticket(&tx, acting, id).await?;

        tx.commit().await?;
        Ok(ticket)
    }

    async fn close_ticket(
        &self,
        close: &Close,
        acting: user::Id,
    ) -> Result<Closed, Error> {
        let mut client = self.0.lock().await;
        let tx = client.transaction().await?;

        let mut ticket = ticket::select_for_update(&tx, close.id)
            .await?
            .ok_or(Missing::Ticket(close.id))?;
        close.apply(&mut ticket)?;
        ticket::write(&tx, &ticket).await?;

        let follow_up = match close.follow_up(&ticket, acting) {
            Some(new) => Some(ticket::insert(&tx, new).await?),
            None => None,
        };
        catalog::stamp_latest_ticket(&tx, acting, ticket.id).await?;

        tx.commit().await?;
        Ok(Closed { ticket, follow_up })
    }

    async fn delete_ticket(&self, id: model::Id) -> Result<(), Error> {
        Ok(ticket::delete(&*self.0.lock().await, id).await?)
    }

    async fn tickets_by_executor(
        &self,
        executor: user::Id,
    ) -> Result<Vec<Ticket>, Error> {
        Ok(ticket::by_executor(&*self.0.lock().await, executor).await?)
    }

    async fn tickets_by_department(
        &self,
        department: department::Id,
    ) -> Result<Vec<Ticket>, Error> {
        Ok(ticket::by_department(&*self.0.lock().await, department).await?)
    }

    async fn archive(
        &self,
        base: &archive::Base,
    ) -> Result<ArchiveSnapshot, Error> {
        let mut client = self.0.lock().await;
        let tx = client.build_transaction().read_only(true).start().await?;
        let tickets = ticket::archive(&tx, base).await?;
        let catalog =
            catalog::resolve(&tx, &Keys::for_cards(&tickets)).await?;
        tx.commit().await?;
        Ok(ArchiveSnapshot { tickets, catalog })
    }
}
