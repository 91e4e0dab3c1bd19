use std::error::Error as StdError;

use tokio_postgres::{
    types::{
        accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql,
        Type,
    },
    Error, GenericClient, Row,
};

use crate::{
    catalog::{department, user},
    engine::archive::{Base, Subject},
    ticket::{Id, NewTicket, References, Status, Ticket},
};

impl FromSql<'_> for Status {
    accepts!(INT2);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        let repr = i16::from_sql(ty, raw)?;
        let repr = u8::try_from(repr)?;
        let status = Self::try_from(repr).map_err(|_| "invalid status")?;
        Ok(status)
    }
}

impl ToSql for Status {
    accepts!(INT2);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        let repr = i16::from((*self) as u8);
        repr.to_sql(ty, out)
    }
}

macro_rules! columns {
    () => {
        "id, number, ticket_type, reason, urgent, \
         client, device, contact_person, author, department, \
         assigned_by, executor, \
         created_at, assigned_at, planned_start, planned_end, \
         assigned_start, assigned_end, work_started_at, work_finished_at, \
         closed_at, \
         status, result, recommendation, used_materials, description, \
         reference_ticket, double_signed"
    };
}

/// Columns set on insert. The rest are filled in by the database or later
/// by the lifecycle.
macro_rules! insert_columns {
    () => {
        "id, ticket_type, reason, urgent, \
         client, device, contact_person, author, department, \
         assigned_by, executor, \
         planned_start, planned_end, assigned_start, assigned_end, \
         status, used_materials, description, reference_ticket, \
         double_signed"
    };
}

const INSERT: &str = concat!(
    "INSERT INTO tickets (",
    insert_columns!(),
    ") VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, \
               $11, $12, $13, $14, $15, $16, $17, $18, $19, FALSE) \
     RETURNING ",
    columns!()
);

/// One flag per entry of [`References::required`], in the same order.
const REFERENCES: &str = "\
    SELECT EXISTS (SELECT 1 FROM clients WHERE id = $1), \
           EXISTS (SELECT 1 FROM devices WHERE id = $2), \
           EXISTS (SELECT 1 FROM ticket_reasons WHERE id = $3), \
           EXISTS (SELECT 1 FROM users WHERE id = $4), \
           EXISTS (SELECT 1 FROM departments WHERE id = $5), \
           EXISTS (SELECT 1 FROM users WHERE id = $6), \
           EXISTS (SELECT 1 FROM users WHERE id = $7), \
           EXISTS (SELECT 1 FROM contacts WHERE id = $8)";

fn from_row(row: &Row) -> Ticket {
    Ticket {
        id: row.get("id"),
        number: row.get("number"),
        ticket_type: row.get("ticket_type"),
        reason: row.get("reason"),
        urgent: row.get("urgent"),
        client: row.get("client"),
        device: row.get("device"),
        contact_person: row.get("contact_person"),
        author: row.get("author"),
        department: row.get("department"),
        assigned_by: row.get("assigned_by"),
        executor: row.get("executor"),
        created_at: row.get("created_at"),
        assigned_at: row.get("assigned_at"),
        planned_start: row.get("planned_start"),
        planned_end: row.get("planned_end"),
        assigned_start: row.get("assigned_start"),
        assigned_end: row.get("assigned_end"),
        work_started_at: row.get("work_started_at"),
        work_finished_at: row.get("work_finished_at"),
        closed_at: row.get("closed_at"),
        status: row.get("status"),
        result: row.get("result"),
        recommendation: row.get("recommendation"),
        used_materials: row.get("used_materials"),
        description: row.get("description"),
        reference_ticket: row.get("reference_ticket"),
        double_signed: row.get("double_signed"),
    }
}

pub async fn select(
    client: &impl GenericClient,
    id: Id,
) -> Result<Option<Ticket>, Error> {
    const SQL: &str =
        concat!("SELECT ", columns!(), " FROM tickets WHERE id = $1");
    Ok(client.query_opt(SQL, &[&id]).await?.as_ref().map(from_row))
}

/// Like [`select`], but locks the row until the transaction ends.
pub async fn select_for_update(
    client: &impl GenericClient,
    id: Id,
) -> Result<Option<Ticket>, Error> {
    const SQL: &str = concat!(
        "SELECT ",
        columns!(),
        " FROM tickets WHERE id = $1 FOR UPDATE"
    );
    Ok(client.query_opt(SQL, &[&id]).await?.as_ref().map(from_row))
}

/// Fails with the first of `refs` that names no stored record.
pub async fn require(
    client: &impl GenericClient,
    refs: &References<'_>,
) -> Result<(), crate::Error> {
    let row = client
        .query_one(
            REFERENCES,
            &[
                &refs.client,
                &refs.device,
                refs.reason,
                &refs.author,
                &refs.department,
                &refs.assigned_by,
                &refs.executor,
                &refs.contact_person,
            ],
        )
        .await?;

    let missing = refs.required().into_iter().enumerate().find_map(
        |(i, missing)| missing.filter(|_| !row.get::<_, bool>(i)),
    );
    match missing {
        Some(missing) => Err(missing.into()),
        None => Ok(()),
    }
}

/// Inserts `new` with a fresh id. The number and creation time come from
/// the database.
pub async fn insert(
    client: &impl GenericClient,
    new: NewTicket,
) -> Result<Ticket, crate::Error> {
    require(client, &new.references()).await?;

    let no_materials = Vec::<String>::new();
    let row = client
        .query_one(
            INSERT,
            &[
                &Id::new(),
                &new.ticket_type,
                &new.reason,
                &new.urgent,
                &new.client,
                &new.device,
                &new.contact_person,
                &new.author,
                &new.department,
                &new.assigned_by,
                &new.executor,
                &new.planned_start,
                &new.planned_end,
                &new.assigned_start,
                &new.assigned_end,
                &Status::Created,
                &no_materials,
                &new.description,
                &new.reference_ticket,
            ],
        )
        .await?;
    Ok(from_row(&row))
}

/// Writes every mutable column of `ticket` back.
pub async fn write(
    client: &impl GenericClient,
    ticket: &Ticket,
) -> Result<(), Error> {
    const SQL: &str = "\
        UPDATE tickets \
        SET urgent = $2, \
            assigned_by = $3, \
            executor = $4, \
            assigned_at = $5, \
            assigned_start = $6, \
            assigned_end = $7, \
            work_started_at = $8, \
            work_finished_at = $9, \
            closed_at = $10, \
            status = $11, \
            result = $12, \
            recommendation = $13, \
            used_materials = $14, \
            description = $15, \
            double_signed = $16 \
        WHERE id = $1";

    client
        .execute(
            SQL,
            &[
                &ticket.id,
                &ticket.urgent,
                &ticket.assigned_by,
                &ticket.executor,
                &ticket.assigned_at,
                &ticket.assigned_start,
                &ticket.assigned_end,
                &ticket.work_started_at,
                &ticket.work_finished_at,
                &ticket.closed_at,
                &ticket.status,
                &ticket.result,
                &ticket.recommendation,
                &ticket.used_materials,
                &ticket.description,
                &ticket.double_signed,
            ],
        )
        .await
        .map(drop)
}

pub async fn delete(client: &impl GenericClient, id: Id) -> Result<(), Error> {
    const SQL: &str = "DELETE FROM tickets WHERE id = $1";
    client.execute(SQL, &[&id]).await.map(drop)
}

pub async fn by_executor(
    client: &impl GenericClient,
    executor: user::Id,
) -> Result<Vec<Ticket>, Error> {
    const SQL: &str =
        concat!("SELECT ", columns!(), " FROM tickets WHERE executor = $1");
    Ok(client
        .query(SQL, &[&executor])
        .await?
        .iter()
        .map(from_row)
        .collect())
}

pub async fn by_department(
    client: &impl GenericClient,
    department: department::Id,
) -> Result<Vec<Ticket>, Error> {
    const SQL: &str =
        concat!("SELECT ", columns!(), " FROM tickets WHERE department = $1");
    Ok(client
        .query(SQL, &[&department])
        .await?
        .iter()
        .map(from_row)
        .collect())
}

macro_rules! archive_by {
    ($column:literal) => {
        concat!(
            "SELECT ",
            columns!(),
            " FROM tickets \
              WHERE ",
            $column,
            " = $1 \
                AND department = $2 \
                AND executor IS NOT NULL \
                AND status = ANY($3) \
              ORDER BY created_at, number"
        )
    };
}

pub async fn archive(
    client: &impl GenericClient,
    base: &Base,
) -> Result<Vec<Ticket>, Error> {
    const BY_CLIENT: &str = archive_by!("client");
    const BY_DEVICE: &str = archive_by!("device");
    const BY_EXECUTOR: &str = archive_by!("executor");

    let statuses = Status::ALL
        .into_iter()
        .filter(|s| base.bucket.admits(*s))
        .collect::<Vec<_>>();

    let rows = match base.subject {
        Subject::Client(id) => {
            client.query(BY_CLIENT, &[&id, &base.department, &statuses]).await
        }
        Subject::Device(id) => {
            client.query(BY_DEVICE, &[&id, &base.department, &statuses]).await
        }
        Subject::Executor(id) => {
            client
                .query(BY_EXECUTOR, &[&id, &base.department, &statuses])
                .await
        }
    }?;
    Ok(rows.iter().map(from_row).collect())
}
