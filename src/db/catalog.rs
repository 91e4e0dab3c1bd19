use tokio_postgres::{types::ToSql, Error, GenericClient, Row};

use crate::{
    catalog::{
        contact, reason, user, Catalog, Client, Contact, Department, Device,
        Keys, Reason, User,
    },
    ticket, Missing,
};

fn user_from_row(row: &Row) -> User {
    User {
        id: row.get("id"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        department: row.get("department"),
        latest_ticket: row.get("latest_ticket"),
    }
}

fn reason_from_row(row: &Row) -> Reason {
    Reason {
        id: row.get("id"),
        title: row.get("title"),
        past: row.get("past"),
        present: row.get("present"),
        future: row.get("future"),
    }
}

pub async fn user(
    client: &impl GenericClient,
    id: user::Id,
) -> Result<Option<User>, Error> {
    const SQL: &str = "\
        SELECT id, first_name, last_name, department, latest_ticket \
        FROM users \
        WHERE id = $1";
    Ok(client.query_opt(SQL, &[&id]).await?.as_ref().map(user_from_row))
}

/// Points `user`'s latest ticket at `ticket`.
///
/// Fails with [`Missing::User`] if there is no such user, so that the
/// enclosing transaction is rolled back.
pub async fn stamp_latest_ticket(
    client: &impl GenericClient,
    user: user::Id,
    ticket: ticket::Id,
) -> Result<(), crate::Error> {
    const SQL: &str = "UPDATE users SET latest_ticket = $2 WHERE id = $1";
    match client.execute(SQL, &[&user, &ticket]).await? {
        0 => Err(Missing::User(user).into()),
        _ => Ok(()),
    }
}

pub async fn contact(
    client: &impl GenericClient,
    id: contact::Id,
) -> Result<Option<Contact>, Error> {
    const SQL: &str = "\
        SELECT id, name, position, phone, email \
        FROM contacts \
        WHERE id = $1";
    Ok(client.query_opt(SQL, &[&id]).await?.map(|row| Contact {
        id: row.get("id"),
        name: row.get("name"),
        position: row.get("position"),
        phone: row.get("phone"),
        email: row.get("email"),
    }))
}

pub async fn reason(
    client: &impl GenericClient,
    id: &reason::Id,
) -> Result<Option<Reason>, Error> {
    const SQL: &str = "\
        SELECT id, title, past, present, future \
        FROM ticket_reasons \
        WHERE id = $1";
    Ok(client.query_opt(SQL, &[id]).await?.as_ref().map(reason_from_row))
}

pub async fn reasons(
    client: &impl GenericClient,
) -> Result<Vec<Reason>, Error> {
    const SQL: &str = "\
        SELECT id, title, past, present, future \
        FROM ticket_reasons \
        ORDER BY id";
    Ok(client.query(SQL, &[]).await?.iter().map(reason_from_row).collect())
}

/// Resolves all `keys`, one query per kind of entity.
pub async fn resolve(
    client: &impl GenericClient,
    keys: &Keys,
) -> Result<Catalog, Error> {
    const USERS: &str = "\
        SELECT id, first_name, last_name, department, latest_ticket \
        FROM users \
        WHERE id = ANY($1)";
    const DEPARTMENTS: &str = "\
        SELECT id, title \
        FROM departments \
        WHERE id = ANY($1)";
    const CLIENTS: &str = "\
        SELECT id, title, address \
        FROM clients \
        WHERE id = ANY($1)";
    const DEVICES: &str = "\
        SELECT d.id, d.serial_number, c.title AS model \
        FROM devices d \
        LEFT JOIN classificators c ON d.classificator = c.id \
        WHERE d.id = ANY($1)";
    const REASONS: &str = "\
        SELECT id, title, past, present, future \
        FROM ticket_reasons \
        WHERE id = ANY($1)";

    // Parameter slices must outlive the joined futures.
    let users = [&keys.users as &(dyn ToSql + Sync)];
    let departments = [&keys.departments as &(dyn ToSql + Sync)];
    let clients = [&keys.clients as &(dyn ToSql + Sync)];
    let devices = [&keys.devices as &(dyn ToSql + Sync)];
    let reasons = [&keys.reasons as &(dyn ToSql + Sync)];

    let (users, departments, clients, devices, reasons) = tokio::try_join!(
        client.query(USERS, &users),
        client.query(DEPARTMENTS, &departments),
        client.query(CLIENTS, &clients),
        client.query(DEVICES, &devices),
        client.query(REASONS, &reasons),
    )?;

    Ok(Catalog {
        users: users
            .iter()
            .map(|row| (row.get("id"), user_from_row(row)))
            .collect(),
        departments: departments
            .iter()
            .map(|row| {
                let id = row.get("id");
                (id, Department { id, title: row.get("title") })
            })
            .collect(),
        clients: clients
            .iter()
            .map(|row| {
                let id = row.get("id");
                let client = Client {
                    id,
                    title: row.get("title"),
                    address: row.get("address"),
                };
                (id, client)
            })
            .collect(),
        devices: devices
            .iter()
            .map(|row| {
                let id = row.get("id");
                let device = Device {
                    id,
                    serial_number: row.get("serial_number"),
                    model: row.get("model"),
                };
                (id, device)
            })
            .collect(),
        reasons: reasons
            .iter()
            .map(|row| (row.get("id"), reason_from_row(row)))
            .collect(),
    })
}
