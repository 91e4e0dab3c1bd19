pub mod common;

use common::{Server, ALICE, BOB, CAROL, FRONT_DESK};
use field_desk::{api, ticket::Status};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn resolves_references() {
    let server = Server::start().await;
    let carol = server.client(CAROL, "coordinator");
    let mut draft = common::draft();
    draft["contactPerson"] = json!(common::uuid(FRONT_DESK));
    draft["executor"] = json!(common::uuid(BOB));
    draft["assignedBy"] = json!(common::uuid(CAROL));
    let created = carol.add_ticket(&draft).await.unwrap();

    let alice = server.client(ALICE, "user");
    let ticket = alice.get_ticket(created.id).await.unwrap();

    assert_eq!(ticket, created);
    assert_eq!(ticket.status, Status::Created);
    assert_eq!(ticket.reason_id.as_str(), "maintenance");
    assert_eq!(ticket.reason.as_deref(), Some("Maintenance planned"));
    assert_eq!(
        ticket.executor,
        Some(api::User {
            id: BOB.into(),
            name: "Bob Builder".into(),
        }),
    );
    assert_eq!(ticket.assigned_by.unwrap().name, "Carol Cole");
    let client = ticket.client.unwrap();
    assert_eq!(client.name, "Acme");
    assert_eq!(client.address, "1 Main St");
    let device = ticket.device.unwrap();
    assert_eq!(device.serial_number, "SN-1");
    assert_eq!(device.model.as_deref(), Some("P-100"));
    let contact = ticket.contact_person.unwrap();
    assert_eq!(contact.position.as_deref(), Some("Reception"));
}

#[tokio::test]
async fn returns_contact_person() {
    let server = Server::start().await;
    let alice = server.client(ALICE, "user");

    let mut draft = common::draft();
    draft["contactPerson"] = json!(common::uuid(FRONT_DESK));
    let with_contact = alice.add_ticket(&draft).await.unwrap();
    let without_contact = alice.add_ticket(&common::draft()).await.unwrap();

    let contact = alice.ticket_contact(with_contact.id).await.unwrap();
    assert_eq!(contact.unwrap().email, "desk@acme.test");
    assert_eq!(alice.ticket_contact(without_contact.id).await.unwrap(), None);

    let status = alice
        .ticket_contact(common::uuid(999).into())
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reports_missing_ticket() {
    let server = Server::start().await;
    let alice = server.client(ALICE, "user");

    let status = alice
        .get_ticket(common::uuid(999).into())
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deletes_ticket() {
    let server = Server::start().await;
    let alice = server.client(ALICE, "user");
    let ticket = alice.add_ticket(&common::draft()).await.unwrap();

    alice.delete_ticket(ticket.id).await.unwrap();
    let status = alice.get_ticket(ticket.id).await.unwrap_err();
    assert_eq!(status, StatusCode::NOT_FOUND);

    alice.delete_ticket(ticket.id).await.unwrap();
}

#[tokio::test]
async fn lists_reasons() {
    let server = Server::start().await;
    let alice = server.client(ALICE, "user");

    let reasons = alice.reasons().await.unwrap();
    let ids = reasons.iter().map(|r| r.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, ["maintenance", "repair"]);

    let repair = alice.reason("repair").await.unwrap();
    assert_eq!(repair.title, "Repair");
    assert_eq!(repair.past.as_deref(), Some("Repaired"));
    assert_eq!(repair.present.as_deref(), Some("Repairing"));
    assert_eq!(repair.future.as_deref(), Some("To repair"));

    let status = alice.reason("unknown").await.unwrap_err();
    assert_eq!(status, StatusCode::NOT_FOUND);
}
