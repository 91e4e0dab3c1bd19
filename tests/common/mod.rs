use std::{fmt::Display, net::SocketAddr};

use constcat::concat;
use field_desk::{
    api::{self, archive},
    catalog::{self, user},
    config, server,
    store::memory,
    ticket::{Id, Status, Ticket},
    Engine,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use time::{macros::datetime, Duration, OffsetDateTime};
use tokio::{net, task};
use uuid::Uuid;

const SECRET: &str = "integration-secret";

const TICKETS: &str = "/tickets";
const CLOSE: &str = concat!(TICKETS, "/close");
const ARCHIVE: &str = concat!(TICKETS, "/archive");
const REASONS: &str = "/reasons";

pub const HOME: u128 = 1;
pub const AWAY: u128 = 2;

/// Field engineer of [`HOME`].
pub const ALICE: u128 = 11;
/// Field engineer of [`HOME`].
pub const BOB: u128 = 12;
/// Coordinator of [`HOME`].
pub const CAROL: u128 = 13;
/// Coordinator of [`AWAY`].
pub const DAVE: u128 = 14;
/// Belongs to no department.
pub const EVE: u128 = 15;

pub const ACME: u128 = 21;
pub const GLOBEX: u128 = 22;

pub const PUMP: u128 = 31;
pub const BOILER: u128 = 32;

pub const FRONT_DESK: u128 = 41;

pub fn uuid(id: u128) -> Uuid {
    Uuid::from_u128(id)
}

/// Minimal intake payload for a ticket against [`ACME`]'s [`PUMP`].
pub fn draft() -> Value {
    json!({
        "client": uuid(ACME),
        "device": uuid(PUMP),
        "reason": "maintenance",
        "ticketType": "service",
        "description": "noisy pump",
    })
}

/// Stored ticket of [`HOME`] run by [`ALICE`], to be tweaked and seeded.
pub fn ticket(number: i64, status: Status) -> Ticket {
    Ticket {
        id: Id::from(1000 + number as u128),
        number,
        ticket_type: "service".into(),
        reason: "maintenance".into(),
        urgent: false,
        client: ACME.into(),
        device: PUMP.into(),
        contact_person: None,
        author: CAROL.into(),
        department: Some(HOME.into()),
        assigned_by: Some(CAROL.into()),
        executor: Some(ALICE.into()),
        created_at: datetime!(2024-01-10 09:00 UTC),
        assigned_at: None,
        planned_start: None,
        planned_end: None,
        assigned_start: None,
        assigned_end: None,
        work_started_at: None,
        work_finished_at: None,
        closed_at: status
            .is_terminal()
            .then_some(datetime!(2024-01-20 18:00 UTC)),
        status,
        result: None,
        recommendation: None,
        used_materials: Vec::new(),
        description: None,
        reference_ticket: None,
        double_signed: false,
    }
}

fn seed(store: &memory::Store) {
    for (id, title) in [(HOME, "Service"), (AWAY, "Repairs")] {
        store.insert_department(catalog::Department {
            id: id.into(),
            title: title.into(),
        });
    }

    for (id, first_name, last_name, department) in [
        (ALICE, "Alice", "Archer", Some(HOME)),
        (BOB, "Bob", "Builder", Some(HOME)),
        (CAROL, "Carol", "Cole", Some(HOME)),
        (DAVE, "Dave", "Dunn", Some(AWAY)),
        (EVE, "Eve", "", None),
    ] {
        store.insert_user(catalog::User {
            id: id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            department: department.map(Into::into),
            latest_ticket: None,
        });
    }

    for (id, title, address) in [
        (ACME, "Acme", "1 Main St"),
        (GLOBEX, "Globex", "2 Side St"),
    ] {
        store.insert_client(catalog::Client {
            id: id.into(),
            title: title.into(),
            address: address.into(),
        });
    }

    for (id, serial_number, model) in
        [(PUMP, "SN-1", "P-100"), (BOILER, "SN-2", "B-200")]
    {
        store.insert_device(catalog::Device {
            id: id.into(),
            serial_number: serial_number.into(),
            model: Some(model.into()),
        });
    }

    store.insert_contact(catalog::Contact {
        id: FRONT_DESK.into(),
        name: "Front Desk".into(),
        position: Some("Reception".into()),
        phone: "+1 555 0100".into(),
        email: "desk@acme.test".into(),
    });

    store.insert_reason(catalog::Reason {
        id: "maintenance".into(),
        title: "Maintenance".into(),
        past: Some("Maintenance done".into()),
        present: Some("Doing maintenance".into()),
        future: Some("Maintenance planned".into()),
    });
    store.insert_reason(catalog::Reason {
        id: "repair".into(),
        title: "Repair".into(),
        past: Some("Repaired".into()),
        present: Some("Repairing".into()),
        future: Some("To repair".into()),
    });
}

/// Application served on an ephemeral port over a seeded in-memory store.
pub struct Server {
    pub store: memory::Store,
    addr: SocketAddr,
}

impl Server {
    pub async fn start() -> Self {
        let store = memory::Store::new();
        seed(&store);

        let http = config::Http {
            server: config::Server {
                addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            },
            cors: config::Cors {
                allowed_origins: Vec::new(),
            },
        };
        let jwt = config::Jwt {
            secret: SECRET.into(),
            leeway: std::time::Duration::ZERO,
        };
        let app = server::router(Engine::new(store.clone()), &http, &jwt)
            .expect("failed to build the router");

        let listener = net::TcpListener::bind(http.server.addr)
            .await
            .expect("failed to bind");
        let addr = listener.local_addr().expect("no local address");
        task::spawn(async move {
            axum::serve(listener, app).await.expect("server failed");
        });

        Self { store, addr }
    }

    pub fn seed_ticket(&self, ticket: Ticket) -> Ticket {
        self.store.insert_ticket(ticket.clone());
        ticket
    }

    /// Client authenticated as `user` with `role`.
    pub fn client(&self, user: u128, role: &str) -> Client {
        self.client_with_expiry(
            user,
            role,
            OffsetDateTime::now_utc() + Duration::hours(1),
        )
    }

    pub fn client_with_expiry(
        &self,
        user: u128,
        role: &str,
        expires_at: OffsetDateTime,
    ) -> Client {
        let claims = json!({
            "userId": user::Id::from(user),
            "role": role,
            "exp": expires_at.unix_timestamp(),
        });
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .expect("failed to sign a token");

        Client {
            auth_token: Some(token),
            ..self.anonymous()
        }
    }

    pub fn anonymous(&self) -> Client {
        Client {
            inner: reqwest::Client::new(),
            base_url: format!("http://{}", self.addr),
            auth_token: None,
        }
    }
}

pub struct Client {
    inner: reqwest::Client,
    base_url: String,
    pub auth_token: Option<String>,
}

impl Client {
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self
            .inner
            .request(method, format!("{}{path}", self.base_url));
        if let Some(token) = &self.auth_token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }
        req
    }

    async fn send<T: DeserializeOwned>(
        req: RequestBuilder,
    ) -> Result<T, StatusCode> {
        Ok(req
            .send()
            .await
            .expect("failed to send a request")
            .error_for_status()
            .map_err(|e| e.status().expect("status error"))?
            .json::<T>()
            .await
            .expect("failed to get a response"))
    }

    pub async fn list_tickets(&self) -> Result<Vec<api::Card>, StatusCode> {
        Self::send(self.request(Method::GET, TICKETS)).await
    }

    pub async fn add_ticket(
        &self,
        draft: &Value,
    ) -> Result<api::Details, StatusCode> {
        Self::send(self.request(Method::POST, TICKETS).json(draft)).await
    }

    pub async fn get_ticket(&self, id: Id) -> Result<api::Details, StatusCode> {
        Self::send(self.request(Method::GET, &format!("{TICKETS}/{id}"))).await
    }

    pub async fn edit_ticket(
        &self,
        id: Id,
        patch: &Value,
    ) -> Result<api::Details, StatusCode> {
        let req = self.request(Method::PATCH, &format!("{TICKETS}/{id}"));
        Self::send(req.json(patch)).await
    }

    /// Walks the ticket through `statuses` one patch at a time.
    pub async fn advance(
        &self,
        id: Id,
        statuses: &[&str],
    ) -> Result<api::Details, StatusCode> {
        let mut details = self.get_ticket(id).await?;
        for status in statuses {
            details = self.edit_ticket(id, &json!({ "status": status })).await?;
        }
        Ok(details)
    }

    pub async fn delete_ticket(&self, id: Id) -> Result<(), StatusCode> {
        self.request(Method::DELETE, &format!("{TICKETS}/{id}"))
            .send()
            .await
            .expect("failed to send a request")
            .error_for_status()
            .map_err(|e| e.status().expect("status error"))
            .map(drop)
    }

    pub async fn close_ticket(
        &self,
        close: &Value,
    ) -> Result<api::ticket::Closed, StatusCode> {
        Self::send(self.request(Method::POST, CLOSE).json(close)).await
    }

    pub async fn ticket_contact(
        &self,
        id: Id,
    ) -> Result<Option<catalog::Contact>, StatusCode> {
        let path = format!("{TICKETS}/{id}/contact");
        Self::send(self.request(Method::GET, &path)).await
    }

    pub async fn archive(
        &self,
        field: &str,
        id: impl Display,
        filters: Option<&Value>,
    ) -> Result<archive::Response, StatusCode> {
        let mut req =
            self.request(Method::GET, &format!("{ARCHIVE}/{field}/{id}"));
        if let Some(filters) = filters {
            req = req.query(&[("filters", filters.to_string())]);
        }
        Self::send(req).await
    }

    /// Archive request with a raw, possibly malformed, `filters` parameter.
    pub async fn archive_raw(
        &self,
        field: &str,
        id: impl Display,
        filters: &str,
    ) -> Result<archive::Response, StatusCode> {
        let req = self
            .request(Method::GET, &format!("{ARCHIVE}/{field}/{id}"))
            .query(&[("filters", filters)]);
        Self::send(req).await
    }

    pub async fn reasons(&self) -> Result<Vec<catalog::Reason>, StatusCode> {
        Self::send(self.request(Method::GET, REASONS)).await
    }

    pub async fn reason(
        &self,
        id: &str,
    ) -> Result<catalog::Reason, StatusCode> {
        Self::send(self.request(Method::GET, &format!("{REASONS}/{id}"))).await
    }
}
