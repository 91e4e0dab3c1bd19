//! HTTP surface of the engine.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        request, HeaderValue, Method, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, RequestPartsExt as _, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use futures::{future::OptionFuture, FutureExt as _};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error};
use uuid::Uuid;

use crate::{
    api::{self, archive, ticket, Identity},
    catalog::{self, reason},
    config, Engine, Error, Invalid,
};

type SharedAppState = Arc<AppState>;

pub struct AppState {
    engine: Engine,

    jwt_decoding_key: DecodingKey,

    jwt_validation: Validation,
}

/// Builds the application router around `engine`.
pub fn router(
    engine: Engine,
    http: &config::Http,
    jwt: &config::Jwt,
) -> Result<Router, axum::http::header::InvalidHeaderValue> {
    let mut cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);
    for origin in &http.cors.allowed_origins {
        cors = cors.allow_origin(origin.parse::<HeaderValue>()?);
    }

    let mut jwt_validation = Validation::default();
    jwt_validation.leeway = jwt.leeway.as_secs();

    Ok(Router::new()
        .route("/tickets", get(list_tickets).post(add_ticket))
        .route("/tickets/close", post(close_ticket))
        .route("/tickets/archive/:field/:id", get(archive))
        .route(
            "/tickets/:id",
            get(get_ticket).patch(edit_ticket).delete(delete_ticket),
        )
        .route("/tickets/:id/contact", get(get_ticket_contact))
        .route("/reasons", get(list_reasons))
        .route("/reasons/:id", get(get_reason))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(AppState {
            engine,
            jwt_decoding_key: DecodingKey::from_secret(jwt.secret.as_bytes()),
            jwt_validation,
        })))
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Storage(e) => {
                error!("storage failure: {e}");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };
        (status, self.to_string()).into_response()
    }
}

async fn list_tickets(
    State(state): State<SharedAppState>,
    claims: AuthClaims,
) -> Result<Json<Vec<api::Card>>, Error> {
    Ok(Json(state.engine.list_tickets(claims.identity()).await?))
}

async fn add_ticket(
    State(state): State<SharedAppState>,
    claims: AuthClaims,
    Json(mut draft): Json<ticket::Draft>,
) -> Result<Json<api::Details>, Error> {
    draft.author.get_or_insert(claims.user_id);
    let ticket = state.engine.create_ticket(draft).await?;
    Ok(Json(state.engine.details(ticket).await?))
}

async fn get_ticket(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Path(id): Path<ticket::Id>,
) -> Result<Json<api::Details>, Error> {
    Ok(Json(state.engine.ticket(id).await?))
}

async fn edit_ticket(
    State(state): State<SharedAppState>,
    claims: AuthClaims,
    Path(id): Path<ticket::Id>,
    Json(patch): Json<ticket::Patch>,
) -> Result<Json<api::Details>, Error> {
    let ticket = state
        .engine
        .update_ticket(id, &patch, claims.user_id)
        .await?;
    Ok(Json(state.engine.details(ticket).await?))
}

async fn delete_ticket(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Path(id): Path<ticket::Id>,
) -> Result<StatusCode, Error> {
    state.engine.delete_ticket(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn close_ticket(
    State(state): State<SharedAppState>,
    claims: AuthClaims,
    Json(close): Json<ticket::Close>,
) -> Result<Json<ticket::Closed>, Error> {
    let engine = &state.engine;

    let closed = engine.close_ticket(&close, claims.user_id).await?;
    let follow_up =
        OptionFuture::from(closed.follow_up.map(|t| engine.details(t)))
            .map(Option::transpose)
            .await?;

    Ok(Json(ticket::Closed {
        ticket: engine.details(closed.ticket).await?,
        follow_up,
    }))
}

async fn get_ticket_contact(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Path(id): Path<ticket::Id>,
) -> Result<Json<Option<catalog::Contact>>, Error> {
    Ok(Json(state.engine.ticket_contact(id).await?))
}

#[derive(Deserialize)]
struct ArchiveQuery {
    /// JSON-encoded [`archive::Filters`].
    filters: Option<String>,
}

async fn archive(
    State(state): State<SharedAppState>,
    claims: AuthClaims,
    Path((field, id)): Path<(String, Uuid)>,
    Query(ArchiveQuery { filters }): Query<ArchiveQuery>,
) -> Result<Json<archive::Response>, Error> {
    let filters = match filters {
        Some(raw) => serde_json::from_str::<archive::Filters>(&raw)
            .map_err(|e| Invalid::MalformedFilters(e.to_string()))?,
        None => archive::Filters::default(),
    };

    Ok(Json(
        state
            .engine
            .archive(&field, id, &filters, claims.user_id)
            .await?,
    ))
}

async fn list_reasons(
    State(state): State<SharedAppState>,
    _: AuthClaims,
) -> Result<Json<Vec<catalog::Reason>>, Error> {
    Ok(Json(state.engine.reasons().await?))
}

async fn get_reason(
    State(state): State<SharedAppState>,
    _: AuthClaims,
    Path(id): Path<String>,
) -> Result<Json<catalog::Reason>, Error> {
    Ok(Json(state.engine.reason(&reason::Id::from(id)).await?))
}

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::MissingToken | Self::InvalidToken => StatusCode::UNAUTHORIZED,
        }
        .into_response()
    }
}

/// Bearer token claims vouching for the caller's identity.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthClaims {
    pub user_id: api::user::Id,
    pub role: api::user::Role,
    pub exp: i64,
}

impl AuthClaims {
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id,
            role: self.role,
        }
    }
}

#[async_trait]
impl FromRequestParts<SharedAppState> for AuthClaims {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut request::Parts,
        state: &SharedAppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AuthError::MissingToken)?;
        let token_data = decode::<Self>(
            bearer.token(),
            &state.jwt_decoding_key,
            &state.jwt_validation,
        )
        .map_err(|e| {
            debug!("rejected token: {e}");
            AuthError::InvalidToken
        })?;

        Ok(token_data.claims)
    }
}
