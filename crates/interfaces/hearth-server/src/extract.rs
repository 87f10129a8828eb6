//! Identity and correlation extractors.
//!
//! The actor is resolved by an upstream session layer and forwarded in
//! [`ACTOR_HEADER`]; this server trusts it as-is. The connection id is a
//! client-chosen routing token and is only ever used to address
//! validation feedback.

use std::collections::HashMap;

use axum::async_trait;
use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use hearth_config::{ACTOR_HEADER, CONNECTION_HEADER, CONNECTION_QUERY_PARAM};
use hearth_core::{ActorId, ConnectionId};

use crate::error::ServerError;

/// The actor, if the request carries one. Live views take this and reject
/// anonymous requests themselves.
pub struct MaybeActor(pub Option<ActorId>);

pub struct RequireActor(pub ActorId);

pub struct MaybeConnection(pub Option<ConnectionId>);

pub struct RequireConnection(pub ConnectionId);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for MaybeActor {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(value) = parts.headers.get(ACTOR_HEADER) else {
            return Ok(Self(None));
        };
        let raw = value.to_str().map_err(|_| ServerError::Unauthenticated)?;
        ActorId::parse(raw)
            .map(|actor| Self(Some(actor)))
            .map_err(ServerError::InvalidActor)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequireActor {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let MaybeActor(actor) = MaybeActor::from_request_parts(parts, state).await?;
        actor.map(Self).ok_or(ServerError::Unauthenticated)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for MaybeConnection {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = match parts.headers.get(CONNECTION_HEADER) {
            Some(value) => Some(
                value
                    .to_str()
                    .map_err(|_| ServerError::MissingConnection)?
                    .to_string(),
            ),
            // EventSource cannot set headers, so live views pass it in the query.
            None => Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|Query(mut params)| params.remove(CONNECTION_QUERY_PARAM)),
        };
        raw.map(ConnectionId::parse)
            .transpose()
            .map(Self)
            .map_err(ServerError::InvalidConnection)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequireConnection {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let MaybeConnection(connection) = MaybeConnection::from_request_parts(parts, state).await?;
        connection.map(Self).ok_or(ServerError::MissingConnection)
    }
}
