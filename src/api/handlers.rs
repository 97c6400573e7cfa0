//! Endpoint handlers for the registry API.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Json;
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde_json::{json, Value};

use super::auth::{require_edit, require_publish, verified_claims};
use super::error::ApiError;
use super::router::AppState;
use super::types::{
    AllVersionsStatusResponse, ListMetadata, ListQuery, ReadQuery, ServerListResponse,
    ServerResponse, StatusUpdateBody,
};
use crate::registry::domain::{
    validate_bulk_transition, validate_transition, ServerDescriptor, ServerStatus, StatusChange,
};
use crate::registry::ports::{
    DescriptorValidator, ServerFilter, ServerStore, StoreError, TokenVerifier,
    DEFAULT_PAGE_LIMIT,
};
use crate::registry::services::RegistryServiceError;

/// Upper cap on the caller-supplied page size.
const MAX_PAGE_LIMIT: i64 = 100;

/// Liveness probe.
pub(super) async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// `GET /servers`: filtered, cursor-paginated listing.
pub(super) async fn list_servers<S, V, C, A>(
    State(state): State<AppState<S, V, C, A>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ServerListResponse>, ApiError>
where
    S: ServerStore + 'static,
    V: DescriptorValidator + 'static,
    C: Clock + Send + Sync + 'static,
    A: TokenVerifier + 'static,
{
    let limit = match query.limit {
        None => DEFAULT_PAGE_LIMIT,
        Some(limit) if (1..=MAX_PAGE_LIMIT).contains(&limit) => limit,
        Some(_) => {
            return Err(ApiError::BadRequest(format!(
                "limit must be between 1 and {MAX_PAGE_LIMIT}"
            )))
        }
    };

    let updated_since = query
        .updated_since
        .as_deref()
        .map(parse_rfc3339)
        .transpose()?;

    let mut filter = ServerFilter {
        substring_name: query.search,
        updated_since,
        // Incremental sync needs to observe deletions, so updated_since
        // flips the default visibility to include deleted rows.
        include_deleted: query.include_deleted.unwrap_or(updated_since.is_some()),
        ..ServerFilter::default()
    };
    match query.version.as_deref() {
        Some("latest") => filter.is_latest = Some(true),
        Some(version) => filter.version = Some(version.to_owned()),
        None => {}
    }

    let page = state
        .registry
        .list_servers(&filter, query.cursor.as_deref(), limit)
        .await?;

    Ok(Json(ServerListResponse {
        servers: page
            .servers
            .into_iter()
            .map(ServerResponse::from_record)
            .collect(),
        metadata: ListMetadata {
            next_cursor: page.next_cursor,
        },
    }))
}

/// `GET /servers/{name}`: latest version of a server.
pub(super) async fn get_server<S, V, C, A>(
    State(state): State<AppState<S, V, C, A>>,
    Path(name): Path<String>,
    Query(query): Query<ReadQuery>,
) -> Result<Json<ServerResponse>, ApiError>
where
    S: ServerStore + 'static,
    V: DescriptorValidator + 'static,
    C: Clock + Send + Sync + 'static,
    A: TokenVerifier + 'static,
{
    let record = state
        .registry
        .get_server_by_name(&name, query.include_deleted)
        .await
        .map_err(|err| not_found_as(err, "Server not found"))?;
    Ok(Json(ServerResponse::from_record(record)))
}

/// `GET /servers/{name}/versions`: every version of a server.
pub(super) async fn list_server_versions<S, V, C, A>(
    State(state): State<AppState<S, V, C, A>>,
    Path(name): Path<String>,
    Query(query): Query<ReadQuery>,
) -> Result<Json<ServerListResponse>, ApiError>
where
    S: ServerStore + 'static,
    V: DescriptorValidator + 'static,
    C: Clock + Send + Sync + 'static,
    A: TokenVerifier + 'static,
{
    let records = state
        .registry
        .get_all_versions(&name, query.include_deleted)
        .await
        .map_err(|err| not_found_as(err, "Server not found"))?;
    Ok(Json(ServerListResponse {
        servers: records
            .into_iter()
            .map(ServerResponse::from_record)
            .collect(),
        metadata: ListMetadata::default(),
    }))
}

/// `GET /servers/{name}/versions/{version}`: one specific version.
pub(super) async fn get_server_version<S, V, C, A>(
    State(state): State<AppState<S, V, C, A>>,
    Path((name, version)): Path<(String, String)>,
    Query(query): Query<ReadQuery>,
) -> Result<Json<ServerResponse>, ApiError>
where
    S: ServerStore + 'static,
    V: DescriptorValidator + 'static,
    C: Clock + Send + Sync + 'static,
    A: TokenVerifier + 'static,
{
    let record = state
        .registry
        .get_server_by_name_and_version(&name, &version, query.include_deleted)
        .await
        .map_err(|err| not_found_as(err, "Server version not found"))?;
    Ok(Json(ServerResponse::from_record(record)))
}

/// `POST /servers`: publish a new server version.
pub(super) async fn publish_server<S, V, C, A>(
    State(state): State<AppState<S, V, C, A>>,
    headers: HeaderMap,
    Json(descriptor): Json<ServerDescriptor>,
) -> Result<Json<ServerResponse>, ApiError>
where
    S: ServerStore + 'static,
    V: DescriptorValidator + 'static,
    C: Clock + Send + Sync + 'static,
    A: TokenVerifier + 'static,
{
    let claims = verified_claims(state.verifier.as_ref(), &headers).await?;
    require_publish(&claims, &descriptor.name)?;
    let record = state.registry.publish(descriptor).await?;
    Ok(Json(ServerResponse::from_record(record)))
}

/// `PUT /servers/{name}/versions/{version}`: replace a descriptor.
pub(super) async fn edit_server<S, V, C, A>(
    State(state): State<AppState<S, V, C, A>>,
    Path((name, version)): Path<(String, String)>,
    headers: HeaderMap,
    Json(descriptor): Json<ServerDescriptor>,
) -> Result<Json<ServerResponse>, ApiError>
where
    S: ServerStore + 'static,
    V: DescriptorValidator + 'static,
    C: Clock + Send + Sync + 'static,
    A: TokenVerifier + 'static,
{
    let claims = verified_claims(state.verifier.as_ref(), &headers).await?;
    let current = state
        .registry
        .get_server_by_name_and_version(&name, &version, true)
        .await
        .map_err(|err| not_found_as(err, "Server version not found"))?;
    require_edit(&claims, current.name())?;

    let record = state
        .registry
        .edit(&name, &version, descriptor, None)
        .await?;
    Ok(Json(ServerResponse::from_record(record)))
}

/// `PATCH /servers/{name}/versions/{version}/status`: single-version
/// status change.
pub(super) async fn update_server_status<S, V, C, A>(
    State(state): State<AppState<S, V, C, A>>,
    Path((name, version)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<StatusUpdateBody>,
) -> Result<Json<ServerResponse>, ApiError>
where
    S: ServerStore + 'static,
    V: DescriptorValidator + 'static,
    C: Clock + Send + Sync + 'static,
    A: TokenVerifier + 'static,
{
    let claims = verified_claims(state.verifier.as_ref(), &headers).await?;
    let current = state
        .registry
        .get_server_by_name_and_version(&name, &version, true)
        .await
        .map_err(|err| not_found_as(err, "Server version not found"))?;
    require_edit(&claims, current.name())?;

    let status = ServerStatus::try_from(body.status.as_str())
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;
    validate_transition(current.meta(), status, body.status_message.as_deref())?;

    let change = StatusChange::from_wire(status, body.status_message);
    let record = state
        .registry
        .set_version_status(&name, &version, change)
        .await?;
    Ok(Json(ServerResponse::from_record(record)))
}

/// `PATCH /servers/{name}/status`: all-versions status change.
pub(super) async fn update_all_versions_status<S, V, C, A>(
    State(state): State<AppState<S, V, C, A>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(body): Json<StatusUpdateBody>,
) -> Result<Json<AllVersionsStatusResponse>, ApiError>
where
    S: ServerStore + 'static,
    V: DescriptorValidator + 'static,
    C: Clock + Send + Sync + 'static,
    A: TokenVerifier + 'static,
{
    let claims = verified_claims(state.verifier.as_ref(), &headers).await?;
    let current = state
        .registry
        .get_server_by_name(&name, true)
        .await
        .map_err(|err| not_found_as(err, "Server not found"))?;
    require_edit(&claims, current.name())?;

    let status = ServerStatus::try_from(body.status.as_str())
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;
    let versions = state
        .registry
        .get_all_versions(&name, true)
        .await
        .map_err(|err| not_found_as(err, "Server not found"))?;
    validate_bulk_transition(
        versions.iter().map(|record| record.meta()),
        status,
        body.status_message.as_deref(),
    )?;

    let change = StatusChange::from_wire(status, body.status_message);
    let records = state.registry.set_all_versions_status(&name, change).await?;
    Ok(Json(AllVersionsStatusResponse {
        updated_count: records.len(),
        servers: records
            .into_iter()
            .map(ServerResponse::from_record)
            .collect(),
    }))
}

fn parse_rfc3339(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|stamp| stamp.with_timezone(&Utc))
        .map_err(|_| {
            ApiError::BadRequest("updated_since must be an RFC 3339 timestamp".to_owned())
        })
}

/// Replaces the generic not-found mapping with an endpoint-specific one.
fn not_found_as(err: RegistryServiceError, message: &str) -> ApiError {
    match err {
        RegistryServiceError::Store(StoreError::NotFound) => {
            ApiError::NotFound(message.to_owned())
        }
        other => ApiError::from(other),
    }
}
