//! REST surface and WebSocket gateway built on axum.

use super::auth::AccessClaims;
use super::events::{ClientMessage, PushEvent};
use super::rooms::{RESPONDER_ROOM, incident_room, personal_room};
use crate::context::AppContext;
use crate::error::{AuthError, BeaconError};
use crate::types::{Coordinates, IncidentStatus, Role};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        Path, Query, State,
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{debug, warn};
use uuid::Uuid;

/// Error responder mapping the core taxonomy onto HTTP statuses.
pub struct ApiError(BeaconError);

impl From<BeaconError> for ApiError {
    fn from(err: BeaconError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self.0 {
            BeaconError::Validation(v) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": v.to_string(), "field": v.field() }),
            ),
            BeaconError::Auth(AuthError::Forbidden { .. }) => (
                StatusCode::FORBIDDEN,
                serde_json::json!({ "error": self.0.to_string() }),
            ),
            BeaconError::Auth(_) => (
                StatusCode::UNAUTHORIZED,
                serde_json::json!({ "error": self.0.to_string() }),
            ),
            BeaconError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                serde_json::json!({ "error": format!("{what} not found") }),
            ),
            BeaconError::Upload(crate::error::UploadError::EmptyClip) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": "empty audio clip" }),
            ),
            _ => {
                warn!(error = %self.0, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "error": "internal server error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Pull and validate the bearer credential from request headers.
fn authenticate(ctx: &AppContext, headers: &HeaderMap) -> Result<AccessClaims, BeaconError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::Missing)?;
    let token = value.strip_prefix("Bearer ").ok_or(AuthError::Missing)?;
    Ok(ctx.auth.validate(token)?)
}

fn require_dispatch_role(
    claims: &AccessClaims,
    action: &'static str,
) -> Result<(), BeaconError> {
    if claims.role.can_dispatch() {
        Ok(())
    } else {
        Err(AuthError::Forbidden {
            role: claims.role.as_str().to_string(),
            action,
        }
        .into())
    }
}

// --- REST handlers ---

#[derive(Debug, Deserialize)]
struct CreateIncidentRequest {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

async fn create_incident(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(req): Json<CreateIncidentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = authenticate(&ctx, &headers)?;
    let latitude = req.latitude.ok_or(BeaconError::Validation(
        crate::error::ValidationError::Missing { field: "latitude" },
    ))?;
    let longitude = req.longitude.ok_or(BeaconError::Validation(
        crate::error::ValidationError::Missing { field: "longitude" },
    ))?;

    let incident = ctx.create.create(claims.subject, latitude, longitude).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "dispatch_id": incident.dispatch_id,
            "status": incident.status,
        })),
    ))
}

async fn list_incidents(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let claims = authenticate(&ctx, &headers)?;
    require_dispatch_role(&claims, "list incidents")?;

    let incidents = ctx.store.all().await.map_err(BeaconError::from)?;
    Ok(Json(serde_json::json!({
        "count": incidents.len(),
        "incidents": incidents,
    })))
}

async fn my_incidents(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let claims = authenticate(&ctx, &headers)?;
    let incidents = ctx
        .store
        .by_owner(claims.subject)
        .await
        .map_err(BeaconError::from)?;
    Ok(Json(serde_json::json!({
        "count": incidents.len(),
        "incidents": incidents,
    })))
}

#[derive(Debug, Deserialize)]
struct NearbyQuery {
    lat: f64,
    lng: f64,
    radius: f64,
}

async fn nearby_incidents(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Query(query): Query<NearbyQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = authenticate(&ctx, &headers)?;
    require_dispatch_role(&claims, "query nearby incidents")?;

    let center =
        Coordinates::new(query.lng, query.lat).map_err(BeaconError::Validation)?;
    let incidents = ctx
        .store
        .nearby(center, query.radius)
        .await
        .map_err(BeaconError::from)?;
    Ok(Json(serde_json::json!({
        "count": incidents.len(),
        "incidents": incidents,
    })))
}

#[derive(Debug, Deserialize)]
struct UpdateStatusRequest {
    status: IncidentStatus,
}

async fn update_status(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = authenticate(&ctx, &headers)?;
    require_dispatch_role(&claims, "update incident status")?;

    let incident = ctx.status.update(id, req.status).await?;
    Ok(Json(serde_json::json!({ "incident": incident })))
}

async fn upload_audio(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    authenticate(&ctx, &headers)?;

    // `id` here is the caller-visible dispatch id, not the row id.
    let (_incident, audio_ref) = ctx.audio.attach(&id, &body).await?;
    Ok(Json(serde_json::json!({ "audio_ref": audio_ref })))
}

async fn health(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "connections": ctx.rooms.connection_count().await,
    }))
}

// --- WebSocket ---

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

/// WebSocket upgrade handler. The credential is validated before the
/// upgrade completes — an unauthenticated connection never joins a room.
async fn ws_handler(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(token) = query.token else {
        return ApiError(BeaconError::Auth(AuthError::Missing)).into_response();
    };
    match ctx.auth.validate(&token) {
        Ok(claims) => ws.on_upgrade(move |socket| handle_socket(socket, ctx, claims)),
        Err(err) => ApiError(BeaconError::Auth(err)).into_response(),
    }
}

/// Handle one authenticated connection for its lifetime.
async fn handle_socket(socket: WebSocket, ctx: Arc<AppContext>, claims: AccessClaims) {
    let connection_id = Uuid::new_v4();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<PushEvent>();

    ctx.rooms
        .join(&personal_room(claims.subject), connection_id, tx.clone())
        .await;
    if claims.role == Role::Responder {
        ctx.rooms.join(RESPONDER_ROOM, connection_id, tx.clone()).await;
        if let Err(err) = ctx.directory.register(claims.subject, claims.role).await {
            warn!(subject = %claims.subject, error = %err, "directory registration failed");
        }
    }
    debug!(subject = %claims.subject, role = claims.role.as_str(), %connection_id, "socket connected");

    // Forward room events to the peer until it goes away.
    let forward = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Ok(json) = serde_json::to_string(&event) else {
                continue;
            };
            if sink.send(WsMessage::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(ws_msg)) = stream.next().await {
        let text = match ws_msg {
            WsMessage::Text(t) => t.to_string(),
            WsMessage::Close(_) => break,
            _ => continue,
        };
        match serde_json::from_str::<ClientMessage>(&text) {
            Ok(msg) => handle_client_message(&ctx, &claims, connection_id, &tx, msg).await,
            Err(err) => debug!(subject = %claims.subject, error = %err, "ignoring malformed message"),
        }
    }

    ctx.rooms.leave_all(connection_id).await;
    forward.abort();
    debug!(subject = %claims.subject, %connection_id, "socket disconnected");
}

async fn handle_client_message(
    ctx: &AppContext,
    claims: &AccessClaims,
    connection_id: Uuid,
    tx: &mpsc::UnboundedSender<PushEvent>,
    msg: ClientMessage,
) {
    match msg {
        ClientMessage::JoinIncidentRoom { dispatch_id } => {
            ctx.rooms
                .join(&incident_room(&dispatch_id), connection_id, tx.clone())
                .await;
        }
        ClientMessage::LiveLocation {
            dispatch_id,
            latitude,
            longitude,
        } => {
            ctx.rooms
                .emit(
                    &incident_room(&dispatch_id),
                    &PushEvent::LiveLocation {
                        dispatch_id,
                        latitude,
                        longitude,
                    },
                )
                .await;
        }
        ClientMessage::PositionReport {
            latitude,
            longitude,
        } => {
            // Only a responder's own connection may move its directory entry.
            if claims.role != Role::Responder {
                return;
            }
            match Coordinates::new(longitude, latitude) {
                Ok(location) => {
                    if let Err(err) = ctx.directory.update_position(claims.subject, location).await
                    {
                        warn!(subject = %claims.subject, error = %err, "position update failed");
                    }
                }
                Err(err) => {
                    debug!(subject = %claims.subject, error = %err, "ignoring bad position report");
                }
            }
        }
    }
}

/// Build the gateway router: REST, WebSocket, and read-only media files.
pub fn router(ctx: Arc<AppContext>) -> Router {
    let media_dir = ctx.config.media.media_dir.clone();
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .route("/api/incidents", post(create_incident).get(list_incidents))
        .route("/api/incidents/mine", get(my_incidents))
        .route("/api/incidents/nearby", get(nearby_incidents))
        .route("/api/incidents/{id}/status", put(update_status))
        .route("/api/incidents/{id}/audio", post(upload_audio))
        .nest_service("/media", ServeDir::new(media_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

/// Bind the configured address and serve until cancelled.
pub async fn run(ctx: Arc<AppContext>) -> Result<(), std::io::Error> {
    let addr = format!("{}:{}", ctx.config.server.host, ctx.config.server.port);
    let app = router(ctx);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    #[test]
    fn test_api_error_status_mapping() {
        let cases: Vec<(BeaconError, StatusCode)> = vec![
            (
                ValidationError::Missing { field: "latitude" }.into(),
                StatusCode::BAD_REQUEST,
            ),
            (AuthError::Missing.into(), StatusCode::UNAUTHORIZED),
            (AuthError::Expired.into(), StatusCode::UNAUTHORIZED),
            (
                AuthError::Forbidden {
                    role: "civilian".into(),
                    action: "list incidents",
                }
                .into(),
                StatusCode::FORBIDDEN,
            ),
            (
                BeaconError::NotFound("incident 1".into()),
                StatusCode::NOT_FOUND,
            ),
            (
                crate::error::UploadError::EmptyClip.into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                crate::error::StoreError::Corrupt("x".into()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let resp = ApiError(err).into_response();
            assert_eq!(resp.status(), expected);
        }
    }

    #[test]
    fn test_bearer_header_required() {
        let ctx_config = crate::config::BeaconConfig::default();
        let store = crate::store::IncidentStore::open_in_memory().unwrap();
        let directory = Arc::new(crate::directory::ResponderDirectory::open_in_memory().unwrap());
        let auth = crate::gateway::TokenAuthority::new(b"secret");
        let ctx = AppContext::assemble(ctx_config, store, directory, auth);

        let headers = HeaderMap::new();
        assert!(matches!(
            authenticate(&ctx, &headers),
            Err(BeaconError::Auth(AuthError::Missing))
        ));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Token abc".parse().unwrap());
        assert!(matches!(
            authenticate(&ctx, &headers),
            Err(BeaconError::Auth(AuthError::Missing))
        ));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer junk".parse().unwrap());
        assert!(matches!(
            authenticate(&ctx, &headers),
            Err(BeaconError::Auth(AuthError::Invalid))
        ));
    }
}
