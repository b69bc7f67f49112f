use std::{collections::HashSet, sync::Arc, time::SystemTime};

use async_stream::stream;
use futures::{Stream, future::BoxFuture};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::{
    backend::{BackendError, BackendResult, RoomBackend, Subscription},
    dto::{EventEnvelope, RoomSnapshotDto},
    state::{PlayerId, RoomId},
};

use super::{
    config::ParseConfig,
    error::{ParseError, ParseResult},
};

const EVENT_CLASS_PATH: &str = "classes/Event";
const EVENT_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
struct FunctionResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct QueryResponse<T> {
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct RoomIdResult {
    #[serde(rename = "roomId")]
    room_id: RoomId,
}

#[derive(Debug, Deserialize)]
struct CurrentUser {
    #[serde(rename = "objectId")]
    object_id: PlayerId,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    error: String,
}

/// [`RoomBackend`] over the Parse REST API.
///
/// Cloud functions drive the room lifecycle. Live queries are emulated with
/// REST polls at [`ParseConfig::push_poll_interval`].
#[derive(Clone)]
pub struct ParseBackend {
    client: Client,
    server_url: Arc<str>,
    application_id: Arc<str>,
    rest_key: Option<Arc<str>>,
    session_token: Option<Arc<str>>,
    push_poll_interval: Duration,
}

impl ParseBackend {
    /// Build the HTTP client for `config`.
    pub fn connect(config: ParseConfig) -> ParseResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| ParseError::ClientBuilder { source })?;

        Ok(Self {
            client,
            server_url: Arc::from(config.server_url.trim_end_matches('/')),
            application_id: Arc::from(config.application_id),
            rest_key: config.rest_key.map(Arc::from),
            session_token: config.session_token.map(Arc::from),
            push_poll_interval: config.push_poll_interval,
        })
    }

    /// Id of the user owning the configured session token.
    pub async fn current_user(&self) -> ParseResult<PlayerId> {
        let user: CurrentUser = self
            .send_json(Method::GET, "users/me", |builder| builder)
            .await?;
        Ok(user.object_id)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.server_url, path);
        let mut builder = self
            .client
            .request(method, url)
            .header("X-Parse-Application-Id", self.application_id.as_ref());
        if let Some(ref key) = self.rest_key {
            builder = builder.header("X-Parse-REST-API-Key", key.as_ref());
        }
        if let Some(ref token) = self.session_token {
            builder = builder.header("X-Parse-Session-Token", token.as_ref());
        }
        builder
    }

    async fn send_json<T, F>(&self, method: Method, path: &str, prepare: F) -> ParseResult<T>
    where
        T: DeserializeOwned,
        F: FnOnce(RequestBuilder) -> RequestBuilder,
    {
        let response = prepare(self.request(method, path))
            .send()
            .await
            .map_err(|source| ParseError::RequestSend {
                path: path.to_string(),
                source,
            })?;
        let response = check_status(path, response).await?;
        response
            .json::<T>()
            .await
            .map_err(|source| ParseError::DecodeResponse {
                path: path.to_string(),
                source,
            })
    }

    async fn call_function<T>(&self, name: &str, params: Value) -> ParseResult<T>
    where
        T: DeserializeOwned,
    {
        let path = format!("functions/{name}");
        let response: FunctionResponse<T> = self
            .send_json(Method::POST, &path, |builder| builder.json(&params))
            .await?;
        Ok(response.result)
    }

    async fn fetch_room(&self, room_id: &str) -> ParseResult<RoomSnapshotDto> {
        let path = format!("classes/Room/{room_id}");
        self.send_json(Method::GET, &path, |builder| builder).await
    }

    async fn events_since(&self, room_id: &str, cursor: &str) -> ParseResult<Vec<EventEnvelope>> {
        let filter = json!({
            "room": {"__type": "Pointer", "className": "Room", "objectId": room_id},
            "createdAt": {"$gte": {"__type": "Date", "iso": cursor}},
        });
        let query = [
            ("where", filter.to_string()),
            ("order", "createdAt".to_string()),
            ("limit", EVENT_PAGE_SIZE.to_string()),
        ];
        let page: QueryResponse<EventEnvelope> = self
            .send_json(Method::GET, EVENT_CLASS_PATH, |builder| builder.query(&query))
            .await?;
        Ok(page.results)
    }

    /// Events created after the subscription started, oldest first.
    fn event_stream(
        self,
        room_id: RoomId,
    ) -> impl Stream<Item = BackendResult<EventEnvelope>> + Send {
        stream! {
            let mut cursor = format_system_time(SystemTime::now());
            // Ids already delivered with a creation time equal to the cursor.
            let mut delivered: HashSet<String> = HashSet::new();
            let mut ticker = interval(self.push_poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let events = match self.events_since(&room_id, &cursor).await {
                    Ok(events) => events,
                    Err(err) => {
                        yield Err(BackendError::from(err));
                        continue;
                    }
                };
                for event in events {
                    let id = event.object_id.clone().unwrap_or_default();
                    match event.created_at.as_deref() {
                        Some(created_at) if created_at != cursor => {
                            cursor = created_at.to_string();
                            delivered.clear();
                        }
                        _ => {}
                    }
                    if !delivered.insert(id) {
                        continue;
                    }
                    yield Ok(event);
                }
            }
        }
    }

    /// Room document, emitted on first sight and whenever it changes.
    fn room_stream(
        self,
        room_id: RoomId,
    ) -> impl Stream<Item = BackendResult<RoomSnapshotDto>> + Send {
        stream! {
            let mut last: Option<RoomSnapshotDto> = None;
            let mut ticker = interval(self.push_poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match self.fetch_room(&room_id).await {
                    Ok(room) if last.as_ref() == Some(&room) => {}
                    Ok(room) => {
                        last = Some(room.clone());
                        yield Ok(room);
                    }
                    Err(err) => {
                        yield Err(BackendError::from(err));
                    }
                }
            }
        }
    }
}

async fn check_status(path: &str, response: Response) -> ParseResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.json::<ErrorBody>().await.unwrap_or_default();
    Err(ParseError::from_body(path, status, body.code, body.error))
}

/// RFC 3339 rendering used in query cursors.
fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

impl RoomBackend for ParseBackend {
    fn create_or_join_room(&self, code: String) -> BoxFuture<'static, BackendResult<RoomId>> {
        let backend = self.clone();
        Box::pin(async move {
            let result: RoomIdResult = backend
                .call_function("createOrJoinRoom", json!({ "code": code }))
                .await?;
            info!(room_id = %result.room_id, %code, "room created or joined");
            Ok(result.room_id)
        })
    }

    fn join_existing_room(&self, code: String) -> BoxFuture<'static, BackendResult<RoomId>> {
        let backend = self.clone();
        Box::pin(async move {
            let result: RoomIdResult = backend
                .call_function("joinExistingRoom", json!({ "code": code }))
                .await?;
            info!(room_id = %result.room_id, %code, "joined room");
            Ok(result.room_id)
        })
    }

    fn fetch_snapshot(&self, room_id: RoomId) -> BoxFuture<'static, BackendResult<RoomSnapshotDto>> {
        let backend = self.clone();
        Box::pin(async move {
            let snapshot = backend
                .call_function("getRoomState", json!({ "roomId": room_id }))
                .await?;
            Ok(snapshot)
        })
    }

    fn subscribe_events(
        &self,
        room_id: RoomId,
    ) -> BoxFuture<'static, BackendResult<Subscription<EventEnvelope>>> {
        let backend = self.clone();
        Box::pin(async move {
            debug!(%room_id, "polling events");
            Ok(Subscription::new(backend.event_stream(room_id)))
        })
    }

    fn subscribe_snapshots(
        &self,
        room_id: RoomId,
    ) -> BoxFuture<'static, BackendResult<Subscription<RoomSnapshotDto>>> {
        let backend = self.clone();
        Box::pin(async move {
            debug!(%room_id, "polling room document");
            Ok(Subscription::new(backend.room_stream(room_id)))
        })
    }

    fn submit_hit(
        &self,
        room_id: RoomId,
        objective_id: String,
        player_id: PlayerId,
    ) -> BoxFuture<'static, BackendResult<()>> {
        let backend = self.clone();
        Box::pin(async move {
            let _: Value = backend
                .call_function(
                    "hitTarget",
                    json!({ "roomId": room_id, "spawnId": objective_id, "player": player_id }),
                )
                .await?;
            Ok(())
        })
    }
}
