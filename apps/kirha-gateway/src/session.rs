//! Transport session management for the streamable HTTP server.
//!
//! The manager owns the session registry and decides, per inbound request,
//! whether to reuse an existing session, create a new one (only for a valid
//! `initialize` request without a session id), or reject. Each session keeps
//! an append-only event log of outbound messages so a client that reconnects
//! with `last-event-id` receives exactly the events it missed, in order.
//!
//! In stateless mode there is no registry and no event log: every POST gets a
//! one-shot connection that handles a single request/response cycle.

use std::collections::HashMap;
use std::sync::Arc;

use kirha_mcp::{
    JsonRpcMessage, JsonRpcResponse, McpConnection, McpHandler, McpServerConfig, RequestContext,
    is_initialize_request,
};
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info};
use uuid::Uuid;

/// Capacity of a live resume stream before slow consumers are dropped.
const STREAM_BUFFER: usize = 64;

/// One outbound server event, as stored in a session's log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEvent {
    pub id: u64,
    pub data: String,
}

/// Append-only log of outbound events. Ids are assigned in append order,
/// starting at 1, and are never reused within a session.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<StoredEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, data: String) -> u64 {
        let id = self.events.last().map(|e| e.id).unwrap_or(0) + 1;
        self.events.push(StoredEvent { id, data });
        id
    }

    /// Events strictly after `last_event_id`, in append order. An id that was
    /// never assigned replays nothing; the caller gets live events only.
    pub fn after(&self, last_event_id: u64) -> Vec<StoredEvent> {
        match self.events.iter().position(|e| e.id == last_event_id) {
            Some(i) => self.events[i + 1..].to_vec(),
            None => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

struct Session {
    id: String,
    conn: McpConnection,
    log: EventLog,
    live: Option<mpsc::Sender<StoredEvent>>,
}

impl Session {
    /// Log an outbound response and forward it to an attached resume stream.
    /// A closed or saturated stream is detached; the log keeps the event.
    fn record_outbound(&mut self, resp: &JsonRpcResponse) {
        let Ok(data) = serde_json::to_string(resp) else {
            return;
        };
        let id = self.log.append(data.clone());

        if let Some(tx) = &self.live
            && tx.try_send(StoredEvent { id, data }).is_err()
        {
            debug!(session_id = %self.id, "resume stream gone; detaching");
            self.live = None;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Stateful,
    Stateless,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Bad Request: No valid session ID provided")]
    InvalidSession,
    #[error("streaming is not supported in stateless mode")]
    StreamingUnsupported,
}

/// Outcome of a POSTed message.
#[derive(Debug)]
pub enum PostOutcome {
    /// A response to return to the caller. `new_session` is set when this
    /// request created the session (i.e. it was an initialize).
    Response {
        response: JsonRpcResponse,
        new_session: Option<String>,
    },
    /// Notification accepted; nothing to send back.
    Accepted,
}

/// A resumed event stream: logged events to replay first, then live events.
pub struct ResumeStream {
    pub replayed: Vec<StoredEvent>,
    pub live: mpsc::Receiver<StoredEvent>,
}

/// Owns the session registry. Created at server start, dropped at shutdown;
/// entries are removed one by one as transports close.
pub struct SessionManager {
    cfg: McpServerConfig,
    handler: Arc<dyn McpHandler>,
    mode: SessionMode,
    sessions: Mutex<HashMap<String, Arc<Mutex<Session>>>>,
}

impl SessionManager {
    pub fn new(cfg: McpServerConfig, handler: Arc<dyn McpHandler>, mode: SessionMode) -> Self {
        Self {
            cfg,
            handler,
            mode,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.lock().await.contains_key(session_id)
    }

    /// Route a POSTed message: reuse a known session, create one for an
    /// initialize request without an id, or reject.
    pub async fn handle_post(
        &self,
        session_id: Option<&str>,
        ctx: &RequestContext,
        msg: JsonRpcMessage,
    ) -> Result<PostOutcome, SessionError> {
        if self.mode == SessionMode::Stateless {
            return self.handle_stateless(ctx, msg).await;
        }

        if let Some(sid) = session_id {
            // Reuse. The registry lock is released before the handler runs so
            // sessions stay independent of each other.
            let session = self
                .sessions
                .lock()
                .await
                .get(sid)
                .cloned()
                .ok_or(SessionError::InvalidSession)?;

            let mut s = session.lock().await;
            return match s.conn.handle_message(ctx, msg).await {
                Some(resp) => {
                    s.record_outbound(&resp);
                    Ok(PostOutcome::Response {
                        response: resp,
                        new_session: None,
                    })
                }
                None => Ok(PostOutcome::Accepted),
            };
        }

        if !is_initialize_request(&msg) {
            return Err(SessionError::InvalidSession);
        }

        // Create. The session is fully constructed (connection built, the
        // initialize payload answered, response logged) before the registry
        // insertion, so no request can observe a half-created session.
        let sid = Uuid::new_v4().to_string();
        let mut conn = McpConnection::new(self.cfg.clone(), self.handler.clone());
        let Some(resp) = conn.handle_message(ctx, msg).await else {
            // initialize is a request; a response is always produced.
            return Err(SessionError::InvalidSession);
        };

        let mut session = Session {
            id: sid.clone(),
            conn,
            log: EventLog::new(),
            live: None,
        };
        session.record_outbound(&resp);

        self.sessions
            .lock()
            .await
            .insert(sid.clone(), Arc::new(Mutex::new(session)));
        info!(session_id = %sid, "session initialized");

        Ok(PostOutcome::Response {
            response: resp,
            new_session: Some(sid),
        })
    }

    async fn handle_stateless(
        &self,
        ctx: &RequestContext,
        msg: JsonRpcMessage,
    ) -> Result<PostOutcome, SessionError> {
        // One-shot connection per request. Initialize goes through the normal
        // lifecycle; anything else gets a connection with the gate already open.
        let mut conn = if is_initialize_request(&msg) {
            McpConnection::new(self.cfg.clone(), self.handler.clone())
        } else {
            McpConnection::new_ready(self.cfg.clone(), self.handler.clone())
        };

        match conn.handle_message(ctx, msg).await {
            Some(resp) => Ok(PostOutcome::Response {
                response: resp,
                new_session: None,
            }),
            None => Ok(PostOutcome::Accepted),
        }
    }

    /// Attach a resume stream to a session. Requires a known session id; no
    /// body is involved. Replayed events are captured under the session lock,
    /// so nothing can slip between replay and the live edge.
    pub async fn handle_resume(
        &self,
        session_id: Option<&str>,
        last_event_id: Option<u64>,
    ) -> Result<ResumeStream, SessionError> {
        if self.mode == SessionMode::Stateless {
            return Err(SessionError::StreamingUnsupported);
        }

        let sid = session_id.ok_or(SessionError::InvalidSession)?;
        let session = self
            .sessions
            .lock()
            .await
            .get(sid)
            .cloned()
            .ok_or(SessionError::InvalidSession)?;

        let mut s = session.lock().await;
        let replayed = match last_event_id {
            Some(last) => s.log.after(last),
            None => Vec::new(),
        };

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        // A reconnect replaces any previous stream; dropping the old sender
        // ends the stale response body.
        s.live = Some(tx);

        Ok(ResumeStream { replayed, live: rx })
    }

    /// Remove a session. Idempotent: closing an already-closed session is a
    /// no-op, and the id is never revived.
    pub async fn teardown(&self, session_id: &str) -> bool {
        let removed = self.sessions.lock().await.remove(session_id).is_some();
        if removed {
            info!(session_id, "session closed");
        }
        removed
    }
}
