//! Session event types and broadcasting for real-time exam observation.
//!
//! The presentation layer observes the session exclusively through snapshots
//! and these events; it never mutates state directly. Events are broadcast
//! to all connected WebSocket clients as the session progresses.
//!
//! # Event Types
//!
//! - `connected` - Sent when a client connects, includes the current snapshot
//! - `turn_added` - An examiner or student turn was appended
//! - `grading_applied` - A pending turn was graded; aggregates updated
//! - `session_complete` - The session reached its verdict (fires once)
//! - `session_error` - A session-local error worth surfacing

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::collaborators::SubjectScore;
use crate::session::{ExamPhase, GradingResult, Session, Turn};

// ============================================================================
// Event Payloads
// ============================================================================

/// Payload for the `connected` event.
///
/// Sent immediately when a WebSocket client connects. The session is absent
/// while the orchestrator is idle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectedPayload {
    /// The current session snapshot, if a session exists.
    pub session: Option<Session>,
}

/// Payload for the `turn_added` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnAddedPayload {
    /// The appended turn.
    pub turn: Turn,
    /// The phase after the append.
    pub phase: ExamPhase,
    /// The question cursor after the append.
    pub cursor: usize,
}

/// Payload for the `grading_applied` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingAppliedPayload {
    /// The grading that was attached to the pending turn.
    pub grading: GradingResult,
    /// Running score after the grading.
    pub score: u32,
    /// Maximum attainable score for the session.
    pub max_score: u32,
    /// Streak after the grading.
    pub streak: u32,
}

/// Payload for the `session_complete` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCompletePayload {
    /// Final accumulated score.
    pub final_score: u32,
    /// Maximum attainable score.
    pub max_score: u32,
    /// Per-subject competency breakdown from the analyzer.
    pub breakdown: Vec<SubjectScore>,
}

/// Payload for the `session_error` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionErrorPayload {
    /// Human-readable error message.
    pub message: String,
}

// ============================================================================
// Event Enum
// ============================================================================

/// Session events streamed to the presentation layer.
///
/// All events are serialized as JSON objects with "event" and "payload"
/// fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Sent when a client connects.
    Connected(ConnectedPayload),
    /// Sent when a turn is appended to the transcript.
    TurnAdded(TurnAddedPayload),
    /// Sent when a grading result is applied.
    GradingApplied(GradingAppliedPayload),
    /// Sent exactly once when the session completes.
    SessionComplete(SessionCompletePayload),
    /// Sent when a session-local error occurs.
    SessionError(SessionErrorPayload),
}

impl SessionEvent {
    /// Creates a `Connected` event with the current snapshot.
    #[must_use]
    pub const fn connected(session: Option<Session>) -> Self {
        Self::Connected(ConnectedPayload { session })
    }

    /// Creates a `TurnAdded` event.
    #[must_use]
    pub const fn turn_added(turn: Turn, phase: ExamPhase, cursor: usize) -> Self {
        Self::TurnAdded(TurnAddedPayload {
            turn,
            phase,
            cursor,
        })
    }

    /// Creates a `GradingApplied` event.
    #[must_use]
    pub const fn grading_applied(
        grading: GradingResult,
        score: u32,
        max_score: u32,
        streak: u32,
    ) -> Self {
        Self::GradingApplied(GradingAppliedPayload {
            grading,
            score,
            max_score,
            streak,
        })
    }

    /// Creates a `SessionComplete` event.
    #[must_use]
    pub const fn session_complete(
        final_score: u32,
        max_score: u32,
        breakdown: Vec<SubjectScore>,
    ) -> Self {
        Self::SessionComplete(SessionCompletePayload {
            final_score,
            max_score,
            breakdown,
        })
    }

    /// Creates a `SessionError` event.
    #[must_use]
    pub fn session_error(message: impl Into<String>) -> Self {
        Self::SessionError(SessionErrorPayload {
            message: message.into(),
        })
    }

    /// Returns the event name as a string.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::TurnAdded(_) => "turn_added",
            Self::GradingApplied(_) => "grading_applied",
            Self::SessionComplete(_) => "session_complete",
            Self::SessionError(_) => "session_error",
        }
    }
}

// ============================================================================
// Event Broadcaster
// ============================================================================

/// Broadcasts session events to all connected WebSocket clients.
///
/// Uses a tokio broadcast channel for pub-sub event distribution.
/// Events are not persisted for disconnected clients.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBroadcaster {
    /// Creates a new `EventBroadcaster` with the specified buffer capacity.
    ///
    /// The buffer determines how many events can be queued per subscriber
    /// before old events are dropped.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new subscriber for receiving events.
    ///
    /// Each subscriber maintains its own buffer. If a subscriber falls
    /// behind, it will receive a `Lagged` error and miss some events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Broadcasts an event to all connected subscribers.
    ///
    /// Returns the number of active receivers that will receive the event.
    /// A return value of 0 means no clients are currently connected.
    pub fn send(&self, event: SessionEvent) -> usize {
        // send() returns Err only if there are no receivers, which is fine
        self.sender.send(event).unwrap_or(0)
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

// ============================================================================
// WebSocket Pump
// ============================================================================

/// Maximum number of missed pong responses before disconnecting.
const MAX_MISSED_PONGS: u8 = 3;

/// Heartbeat interval for client liveness pings.
const HEARTBEAT_SECS: u64 = 30;

/// Drives a single WebSocket connection.
///
/// - Sends the given `connected` event immediately
/// - Subscribes to the broadcaster and forwards all events to the client
/// - Sends heartbeat pings every 30 seconds
/// - Closes the connection after 3 missed pongs
pub async fn run_socket(socket: WebSocket, initial: SessionEvent, broadcaster: EventBroadcaster) {
    let (mut sender, mut receiver) = socket.split();

    let connected_json = match serde_json::to_string(&initial) {
        Ok(json) => json,
        Err(e) => {
            warn!("Failed to serialize connected event: {}", e);
            return;
        }
    };

    if sender.send(Message::Text(connected_json)).await.is_err() {
        debug!("Client disconnected before receiving connected event");
        return;
    }

    info!("WebSocket client connected, sent initial snapshot");

    let mut event_receiver = broadcaster.subscribe();
    let mut heartbeat_interval = interval(Duration::from_secs(HEARTBEAT_SECS));
    let mut missed_pongs = 0u8;

    loop {
        tokio::select! {
            // Handle incoming messages (primarily pong responses)
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        missed_pongs = 0;
                        debug!("Received pong from client");
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client requested close");
                        break;
                    }
                    Some(Ok(Message::Text(_) | Message::Binary(_))) => {
                        // Clients drive the exam over HTTP, not the socket
                        debug!("Ignoring client message");
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            debug!("Failed to send pong, client disconnected");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }
                }
            }

            // Forward broadcast events to client
            event = event_receiver.recv() => {
                match event {
                    Ok(session_event) => {
                        let json = match serde_json::to_string(&session_event) {
                            Ok(j) => j,
                            Err(e) => {
                                warn!("Failed to serialize event: {}", e);
                                continue;
                            }
                        };

                        if sender.send(Message::Text(json)).await.is_err() {
                            debug!("Failed to send event, client disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Client fell behind; warn but continue
                        warn!("Client lagged, missed {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Broadcaster closed");
                        break;
                    }
                }
            }

            // Send heartbeat ping
            _ = heartbeat_interval.tick() => {
                if sender.send(Message::Ping(vec![])).await.is_err() {
                    debug!("Failed to send ping, client disconnected");
                    break;
                }
                missed_pongs += 1;
                if missed_pongs >= MAX_MISSED_PONGS {
                    info!("Client missed {} pongs, closing connection", MAX_MISSED_PONGS);
                    break;
                }
            }
        }
    }

    info!("WebSocket client disconnected");
}

// ============================================================================
// Tests
// ============================================================================
