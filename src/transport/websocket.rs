//! WebSocket transport
//!
//! This file implements the per-connection session binding one WebSocket to
//! the broker core. Responsibilities:
//! - Upgrade connections at `/ws` and split them into reader and writer
//! - Drain the bounded outbox channel into the socket, with keepalive pings
//! - Parse protocol JSON requests and dispatch them to the broker
//! - Bind the session to the client id asserted by the first request and
//!   reject later requests that disagree
//! - Answer every request with exactly one `ack` or `error` frame
//! - Call `Broker::disconnect` exactly once when the session ends

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::broker::message::{ErrorBody, ErrorCode, MessageData, ServerMessage};
use crate::broker::Broker;
use crate::transport::http::AppState;
use crate::transport::message::{parse_request, ClientMessage};

/// Capacity of the per-connection outbox channel.
pub const OUTBOX_CAPACITY: usize = 256;

/// Session is closed after this long without any inbound frame.
const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Transport-level ping period. Must be shorter than the read timeout.
const PING_PERIOD: Duration = Duration::from_secs(54);

/// Maximum inbound message size in bytes.
const MAX_MESSAGE_SIZE: usize = 512;

/// Upgrade handler for `GET /ws`.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, state.broker))
}

async fn handle_socket(socket: WebSocket, broker: Arc<Broker>) {
    let (sink, stream) = socket.split();
    let (tx, rx) = mpsc::channel::<ServerMessage>(OUTBOX_CAPACITY);

    debug!("websocket session opened");
    let writer = tokio::spawn(write_pump(sink, rx));

    let mut session = Session {
        broker: broker.clone(),
        outbox: tx,
        client_id: None,
    };
    session.read_loop(stream).await;

    if let Some(client_id) = session.client_id.take() {
        broker.disconnect(&client_id);
        info!(client_id = %client_id, "client disconnected");
    }

    // Dropping the session drops the outbox sender; the writer drains what
    // is left, sends a close frame, and exits.
    drop(session);
    let _ = writer.await;
}

/// Pumps frames from the outbox channel to the socket and keeps the
/// connection alive with periodic pings.
async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbox: mpsc::Receiver<ServerMessage>,
) {
    let mut ping = tokio::time::interval(PING_PERIOD);
    // An interval fires immediately; consume that tick so the first ping
    // goes out one full period after the connection opens.
    ping.tick().await;

    loop {
        tokio::select! {
            frame = outbox.recv() => {
                let Some(frame) = frame else {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                };
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(e) => {
                        error!("failed to serialize outbound frame: {e}");
                        continue;
                    }
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            _ = ping.tick() => {
                if sink.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
            }
        }
    }
}

struct Session {
    broker: Arc<Broker>,
    outbox: mpsc::Sender<ServerMessage>,
    client_id: Option<String>,
}

impl Session {
    async fn read_loop(&mut self, mut stream: SplitStream<WebSocket>) {
        loop {
            let msg = match tokio::time::timeout(READ_TIMEOUT, stream.next()).await {
                Err(_) => {
                    debug!(client_id = ?self.client_id, "read timeout, closing session");
                    break;
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    debug!(client_id = ?self.client_id, "websocket error: {e}");
                    break;
                }
                Ok(Some(Ok(msg))) => msg,
            };

            match msg {
                Message::Text(text) => self.handle_text(text.as_str()),
                Message::Close(_) => break,
                // Inbound pings are answered by the transport layer; pongs
                // and other frames only reset the read deadline.
                _ => {}
            }
        }
    }

    fn handle_text(&mut self, text: &str) {
        let request = match parse_request(text) {
            Ok(request) => request,
            Err(err) => {
                warn!(client_id = ?self.client_id, code = ?err.code, "rejected request: {err}");
                self.reply(ServerMessage::error(None, err));
                return;
            }
        };

        match request {
            ClientMessage::Subscribe {
                topic,
                client_id,
                last_n,
                request_id,
            } => self.handle_subscribe(topic, client_id, last_n, request_id),
            ClientMessage::Unsubscribe {
                topic,
                client_id,
                request_id,
            } => self.handle_unsubscribe(topic, client_id, request_id),
            ClientMessage::Publish {
                topic,
                message,
                client_id,
                request_id,
            } => self.handle_publish(topic, message, client_id, request_id),
            ClientMessage::Ping { request_id } => self.handle_ping(request_id),
        }
    }

    fn handle_subscribe(
        &mut self,
        topic: String,
        client_id: String,
        last_n: usize,
        request_id: String,
    ) {
        let Some(request_id) = require_request_id(self, request_id) else {
            return;
        };
        if client_id.is_empty() {
            self.reply_error(Some(request_id), ErrorCode::BadRequest, "client_id is required");
            return;
        }
        if let Err(err) = self.bind_client(&client_id) {
            self.reply(ServerMessage::error(Some(request_id), err));
            return;
        }

        match self
            .broker
            .subscribe(&client_id, &topic, last_n, self.outbox.clone())
        {
            Ok(history) => {
                self.reply(ServerMessage::ack(request_id, Some(topic)));
                // History follows the ack, best effort, already in publish
                // order from the snapshot.
                for event in history {
                    self.reply(event);
                }
            }
            Err(e) => {
                self.reply_error(Some(request_id), ErrorCode::SubscribeFailed, e.to_string())
            }
        }
    }

    fn handle_unsubscribe(&mut self, topic: String, client_id: String, request_id: String) {
        let Some(request_id) = require_request_id(self, request_id) else {
            return;
        };
        if client_id.is_empty() {
            self.reply_error(Some(request_id), ErrorCode::BadRequest, "client_id is required");
            return;
        }
        if let Err(err) = self.bind_client(&client_id) {
            self.reply(ServerMessage::error(Some(request_id), err));
            return;
        }

        match self.broker.unsubscribe(&client_id, &topic) {
            Ok(()) => self.reply(ServerMessage::ack(request_id, Some(topic))),
            Err(e) => {
                self.reply_error(Some(request_id), ErrorCode::UnsubscribeFailed, e.to_string())
            }
        }
    }

    fn handle_publish(
        &mut self,
        topic: String,
        message: MessageData,
        client_id: Option<String>,
        request_id: String,
    ) {
        let Some(request_id) = require_request_id(self, request_id) else {
            return;
        };

        let client_id = client_id.filter(|id| !id.is_empty());
        let sender = match self.client_id.clone() {
            None => match client_id {
                None => {
                    self.reply_error(
                        Some(request_id),
                        ErrorCode::BadRequest,
                        "client_id is required for the first request on this connection",
                    );
                    return;
                }
                Some(id) => {
                    self.client_id = Some(id.clone());
                    id
                }
            },
            Some(bound) => {
                if client_id.is_some_and(|id| id != bound) {
                    self.reply_error(
                        Some(request_id),
                        ErrorCode::BadRequest,
                        "client_id mismatch with existing connection",
                    );
                    return;
                }
                bound
            }
        };

        if Uuid::parse_str(&message.id).is_err() {
            self.reply_error(
                Some(request_id),
                ErrorCode::BadRequest,
                "message.id must be a valid UUID",
            );
            return;
        }

        match self.broker.publish(&topic, message, &sender) {
            Ok(()) => self.reply(ServerMessage::ack(request_id, Some(topic))),
            Err(e) => self.reply_error(Some(request_id), ErrorCode::PublishFailed, e.to_string()),
        }
    }

    fn handle_ping(&mut self, request_id: String) {
        let Some(request_id) = require_request_id(self, request_id) else {
            return;
        };
        self.reply(ServerMessage::pong(request_id));
    }

    /// Binds the session to `requested` on first use; afterwards every
    /// request must agree with the bound id.
    fn bind_client(&mut self, requested: &str) -> Result<(), ErrorBody> {
        match &self.client_id {
            None => {
                self.client_id = Some(requested.to_string());
                Ok(())
            }
            Some(bound) if bound == requested => Ok(()),
            Some(_) => Err(ErrorBody::new(
                ErrorCode::BadRequest,
                "client_id mismatch with existing connection",
            )),
        }
    }

    fn reply_error(
        &self,
        request_id: Option<String>,
        code: ErrorCode,
        message: impl Into<String>,
    ) {
        self.reply(ServerMessage::error(
            request_id,
            ErrorBody::new(code, message),
        ));
    }

    /// Non-blocking reply. A full outbox drops the frame: the client is
    /// overloaded and replies are best effort at that point.
    fn reply(&self, frame: ServerMessage) {
        if let Err(mpsc::error::TrySendError::Full(_)) = self.outbox.try_send(frame) {
            warn!(
                client_id = ?self.client_id,
                code = ?ErrorCode::ClientOverloaded,
                "outbox full, dropping reply"
            );
        }
    }
}

fn require_request_id(session: &Session, request_id: String) -> Option<String> {
    if request_id.is_empty() {
        session.reply_error(None, ErrorCode::BadRequest, "request_id is required");
        None
    } else {
        Some(request_id)
    }
}
