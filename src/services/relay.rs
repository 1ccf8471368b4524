// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Relay client for fetching stored records from a single endpoint.
//!
//! Handles:
//! - Opening a WebSocket connection and issuing a `REQ` subscription
//! - Collecting `EVENT` messages until `EOSE` or the timeout
//! - Dropping records that do not match the filter (or fail id checks)
//! - Closing the subscription and socket on every exit path

use crate::models::{RawRecord, RecordFilter};
use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Upper bound on the best-effort close handshake.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

static SUBSCRIPTION_COUNTER: AtomicU64 = AtomicU64::new(0);

type RelaySocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Capability to fetch stored records from one endpoint.
///
/// Implementations return whatever was collected when `timeout` elapses
/// (partial success is success) and an error tagged with the endpoint
/// when the endpoint cannot be queried at all.
pub trait EventFetcher: Send + Sync {
    fn fetch<'a>(
        &'a self,
        endpoint: &'a str,
        filter: &'a RecordFilter,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Vec<RawRecord>, RelayError>>;
}

/// WebSocket relay client.
#[derive(Debug, Clone, Default)]
pub struct RelayClient {
    verify_ids: bool,
}

impl RelayClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop records whose id does not match their content hash.
    pub fn with_id_verification(mut self, verify_ids: bool) -> Self {
        self.verify_ids = verify_ids;
        self
    }

    async fn fetch_records(
        &self,
        endpoint: &str,
        filter: &RecordFilter,
        timeout: Duration,
    ) -> Result<Vec<RawRecord>, RelayError> {
        let deadline = Instant::now() + timeout;

        let mut socket =
            match tokio::time::timeout_at(deadline, tokio_tungstenite::connect_async(endpoint))
                .await
            {
                Ok(Ok((socket, _response))) => socket,
                Ok(Err(e)) => {
                    return Err(RelayError::Connect {
                        endpoint: endpoint.to_string(),
                        reason: e.to_string(),
                    })
                }
                Err(_) => {
                    return Err(RelayError::ConnectTimeout {
                        endpoint: endpoint.to_string(),
                    })
                }
            };

        let subscription_id = next_subscription_id();
        let mut collected = Vec::new();

        let outcome = tokio::time::timeout_at(
            deadline,
            self.read_subscription(&mut socket, endpoint, &subscription_id, filter, &mut collected),
        )
        .await;

        let result = match outcome {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(
                    endpoint,
                    count = collected.len(),
                    "Relay timed out before end of stored events, keeping partial results"
                );
                Ok(())
            }
        };

        close_socket(socket, &subscription_id).await;

        result.map(|()| collected)
    }

    /// Issue the subscription and read until `EOSE`.
    async fn read_subscription(
        &self,
        socket: &mut RelaySocket,
        endpoint: &str,
        subscription_id: &str,
        filter: &RecordFilter,
        collected: &mut Vec<RawRecord>,
    ) -> Result<(), RelayError> {
        let request = serde_json::json!(["REQ", subscription_id, filter.to_wire()]);
        socket
            .send(Message::Text(request.to_string()))
            .await
            .map_err(|e| RelayError::Connect {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        let mut seen = HashSet::new();

        while let Some(frame) = socket.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    if collected.is_empty() {
                        return Err(RelayError::Protocol {
                            endpoint: endpoint.to_string(),
                            reason: e.to_string(),
                        });
                    }
                    tracing::warn!(endpoint, error = %e, "Relay stream error, keeping partial results");
                    return Ok(());
                }
            };

            match RelayMessage::parse(&text) {
                Ok(RelayMessage::Event {
                    subscription_id: sub,
                    record,
                }) if sub == subscription_id => {
                    if !filter.matches(&record) {
                        tracing::debug!(endpoint, id = %record.id, "Dropping record outside filter");
                        continue;
                    }
                    if self.verify_ids && !record.has_valid_id() {
                        tracing::warn!(endpoint, id = %record.id, "Dropping record with invalid id");
                        continue;
                    }
                    if seen.insert(record.id.clone()) {
                        collected.push(*record);
                    }
                }
                Ok(RelayMessage::EndOfStoredEvents(sub)) if sub == subscription_id => {
                    return Ok(());
                }
                Ok(RelayMessage::Closed {
                    subscription_id: sub,
                    reason,
                }) if sub == subscription_id => {
                    if collected.is_empty() {
                        return Err(RelayError::Closed {
                            endpoint: endpoint.to_string(),
                            reason,
                        });
                    }
                    return Ok(());
                }
                Ok(RelayMessage::Notice(notice)) => {
                    tracing::info!(endpoint, notice = %notice, "Relay notice");
                }
                Ok(_) => {}
                Err(reason) => {
                    tracing::debug!(endpoint, reason = %reason, "Skipping malformed relay message");
                }
            }
        }

        if collected.is_empty() {
            return Err(RelayError::Protocol {
                endpoint: endpoint.to_string(),
                reason: "connection closed before end of stored events".to_string(),
            });
        }
        Ok(())
    }
}

impl EventFetcher for RelayClient {
    fn fetch<'a>(
        &'a self,
        endpoint: &'a str,
        filter: &'a RecordFilter,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<Vec<RawRecord>, RelayError>> {
        Box::pin(self.fetch_records(endpoint, filter, timeout))
    }
}

/// Send `CLOSE` and a close frame, bounded by [`CLOSE_TIMEOUT`].
async fn close_socket(mut socket: RelaySocket, subscription_id: &str) {
    let close = async {
        let message = serde_json::json!(["CLOSE", subscription_id]);
        let _ = socket.send(Message::Text(message.to_string())).await;
        let _ = socket.close(None).await;
    };
    if tokio::time::timeout(CLOSE_TIMEOUT, close).await.is_err() {
        tracing::debug!("Relay close handshake timed out; dropping socket");
    }
}

fn next_subscription_id() -> String {
    let n = SUBSCRIPTION_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("wl-{}-{}", std::process::id(), n)
}

/// Message received from a relay.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayMessage {
    Event {
        subscription_id: String,
        record: Box<RawRecord>,
    },
    EndOfStoredEvents(String),
    Closed {
        subscription_id: String,
        reason: String,
    },
    Notice(String),
    /// `OK`, `AUTH` and anything else the collector does not act on.
    Other(String),
}

impl RelayMessage {
    /// Parse a relay text frame.
    pub fn parse(text: &str) -> Result<Self, String> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| format!("invalid JSON: {}", e))?;
        let parts = value
            .as_array()
            .ok_or_else(|| "message is not an array".to_string())?;
        let label = parts
            .first()
            .and_then(|v| v.as_str())
            .ok_or_else(|| "missing message type".to_string())?;
        let str_at = |i: usize| -> Result<String, String> {
            parts
                .get(i)
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .ok_or_else(|| format!("{}: missing field {}", label, i))
        };

        match label {
            "EVENT" => {
                let subscription_id = str_at(1)?;
                let record: RawRecord = parts
                    .get(2)
                    .cloned()
                    .ok_or_else(|| "EVENT: missing event".to_string())
                    .and_then(|v| {
                        serde_json::from_value(v).map_err(|e| format!("EVENT: bad event: {}", e))
                    })?;
                Ok(RelayMessage::Event {
                    subscription_id,
                    record: Box::new(record),
                })
            }
            "EOSE" => Ok(RelayMessage::EndOfStoredEvents(str_at(1)?)),
            "CLOSED" => Ok(RelayMessage::Closed {
                subscription_id: str_at(1)?,
                reason: str_at(2).unwrap_or_default(),
            }),
            "NOTICE" => Ok(RelayMessage::Notice(str_at(1).unwrap_or_default())),
            other => Ok(RelayMessage::Other(other.to_string())),
        }
    }
}

/// Errors from a single relay endpoint. Every variant names the endpoint.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RelayError {
    #[error("{endpoint}: connection failed: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("{endpoint}: connection timed out")]
    ConnectTimeout { endpoint: String },

    #[error("{endpoint}: subscription closed by relay: {reason}")]
    Closed { endpoint: String, reason: String },

    #[error("{endpoint}: protocol error: {reason}")]
    Protocol { endpoint: String, reason: String },
}

impl RelayError {
    /// Endpoint the error came from.
    pub fn endpoint(&self) -> &str {
        match self {
            RelayError::Connect { endpoint, .. }
            | RelayError::ConnectTimeout { endpoint }
            | RelayError::Closed { endpoint, .. }
            | RelayError::Protocol { endpoint, .. } => endpoint,
        }
    }
}
