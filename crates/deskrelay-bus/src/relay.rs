// SPDX-FileCopyrightText: 2026 Deskrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cross-process bus backed by a WebSocket relay.
//!
//! Each server process holds one outbound connection to the relay. Published
//! events are serialized as JSON text frames; the relay fans every frame out
//! to all connected processes, including the one that sent it, so local
//! subscribers receive their own publishes through the same read loop as
//! everyone else's.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use deskrelay_core::{
    AdapterType, BusEvent, HealthStatus, NotificationBus, RelayAdapter, RelayError,
};

const CHANNEL_CAPACITY: usize = 256;

/// Bus adapter connected to an external WebSocket relay.
pub struct RelayBus {
    url: String,
    outbound: mpsc::UnboundedSender<Message>,
    inbound: broadcast::Sender<BusEvent>,
    cancel: CancellationToken,
}

impl RelayBus {
    /// Connect to the relay and spawn the read and write loops.
    pub async fn connect(url: &str) -> Result<Self, RelayError> {
        let (stream, _) = connect_async(url).await.map_err(|e| RelayError::Bus {
            message: format!("failed to connect to relay at {url}"),
            source: Some(Box::new(e)),
        })?;
        let (mut sink, mut source) = stream.split();

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let (inbound, _) = broadcast::channel(CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        // Writer: drains the outbound queue into the socket.
        let write_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = write_cancel.cancelled() => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                    msg = outbound_rx.recv() => {
                        let Some(msg) = msg else { break };
                        if let Err(e) = sink.send(msg).await {
                            warn!(error = %e, "relay write failed, stopping writer");
                            break;
                        }
                    }
                }
            }
        });

        // Reader: decodes relay frames into the local broadcast channel.
        let read_inbound = inbound.clone();
        let read_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = read_cancel.cancelled() => break,
                    frame = source.next() => {
                        match frame {
                            Some(Ok(Message::Text(text))) => {
                                match serde_json::from_str::<BusEvent>(&text) {
                                    Ok(event) => {
                                        let _ = read_inbound.send(event);
                                    }
                                    Err(e) => {
                                        warn!(error = %e, "discarding malformed relay frame");
                                    }
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("relay connection closed");
                                break;
                            }
                            Some(Ok(_)) => {} // binary, ping, pong
                            Some(Err(e)) => {
                                warn!(error = %e, "relay read failed, stopping reader");
                                break;
                            }
                        }
                    }
                }
            }
        });

        debug!(url, "connected to relay");
        Ok(Self {
            url: url.to_string(),
            outbound,
            inbound,
            cancel,
        })
    }
}

#[async_trait]
impl RelayAdapter for RelayBus {
    fn name(&self) -> &str {
        "relay"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Bus
    }

    async fn health_check(&self) -> Result<HealthStatus, RelayError> {
        if self.outbound.is_closed() {
            Ok(HealthStatus::Unhealthy(format!(
                "relay connection to {} lost",
                self.url
            )))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }

    async fn shutdown(&self) -> Result<(), RelayError> {
        self.cancel.cancel();
        Ok(())
    }
}

#[async_trait]
impl NotificationBus for RelayBus {
    async fn publish(&self, event: BusEvent) -> Result<(), RelayError> {
        let text = serde_json::to_string(&event).map_err(|e| RelayError::Bus {
            message: "failed to serialize bus event".into(),
            source: Some(Box::new(e)),
        })?;
        self.outbound
            .send(Message::Text(text.into()))
            .map_err(|_| RelayError::Bus {
                message: format!("relay connection to {} lost", self.url),
                source: None,
            })
    }

    fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.inbound.subscribe()
    }
}
