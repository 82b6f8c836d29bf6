// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! WebSocket push channel
//!
//! Each connection gets its own task and a bounded outbound queue. The
//! coordinator hands frames to the queue without waiting; a writer task drains
//! it onto the socket. Inbound text frames carry operator power requests.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use taglink_core::{parse_client_message, ClientRequest, Frame, SinkError, SubscriberId, SubscriberSink};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::coordinator::CoordinatorHandle;
use crate::error::{ServerError, ServerResult};

/// Outbound queue of one connection
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Frame>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Frame>) -> Self {
        Self { tx }
    }
}

impl SubscriberSink for ChannelSink {
    fn deliver(&self, frame: &Frame) -> Result<(), SinkError> {
        self.tx.try_send(frame.clone()).map_err(|e| match e {
            TrySendError::Full(_) => SinkError::Full,
            TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}

pub struct PushServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    subscriber_queue: usize,
}

impl PushServer {
    pub async fn bind(address: &str, subscriber_queue: usize) -> ServerResult<Self> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| ServerError::Bind {
                address: address.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr()?;
        info!("[WS-PUSH] Listening on {}", local_addr);
        Ok(Self {
            listener,
            local_addr,
            subscriber_queue: subscriber_queue.max(1),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until the coordinator stops
    pub async fn run(self, coordinator: CoordinatorHandle) {
        let mut next_id: SubscriberId = 1;
        while coordinator.is_running() {
            match self.listener.accept().await {
                Ok((stream, peer_addr)) => {
                    debug!("[WS-PUSH] New connection from {}", peer_addr);
                    let id = next_id;
                    next_id += 1;
                    let coordinator = coordinator.clone();
                    let queue = self.subscriber_queue;
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, peer_addr, id, coordinator, queue).await {
                            warn!("[WS-PUSH] Client {} error: {}", peer_addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("[WS-PUSH] Accept error: {}", e);
                }
            }
        }
        debug!("[WS-PUSH] Accept loop stopped");
    }
}

async fn handle_client(
    stream: TcpStream,
    peer_addr: SocketAddr,
    id: SubscriberId,
    coordinator: CoordinatorHandle,
    queue: usize,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let ws_stream = accept_async(stream).await?;
    let (mut write, mut read) = ws_stream.split();

    let (tx, mut rx) = mpsc::channel::<Frame>(queue);
    if !coordinator.subscriber_joined(id, ChannelSink::new(tx)) {
        return Ok(());
    }
    info!("[WS-PUSH] Client {} connected as subscriber {}", peer_addr, id);

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if write.send(Message::Text(frame.to_string())).await.is_err() {
                break;
            }
        }
        let _ = write.close().await;
    });

    while let Some(message) = read.next().await {
        match message {
            Ok(Message::Text(text)) => handle_text(&text, id, &coordinator),
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("[WS-PUSH] Read error from {}: {}", peer_addr, e);
                break;
            }
        }
    }

    coordinator.subscriber_left(id);
    writer.abort();
    info!("[WS-PUSH] Client {} disconnected", peer_addr);
    Ok(())
}

fn handle_text(text: &str, id: SubscriberId, coordinator: &CoordinatorHandle) {
    match parse_client_message(text) {
        Ok(Some(ClientRequest::SetAntennaPower(power))) => {
            info!("[WS-PUSH] Power change requested by {}: {}", id, power);
            coordinator.request_power(power);
        }
        Ok(None) => debug!("[WS-PUSH] Ignoring message without request from {}", id),
        Err(e) => warn!("[WS-PUSH] Invalid message from {}: {}", id, e),
    }
}
