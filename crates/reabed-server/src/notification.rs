//! Notification port server.
//!
//! A notification connection only carries control messages from the client
//! (`subscribe_<topic>` / `unsubscribe_<topic>`). Once subscribed, change
//! notifications for the topic are pushed back down the same connection.
//!
//! Each connection is split in two tasks: the reader applies control
//! messages to the [`SubscriberRegistry`], the writer drains the connection's
//! channel onto the socket. When either side fails the connection is removed
//! from every topic.

use std::net::SocketAddr;
use std::sync::Arc;

use reabed_protocol::{decode_control, decode_line, encode_line, ControlMessage, WRONG_COMMAND};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::device::Device;
use crate::subscription::{ConnectionId, Subscriber, SubscriberRegistry};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Accept notification connections forever.
pub async fn accept_loop(listener: TcpListener, device: Arc<Device>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let registry = device.registry().clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, addr, registry).await {
                        error!("Notification connection error from {}: {}", addr, e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept notification connection: {}", e);
            }
        }
    }
}

/// Serve one notification connection until the peer closes it.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    registry: Arc<SubscriberRegistry>,
) -> Result<(), BoxError> {
    info!("New notification connection from {}", addr);

    let (reader, writer) = stream.into_split();
    let (subscriber, rx) = registry.attach(addr);
    let writer_task = tokio::spawn(write_loop(writer, rx, subscriber.id(), registry.clone()));

    let result = read_loop(reader, &subscriber, &registry).await;

    // Dropping the last senders lets the writer drain what is queued and stop.
    registry.remove_connection(subscriber.id()).await;
    drop(subscriber);
    if let Err(e) = writer_task.await {
        warn!("Notification writer for {} panicked: {}", addr, e);
    }

    info!("Notification client {} disconnected", addr);
    result
}

async fn read_loop(
    reader: tokio::net::tcp::OwnedReadHalf,
    subscriber: &Subscriber,
    registry: &SubscriberRegistry,
) -> Result<(), BoxError> {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(());
        }
        let request = decode_line(&buf);
        debug!("{} -> {:?}", subscriber.peer(), request);

        let reply = match decode_control(&request) {
            Ok(msg) => {
                match msg {
                    ControlMessage::Subscribe(topic) => {
                        registry.subscribe(topic, subscriber).await;
                    }
                    ControlMessage::Unsubscribe(topic) => {
                        registry.unsubscribe(topic, subscriber.id()).await;
                    }
                }
                msg.ack()
            }
            Err(_) => {
                warn!("Wrong control message from {}: {:?}", subscriber.peer(), request);
                WRONG_COMMAND.to_string()
            }
        };

        if subscriber.send(encode_line(reply)).is_err() {
            // The writer is gone, so the socket is dead.
            return Ok(());
        }
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<String>,
    id: ConnectionId,
    registry: Arc<SubscriberRegistry>,
) {
    while let Some(line) = rx.recv().await {
        let result = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        }
        .await;

        if let Err(e) = result {
            warn!("Failed to write to notification client {}: {}", id, e);
            registry.remove_connection(id).await;
            break;
        }
    }
}
