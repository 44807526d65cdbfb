//! Command port server.
//!
//! Every accepted connection gets its own task. A connection carries any
//! number of request/response exchanges, processed strictly in order:
//!
//! ```text
//! > get_angles
//! < 10,0,5
//! > set_height
//! < ------Enter height------ ... Enter height:
//! > 150
//! < !Error: Height is not set: height angle is out of range: 150 not in [0, 100]
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use reabed_core::record::{parse_angles, parse_value};
use reabed_core::Topic;
use reabed_protocol::{
    decode_command, decode_line, encode_line, set_prompt, unknown_command, value_response,
    Command, SetResult,
};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::device::Device;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Accept command connections forever.
pub async fn accept_loop(listener: TcpListener, device: Arc<Device>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let device = device.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, addr, device).await {
                        error!("Command connection error from {}: {}", addr, e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept command connection: {}", e);
            }
        }
    }
}

/// Serve one command connection until the peer closes it.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    device: Arc<Device>,
) -> Result<(), BoxError> {
    info!("New command connection from {}", addr);

    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            info!("Command client {} disconnected", addr);
            break;
        }
        let request = decode_line(&buf);
        debug!("{} -> {:?}", addr, request);

        let command = match decode_command(&request) {
            Ok(command) => command,
            Err(_) => {
                warn!("Unknown command from {}: {:?}", addr, request);
                send(&mut writer, &encode_line(unknown_command(&request))).await?;
                continue;
            }
        };

        if !command.is_set() {
            let state = device.get().await;
            send(&mut writer, &encode_line(value_response(command.topic(), &state))).await?;
            continue;
        }

        let topic = command.topic();
        send(&mut writer, &set_prompt(topic)).await?;

        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            info!("Command client {} disconnected during {}", addr, command);
            break;
        }
        let result = apply_set(&device, topic, &decode_line(&buf)).await;
        send(&mut writer, &encode_line(&result)).await?;
    }

    Ok(())
}

/// Parse the value line typed after a set prompt and run the set.
pub async fn apply_set(device: &Device, topic: Topic, input: &str) -> SetResult {
    let outcome = match topic {
        Topic::Angles => match parse_angles(input) {
            Ok(angles) => device.set_angles(angles).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        },
        Topic::Height => match parse_value(input) {
            Ok(height) => device.set_height(height).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        },
        Topic::Weight => match parse_value(input) {
            Ok(weight) => device.set_weight(weight).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        },
    };

    match outcome {
        Ok(_) => SetResult::Success(topic),
        Err(reason) => SetResult::Error(topic, reason),
    }
}

async fn send<W: AsyncWrite + Unpin>(writer: &mut W, text: &str) -> std::io::Result<()> {
    writer.write_all(text.as_bytes()).await?;
    writer.flush().await
}
