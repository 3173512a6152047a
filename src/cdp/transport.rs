//! CDP Transport Layer
//!
//! A minimal WebSocket client (RFC 6455, text frames only) carrying CDP
//! JSON messages. A reader thread owns the receiving half of the socket and
//! completes pending requests by id.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tokio::sync::{oneshot, Mutex};

use crate::error::{Error, Result};

/// WebSocket opcodes we handle
mod opcode {
    pub const TEXT: u8 = 0x1;
    pub const CLOSE: u8 = 0x8;
    pub const PING: u8 = 0x9;
    pub const PONG: u8 = 0xA;
}

/// Request awaiting its response; the method name is kept for error messages
struct Pending {
    method: String,
    reply: oneshot::Sender<Result<Value>>,
}

type PendingMap = Arc<std::sync::Mutex<HashMap<u64, Pending>>>;

/// Encode one masked client frame
fn encode_frame(op: u8, payload: &[u8], mask: [u8; 4]) -> Vec<u8> {
    let len = payload.len();
    let mut frame = Vec::with_capacity(14 + len);
    frame.push(0x80 | op);

    if len < 126 {
        frame.push(0x80 | len as u8);
    } else if len <= u16::MAX as usize {
        frame.push(0x80 | 126);
        frame.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        frame.push(0x80 | 127);
        frame.extend_from_slice(&(len as u64).to_be_bytes());
    }

    frame.extend_from_slice(&mask);
    frame.extend(payload.iter().enumerate().map(|(i, b)| b ^ mask[i % 4]));
    frame
}

/// Read one frame, returning `(opcode, unmasked payload)`
fn read_frame<R: Read>(stream: &mut R) -> std::io::Result<(u8, Vec<u8>)> {
    let mut header = [0u8; 2];
    stream.read_exact(&mut header)?;

    let op = header[0] & 0x0F;
    let masked = header[1] & 0x80 != 0;
    let len = match header[1] & 0x7F {
        126 => {
            let mut ext = [0u8; 2];
            stream.read_exact(&mut ext)?;
            u16::from_be_bytes(ext) as usize
        }
        127 => {
            let mut ext = [0u8; 8];
            stream.read_exact(&mut ext)?;
            u64::from_be_bytes(ext) as usize
        }
        n => n as usize,
    };

    let mask = if masked {
        let mut m = [0u8; 4];
        stream.read_exact(&mut m)?;
        Some(m)
    } else {
        None
    };

    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload)?;
    if let Some(mask) = mask {
        for (i, byte) in payload.iter_mut().enumerate() {
            *byte ^= mask[i % 4];
        }
    }

    Ok((op, payload))
}

/// Split `ws://host:port/path` into `("host:port", "/path")`
fn split_ws_url(ws_url: &str) -> Result<(&str, String)> {
    let rest = ws_url
        .strip_prefix("ws://")
        .ok_or_else(|| Error::transport(format!("Unsupported WebSocket URL: {}", ws_url)))?;
    Ok(match rest.split_once('/') {
        Some((host, path)) => (host, format!("/{}", path)),
        None => (rest, "/".to_string()),
    })
}

/// Turn one CDP response into the value handed back to the caller
fn response_result(method: &str, msg: &Value) -> Result<Value> {
    match msg.get("error") {
        Some(error) => Err(Error::cdp(
            method,
            error.get("code").and_then(Value::as_i64).unwrap_or(-1),
            error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown"),
        )),
        None => Ok(msg.get("result").cloned().unwrap_or_else(|| json!({}))),
    }
}

/// WebSocket connection to a browser's DevTools endpoint
pub struct Transport {
    writer: Mutex<TcpStream>,
    next_id: AtomicU64,
    pending: PendingMap,
}

impl Transport {
    /// Connect and complete the WebSocket handshake
    pub fn connect(ws_url: &str) -> Result<Self> {
        let (host, path) = split_ws_url(ws_url)?;

        let mut stream = TcpStream::connect(host)
            .map_err(|e| Error::transport_io("Failed to connect to Chrome", e))?;

        let key = base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            rand::random::<[u8; 16]>(),
        );
        let request = format!(
            "GET {} HTTP/1.1\r\n\
             Host: {}\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: {}\r\n\
             Sec-WebSocket-Version: 13\r\n\
             \r\n",
            path, host, key
        );
        stream
            .write_all(request.as_bytes())
            .map_err(|e| Error::transport_io("Handshake write failed", e))?;

        // Read byte-wise up to the blank line so no frame data is consumed
        let mut response = Vec::with_capacity(256);
        let mut byte = [0u8; 1];
        while !response.ends_with(b"\r\n\r\n") {
            stream
                .read_exact(&mut byte)
                .map_err(|e| Error::transport_io("Handshake read failed", e))?;
            response.push(byte[0]);
        }
        let status = String::from_utf8_lossy(&response);
        if !status.starts_with("HTTP/1.1 101") {
            return Err(Error::transport(format!(
                "WebSocket handshake failed: {}",
                status.lines().next().unwrap_or_default()
            )));
        }

        tracing::debug!("WebSocket connected to {}", ws_url);

        let reader = stream
            .try_clone()
            .map_err(|e| Error::transport_io("Failed to clone stream", e))?;
        let pending: PendingMap = Arc::default();
        let pending_reader = Arc::clone(&pending);
        std::thread::Builder::new()
            .name("cdp-reader".into())
            .spawn(move || Self::reader_loop(reader, pending_reader))
            .map_err(|e| Error::transport_io("Failed to spawn reader thread", e))?;

        Ok(Self {
            writer: Mutex::new(stream),
            next_id: AtomicU64::new(1),
            pending,
        })
    }

    fn reader_loop(mut stream: TcpStream, pending: PendingMap) {
        loop {
            let (op, payload) = match read_frame(&mut stream) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::debug!("WebSocket read error: {}", e);
                    break;
                }
            };

            match op {
                opcode::TEXT => {
                    let msg: Value = match serde_json::from_slice(&payload) {
                        Ok(v) => v,
                        Err(e) => {
                            tracing::warn!("Failed to parse CDP message: {}", e);
                            continue;
                        }
                    };

                    let Some(id) = msg.get("id").and_then(Value::as_u64) else {
                        if let Some(method) = msg.get("method").and_then(Value::as_str) {
                            tracing::trace!("CDP event: {}", method);
                        }
                        continue;
                    };

                    let entry = pending
                        .lock()
                        .ok()
                        .and_then(|mut map| map.remove(&id));
                    match entry {
                        Some(p) => {
                            let _ = p.reply.send(response_result(&p.method, &msg));
                        }
                        None => tracing::trace!("Response for unknown id: {}", id),
                    }
                }
                opcode::PING => {
                    let pong = encode_frame(opcode::PONG, &payload, rand::random());
                    let _ = stream.write_all(&pong);
                }
                opcode::CLOSE => {
                    tracing::debug!("WebSocket closed by server");
                    break;
                }
                _ => {}
            }
        }

        // Dropping the senders wakes every caller still waiting
        if let Ok(mut map) = pending.lock() {
            map.clear();
        }
        tracing::debug!("CDP reader loop ended");
    }

    /// Send a command, optionally scoped to a target session, and await its result
    pub async fn send<C, R>(&self, session_id: Option<&str>, method: &str, params: &C) -> Result<R>
    where
        C: Serialize,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let mut msg = json!({
            "id": id,
            "method": method,
            "params": serde_json::to_value(params)?,
        });
        if let Some(session_id) = session_id {
            msg["sessionId"] = json!(session_id);
        }
        let data = serde_json::to_vec(&msg)?;

        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .map_err(|_| Error::transport("Pending request table poisoned"))?
            .insert(
                id,
                Pending {
                    method: method.to_string(),
                    reply: tx,
                },
            );

        {
            let mut writer = self.writer.lock().await;
            writer
                .write_all(&encode_frame(opcode::TEXT, &data, rand::random()))
                .map_err(|e| Error::transport_io("WebSocket write failed", e))?;
        }
        tracing::trace!(method, id, session = session_id.unwrap_or("-"), "CDP command sent");

        let result = rx
            .await
            .map_err(|_| Error::transport(format!("Connection closed awaiting {}", method)))??;
        Ok(serde_json::from_value(result)?)
    }

    /// Send a close frame; the reader thread exits when the server answers
    pub async fn close(&self) {
        let mut writer = self.writer.lock().await;
        let _ = writer.write_all(&encode_frame(opcode::CLOSE, &[], rand::random()));
    }
}
