//! Sentinel Networking
//!
//! TCP implementation of the connection contract. Commands share one
//! stream; each subscription opens its own, since a connection in
//! subscribe mode cannot run ordinary commands.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{Instant, timeout};

use super::connection::{Connection, Dialer, PING_COMMAND, PubSubMessage, Reply, Subscription};
use super::state::SentinelInstance;
use crate::error::{Error, Result};
use crate::protocol::{Parser, RespValue};

/// Connection timeout (500 ms)
const CONNECT_TIMEOUT_MS: u64 = 500;

/// Command timeout (500 ms)
const COMMAND_TIMEOUT_MS: u64 = 500;

/// Subscription receive timeout (5 seconds)
const RECEIVE_TIMEOUT_MS: u64 = 5000;

/// Maximum reply buffer size
const MAX_BUFFER_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct TcpSettings {
    pub connect_timeout: Duration,
    pub command_timeout: Duration,
    /// No frame at all within this window is a receive timeout. A keepalive
    /// PING goes out halfway through.
    pub receive_timeout: Duration,
    pub auth_pass: Option<String>,
}

impl Default for TcpSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(CONNECT_TIMEOUT_MS),
            command_timeout: Duration::from_millis(COMMAND_TIMEOUT_MS),
            receive_timeout: Duration::from_millis(RECEIVE_TIMEOUT_MS),
            auth_pass: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TcpDialer {
    settings: TcpSettings,
}

impl TcpDialer {
    pub fn new(settings: TcpSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, sentinel: &SentinelInstance) -> Result<Arc<dyn Connection>> {
        let addr = sentinel.addr();
        let stream = open_stream(&addr, &self.settings).await?;
        Ok(Arc::new(TcpConnection {
            addr,
            settings: self.settings.clone(),
            stream: Mutex::new(stream),
        }))
    }
}

/// A stream plus its read buffer
struct FramedStream {
    socket: TcpStream,
    buffer: BytesMut,
}

impl FramedStream {
    async fn write_frame(&mut self, value: &RespValue) -> Result<()> {
        self.socket.write_all(&value.serialize()).await?;
        Ok(())
    }

    /// Cancel-safe: bytes already read stay in the buffer
    async fn read_frame(&mut self) -> Result<RespValue> {
        loop {
            if let Some(value) = Parser::parse(&mut self.buffer)? {
                return Ok(value);
            }
            if self.buffer.len() > MAX_BUFFER_SIZE {
                return Err(Error::Protocol("reply exceeds max buffer size".into()));
            }
            let n = self.socket.read_buf(&mut self.buffer).await?;
            if n == 0 {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed by peer",
                )));
            }
        }
    }

    async fn round_trip(&mut self, value: &RespValue) -> Result<RespValue> {
        self.write_frame(value).await?;
        self.read_frame().await
    }
}

/// Connect, disable Nagle, and authenticate if configured
async fn open_stream(addr: &str, settings: &TcpSettings) -> Result<FramedStream> {
    let connection_error = |reason: String| Error::Connection {
        addr: addr.to_string(),
        reason,
    };

    let socket = match timeout(settings.connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(socket)) => socket,
        Ok(Err(e)) => return Err(connection_error(e.to_string())),
        Err(_) => return Err(connection_error("connect timeout".into())),
    };
    socket
        .set_nodelay(true)
        .map_err(|e| connection_error(e.to_string()))?;

    let mut stream = FramedStream {
        socket,
        buffer: BytesMut::with_capacity(4096),
    };

    if let Some(pass) = &settings.auth_pass {
        let auth = RespValue::command("AUTH", &[pass.as_str()]);
        let reply = match timeout(settings.command_timeout, stream.round_trip(&auth)).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => return Err(connection_error(format!("AUTH failed: {}", e))),
            Err(_) => return Err(connection_error("AUTH timeout".into())),
        };
        if let Some(err) = reply.as_error() {
            return Err(connection_error(format!("AUTH rejected: {}", err)));
        }
    }

    Ok(stream)
}

pub struct TcpConnection {
    addr: String,
    settings: TcpSettings,
    stream: Mutex<FramedStream>,
}

#[async_trait]
impl Connection for TcpConnection {
    async fn command(&self, name: &str, args: &[&str]) -> Result<Reply> {
        let frame = RespValue::command(name, args);
        let mut stream = self.stream.lock().await;
        match timeout(self.settings.command_timeout, stream.round_trip(&frame)).await {
            Ok(result) => result.map(Reply::new),
            // A reply may still arrive and would desync the stream
            Err(_) => Err(Error::Command(format!("{} to {} timed out", name, self.addr))),
        }
    }

    fn new_subscription(&self) -> Box<dyn Subscription> {
        Box::new(TcpSubscription {
            addr: self.addr.clone(),
            settings: self.settings.clone(),
            stream: None,
        })
    }
}

pub struct TcpSubscription {
    addr: String,
    settings: TcpSettings,
    stream: Option<FramedStream>,
}

#[async_trait]
impl Subscription for TcpSubscription {
    async fn subscribe(&mut self, channels: &[&str]) -> Result<Reply> {
        let mut stream = open_stream(&self.addr, &self.settings).await?;
        stream
            .write_frame(&RespValue::command("SUBSCRIBE", channels))
            .await?;

        // One confirmation per channel
        let mut last = RespValue::NullArray;
        for _ in channels {
            let reply = timeout(self.settings.command_timeout, stream.read_frame())
                .await
                .map_err(|_| Error::Subscription("SUBSCRIBE timed out".into()))??;
            if reply.as_error().is_some() {
                return Ok(Reply::new(reply));
            }
            last = reply;
        }

        self.stream = Some(stream);
        Ok(Reply::new(last))
    }

    async fn receive(&mut self) -> Result<PubSubMessage> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| Error::Receive("not subscribed".into()))?;

        let deadline = Instant::now() + self.settings.receive_timeout;
        let keepalive = self.settings.receive_timeout / 2;
        let mut ping_sent = false;

        loop {
            let wait = if ping_sent {
                deadline.saturating_duration_since(Instant::now())
            } else {
                keepalive
            };

            match timeout(wait, stream.read_frame()).await {
                Ok(frame) => return decode_push(frame?),
                Err(_) if !ping_sent => {
                    stream
                        .write_frame(&RespValue::command(PING_COMMAND, &[]))
                        .await?;
                    ping_sent = true;
                }
                Err(_) => return Err(Error::ReceiveTimeout),
            }
        }
    }
}

/// Decode a frame received in subscribe mode
fn decode_push(frame: RespValue) -> Result<PubSubMessage> {
    if let Some(err) = frame.as_error() {
        return Err(Error::Receive(err));
    }

    let RespValue::Array(items) = frame else {
        return Err(Error::Protocol(format!("unexpected push {:?}", frame)));
    };
    let text = |i: usize| items.get(i).and_then(RespValue::as_text);
    let kind = text(0).unwrap_or_default().to_ascii_lowercase();

    match (kind.as_str(), items.len()) {
        ("message", 3) => Ok(PubSubMessage::new(
            text(1).unwrap_or_default(),
            text(2).unwrap_or_default(),
        )),
        ("pmessage", 4) => Ok(PubSubMessage::new(
            text(2).unwrap_or_default(),
            text(3).unwrap_or_default(),
        )),
        // Keepalive answer and late subscription confirmations
        ("pong", _) | ("subscribe", _) | ("psubscribe", _) => Ok(PubSubMessage::keepalive()),
        _ => Err(Error::Protocol(format!("unexpected push kind '{}'", kind))),
    }
}
