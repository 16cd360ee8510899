//! Source RCON protocol session
//!
//! Implements the Valve Source RCON protocol used by Minecraft's remote console.
//! Protocol spec: https://developer.valvesoftware.com/wiki/Source_RCON_Protocol

use crate::session::ConsoleSession;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};
use whitelist_core::{RconConfig, Result, WhitelistError};

/// RCON packet type constants
pub mod packet_type {
    /// Response to an executed command
    pub const RESPONSE_VALUE: i32 = 0;
    /// Authentication response / Execute command (context-dependent)
    pub const EXEC_COMMAND: i32 = 2;
    /// Authenticate with password
    pub const AUTH: i32 = 3;
}

/// Largest packet the server may send: 4096 byte body plus header and terminators
pub const MAX_PACKET_SIZE: usize = 4096 + 10;

/// Id the server puts in the auth response when the password is wrong
const AUTH_FAILED_ID: i32 = -1;

/// RCON packet types for creating packets
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PacketType {
    /// Execute a command
    ExecCommand,
    /// Authenticate with password
    Auth,
}

impl PacketType {
    /// Get the wire protocol value
    pub fn as_i32(self) -> i32 {
        match self {
            PacketType::ExecCommand => packet_type::EXEC_COMMAND,
            PacketType::Auth => packet_type::AUTH,
        }
    }
}

/// A single RCON packet
#[derive(Debug)]
pub struct RconPacket {
    pub id: i32,
    pub packet_type: i32,
    pub body: String,
}

impl RconPacket {
    /// Create a new packet
    pub fn new(id: i32, packet_type: PacketType, body: impl Into<String>) -> Self {
        Self {
            id,
            packet_type: packet_type.as_i32(),
            body: body.into(),
        }
    }

    /// Serialize packet to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let body_bytes = self.body.as_bytes();
        // Size = id(4) + type(4) + body + null(1) + null(1)
        let size = 4 + 4 + body_bytes.len() + 2;

        let mut buf = Vec::with_capacity(4 + size);
        buf.extend_from_slice(&(size as i32).to_le_bytes());
        buf.extend_from_slice(&self.id.to_le_bytes());
        buf.extend_from_slice(&self.packet_type.to_le_bytes());
        buf.extend_from_slice(body_bytes);
        buf.push(0);
        buf.push(0);

        buf
    }

    /// Parse packet from bytes (excluding size prefix)
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 10 {
            return Err(WhitelistError::ProtocolError(
                "RCON packet too short".to_string(),
            ));
        }

        let id = i32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let packet_type = i32::from_le_bytes([data[4], data[5], data[6], data[7]]);

        // Body is everything after type until the first null
        let body_end = data[8..]
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(data.len() - 8);
        let body = String::from_utf8_lossy(&data[8..8 + body_end]).to_string();

        Ok(Self {
            id,
            packet_type,
            body,
        })
    }
}

/// One RCON connection to the game server
///
/// Not reentrant: callers go through [`crate::SessionGateway`], which holds
/// the session behind a mutex for the whole connect/send/disconnect exchange.
pub struct RconSession {
    stream: Option<TcpStream>,
    address: String,
    password: String,
    timeout: Duration,
    next_id: i32,
}

impl RconSession {
    /// Create a new, unconnected session
    pub fn new(address: impl Into<String>, password: impl Into<String>, timeout: Duration) -> Self {
        Self {
            stream: None,
            address: address.into(),
            password: password.into(),
            timeout,
            next_id: 1,
        }
    }

    pub fn from_config(config: &RconConfig) -> Self {
        Self::new(config.address(), config.password.clone(), config.timeout())
    }

    /// Check if a connection is open
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn allocate_id(&mut self) -> i32 {
        let id = self.next_id;
        // Keep clear of the -1 auth failure id
        self.next_id = if self.next_id == i32::MAX { 1 } else { self.next_id + 1 };
        id
    }

    async fn authenticate(&mut self) -> Result<()> {
        let auth_id = self.allocate_id();
        let auth_packet = RconPacket::new(auth_id, PacketType::Auth, self.password.clone());
        self.send_packet(&auth_packet).await?;

        let mut response = self.recv_packet().await?;
        // Source servers send an empty RESPONSE_VALUE ahead of the auth response
        if response.packet_type == packet_type::RESPONSE_VALUE && response.id == auth_id {
            response = self.recv_packet().await?;
        }

        if response.id == AUTH_FAILED_ID {
            return Err(WhitelistError::AuthError);
        }
        if response.id != auth_id {
            warn!(
                "RCON auth response ID mismatch: expected {}, got {}",
                auth_id, response.id
            );
        }
        Ok(())
    }

    /// Send a packet
    async fn send_packet(&mut self, packet: &RconPacket) -> Result<()> {
        let timeout = self.timeout;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| WhitelistError::ProtocolError("RCON not connected".to_string()))?;

        let bytes = packet.to_bytes();
        with_timeout(timeout, "send", stream.write_all(&bytes))
            .await?
            .map_err(|e| WhitelistError::ProtocolError(format!("RCON send failed: {}", e)))?;

        Ok(())
    }

    /// Receive a packet
    async fn recv_packet(&mut self) -> Result<RconPacket> {
        let timeout = self.timeout;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| WhitelistError::ProtocolError("RCON not connected".to_string()))?;

        // Read size (4 bytes, little endian)
        let mut size_buf = [0u8; 4];
        with_timeout(timeout, "receive", stream.read_exact(&mut size_buf))
            .await?
            .map_err(|e| WhitelistError::ProtocolError(format!("RCON recv size failed: {}", e)))?;
        let size = i32::from_le_bytes(size_buf);

        if size < 10 || size as usize > MAX_PACKET_SIZE {
            return Err(WhitelistError::ProtocolError(format!(
                "RCON packet size out of range: {} bytes",
                size
            )));
        }

        let mut data = vec![0u8; size as usize];
        with_timeout(timeout, "receive", stream.read_exact(&mut data))
            .await?
            .map_err(|e| WhitelistError::ProtocolError(format!("RCON recv body failed: {}", e)))?;

        RconPacket::from_bytes(&data)
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
    }
}

#[async_trait]
impl ConsoleSession for RconSession {
    async fn connect(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        info!("Connecting to RCON at {}", self.address);

        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(&self.address))
            .await
            .map_err(|_| {
                WhitelistError::ConnectError(format!(
                    "timed out after {:?} connecting to {}",
                    self.timeout, self.address
                ))
            })?
            .map_err(|e| WhitelistError::ConnectError(format!("{}: {}", self.address, e)))?;
        self.stream = Some(stream);

        match self.authenticate().await {
            Ok(()) => {
                info!("RCON authenticated successfully");
                Ok(())
            }
            Err(e) => {
                self.close().await;
                Err(match e {
                    WhitelistError::AuthError => e,
                    other => WhitelistError::ConnectError(format!("handshake failed: {}", other)),
                })
            }
        }
    }

    async fn send(&mut self, command: &str) -> Result<String> {
        if self.stream.is_none() {
            return Err(WhitelistError::ProtocolError("RCON not connected".to_string()));
        }

        let cmd_id = self.allocate_id();
        let packet = RconPacket::new(cmd_id, PacketType::ExecCommand, command);

        debug!("RCON exec: {}", command);
        let result: Result<RconPacket> = async {
            self.send_packet(&packet).await?;
            // Whitelist and list replies fit in one packet; larger bodies are
            // split by the server and only the first fragment is read
            self.recv_packet().await
        }
        .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                // The stream position is unknown after a failed exchange
                self.close().await;
                return Err(e);
            }
        };

        if response.id != cmd_id {
            debug!(
                "Response ID mismatch: expected {}, got {}",
                cmd_id, response.id
            );
        }

        debug!(
            "RCON response: {}",
            response.body.chars().take(100).collect::<String>()
        );
        Ok(response.body)
    }

    async fn disconnect(&mut self) {
        if self.stream.is_some() {
            self.close().await;
            info!("RCON disconnected");
        }
    }
}

async fn with_timeout<F: Future>(timeout: Duration, what: &str, fut: F) -> Result<F::Output> {
    tokio::time::timeout(timeout, fut).await.map_err(|_| {
        WhitelistError::ProtocolError(format!("RCON {} timed out after {:?}", what, timeout))
    })
}
