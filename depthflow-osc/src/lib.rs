//! # OSC motion grid sink
//!
//! Publishes each aggregated grid as a single OSC message: the cells
//! flattened in row-major order into float32 arguments, addressed under one
//! fixed channel, sent as an unacknowledged UDP datagram to a fixed
//! endpoint. No batching, no rate limiting.

use depthflow::prelude::v1::*;
use log::*;
use rosc::{encoder, OscMessage, OscPacket, OscType};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

/// Default logical channel the grid is published under.
pub const DEFAULT_ADDRESS: &str = "/motion";

/// Default local consumer endpoint.
pub const DEFAULT_ENDPOINT: &str = "127.0.0.1:8888";

/// Fire-and-forget OSC sink over UDP.
pub struct OscSink {
    socket: UdpSocket,
    target: SocketAddr,
    address: String,
}

impl OscSink {
    /// Bind an ephemeral local socket aimed at `target`.
    ///
    /// # Arguments
    ///
    /// * `target` - consumer endpoint, e.g. `127.0.0.1:8888`.
    /// * `address` - OSC address pattern, e.g. `/motion`.
    pub fn new(target: impl ToSocketAddrs, address: impl Into<String>) -> Result<Self> {
        let target = target
            .to_socket_addrs()
            .map_err(|e| Error::Sink(e.to_string()))?
            .next()
            .ok_or_else(|| Error::Sink("endpoint resolved to no address".into()))?;

        let socket = UdpSocket::bind("0.0.0.0:0").map_err(|e| Error::Sink(e.to_string()))?;
        let address = address.into();

        info!("publishing motion grids to {} at {}", target, address);

        Ok(Self {
            socket,
            target,
            address,
        })
    }

    /// Sink aimed at the default local endpoint and channel.
    pub fn default_endpoint() -> Result<Self> {
        Self::new(DEFAULT_ENDPOINT, DEFAULT_ADDRESS)
    }
}

impl MotionSink for OscSink {
    fn publish(&mut self, grid: &MotionGrid) -> Result<()> {
        let args = grid
            .as_slice()
            .iter()
            .map(|&v| OscType::Float(v))
            .collect();

        let packet = OscPacket::Message(OscMessage {
            addr: self.address.clone(),
            args,
        });

        let buf = encoder::encode(&packet).map_err(|e| Error::Sink(e.to_string()))?;

        self.socket
            .send_to(&buf, self.target)
            .map_err(|e| Error::Sink(e.to_string()))?;

        Ok(())
    }
}
