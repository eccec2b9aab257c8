//! TCP-backed channel and per-operation data-channel establishment
// (c) 2025 Ross Younger

use std::io::{Read as _, Write as _};
use std::net::{SocketAddr, TcpListener, TcpStream};

use tracing::trace;

use super::{Channel, ChannelError};

/// The production [`Channel`]: a connected TCP stream.
///
/// Dropping the value closes the underlying socket. Data channels rely on
/// this for their teardown guarantee: a handler drops its `TcpChannel` on
/// every exit path before the control channel is read again.
#[derive(Debug)]
pub struct TcpChannel {
    stream: TcpStream,
}

impl TcpChannel {
    /// Wraps an accepted or connected stream.
    #[must_use]
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    /// Initiator side of data-channel establishment: connects out to `addr`.
    ///
    /// The server calls this once per operation, targeting the peer address
    /// observed on the control connection at the configured data port.
    pub fn connect(addr: SocketAddr) -> Result<Self, ChannelError> {
        let stream = TcpStream::connect(addr)?;
        trace!("connected to {addr}");
        Ok(Self::new(stream))
    }

    /// The address of the peer at the far end.
    pub fn peer_addr(&self) -> Result<SocketAddr, ChannelError> {
        Ok(self.stream.peer_addr()?)
    }
}

impl Channel for TcpChannel {
    fn send(&mut self, buf: &[u8]) -> Result<(), ChannelError> {
        Ok(self.stream.write_all(buf)?)
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<(), ChannelError> {
        Ok(self.stream.read_exact(buf)?)
    }
}

/// Acceptor side of data-channel establishment.
///
/// The client binds this on the well-known data port before issuing any
/// command, then accepts exactly one inbound connection per operation.
#[derive(Debug)]
pub struct DataListener {
    listener: TcpListener,
}

impl DataListener {
    /// Binds the data port on all interfaces. Port 0 selects an ephemeral
    /// port, which tests use.
    pub fn bind(port: u16) -> Result<Self, ChannelError> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        Ok(Self { listener })
    }

    /// The locally bound port.
    pub fn local_port(&self) -> Result<u16, ChannelError> {
        Ok(self.listener.local_addr()?.port())
    }

    /// Accepts the next inbound data connection.
    pub fn accept(&self) -> Result<TcpChannel, ChannelError> {
        let (stream, peer) = self.listener.accept()?;
        trace!("data channel accepted from {peer}");
        Ok(TcpChannel::new(stream))
    }
}
