//! Server: accept loop, session dispatch and request handlers
// (c) 2025 Ross Younger

use std::net::{IpAddr, SocketAddr, TcpListener};

use human_repr::HumanCount as _;
use tracing::{debug, error, info, warn};

use crate::channel::tcp::TcpChannel;
use crate::channel::{Channel, ChannelError};
use crate::config::Configuration;
use crate::protocol::{Packet, PacketTag, ProtocolError};
use crate::storage::{base_name, KnownFiles, StorageDir, StorageError};
use crate::transfer;

/// Errors that propagate out of a request handler to the session loop.
///
/// Only the two classes with session-level policy appear here. Storage and
/// data-channel faults are resolved inside the handler (Error packet,
/// partial-file cleanup) and do not unwind.
#[derive(Debug, thiserror::Error)]
enum SessionError {
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// A server process: storage, the known-files registry and the control
/// listener. Serves one client at a time, by design.
#[derive(Debug)]
pub struct Server {
    storage: StorageDir,
    known: KnownFiles,
    listener: TcpListener,
    config: Configuration,
}

impl Server {
    /// Probes storage, seeds the known-files registry and binds the
    /// control port.
    pub fn bind(storage: StorageDir, config: Configuration) -> anyhow::Result<Self> {
        storage.probe_writable()?;
        let known = KnownFiles::seed(storage.enumerate()?);
        let listener = TcpListener::bind(("0.0.0.0", config.control_port))?;
        let port = listener.local_addr()?.port();
        info!(
            "serving {root} ({n} file(s)) on port {port}",
            root = storage.root().display(),
            n = known.len(),
        );
        Ok(Self {
            storage,
            known,
            listener,
            config,
        })
    }

    /// The bound control address. Tests bind port 0 and look it up here.
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept loop: serves one control connection at a time, forever.
    ///
    /// A new connection is accepted only after the previous one has fully
    /// disconnected. Returns only on a fatal control-channel fault.
    pub fn run(&mut self) -> anyhow::Result<()> {
        loop {
            let (stream, peer) = self.listener.accept()?;
            info!("accepted control connection from {peer}");
            let mut control = TcpChannel::new(stream);
            match self.serve_session(&mut control, peer.ip()) {
                Ok(()) => info!("client disconnected, waiting for a new connection"),
                Err(e) => {
                    error!("control channel failed: {e}");
                    return Err(e.into());
                }
            }
        }
    }

    /// One session: dispatches packets until the peer disconnects.
    ///
    /// `Ok` is an orderly disconnect; `Err` is a fatal control-channel
    /// fault. A protocol error aborts the current request only (its data
    /// channel, if any, has already been dropped) and dispatch continues.
    fn serve_session<C: Channel>(&mut self, control: &mut C, peer: IpAddr) -> Result<(), ChannelError> {
        loop {
            let mut raw = [0u8; 4];
            match control.receive(&mut raw) {
                Ok(()) => (),
                Err(e) if e.is_disconnect() => return Ok(()),
                Err(e) => return Err(e),
            }
            let raw = u32::from_ne_bytes(raw);
            let Some(tag) = PacketTag::from_wire(raw) else {
                // Documented gap: unknown tags are skipped with no response.
                debug!("ignoring unknown packet tag {raw}");
                continue;
            };
            debug!("dispatching {tag}");
            match self.dispatch(control, tag, peer) {
                Ok(()) => (),
                Err(SessionError::Channel(e)) if e.is_disconnect() => return Ok(()),
                Err(SessionError::Channel(e)) => return Err(e),
                Err(SessionError::Protocol(e)) => warn!("protocol error, request abandoned: {e}"),
            }
        }
    }

    fn dispatch<C: Channel>(
        &mut self,
        control: &mut C,
        tag: PacketTag,
        peer: IpAddr,
    ) -> Result<(), SessionError> {
        match Packet::read_body(tag, control)? {
            Packet::Send { name, file_size } => self.handle_send(control, peer, &name, file_size),
            Packet::Get { name } => self.handle_get(control, peer, &name),
            // Clients only have cause to send Error in reply to a request,
            // but consuming the body keeps the channel in sync if one
            // arrives out of turn.
            Packet::Error { message } => {
                warn!("peer sent an error out of turn: {message}");
                Ok(())
            }
        }
    }

    /// SEND: the client is streaming a file to us.
    fn handle_send<C: Channel>(
        &mut self,
        control: &mut C,
        peer: IpAddr,
        name: &str,
        file_size: u32,
    ) -> Result<(), SessionError> {
        info!(
            "client is sending {name} ({size})",
            size = file_size.human_count_bytes()
        );
        let (name, mut file) = match self.create_destination(name) {
            Ok(pair) => pair,
            Err(e) => {
                warn!("{e}");
                return send_error(control, &format!("Couldn't open {name} for writing."));
            }
        };

        let mut data = match self.open_data_channel(peer) {
            Ok(data) => data,
            Err(e) => {
                warn!("data channel establishment failed: {e}");
                self.discard_partial(&name);
                return Ok(()); // the operation is aborted; the session continues
            }
        };

        let result = transfer::receive_file(&mut file, file_size, &mut data);
        drop(data);
        match result {
            Ok(()) => {
                info!("stored {name}");
                self.known.insert(name);
            }
            Err(e) => {
                warn!("receive failed, file not stored: {e}");
                self.discard_partial(&name);
            }
        }
        Ok(())
    }

    /// GET: stream a stored file back to the client.
    fn handle_get<C: Channel>(
        &mut self,
        control: &mut C,
        peer: IpAddr,
        name: &str,
    ) -> Result<(), SessionError> {
        let Ok(name) = base_name(name) else {
            return send_error(control, &format!("No such file: {name}"));
        };
        info!("client requested {name}");
        if !self.known.contains(name) {
            return send_error(control, &format!("No such file: {name}"));
        }
        let (mut file, size) = match self.storage.open(name) {
            Ok(pair) => pair,
            Err(e) => {
                warn!("{e}");
                return send_error(control, &format!("Couldn't open {name} for reading."));
            }
        };

        control.send(
            &Packet::Send {
                name: name.to_string(),
                file_size: size,
            }
            .to_bytes(),
        )?;

        let mut data = match self.open_data_channel(peer) {
            Ok(data) => data,
            Err(e) => {
                warn!("data channel establishment failed: {e}");
                return Ok(());
            }
        };
        match transfer::send_file(&mut file, &mut data) {
            Ok(sent) if sent == u64::from(size) => {
                info!("sent {name} ({})", size.human_count_bytes());
            }
            Ok(sent) => warn!("{name} changed size mid-transfer: sent {sent} of {size} bytes"),
            Err(e) => warn!("send failed: {e}"),
        }
        Ok(())
    }

    /// Opens the per-operation data channel back to the peer.
    fn open_data_channel(&self, peer: IpAddr) -> Result<TcpChannel, ChannelError> {
        TcpChannel::connect(SocketAddr::new(peer, self.config.data_port))
    }

    fn create_destination(&self, name: &str) -> Result<(String, std::fs::File), StorageError> {
        let name = base_name(name)?.to_string();
        let file = self.storage.create(&name)?;
        Ok((name, file))
    }

    /// Deletes a partially received file; partial transfers never register.
    fn discard_partial(&self, name: &str) {
        if let Err(e) = self.storage.delete(name) {
            warn!("could not remove partial file {name}: {e}");
        }
    }
}

/// Sends an Error packet on the control channel. The control channel stays
/// open; only the current request is affected.
fn send_error<C: Channel>(control: &mut C, message: &str) -> Result<(), SessionError> {
    debug!("replying with error: {message}");
    Ok(control.send(
        &Packet::Error {
            message: message.to_string(),
        }
        .to_bytes(),
    )?)
}
