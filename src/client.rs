//! Client session: GET and SEND commands over the control channel
// (c) 2025 Ross Younger

use std::fs::File;
use std::net::{TcpStream, ToSocketAddrs as _};

use anyhow::{bail, Context as _};
use human_repr::HumanCount as _;
use tracing::{debug, info, trace};

use crate::channel::tcp::{DataListener, TcpChannel};
use crate::channel::Channel;
use crate::config::Configuration;
use crate::protocol::Packet;
use crate::storage::{base_name, StorageDir};
use crate::transfer;

/// A client session: one control channel held for the process lifetime,
/// the pre-bound data listener, and the local storage root.
///
/// A command's failure aborts only that command; the control channel is
/// never closed as a side effect.
#[derive(Debug)]
pub struct Client<C: Channel> {
    control: C,
    data: DataListener,
    storage: StorageDir,
}

impl Client<TcpChannel> {
    /// Connects the control channel to `host` and binds the data listener.
    ///
    /// The data listener is bound before any command is issued; each
    /// operation accepts exactly one inbound connection from the server
    /// on it.
    pub fn connect(host: &str, config: &Configuration, storage: StorageDir) -> anyhow::Result<Self> {
        let data = DataListener::bind(config.data_port)
            .with_context(|| format!("binding data port {}", config.data_port))?;
        let addr = (host, config.control_port)
            .to_socket_addrs()?
            .next()
            .with_context(|| format!("{host} did not resolve"))?;
        let stream = TcpStream::connect(addr).with_context(|| format!("connecting to {addr}"))?;
        info!("connected to {addr}");
        Ok(Self {
            control: TcpChannel::new(stream),
            data,
            storage,
        })
    }
}

impl<C: Channel> Client<C> {
    /// Assembles a session from parts. Tests use this with an in-memory
    /// control channel and an ephemeral data port.
    pub fn new(control: C, data: DataListener, storage: StorageDir) -> Self {
        Self {
            control,
            data,
            storage,
        }
    }

    /// Dismantles the session, recovering the data listener so a new
    /// session can reuse the bound port.
    #[must_use]
    pub fn into_parts(self) -> (C, DataListener, StorageDir) {
        (self.control, self.data, self.storage)
    }

    /// GET: fetch `name` from the server into local storage.
    ///
    /// Returns the number of bytes received.
    pub fn get(&mut self, name: &str) -> anyhow::Result<u64> {
        let name = base_name(name)?.to_string();
        // The local file is created up front; any failure after this point
        // removes it again, so a failed GET leaves no stray file behind.
        let mut file = self.storage.create(&name)?;
        match self.get_inner(&name, &mut file) {
            Ok(received) => Ok(received),
            Err(e) => {
                drop(file);
                self.discard(&name);
                Err(e)
            }
        }
    }

    fn get_inner(&mut self, name: &str, file: &mut File) -> anyhow::Result<u64> {
        trace!("GET {name}: sending request");
        self.control.send(
            &Packet::Get {
                name: name.to_string(),
            }
            .to_bytes(),
        )?;

        match Packet::read_from(&mut self.control)? {
            Packet::Send { file_size, .. } => {
                trace!("GET {name}: server announced {file_size} bytes");
                let mut data = self.data.accept()?;
                let result = transfer::receive_file(file, file_size, &mut data);
                drop(data);
                result.with_context(|| format!("receiving {name}"))?;
                info!("received {name} ({})", file_size.human_count_bytes());
                Ok(u64::from(file_size))
            }
            Packet::Error { message } => bail!("server reported: {message}"),
            Packet::Get { .. } => bail!("unexpected Get packet in reply to GET"),
        }
    }

    /// SEND: stream a local file to the server.
    ///
    /// Returns the number of bytes sent.
    pub fn send(&mut self, name: &str) -> anyhow::Result<u64> {
        let name = base_name(name)?.to_string();
        let (mut file, size) = self.storage.open(&name)?;
        trace!("SEND {name}: announcing {size} bytes");
        self.control.send(
            &Packet::Send {
                name: name.clone(),
                file_size: size,
            }
            .to_bytes(),
        )?;

        let mut data = self.data.accept()?;
        let sent = transfer::send_file(&mut file, &mut data)?;
        drop(data);
        if sent != u64::from(size) {
            bail!("{name} changed size mid-transfer: sent {sent} of {size} bytes");
        }
        info!("sent {name} ({})", size.human_count_bytes());
        Ok(sent)
    }

    fn discard(&self, name: &str) {
        if let Err(e) = self.storage.delete(name) {
            debug!("could not remove {name}: {e}");
        }
    }
}
