// (c) 2025 Ross Younger

//! The Dual-Channel Copier (`dcp`) is a point-to-point file transfer
//! utility built around a classic split control/data channel design, in
//! the spirit of FTP's active mode.
//!
//! ## Overview
//! - One client talks to one server process at a time over a persistent
//!   **control channel** carrying tagged, length-prefixed packets.
//! - File bytes never travel on the control channel: each GET or SEND
//!   opens a fresh, short-lived **data channel** for that one transfer,
//!   torn down before the next command is read.
//! - The client is the acceptor for data channels; the server connects
//!   back to it.
//! - Everything is synchronous and blocking, and operations are strictly
//!   serialized. One client is served at a time, by design.
//!
//! See the [protocol] module for the wire format and exchanges.
//!
//! ## What dcp is not
//! * Encrypted or authenticated. Do not run it across a network you do
//!   not trust.
//! * A multi-client file server.
//! * A resumable or delta transfer tool.
//! * Portable across architectures with different byte order: packets use
//!   host byte order on the wire.
//!
//! ## Usage
//!
//! Serve a directory:
//! ```sh
//! dcp --server /srv/files
//! ```
//!
//! Exchange files with it (commands are read from standard input):
//! ```sh
//! dcp fileserver.example.com
//! GET report.txt
//! SEND holiday.jpg
//! ```
//!
//! #### Feature flags
#![doc = document_features::document_features!()]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod channel;
pub(crate) mod cli;
pub use cli::cli as main;
pub mod client;
pub mod config;
pub use config::Configuration;
pub mod protocol;
pub mod server;
pub mod storage;
pub mod transfer;
pub(crate) mod util;
