//! Client/server integration tests over localhost TCP
// (c) 2025 Ross Younger
//!
//! The server runs on a background thread on an ephemeral control port;
//! clients run on the test thread with an ephemeral data port. Everything
//! else is the real production stack.

use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::path::Path;
use std::thread;

use dcp::channel::tcp::{DataListener, TcpChannel};
use dcp::channel::Channel as _;
use dcp::client::Client;
use dcp::config::Configuration;
use dcp::protocol::Packet;
use dcp::server::Server;
use dcp::storage::StorageDir;
use pretty_assertions::assert_eq;

/// Starts a server over a fresh storage directory, returning its control
/// address and the directory handle.
fn start_server(data_port: u16) -> (SocketAddr, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let storage = StorageDir::new(dir.path()).unwrap();
    let config = Configuration {
        control_port: 0,
        data_port,
    };
    let mut server = Server::bind(storage, config).unwrap();
    let port = server.local_addr().unwrap().port();
    let _worker = thread::spawn(move || {
        let _ = server.run();
    });
    (SocketAddr::from((Ipv4Addr::LOCALHOST, port)), dir)
}

fn client_session(addr: SocketAddr, data: DataListener, storage: &Path) -> Client<TcpChannel> {
    let control = TcpChannel::new(TcpStream::connect(addr).unwrap());
    Client::new(control, data, StorageDir::new(storage).unwrap())
}

#[allow(clippy::cast_possible_truncation)]
fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 256) as u8).collect()
}

#[test]
fn send_then_get_in_a_later_session_is_byte_identical() {
    let data = DataListener::bind(0).unwrap();
    let (addr, _server_dir) = start_server(data.local_port().unwrap());

    let uploads = tempfile::tempdir().unwrap();
    let body = payload(2500); // streams as chunks of 1024, 1024, 452
    std::fs::write(uploads.path().join("report.txt"), &body).unwrap();
    std::fs::write(uploads.path().join("empty.txt"), b"").unwrap();

    // First session: upload both files. (The server thread finishes
    // storing each file before it reads the next command, so the GETs
    // below are strictly ordered after the stores.)
    let mut client = client_session(addr, data, uploads.path());
    assert_eq!(client.send("report.txt").unwrap(), 2500);
    assert_eq!(client.send("empty.txt").unwrap(), 0);

    // Disconnect, keeping the data listener for the next session.
    let (control, data, _storage) = client.into_parts();
    drop(control);

    // Second session: fetch them back into a different directory.
    let downloads = tempfile::tempdir().unwrap();
    let mut client = client_session(addr, data, downloads.path());
    assert_eq!(client.get("report.txt").unwrap(), 2500);
    assert_eq!(client.get("empty.txt").unwrap(), 0);

    assert_eq!(
        std::fs::read(downloads.path().join("report.txt")).unwrap(),
        body
    );
    assert_eq!(
        std::fs::read(downloads.path().join("empty.txt")).unwrap(),
        Vec::<u8>::new()
    );
}

#[test]
fn get_of_an_unknown_name_reports_and_leaves_no_stray_file() {
    let data = DataListener::bind(0).unwrap();
    let (addr, _server_dir) = start_server(data.local_port().unwrap());

    let downloads = tempfile::tempdir().unwrap();
    let mut client = client_session(addr, data, downloads.path());

    let err = client.get("ghost.txt").unwrap_err();
    assert!(err.to_string().contains("ghost.txt"), "{err:#}");
    assert!(!downloads.path().join("ghost.txt").exists());

    // The control channel is still usable for the next command.
    let err = client.get("phantom.txt").unwrap_err();
    assert!(err.to_string().contains("phantom.txt"), "{err:#}");
}

#[test]
fn the_server_outlives_a_client_disconnect() {
    let data = DataListener::bind(0).unwrap();
    let (addr, _server_dir) = start_server(data.local_port().unwrap());

    // A client that connects and immediately goes away...
    drop(TcpStream::connect(addr).unwrap());

    // ...does not stop the next client being served.
    let downloads = tempfile::tempdir().unwrap();
    let mut client = client_session(addr, data, downloads.path());
    let err = client.get("ghost.txt").unwrap_err();
    assert!(err.to_string().contains("ghost.txt"), "{err:#}");
}

#[test]
fn unknown_tags_are_skipped_without_a_response() {
    let (addr, _server_dir) = start_server(1);

    let mut control = TcpChannel::new(TcpStream::connect(addr).unwrap());
    // A tag the server does not know, followed by a well-formed request.
    control.send(&99u32.to_ne_bytes()).unwrap();
    control
        .send(
            &Packet::Get {
                name: "ghost.txt".to_string(),
            }
            .to_bytes(),
        )
        .unwrap();

    // The only response is to the GET.
    let reply = Packet::read_from(&mut control).unwrap();
    let Packet::Error { message } = reply else {
        panic!("expected an Error packet, got {reply:?}");
    };
    assert!(message.contains("ghost.txt"), "{message}");
}
