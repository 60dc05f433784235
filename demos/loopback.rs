//! Runs a QKD-backed key exchange between two threads sharing a simulated QKD provider.
//!
//! A channel plays the part of the handshake messages that carry the public values. Run
//! with `RUST_LOG=debug` to see the exchange states and provider calls.
//!
//! Note that `unwrap()` is used to deal with errors; this is not something that is
//! sensible outside of example code.
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use rustls_qkd_kx::{ExchangeConfig, KeyExchange, PeerAddress, Role, SimulatedQkd};

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn main() {
    env_logger::init();

    let qkd = Arc::new(SimulatedQkd::default());
    let config = Arc::new(ExchangeConfig::simulated());
    let (to_responder, from_initiator) = mpsc::channel::<Vec<u8>>();
    let (to_initiator, from_responder) = mpsc::channel::<Vec<u8>>();

    let mut responder = KeyExchange::new(
        qkd.clone(),
        config.clone(),
        Arc::new(Role::Responder),
        PeerAddress::from("alice"),
    );
    let responder = thread::spawn(move || {
        let offered = from_initiator.recv().unwrap();
        let secret = responder.compute_shared_secret(&offered).unwrap();
        let echoed = responder.produce_local_public_value().unwrap();
        to_initiator.send(echoed.as_bytes().to_vec()).unwrap();
        secret.secret_bytes().to_vec()
    });

    let mut initiator = KeyExchange::new(
        qkd.clone(),
        config,
        Arc::new(Role::Initiator),
        PeerAddress::from("bob"),
    );
    let handle = initiator.produce_local_public_value().unwrap();
    println!("key handle: {}", to_hex(handle.as_bytes()));
    to_responder.send(handle.as_bytes().to_vec()).unwrap();
    let echoed = from_responder.recv().unwrap();
    let secret = initiator.compute_shared_secret(&echoed).unwrap();

    let responder_secret = responder.join().unwrap();
    println!("initiator secret: {}", to_hex(secret.secret_bytes()));
    println!("responder secret: {}", to_hex(&responder_secret));
    assert_eq!(secret.secret_bytes(), responder_secret.as_slice());
    assert_eq!(qkd.open_sessions(), 0);
}
