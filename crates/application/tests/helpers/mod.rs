#![allow(dead_code)]

pub mod datagrams;
pub mod mock_ports;

pub use datagrams::{dns_answer, query_datagram, query_datagram_to};
pub use mock_ports::{
    wait_until, MockInterface, MockLeakGuard, MockOpener, MockStream, MockTransport,
    MockTransportFactory, RecordingEvents,
};
