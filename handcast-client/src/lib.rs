//! Consumer side: connect to a producer and poll the latest decoded frame.

pub mod client;

pub use client::{
    ClientConfig, ClientStatus, ConnectError, DisconnectReason, StreamingClient,
};
