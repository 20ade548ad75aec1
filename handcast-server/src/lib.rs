//! Producer side: accepts consumer connections and broadcasts encoded frames.

pub mod config;
pub mod registry;
pub mod server;
pub mod source;

pub use config::Config;
pub use registry::Registry;
pub use server::{BroadcastServer, ServerOptions};
pub use source::{FrameSource, SyntheticSource};
