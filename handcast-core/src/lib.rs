//! Handcast protocol reference implementation.
//! No I/O here: transport crates feed bytes in and push frames out.

pub mod protocol;
pub mod reader;
pub mod wire;

pub use protocol::{Frame, Hand, Landmark, LANDMARKS_PER_HAND, MAX_HANDS};
pub use reader::{FrameTooLarge, StreamReader};
pub use wire::{decode_payload, encode_frame, EncodeError, MalformedFrame};
