//! Frame payload types: landmarks, hands, frames.

use serde::{Deserialize, Serialize};

/// Landmarks per hand. Fixed by the pose model's anatomical indexing.
pub const LANDMARKS_PER_HAND: usize = 21;

/// Producer-side cap on hands per frame. Consumers tolerate 0..=MAX_HANDS.
pub const MAX_HANDS: usize = 2;

/// Anatomical landmark indices (wrist = 0 .. pinky tip = 20).
/// Index identifies the anatomical point, not spatial position.
pub mod index {
    pub const WRIST: usize = 0;
    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_FINGER_MCP: usize = 5;
    pub const INDEX_FINGER_PIP: usize = 6;
    pub const INDEX_FINGER_DIP: usize = 7;
    pub const INDEX_FINGER_TIP: usize = 8;
    pub const MIDDLE_FINGER_MCP: usize = 9;
    pub const MIDDLE_FINGER_PIP: usize = 10;
    pub const MIDDLE_FINGER_DIP: usize = 11;
    pub const MIDDLE_FINGER_TIP: usize = 12;
    pub const RING_FINGER_MCP: usize = 13;
    pub const RING_FINGER_PIP: usize = 14;
    pub const RING_FINGER_DIP: usize = 15;
    pub const RING_FINGER_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_DIP: usize = 19;
    pub const PINKY_TIP: usize = 20;
}

/// One anatomical point. x/y normalized to [0,1]; z is depth relative to
/// the wrist, small signed range.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// One tracked hand: exactly 21 landmarks in anatomical order.
/// The fixed-length array makes partial hands unrepresentable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hand {
    landmarks: [Landmark; LANDMARKS_PER_HAND],
}

impl Hand {
    pub fn new(landmarks: [Landmark; LANDMARKS_PER_HAND]) -> Self {
        Self { landmarks }
    }

    /// Build from a slice; `None` unless exactly 21 landmarks are given.
    /// A producer missing landmark data must omit the whole hand.
    pub fn from_slice(landmarks: &[Landmark]) -> Option<Self> {
        let landmarks: [Landmark; LANDMARKS_PER_HAND] = landmarks.try_into().ok()?;
        Some(Self { landmarks })
    }

    pub fn landmark(&self, idx: usize) -> Landmark {
        self.landmarks[idx]
    }

    pub fn landmarks(&self) -> &[Landmark; LANDMARKS_PER_HAND] {
        &self.landmarks
    }

    pub fn wrist(&self) -> Landmark {
        self.landmarks[index::WRIST]
    }
}

/// Unit of transmission: 0..=2 hands plus an optional compressed image.
/// Frames have no identity beyond arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    hands: Vec<Hand>,
    image: Vec<u8>,
}

impl Frame {
    /// Pose-only frame: empty image blob.
    pub fn pose_only(hands: Vec<Hand>) -> Self {
        Self::with_image(hands, Vec::new())
    }

    /// Frame with a compressed image payload (e.g. JPEG).
    /// More than [`MAX_HANDS`] hands are truncated, keeping the first
    /// hands in detector-reported order.
    pub fn with_image(mut hands: Vec<Hand>, image: Vec<u8>) -> Self {
        hands.truncate(MAX_HANDS);
        Self { hands, image }
    }

    pub fn hands(&self) -> &[Hand] {
        &self.hands
    }

    /// Compressed image bytes; empty in pose-only mode.
    pub fn image(&self) -> &[u8] {
        &self.image
    }

    pub fn has_image(&self) -> bool {
        !self.image.is_empty()
    }
}
