//! Frame sources. The camera + pose-estimation pipeline is an external
//! collaborator; the daemon binary runs on the synthetic source below.

use handcast_core::{Frame, Hand, Landmark, LANDMARKS_PER_HAND};

/// Anything that yields one frame per publish tick.
pub trait FrameSource {
    fn next_frame(&mut self) -> Frame;
}

/// Parametric waving hand: a stand-in producer with the same output shape as
/// a real pose pipeline (one hand, 21 normalized landmarks, optional image).
pub struct SyntheticSource {
    tick: u64,
    with_image: bool,
}

impl SyntheticSource {
    pub fn new(with_image: bool) -> Self {
        Self {
            tick: 0,
            with_image,
        }
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Frame {
        self.tick += 1;
        let t = self.tick as f64 / 60.0;
        let sway = 0.15 * (t * 2.0).sin();

        let mut landmarks = [Landmark::default(); LANDMARKS_PER_HAND];
        // Wrist at the base, four joints per digit fanning upward.
        landmarks[0] = Landmark::new(0.5 + sway, 0.8, 0.0);
        for digit in 0..5 {
            let spread = (digit as f64 - 2.0) * 0.06;
            for joint in 0..4 {
                let reach = 0.08 * (joint + 1) as f64;
                let idx = 1 + digit * 4 + joint;
                landmarks[idx] = Landmark::new(
                    0.5 + sway + spread,
                    0.8 - reach,
                    -0.02 * (joint + 1) as f64,
                );
            }
        }

        let hands = vec![Hand::new(landmarks)];
        if self.with_image {
            // Placeholder JPEG blob (SOI/EOI around filler); a real pipeline
            // would attach the compressed camera frame here.
            let mut image = vec![0xff, 0xd8];
            image.extend(std::iter::repeat(0x00).take(64));
            image.extend([0xff, 0xd9]);
            Frame::with_image(hands, image)
        } else {
            Frame::pose_only(hands)
        }
    }
}
