//! Episode replay as an animated GIF.
//!
//! The camera is fixed over the whole episode so motion reads correctly,
//! and each GIF frame holds for the simulated step interval, giving a
//! real-time replay.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Duration;

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, RgbaImage};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::observers::{Canvas, Observer, Viewport, draw_scene};
use crate::state::Frame;

const VIDEO_SIZE: u32 = 400;
const WORLD_MARGIN: f64 = 1.0;
const DEFAULT_STEP: f64 = 0.25;

pub struct Video {
    path: PathBuf,
    frames: Vec<Frame>,
}

impl Video {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Video {
            path: path.into(),
            frames: Vec::new(),
        }
    }

    /// Encodes the accumulated frames into the GIF.
    pub fn make(&self) -> Result<()> {
        if self.frames.is_empty() {
            warn!("No frames recorded; skipping video {}", self.path.display());
            return Ok(());
        }

        let artifact_error = |reason: String| Error::Artifact {
            path: self.path.clone(),
            reason,
        };

        // Step interval from the recorded clock, so replay runs at
        // simulation speed.
        let step = match self.frames.as_slice() {
            [first, second, ..] => (second.time - first.time).max(0.01),
            _ => DEFAULT_STEP,
        };
        let delay = Delay::from_saturating_duration(Duration::from_secs_f64(step));

        let viewport = Viewport::fit(&self.frames, VIDEO_SIZE, WORLD_MARGIN);
        let file = File::create(&self.path)?;
        let mut encoder = GifEncoder::new(BufWriter::new(file));
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| artifact_error(e.to_string()))?;

        for frame in &self.frames {
            let mut canvas = Canvas::new(VIDEO_SIZE);
            draw_scene(&mut canvas, &viewport, frame);
            let image = RgbaImage::from_raw(VIDEO_SIZE, VIDEO_SIZE, canvas.into_pixels())
                .ok_or_else(|| artifact_error("raster buffer has the wrong size".into()))?;
            encoder
                .encode_frame(image::Frame::from_parts(image, 0, 0, delay))
                .map_err(|e| artifact_error(e.to_string()))?;
        }
        info!(
            "Episode video ({} frames) saved to {}",
            self.frames.len(),
            self.path.display()
        );
        Ok(())
    }
}

impl Observer for Video {
    fn observe(&mut self, frame: &Frame) -> Result<()> {
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        self.make()
    }
}
