//! Trajectory plot: one PNG summarizing a whole episode.
//!
//! Every frame leaves a small dot per agent, so paths read as dotted
//! trails; the final frame is drawn at body scale on top. Nothing fancy,
//! but enough to see how an encounter resolved.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use image::ImageEncoder;
use image::codecs::png::PngEncoder;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::observers::{Canvas, Observer, ROBOT_COLOR, Viewport, draw_scene, human_color};
use crate::state::Frame;

const PLOT_SIZE: u32 = 800;
const WORLD_MARGIN: f64 = 1.0;
const TRAIL_RADIUS: f64 = 2.5;

pub struct Plotter {
    path: PathBuf,
    frames: Vec<Frame>,
}

impl Plotter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Plotter {
            path: path.into(),
            frames: Vec::new(),
        }
    }

    /// Renders the accumulated trajectory and writes the PNG.
    pub fn save(&self) -> Result<()> {
        if self.frames.is_empty() {
            warn!("No frames recorded; skipping plot {}", self.path.display());
            return Ok(());
        }

        let viewport = Viewport::fit(&self.frames, PLOT_SIZE, WORLD_MARGIN);
        let mut canvas = Canvas::new(PLOT_SIZE);

        for frame in &self.frames {
            for (index, human) in frame.humans.iter().enumerate() {
                canvas.disc(
                    viewport.to_px(human.position),
                    TRAIL_RADIUS,
                    human_color(index),
                );
            }
            canvas.disc(
                viewport.to_px(frame.robot.position),
                TRAIL_RADIUS,
                ROBOT_COLOR,
            );
        }
        if let Some(last) = self.frames.last() {
            draw_scene(&mut canvas, &viewport, last);
        }

        let artifact_error = |reason: String| Error::Artifact {
            path: self.path.clone(),
            reason,
        };
        let file = File::create(&self.path)?;
        let size = canvas.size();
        PngEncoder::new(BufWriter::new(file))
            .write_image(&canvas.into_pixels(), size, size, image::ColorType::Rgba8)
            .map_err(|e| artifact_error(e.to_string()))?;
        info!("Trajectory plot saved to {}", self.path.display());
        Ok(())
    }
}

impl Observer for Plotter {
    fn observe(&mut self, frame: &Frame) -> Result<()> {
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{FullState, ObservableState, Vec2};

    fn frame(time: f64, robot_x: f64) -> Frame {
        Frame {
            time,
            robot: FullState {
                position: Vec2::new(robot_x, -2.0),
                velocity: Vec2::new(1.0, 0.0),
                radius: 0.3,
                goal: Vec2::new(2.0, 2.0),
                v_pref: 1.0,
                theta: 0.0,
            },
            humans: vec![ObservableState {
                position: Vec2::new(-robot_x, 1.0),
                velocity: Vec2::ZERO,
                radius: 0.3,
            }],
        }
    }

    #[test]
    fn save_writes_a_decodable_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trajectory.png");
        let mut plotter = Plotter::new(&path);
        for step in 0..8 {
            plotter.observe(&frame(step as f64 * 0.25, step as f64 * 0.3)).unwrap();
        }
        plotter.finalize().unwrap();

        let decoded = image::open(&path).unwrap();
        assert_eq!(decoded.width(), PLOT_SIZE);
        assert_eq!(decoded.height(), PLOT_SIZE);
    }

    #[test]
    fn empty_episode_writes_nothing_but_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.png");
        let plotter = Plotter::new(&path);
        plotter.save().unwrap();
        assert!(!path.exists());
    }
}
