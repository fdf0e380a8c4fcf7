//! Frame observers: consumers that watch an episode unfold.
//!
//! The runner pushes one [`Frame`] per step to every registered observer,
//! in registration order, then gives each a chance to finalize its
//! artifact once the episode ends.

pub mod plotter;
pub mod video;

pub use plotter::Plotter;
pub use video::Video;

use crate::error::Result;
use crate::state::{Frame, Vec2};

pub trait Observer: Send {
    /// Receives the scene exactly once per step, in step order.
    fn observe(&mut self, frame: &Frame) -> Result<()>;

    /// Called once after the episode finishes; writes whatever artifact
    /// the observer was accumulating.
    fn finalize(&mut self) -> Result<()>;
}

/// Fans one frame out to every observer in order. The first failure stops
/// the fan-out and is returned to the caller.
pub fn notify(observers: &mut [Box<dyn Observer>], frame: &Frame) -> Result<()> {
    for observer in observers.iter_mut() {
        observer.observe(frame)?;
    }
    Ok(())
}

pub(crate) type Rgba = [u8; 4];

pub(crate) const BACKGROUND: Rgba = [255, 255, 255, 255];
pub(crate) const ROBOT_COLOR: Rgba = [230, 126, 34, 255];
pub(crate) const GOAL_COLOR: Rgba = [39, 174, 96, 255];
pub(crate) const HUMAN_PALETTE: [Rgba; 5] = [
    [52, 152, 219, 255],
    [155, 89, 182, 255],
    [26, 188, 156, 255],
    [241, 196, 15, 255],
    [127, 140, 141, 255],
];

pub(crate) fn human_color(index: usize) -> Rgba {
    HUMAN_PALETTE[index % HUMAN_PALETTE.len()]
}

/// Square window onto the world, mapping metres to pixels.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Viewport {
    center: Vec2,
    /// World metres covered by the window's width.
    span: f64,
    size: u32,
}

impl Viewport {
    /// Fits a square window around everything the frames touch, padded by
    /// `margin` metres on each side.
    pub(crate) fn fit(frames: &[Frame], size: u32, margin: f64) -> Viewport {
        let mut min = Vec2::new(f64::INFINITY, f64::INFINITY);
        let mut max = Vec2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        let mut include = |p: Vec2| {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        };
        for frame in frames {
            include(frame.robot.position);
            include(frame.robot.goal);
            for human in &frame.humans {
                include(human.position);
            }
        }
        if min.x > max.x {
            // No frames; pick something sane so callers still get pixels.
            min = Vec2::new(-5.0, -5.0);
            max = Vec2::new(5.0, 5.0);
        }

        let center = (min + max) / 2.0;
        let span = ((max.x - min.x).max(max.y - min.y) + 2.0 * margin).max(1.0);
        Viewport { center, span, size }
    }

    /// Pixels per world metre.
    pub(crate) fn scale(&self) -> f64 {
        self.size as f64 / self.span
    }

    /// World position to pixel coordinates, y flipped so north is up.
    pub(crate) fn to_px(&self, p: Vec2) -> (f64, f64) {
        let half = self.span / 2.0;
        let x = (p.x - self.center.x + half) * self.scale();
        let y = (self.center.y + half - p.y) * self.scale();
        (x, y)
    }
}

/// Plain RGBA raster.
pub(crate) struct Canvas {
    size: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    pub(crate) fn new(size: u32) -> Canvas {
        let mut pixels = Vec::with_capacity((size * size * 4) as usize);
        for _ in 0..size * size {
            pixels.extend_from_slice(&BACKGROUND);
        }
        Canvas { size, pixels }
    }

    pub(crate) fn size(&self) -> u32 {
        self.size
    }

    fn set(&mut self, x: i64, y: i64, color: Rgba) {
        if x < 0 || y < 0 || x >= self.size as i64 || y >= self.size as i64 {
            return;
        }
        let offset = ((y as u32 * self.size + x as u32) * 4) as usize;
        self.pixels[offset..offset + 4].copy_from_slice(&color);
    }

    /// Filled disc at pixel coordinates.
    pub(crate) fn disc(&mut self, center: (f64, f64), radius: f64, color: Rgba) {
        let r = radius.max(1.0);
        let (cx, cy) = center;
        let x0 = (cx - r).floor() as i64;
        let x1 = (cx + r).ceil() as i64;
        let y0 = (cy - r).floor() as i64;
        let y1 = (cy + r).ceil() as i64;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let dx = x as f64 + 0.5 - cx;
                let dy = y as f64 + 0.5 - cy;
                if dx * dx + dy * dy <= r * r {
                    self.set(x, y, color);
                }
            }
        }
    }

    /// Ring outline, drawn as the band between two radii.
    pub(crate) fn ring(&mut self, center: (f64, f64), radius: f64, color: Rgba) {
        let r = radius.max(1.0);
        let inner = (r - 1.5).max(0.0);
        let (cx, cy) = center;
        let x0 = (cx - r).floor() as i64;
        let x1 = (cx + r).ceil() as i64;
        let y0 = (cy - r).floor() as i64;
        let y1 = (cy + r).ceil() as i64;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let dx = x as f64 + 0.5 - cx;
                let dy = y as f64 + 0.5 - cy;
                let d2 = dx * dx + dy * dy;
                if d2 <= r * r && d2 >= inner * inner {
                    self.set(x, y, color);
                }
            }
        }
    }

    pub(crate) fn pixel(&self, x: u32, y: u32) -> Rgba {
        let offset = ((y * self.size + x) * 4) as usize;
        [
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
            self.pixels[offset + 3],
        ]
    }

    pub(crate) fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }
}

/// Draws one frame's scene: goal marker, humans at body radius, robot on
/// top. Shared by the still plot's final pose and every video frame.
pub(crate) fn draw_scene(canvas: &mut Canvas, viewport: &Viewport, frame: &Frame) {
    let scale = viewport.scale();
    canvas.ring(
        viewport.to_px(frame.robot.goal),
        (0.3 * scale).max(3.0),
        GOAL_COLOR,
    );
    for (index, human) in frame.humans.iter().enumerate() {
        canvas.disc(
            viewport.to_px(human.position),
            human.radius * scale,
            human_color(index),
        );
    }
    canvas.disc(
        viewport.to_px(frame.robot.position),
        frame.robot.radius * scale,
        ROBOT_COLOR,
    );
}
