//! Waveform and grain trigger visualization on abstract 2D drawing surfaces.

pub mod raster;

use std::time::Duration;

use rand::Rng;

use crate::{buffer::AudioSourceBuffer, config::SessionConfig, waveform::waveform_columns};

// -------------------------------------------------------------------------------------------------

/// An opaque RGB color.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// The color as opaque RGBA bytes.
    pub const fn rgba(self) -> [u8; 4] {
        [self.r, self.g, self.b, 0xFF]
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Random color of a grain trigger mark: a reddish tone with random green and blue parts.
pub fn trigger_color<R: Rng + ?Sized>(rng: &mut R) -> Rgb {
    Rgb::new(
        rng.random_range(125..250),
        rng.random_range(0..250),
        rng.random_range(0..250),
    )
}

// -------------------------------------------------------------------------------------------------

/// A 2D canvas like drawing surface, as provided by the host's view layer.
///
/// Coordinates are pixels with the origin at the top left. Paths are only drawn when stroked.
pub trait DrawSurface {
    fn width(&self) -> f32;
    fn height(&self) -> f32;

    fn set_fill_color(&mut self, color: Rgb);
    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32);
    /// Reset the given area to fully transparent.
    fn clear_rect(&mut self, x: f32, y: f32, width: f32, height: f32);

    fn set_stroke_color(&mut self, color: Rgb);
    fn set_line_width(&mut self, width: f32);
    fn begin_path(&mut self);
    fn move_to(&mut self, x: f32, y: f32);
    fn line_to(&mut self, x: f32, y: f32);
    /// Draw the current path with the current stroke color and line width.
    fn stroke(&mut self);
}

// -------------------------------------------------------------------------------------------------

/// A transient, colored vertical line on the overlay surface, marking a grain trigger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualTriggerMark {
    pub x: f32,
    pub color: Rgb,
    /// Session time the mark got drawn at.
    pub created_at: Duration,
}

// -------------------------------------------------------------------------------------------------

/// Draws buffer waveforms and grain trigger marks.
///
/// Rendering is purely visual: it never affects audio playback.
#[derive(Debug, Clone)]
pub struct VisualFeedbackRenderer {
    background: Rgb,
    waveform_color: Rgb,
    mark_width: f32,
}

impl VisualFeedbackRenderer {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            background: config.waveform_background,
            waveform_color: config.waveform_color,
            mark_width: config.trigger_mark_width,
        }
    }

    /// Prepare freshly created surfaces: an empty waveform background and a transparent overlay.
    pub fn setup<S: DrawSurface>(&self, waveform: &mut S, overlay: &mut S) {
        self.fill_background(waveform);
        overlay.clear_rect(0.0, 0.0, overlay.width(), overlay.height());
    }

    /// Clear the surface and draw the min/max overview of the buffer's first channel,
    /// one vertical line per pixel column.
    pub fn render_waveform<S: DrawSurface>(&self, surface: &mut S, buffer: &AudioSourceBuffer) {
        self.fill_background(surface);

        let columns = surface.width().max(0.0) as usize;
        let amp = surface.height() / 2.0;
        surface.set_stroke_color(self.waveform_color);
        surface.set_line_width(1.0);
        surface.begin_path();
        for point in waveform_columns(buffer, columns) {
            let x = point.column as f32;
            surface.move_to(x, (1.0 + point.min) * amp);
            surface.line_to(x, (1.0 + point.max) * amp);
        }
        surface.stroke();
    }

    /// Draw a full height trigger mark at the given x position.
    pub fn mark_trigger<S: DrawSurface>(&self, overlay: &mut S, mark: &VisualTriggerMark) {
        overlay.set_stroke_color(mark.color);
        overlay.set_line_width(self.mark_width);
        overlay.begin_path();
        overlay.move_to(mark.x, 0.0);
        overlay.line_to(mark.x, overlay.height());
        overlay.stroke();
    }

    /// Erase a previously drawn trigger mark.
    pub fn erase_mark<S: DrawSurface>(&self, overlay: &mut S, mark: &VisualTriggerMark) {
        let margin = self.mark_width;
        overlay.clear_rect(mark.x - margin, 0.0, margin * 2.0, overlay.height());
    }

    fn fill_background<S: DrawSurface>(&self, surface: &mut S) {
        surface.set_fill_color(self.background);
        surface.fill_rect(0.0, 0.0, surface.width(), surface.height());
    }
}

// -------------------------------------------------------------------------------------------------
