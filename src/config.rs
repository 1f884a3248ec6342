//! Session configuration.

use std::time::Duration;

use crate::{error::Error, visual::Rgb};

// -------------------------------------------------------------------------------------------------

/// How the peak amplitude of a grain is determined.
#[derive(
    Default,
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    strum::EnumString,
    strum::Display,
    strum::VariantNames,
)]
#[repr(u8)]
pub enum AmplitudePolicy {
    /// All grains peak at the configured fixed amplitude.
    #[default]
    Fixed,
    /// Grains peak at `1 - y / canvas_height`: louder towards the top of the canvas.
    VerticalPosition,
}

// -------------------------------------------------------------------------------------------------

/// Size of the drawing canvas in pixels. Trigger positions are given in this pixel space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    pub width: f32,
    pub height: f32,
}

impl Default for CanvasSize {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 400.0,
        }
    }
}

impl CanvasSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Map a position in client (e.g. CSS layout) coordinates into canvas pixels.
    ///
    /// `client_rect` is the canvas element's bounding box in client space. The resulting
    /// position gets clamped to the canvas bounds.
    pub fn map_client_position(
        &self,
        client_rect: ClientRect,
        client_x: f32,
        client_y: f32,
    ) -> (f32, f32) {
        let scale_x = if client_rect.width > 0.0 {
            self.width / client_rect.width
        } else {
            1.0
        };
        let scale_y = if client_rect.height > 0.0 {
            self.height / client_rect.height
        } else {
            1.0
        };
        let x = (client_x - client_rect.left) * scale_x;
        let y = (client_y - client_rect.top) * scale_y;
        (x.clamp(0.0, self.width), y.clamp(0.0, self.height))
    }
}

/// Bounding box of the canvas in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

// -------------------------------------------------------------------------------------------------

/// Options for a [`Session`](crate::Session).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Canvas size of the waveform and trigger overlay surfaces.
    pub canvas: CanvasSize,
    /// How grain peak amplitudes are calculated.
    pub amplitude_policy: AmplitudePolicy,
    /// Peak amplitude of grains with [`AmplitudePolicy::Fixed`].
    pub fixed_amplitude: f32,
    /// Extra time after a grain's envelope ended before its audio nodes get released.
    pub grain_release_margin: Duration,
    /// How long trigger marks stay visible on the overlay.
    pub trigger_mark_duration: Duration,
    /// Line width of trigger marks in pixels.
    pub trigger_mark_width: f32,
    /// Volume of the session's master gain.
    pub master_volume: f32,
    /// Waveform background fill color.
    pub waveform_background: Rgb,
    /// Waveform stroke color.
    pub waveform_color: Rgb,
    /// Optional seed for the grain and color randomization. When `None`, the generator
    /// gets seeded from the OS.
    pub random_seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            canvas: CanvasSize::default(),
            amplitude_policy: AmplitudePolicy::default(),
            fixed_amplitude: 1.0,
            grain_release_margin: Duration::from_millis(100),
            trigger_mark_duration: Duration::from_millis(200),
            trigger_mark_width: 2.0,
            master_volume: 1.0,
            waveform_background: Rgb::new(0x2C, 0x3E, 0x50),
            waveform_color: Rgb::new(0xF2, 0xE6, 0xD8),
            random_seed: None,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a copy of the config with the given canvas size.
    pub fn canvas(&self, width: f32, height: f32) -> Self {
        Self {
            canvas: CanvasSize::new(width, height),
            ..self.clone()
        }
    }

    /// Return a copy of the config with the given amplitude policy.
    pub fn amplitude_policy(&self, amplitude_policy: AmplitudePolicy) -> Self {
        Self {
            amplitude_policy,
            ..self.clone()
        }
    }

    /// Return a copy of the config with the given master volume.
    pub fn master_volume(&self, master_volume: f32) -> Self {
        Self {
            master_volume,
            ..self.clone()
        }
    }

    /// Return a copy of the config with the given random seed.
    pub fn random_seed(&self, seed: u64) -> Self {
        Self {
            random_seed: Some(seed),
            ..self.clone()
        }
    }

    /// Validate all options.
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.canvas.width >= 1.0 && self.canvas.height >= 1.0) {
            return Err(Error::ParameterError(
                "Canvas size must be at least 1x1 pixels".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.fixed_amplitude) {
            return Err(Error::ParameterError(
                "Fixed amplitude must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !(self.master_volume >= 0.0 && self.master_volume.is_finite()) {
            return Err(Error::ParameterError(
                "Master volume must be a finite value >= 0.0".to_string(),
            ));
        }
        if !(self.trigger_mark_width > 0.0) {
            return Err(Error::ParameterError(
                "Trigger mark width must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn defaults() -> Result<(), Error> {
        let config = SessionConfig::default();
        config.validate()?;
        assert_eq!(config.amplitude_policy, AmplitudePolicy::Fixed);
        assert_eq!(config.canvas, CanvasSize::new(800.0, 400.0));
        assert_eq!(config.grain_release_margin, Duration::from_millis(100));
        assert_eq!(config.trigger_mark_duration, Duration::from_millis(200));
        Ok(())
    }

    #[test]
    fn builder() {
        let config = SessionConfig::new()
            .canvas(100.0, 50.0)
            .amplitude_policy(AmplitudePolicy::VerticalPosition)
            .random_seed(42);
        assert_eq!(config.canvas.width, 100.0);
        assert_eq!(config.amplitude_policy, AmplitudePolicy::VerticalPosition);
        assert_eq!(config.random_seed, Some(42));

        assert!(SessionConfig::new().canvas(0.0, 10.0).validate().is_err());
        assert!(SessionConfig::new().master_volume(-1.0).validate().is_err());
    }

    #[test]
    fn policy_names() {
        assert_eq!(
            AmplitudePolicy::from_str("VerticalPosition").ok(),
            Some(AmplitudePolicy::VerticalPosition)
        );
        assert_eq!(AmplitudePolicy::Fixed.to_string(), "Fixed");
    }

    #[test]
    fn client_mapping() {
        let canvas = CanvasSize::new(800.0, 400.0);
        let rect = ClientRect {
            left: 10.0,
            top: 20.0,
            width: 400.0,
            height: 200.0,
        };
        assert_eq!(canvas.map_client_position(rect, 210.0, 120.0), (400.0, 200.0));
        assert_eq!(canvas.map_client_position(rect, 0.0, 1000.0), (0.0, 400.0));
    }
}
