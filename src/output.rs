//! Audio output devices, which drive a [`GrainRenderer`].

#[cfg(feature = "cpal-output")]
pub mod cpal;
#[cfg(feature = "wav-output")]
pub mod wav;

use crate::{engine::render::GrainRenderer, error::Error};

// -------------------------------------------------------------------------------------------------

/// An audio sink which pulls rendered audio from a [`GrainRenderer`].
pub trait OutputDevice {
    /// Actual device's output sample buffer channel count.
    fn channel_count(&self) -> usize;
    /// Actual device's output sample rate.
    fn sample_rate(&self) -> u32;

    /// True while a renderer is attached and the device did not get closed.
    fn is_running(&self) -> bool;

    /// Start rendering the given renderer. Replaces any previously played renderer.
    /// The renderer's sample rate must match the device's sample rate.
    fn play(&mut self, renderer: GrainRenderer) -> Result<(), Error>;

    /// Stop rendering and release the device.
    fn close(&mut self) -> Result<(), Error>;
}
