//! **grainpad** is a touch driven granular synthesis engine.
//!
//! Held pointer or touch contacts on a waveform canvas repeatedly trigger short, enveloped,
//! randomized slices ("grains") of a decoded audio buffer. Each contact runs its own trigger
//! stream at a rate set by the density parameter, while attack, release, spread, pan and
//! transpose shape the grains.
//!
//! A [`Session`] runs in the host's main context and schedules grains on an [`AudioEngine`].
//! The crate ships a software engine ([`RenderEngine`] and [`GrainRenderer`]) which plays via
//! an [`OutputDevice`]: a WAV file writer or, with the `cpal-output` feature, the system's
//! default audio device. Waveform and trigger visuals are drawn on [`DrawSurface`]s.

// private mods (will be partly re-exported)
mod buffer;
mod config;
mod engine;
mod error;
mod grain;
mod output;
mod parameter;
mod session;
mod synthesis;
mod timer;
mod touch;
mod utils;
mod visual;

// public, flat re-exports
pub use buffer::{AudioDecoder, AudioSourceBuffer};
pub use config::{AmplitudePolicy, CanvasSize, ClientRect, SessionConfig};
pub use engine::{
    render::{GrainRenderer, RenderEngine},
    AudioEngine, NodeId,
};
pub use error::Error;
pub use grain::{GrainId, GrainPlan, GrainScheduler, GrainVoice};
pub use parameter::{FloatParameter, ParameterValueUpdate};
pub use session::Session;
pub use synthesis::SynthesisParameters;
pub use timer::{TaskId, TimerQueue};
pub use touch::{ContactId, PointerEvent, PointerEventKind, TouchContact, TouchVoiceTracker};
pub use visual::{
    raster::PixelRaster, trigger_color, DrawSurface, Rgb, VisualFeedbackRenderer,
    VisualTriggerMark,
};

pub use output::OutputDevice;
#[cfg(feature = "cpal-output")]
pub use output::cpal::CpalOutput;
#[cfg(feature = "wav-output")]
pub use output::wav::WavOutput;

// public mods
pub mod waveform;

// -------------------------------------------------------------------------------------------------

#[cfg(all(test, debug_assertions, feature = "assert-allocs"))]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;
