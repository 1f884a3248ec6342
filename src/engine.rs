//! Abstract, Web Audio like real-time scheduling API, which grains are played back with.

pub mod render;

mod automation;
#[cfg(test)]
pub(crate) mod recording;

use crate::{buffer::AudioSourceBuffer, error::Error};

// -------------------------------------------------------------------------------------------------

/// Identifies a node in an [`AudioEngine`] graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

// -------------------------------------------------------------------------------------------------

/// An audio engine which plays back node graphs on its own real-time thread.
///
/// All functions only *schedule* work: they must not block until audio got rendered. Times are
/// given in seconds in the engine's own time frame, see [`Self::current_time`].
///
/// Node graphs are built from sources, gains and panners which finally connect to the engine's
/// [`Self::destination`]. Disconnecting a node releases it: it must not be used afterwards.
pub trait AudioEngine {
    /// The engine's current playback time in seconds.
    fn current_time(&self) -> f64;

    /// The node which all audible graphs finally need to connect to.
    fn destination(&self) -> NodeId;

    /// Create a new buffer playback source with the given playback rate multiplier.
    fn create_source_node(
        &mut self,
        buffer: &AudioSourceBuffer,
        playback_rate: f64,
    ) -> Result<NodeId, Error>;

    /// Create a new gain node with an initial gain of 1.
    fn create_gain_node(&mut self) -> Result<NodeId, Error>;

    /// Create a new stereo panner node, initially panned to the center.
    fn create_panner_node(&mut self) -> Result<NodeId, Error>;

    /// Route the output of `from` into `to`.
    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), Error>;

    /// Start a source node at engine time `when`, playing `duration` seconds from `offset`
    /// seconds into its buffer.
    fn schedule_start(
        &mut self,
        source: NodeId,
        when: f64,
        offset: f64,
        duration: f64,
    ) -> Result<(), Error>;

    /// Jump a gain node's value to `value` at engine time `when`.
    fn set_gain_at(&mut self, gain: NodeId, value: f32, when: f64) -> Result<(), Error>;

    /// Ramp a gain node's value linearly from its previous scheduled value to `value`,
    /// reaching it at engine time `when`.
    fn schedule_gain_ramp(&mut self, gain: NodeId, value: f32, when: f64) -> Result<(), Error>;

    /// Set a panner node's position in range `-1.0..=1.0`.
    fn set_pan(&mut self, panner: NodeId, pan: f32) -> Result<(), Error>;

    /// Disconnect all outputs of the given node and release it.
    fn disconnect(&mut self, node: NodeId) -> Result<(), Error>;
}
