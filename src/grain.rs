//! Grain planning and playback: randomized, enveloped slices of an audio source buffer.

use rand::Rng;

use crate::{
    buffer::AudioSourceBuffer,
    config::{AmplitudePolicy, CanvasSize, SessionConfig},
    engine::{AudioEngine, NodeId},
    error::Error,
    synthesis::SynthesisParameters,
    utils::unique_usize_id,
};

// -------------------------------------------------------------------------------------------------

/// Unique id of a launched [`GrainVoice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GrainId(usize);

impl GrainId {
    fn new() -> Self {
        Self(unique_usize_id())
    }
}

// -------------------------------------------------------------------------------------------------

/// All properties of a grain, calculated before it's launched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrainPlan {
    /// Read position in the source buffer in seconds.
    pub offset: f64,
    /// Random offset which got applied to the trigger position's buffer offset.
    pub jitter: f64,
    /// Envelope attack time in seconds.
    pub attack: f64,
    /// Total grain length in seconds: attack + release.
    pub duration: f64,
    /// Envelope peak amplitude in range `0.0..=1.0`.
    pub peak: f32,
    /// Stereo position in range `-1.0..=1.0`.
    pub pan: f32,
    /// Source playback speed multiplier.
    pub playback_rate: f64,
    /// Canvas x position of the grain's trigger mark.
    pub mark_x: f32,
}

// -------------------------------------------------------------------------------------------------

/// Calculates and launches grains for trigger positions on the canvas.
#[derive(Debug, Clone)]
pub struct GrainScheduler {
    canvas: CanvasSize,
    amplitude_policy: AmplitudePolicy,
    fixed_amplitude: f32,
}

impl GrainScheduler {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            canvas: config.canvas,
            amplitude_policy: config.amplitude_policy,
            fixed_amplitude: config.fixed_amplitude,
        }
    }

    pub fn amplitude_policy(&self) -> AmplitudePolicy {
        self.amplitude_policy
    }

    /// Plan a grain for a trigger at canvas position `(x, y)` within a buffer of the given
    /// duration in seconds.
    ///
    /// The buffer offset is the trigger's relative x position in the buffer plus a random
    /// jitter within the spread range, clamped to the buffer bounds. The pan is drawn
    /// independently from the jitter.
    pub fn plan<R: Rng + ?Sized>(
        &self,
        parameters: &SynthesisParameters,
        buffer_duration: f64,
        x: f32,
        y: f32,
        rng: &mut R,
    ) -> GrainPlan {
        let width = self.canvas.width as f64;
        let base_offset = (x as f64 / width) * buffer_duration;

        let spread = parameters.spread() as f64;
        let jitter = if spread > 0.0 {
            rng.random_range(-spread..=spread)
        } else {
            0.0
        };
        let offset = (base_offset + jitter).max(0.0).min(buffer_duration);

        let pan_amount = parameters.pan();
        let pan = if pan_amount > 0.0 {
            rng.random_range(-pan_amount..=pan_amount)
        } else {
            0.0
        };

        let peak = match self.amplitude_policy {
            AmplitudePolicy::Fixed => self.fixed_amplitude,
            AmplitudePolicy::VerticalPosition => (1.0 - y / self.canvas.height).clamp(0.0, 1.0),
        };

        let mark_x = if buffer_duration > 0.0 {
            x + (jitter * width / buffer_duration) as f32
        } else {
            x
        };

        GrainPlan {
            offset,
            jitter,
            attack: parameters.attack() as f64,
            duration: parameters.grain_duration() as f64,
            peak,
            pan,
            playback_rate: parameters.transpose() as f64,
            mark_x,
        }
    }

    /// Create, connect and schedule the audio nodes of a planned grain, starting at the
    /// engine's current time and playing into `output`.
    ///
    /// On errors, all nodes created so far get released again.
    pub fn launch<E: AudioEngine + ?Sized>(
        &self,
        engine: &mut E,
        output: NodeId,
        buffer: &AudioSourceBuffer,
        plan: &GrainPlan,
    ) -> Result<GrainVoice, Error> {
        let mut nodes = Vec::with_capacity(3);
        match Self::create_nodes(engine, output, buffer, plan, &mut nodes) {
            Ok(started_at) => {
                // release order: panner, gain, source
                nodes.reverse();
                Ok(GrainVoice {
                    id: GrainId::new(),
                    nodes,
                    started_at,
                    plan: *plan,
                })
            }
            Err(err) => {
                for node in nodes.into_iter().rev() {
                    let _ = engine.disconnect(node);
                }
                Err(err)
            }
        }
    }

    fn create_nodes<E: AudioEngine + ?Sized>(
        engine: &mut E,
        output: NodeId,
        buffer: &AudioSourceBuffer,
        plan: &GrainPlan,
        nodes: &mut Vec<NodeId>,
    ) -> Result<f64, Error> {
        let source = engine.create_source_node(buffer, plan.playback_rate)?;
        nodes.push(source);
        let gain = engine.create_gain_node()?;
        nodes.push(gain);
        let panner = engine.create_panner_node()?;
        nodes.push(panner);

        engine.connect(source, gain)?;
        engine.connect(gain, panner)?;
        engine.connect(panner, output)?;
        engine.set_pan(panner, plan.pan)?;

        let now = engine.current_time();
        engine.set_gain_at(gain, 0.0, now)?;
        engine.schedule_gain_ramp(gain, plan.peak, now + plan.attack)?;
        engine.schedule_gain_ramp(gain, 0.0, now + plan.duration)?;
        engine.schedule_start(source, now, plan.offset, plan.duration)?;
        Ok(now)
    }
}

// -------------------------------------------------------------------------------------------------

/// A single launched grain and the engine nodes it owns.
///
/// Voices play on their own once launched. They must be released after their envelope ended
/// to free their engine nodes.
#[derive(Debug, Clone)]
pub struct GrainVoice {
    id: GrainId,
    /// Not yet released nodes, downstream first.
    nodes: Vec<NodeId>,
    started_at: f64,
    plan: GrainPlan,
}

impl GrainVoice {
    pub fn id(&self) -> GrainId {
        self.id
    }

    pub fn plan(&self) -> &GrainPlan {
        &self.plan
    }

    /// Engine time the grain started playing at.
    pub fn started_at(&self) -> f64 {
        self.started_at
    }

    /// Engine time the grain's envelope reached zero again.
    pub fn ends_at(&self) -> f64 {
        self.started_at + self.plan.duration
    }

    /// True when all of the grain's nodes got released.
    pub fn is_released(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Disconnect and release the grain's nodes. Tries to release all nodes, even when
    /// releasing some of them failed, and returns the first error.
    ///
    /// Nodes which failed to release are kept, so releasing can be retried later on. Nodes
    /// which are already gone in the engine count as released.
    pub fn release<E: AudioEngine + ?Sized>(&mut self, engine: &mut E) -> Result<(), Error> {
        let mut result = Ok(());
        self.nodes
            .retain(|node| match engine.disconnect(*node) {
                Ok(()) | Err(Error::NodeNotFoundError(_)) => false,
                Err(err) => {
                    if result.is_ok() {
                        result = Err(err);
                    }
                    true
                }
            });
        result
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::recording::{EngineCall, RecordingEngine};
    use rand::{rngs::SmallRng, SeedableRng};

    fn buffer(seconds: usize) -> Result<AudioSourceBuffer, Error> {
        AudioSourceBuffer::from_planar(vec![vec![0.0; seconds * 100]], 100)
    }

    fn assert_near(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-6, "{a} != {b}");
    }

    #[test]
    fn centered_trigger_without_spread() -> Result<(), Error> {
        let scheduler = GrainScheduler::new(&SessionConfig::default());
        let mut parameters = SynthesisParameters::default();
        parameters.set_spread(0.0)?;
        parameters.set_attack(0.4)?;
        parameters.set_release(0.4)?;

        let mut rng = SmallRng::seed_from_u64(0);
        let plan = scheduler.plan(&parameters, 4.0, 400.0, 200.0, &mut rng);
        assert_eq!(plan.offset, 2.0);
        assert_eq!(plan.jitter, 0.0);
        assert_eq!(plan.mark_x, 400.0);
        assert_near(plan.duration, 0.8);
        assert_eq!(plan.peak, 1.0);

        let mut engine = RecordingEngine::new();
        engine.time = 10.0;
        let destination = engine.destination();
        let mut voice = scheduler.launch(&mut engine, destination, &buffer(4)?, &plan)?;
        assert_eq!(engine.start_calls(), vec![(10.0, 2.0, plan.duration)]);
        let envelope = engine
            .calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::SetGain { value, when, .. } => Some(("set", *value, *when)),
                EngineCall::RampGain { value, when, .. } => Some(("ramp", *value, *when)),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(envelope.len(), 3);
        assert_eq!(envelope[0], ("set", 0.0, 10.0));
        assert_eq!((envelope[1].0, envelope[1].1), ("ramp", 1.0));
        assert_near(envelope[1].2, 10.4);
        assert_eq!((envelope[2].0, envelope[2].1), ("ramp", 0.0));
        assert_near(envelope[2].2, 10.8);
        assert_near(voice.ends_at(), 10.8);

        assert_eq!(engine.live_nodes.len(), 3);
        assert!(!voice.is_released());
        voice.release(&mut engine)?;
        assert!(voice.is_released());
        assert!(engine.live_nodes.is_empty());
        let disconnects = engine
            .calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::Disconnect { id } => Some(*id),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(disconnects, vec![NodeId(3), NodeId(2), NodeId(1)]);
        Ok(())
    }

    #[test]
    fn offsets_stay_in_bounds() -> Result<(), Error> {
        let scheduler = GrainScheduler::new(&SessionConfig::default());
        let mut parameters = SynthesisParameters::default();
        parameters.set_spread(1.0)?;
        parameters.set_pan(1.0)?;

        let mut rng = SmallRng::seed_from_u64(42);
        let mut saw_jitter = false;
        for x in [0.0, 1.0, 400.0, 799.0, 800.0] {
            for _ in 0..200 {
                let plan = scheduler.plan(&parameters, 2.0, x, 0.0, &mut rng);
                assert!((0.0..=2.0).contains(&plan.offset));
                assert!((-1.0..=1.0).contains(&plan.jitter));
                assert!((-1.0..=1.0).contains(&plan.pan));
                saw_jitter |= plan.jitter != 0.0;
            }
        }
        assert!(saw_jitter);
        Ok(())
    }

    #[test]
    fn amplitude_policies() {
        let parameters = SynthesisParameters::default();
        let mut rng = SmallRng::seed_from_u64(1);

        let fixed = GrainScheduler::new(&SessionConfig::default());
        assert_eq!(fixed.plan(&parameters, 1.0, 10.0, 300.0, &mut rng).peak, 1.0);

        let vertical = GrainScheduler::new(
            &SessionConfig::default().amplitude_policy(AmplitudePolicy::VerticalPosition),
        );
        assert_eq!(vertical.amplitude_policy(), AmplitudePolicy::VerticalPosition);
        assert_eq!(vertical.plan(&parameters, 1.0, 10.0, 0.0, &mut rng).peak, 1.0);
        assert_eq!(vertical.plan(&parameters, 1.0, 10.0, 300.0, &mut rng).peak, 0.25);
        assert_eq!(vertical.plan(&parameters, 1.0, 10.0, 400.0, &mut rng).peak, 0.0);
        assert_eq!(vertical.plan(&parameters, 1.0, 10.0, 900.0, &mut rng).peak, 0.0);
    }

    #[test]
    fn failed_launch_releases_nodes() -> Result<(), Error> {
        let scheduler = GrainScheduler::new(&SessionConfig::default());
        let plan = scheduler.plan(
            &SynthesisParameters::default(),
            4.0,
            100.0,
            0.0,
            &mut SmallRng::seed_from_u64(3),
        );
        let mut engine = RecordingEngine::new();
        // connecting into an unknown node fails after all nodes got created
        let result = scheduler.launch(&mut engine, NodeId(999), &buffer(4)?, &plan);
        assert!(matches!(result, Err(Error::NodeNotFoundError(999))));
        assert!(engine.live_nodes.is_empty());
        Ok(())
    }

    #[test]
    fn node_creation_failure_mid_launch() -> Result<(), Error> {
        let scheduler = GrainScheduler::new(&SessionConfig::default());
        let plan = scheduler.plan(
            &SynthesisParameters::default(),
            4.0,
            100.0,
            0.0,
            &mut SmallRng::seed_from_u64(4),
        );
        let mut engine = RecordingEngine::new();
        // source and gain get created, the panner fails
        engine.node_limit = Some(2);
        let destination = engine.destination();
        let result = scheduler.launch(&mut engine, destination, &buffer(4)?, &plan);
        assert!(matches!(result, Err(Error::AudioEngineError(_))));
        assert!(engine.live_nodes.is_empty());
        assert!(engine.start_calls().is_empty());
        assert_eq!(
            engine.calls.last(),
            Some(&EngineCall::Disconnect { id: NodeId(1) })
        );

        engine.node_limit = None;
        assert!(scheduler
            .launch(&mut engine, destination, &buffer(4)?, &plan)
            .is_ok());
        Ok(())
    }
}
