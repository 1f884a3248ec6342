//! Software [`AudioEngine`] implementation, rendering grain node graphs into sample buffers.

use std::{
    collections::HashMap,
    f32::consts::FRAC_PI_2,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
};

use basedrop::{Collector, Handle, Owned};
use crossbeam_channel::{bounded, Receiver, Sender};

use super::{automation::GainAutomation, AudioEngine, NodeId};
use crate::{buffer::AudioSourceBuffer, error::Error, utils::buffer::clear_buffer};

// -------------------------------------------------------------------------------------------------

/// Max number of pending, not yet processed render commands.
const COMMAND_QUEUE_SIZE: usize = 8192;

/// Max number of nodes which can be alive at the same time.
const MAX_NODES: usize = 2048;

/// Max number of outputs a single node can be connected to.
const MAX_NODE_OUTPUTS: usize = 16;

/// Max connection depth of node graphs. Deeper (or cyclic) routings get cut off.
const MAX_ROUTING_DEPTH: usize = 32;

const DESTINATION: NodeId = NodeId(0);

// -------------------------------------------------------------------------------------------------

enum RenderCommand {
    CreateNode {
        id: NodeId,
        node: Owned<RenderNode>,
    },
    Connect {
        from: NodeId,
        to: NodeId,
    },
    Start {
        id: NodeId,
        when: f64,
        offset: f64,
        duration: f64,
    },
    SetGain {
        id: NodeId,
        value: f32,
        when: f64,
    },
    RampGain {
        id: NodeId,
        value: f32,
        when: f64,
    },
    SetPan {
        id: NodeId,
        pan: f32,
    },
    Disconnect {
        id: NodeId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum NodeType {
    Source,
    Gain,
    Panner,
}

#[derive(Debug, Clone, Copy)]
struct NodeInfo {
    node_type: NodeType,
    output_count: usize,
}

// -------------------------------------------------------------------------------------------------

/// Main context side of the software audio engine.
///
/// Validates and forwards all scheduling calls as commands to its [`GrainRenderer`], which
/// renders them on the audio thread. The engine's clock is the renderer's playback position.
///
/// Nodes are allocated here and handed over to the renderer as [`Owned`] values. Nodes which
/// the renderer drops are collected and freed here, so the renderer never (de)allocates.
pub struct RenderEngine {
    command_send: Sender<RenderCommand>,
    playback_pos: Arc<AtomicU64>,
    live_nodes: Arc<AtomicUsize>,
    nodes: HashMap<NodeId, NodeInfo>,
    next_node_id: usize,
    sample_rate: u32,
    collector: Collector,
    collector_handle: Handle,
}

impl RenderEngine {
    /// Create a new engine which renders at the given output sample rate.
    ///
    /// Returns the engine and its renderer, which should be moved into an
    /// [`OutputDevice`](crate::output::OutputDevice) or processed manually.
    pub fn new(sample_rate: u32) -> Result<(Self, GrainRenderer), Error> {
        if sample_rate == 0 {
            return Err(Error::AudioEngineError(
                "Output sample rate must be > 0".to_string(),
            ));
        }
        let (command_send, command_recv) = bounded(COMMAND_QUEUE_SIZE);
        let playback_pos = Arc::new(AtomicU64::new(0));
        let live_nodes = Arc::new(AtomicUsize::new(0));
        let collector = Collector::new();
        let collector_handle = collector.handle();
        let engine = Self {
            command_send,
            playback_pos: Arc::clone(&playback_pos),
            live_nodes: Arc::clone(&live_nodes),
            nodes: HashMap::new(),
            next_node_id: DESTINATION.0 + 1,
            sample_rate,
            collector,
            collector_handle,
        };
        // the node map keeps enough spare capacity to rehash in place
        let renderer = GrainRenderer {
            command_recv,
            playback_pos,
            live_nodes,
            nodes: HashMap::with_capacity(MAX_NODES * 2),
            source_ids: Vec::with_capacity(MAX_NODES),
            dropped_ids: Vec::with_capacity(MAX_NODES + 1),
            sample_rate,
        };
        Ok((engine, renderer))
    }

    /// Output sample rate of the renderer.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of nodes which currently are alive in the renderer.
    pub fn live_node_count(&self) -> usize {
        self.live_nodes.load(Ordering::Relaxed)
    }

    /// Free nodes and buffers which got dropped by the renderer.
    pub fn collect_garbage(&mut self) {
        self.collector.collect();
    }

    fn new_node(&mut self, kind: NodeKind) -> Result<NodeId, Error> {
        if self.nodes.len() >= MAX_NODES {
            return Err(Error::AudioEngineError(format!(
                "Too many live nodes: max {MAX_NODES} nodes can be alive at once"
            )));
        }
        let id = NodeId(self.next_node_id);
        let node_type = kind.node_type();
        let node = Owned::new(
            &self.collector_handle,
            RenderNode {
                kind,
                outputs: Vec::with_capacity(MAX_NODE_OUTPUTS),
                connected: false,
            },
        );
        self.send(RenderCommand::CreateNode { id, node })?;
        self.next_node_id += 1;
        self.nodes.insert(
            id,
            NodeInfo {
                node_type,
                output_count: 0,
            },
        );
        Ok(id)
    }

    fn node_type(&self, id: NodeId) -> Result<NodeType, Error> {
        self.nodes
            .get(&id)
            .map(|info| info.node_type)
            .ok_or(Error::NodeNotFoundError(id.0))
    }

    fn expect_node_type(&self, id: NodeId, expected: NodeType) -> Result<(), Error> {
        let node_type = self.node_type(id)?;
        if node_type != expected {
            return Err(Error::AudioEngineError(format!(
                "Node {} is a {:?} node, but should be a {:?} node",
                id.0, node_type, expected
            )));
        }
        Ok(())
    }

    fn send(&mut self, command: RenderCommand) -> Result<(), Error> {
        self.collector.collect();
        self.command_send.try_send(command)?;
        Ok(())
    }
}

impl AudioEngine for RenderEngine {
    fn current_time(&self) -> f64 {
        self.playback_pos.load(Ordering::Relaxed) as f64 / self.sample_rate as f64
    }

    fn destination(&self) -> NodeId {
        DESTINATION
    }

    fn create_source_node(
        &mut self,
        buffer: &AudioSourceBuffer,
        playback_rate: f64,
    ) -> Result<NodeId, Error> {
        if !(playback_rate > 0.0 && playback_rate.is_finite()) {
            return Err(Error::AudioEngineError(format!(
                "Invalid playback rate: {playback_rate}"
            )));
        }
        self.new_node(NodeKind::Source(SourceNode {
            buffer: buffer.clone(),
            playback_rate,
            start: None,
        }))
    }

    fn create_gain_node(&mut self) -> Result<NodeId, Error> {
        self.new_node(NodeKind::Gain(GainAutomation::new(1.0)))
    }

    fn create_panner_node(&mut self) -> Result<NodeId, Error> {
        self.new_node(NodeKind::Panner(0.0))
    }

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), Error> {
        let from_info = self
            .nodes
            .get(&from)
            .copied()
            .ok_or(Error::NodeNotFoundError(from.0))?;
        if to != DESTINATION && self.node_type(to)? == NodeType::Source {
            return Err(Error::AudioEngineError(format!(
                "Can't connect node {} into source node {}",
                from.0, to.0
            )));
        }
        if from_info.output_count >= MAX_NODE_OUTPUTS {
            return Err(Error::AudioEngineError(format!(
                "Node {} can't be connected to more than {MAX_NODE_OUTPUTS} nodes",
                from.0
            )));
        }
        self.send(RenderCommand::Connect { from, to })?;
        if let Some(info) = self.nodes.get_mut(&from) {
            info.output_count += 1;
        }
        Ok(())
    }

    fn schedule_start(
        &mut self,
        source: NodeId,
        when: f64,
        offset: f64,
        duration: f64,
    ) -> Result<(), Error> {
        self.expect_node_type(source, NodeType::Source)?;
        self.send(RenderCommand::Start {
            id: source,
            when,
            offset: offset.max(0.0),
            duration: duration.max(0.0),
        })
    }

    fn set_gain_at(&mut self, gain: NodeId, value: f32, when: f64) -> Result<(), Error> {
        self.expect_node_type(gain, NodeType::Gain)?;
        self.send(RenderCommand::SetGain {
            id: gain,
            value,
            when,
        })
    }

    fn schedule_gain_ramp(&mut self, gain: NodeId, value: f32, when: f64) -> Result<(), Error> {
        self.expect_node_type(gain, NodeType::Gain)?;
        self.send(RenderCommand::RampGain {
            id: gain,
            value,
            when,
        })
    }

    fn set_pan(&mut self, panner: NodeId, pan: f32) -> Result<(), Error> {
        self.expect_node_type(panner, NodeType::Panner)?;
        self.send(RenderCommand::SetPan {
            id: panner,
            pan: pan.clamp(-1.0, 1.0),
        })
    }

    fn disconnect(&mut self, node: NodeId) -> Result<(), Error> {
        self.node_type(node)?;
        // forget the node only when the renderer will drop it too
        self.send(RenderCommand::Disconnect { id: node })?;
        self.nodes.remove(&node);
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

/// A stereo signal frame, flowing through the node graph.
#[derive(Debug, Clone, Copy)]
struct Frame {
    left: f32,
    right: f32,
    mono: bool,
}

impl Frame {
    fn scaled(self, gain: f32) -> Self {
        Self {
            left: self.left * gain,
            right: self.right * gain,
            mono: self.mono,
        }
    }

    /// Equal power stereo panning, as done by Web Audio's StereoPannerNode.
    fn panned(self, pan: f32) -> Self {
        if self.mono {
            let x = (pan + 1.0) * 0.5;
            Self {
                left: self.left * (x * FRAC_PI_2).cos(),
                right: self.left * (x * FRAC_PI_2).sin(),
                mono: false,
            }
        } else if pan <= 0.0 {
            let x = pan + 1.0;
            Self {
                left: self.left + self.right * (x * FRAC_PI_2).cos(),
                right: self.right * (x * FRAC_PI_2).sin(),
                mono: false,
            }
        } else {
            let x = pan;
            Self {
                left: self.left * (x * FRAC_PI_2).cos(),
                right: self.right + self.left * (x * FRAC_PI_2).sin(),
                mono: false,
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct SourceStart {
    when: f64,
    offset: f64,
    duration: f64,
}

struct SourceNode {
    buffer: AudioSourceBuffer,
    playback_rate: f64,
    start: Option<SourceStart>,
}

impl SourceNode {
    /// Source output at the given engine time. None when not playing at this time.
    fn frame_at(&self, time: f64) -> Option<Frame> {
        let start = self.start?;
        let elapsed = time - start.when;
        if elapsed < 0.0 || elapsed >= start.duration {
            return None;
        }
        let position =
            (start.offset + elapsed * self.playback_rate) * self.buffer.sample_rate() as f64;
        let left = Self::sample_at(self.buffer.first_channel(), position);
        match self.buffer.channel(1) {
            Some(right) => Some(Frame {
                left,
                right: Self::sample_at(right, position),
                mono: false,
            }),
            None => Some(Frame {
                left,
                right: left,
                mono: true,
            }),
        }
    }

    /// Read a sample at a fractional frame position using cubic interpolation.
    /// Positions outside of the buffer are silent.
    fn sample_at(samples: &[f32], position: f64) -> f32 {
        let len = samples.len();
        if position < 0.0 || position >= len as f64 {
            return 0.0;
        }
        let max_index = len - 1;
        let i1 = (position as usize).min(max_index);
        let fraction = (position - i1 as f64) as f32;

        // Neighbours repeat the edge samples at the buffer bounds
        let i0 = i1.saturating_sub(1);
        let i2 = (i1 + 1).min(max_index);
        let i3 = (i1 + 2).min(max_index);
        let (y0, y1, y2, y3) = (samples[i0], samples[i1], samples[i2], samples[i3]);

        // Cubic interpolation (Catmull-Rom)
        let a = -0.5 * y0 + 1.5 * y1 - 1.5 * y2 + 0.5 * y3;
        let b = y0 - 2.5 * y1 + 2.0 * y2 - 0.5 * y3;
        let c = -0.5 * y0 + 0.5 * y2;
        let d = y1;

        a * fraction * fraction * fraction + b * fraction * fraction + c * fraction + d
    }
}

enum NodeKind {
    Source(SourceNode),
    Gain(GainAutomation),
    Panner(f32),
}

impl NodeKind {
    fn node_type(&self) -> NodeType {
        match self {
            Self::Source(_) => NodeType::Source,
            Self::Gain(_) => NodeType::Gain,
            Self::Panner(_) => NodeType::Panner,
        }
    }
}

struct RenderNode {
    kind: NodeKind,
    /// Preallocated with [`MAX_NODE_OUTPUTS`] capacity.
    outputs: Vec<NodeId>,
    /// True once the node got connected to something.
    connected: bool,
}

// -------------------------------------------------------------------------------------------------

/// Audio thread side of the software audio engine.
///
/// Applies commands from its [`RenderEngine`] and mixes all playing sources through their node
/// graphs into interleaved output buffers. Processing does not allocate or free memory.
pub struct GrainRenderer {
    command_recv: Receiver<RenderCommand>,
    playback_pos: Arc<AtomicU64>,
    live_nodes: Arc<AtomicUsize>,
    nodes: HashMap<NodeId, Owned<RenderNode>>,
    source_ids: Vec<NodeId>,
    dropped_ids: Vec<NodeId>,
    sample_rate: u32,
}

impl GrainRenderer {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Render the next block of audio into the given interleaved buffer.
    ///
    /// The first two output channels receive the stereo mix, mono outputs a mixed-down signal
    /// and all other channels stay silent. Returns the number of written frames.
    pub fn process(&mut self, output: &mut [f32], channel_count: usize) -> usize {
        debug_assert!(channel_count > 0, "Invalid channel count");
        self.process_commands();
        clear_buffer(output);

        self.source_ids.clear();
        self.source_ids.extend(
            self.nodes
                .iter()
                .filter(|(_, node)| matches!(node.kind, NodeKind::Source(_)))
                .map(|(id, _)| *id),
        );
        // keep mixing order stable across blocks
        self.source_ids.sort_unstable();

        let start_frame = self.playback_pos.load(Ordering::Relaxed);
        let mut frame_count = 0;
        for (frame_index, frame) in output.chunks_exact_mut(channel_count).enumerate() {
            let time = (start_frame + frame_index as u64) as f64 / self.sample_rate as f64;
            let mut mix = [0.0f32; 2];
            for source_id in &self.source_ids {
                if let Some(RenderNode {
                    kind: NodeKind::Source(source),
                    outputs,
                    ..
                }) = self.nodes.get(source_id).map(|node| &**node)
                {
                    if let Some(signal) = source.frame_at(time) {
                        for output_id in outputs {
                            Self::route(&self.nodes, *output_id, signal, time, &mut mix, 0);
                        }
                    }
                }
            }
            match channel_count {
                1 => frame[0] = (mix[0] + mix[1]) * 0.5,
                _ => {
                    frame[0] = mix[0];
                    frame[1] = mix[1];
                }
            }
            frame_count += 1;
        }

        self.playback_pos
            .fetch_add(frame_count as u64, Ordering::Relaxed);
        frame_count
    }

    fn route(
        nodes: &HashMap<NodeId, Owned<RenderNode>>,
        id: NodeId,
        signal: Frame,
        time: f64,
        mix: &mut [f32; 2],
        depth: usize,
    ) {
        if id == DESTINATION {
            mix[0] += signal.left;
            mix[1] += signal.right;
            return;
        }
        if depth >= MAX_ROUTING_DEPTH {
            return;
        }
        let Some(node) = nodes.get(&id) else {
            return;
        };
        let signal = match &node.kind {
            NodeKind::Gain(automation) => signal.scaled(automation.value_at(time)),
            NodeKind::Panner(pan) => signal.panned(*pan),
            // sources have no inputs
            NodeKind::Source(_) => return,
        };
        for output_id in &node.outputs {
            Self::route(nodes, *output_id, signal, time, mix, depth + 1);
        }
    }

    fn process_commands(&mut self) {
        let now = self.playback_pos.load(Ordering::Relaxed) as f64 / self.sample_rate as f64;
        let mut changed = false;
        while let Ok(command) = self.command_recv.try_recv() {
            changed = true;
            match command {
                RenderCommand::CreateNode { id, node } => {
                    self.nodes.insert(id, node);
                }
                RenderCommand::Connect { from, to } => {
                    if to == DESTINATION || self.nodes.contains_key(&to) {
                        if let Some(node) = self.node_mut(from) {
                            if !node.outputs.contains(&to)
                                && node.outputs.len() < node.outputs.capacity()
                            {
                                node.outputs.push(to);
                            }
                            node.connected = true;
                        }
                    }
                }
                RenderCommand::Start {
                    id,
                    when,
                    offset,
                    duration,
                } => {
                    if let Some(RenderNode {
                        kind: NodeKind::Source(source),
                        ..
                    }) = self.node_mut(id)
                    {
                        source.start = Some(SourceStart {
                            when,
                            offset,
                            duration,
                        });
                    }
                }
                RenderCommand::SetGain { id, value, when } => {
                    if let Some(RenderNode {
                        kind: NodeKind::Gain(automation),
                        ..
                    }) = self.node_mut(id)
                    {
                        automation.set_value_at(value, when, now);
                    }
                }
                RenderCommand::RampGain { id, value, when } => {
                    if let Some(RenderNode {
                        kind: NodeKind::Gain(automation),
                        ..
                    }) = self.node_mut(id)
                    {
                        automation.linear_ramp_to(value, when, now);
                    }
                }
                RenderCommand::SetPan { id, pan } => {
                    if let Some(RenderNode {
                        kind: NodeKind::Panner(value),
                        ..
                    }) = self.node_mut(id)
                    {
                        *value = pan;
                    }
                }
                RenderCommand::Disconnect { id } => self.drop_node(id),
            }
        }
        if changed {
            self.live_nodes.store(self.nodes.len(), Ordering::Relaxed);
        }
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut RenderNode> {
        self.nodes.get_mut(&id).map(|node| &mut **node)
    }

    /// Remove a node, then drop all upstream nodes which lost all of their outputs.
    /// Removed nodes get freed by the engine's collector.
    fn drop_node(&mut self, id: NodeId) {
        self.dropped_ids.clear();
        self.dropped_ids.push(id);
        while let Some(id) = self.dropped_ids.pop() {
            if self.nodes.remove(&id).is_none() {
                continue;
            }
            for (upstream_id, node) in self.nodes.iter_mut() {
                let output_count = node.outputs.len();
                node.outputs.retain(|output| *output != id);
                if node.connected && output_count > 0 && node.outputs.is_empty() {
                    self.dropped_ids.push(*upstream_id);
                }
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------
