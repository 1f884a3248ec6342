//! Test double of an [`AudioEngine`], which records all scheduled calls.

use std::collections::HashSet;

use super::{AudioEngine, NodeId};
use crate::{buffer::AudioSourceBuffer, error::Error};

// -------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum EngineCall {
    CreateSource { id: NodeId, playback_rate: f64 },
    CreateGain { id: NodeId },
    CreatePanner { id: NodeId },
    Connect { from: NodeId, to: NodeId },
    Start { id: NodeId, when: f64, offset: f64, duration: f64 },
    SetGain { id: NodeId, value: f32, when: f64 },
    RampGain { id: NodeId, value: f32, when: f64 },
    SetPan { id: NodeId, pan: f32 },
    Disconnect { id: NodeId },
}

// -------------------------------------------------------------------------------------------------

#[derive(Debug, Default)]
pub(crate) struct RecordingEngine {
    pub time: f64,
    pub calls: Vec<EngineCall>,
    pub live_nodes: HashSet<NodeId>,
    /// When set, creating new nodes fails once this many nodes are alive.
    pub node_limit: Option<usize>,
    /// Number of upcoming disconnects which fail as if the command queue was full.
    pub failing_disconnects: usize,
    next_id: usize,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Default::default()
        }
    }

    pub fn start_calls(&self) -> Vec<(f64, f64, f64)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::Start {
                    when,
                    offset,
                    duration,
                    ..
                } => Some((*when, *offset, *duration)),
                _ => None,
            })
            .collect()
    }

    fn create(&mut self) -> Result<NodeId, Error> {
        if self
            .node_limit
            .is_some_and(|limit| self.live_nodes.len() >= limit)
        {
            return Err(Error::AudioEngineError("node creation failed".to_string()));
        }
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.live_nodes.insert(id);
        Ok(id)
    }

    fn check(&self, id: NodeId) -> Result<(), Error> {
        if id == self.destination() || self.live_nodes.contains(&id) {
            Ok(())
        } else {
            Err(Error::NodeNotFoundError(id.0))
        }
    }
}

impl AudioEngine for RecordingEngine {
    fn current_time(&self) -> f64 {
        self.time
    }

    fn destination(&self) -> NodeId {
        NodeId(0)
    }

    fn create_source_node(
        &mut self,
        _buffer: &AudioSourceBuffer,
        playback_rate: f64,
    ) -> Result<NodeId, Error> {
        let id = self.create()?;
        self.calls.push(EngineCall::CreateSource { id, playback_rate });
        Ok(id)
    }

    fn create_gain_node(&mut self) -> Result<NodeId, Error> {
        let id = self.create()?;
        self.calls.push(EngineCall::CreateGain { id });
        Ok(id)
    }

    fn create_panner_node(&mut self) -> Result<NodeId, Error> {
        let id = self.create()?;
        self.calls.push(EngineCall::CreatePanner { id });
        Ok(id)
    }

    fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), Error> {
        self.check(from)?;
        self.check(to)?;
        self.calls.push(EngineCall::Connect { from, to });
        Ok(())
    }

    fn schedule_start(
        &mut self,
        source: NodeId,
        when: f64,
        offset: f64,
        duration: f64,
    ) -> Result<(), Error> {
        self.check(source)?;
        self.calls.push(EngineCall::Start {
            id: source,
            when,
            offset,
            duration,
        });
        Ok(())
    }

    fn set_gain_at(&mut self, gain: NodeId, value: f32, when: f64) -> Result<(), Error> {
        self.check(gain)?;
        self.calls.push(EngineCall::SetGain {
            id: gain,
            value,
            when,
        });
        Ok(())
    }

    fn schedule_gain_ramp(&mut self, gain: NodeId, value: f32, when: f64) -> Result<(), Error> {
        self.check(gain)?;
        self.calls.push(EngineCall::RampGain {
            id: gain,
            value,
            when,
        });
        Ok(())
    }

    fn set_pan(&mut self, panner: NodeId, pan: f32) -> Result<(), Error> {
        self.check(panner)?;
        self.calls.push(EngineCall::SetPan { id: panner, pan });
        Ok(())
    }

    fn disconnect(&mut self, node: NodeId) -> Result<(), Error> {
        self.check(node)?;
        if self.failing_disconnects > 0 {
            self.failing_disconnects -= 1;
            return Err(Error::SendError("command queue is full".to_string()));
        }
        self.live_nodes.remove(&node);
        self.calls.push(EngineCall::Disconnect { id: node });
        Ok(())
    }
}
