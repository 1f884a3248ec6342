//! A granular synthesis session: ties pointer input, grain scheduling, audio and visuals together.

use std::{collections::HashMap, time::Duration};

use four_cc::FourCC;
use rand::{rngs::SmallRng, SeedableRng};

use crate::{
    buffer::{AudioDecoder, AudioSourceBuffer},
    config::SessionConfig,
    engine::{AudioEngine, NodeId},
    error::Error,
    grain::{GrainId, GrainScheduler, GrainVoice},
    parameter::ParameterValueUpdate,
    synthesis::SynthesisParameters,
    timer::TimerQueue,
    touch::{ContactId, PointerEvent, PointerEventKind, TouchVoiceTracker},
    visual::{trigger_color, DrawSurface, VisualFeedbackRenderer, VisualTriggerMark},
};

// -------------------------------------------------------------------------------------------------

/// A running granular synthesizer session.
///
/// The session runs entirely in the host's main context: the host forwards pointer events and
/// periodically calls [`Self::advance`] with its current time, which runs all due contact
/// trigger ticks, grain releases and trigger mark erasures in due time order. Audio is only
/// scheduled on the engine, which renders on its own thread.
///
/// Engine failures never panic: a failed engine start is recorded as [`Self::last_error`] and
/// turns all grain triggers into silent no-ops.
pub struct Session<E: AudioEngine, S: DrawSurface> {
    config: SessionConfig,
    parameters: SynthesisParameters,
    engine: Option<E>,
    master: Option<NodeId>,
    buffer: Option<AudioSourceBuffer>,
    scheduler: GrainScheduler,
    tracker: TouchVoiceTracker,
    voices: HashMap<GrainId, GrainVoice>,
    releases: TimerQueue<GrainId>,
    visual: VisualFeedbackRenderer,
    waveform_surface: S,
    overlay_surface: S,
    marks: TimerQueue<VisualTriggerMark>,
    rng: SmallRng,
    last_error: Option<String>,
    now: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DueTask {
    ContactTick,
    GrainRelease,
    MarkErase,
}

impl<E: AudioEngine, S: DrawSurface> Session<E, S> {
    /// Start a new session.
    ///
    /// `engine` is the result of the host's engine initialization. When it failed, the session
    /// still starts, but records the error and stays silent. Fails only when the config is
    /// invalid or the surfaces don't match the configured canvas size.
    pub fn start(
        config: SessionConfig,
        engine: Result<E, Error>,
        waveform_surface: S,
        overlay_surface: S,
    ) -> Result<Self, Error> {
        config.validate()?;
        for (name, surface) in [("waveform", &waveform_surface), ("overlay", &overlay_surface)] {
            if surface.width() != config.canvas.width || surface.height() != config.canvas.height {
                return Err(Error::ParameterError(format!(
                    "The {name} surface's size {}x{} does not match the canvas size {}x{}",
                    surface.width(),
                    surface.height(),
                    config.canvas.width,
                    config.canvas.height
                )));
            }
        }

        let rng = match config.random_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };
        let mut session = Self {
            parameters: SynthesisParameters::default(),
            engine: None,
            master: None,
            buffer: None,
            scheduler: GrainScheduler::new(&config),
            tracker: TouchVoiceTracker::new(),
            voices: HashMap::new(),
            releases: TimerQueue::new(),
            visual: VisualFeedbackRenderer::new(&config),
            waveform_surface,
            overlay_surface,
            marks: TimerQueue::new(),
            rng,
            last_error: None,
            now: Duration::ZERO,
            config,
        };
        session
            .visual
            .setup(&mut session.waveform_surface, &mut session.overlay_surface);

        match engine.and_then(|mut engine| {
            let master = Self::create_master(&mut engine, session.config.master_volume)?;
            Ok((engine, master))
        }) {
            Ok((engine, master)) => {
                log::info!("session started");
                session.engine = Some(engine);
                session.master = Some(master);
            }
            Err(err) => {
                log::error!("failed to initialize audio engine: {err}");
                session.last_error = Some(err.to_string());
            }
        }
        Ok(session)
    }

    fn create_master(engine: &mut E, volume: f32) -> Result<NodeId, Error> {
        let master = engine.create_gain_node()?;
        engine.set_gain_at(master, volume, engine.current_time())?;
        engine.connect(master, engine.destination())?;
        Ok(master)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn parameters(&self) -> &SynthesisParameters {
        &self.parameters
    }

    /// Mutable access to the synthesis parameters. Changes apply to all grains triggered
    /// afterwards. Repeat intervals of already held contacts keep their density.
    pub fn parameters_mut(&mut self) -> &mut SynthesisParameters {
        &mut self.parameters
    }

    /// Update a single synthesis parameter by its descriptor id.
    pub fn set_parameter(&mut self, id: FourCC, update: ParameterValueUpdate) -> Result<(), Error> {
        self.parameters.set_parameter(id, update)
    }

    /// Set the volume of the session's master gain.
    pub fn set_master_volume(&mut self, volume: f32) -> Result<(), Error> {
        if !(volume >= 0.0 && volume.is_finite()) {
            return Err(Error::ParameterError(format!(
                "Invalid master volume: {volume}"
            )));
        }
        self.config.master_volume = volume;
        if let (Some(engine), Some(master)) = (self.engine.as_mut(), self.master) {
            engine.set_gain_at(master, volume, engine.current_time())?;
        }
        Ok(())
    }

    /// The audio engine, if it got initialized successfully.
    pub fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }

    pub fn is_engine_initialized(&self) -> bool {
        self.engine.is_some()
    }

    /// The currently installed source buffer, if any.
    pub fn buffer(&self) -> Option<&AudioSourceBuffer> {
        self.buffer.as_ref()
    }

    /// True while at least one contact is held down.
    pub fn is_playing(&self) -> bool {
        self.tracker.is_playing()
    }

    /// Number of launched grains whose nodes did not get released yet.
    pub fn live_grain_count(&self) -> usize {
        self.voices.len()
    }

    /// Number of held down contacts.
    pub fn active_contact_count(&self) -> usize {
        self.tracker.active_count()
    }

    /// User visible description of the last engine start or decoding failure.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    pub fn waveform_surface(&self) -> &S {
        &self.waveform_surface
    }

    pub fn overlay_surface(&self) -> &S {
        &self.overlay_surface
    }

    /// The latest time the session got advanced to.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Decode and install a new source buffer. When decoding fails, the error is recorded and
    /// returned, and the previous buffer stays installed.
    pub fn load_encoded<D: AudioDecoder + ?Sized>(
        &mut self,
        decoder: &D,
        encoded: &[u8],
    ) -> Result<(), Error> {
        match decoder.decode(encoded) {
            Ok(buffer) => {
                self.load_buffer(buffer);
                Ok(())
            }
            Err(err) => {
                log::error!("failed to decode audio: {err}");
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Replace the source buffer. Releases all contacts and grains which still use the old
    /// buffer, then redraws the waveform.
    pub fn load_buffer(&mut self, buffer: AudioSourceBuffer) {
        self.teardown();
        log::info!(
            "loaded buffer: {} channels, {}Hz, {:.2}s",
            buffer.channel_count(),
            buffer.sample_rate(),
            buffer.duration_seconds()
        );
        self.visual
            .render_waveform(&mut self.waveform_surface, &buffer);
        self.buffer = Some(buffer);
    }

    /// Handle a pointer event at the given host time.
    pub fn handle_pointer(&mut self, event: PointerEvent, now: Duration) {
        self.advance(now);
        match event.kind {
            PointerEventKind::Down => {
                let density = self.parameters.density();
                if self
                    .tracker
                    .on_contact_start(event.id, event.x, event.y, density, now)
                {
                    self.trigger(event.x, event.y, now);
                }
            }
            PointerEventKind::Move => self.tracker.on_contact_move(event.id, event.x, event.y),
            PointerEventKind::Up | PointerEventKind::Cancel | PointerEventKind::Leave => {
                self.tracker.on_contact_end(event.id);
            }
        }
    }

    /// End a single contact, as if it got released.
    pub fn end_contact(&mut self, id: ContactId) -> bool {
        self.tracker.on_contact_end(id)
    }

    /// Trigger a single grain at canvas position `(x, y)` at the given host time.
    ///
    /// Returns the new grain's id, or `None` when no grain could be played because there is no
    /// engine or buffer, or the engine failed to launch it.
    pub fn trigger(&mut self, x: f32, y: f32, now: Duration) -> Option<GrainId> {
        let (Some(engine), Some(master), Some(buffer)) =
            (self.engine.as_mut(), self.master, self.buffer.as_ref())
        else {
            return None;
        };
        let plan = self.scheduler.plan(
            &self.parameters,
            buffer.duration_seconds(),
            x,
            y,
            &mut self.rng,
        );
        let voice = match self.scheduler.launch(engine, master, buffer, &plan) {
            Ok(voice) => voice,
            Err(err) => {
                log::warn!("failed to launch grain: {err}");
                return None;
            }
        };
        let id = voice.id();
        log::debug!(
            "grain {:?}: offset {:.3}s, duration {:.3}s, pan {:.2}",
            id,
            plan.offset,
            plan.duration,
            plan.pan
        );
        let release_time = now
            + Duration::try_from_secs_f64(plan.duration).unwrap_or_default()
            + self.config.grain_release_margin;
        self.releases.schedule_once(release_time, id);
        self.voices.insert(id, voice);

        let mark = VisualTriggerMark {
            x: plan.mark_x,
            color: trigger_color(&mut self.rng),
            created_at: now,
        };
        self.visual.mark_trigger(&mut self.overlay_surface, &mark);
        self.marks
            .schedule_once(now + self.config.trigger_mark_duration, mark);
        Some(id)
    }

    /// Run all contact ticks, grain releases and mark erasures which are due at `now`.
    ///
    /// When called late, each held contact fires a single catch-up grain at `now` instead of
    /// all missed ticks, so grain releases are always relative to the actual launch time.
    pub fn advance(&mut self, now: Duration) {
        while let Some(task) = self.next_due_task(now) {
            match task {
                DueTask::ContactTick => {
                    if let Some((_, contact)) = self.tracker.poll_due(now) {
                        let (x, y) = (contact.x, contact.y);
                        self.trigger(x, y, now);
                    }
                }
                DueTask::GrainRelease => {
                    if let Some((_, _, id)) = self.releases.pop_due(now) {
                        self.release_voice(id, now);
                    }
                }
                DueTask::MarkErase => {
                    if let Some((_, _, mark)) = self.marks.pop_due(now) {
                        self.visual.erase_mark(&mut self.overlay_surface, &mark);
                    }
                }
            }
        }
        self.now = self.now.max(now);
    }

    /// Stop all contacts and force-release all playing grains.
    /// Pending trigger mark erasures still run.
    pub fn teardown(&mut self) {
        self.tracker.on_teardown();
        let pending = self.releases.drain().map(|(_, id)| id).collect::<Vec<_>>();
        if !pending.is_empty() {
            log::info!("force-releasing {} grains", pending.len());
        }
        let now = self.now;
        for id in pending {
            self.release_voice(id, now);
        }
    }

    fn release_voice(&mut self, id: GrainId, now: Duration) {
        let (Some(mut voice), Some(engine)) = (self.voices.remove(&id), self.engine.as_mut())
        else {
            return;
        };
        match voice.release(engine) {
            Ok(()) => (),
            Err(Error::SendError(err)) => {
                // engine queue is full: try again later
                log::warn!("failed to release grain {id:?}: {err}");
                self.releases
                    .schedule_once(now + self.config.grain_release_margin, id);
                self.voices.insert(id, voice);
            }
            Err(err) => log::warn!("failed to release grain {id:?}: {err}"),
        }
    }

    fn next_due_task(&self, now: Duration) -> Option<DueTask> {
        [
            (self.tracker.next_due(), DueTask::ContactTick),
            (self.releases.next_due(), DueTask::GrainRelease),
            (self.marks.next_due(), DueTask::MarkErase),
        ]
        .into_iter()
        .filter_map(|(due, task)| due.filter(|due| *due <= now).map(|due| (due, task)))
        .min_by_key(|(due, _)| *due)
        .map(|(_, task)| task)
    }
}

impl<E: AudioEngine, S: DrawSurface> Drop for Session<E, S> {
    fn drop(&mut self) {
        self.teardown();
    }
}

// -------------------------------------------------------------------------------------------------
