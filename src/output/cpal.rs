#[cfg(feature = "assert-allocs")]
use assert_no_alloc::*;

use basedrop::{Collector, Owned};
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    StreamConfig,
};
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::{
    engine::render::GrainRenderer, error::Error, output::OutputDevice, utils::buffer::clear_buffer,
};

// -------------------------------------------------------------------------------------------------

const PREFERRED_SAMPLE_FORMAT: cpal::SampleFormat = cpal::SampleFormat::F32;
const PREFERRED_SAMPLE_RATE: cpal::SampleRate = cpal::SampleRate(44100);
const PREFERRED_CHANNELS: cpal::ChannelCount = 2;
const PREFERRED_BUFFER_SIZE: cpal::BufferSize = if cfg!(debug_assertions) {
    cpal::BufferSize::Default
} else {
    cpal::BufferSize::Fixed(1024)
};

// -------------------------------------------------------------------------------------------------

/// Real-time audio output, playing a [`GrainRenderer`] on the system's default audio device.
///
/// Create the [`RenderEngine`](crate::RenderEngine) with the device's [`Self::sample_rate`],
/// so engine times match the device's playback position.
pub struct CpalOutput {
    stream: Option<cpal::Stream>,
    callback_send: Sender<CallbackMsg>,
    collector: Collector,
    channel_count: cpal::ChannelCount,
    sample_rate: cpal::SampleRate,
    playing: bool,
}

impl CpalOutput {
    /// Open the default output device of the default audio host.
    pub fn open() -> Result<Self, Error> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(cpal::DefaultStreamConfigError::DeviceNotAvailable)?;

        if let Ok(name) = device.name() {
            log::info!("using audio device: {}", name);
        }

        let supported = Self::preferred_output_config(&device)?;
        let config = StreamConfig {
            buffer_size: PREFERRED_BUFFER_SIZE,
            ..supported.config()
        };
        let (callback_send, callback_recv) = bounded(16);
        let mut callback = StreamCallback {
            callback_recv,
            renderer: None,
            channel_count: config.channels as usize,
        };

        log::info!("opening output stream: {:?}", config);
        let stream = device.build_output_stream(
            &config,
            move |output: &mut [f32], _| {
                callback.write_samples(output);
            },
            |err| {
                log::error!("audio output error: {}", err);
            },
            None,
        )?;
        stream.play()?;

        Ok(Self {
            stream: Some(stream),
            callback_send,
            collector: Collector::new(),
            channel_count: supported.channels(),
            sample_rate: supported.sample_rate(),
            playing: false,
        })
    }

    fn preferred_output_config(
        device: &cpal::Device,
    ) -> Result<cpal::SupportedStreamConfig, Error> {
        for s in device.supported_output_configs()? {
            let rates = s.min_sample_rate()..=s.max_sample_rate();
            if s.channels() == PREFERRED_CHANNELS
                && s.sample_format() == PREFERRED_SAMPLE_FORMAT
                && rates.contains(&PREFERRED_SAMPLE_RATE)
            {
                return Ok(s.with_sample_rate(PREFERRED_SAMPLE_RATE));
            }
        }

        Ok(device.default_output_config()?)
    }
}

impl OutputDevice for CpalOutput {
    fn channel_count(&self) -> usize {
        self.channel_count as usize
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate.0
    }

    fn is_running(&self) -> bool {
        self.stream.is_some() && self.playing
    }

    fn play(&mut self, renderer: GrainRenderer) -> Result<(), Error> {
        if renderer.sample_rate() != self.sample_rate() {
            return Err(Error::ParameterError(format!(
                "Renderer sample rate {} does not match the device sample rate {}",
                renderer.sample_rate(),
                self.sample_rate()
            )));
        }
        // replaced renderers are dropped in the callback, but freed here
        self.collector.collect();
        let renderer = Owned::new(&self.collector.handle(), renderer);
        self.callback_send.send(CallbackMsg::Play(renderer))?;
        self.playing = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        if let Some(stream) = self.stream.take() {
            log::debug!("closing audio output stream");
            let _ = self.callback_send.try_send(CallbackMsg::Stop);
            stream.pause()?;
        }
        self.collector.collect();
        self.playing = false;
        Ok(())
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        // drop the stream and its callback first, so its renderer gets collected too
        self.stream = None;
        self.collector.collect();
    }
}

// -------------------------------------------------------------------------------------------------

enum CallbackMsg {
    Play(Owned<GrainRenderer>),
    Stop,
}

struct StreamCallback {
    callback_recv: Receiver<CallbackMsg>,
    renderer: Option<Owned<GrainRenderer>>,
    channel_count: usize,
}

impl StreamCallback {
    fn write_samples(&mut self, output: &mut [f32]) {
        while let Ok(msg) = self.callback_recv.try_recv() {
            match msg {
                CallbackMsg::Play(renderer) => self.renderer = Some(renderer),
                CallbackMsg::Stop => self.renderer = None,
            }
        }

        match self.renderer.as_mut() {
            Some(renderer) => {
                #[cfg(not(feature = "assert-allocs"))]
                renderer.process(output, self.channel_count);
                #[cfg(feature = "assert-allocs")]
                assert_no_alloc(|| renderer.process(output, self.channel_count));
            }
            None => clear_buffer(output),
        }
    }
}

// -------------------------------------------------------------------------------------------------

impl From<cpal::DefaultStreamConfigError> for Error {
    fn from(err: cpal::DefaultStreamConfigError) -> Error {
        Error::OutputDeviceError(Box::new(err))
    }
}

impl From<cpal::SupportedStreamConfigsError> for Error {
    fn from(err: cpal::SupportedStreamConfigsError) -> Error {
        Error::OutputDeviceError(Box::new(err))
    }
}

impl From<cpal::BuildStreamError> for Error {
    fn from(err: cpal::BuildStreamError) -> Error {
        Error::OutputDeviceError(Box::new(err))
    }
}

impl From<cpal::PlayStreamError> for Error {
    fn from(err: cpal::PlayStreamError) -> Error {
        Error::OutputDeviceError(Box::new(err))
    }
}

impl From<cpal::PauseStreamError> for Error {
    fn from(err: cpal::PauseStreamError) -> Error {
        Error::OutputDeviceError(Box::new(err))
    }
}
