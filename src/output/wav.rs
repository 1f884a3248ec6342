use std::{fs::File, io::BufWriter, path::Path, time::Duration};

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::{
    engine::render::GrainRenderer, error::Error, output::OutputDevice, utils::buffer::clear_buffer,
};

// -------------------------------------------------------------------------------------------------

const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_CHANNEL_COUNT: usize = 2;

const BUFFER_SIZE_FRAMES: usize = 512;

// -------------------------------------------------------------------------------------------------

/// Audio output device, which writes audio into a wav file instead of playing it back.
///
/// Unlike real-time devices, the wav output does not run on its own: the host renders blocks
/// with [`Self::render`] in lock step with its session updates, so scripted sessions render
/// deterministically and faster than real-time.
///
/// Wav files contents are always saved as 32bit floats.
pub struct WavOutput {
    writer: Option<WavWriter<BufWriter<File>>>,
    renderer: Option<GrainRenderer>,
    buffer: Vec<f32>,
    channel_count: usize,
    sample_rate: u32,
    frames_written: u64,
}

impl WavOutput {
    /// Open a wav output device to write at the given file using default specs.
    pub fn open<P: AsRef<Path>>(file_path: P) -> Result<Self, Error> {
        Self::open_with_specs(file_path, DEFAULT_SAMPLE_RATE, DEFAULT_CHANNEL_COUNT)
    }

    /// Create a new wav output device with the given parameters.
    ///
    /// * `file_path`: Target file path. Should end with ".wav" extension.
    /// * `sample_rate`: Renderer and wav file's target sample rate.
    /// * `channel_count`: Wav file's channel layout.
    pub fn open_with_specs<P: AsRef<Path>>(
        file_path: P,
        sample_rate: u32,
        channel_count: usize,
    ) -> Result<Self, Error> {
        if channel_count == 0 || channel_count > u16::MAX as usize {
            return Err(Error::ParameterError(format!(
                "Invalid wav channel count: {channel_count}"
            )));
        }
        let spec = WavSpec {
            channels: channel_count as u16,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let writer = WavWriter::create(file_path, spec)?;
        log::info!("opened wav output: {sample_rate}Hz, {channel_count} channels");

        Ok(Self {
            writer: Some(writer),
            renderer: None,
            buffer: vec![0.0; BUFFER_SIZE_FRAMES * channel_count],
            channel_count,
            sample_rate,
            frames_written: 0,
        })
    }

    /// Total duration of the audio written so far.
    pub fn position(&self) -> Duration {
        Duration::from_secs_f64(self.frames_written as f64 / self.sample_rate as f64)
    }

    /// Render and write the given number of frames. Writes silence when no renderer is playing.
    pub fn render(&mut self, mut frame_count: usize) -> Result<(), Error> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            Error::OutputDeviceError("Wav output got already closed".into())
        })?;
        while frame_count > 0 {
            let block_frames = frame_count.min(BUFFER_SIZE_FRAMES);
            let block = &mut self.buffer[..block_frames * self.channel_count];
            match self.renderer.as_mut() {
                Some(renderer) => {
                    renderer.process(block, self.channel_count);
                }
                None => clear_buffer(block),
            }
            for sample in block.iter() {
                writer.write_sample(*sample)?;
            }
            self.frames_written += block_frames as u64;
            frame_count -= block_frames;
        }
        Ok(())
    }

    /// Render and write until the written duration reaches the given position.
    pub fn render_until(&mut self, position: Duration) -> Result<(), Error> {
        let target_frames = (position.as_secs_f64() * self.sample_rate as f64).round() as u64;
        if target_frames > self.frames_written {
            self.render((target_frames - self.frames_written) as usize)?;
        }
        Ok(())
    }
}

impl OutputDevice for WavOutput {
    fn channel_count(&self) -> usize {
        self.channel_count
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn is_running(&self) -> bool {
        self.writer.is_some() && self.renderer.is_some()
    }

    fn play(&mut self, renderer: GrainRenderer) -> Result<(), Error> {
        if renderer.sample_rate() != self.sample_rate {
            return Err(Error::ParameterError(format!(
                "Renderer sample rate {} does not match the wav sample rate {}",
                renderer.sample_rate(),
                self.sample_rate
            )));
        }
        self.renderer = Some(renderer);
        Ok(())
    }

    fn close(&mut self) -> Result<(), Error> {
        self.renderer = None;
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
            log::info!("closed wav output after {:?}", self.position());
        }
        Ok(())
    }
}

impl Drop for WavOutput {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(err) = writer.finalize() {
                log::error!("Failed to finalize WAV file: {err}");
            }
        }
    }
}

// -------------------------------------------------------------------------------------------------

impl From<hound::Error> for Error {
    fn from(err: hound::Error) -> Error {
        match err {
            hound::Error::IoError(err) => Error::IoError(err),
            err => Error::OutputDeviceError(Box::new(err)),
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        buffer::AudioSourceBuffer,
        engine::{render::RenderEngine, AudioEngine},
    };

    #[test]
    fn writes_rendered_frames() -> Result<(), Error> {
        let path = std::env::temp_dir().join("grainpad_wav_output_test.wav");
        let sample_rate = 8000;

        let (mut engine, renderer) = RenderEngine::new(sample_rate)?;
        let mut output = WavOutput::open_with_specs(&path, sample_rate, 2)?;
        output.play(renderer)?;
        assert!(output.is_running());

        let buffer = AudioSourceBuffer::from_planar(vec![vec![0.5; 8000]], sample_rate)?;
        let source = engine.create_source_node(&buffer, 1.0)?;
        engine.connect(source, engine.destination())?;
        engine.schedule_start(source, 0.0, 0.0, 1.0)?;

        output.render_until(Duration::from_millis(250))?;
        output.render(1000)?;
        assert_eq!(output.position(), Duration::from_millis(375));
        output.close()?;
        assert!(!output.is_running());
        assert!(output.render(10).is_err());

        let reader = hound::WavReader::open(&path).map_err(Error::from)?;
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.duration(), 3000);
        let samples = reader
            .into_samples::<f32>()
            .take(4)
            .collect::<Result<Vec<_>, _>>()
            .map_err(Error::from)?;
        assert_eq!(samples, vec![0.5; 4]);

        let _ = std::fs::remove_file(path);
        Ok(())
    }

    #[test]
    fn rejects_mismatching_renderer() -> Result<(), Error> {
        let path = std::env::temp_dir().join("grainpad_wav_output_mismatch.wav");
        let (_engine, renderer) = RenderEngine::new(22050)?;
        let mut output = WavOutput::open_with_specs(&path, 44100, 2)?;
        assert!(output.play(renderer).is_err());
        output.close()?;
        let _ = std::fs::remove_file(path);
        Ok(())
    }
}
