//! Decoded, immutable audio source buffers.

use std::sync::Arc;

use crate::{
    error::Error,
    utils::{buffer::interleaved_to_planar, unique_usize_id},
};

// -------------------------------------------------------------------------------------------------

/// Decoded audio data which grains read from.
///
/// Samples are stored as planar channels. The buffer is immutable after creation and cheap to
/// clone: clones share the same sample data, so a buffer can be handed over to the audio
/// engine's render thread without copying.
#[derive(Clone)]
pub struct AudioSourceBuffer {
    id: usize,
    channels: Arc<[Box<[f32]>]>,
    sample_rate: u32,
}

impl AudioSourceBuffer {
    /// Create a new buffer from planar channel data.
    ///
    /// Fails when there are no channels, no sample frames, when channel lengths differ or when
    /// the sample rate is zero.
    pub fn from_planar(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self, Error> {
        if sample_rate == 0 {
            return Err(Error::InvalidBufferError(
                "Sample rate must be > 0".to_string(),
            ));
        }
        let frame_count = match channels.first() {
            Some(channel) => channel.len(),
            None => {
                return Err(Error::InvalidBufferError(
                    "Buffer has no channels".to_string(),
                ))
            }
        };
        if frame_count == 0 {
            return Err(Error::InvalidBufferError(
                "Buffer has no sample frames".to_string(),
            ));
        }
        if channels.iter().any(|channel| channel.len() != frame_count) {
            return Err(Error::InvalidBufferError(
                "All channels must have the same length".to_string(),
            ));
        }
        let channels = channels
            .into_iter()
            .map(Vec::into_boxed_slice)
            .collect::<Arc<[_]>>();
        Ok(Self {
            id: unique_usize_id(),
            channels,
            sample_rate,
        })
    }

    /// Create a new buffer from interleaved sample data with the given channel layout.
    pub fn from_interleaved(
        samples: &[f32],
        channel_count: usize,
        sample_rate: u32,
    ) -> Result<Self, Error> {
        if channel_count == 0 {
            return Err(Error::InvalidBufferError(
                "Channel count must be > 0".to_string(),
            ));
        }
        Self::from_planar(interleaved_to_planar(samples, channel_count), sample_rate)
    }

    /// Unique id of this buffer. Clones share the id.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of sample frames in each channel.
    pub fn frame_count(&self) -> usize {
        self.channels[0].len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Buffer duration in seconds: `frame_count / sample_rate`.
    pub fn duration_seconds(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Access a single channel's samples.
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(|channel| channel.as_ref())
    }

    /// Access the first channel's samples, which is used for waveform displays.
    pub fn first_channel(&self) -> &[f32] {
        &self.channels[0]
    }
}

impl std::fmt::Debug for AudioSourceBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSourceBuffer")
            .field("id", &self.id)
            .field("channel_count", &self.channel_count())
            .field("frame_count", &self.frame_count())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

// -------------------------------------------------------------------------------------------------

/// Host provided audio decoder, which turns encoded file content into an [`AudioSourceBuffer`].
///
/// Decoding itself is not part of grainpad: hosts plug in their platform's codec here.
pub trait AudioDecoder {
    fn decode(&self, encoded: &[u8]) -> Result<AudioSourceBuffer, Error>;
}

impl<F> AudioDecoder for F
where
    F: Fn(&[u8]) -> Result<AudioSourceBuffer, Error>,
{
    fn decode(&self, encoded: &[u8]) -> Result<AudioSourceBuffer, Error> {
        self(encoded)
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration() -> Result<(), Error> {
        let buffer = AudioSourceBuffer::from_planar(vec![vec![0.0; 44100 * 4]], 44100)?;
        assert_eq!(buffer.channel_count(), 1);
        assert_eq!(buffer.frame_count(), 44100 * 4);
        assert_eq!(buffer.duration_seconds(), 4.0);
        Ok(())
    }

    #[test]
    fn interleaved() -> Result<(), Error> {
        let buffer = AudioSourceBuffer::from_interleaved(&[0.1, -0.1, 0.2, -0.2], 2, 2)?;
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frame_count(), 2);
        assert_eq!(buffer.channel(0), Some([0.1, 0.2].as_slice()));
        assert_eq!(buffer.channel(1), Some([-0.1, -0.2].as_slice()));
        assert!(buffer.channel(2).is_none());
        assert_eq!(buffer.duration_seconds(), 1.0);
        Ok(())
    }

    #[test]
    fn invalid_buffers() {
        assert!(AudioSourceBuffer::from_planar(vec![], 44100).is_err());
        assert!(AudioSourceBuffer::from_planar(vec![vec![]], 44100).is_err());
        assert!(AudioSourceBuffer::from_planar(vec![vec![0.0; 4]], 0).is_err());
        assert!(AudioSourceBuffer::from_planar(vec![vec![0.0; 4], vec![0.0; 3]], 44100).is_err());
        assert!(AudioSourceBuffer::from_interleaved(&[0.0; 4], 0, 44100).is_err());
    }

    #[test]
    fn clones_share_data() -> Result<(), Error> {
        let buffer = AudioSourceBuffer::from_planar(vec![vec![0.5; 8]], 8)?;
        let other = AudioSourceBuffer::from_planar(vec![vec![0.5; 8]], 8)?;
        assert_eq!(buffer.clone().id(), buffer.id());
        assert_ne!(other.id(), buffer.id());
        Ok(())
    }

    #[test]
    fn closure_decoder() -> Result<(), Error> {
        let decoder = |encoded: &[u8]| {
            let samples = encoded.iter().map(|b| *b as f32 / 255.0).collect::<Vec<_>>();
            AudioSourceBuffer::from_interleaved(&samples, 1, 4)
        };
        let buffer = decoder.decode(&[0, 255, 0, 255])?;
        assert_eq!(buffer.frame_count(), 4);
        assert!(decoder.decode(&[]).is_err());
        Ok(())
    }
}
