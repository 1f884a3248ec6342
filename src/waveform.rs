//! Helper functions to generate waveform overviews of audio source buffers.

use crate::buffer::AudioSourceBuffer;

// -------------------------------------------------------------------------------------------------

/// A single column in a waveform view plot, which represents a condensed view of the audio data
/// at the column's position as min/max values.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct WaveformPoint {
    /// Pixel column this point is drawn at.
    pub column: usize,
    /// The minimum of all values which are represented by this column, at most 1.0.
    pub min: f32,
    /// The maximum of all values which are represented by this column, at least -1.0.
    pub max: f32,
}

// -------------------------------------------------------------------------------------------------

/// Generates display data of the buffer's first channel for a waveform plot with the given
/// width in pixel columns.
///
/// Each column summarizes `ceil(frames / width)` samples, starting at `column * step`. When
/// there are fewer frames than columns, trailing columns have no samples and are skipped, so
/// the returned points may cover less than `width` columns.
pub fn waveform_columns(buffer: &AudioSourceBuffer, width: usize) -> Vec<WaveformPoint> {
    waveform_from_samples(buffer.first_channel(), width)
}

/// Generates waveform display data from a plain mono sample slice.
/// See [`waveform_columns`] for details.
pub fn waveform_from_samples(samples: &[f32], width: usize) -> Vec<WaveformPoint> {
    if width == 0 || samples.is_empty() {
        return Vec::new();
    }
    let step = samples.len().div_ceil(width);
    let mut waveform = Vec::with_capacity(width);
    for column in 0..width {
        let slice_start = column * step;
        if slice_start >= samples.len() {
            break;
        }
        let slice_end = (slice_start + step).min(samples.len());
        let (min, max) = samples[slice_start..slice_end]
            .iter()
            .fold((1.0_f32, -1.0_f32), |(min, max), value| {
                (min.min(*value), max.max(*value))
            });
        waveform.push(WaveformPoint { column, min, max });
    }
    waveform
}

// -------------------------------------------------------------------------------------------------
