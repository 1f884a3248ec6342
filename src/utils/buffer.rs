// -------------------------------------------------------------------------------------------------

/// Split the given interleaved buffer into `channel_count` planar channel buffers.
/// Trailing samples which do not fill a whole frame are ignored.
pub(crate) fn interleaved_to_planar(interleaved: &[f32], channel_count: usize) -> Vec<Vec<f32>> {
    debug_assert!(channel_count > 0, "Invalid channel count");
    let frame_count = interleaved.len() / channel_count;
    let mut planar = vec![Vec::with_capacity(frame_count); channel_count];
    match channel_count {
        1 => {
            planar[0].extend_from_slice(&interleaved[..frame_count]);
        }
        2 => {
            for frame in interleaved.chunks_exact(2) {
                planar[0].push(frame[0]);
                planar[1].push(frame[1]);
            }
        }
        _ => {
            for frame in interleaved.chunks_exact(channel_count) {
                for (channel, value) in planar.iter_mut().zip(frame) {
                    channel.push(*value);
                }
            }
        }
    }
    planar
}

// -------------------------------------------------------------------------------------------------

/// Fill the given buffer with silence.
#[inline]
pub(crate) fn clear_buffer(buffer: &mut [f32]) {
    buffer.iter_mut().for_each(|s| *s = 0.0);
}

// -------------------------------------------------------------------------------------------------
