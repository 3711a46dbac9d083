//! Fixed-length blocks of mono PCM audio

use std::fmt;

/// Capture sample rate shared by every engine (16kHz speech)
pub const SAMPLE_RATE: u32 = 16_000;

/// Samples per frame on the recognition path (0.5s at 16kHz)
pub const BLOCK_SIZE: usize = 8_000;

/// One immutable block of signed 16-bit mono samples
///
/// Frames are moved, never cloned: each one is consumed exactly once by
/// whichever engine owns the queue it was pushed into.
pub struct Frame {
    samples: Box<[i16]>,
}

impl Frame {
    pub fn new(samples: Vec<i16>) -> Self {
        Self {
            samples: samples.into_boxed_slice(),
        }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame").field("len", &self.len()).finish()
    }
}

/// Reassembles interleaved hardware buffers into fixed-length mono frames
///
/// Hardware callbacks deliver whatever buffer size the driver picked; the
/// engines want exact block sizes. Channels are averaged down to mono.
pub struct FrameAssembler {
    frame_len: usize,
    channels: usize,
    pending: Vec<i16>,
}

impl FrameAssembler {
    pub fn new(frame_len: usize, channels: usize) -> Self {
        Self {
            frame_len: frame_len.max(1),
            channels: channels.max(1),
            pending: Vec::with_capacity(frame_len.max(1)),
        }
    }

    /// Feed one interleaved buffer, emitting every frame it completes
    pub fn push<T: Copy>(
        &mut self,
        data: &[T],
        to_i16: impl Fn(T) -> i16,
        mut emit: impl FnMut(Frame),
    ) {
        for chunk in data.chunks(self.channels) {
            let sum: i32 = chunk.iter().map(|&s| i32::from(to_i16(s))).sum();
            let mono = (sum / chunk.len() as i32) as i16;
            self.pending.push(mono);

            if self.pending.len() == self.frame_len {
                let full = std::mem::replace(
                    &mut self.pending,
                    Vec::with_capacity(self.frame_len),
                );
                emit(Frame::new(full));
            }
        }
    }
}

/// Convert a float sample in [-1.0, 1.0] to i16
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assembler_splits_into_exact_frames() {
        let mut assembler = FrameAssembler::new(4, 1);
        let mut frames = Vec::new();

        assembler.push(&[1i16, 2, 3], |s| s, |f| frames.push(f));
        assert!(frames.is_empty());

        assembler.push(&[4i16, 5, 6, 7, 8, 9], |s| s, |f| frames.push(f));
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].samples(), &[1, 2, 3, 4]);
        assert_eq!(frames[1].samples(), &[5, 6, 7, 8]);
    }

    #[test]
    fn test_assembler_downmixes_stereo() {
        let mut assembler = FrameAssembler::new(2, 2);
        let mut frames = Vec::new();

        assembler.push(&[100i16, 300, -50, -150], |s| s, |f| frames.push(f));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].samples(), &[200, -100]);
    }

    #[test]
    fn test_f32_conversion_clamps() {
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(2.0), 32767);
        assert_eq!(f32_to_i16(-2.0), -32768);
    }
}
