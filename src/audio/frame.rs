//! Raw PCM frame

use bytes::Bytes;

/// Sample rate of the capture source
pub const SAMPLE_RATE: u32 = 48000;
/// Interleaved channels
pub const CHANNELS: u32 = 2;
/// Samples per channel in one 20ms frame
pub const SAMPLES_PER_FRAME: usize = 960;
/// Bytes in one 20ms S16LE stereo frame
pub const PCM_FRAME_BYTES: usize = SAMPLES_PER_FRAME * CHANNELS as usize * 2;

/// One 20ms window of interleaved S16LE stereo PCM
///
/// Frames are immutable once created. Cloning shares the underlying buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// Raw PCM data
    pub data: Bytes,
    /// Position in the capture stream
    pub sequence: u64,
}

impl AudioFrame {
    pub fn new(data: Bytes, sequence: u64) -> Self {
        Self { data, sequence }
    }

    /// Iterate over the interleaved samples
    pub fn samples(&self) -> impl Iterator<Item = i16> + '_ {
        self.data
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
    }

    /// Decode into `out`, replacing its contents
    pub fn decode_into(&self, out: &mut Vec<i16>) {
        out.clear();
        out.extend(self.samples());
    }

    /// A frame is silent when no sample's magnitude exceeds `threshold`
    pub fn is_silent(&self, threshold: i16) -> bool {
        let threshold = threshold.unsigned_abs();
        self.samples().all(|s| s.unsigned_abs() <= threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_from(samples: &[i16]) -> AudioFrame {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        AudioFrame::new(Bytes::from(bytes), 0)
    }

    #[test]
    fn test_frame_size_constant() {
        assert_eq!(PCM_FRAME_BYTES, 3840);
    }

    #[test]
    fn test_decode_little_endian() {
        let frame = AudioFrame::new(Bytes::from_static(&[0x01, 0x00, 0xff, 0xff, 0x00, 0x80]), 7);
        let mut out = vec![42];
        frame.decode_into(&mut out);
        assert_eq!(out, vec![1, -1, i16::MIN]);
        assert_eq!(frame.samples().count(), 3);
    }

    #[test]
    fn test_silence_threshold() {
        assert!(frame_from(&[0, 100, -100, 50]).is_silent(100));
        assert!(!frame_from(&[0, 101, 0, 0]).is_silent(100));
        assert!(!frame_from(&[0, 0, -101, 0]).is_silent(100));
        assert!(!frame_from(&[i16::MIN]).is_silent(100));
    }

    #[test]
    fn test_zero_frame_is_silent() {
        let frame = AudioFrame::new(Bytes::from(vec![0u8; PCM_FRAME_BYTES]), 0);
        assert!(frame.is_silent(100));
    }
}
