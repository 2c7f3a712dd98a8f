//! Audio buffers and playback sinks.
//!
//! The model emits linear PCM: 32-bit float, mono, at the rate recorded in
//! the bundle config.  A sink receives the whole utterance at once, together
//! with its format and a playback rate, and owns it from then on.

use std::{path::PathBuf, time::Duration};

use crate::error::PlaybackError;

/// Sample layout of an [`AudioBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl AudioFormat {
    /// Mono 32-bit float at `sample_rate`.
    pub fn mono_f32(sample_rate: u32) -> Self {
        Self { sample_rate, channels: 1, bits_per_sample: 32 }
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.channels as usize * self.bits_per_sample as usize / 8
    }
}

/// One utterance worth of audio, ready for playback.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub format: AudioFormat,
    /// 1.0 plays at the recorded rate.
    pub rate: f32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, format: AudioFormat) -> Self {
        Self { samples, format, rate: 1.0 }
    }

    pub fn duration(&self) -> Duration {
        let frames = self.samples.len() / self.format.channels.max(1) as usize;
        Duration::from_secs_f64(frames as f64 / self.format.sample_rate.max(1) as f64)
    }

    /// Raw little-endian PCM bytes, the layout native audio renderers expect.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }
}

/// Accepts a finished utterance and starts playing it.
pub trait PlaybackSink: Send + Sync {
    fn play(&self, audio: AudioBuffer) -> Result<(), PlaybackError>;
}

/// Writes each utterance to a 32-bit float WAV file.
///
/// Float WAV keeps the model output bit-exact; convert downstream if the
/// target player only handles 16-bit PCM.
#[derive(Debug, Clone)]
pub struct WavFileSink {
    path: PathBuf,
}

impl WavFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn write(&self, audio: &AudioBuffer) -> Result<(), hound::Error> {
        let spec = hound::WavSpec {
            channels: audio.format.channels,
            sample_rate: audio.format.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(&self.path, spec)?;
        for &s in &audio.samples {
            writer.write_sample(s)?;
        }
        writer.finalize()
    }
}

impl PlaybackSink for WavFileSink {
    fn play(&self, audio: AudioBuffer) -> Result<(), PlaybackError> {
        if audio.rate != 1.0 {
            log::warn!("WAV output ignores playback rate {}", audio.rate);
        }
        self.write(&audio).map_err(|source| PlaybackError::Wav {
            path: self.path.clone(),
            source,
        })?;
        log::info!(
            "Saved {} samples ({:.2} s) to {}",
            audio.samples.len(),
            audio.duration().as_secs_f32(),
            self.path.display()
        );
        Ok(())
    }
}

/// Drops audio; used when no output backend is compiled in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl PlaybackSink for NullSink {
    fn play(&self, audio: AudioBuffer) -> Result<(), PlaybackError> {
        log::warn!(
            "no audio output configured, discarding {:.2} s of audio",
            audio.duration().as_secs_f32()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration() {
        let audio = AudioBuffer::new(vec![0.0; 22_050], AudioFormat::mono_f32(44_100));
        assert_eq!(audio.duration(), Duration::from_millis(500));
    }

    #[test]
    fn test_le_bytes_layout() {
        let audio = AudioBuffer::new(vec![1.0, -0.5], AudioFormat::mono_f32(44_100));
        let bytes = audio.to_le_bytes();
        assert_eq!(bytes.len(), 2 * audio.format.bytes_per_frame());
        assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[4..], &(-0.5f32).to_le_bytes());
    }

    #[test]
    fn test_wav_sink_writes_float_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let samples = vec![0.0, 0.25, -0.25, 1.0];
        WavFileSink::new(&path)
            .play(AudioBuffer::new(samples.clone(), AudioFormat::mono_f32(22_050)))
            .unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, 22_050);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_format, hound::SampleFormat::Float);
        let read: Vec<f32> = reader.samples::<f32>().map(Result::unwrap).collect();
        assert_eq!(read, samples);
    }

    #[test]
    fn test_wav_sink_reports_unwritable_path() {
        let err = WavFileSink::new("/nonexistent-dir/out.wav")
            .play(AudioBuffer::new(vec![0.0], AudioFormat::mono_f32(44_100)))
            .unwrap_err();
        assert!(matches!(err, PlaybackError::Wav { .. }));
    }
}
