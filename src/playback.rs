//! Device playback through cpal (feature `playback`).
//!
//! Each sink owns one playback thread fed by a queue, so utterances play one
//! after another and never overlap.  [`PlaybackSink::play`] returns once its
//! stream is running, which means it waits for any earlier utterance on the
//! same sink to finish.  The model rate rarely matches the device rate, so
//! samples are linearly resampled in the callback and the mono signal is
//! copied to every channel.

use std::{
    sync::{mpsc, Mutex},
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::{
    audio::{AudioBuffer, PlaybackSink},
    error::PlaybackError,
};

/// Silence before the first sample, giving the device time to settle.
pub const DEFAULT_START_DELAY: Duration = Duration::from_secs(1);

type Ready = mpsc::Sender<Result<(), PlaybackError>>;
type Job = (AudioBuffer, Ready);
/// Plays one utterance to completion, reporting on `Ready` once it starts.
type Player = fn(AudioBuffer, Duration, Ready);

/// Plays audio on the default output device.
#[derive(Debug)]
pub struct CpalSink {
    start_delay: Duration,
    player: Player,
    queue: Mutex<Option<mpsc::Sender<Job>>>,
}

impl Default for CpalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalSink {
    pub fn new() -> Self {
        Self::with_start_delay(DEFAULT_START_DELAY)
    }

    pub fn with_start_delay(start_delay: Duration) -> Self {
        Self::with_player(start_delay, run_stream)
    }

    fn with_player(start_delay: Duration, player: Player) -> Self {
        Self { start_delay, player, queue: Mutex::new(None) }
    }

    /// Queue `job`, starting the playback thread on first use.
    fn enqueue(&self, job: Job) -> Result<(), PlaybackError> {
        let mut queue = self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let tx = match queue.take() {
            Some(tx) => tx,
            None => self.spawn_worker()?,
        };
        if tx.send(job).is_err() {
            return Err(PlaybackError::Device("playback thread exited".to_string()));
        }
        *queue = Some(tx);
        Ok(())
    }

    fn spawn_worker(&self) -> Result<mpsc::Sender<Job>, PlaybackError> {
        let (tx, rx) = mpsc::channel::<Job>();
        let (delay, player) = (self.start_delay, self.player);
        thread::Builder::new()
            .name("armtts-playback".to_string())
            .spawn(move || {
                for (audio, ready) in rx {
                    player(audio, delay, ready);
                }
            })
            .map_err(|e| PlaybackError::Device(e.to_string()))?;
        Ok(tx)
    }
}

impl PlaybackSink for CpalSink {
    fn play(&self, audio: AudioBuffer) -> Result<(), PlaybackError> {
        let (ready_tx, ready_rx) = mpsc::channel();
        self.enqueue((audio, ready_tx))?;
        ready_rx
            .recv()
            .unwrap_or_else(|_| Err(PlaybackError::Device("playback thread exited".to_string())))
    }
}

/// Linear interpolation at fractional index `pos`; silence past the end.
fn sample_at(samples: &[f32], pos: f64) -> f32 {
    let i = pos.floor() as usize;
    let Some(&a) = samples.get(i) else {
        return 0.0;
    };
    let b = samples.get(i + 1).copied().unwrap_or(a);
    a + (b - a) * (pos - i as f64) as f32
}

// The stream is not `Send` on every host, so it is created, played and
// dropped on the playback thread.
fn run_stream(audio: AudioBuffer, delay: Duration, ready: Ready) {
    let fail = |e: PlaybackError| {
        log::error!("playback failed: {e}");
        let _ = ready.send(Err(e));
    };

    let host = cpal::default_host();
    let Some(device) = host.default_output_device() else {
        return fail(PlaybackError::NoDevice);
    };
    let supported = match device.default_output_config() {
        Ok(c) => c,
        Err(e) => return fail(PlaybackError::Device(e.to_string())),
    };
    if supported.sample_format() != cpal::SampleFormat::F32 {
        return fail(PlaybackError::UnsupportedFormat(format!(
            "device wants {:?}, only f32 output is supported",
            supported.sample_format()
        )));
    }

    let device_rate = u32::from(supported.sample_rate()) as f64;
    let channels = supported.channels().max(1) as usize;
    let rate = if audio.rate > 0.0 { audio.rate as f64 } else { 1.0 };
    let step = audio.format.sample_rate as f64 * rate / device_rate;
    let length = Duration::from_secs_f64(
        audio.samples.len() as f64 / (audio.format.sample_rate.max(1) as f64 * rate),
    );
    let delay_frames = (delay.as_secs_f64() * device_rate) as u64;

    let samples = audio.samples;
    let mut frame_index = 0u64;
    let mut pos = 0f64;
    let stream = device.build_output_stream(
        &supported.config(),
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            for frame in data.chunks_mut(channels) {
                let value = if frame_index < delay_frames {
                    0.0
                } else {
                    let v = sample_at(&samples, pos);
                    pos += step;
                    v
                };
                frame_index += 1;
                frame.fill(value);
            }
        },
        |err| log::error!("audio stream error: {err}"),
        None,
    );
    let stream = match stream {
        Ok(s) => s,
        Err(e) => return fail(PlaybackError::Device(e.to_string())),
    };
    if let Err(e) = stream.play() {
        return fail(PlaybackError::Device(e.to_string()));
    }

    log::debug!("playing {:.2} s at {} Hz", length.as_secs_f32(), device_rate);
    let _ = ready.send(Ok(()));
    thread::sleep(delay + length + Duration::from_millis(200));
}
