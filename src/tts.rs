//! Speak orchestrator — text in, one playback call out.
//!
//! ```text
//! text ─▶ Chunker ─▶ [chunk] ─▶ Tokenizer ─▶ [ids] ─▶ Synthesizer ─▶ [samples] ─▶ accumulate ─▶ sink
//! ```
//!
//! Chunks are processed strictly in order and their audio is appended in that
//! order.  A preprocessing failure aborts the utterance and nothing is played.
//! A synthesis failure either drops that chunk's audio or aborts, depending on
//! [`InferenceFailurePolicy`].  The sink is called exactly once per successful
//! utterance that produced at least one chunk.

use std::{
    path::Path,
    sync::{mpsc, Mutex, MutexGuard},
    thread,
    time::Duration,
};

use crate::{
    audio::{AudioBuffer, AudioFormat, PlaybackSink},
    bundle::ResourceBundle,
    chunker::Chunker,
    config::{InferenceFailurePolicy, TtsConfig},
    error::{InitError, SpeakError, TokenizerError},
    model::Synthesizer,
    tokenize::{ProcessResult, RemoteTokenizer, Tokenizer},
};

/// What a successful [`ArmTts::speak`] produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeakSummary {
    pub chunks: usize,
    /// Indices of chunks whose synthesis failed and contributed no audio.
    pub skipped_chunks: Vec<usize>,
    pub samples: usize,
    pub duration: Duration,
}

#[derive(Default)]
struct Accumulator {
    samples: Vec<f32>,
    skipped: Vec<usize>,
}

/// Armenian TTS handle.
///
/// Owns the inference backend for its whole lifetime.  Calls to
/// [`speak`](Self::speak) on the same instance are serialised: at most one
/// utterance is in flight at a time.
pub struct ArmTts {
    config: TtsConfig,
    chunker: Chunker,
    tokenizer: Box<dyn Tokenizer>,
    engine: Mutex<Option<Box<dyn Synthesizer>>>,
    sink: Box<dyn PlaybackSink>,
}

impl ArmTts {
    pub fn new(
        config: TtsConfig,
        tokenizer: Box<dyn Tokenizer>,
        synthesizer: Box<dyn Synthesizer>,
        sink: Box<dyn PlaybackSink>,
    ) -> Self {
        Self {
            chunker: Chunker::new(config.chunking.clone()),
            config,
            tokenizer,
            engine: Mutex::new(Some(synthesizer)),
            sink,
        }
    }

    /// Open the bundle at `bundle_dir` and load its models.
    pub fn load(
        bundle_dir: &Path,
        api_key: &str,
        sink: Box<dyn PlaybackSink>,
    ) -> Result<Self, InitError> {
        Self::from_bundle(&ResourceBundle::open(bundle_dir)?, api_key, sink)
    }

    pub fn from_bundle(
        bundle: &ResourceBundle,
        api_key: &str,
        sink: Box<dyn PlaybackSink>,
    ) -> Result<Self, InitError> {
        bundle.config().validate().inspect_err(|e| log::error!("{e}"))?;
        let synthesizer = bundle.load_synthesizer().inspect_err(|e| {
            log::error!("Initialization failed: {e}. Check that the model is bundled properly.");
        })?;
        let config = bundle.config().clone();
        let tokenizer = RemoteTokenizer::new(&config, api_key);
        Ok(Self::new(config, Box::new(tokenizer), Box::new(synthesizer), sink))
    }

    pub fn config(&self) -> &TtsConfig {
        &self.config
    }

    /// The chunks `text` would be spoken in.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        self.chunker.chunk(text)
    }

    pub fn is_initialized(&self) -> bool {
        self.engine().is_some()
    }

    /// Release the inference backend.  Later calls to `speak` fail with
    /// [`SpeakError::NotInitialized`].
    pub fn unload(&self) {
        self.engine().take();
    }

    fn engine(&self) -> MutexGuard<'_, Option<Box<dyn Synthesizer>>> {
        self.engine.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Speak `text` through the instance's sink.
    ///
    /// `speed` is the user-facing rate (1.0 = normal); it is clamped to the
    /// configured range before conversion to the model's length scale.
    pub fn speak(&self, text: &str, speed: f32) -> Result<SpeakSummary, SpeakError> {
        self.speak_with(text, speed, self.sink.as_ref())
    }

    /// Like [`speak`](Self::speak) but plays through `sink`.
    pub fn speak_with(
        &self,
        text: &str,
        speed: f32,
        sink: &dyn PlaybackSink,
    ) -> Result<SpeakSummary, SpeakError> {
        let engine = self.engine();
        let Some(synthesizer) = engine.as_deref() else {
            log::error!("The initialization has failed. Check the logs for more details.");
            return Err(SpeakError::NotInitialized);
        };

        let speed = self.config.effective_speed(speed);
        let chunks = self.chunker.chunk(text);
        if chunks.is_empty() {
            log::debug!("nothing to speak");
            return Ok(SpeakSummary::default());
        }
        log::debug!("speaking {} chunks at length scale {speed}", chunks.len());

        let mut acc = Accumulator::default();
        if self.config.prefetch {
            self.run_prefetched(&chunks, synthesizer, speed, &mut acc)?;
        } else {
            self.run_sequential(&chunks, synthesizer, speed, &mut acc)?;
        }

        let audio = AudioBuffer::new(acc.samples, AudioFormat::mono_f32(self.config.sample_rate));
        let summary = SpeakSummary {
            chunks: chunks.len(),
            skipped_chunks: acc.skipped,
            samples: audio.samples.len(),
            duration: audio.duration(),
        };
        sink.play(audio).map_err(|e| {
            log::error!("{e}");
            SpeakError::Playback(e)
        })?;
        Ok(summary)
    }

    fn run_sequential(
        &self,
        chunks: &[String],
        synthesizer: &dyn Synthesizer,
        speed: f32,
        acc: &mut Accumulator,
    ) -> Result<(), SpeakError> {
        for (index, chunk) in chunks.iter().enumerate() {
            let ids = self.tokenizer.process(chunk).map_err(|e| tokenizer_failure(index, e))?;
            self.append_chunk(synthesizer, index, &ids, speed, acc)?;
        }
        Ok(())
    }

    /// Tokenize ahead on a scoped thread while synthesising in order here.
    ///
    /// The channel is a rendezvous, so the producer is never more than one
    /// chunk ahead.  When synthesis aborts, the one request already in flight
    /// is still awaited (bounded by the request timeout) before returning.
    fn run_prefetched(
        &self,
        chunks: &[String],
        synthesizer: &dyn Synthesizer,
        speed: f32,
        acc: &mut Accumulator,
    ) -> Result<(), SpeakError> {
        let tokenizer = self.tokenizer.as_ref();
        thread::scope(|scope| -> Result<(), SpeakError> {
            let (tx, rx) = mpsc::sync_channel::<ProcessResult>(0);
            scope.spawn(move || {
                for chunk in chunks {
                    let result = tokenizer.process(chunk);
                    let failed = result.is_err();
                    // A closed channel means the consumer has already given up.
                    if tx.send(result).is_err() || failed {
                        break;
                    }
                }
            });

            for (index, result) in rx.iter().enumerate() {
                let ids = result.map_err(|e| tokenizer_failure(index, e))?;
                self.append_chunk(synthesizer, index, &ids, speed, acc)?;
            }
            Ok(())
        })
    }

    fn append_chunk(
        &self,
        synthesizer: &dyn Synthesizer,
        index: usize,
        ids: &[i32],
        speed: f32,
        acc: &mut Accumulator,
    ) -> Result<(), SpeakError> {
        match synthesizer.synthesize(ids, speed) {
            Ok(audio) => {
                log::debug!("chunk {index}: {} tokens → {} samples", ids.len(), audio.len());
                acc.samples.extend(audio);
                Ok(())
            }
            Err(e) => match self.config.inference_failure {
                InferenceFailurePolicy::Skip => {
                    log::error!("Synthesize failed on chunk {index}, continuing without it: {e}");
                    acc.skipped.push(index);
                    Ok(())
                }
                InferenceFailurePolicy::Abort => {
                    log::error!("Synthesize failed on chunk {index}: {e}");
                    Err(SpeakError::Inference { chunk: index, source: e })
                }
            },
        }
    }
}

fn tokenizer_failure(index: usize, source: TokenizerError) -> SpeakError {
    log::error!("preprocessing chunk {index} failed: {source}");
    SpeakError::Tokenizer { chunk: index, source }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;
    use crate::{
        chunker::ChunkerConfig,
        error::{InferenceError, PlaybackError},
    };

    /// Three chunks at `max_length = 14`.
    const THREE_CHUNKS: &str = "One one one. Two two two. Three three.";

    /// Returns `[n]` for the n-th call (1-based); fails on `fail_on` (0-based).
    #[derive(Clone, Default)]
    struct FakeTokenizer {
        calls: Arc<Mutex<Vec<String>>>,
        fail_on: Option<usize>,
    }

    impl Tokenizer for FakeTokenizer {
        fn process(&self, chunk: &str) -> ProcessResult {
            let mut calls = self.calls.lock().unwrap();
            let index = calls.len();
            calls.push(chunk.to_string());
            if self.fail_on == Some(index) {
                return Err(TokenizerError::Service("Invalid API key".into()));
            }
            Ok(vec![index as i32 + 1])
        }
    }

    /// Emits two samples equal to the first token; fails on `fail_on` (0-based call).
    #[derive(Clone, Default)]
    struct FakeSynth {
        speeds: Arc<Mutex<Vec<f32>>>,
        fail_on: Option<usize>,
        in_flight: Arc<AtomicUsize>,
        max_in_flight: Arc<AtomicUsize>,
    }

    impl Synthesizer for FakeSynth {
        fn synthesize(&self, ids: &[i32], speed: f32) -> Result<Vec<f32>, InferenceError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(2));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let mut speeds = self.speeds.lock().unwrap();
            let call = speeds.len();
            speeds.push(speed);
            if self.fail_on == Some(call) {
                return Err(anyhow::anyhow!("ONNX inference failed").into());
            }
            Ok(vec![ids[0] as f32; 2])
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        played: Arc<Mutex<Vec<AudioBuffer>>>,
        fail: bool,
    }

    impl RecordingSink {
        fn played(&self) -> Vec<AudioBuffer> {
            self.played.lock().unwrap().clone()
        }
    }

    impl PlaybackSink for RecordingSink {
        fn play(&self, audio: AudioBuffer) -> Result<(), PlaybackError> {
            if self.fail {
                return Err(PlaybackError::NoDevice);
            }
            self.played.lock().unwrap().push(audio);
            Ok(())
        }
    }

    fn config() -> TtsConfig {
        TtsConfig {
            chunking: ChunkerConfig { max_length: 14, ..Default::default() },
            ..Default::default()
        }
    }

    fn tts(
        config: TtsConfig,
        tokenizer: &FakeTokenizer,
        synth: &FakeSynth,
        sink: &RecordingSink,
    ) -> ArmTts {
        ArmTts::new(
            config,
            Box::new(tokenizer.clone()),
            Box::new(synth.clone()),
            Box::new(sink.clone()),
        )
    }

    #[test]
    fn test_chunks_played_once_in_order() {
        let (tok, synth, sink) = Default::default();
        let tts = tts(config(), &tok, &synth, &sink);

        let summary = tts.speak(THREE_CHUNKS, 1.0).unwrap();

        assert_eq!(
            *tok.calls.lock().unwrap(),
            vec!["One one one:", "Two two two:", "Three three:"]
        );
        let played = sink.played();
        assert_eq!(played.len(), 1);
        assert_eq!(played[0].samples, vec![1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
        assert_eq!(played[0].format, AudioFormat::mono_f32(44_100));
        assert_eq!(played[0].rate, 1.0);
        assert_eq!(summary.chunks, 3);
        assert_eq!(summary.samples, 6);
        assert!(summary.skipped_chunks.is_empty());
    }

    #[test]
    fn test_tokenizer_failure_plays_nothing() {
        let tok = FakeTokenizer { fail_on: Some(1), ..Default::default() };
        let (synth, sink) = (FakeSynth::default(), RecordingSink::default());
        let tts = tts(config(), &tok, &synth, &sink);

        let err = tts.speak(THREE_CHUNKS, 1.0).unwrap_err();

        assert!(matches!(err, SpeakError::Tokenizer { chunk: 1, source: TokenizerError::Service(_) }));
        assert_eq!(tok.calls.lock().unwrap().len(), 2, "chunk 3 must not be requested");
        assert_eq!(synth.speeds.lock().unwrap().len(), 1);
        assert!(sink.played().is_empty());
    }

    #[test]
    fn test_effective_speed_passed_to_inference() {
        let (tok, synth, sink) = Default::default();
        let tts = tts(config(), &tok, &synth, &sink);

        tts.speak("Բարև", 1.0).unwrap();
        tts.speak("Բարև", 0.5).unwrap();
        tts.speak("Բարև", 1.25).unwrap();
        tts.speak("Բարև", 9.0).unwrap();

        assert_eq!(*synth.speeds.lock().unwrap(), vec![1.0, 1.5, 0.75, 0.5]);
    }

    #[test]
    fn test_inference_failure_skips_chunk() {
        let synth = FakeSynth { fail_on: Some(1), ..Default::default() };
        let (tok, sink) = (FakeTokenizer::default(), RecordingSink::default());
        let tts = tts(config(), &tok, &synth, &sink);

        let summary = tts.speak(THREE_CHUNKS, 1.0).unwrap();

        assert_eq!(summary.skipped_chunks, vec![1]);
        assert_eq!(sink.played()[0].samples, vec![1.0, 1.0, 3.0, 3.0]);
    }

    #[test]
    fn test_inference_failure_aborts_under_abort_policy() {
        let synth = FakeSynth { fail_on: Some(1), ..Default::default() };
        let (tok, sink) = (FakeTokenizer::default(), RecordingSink::default());
        let config = TtsConfig { inference_failure: InferenceFailurePolicy::Abort, ..config() };
        let tts = tts(config, &tok, &synth, &sink);

        let err = tts.speak(THREE_CHUNKS, 1.0).unwrap_err();

        assert!(matches!(err, SpeakError::Inference { chunk: 1, .. }));
        assert_eq!(tok.calls.lock().unwrap().len(), 2);
        assert!(sink.played().is_empty());
    }

    #[test]
    fn test_unloaded_engine_short_circuits() {
        let (tok, synth, sink) = Default::default();
        let tts = tts(config(), &tok, &synth, &sink);
        assert!(tts.is_initialized());

        tts.unload();

        assert!(!tts.is_initialized());
        assert!(matches!(tts.speak(THREE_CHUNKS, 1.0), Err(SpeakError::NotInitialized)));
        assert!(tok.calls.lock().unwrap().is_empty());
        assert!(sink.played().is_empty());
    }

    #[test]
    fn test_blank_text_does_nothing() {
        let (tok, synth, sink) = Default::default();
        let tts = tts(config(), &tok, &synth, &sink);

        assert_eq!(tts.speak("  \n ", 1.0).unwrap(), SpeakSummary::default());
        assert!(tok.calls.lock().unwrap().is_empty());
        assert!(sink.played().is_empty());
    }

    #[test]
    fn test_playback_failure_is_reported() {
        let sink = RecordingSink { fail: true, ..Default::default() };
        let (tok, synth) = (FakeTokenizer::default(), FakeSynth::default());
        let tts = tts(config(), &tok, &synth, &sink);

        assert!(matches!(
            tts.speak(THREE_CHUNKS, 1.0),
            Err(SpeakError::Playback(PlaybackError::NoDevice))
        ));
    }

    #[test]
    fn test_speak_with_overrides_sink() {
        let (tok, synth, own) = Default::default();
        let tts = tts(config(), &tok, &synth, &own);
        let other = RecordingSink::default();

        tts.speak_with("Բարև", 1.0, &other).unwrap();

        assert!(own.played().is_empty());
        assert_eq!(other.played().len(), 1);
    }

    #[test]
    fn test_prefetch_preserves_order() {
        let (tok, synth, sink) = Default::default();
        let tts = tts(TtsConfig { prefetch: true, ..config() }, &tok, &synth, &sink);

        let summary = tts.speak(THREE_CHUNKS, 1.0).unwrap();

        assert_eq!(summary.chunks, 3);
        assert_eq!(sink.played()[0].samples, vec![1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
    }

    #[test]
    fn test_prefetch_tokenizer_failure_plays_nothing() {
        let tok = FakeTokenizer { fail_on: Some(1), ..Default::default() };
        let (synth, sink) = (FakeSynth::default(), RecordingSink::default());
        let tts = tts(TtsConfig { prefetch: true, ..config() }, &tok, &synth, &sink);

        let err = tts.speak(THREE_CHUNKS, 1.0).unwrap_err();

        assert!(matches!(err, SpeakError::Tokenizer { chunk: 1, .. }));
        assert_eq!(tok.calls.lock().unwrap().len(), 2);
        assert!(sink.played().is_empty());
    }

    #[test]
    fn test_prefetch_abort_stays_one_chunk_ahead() {
        let synth = FakeSynth { fail_on: Some(0), ..Default::default() };
        let (tok, sink) = (FakeTokenizer::default(), RecordingSink::default());
        let config = TtsConfig {
            prefetch: true,
            inference_failure: InferenceFailurePolicy::Abort,
            ..config()
        };
        let tts = tts(config, &tok, &synth, &sink);

        let err = tts.speak(THREE_CHUNKS, 1.0).unwrap_err();

        assert!(matches!(err, SpeakError::Inference { chunk: 0, .. }));
        assert_eq!(tok.calls.lock().unwrap().len(), 2, "only the next chunk may be prefetched");
        assert!(sink.played().is_empty());
    }

    #[test]
    fn test_concurrent_speaks_are_serialised() {
        let (tok, synth, sink) = Default::default();
        let tts = Arc::new(tts(config(), &tok, &synth, &sink));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let tts = Arc::clone(&tts);
                thread::spawn(move || tts.speak(THREE_CHUNKS, 1.0).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(synth.max_in_flight.load(Ordering::SeqCst), 1);
        let played = sink.played();
        assert_eq!(played.len(), 4);
        // Each utterance sees three consecutive tokenizer calls.
        for audio in played {
            assert_eq!(audio.samples.len(), 6);
            assert_eq!(audio.samples[2], audio.samples[0] + 1.0);
            assert_eq!(audio.samples[4], audio.samples[0] + 2.0);
        }
    }
}
