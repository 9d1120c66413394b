//! Bounded audio capture for the countdown window.
//!
//! Capture starts when the trigger detector arms and stops at a fixed
//! sample budget or on cancel, whichever first. It runs independently of the
//! create call: the finished clip is keyed by dispatch id only at upload
//! time. Device I/O stays behind the [`AudioSource`] trait; the session only
//! accumulates PCM and encodes WAV.

use crate::error::ClientError;
use async_trait::async_trait;
use std::io::Cursor;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A pull-based source of mono PCM audio.
#[async_trait]
pub trait AudioSource: Send {
    /// The next chunk of samples, or `None` when the source is exhausted.
    async fn next_chunk(&mut self) -> Option<Vec<i16>>;

    /// Sample rate of the produced PCM.
    fn sample_rate(&self) -> u32;
}

/// A finished clip, ready for upload.
#[derive(Debug, Clone)]
pub struct CapturedClip {
    /// WAV-encoded bytes (16-bit mono).
    pub wav: Vec<u8>,
    pub sample_rate: u32,
    pub samples: usize,
}

impl CapturedClip {
    /// Clip length in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples as f64 / self.sample_rate as f64
    }
}

/// A running capture. Stops at the sample budget or when the shared
/// cancellation token fires — the same token the countdown driver uses, so
/// one cancel deterministically stops both.
pub struct CaptureSession {
    handle: JoinHandle<(Vec<i16>, u32)>,
    token: CancellationToken,
}

impl CaptureSession {
    /// Start capturing from `source`, bounded by `max_samples`.
    pub fn start(
        mut source: Box<dyn AudioSource>,
        max_samples: usize,
        token: CancellationToken,
    ) -> Self {
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            let sample_rate = source.sample_rate();
            let mut samples: Vec<i16> = Vec::new();
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    chunk = source.next_chunk() => {
                        let Some(chunk) = chunk else { break };
                        samples.extend_from_slice(&chunk);
                        if samples.len() >= max_samples {
                            samples.truncate(max_samples);
                            break;
                        }
                    }
                }
            }
            debug!(samples = samples.len(), "capture finished");
            (samples, sample_rate)
        });
        Self { handle, token }
    }

    /// Stop capturing. Idempotent; also fired by the shared countdown token.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Wait for the capture task and encode whatever was recorded.
    pub async fn finish(self) -> Result<CapturedClip, ClientError> {
        let (samples, sample_rate) = self
            .handle
            .await
            .map_err(|e| ClientError::Capture(e.to_string()))?;
        encode_wav(&samples, sample_rate)
    }
}

/// Encode 16-bit mono PCM as WAV.
fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<CapturedClip, ClientError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| ClientError::Capture(e.to_string()))?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| ClientError::Capture(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| ClientError::Capture(e.to_string()))?;
    }
    Ok(CapturedClip {
        wav: cursor.into_inner(),
        sample_rate,
        samples: samples.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Emits fixed-size chunks forever (until cancelled) with a small yield
    /// between chunks so cancellation points are exercised.
    struct ToneSource {
        sample_rate: u32,
        chunk: Vec<i16>,
    }

    impl ToneSource {
        fn new(sample_rate: u32, chunk_len: usize) -> Self {
            Self {
                sample_rate,
                chunk: (0..chunk_len).map(|i| (i % 128) as i16).collect(),
            }
        }
    }

    #[async_trait]
    impl AudioSource for ToneSource {
        async fn next_chunk(&mut self) -> Option<Vec<i16>> {
            tokio::task::yield_now().await;
            Some(self.chunk.clone())
        }

        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }
    }

    /// Emits a fixed number of chunks then runs dry.
    struct FiniteSource {
        remaining: usize,
    }

    #[async_trait]
    impl AudioSource for FiniteSource {
        async fn next_chunk(&mut self) -> Option<Vec<i16>> {
            if self.remaining == 0 {
                return None;
            }
            self.remaining -= 1;
            Some(vec![1i16; 100])
        }

        fn sample_rate(&self) -> u32 {
            16_000
        }
    }

    #[tokio::test]
    async fn test_capture_stops_at_sample_budget() {
        let session = CaptureSession::start(
            Box::new(ToneSource::new(16_000, 480)),
            1_000,
            CancellationToken::new(),
        );
        let clip = session.finish().await.unwrap();
        assert_eq!(clip.samples, 1_000);
        assert_eq!(clip.sample_rate, 16_000);
        // RIFF header plus 2 bytes per sample.
        assert_eq!(clip.wav.len(), 44 + 2_000);
    }

    #[tokio::test]
    async fn test_capture_cancel_keeps_partial_clip() {
        let token = CancellationToken::new();
        let session = CaptureSession::start(
            Box::new(ToneSource::new(16_000, 480)),
            usize::MAX,
            token.clone(),
        );
        // Let a few chunks land, then cancel.
        tokio::task::yield_now().await;
        token.cancel();

        let clip = session.finish().await.unwrap();
        assert!(clip.samples < 1_000_000);
    }

    #[tokio::test]
    async fn test_capture_stop_is_idempotent() {
        let session = CaptureSession::start(
            Box::new(ToneSource::new(16_000, 480)),
            usize::MAX,
            CancellationToken::new(),
        );
        session.stop();
        session.stop();
        let clip = session.finish().await.unwrap();
        assert!(clip.wav.len() >= 44);
    }

    #[tokio::test]
    async fn test_capture_source_exhaustion_ends_clip() {
        let session = CaptureSession::start(
            Box::new(FiniteSource { remaining: 3 }),
            usize::MAX,
            CancellationToken::new(),
        );
        let clip = session.finish().await.unwrap();
        assert_eq!(clip.samples, 300);
    }

    #[tokio::test]
    async fn test_clip_duration() {
        let session = CaptureSession::start(
            Box::new(ToneSource::new(8_000, 400)),
            16_000,
            CancellationToken::new(),
        );
        let clip = session.finish().await.unwrap();
        assert_eq!(clip.duration_secs(), 2.0);
    }

    #[test]
    fn test_encode_wav_header() {
        let clip = encode_wav(&[0i16; 10], 16_000).unwrap();
        assert_eq!(&clip.wav[0..4], b"RIFF");
        assert_eq!(&clip.wav[8..12], b"WAVE");
    }
}
