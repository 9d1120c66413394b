//! Glue between the trigger detector, the countdown, capture, and the API.
//!
//! When the detector arms, the flow starts capture and the real-time
//! countdown on one shared cancellation token. Expiry creates the incident
//! (exactly once), then uploads the clip keyed by the returned dispatch id.
//! Cancel stops the countdown and the capture together and nothing is sent.

use crate::api::{CreateAck, IncidentApi};
use crate::capture::{AudioSource, CaptureSession};
use crate::trigger::{CountdownOutcome, run_countdown};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// What an armed run ended up doing.
#[derive(Debug, Clone)]
pub enum DispatchReport {
    /// The user cancelled inside the countdown window; nothing was sent.
    Cancelled,
    /// The incident was created. `audio_ref` is present when the clip upload
    /// also succeeded; upload failure never undoes the create.
    Dispatched {
        ack: CreateAck,
        audio_ref: Option<String>,
    },
    /// The create call itself failed.
    CreateFailed(String),
}

/// Orchestrates one armed run per trigger.
pub struct EmergencyFlow {
    api: Arc<dyn IncidentApi>,
    /// Real duration of one countdown unit.
    pub unit: Duration,
    /// Capture budget in samples.
    pub max_capture_samples: usize,
}

/// A running armed window. Dropping the handle does not cancel the run;
/// call [`ArmedHandle::cancel`] (idempotent) to abort it.
pub struct ArmedHandle {
    token: CancellationToken,
    task: JoinHandle<DispatchReport>,
}

impl ArmedHandle {
    /// Abort the countdown and the capture. Safe to call repeatedly, and a
    /// no-op once the countdown has already expired.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Wait for the run to finish and report what happened.
    pub async fn report(self) -> DispatchReport {
        match self.task.await {
            Ok(report) => report,
            Err(err) => DispatchReport::CreateFailed(err.to_string()),
        }
    }
}

impl EmergencyFlow {
    pub fn new(api: Arc<dyn IncidentApi>, unit: Duration, max_capture_samples: usize) -> Self {
        Self {
            api,
            unit,
            max_capture_samples,
        }
    }

    /// Start the armed window: capture begins immediately, the countdown
    /// runs `countdown_units`, and both share one cancellation token.
    pub fn arm(
        &self,
        countdown_units: u32,
        source: Box<dyn AudioSource>,
        position: watch::Receiver<(f64, f64)>,
    ) -> ArmedHandle {
        let token = CancellationToken::new();
        let capture = CaptureSession::start(source, self.max_capture_samples, token.clone());

        let api = self.api.clone();
        let unit = self.unit;
        let run_token = token.clone();
        let task = tokio::spawn(async move {
            let outcome = run_countdown(countdown_units, unit, run_token.clone()).await;
            if outcome == CountdownOutcome::Cancelled {
                // The token already stopped the capture; drain it quietly.
                let _ = capture.finish().await;
                info!("armed window cancelled; nothing sent");
                return DispatchReport::Cancelled;
            }

            // Latest position at dispatch time, (0, 0) when never reported.
            let (latitude, longitude) = *position.borrow();
            let ack = match api.create_incident(latitude, longitude).await {
                Ok(ack) => ack,
                Err(err) => {
                    warn!(error = %err, "incident create failed");
                    return DispatchReport::CreateFailed(err.to_string());
                }
            };
            info!(dispatch_id = %ack.dispatch_id, "incident created");

            // Bound the rest of the recording window, then upload keyed by
            // the dispatch id.
            run_token.cancel();
            let audio_ref = match capture.finish().await {
                Ok(clip) if clip.samples > 0 => {
                    match api.upload_audio(&ack.dispatch_id, clip.wav).await {
                        Ok(audio_ref) => Some(audio_ref),
                        Err(err) => {
                            warn!(dispatch_id = %ack.dispatch_id, error = %err, "audio upload failed");
                            None
                        }
                    }
                }
                Ok(_) => None,
                Err(err) => {
                    warn!(error = %err, "capture failed");
                    None
                }
            };

            DispatchReport::Dispatched { ack, audio_ref }
        });

        ArmedHandle { token, task }
    }
}
