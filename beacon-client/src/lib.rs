//! # Beacon Client
//!
//! Device-side library for the Beacon dispatch service: the covert trigger
//! detector that lives behind a calculator-style keypad, the bounded audio
//! capture started while armed, the HTTP API client, the reconnecting
//! realtime channel, and the flow that glues them together.

pub mod api;
pub mod capture;
pub mod error;
pub mod flow;
pub mod realtime;
pub mod trigger;

pub use api::{ApiClient, CreateAck, IncidentApi};
pub use capture::{AudioSource, CaptureSession, CapturedClip};
pub use error::ClientError;
pub use flow::{ArmedHandle, DispatchReport, EmergencyFlow};
pub use realtime::{ChannelConnection, ChannelTransport, RealtimeClient, ReconnectPolicy};
pub use trigger::{
    CountdownOutcome, TriggerConfig, TriggerDetector, TriggerEvent, TriggerState, run_countdown,
};
