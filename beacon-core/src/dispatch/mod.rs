//! # Incident Dispatch Pipeline
//!
//! Create-then-notify: a create commits to the store and is acknowledged
//! before any fan-out work runs. Notification happens in a detached task
//! whose failures are contained and logged — they never undo or fail the
//! create. Status changes and audio attachments write through the store and
//! push events to the responder room and the owner's personal room.

mod audio;
mod create;
mod notify;
mod status;

pub use audio::AudioAttachService;
pub use create::IncidentCreateService;
pub use notify::{DispatchOutcome, GeoDispatchNotifier};
pub use status::IncidentStatusMachine;
