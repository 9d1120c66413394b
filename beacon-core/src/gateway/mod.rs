//! # Realtime Gateway
//!
//! Authenticated, room-based push transport plus the REST surface. Each
//! WebSocket connection presents a bearer credential at handshake, joins its
//! personal room (and the shared responder room for responders), and receives
//! incident events as they happen. Delivery is best-effort with no replay —
//! late-connecting clients pull current state over REST first.

mod auth;
mod events;
mod rooms;
mod server;

pub use auth::{AccessClaims, TokenAuthority};
pub use events::{ClientMessage, PushEvent};
pub use rooms::{RESPONDER_ROOM, Rooms, incident_room, personal_room};
pub use server::{router, run};
