//! Reconnecting client for the push channel.
//!
//! The transport itself (the actual socket) sits behind a trait; this module
//! owns the policy: bounded reconnect attempts with linear backoff, and
//! re-subscribing to tracked incident rooms after every reconnect. There is
//! no replay on the channel — after reconnecting, callers pull current state
//! over REST before trusting pushed deltas.

use crate::error::ClientError;
use async_trait::async_trait;
use beacon_core::gateway::{ClientMessage, PushEvent};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// One live connection to the gateway.
#[async_trait]
pub trait ChannelConnection: Send {
    async fn send(&mut self, msg: ClientMessage) -> Result<(), ClientError>;

    /// The next pushed event, or `None` when the connection is gone.
    async fn recv(&mut self) -> Option<PushEvent>;
}

/// Connection factory — each call is one connection attempt.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn ChannelConnection>, ClientError>;
}

/// Bounded linear backoff: attempt `n` (1-based) waits `n * base_delay`
/// before dialing, up to `max_attempts` dials in total.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the given 1-based attempt. The first attempt is
    /// immediate.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt.saturating_sub(1)
    }
}

/// Push-channel client with automatic reconnection.
pub struct RealtimeClient {
    transport: Arc<dyn ChannelTransport>,
    policy: ReconnectPolicy,
    /// Incident rooms this client wants to stay subscribed to across
    /// reconnects.
    joined_incidents: BTreeSet<String>,
}

impl RealtimeClient {
    pub fn new(transport: Arc<dyn ChannelTransport>, policy: ReconnectPolicy) -> Self {
        Self {
            transport,
            policy,
            joined_incidents: BTreeSet::new(),
        }
    }

    /// Dial until connected or attempts are exhausted, then re-subscribe to
    /// every tracked incident room.
    pub async fn connect(&mut self) -> Result<Box<dyn ChannelConnection>, ClientError> {
        let mut last_error = None;
        for attempt in 1..=self.policy.max_attempts {
            let delay = self.policy.delay_for(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match self.transport.connect().await {
                Ok(mut conn) => {
                    debug!(attempt, "channel connected");
                    for dispatch_id in &self.joined_incidents {
                        conn.send(ClientMessage::JoinIncidentRoom {
                            dispatch_id: dispatch_id.clone(),
                        })
                        .await?;
                    }
                    return Ok(conn);
                }
                Err(err) => {
                    warn!(attempt, error = %err, "channel connect failed");
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or(ClientError::ReconnectExhausted {
            attempts: self.policy.max_attempts,
        }))
    }

    /// Subscribe to an incident's live-location stream on the given
    /// connection and remember it for future reconnects.
    pub async fn join_incident(
        &mut self,
        conn: &mut dyn ChannelConnection,
        dispatch_id: &str,
    ) -> Result<(), ClientError> {
        conn.send(ClientMessage::JoinIncidentRoom {
            dispatch_id: dispatch_id.to_string(),
        })
        .await?;
        self.joined_incidents.insert(dispatch_id.to_string());
        Ok(())
    }

    /// Rooms currently tracked for re-subscription.
    pub fn joined_incidents(&self) -> impl Iterator<Item = &str> {
        self.joined_incidents.iter().map(String::as_str)
    }
}
