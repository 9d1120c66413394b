//! Shared application context.
//!
//! One explicit handle owning the store, directory, room registry, token
//! authority, and services, passed through axum state — no module-level
//! mutable singletons.

use crate::config::BeaconConfig;
use crate::directory::{ResponderDirectory, ResponderLookup};
use crate::dispatch::{AudioAttachService, GeoDispatchNotifier, IncidentCreateService, IncidentStatusMachine};
use crate::error::Result;
use crate::gateway::{Rooms, TokenAuthority};
use crate::media::MediaStore;
use crate::store::IncidentStore;
use std::sync::Arc;

/// Everything a request handler needs, built once at startup.
pub struct AppContext {
    pub config: BeaconConfig,
    pub store: IncidentStore,
    pub directory: Arc<ResponderDirectory>,
    pub rooms: Rooms,
    pub auth: TokenAuthority,
    pub create: IncidentCreateService,
    pub status: IncidentStatusMachine,
    pub audio: AudioAttachService,
}

impl AppContext {
    /// Assemble a context from already-opened components. Used by tests and
    /// by [`AppContext::from_config`].
    pub fn assemble(
        config: BeaconConfig,
        store: IncidentStore,
        directory: Arc<ResponderDirectory>,
        auth: TokenAuthority,
    ) -> Arc<Self> {
        let rooms = Rooms::new();
        let media = MediaStore::new(config.media.media_dir.clone());
        let lookup: Arc<dyn ResponderLookup> = directory.clone();
        let notifier =
            GeoDispatchNotifier::new(lookup, rooms.clone(), config.dispatch.max_distance_m);
        let create = IncidentCreateService::new(store.clone(), rooms.clone(), notifier);
        let status = IncidentStatusMachine::new(store.clone(), rooms.clone());
        let audio = AudioAttachService::new(store.clone(), rooms.clone(), media);

        Arc::new(Self {
            config,
            store,
            directory,
            rooms,
            auth,
            create,
            status,
            audio,
        })
    }

    /// Open the store and directory from configuration and assemble.
    pub fn from_config(config: BeaconConfig) -> Result<Arc<Self>> {
        let store = IncidentStore::open(&config.database.path)?;
        let directory = Arc::new(ResponderDirectory::open(&config.database.path)?);
        let auth = TokenAuthority::from_config(&config.auth);
        Ok(Self::assemble(config, store, directory, auth))
    }
}
