//! Wiring from resolved [`Config`] to the core services one command uses.

use anyhow::{Context, Result};
use lostfound_core::config::Config;
use lostfound_core::remote::{HttpBackend, ItemFilter, RemoteItemSource};
use lostfound_core::session::{Session, SessionStore};
use lostfound_core::store::{FileStore, LocalStore};
use lostfound_core::sync::mutator::{MutationContext, OptimisticMutator};
use tracing::debug;

pub type Mutator = OptimisticMutator<HttpBackend, FileStore>;

pub struct App {
    pub config: Config,
    pub mutator: Mutator,
    pub sessions: SessionStore<FileStore>,
    pub session: Option<Session>,
}

impl App {
    /// Open the state directory, restore the session and build the
    /// remote source.
    ///
    /// # Errors
    ///
    /// Fails when the API URL is invalid or the session slot cannot be read.
    pub fn open(config: Config) -> Result<Self> {
        let dir = config.store.resolved_dir();
        debug!(dir = %dir.display(), api = %config.remote.base_url, "opening state");

        let kv = FileStore::new(dir);
        let sessions = SessionStore::new(kv.clone());
        let session = sessions
            .restore(&config.roles)
            .context("Failed to restore session")?;

        let token = config
            .remote
            .token
            .clone()
            .or_else(|| session.as_ref().and_then(|s| s.token.clone()));
        let backend =
            HttpBackend::new(&config.remote.base_url, config.remote.timeout())?.with_token(token);
        let source = RemoteItemSource::new(backend, config.fallback.dataset(), config.remote.timeout());
        let mutator = OptimisticMutator::new(source, LocalStore::new(kv));

        Ok(Self {
            config,
            mutator,
            sessions,
            session,
        })
    }

    /// Mutation context stamped with the session user, when logged in.
    pub fn context(&self, filter: ItemFilter) -> MutationContext {
        let owner = self.session.as_ref().and_then(|s| s.user.id.clone());
        MutationContext::new(filter).with_owner(owner)
    }
}
