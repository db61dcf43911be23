use std::sync::Arc;

use crate::auth::{Authenticator, CredentialHasher};
use crate::background::BackgroundTasks;
use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::middleware::RateLimiterRegistry;
use crate::notify::Notifier;
use crate::store::{TokenStore, UserStore};

/// The shared application state.
///
/// Cloned into every handler and middleware; all members are cheap handles.
#[derive(Clone)]
pub struct AppState {
    /// Fixed for the process lifetime.
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<dyn TokenStore>,
    pub notifier: Arc<dyn Notifier>,
    pub authenticator: Authenticator,
    pub hasher: CredentialHasher,
    /// Per-client token buckets. Its sweep loop is started by the server, not here.
    pub limiter: RateLimiterRegistry,
    pub background: BackgroundTasks,
    pub metrics: Metrics,
}

impl AppState {
    /// Wires the pipeline around one store that serves both users and tokens.
    pub fn new<S>(config: AppConfig, store: Arc<S>, notifier: Arc<dyn Notifier>) -> Self
    where
        S: UserStore + TokenStore + 'static,
    {
        let users: Arc<dyn UserStore> = store.clone();
        let tokens: Arc<dyn TokenStore> = store;
        let metrics = Metrics::new();

        Self {
            authenticator: Authenticator::new(users.clone(), config.store_timeout()),
            limiter: RateLimiterRegistry::new(&config.limiter),
            background: BackgroundTasks::new(metrics.clone()),
            hasher: CredentialHasher::default(),
            config: Arc::new(config),
            users,
            tokens,
            notifier,
            metrics,
        }
    }

    /// Replaces the password hasher (tests use a low bcrypt cost).
    pub fn with_hasher(mut self, hasher: CredentialHasher) -> Self {
        self.hasher = hasher;
        self
    }
}
