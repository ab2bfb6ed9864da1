//! Connection adapter
//!
//! Owns the single session to the ledger, the application binding on the
//! session's chain, and the listener registry. State lives behind a
//! synchronous lock that is never held across an `.await`; every transition
//! follows check, then replace, then notify.
//!
//! ## Connect flow
//! 1. Ensure the client runtime is initialized
//! 2. Open the session service (faucet) and create a wallet
//! 3. Claim a chain for the caller's identity
//! 4. Build a client bound to the wallet
//!
//! Concurrent connects share one in-flight attempt. `disconnect()` bumps a
//! generation counter so an attempt it overtook can still answer its
//! waiters but never installs its session.

mod execution;
mod listeners;

pub use execution::{GraphQlError, GraphQlRequest, GraphQlResponse};
pub use listeners::{ListenerHandle, ListenerRegistry, StateChangeListener};

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::backend::{
    ApplicationHandle, ApplicationId, ChainHandle, ChainId, ClientFactory, Notification,
    NotificationCallback, NotificationSubscription, RuntimeLoader, SessionHandle,
};
use crate::config::AdapterConfig;
use crate::error::{AdapterError, Result};
use crate::runtime::{RuntimeInitializer, RuntimeStatus};

/// A connected session: claimed chain plus a client bound to the wallet
#[derive(Clone)]
pub struct Session(Arc<SessionState>);

struct SessionState {
    identity: String,
    chain_id: ChainId,
    client: Arc<dyn SessionHandle>,
}

impl Session {
    fn new(identity: String, chain_id: ChainId, client: Arc<dyn SessionHandle>) -> Self {
        Self(Arc::new(SessionState { identity, chain_id, client }))
    }

    /// Normalized (lower-case) caller address
    pub fn identity(&self) -> &str {
        &self.0.identity
    }

    pub fn chain_id(&self) -> &ChainId {
        &self.0.chain_id
    }

    pub fn client(&self) -> &Arc<dyn SessionHandle> {
        &self.0.client
    }

    /// Whether both values are the same session object
    pub fn ptr_eq(a: &Session, b: &Session) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.0.identity)
            .field("chain_id", &self.0.chain_id)
            .finish()
    }
}

/// An application bound on the session's chain
#[derive(Clone)]
pub struct ApplicationBinding(Arc<BindingState>);

struct BindingState {
    application_id: ApplicationId,
    chain: Arc<dyn ChainHandle>,
    application: Arc<dyn ApplicationHandle>,
}

impl ApplicationBinding {
    pub fn application_id(&self) -> &ApplicationId {
        &self.0.application_id
    }

    pub fn chain(&self) -> &Arc<dyn ChainHandle> {
        &self.0.chain
    }

    pub fn application(&self) -> &Arc<dyn ApplicationHandle> {
        &self.0.application
    }

    pub fn ptr_eq(a: &ApplicationBinding, b: &ApplicationBinding) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }
}

impl fmt::Debug for ApplicationBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationBinding")
            .field("application_id", &self.0.application_id)
            .field("chain_id", self.0.chain.chain_id())
            .finish()
    }
}

struct InFlightConnect {
    identity: String,
    sender: broadcast::Sender<Result<Session>>,
}

#[derive(Default)]
struct AdapterState {
    session: Option<Session>,
    binding: Option<ApplicationBinding>,
    /// Chain subscription of the current binding; dropping it unsubscribes
    notifications: Option<NotificationSubscription>,
    in_flight: Option<InFlightConnect>,
    /// Bumped by disconnect() to invalidate in-flight work
    generation: u64,
}

struct AdapterInner {
    config: AdapterConfig,
    factory: Arc<dyn ClientFactory>,
    runtime: RuntimeInitializer,
    listeners: ListenerRegistry,
    state: Mutex<AdapterState>,
    /// Serializes connect_application() so rebinding is check-and-set
    binding_lock: tokio::sync::Mutex<()>,
}

/// Connection adapter for the marketplace application.
///
/// Cheap to clone; clones share the same session and listeners. Construct
/// one per process at the composition root.
///
/// # Example
///
/// ```rust,ignore
/// use job_market_adapter::{AdapterConfig, ConnectionAdapter};
/// use job_market_adapter::backend::http::{HttpClientFactory, HttpRuntimeLoader};
///
/// let config = AdapterConfig::from_env();
/// let adapter = ConnectionAdapter::new(
///     config.clone(),
///     Arc::new(HttpClientFactory::new(&config)),
///     Arc::new(HttpRuntimeLoader::new(&config)),
/// );
///
/// adapter.connect("0xd23e...").await?;
/// adapter.connect_configured_application().await?;
/// let jobs: serde_json::Value = adapter.query(GET_JOBS, None, None).await?;
/// ```
#[derive(Clone)]
pub struct ConnectionAdapter {
    inner: Arc<AdapterInner>,
}

impl ConnectionAdapter {
    pub fn new(
        config: AdapterConfig,
        factory: Arc<dyn ClientFactory>,
        loader: Arc<dyn RuntimeLoader>,
    ) -> Self {
        Self {
            inner: Arc::new(AdapterInner {
                config,
                factory,
                runtime: RuntimeInitializer::new(loader),
                listeners: ListenerRegistry::new(),
                state: Mutex::new(AdapterState::default()),
                binding_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.inner.config
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Connect as `identity` using the configured faucet
    pub async fn connect(&self, identity: &str) -> Result<Session> {
        self.connect_with_endpoint(identity, None).await
    }

    /// Connect as `identity`, optionally overriding the faucet endpoint.
    ///
    /// Returns the live session when it already belongs to `identity`
    /// (case-insensitive). Joins any connection already in flight. Fails
    /// with [`AdapterError::SessionActive`] while another identity is
    /// connected.
    pub async fn connect_with_endpoint(
        &self,
        identity: &str,
        endpoint: Option<&str>,
    ) -> Result<Session> {
        let identity = normalize_identity(identity)?;

        let mut rx = {
            let mut state = self.inner.state.lock();

            if let Some(ref session) = state.session {
                if session.identity() == identity {
                    debug!(identity = %identity, "Reusing existing session");
                    return Ok(session.clone());
                }
                return Err(AdapterError::SessionActive {
                    current: session.identity().to_string(),
                    requested: identity,
                });
            }

            let joined = state
                .in_flight
                .as_ref()
                .map(|pending| (pending.identity.clone(), pending.sender.subscribe()));

            match joined {
                Some((in_flight, rx)) => {
                    if in_flight != identity {
                        warn!(
                            in_flight = %in_flight,
                            requested = %identity,
                            "Joining connection already in flight for another identity"
                        );
                    }
                    rx
                }
                None => {
                    let (tx, rx) = broadcast::channel(1);
                    state.in_flight = Some(InFlightConnect {
                        identity: identity.clone(),
                        sender: tx.clone(),
                    });
                    let generation = state.generation;
                    drop(state);

                    self.spawn_connect(identity, endpoint.map(str::to_string), generation, tx);
                    rx
                }
            }
        };

        match rx.recv().await {
            Ok(outcome) => outcome,
            Err(_) => Err(AdapterError::Network("connection attempt aborted".into())),
        }
    }

    fn spawn_connect(
        &self,
        identity: String,
        endpoint: Option<String>,
        generation: u64,
        sender: broadcast::Sender<Result<Session>>,
    ) {
        let inner = Arc::clone(&self.inner);
        let mut guard = ConnectGuard {
            inner: Arc::clone(&inner),
            generation,
            finished: false,
        };

        tokio::spawn(async move {
            let outcome = inner.establish_session(&identity, endpoint.as_deref()).await;
            guard.finish(&outcome);
            let _ = sender.send(outcome);
        });
    }

    /// Drop the session, the binding and any in-flight connection
    pub fn disconnect(&self) {
        let (session, binding, notifications) = {
            let mut state = self.inner.state.lock();
            state.generation += 1;
            state.in_flight = None;
            (
                state.session.take(),
                state.binding.take(),
                state.notifications.take(),
            )
        };

        drop(notifications);
        if let Some(session) = session {
            info!(
                identity = %session.identity(),
                application = ?binding.as_ref().map(|b| b.application_id().to_string()),
                "Disconnected"
            );
        }

        self.inner.listeners.notify();
    }

    // =========================================================================
    // Application binding
    // =========================================================================

    /// Bind the configured application id
    pub async fn connect_configured_application(&self) -> Result<ApplicationBinding> {
        let application_id = self.inner.config.application_id.clone().ok_or_else(|| {
            AdapterError::Config("no application id configured (LINERA_APPLICATION_ID)".into())
        })?;
        self.connect_application(&application_id).await
    }

    /// Bind `application_id` on the session's chain.
    ///
    /// Rebinding the current application returns the existing binding.
    pub async fn connect_application(&self, application_id: &str) -> Result<ApplicationBinding> {
        let _lock = self.inner.binding_lock.lock().await;

        let (session, generation) = {
            let state = self.inner.state.lock();
            let session = state.session.clone().ok_or(AdapterError::NotConnected)?;
            (session, state.generation)
        };

        let application_id = application_id.trim();
        if application_id.is_empty() {
            return Err(AdapterError::Config("application id must not be empty".into()));
        }
        let application_id = ApplicationId(application_id.to_string());

        if let Some(binding) = self.binding() {
            if binding.application_id() == &application_id {
                debug!(application = %application_id, "Reusing existing application binding");
                return Ok(binding);
            }
        }

        info!(
            application = %application_id,
            chain = %session.chain_id(),
            "Binding application"
        );
        let (outcome, subscription) =
            match self.inner.bind_application(&session, &application_id).await {
                Ok((binding, subscription)) => (Ok(binding), Some(subscription)),
                Err(e) => (Err(e), None),
            };

        let replaced = {
            let mut state = self.inner.state.lock();
            let current = state
                .session
                .as_ref()
                .is_some_and(|s| Session::ptr_eq(s, &session));
            if state.generation != generation || !current {
                warn!(application = %application_id, "Session changed while binding, discarding");
                return Err(AdapterError::NotConnected);
            }

            state.binding = outcome.as_ref().ok().cloned();
            std::mem::replace(&mut state.notifications, subscription)
        };
        drop(replaced);

        self.inner.listeners.notify();

        match outcome {
            Ok(binding) => {
                info!(application = %application_id, "Application bound");
                Ok(binding)
            }
            Err(e) => {
                error!(application = %application_id, error = %e, "Application binding failed");
                Err(e)
            }
        }
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    /// Register a state-change listener
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> ListenerHandle {
        self.inner.listeners.subscribe(listener)
    }

    /// Notify every listener
    pub fn notify(&self) {
        self.inner.listeners.notify();
    }

    // =========================================================================
    // Getters
    // =========================================================================

    pub fn is_connected(&self) -> bool {
        self.inner.state.lock().session.is_some()
    }

    pub fn is_application_connected(&self) -> bool {
        self.inner.state.lock().binding.is_some()
    }

    /// Normalized address of the connected identity
    pub fn address(&self) -> Option<String> {
        self.session().map(|s| s.identity().to_string())
    }

    pub fn chain_id(&self) -> Option<ChainId> {
        self.session().map(|s| s.chain_id().clone())
    }

    pub fn application_id(&self) -> Option<ApplicationId> {
        self.binding().map(|b| b.application_id().clone())
    }

    pub fn session(&self) -> Option<Session> {
        self.inner.state.lock().session.clone()
    }

    pub fn binding(&self) -> Option<ApplicationBinding> {
        self.inner.state.lock().binding.clone()
    }

    pub fn runtime_status(&self) -> RuntimeStatus {
        self.inner.runtime.status()
    }
}

impl AdapterInner {
    async fn establish_session(&self, identity: &str, endpoint: Option<&str>) -> Result<Session> {
        self.runtime.ensure_ready().await?;

        let endpoint = endpoint.unwrap_or(&self.config.faucet_url);
        info!(identity = %identity, endpoint = %endpoint, "Connecting to session service");

        let service = self.factory.open_session_service(endpoint).await?;
        let wallet = service.create_wallet().await?;
        let chain_id = service.claim_chain(&wallet, identity).await?;
        debug!(identity = %identity, chain = %chain_id, "Chain claimed");

        let client = self.factory.create_client(wallet).await?;
        Ok(Session::new(identity.to_string(), chain_id, client))
    }

    async fn bind_application(
        &self,
        session: &Session,
        application_id: &ApplicationId,
    ) -> Result<(ApplicationBinding, NotificationSubscription)> {
        let chain = session.client().chain(session.chain_id()).await?;
        let application = chain.application(application_id).await?;

        let listeners = self.listeners.clone();
        let chain_id = chain.chain_id().clone();
        let callback: NotificationCallback = Arc::new(move |notification: Notification| {
            if notification.is_new_block() {
                debug!(chain = %chain_id, ?notification, "New block");
                listeners.notify();
            }
        });
        let subscription = chain.on_notification(callback).await?;

        let binding = ApplicationBinding(Arc::new(BindingState {
            application_id: application_id.clone(),
            chain,
            application,
        }));
        Ok((binding, subscription))
    }
}

/// Installs a connect attempt's outcome unless disconnect() overtook it.
struct ConnectGuard {
    inner: Arc<AdapterInner>,
    generation: u64,
    finished: bool,
}

impl ConnectGuard {
    fn finish(&mut self, outcome: &Result<Session>) {
        self.finished = true;

        let installed = {
            let mut state = self.inner.state.lock();
            if state.generation != self.generation {
                false
            } else {
                state.in_flight = None;
                state.session = outcome.as_ref().ok().cloned();
                true
            }
        };

        match outcome {
            Ok(session) if installed => {
                info!(identity = %session.identity(), chain = %session.chain_id(), "Connected");
            }
            Ok(session) => {
                debug!(identity = %session.identity(), "Connection finished after disconnect, discarded");
            }
            Err(e) => {
                error!(error = %e, "Connection failed");
            }
        }

        if installed {
            self.inner.listeners.notify();
        }
    }
}

impl Drop for ConnectGuard {
    fn drop(&mut self) {
        if !self.finished {
            let mut state = self.inner.state.lock();
            if state.generation == self.generation {
                state.in_flight = None;
                state.session = None;
            }
        }
    }
}

/// Trim and lower-case an address; empty input is a configuration error
fn normalize_identity(identity: &str) -> Result<String> {
    let identity = identity.trim();
    if identity.is_empty() {
        return Err(AdapterError::Config("identity must not be empty".into()));
    }
    Ok(identity.to_lowercase())
}
