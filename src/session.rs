//! Lazy session establishment and idle-disconnect for connection-oriented
//! backends.
//!
//! A [`SessionManager`] holds at most one live session per file system.
//! Every operation follows the same protocol: stop the idle timer, acquire
//! the session (connecting on demand under the `connect_timeout` budget),
//! do the work, re-arm the timer. When the timer fires the session and its
//! transport are closed and the cached reference is cleared; the next
//! operation reconnects transparently.

use crate::authority::Authority;
use crate::errors::{Error, ErrorKind, Operation, Result};
use crate::options::FsOptions;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::debug;

/// Session constructor and destructor for one backend protocol.
///
/// `connect` must perform the full dial + handshake + authentication
/// exchange; the manager enforces the `connect_timeout` budget around it.
/// A failed `connect` caches nothing: the failure state is inexpressible
/// as a session, so a stale reference can never be invoked.
#[async_trait]
pub trait Connect: Send + Sync + 'static {
    /// The live, authenticated session type.
    type Session: Send + Sync + 'static;

    /// Establishes a session: TCP dial, protocol handshake and
    /// authentication, in one budgeted call.
    async fn connect(&self, authority: &Authority) -> Result<Self::Session>;

    /// Closes a session and its transport. Must not fail loudly; the
    /// session may already be half-dead.
    async fn disconnect(&self, session: Arc<Self::Session>);
}

/// Shared session state plus the idle-disconnect timer.
pub struct SessionManager<C: Connect> {
    connector: Arc<C>,
    session: Arc<AsyncMutex<Option<Arc<C::Session>>>>,
    timer: Arc<Mutex<Option<JoinHandle<()>>>>,
    idle_window: Duration,
    connect_budget: Duration,
}

impl<C: Connect> Clone for SessionManager<C> {
    fn clone(&self) -> Self {
        SessionManager {
            connector: self.connector.clone(),
            session: self.session.clone(),
            timer: self.timer.clone(),
            idle_window: self.idle_window,
            connect_budget: self.connect_budget,
        }
    }
}

impl<C: Connect> std::fmt::Debug for SessionManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("idle_window", &self.idle_window)
            .field("connect_budget", &self.connect_budget)
            .finish()
    }
}

impl<C: Connect> SessionManager<C> {
    /// Creates a manager around `connector`, taking the idle window and
    /// connect budget from `options`.
    pub fn new(connector: C, options: &FsOptions) -> SessionManager<C> {
        SessionManager {
            connector: Arc::new(connector),
            session: Arc::new(AsyncMutex::new(None)),
            timer: Arc::new(Mutex::new(None)),
            idle_window: options.auto_disconnect_window(),
            connect_budget: options.connect_budget(),
        }
    }

    /// Returns the shared session, connecting when none is cached.
    ///
    /// Cancels any armed idle timer first. Safe for concurrent callers
    /// during a failure storm: attempts serialize on the session slot,
    /// every caller sees an error and nothing broken is cached.
    pub async fn client(&self, authority: &Authority) -> Result<Arc<C::Session>> {
        self.timer_stop();

        let mut slot = self.session.lock().await;
        if let Some(session) = slot.as_ref() {
            return Ok(session.clone());
        }

        debug!(%authority, "establishing backend session");
        let session = match tokio::time::timeout(self.connect_budget, self.connector.connect(authority)).await {
            Ok(Ok(session)) => Arc::new(session),
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(Error::new(
                    Operation::Connect,
                    ErrorKind::Connection,
                    format!("connect to {authority} exceeded the {:?} budget", self.connect_budget),
                ));
            }
        };
        *slot = Some(session.clone());
        Ok(session)
    }

    /// Arms the one-shot idle timer, replacing any previous one. On fire
    /// the cached session and its transport are closed and the slot is
    /// cleared; an empty slot makes the fire a no-op.
    pub fn timer_start(&self) {
        let mut guard = self.timer.lock().unwrap();
        if let Some(handle) = guard.take() {
            handle.abort();
        }
        let slot = self.session.clone();
        let connector = self.connector.clone();
        let window = self.idle_window;
        *guard = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let taken = slot.lock().await.take();
            if let Some(session) = taken {
                debug!("idle window elapsed, closing backend session");
                connector.disconnect(session).await;
            }
        }));
    }

    /// Cancels and clears the idle timer.
    pub fn timer_stop(&self) {
        if let Some(handle) = self.timer.lock().unwrap().take() {
            handle.abort();
        }
    }

    /// True while a session is cached. Test support.
    pub async fn live(&self) -> bool {
        self.session.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct CountingConnector {
        connects: AtomicUsize,
        disconnects: AtomicUsize,
        fail: bool,
        delay: Duration,
    }

    impl CountingConnector {
        fn new() -> Self {
            CountingConnector {
                connects: AtomicUsize::new(0),
                disconnects: AtomicUsize::new(0),
                fail: false,
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl Connect for Arc<CountingConnector> {
        type Session = u64;

        async fn connect(&self, _authority: &Authority) -> Result<u64> {
            tokio::time::sleep(self.delay).await;
            let n = self.connects.fetch_add(1, Ordering::SeqCst) as u64;
            if self.fail {
                return Err(Error::bare(Operation::Connect, ErrorKind::Connection));
            }
            Ok(n)
        }

        async fn disconnect(&self, _session: Arc<u64>) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn manager(connector: Arc<CountingConnector>, idle_secs: u64) -> SessionManager<Arc<CountingConnector>> {
        let opts = FsOptions::new().with_auto_disconnect(idle_secs).with_connect_timeout(2);
        SessionManager::new(connector, &opts)
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timer_reclaims_and_reconnects() {
        let connector = Arc::new(CountingConnector::new());
        let mgr = manager(connector.clone(), 1);
        let authority = Authority::parse("u@h:22").unwrap();

        // Two back-to-back operations share one session.
        let _ = mgr.client(&authority).await.unwrap();
        mgr.timer_start();
        let _ = mgr.client(&authority).await.unwrap();
        mgr.timer_start();
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);

        // Let the idle window elapse; the third operation reconnects.
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!mgr.live().await);
        assert_eq!(connector.disconnects.load(Ordering::SeqCst), 1);

        let _ = mgr.client(&authority).await.unwrap();
        assert_eq!(connector.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn client_cancels_armed_timer() {
        let connector = Arc::new(CountingConnector::new());
        let mgr = manager(connector.clone(), 1);
        let authority = Authority::parse("u@h").unwrap();

        let _ = mgr.client(&authority).await.unwrap();
        mgr.timer_start();

        // Re-acquire before the window elapses, then wait past it: the
        // stopped timer must not fire.
        tokio::time::sleep(Duration::from_millis(500)).await;
        let _ = mgr.client(&authority).await.unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert!(mgr.live().await);
        assert_eq!(connector.disconnects.load(Ordering::SeqCst), 0);
        assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_failure_storm() {
        let mut inner = CountingConnector::new();
        inner.fail = true;
        let connector = Arc::new(inner);
        let mgr = manager(connector.clone(), 10);
        let authority = Authority::parse("u@unreachable:22").unwrap();

        let mut tasks = Vec::new();
        for _ in 0..10 {
            let mgr = mgr.clone();
            let authority = authority.clone();
            tasks.push(tokio::spawn(async move { mgr.client(&authority).await.map(|_| ()) }));
        }
        for task in tasks {
            let result = task.await.unwrap();
            assert!(result.is_err());
        }
        assert!(!mgr.live().await);

        // Arming the timer on the failed state never touches a session.
        mgr.timer_start();
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(connector.disconnects.load(Ordering::SeqCst), 0);

        // The manager stays usable once the host is reachable.
        let recovered = Arc::new(CountingConnector::new());
        let mgr = manager(recovered.clone(), 10);
        assert!(mgr.client(&authority).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn connect_budget_is_enforced() {
        let mut inner = CountingConnector::new();
        inner.delay = Duration::from_secs(60);
        let connector = Arc::new(inner);
        let mgr = manager(connector, 10);
        let authority = Authority::parse("u@192.0.2.1:22").unwrap();

        let started = tokio::time::Instant::now();
        let err = mgr.client(&authority).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
        assert!(started.elapsed() <= Duration::from_secs(5));
    }
}
