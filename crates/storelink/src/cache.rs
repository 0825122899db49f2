//! Resilient connection cache
//!
//! One long-lived handle per configuration fingerprint, shared by every
//! concurrent caller and replaced the first time an operation against it fails:
//! - Read-locked fast path; misses serialize on a per-fingerprint dial gate
//!   with a mandatory re-check, so concurrent misses for the same fingerprint
//!   dial exactly once while other fingerprints stay unaffected
//! - Generation-tagged leases so a stale caller never evicts a replacement
//! - Retry-exactly-once policy in [`ConnectionCache::with_connection`]
//! - Optional liveness probe that replaces dead handles without caller traffic
//!
//! # Example
//!
//! ```rust,ignore
//! use storelink::prelude::*;
//!
//! let cache = ConnectionCache::new(MySqlDialer, CacheOptions::default())?;
//! let rows = cache
//!     .with_connection(&config, |conn| async move { conn.query("SELECT 1", &[]).await })
//!     .await?;
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{BackendConfig, BackendKind, CacheOptions, PoolSettings};
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;

/// Seam to a wrapped client library: how to open, close and probe a handle
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    /// Configuration type identifying a connection target
    type Config: BackendConfig;

    /// Live connection/client object; must be safe for concurrent use
    type Handle: Send + Sync + 'static;

    /// Backend kind this dialer connects to
    fn backend(&self) -> BackendKind;

    /// Establish a new handle, applying the pool sizing knobs
    async fn dial(&self, config: &Self::Config, pool: &PoolSettings) -> Result<Self::Handle>;

    /// Release a handle that has been removed from the cache
    async fn close(&self, handle: &Self::Handle) -> Result<()>;

    /// Cheap liveness check used by the health probe
    async fn ping(&self, _handle: &Self::Handle) -> Result<()> {
        Ok(())
    }
}

/// A shared handle borrowed from the cache
///
/// Remembers the fingerprint and generation it was issued for, so that
/// invalidating through a lease only evicts that exact handle.
pub struct Lease<H> {
    handle: Arc<H>,
    fingerprint: Fingerprint,
    generation: u64,
}

impl<H> Lease<H> {
    /// Fingerprint of the configuration this handle serves
    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// Generation of the cache entry this lease came from
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Shared pointer to the handle
    pub fn handle(&self) -> &Arc<H> {
        &self.handle
    }
}

impl<H> Clone for Lease<H> {
    fn clone(&self) -> Self {
        Self {
            handle: Arc::clone(&self.handle),
            fingerprint: self.fingerprint,
            generation: self.generation,
        }
    }
}

impl<H> std::ops::Deref for Lease<H> {
    type Target = H;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl<H> std::fmt::Debug for Lease<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("fingerprint", &self.fingerprint)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Cache entry owned exclusively by the cache
struct Entry<C, H> {
    handle: Arc<H>,
    generation: u64,
    config: C,
    created_at: Instant,
}

impl<C, H> Entry<C, H> {
    fn lease(&self, fingerprint: Fingerprint) -> Lease<H> {
        Lease {
            handle: Arc::clone(&self.handle),
            fingerprint,
            generation: self.generation,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Handles successfully dialed
    pub dials: u64,
    /// Dial attempts that failed or timed out
    pub dial_failures: u64,
    /// Acquisitions served from the fast path
    pub hits: u64,
    /// Acquisitions that missed the fast path
    pub misses: u64,
    /// Entries removed after a failure
    pub invalidations: u64,
    /// Handles closed
    pub closes: u64,
    /// Second attempts made by `with_connection`
    pub retries: u64,
    /// Failed liveness probes
    pub probe_failures: u64,
}

/// Atomic cache stats for concurrent updates
#[derive(Debug, Default)]
#[allow(missing_docs)]
pub struct AtomicCacheStats {
    pub dials: AtomicU64,
    pub dial_failures: AtomicU64,
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub invalidations: AtomicU64,
    pub closes: AtomicU64,
    pub retries: AtomicU64,
    pub probe_failures: AtomicU64,
}

impl AtomicCacheStats {
    /// Record a dial
    pub fn record_dial(&self) {
        self.dials.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a dial failure
    pub fn record_dial_failure(&self) {
        self.dial_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a hit
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a miss
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an invalidation
    pub fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a close
    pub fn record_close(&self) {
        self.closes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a retry
    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a probe failure
    pub fn record_probe_failure(&self) {
        self.probe_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot current stats
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            dials: self.dials.load(Ordering::Relaxed),
            dial_failures: self.dial_failures.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            closes: self.closes.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            probe_failures: self.probe_failures.load(Ordering::Relaxed),
        }
    }
}

/// Fingerprint-keyed cache of live handles for one backend kind
pub struct ConnectionCache<D: Dialer> {
    dialer: D,
    options: CacheOptions,
    entries: RwLock<HashMap<Fingerprint, Entry<D::Config, D::Handle>>>,
    // One gate per fingerprint ever dialed; the map lock is held only to look one up.
    dial_gates: Mutex<HashMap<Fingerprint, Arc<Mutex<()>>>>,
    next_generation: AtomicU64,
    stats: AtomicCacheStats,
}

impl<D: Dialer> ConnectionCache<D> {
    /// Create an empty cache; rejects zero deadlines or probe interval
    pub fn new(dialer: D, options: CacheOptions) -> Result<Self> {
        options.check()?;
        Ok(Self {
            dialer,
            options,
            entries: RwLock::new(HashMap::new()),
            dial_gates: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
            stats: AtomicCacheStats::default(),
        })
    }

    /// The dialer this cache opens handles with
    pub fn dialer(&self) -> &D {
        &self.dialer
    }

    /// Cache options
    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Get the handle for `config`, dialing it on first use
    pub async fn acquire(&self, config: &D::Config) -> Result<Lease<D::Handle>> {
        let fingerprint = config.fingerprint();

        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(&fingerprint) {
                self.stats.record_hit();
                debug!(fingerprint = %fingerprint.short(), generation = entry.generation, "cache hit");
                return Ok(entry.lease(fingerprint));
            }
        }

        self.stats.record_miss();
        let gate = {
            let mut gates = self.dial_gates.lock().await;
            Arc::clone(gates.entry(fingerprint).or_default())
        };
        let _dialing = gate.lock().await;

        // Another caller may have dialed between the read miss and the gate.
        if let Some(entry) = self.entries.read().await.get(&fingerprint) {
            debug!(fingerprint = %fingerprint.short(), "handle created concurrently");
            return Ok(entry.lease(fingerprint));
        }

        // No cache lock is held while dialing.
        let handle = self.dial(config, fingerprint).await?;
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let entry = Entry {
            handle: Arc::new(handle),
            generation,
            config: config.clone(),
            created_at: Instant::now(),
        };
        let lease = entry.lease(fingerprint);
        self.entries.write().await.insert(fingerprint, entry);

        info!(
            backend = %config.kind(),
            fingerprint = %fingerprint.short(),
            generation,
            "connection established"
        );
        Ok(lease)
    }

    async fn dial(&self, config: &D::Config, fingerprint: Fingerprint) -> Result<D::Handle> {
        let backend = self.dialer.backend();
        let pool = config.pool_settings();
        config.check()?;
        pool.check()?;

        debug!(
            backend = %backend,
            fingerprint = %fingerprint.short(),
            max_open = pool.max_open,
            max_idle = pool.max_idle,
            max_lifetime_secs = pool.max_lifetime.as_secs(),
            "dialing new connection"
        );

        let result = tokio::time::timeout(self.options.dial_timeout, self.dialer.dial(config, &pool))
            .await
            .unwrap_or_else(|_| {
                Err(Error::dial(
                    backend,
                    format!("timed out after {}ms", self.options.dial_timeout.as_millis()),
                ))
            });

        match result {
            Ok(handle) => {
                self.stats.record_dial();
                Ok(handle)
            }
            Err(err) => {
                self.stats.record_dial_failure();
                warn!(backend = %backend, fingerprint = %fingerprint.short(), error = %err, "dial failed");
                Err(match err {
                    err @ (Error::Dial { .. } | Error::Configuration { .. }) => err,
                    other => Error::Dial {
                        backend,
                        message: other.to_string(),
                        source: Some(Box::new(other)),
                    },
                })
            }
        }
    }

    /// Close and remove the entry for `fingerprint`; returns whether one existed
    pub async fn invalidate(&self, fingerprint: &Fingerprint) -> bool {
        let removed = self.entries.write().await.remove(fingerprint);
        match removed {
            Some(entry) => {
                self.retire(*fingerprint, entry).await;
                true
            }
            None => false,
        }
    }

    /// Like [`invalidate`](Self::invalidate), but only if the cached entry is
    /// still the one `lease` was issued from
    pub async fn invalidate_lease(&self, lease: &Lease<D::Handle>) -> bool {
        let removed = {
            let mut entries = self.entries.write().await;
            match entries.get(&lease.fingerprint) {
                Some(entry) if entry.generation == lease.generation => {
                    entries.remove(&lease.fingerprint)
                }
                _ => None,
            }
        };

        match removed {
            Some(entry) => {
                self.retire(lease.fingerprint, entry).await;
                true
            }
            None => {
                debug!(
                    fingerprint = %lease.fingerprint.short(),
                    generation = lease.generation,
                    "lease already replaced"
                );
                false
            }
        }
    }

    // Called only by whoever removed the entry, so each handle is closed once.
    async fn retire(&self, fingerprint: Fingerprint, entry: Entry<D::Config, D::Handle>) {
        self.stats.record_invalidation();
        warn!(
            backend = %entry.config.kind(),
            fingerprint = %fingerprint.short(),
            generation = entry.generation,
            age_secs = entry.created_at.elapsed().as_secs(),
            "invalidating connection"
        );

        if let Err(err) = self.dialer.close(&entry.handle).await {
            warn!(fingerprint = %fingerprint.short(), error = %err, "close failed");
        }
        self.stats.record_close();
    }

    /// Run `operation` against the cached handle for `config`
    ///
    /// A connection-class failure (dial, operation, timeout) invalidates the
    /// handle and the operation is retried exactly once on a fresh one; the
    /// second failure is returned as is. Other errors are returned immediately.
    pub async fn with_connection<T, F, Fut>(&self, config: &D::Config, mut operation: F) -> Result<T>
    where
        F: FnMut(Lease<D::Handle>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match self.attempt(config, &mut operation).await {
            Err(err) if err.is_connection_error() => {
                self.stats.record_retry();
                warn!(
                    backend = %config.kind(),
                    error = %err,
                    "operation failed, retrying once on a fresh connection"
                );
                self.attempt(config, &mut operation).await
            }
            result => result,
        }
    }

    async fn attempt<T, F, Fut>(&self, config: &D::Config, operation: &mut F) -> Result<T>
    where
        F: FnMut(Lease<D::Handle>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let lease = self.acquire(config).await?;
        let deadline = self.options.operation_timeout;

        let result = tokio::time::timeout(deadline, operation(lease.clone()))
            .await
            .unwrap_or_else(|_| {
                Err(Error::timeout(format!(
                    "operation exceeded {}ms",
                    deadline.as_millis()
                )))
            });

        if let Err(err) = &result {
            if err.is_connection_error() {
                self.invalidate_lease(&lease).await;
            }
        }
        result
    }

    /// Ping every cached handle once, replacing the ones that fail
    ///
    /// Returns the number of handles that were replaced.
    pub async fn probe_once(&self) -> usize {
        let snapshot: Vec<(Lease<D::Handle>, D::Config)> = {
            let entries = self.entries.read().await;
            entries
                .iter()
                .map(|(fingerprint, entry)| (entry.lease(*fingerprint), entry.config.clone()))
                .collect()
        };

        let mut replaced = 0;
        for (lease, config) in snapshot {
            let healthy = matches!(
                tokio::time::timeout(self.options.dial_timeout, self.dialer.ping(&lease)).await,
                Ok(Ok(()))
            );
            if healthy {
                continue;
            }

            self.stats.record_probe_failure();
            warn!(fingerprint = %lease.fingerprint.short(), "liveness probe failed");

            if self.invalidate_lease(&lease).await {
                match self.acquire(&config).await {
                    Ok(_) => replaced += 1,
                    Err(err) => {
                        warn!(fingerprint = %lease.fingerprint.short(), error = %err, "re-dial after failed probe")
                    }
                }
            }
        }
        replaced
    }

    /// Start a background task probing every `interval`
    ///
    /// The task stops when the returned handle is stopped or dropped, or when
    /// the cache itself is dropped. A zero interval is a configuration error.
    pub fn spawn_health_probe(self: &Arc<Self>, interval: Duration) -> Result<ProbeHandle> {
        if interval.is_zero() {
            return Err(Error::config("probe_interval must be greater than zero"));
        }

        let token = CancellationToken::new();
        let cancelled = token.clone();
        let cache = Arc::downgrade(self);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let replaced = cache.probe_once().await;
                if replaced > 0 {
                    info!(replaced, "liveness probe replaced connections");
                }
            }
            debug!("liveness probe stopped");
        });

        Ok(ProbeHandle {
            token,
            task: Some(task),
        })
    }

    /// Start the probe configured in [`CacheOptions::probe_interval`], if any
    pub fn spawn_configured_probe(self: &Arc<Self>) -> Result<Option<ProbeHandle>> {
        self.options
            .probe_interval
            .map(|interval| self.spawn_health_probe(interval))
            .transpose()
    }

    /// Close every cached handle
    pub async fn clear(&self) {
        let drained: Vec<_> = self.entries.write().await.drain().collect();
        for (fingerprint, entry) in drained {
            self.retire(fingerprint, entry).await;
        }
    }

    /// Number of cached handles
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether no handle is cached
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Whether a handle is cached for `fingerprint`
    pub async fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.read().await.contains_key(fingerprint)
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }
}

/// Handle to a running liveness probe
#[derive(Debug)]
pub struct ProbeHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ProbeHandle {
    /// Stop the probe and wait for the task to finish
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                if err.is_panic() {
                    warn!(error = %err, "liveness probe task panicked");
                }
            }
        }
    }
}

impl Drop for ProbeHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
