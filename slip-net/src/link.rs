//! Per-interface link state shared by the receive and transmit threads.

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::config::LinkConfig;
use crate::stack::NetDriver;

/// Stable identifier of a link, e.g. the interface index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub u32);

/// Lock a mutex, taking the data even if another thread panicked while
/// holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn bump(counter: &AtomicU64, n: u64) {
    counter.fetch_add(n, Ordering::Relaxed);
}

/// Live traffic counters for a link.
#[derive(Debug, Default)]
pub struct LinkStats {
    pub rx_packets: AtomicU64,
    pub rx_bytes: AtomicU64,
    pub rx_ipv4: AtomicU64,
    pub rx_ipv6: AtomicU64,
    /// Packets dropped because they were neither IPv4 nor IPv6.
    pub rx_errors: AtomicU64,
    /// Invalid escape sequences seen on the wire.
    pub rx_violations: AtomicU64,
    /// Decoded bytes dropped because a frame exceeded the buffer.
    pub rx_dropped: AtomicU64,
    pub tx_packets: AtomicU64,
    pub tx_bytes: AtomicU64,
    pub tx_errors: AtomicU64,
}

/// Point-in-time copy of [`LinkStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStatsSnapshot {
    pub rx_packets: u64,
    pub rx_bytes: u64,
    pub rx_ipv4: u64,
    pub rx_ipv6: u64,
    pub rx_errors: u64,
    pub rx_violations: u64,
    pub rx_dropped: u64,
    pub tx_packets: u64,
    pub tx_bytes: u64,
    pub tx_errors: u64,
}

impl LinkStats {
    pub fn snapshot(&self) -> LinkStatsSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        LinkStatsSnapshot {
            rx_packets: get(&self.rx_packets),
            rx_bytes: get(&self.rx_bytes),
            rx_ipv4: get(&self.rx_ipv4),
            rx_ipv6: get(&self.rx_ipv6),
            rx_errors: get(&self.rx_errors),
            rx_violations: get(&self.rx_violations),
            rx_dropped: get(&self.rx_dropped),
            tx_packets: get(&self.tx_packets),
            tx_bytes: get(&self.tx_bytes),
            tx_errors: get(&self.tx_errors),
        }
    }
}

/// State every thread of a link can see.
///
/// The packet buffers are deliberately absent: each thread owns its own.
pub struct Link {
    id: LinkId,
    name: String,
    mtu: usize,
    poll_interval: Duration,
    up: AtomicBool,
    /// Set when the transmit thread should poll without waiting.
    nodelay: Mutex<bool>,
    wake: Condvar,
    stats: LinkStats,
}

impl Link {
    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mtu(&self) -> usize {
        self.mtu
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn is_up(&self) -> bool {
        self.up.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Ask for another poll pass without waking the transmit thread.
    pub(crate) fn set_nodelay(&self) {
        *lock(&self.nodelay) = true;
    }

    /// Block until the poll interval elapses or a poll is requested, then
    /// consume the request.
    pub(crate) fn wait_for_poll(&self) {
        let guard = lock(&self.nodelay);
        let (mut guard, _) = self
            .wake
            .wait_timeout_while(guard, self.poll_interval, |nodelay| !*nodelay)
            .unwrap_or_else(PoisonError::into_inner);
        *guard = false;
    }
}

/// Shared handle to a [`Link`]. This is what the network stack holds.
#[derive(Clone)]
pub struct LinkHandle(Arc<Link>);

impl LinkHandle {
    pub(crate) fn new(id: LinkId, config: &LinkConfig) -> Self {
        LinkHandle(Arc::new(Link {
            id,
            name: config.name.clone(),
            mtu: config.mtu,
            poll_interval: config.poll_interval,
            up: AtomicBool::new(false),
            nodelay: Mutex::new(false),
            wake: Condvar::new(),
            stats: LinkStats::default(),
        }))
    }
}

impl Deref for LinkHandle {
    type Target = Link;

    fn deref(&self) -> &Link {
        &self.0
    }
}

impl fmt::Debug for LinkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("up", &self.is_up())
            .finish()
    }
}

impl NetDriver for LinkHandle {
    fn up(&self) {
        log::info!("[{}] bringing up", self.name);
        self.up.store(true, Ordering::Release);
    }

    fn down(&self) {
        log::info!("[{}] taking down", self.name);
        self.up.store(false, Ordering::Release);
    }

    fn notify_tx_available(&self) {
        if !self.is_up() {
            return;
        }
        *lock(&self.nodelay) = true;
        self.wake.notify_one();
    }
}
