//! surge-ops: the per-key tumbling-window buffering operator.
//!
//! `KeyedWindow` keeps one independent window per distinct key. A key's
//! window opens when its buffer goes from empty to non-empty; one timer per
//! opened window fires a fixed duration later, takes the buffer, keeps the
//! newest `retain` records in arrival order and emits them through the
//! attached collector. Keys are never aligned to each other or to a global
//! tick.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use surge_core::config::WindowConfig;
use surge_core::{metrics, Collector, Operator, Record};
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct Group {
    buf: Vec<Record>,
}

struct Inner {
    window: Duration,
    retain: usize,
    groups: Mutex<HashMap<u32, Group>>,
    out: OnceCell<Collector>,
    cancel: CancellationToken,
}

impl Inner {
    /// Window expiry for `key`. Takes the whole buffer under the table lock;
    /// a record racing this either made it into the taken buffer or will
    /// re-open the group and arm the next timer. Nothing is lost or doubled.
    fn flush(&self, key: u32) {
        if self.cancel.is_cancelled() {
            return;
        }
        let mut buf = {
            let mut groups = self.groups.lock();
            match groups.get_mut(&key) {
                Some(group) => std::mem::take(&mut group.buf),
                None => return,
            }
        };
        let excess = buf.len().saturating_sub(self.retain);
        if excess > 0 {
            buf.drain(..excess);
            metrics::DROPPED_RECORDS
                .with_label_values(&["truncated"])
                .inc_by(excess as u64);
        }
        tracing::debug!(key, emitted = buf.len(), dropped = excess, "window closed");
        if let Some(out) = self.out.get() {
            for record in buf {
                out.emit(record);
            }
        }
    }
}

/// The windowed grouping operator. Cheap to share with its timer tasks; the
/// group table is guarded by a single lock, which is fine for the intended
/// key cardinality (hundreds).
pub struct KeyedWindow {
    inner: Arc<Inner>,
}

impl KeyedWindow {
    pub fn new(window: Duration, retain: usize, cancel: CancellationToken) -> Self {
        Self {
            inner: Arc::new(Inner {
                window,
                retain,
                groups: Mutex::new(HashMap::new()),
                out: OnceCell::new(),
                cancel,
            }),
        }
    }

    pub fn from_config(cfg: &WindowConfig, cancel: CancellationToken) -> anyhow::Result<Self> {
        Ok(Self::new(cfg.size_duration()?, cfg.retain, cancel))
    }

    /// Number of keys a group has ever been created for.
    pub fn group_count(&self) -> usize {
        self.inner.groups.lock().len()
    }

    fn arm_timer(&self, key: u32) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::select! {
                // Teardown: the buffered remainder is discarded, not emitted.
                _ = inner.cancel.cancelled() => {}
                _ = tokio::time::sleep(inner.window) => inner.flush(key),
            }
        });
    }
}

impl Operator for KeyedWindow {
    fn attach(&mut self, out: Collector) {
        let _ = self.inner.out.set(out);
    }

    fn ingest(&self, record: Record) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        let key = record.key;
        let opened = {
            let mut groups = self.inner.groups.lock();
            let group = groups.entry(key).or_insert_with(|| {
                metrics::GROUP_COUNT.inc();
                Group::default()
            });
            let first = group.buf.is_empty();
            group.buf.push(record);
            first
        };
        if opened {
            self.arm_timer(key);
        }
    }

    fn close(&self) {
        self.inner.cancel.cancel();
    }
}
