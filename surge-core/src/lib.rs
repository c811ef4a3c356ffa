//! surge-core: fundamental types, trait seams and the pipeline executor.
//!
//! Goal: provide the essential abstractions for the buffering pipeline:
//! - Record (keyed, timestamped)
//! - Traits: Source, Operator, Sink, Context
//! - Collector, the emission handle operators push retained records through
//! - A tokio-based executor wiring source -> dispatch loop -> operator -> sink
//!
//! Quick example:
//! ```no_run
//! use surge_core::{Collector, Context, Executor, Operator, Record, Sink, Source};
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! struct OneShot;
//! #[async_trait::async_trait]
//! impl Source for OneShot {
//!     async fn run(&mut self, ctx: &mut dyn Context) -> surge_core::Result<()> {
//!         ctx.collect(Record::new(7));
//!         Ok(())
//!     }
//! }
//!
//! struct Relay(Option<Collector>);
//! impl Operator for Relay {
//!     fn attach(&mut self, out: Collector) { self.0 = Some(out); }
//!     fn ingest(&self, record: Record) {
//!         if let Some(out) = &self.0 { out.emit(record); }
//!     }
//!     fn close(&self) {}
//! }
//!
//! struct Discard;
//! #[async_trait::async_trait]
//! impl Sink for Discard {
//!     async fn on_record(&mut self, _record: Record) -> surge_core::Result<()> { Ok(()) }
//! }
//!
//! let mut exec = Executor::new();
//! exec.source(OneShot).operator(Relay(None)).sink(Discard);
//! exec.run().await?;
//! # Ok(()) }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod config;
pub mod metrics;

/// Keyed record with its creation timestamp. Immutable once created.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    pub key: u32,
    pub created_at: DateTime<Utc>,
}

impl Record {
    pub fn new(key: u32) -> Self {
        Self {
            key,
            created_at: Utc::now(),
        }
    }

    pub fn with_timestamp(key: u32, created_at: DateTime<Utc>) -> Self {
        Self { key, created_at }
    }

    /// Milliseconds between creation and `now`, clamped so a clock blip
    /// never yields a negative latency sample.
    pub fn age_ms(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_milliseconds().max(0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Emission handle operators push retained records through. Emitting into a
/// torn-down pipeline is a silent no-op, matching the shutdown discard policy.
#[derive(Clone)]
pub struct Collector {
    tx: tokio::sync::mpsc::UnboundedSender<Record>,
}

impl Collector {
    pub fn new(tx: tokio::sync::mpsc::UnboundedSender<Record>) -> Self {
        Self { tx }
    }

    pub fn emit(&self, record: Record) {
        let _ = self.tx.send(record);
    }
}

/// Handed to a `Source`; collecting enqueues onto the (unbounded) input queue.
pub trait Context: Send {
    fn collect(&mut self, record: Record);
}

#[async_trait::async_trait]
pub trait Source: Send {
    async fn run(&mut self, ctx: &mut dyn Context) -> Result<()>;
}

/// Keyed operator between the dispatch loop and the sink.
///
/// `ingest` is called once per record on the dispatch task and must not block
/// beyond brief lock acquisition. Implementations may emit from their own
/// timer tasks at any point up to `close`, always through the `Collector`
/// installed via `attach`.
pub trait Operator: Send + Sync {
    fn attach(&mut self, out: Collector);
    fn ingest(&self, record: Record);
    /// Stop accepting ingests and silence any pending timers. Idempotent.
    fn close(&self);
}

#[async_trait::async_trait]
pub trait Sink: Send {
    async fn on_record(&mut self, record: Record) -> Result<()>;
}

/// Wires one source, one operator and one sink into three tasks:
/// the source task writes the unbounded input queue, the dispatch loop drains
/// it (recording the production-side metrics) into the operator, and the sink
/// task drains the operator's merged output channel.
pub struct Executor {
    source: Option<Box<dyn Source>>,
    operator: Option<Box<dyn Operator>>,
    sink: Option<Box<dyn Sink>>,
}

impl Executor {
    pub fn new() -> Self {
        Self {
            source: None,
            operator: None,
            sink: None,
        }
    }

    pub fn source<S: Source + 'static>(&mut self, s: S) -> &mut Self {
        self.source = Some(Box::new(s));
        self
    }

    pub fn operator<O: Operator + 'static>(&mut self, o: O) -> &mut Self {
        self.operator = Some(Box::new(o));
        self
    }

    pub fn sink<K: Sink + 'static>(&mut self, s: K) -> &mut Self {
        self.sink = Some(Box::new(s));
        self
    }

    pub async fn run(&mut self) -> Result<()> {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Record>();

        struct ExecCtx {
            tx: tokio::sync::mpsc::UnboundedSender<Record>,
        }

        impl Context for ExecCtx {
            fn collect(&mut self, record: Record) {
                metrics::QUEUE_DEPTH.inc();
                let _ = self.tx.send(record);
            }
        }

        let mut source = self.source.take().ok_or_else(|| anyhow::anyhow!("no source"))?;
        let mut op = self.operator.take().ok_or_else(|| anyhow::anyhow!("no operator"))?;
        let mut sink = self.sink.take().ok_or_else(|| anyhow::anyhow!("no sink"))?;

        let (out_tx, mut out_rx) = tokio::sync::mpsc::unbounded_channel::<Record>();
        op.attach(Collector::new(out_tx));

        // Source task: the queue closes when the source returns and drops its sender.
        let src_handle = tokio::spawn(async move {
            let mut sctx = ExecCtx { tx };
            source.run(&mut sctx).await
        });

        // Dispatch loop: single task, suspends only on the queue.
        let dispatch_handle = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                metrics::QUEUE_DEPTH.dec();
                metrics::PRODUCED_TOTAL.inc();
                metrics::PRODUCER_LATENCY_MS.observe(record.age_ms(Utc::now()) as f64);
                op.ingest(record);
            }
            // Queue ended: refuse further ingests and discard open windows.
            op.close();
            Ok::<_, Error>(())
        });

        // Sink task: ends once the operator (and its timers) released the collector.
        let sink_handle = tokio::spawn(async move {
            while let Some(record) = out_rx.recv().await {
                sink.on_record(record).await?;
            }
            Ok::<_, Error>(())
        });

        src_handle.await??;
        dispatch_handle.await??;
        sink_handle.await??;
        Ok(())
    }
}

pub mod prelude {
    pub use super::{Collector, Context, Executor, Operator, Record, Result, Sink, Source};
}
