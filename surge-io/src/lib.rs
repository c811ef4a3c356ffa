//! surge-io: sources and sinks for the buffering pipeline.
//! - `RecordGenerator`: periodic synthetic load with uniformly random keys
//! - `ReplaySource`: feeds a fixed list of records, then ends
//! - `MetricsSink`: records consumption counters/latency, nothing else
//! - `StdoutSink`: writes each record as a JSON line

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use surge_core::config::GeneratorConfig;
use surge_core::{metrics, Context, Record, Result, Sink, Source};
use tokio_util::sync::CancellationToken;

/// Manufactures `batch_size` records with keys uniform in `[0, key_space)`
/// every `tick` until the token fires.
///
/// Enqueueing never blocks and never fails: the input queue is deliberately
/// unbounded, so there is no flow control back to this source. If the
/// downstream cannot keep up, queue depth (see the `surge_queue_depth`
/// gauge) and memory grow without limit. That is the accepted tradeoff; it
/// is an operational concern, not an error.
pub struct RecordGenerator {
    batch_size: usize,
    key_space: u32,
    tick: Duration,
    cancel: CancellationToken,
    rng: SmallRng,
}

impl RecordGenerator {
    pub fn new(cfg: &GeneratorConfig, cancel: CancellationToken) -> Result<Self> {
        Ok(Self::with_rng(
            cfg.batch_size,
            cfg.key_space,
            cfg.tick_duration()?,
            cancel,
            SmallRng::from_os_rng(),
        ))
    }

    /// Explicit RNG, mainly so tests can seed deterministically.
    pub fn with_rng(
        batch_size: usize,
        key_space: u32,
        tick: Duration,
        cancel: CancellationToken,
        rng: SmallRng,
    ) -> Self {
        Self {
            batch_size,
            key_space,
            tick,
            cancel,
            rng,
        }
    }
}

#[async_trait]
impl Source for RecordGenerator {
    async fn run(&mut self, ctx: &mut dyn Context) -> Result<()> {
        let mut ticker = tokio::time::interval(self.tick);
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    for _ in 0..self.batch_size {
                        let key = self.rng.random_range(0..self.key_space);
                        ctx.collect(Record::new(key));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Feeds a fixed list of records and returns, closing the queue.
pub struct ReplaySource {
    records: Vec<Record>,
}

impl ReplaySource {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl Source for ReplaySource {
    async fn run(&mut self, ctx: &mut dyn Context) -> Result<()> {
        for record in self.records.drain(..) {
            ctx.collect(record);
        }
        Ok(())
    }
}

/// Terminal sink: bumps the consumed counter and samples end-to-end latency.
pub struct MetricsSink;

#[async_trait]
impl Sink for MetricsSink {
    async fn on_record(&mut self, record: Record) -> Result<()> {
        metrics::CONSUMED_TOTAL.inc();
        metrics::CONSUMER_LATENCY_MS.observe(record.age_ms(Utc::now()) as f64);
        Ok(())
    }
}

/// Writes each record as a single JSON line to stdout.
pub struct StdoutSink;

#[async_trait]
impl Sink for StdoutSink {
    async fn on_record(&mut self, record: Record) -> Result<()> {
        println!("{}", serde_json::to_string(&record)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::{self, UnboundedSender};

    struct TestCtx {
        tx: UnboundedSender<Record>,
    }

    impl Context for TestCtx {
        fn collect(&mut self, record: Record) {
            let _ = self.tx.send(record);
        }
    }

    #[tokio::test]
    async fn generator_produces_whole_batches_until_cancelled() {
        let cancel = CancellationToken::new();
        let mut src = RecordGenerator::with_rng(
            5,
            3,
            Duration::from_millis(10),
            cancel.clone(),
            SmallRng::seed_from_u64(42),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            let mut ctx = TestCtx { tx };
            src.run(&mut ctx).await
        });

        tokio::time::sleep(Duration::from_millis(35)).await;
        cancel.cancel();
        handle.await.unwrap().unwrap();

        let mut produced = Vec::new();
        while let Some(record) = rx.recv().await {
            produced.push(record);
        }
        assert!(!produced.is_empty());
        assert_eq!(produced.len() % 5, 0);
        assert!(produced.iter().all(|r| r.key < 3));
    }

    #[tokio::test]
    async fn generator_stops_promptly_when_cancelled_up_front() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut src = RecordGenerator::with_rng(
            5,
            3,
            Duration::from_millis(10),
            cancel,
            SmallRng::seed_from_u64(1),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        {
            let mut ctx = TestCtx { tx };
            src.run(&mut ctx).await.unwrap();
        }
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn replay_source_emits_all_then_closes() {
        let records = vec![Record::new(1), Record::new(2)];
        let mut src = ReplaySource::new(records.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();
        {
            let mut ctx = TestCtx { tx };
            src.run(&mut ctx).await.unwrap();
        }
        assert_eq!(rx.recv().await.unwrap(), records[0]);
        assert_eq!(rx.recv().await.unwrap(), records[1]);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn metrics_sink_counts_consumption() {
        let before = metrics::CONSUMED_TOTAL.get();
        let mut sink = MetricsSink;
        sink.on_record(Record::new(1)).await.unwrap();
        sink.on_record(Record::new(2)).await.unwrap();
        assert_eq!(metrics::CONSUMED_TOTAL.get() - before, 2);
    }
}
