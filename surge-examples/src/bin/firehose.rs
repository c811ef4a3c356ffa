//! Run the full synthetic pipeline for a couple of seconds, then dump the
//! prometheus text so the produced/consumed/latency series are visible.

use std::time::Duration;

use anyhow::Result;
use surge_core::config::PipelineConfig;
use surge_core::Executor;
use surge_io::{MetricsSink, RecordGenerator};
use surge_ops::KeyedWindow;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = PipelineConfig::default();
    cfg.validate()?;

    let cancel = CancellationToken::new();
    let source = RecordGenerator::new(&cfg.generator, cancel.clone())?;
    let window = KeyedWindow::from_config(&cfg.window, cancel.clone())?;

    let stopper = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        stopper.cancel();
    });

    let mut exec = Executor::new();
    exec.source(source).operator(window).sink(MetricsSink);
    exec.run().await?;

    print!("{}", surge_core::metrics::render_prometheus());
    Ok(())
}
