//! Feed one key a burst of 20 records and watch the window keep the newest 10.

use std::time::Duration;

use anyhow::Result;
use surge_core::{Collector, Operator, Record};
use surge_ops::KeyedWindow;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let cancel = CancellationToken::new();
    let mut window = KeyedWindow::new(Duration::from_millis(500), 10, cancel.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();
    window.attach(Collector::new(tx));

    let base = chrono::Utc::now();
    for i in 0..20 {
        window.ingest(Record::with_timestamp(
            7,
            base + chrono::Duration::milliseconds(i),
        ));
    }
    println!("ingested 20 records for key 7, waiting for the window to close...");

    tokio::time::sleep(Duration::from_millis(700)).await;
    while let Ok(record) = rx.try_recv() {
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}
