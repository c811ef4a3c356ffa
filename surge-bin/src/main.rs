use axum::{routing::get, Router};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "surge", version, about = "Surge CLI", disable_help_subcommand = false)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the pipeline, optionally from a surge.toml
    Run {
        #[arg(short, long)]
        config: Option<std::path::PathBuf>,
        #[arg(long, default_value_t = 0)]
        http_port: u16,
    },
    /// Serve only /metrics
    Serve {
        #[arg(long, default_value_t = 9898)]
        port: u16,
    },
}

fn app() -> Router {
    Router::new().route("/metrics", get(metrics))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { port } => {
            let app = app();
            let addr: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();
            tracing::info!("serving /metrics on {}", addr);
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
            Ok(())
        }
        Commands::Run { config, http_port } => {
            if http_port != 0 {
                let app = app();
                let addr: SocketAddr = format!("127.0.0.1:{}", http_port).parse().unwrap();
                tracing::info!("serving /metrics on {}", addr);
                let listener = tokio::net::TcpListener::bind(addr).await?;
                tokio::spawn(async move {
                    let _ = axum::serve(listener, app).await;
                });
            }
            run_pipeline(config).await?;
            Ok(())
        }
    }
}

async fn metrics() -> String {
    surge_core::metrics::render_prometheus()
}

async fn run_pipeline(path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let cfg: surge_core::config::PipelineConfig = match path {
        Some(p) => {
            let text = tokio::fs::read_to_string(&p).await?;
            toml::from_str(&text)?
        }
        None => Default::default(),
    };
    cfg.validate()?;

    let cancel = CancellationToken::new();
    let source = surge_io::RecordGenerator::new(&cfg.generator, cancel.clone())?;
    let window = surge_ops::KeyedWindow::from_config(&cfg.window, cancel.clone())?;

    let mut exec = surge_core::Executor::new();
    exec.source(source).operator(window).sink(surge_io::MetricsSink);

    // Stop on the first of: a line on stdin, ctrl-c.
    let trigger = cancel.clone();
    tokio::spawn(async move {
        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = stdin.read_line(&mut line) => {}
        }
        tracing::info!("stop requested, tearing down");
        trigger.cancel();
    });

    tracing::info!(
        batch_size = cfg.generator.batch_size,
        key_space = cfg.generator.key_space,
        retain = cfg.window.retain,
        "pipeline running; press enter or ctrl-c to stop"
    );
    exec.run().await?;
    tracing::info!("pipeline stopped");
    Ok(())
}
