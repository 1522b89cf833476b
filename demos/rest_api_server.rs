//! REST API server example
//!
//! Runs flickr-dl with the REST API enabled. Reads `FLICKR_API_KEY` from the
//! environment or a `.env` file.
//!
//! After starting, you can:
//! - View Swagger UI at http://localhost:5000/swagger-ui
//! - Start a job via POST http://localhost:5000/jobs
//! - Follow it via GET http://localhost:5000/jobs/{id}/events
//! - Fetch the archive via GET http://localhost:5000/jobs/{id}/archive
//!
//! ```bash
//! RUST_LOG=flickr_dl=debug cargo run --example rest_api_server
//! ```

use flickr_dl::config::{ApiConfig, Config, DownloadConfig, FlickrConfig, ServerIntegrationConfig};
use flickr_dl::{PhotoDownloader, run_with_shutdown};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flickr_dl=info")),
        )
        .init();

    let config = Config {
        download: DownloadConfig {
            work_dir: "flickr-work".into(),
            ..Default::default()
        },
        flickr: FlickrConfig::from_env(),
        server: ServerIntegrationConfig {
            api: ApiConfig {
                bind_address: "127.0.0.1:5000".parse()?,
                api_key: std::env::var("FLICKR_DL_API_KEY").ok(),
                ..Default::default()
            },
        },
        ..Default::default()
    };

    let downloader = Arc::new(PhotoDownloader::new(config).await?);
    let api = downloader.spawn_api_server();
    let cleanup = downloader.start_cleanup_task();

    println!("Starting flickr-dl REST API server");
    println!("Swagger UI: http://localhost:5000/swagger-ui");
    println!();
    println!("Example commands:");
    println!("  # Download today's top 20 lighthouse photos");
    println!("  curl -X POST http://localhost:5000/jobs \\");
    println!("    -H 'Content-Type: application/json' \\");
    println!("    -d '{{\"kind\": \"search\", \"text\": \"lighthouse\", \"count\": 20}}'");
    println!();
    println!("  # Follow progress (Server-Sent Events)");
    println!("  curl -N http://localhost:5000/jobs/<job_id>/events");
    println!();
    println!("  # Fetch the archive");
    println!("  curl -OJ http://localhost:5000/jobs/<job_id>/archive");
    println!();
    println!("Press Ctrl+C to stop");

    run_with_shutdown((*downloader).clone()).await?;
    cleanup.await.ok();
    api.abort();
    Ok(())
}
