//! Borrowed Brain Sync Worker
//!
//! Processes sync jobs from the SQS queue:
//! 1. Receives a sync job message
//! 2. Acquires a transcript (catalog first, speech-to-text fallback)
//! 3. Chunks and embeds the transcript
//! 4. Upserts chunks into the vector store and links the user
//!
//! A message is deleted only after successful processing; failures
//! stay on the queue for the redrive policy's bounded retries.

mod chunker;
mod errors;
mod processor;

use crate::chunker::ChunkingConfig;
use crate::processor::SyncProcessor;
use borrowedbrain_common::{
    config::AppConfig,
    db::DbPool,
    embeddings::create_embedder,
    gateways::{CatalogApi, CatalogClient, SpeechToText, TranscriptionClient},
    metrics,
    queue::{Queue, QueueConfig, SyncJobMessage},
    VERSION,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn, Level};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(true)
        .json()
        .init();

    info!("Starting Borrowed Brain Sync Worker v{}", VERSION);

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;

    let config = Arc::new(config);

    // Initialize metrics
    metrics::register_metrics();

    if config.observability.metrics_port > 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        info!(addr = %addr, "Prometheus exporter listening");
    }

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;

    // Gateway clients
    let catalog: Arc<dyn CatalogApi> = Arc::new(CatalogClient::new(&config.catalog));
    let transcription: Arc<dyn SpeechToText> =
        Arc::new(TranscriptionClient::new(&config.transcription));
    let embedder = create_embedder(&config.embedding);

    info!(
        embedding_model = %embedder.model_name(),
        dimension = embedder.dimension(),
        "Embedder initialized"
    );

    let chunking = ChunkingConfig {
        max_chars: config.sync.chunk_size,
        overlap_chars: config.sync.chunk_overlap,
    };

    let processor = SyncProcessor::new(db, catalog, transcription, embedder, chunking);

    // Sync queue
    let sync_queue = match config.queue.sync_queue_url {
        Some(ref url) => {
            info!(url = %url, "Connecting to sync queue...");
            let queue_config = QueueConfig {
                url: url.clone(),
                dlq_url: config.queue.dlq_url.clone(),
                visibility_timeout: config.queue.visibility_timeout_secs as i32,
                wait_time_seconds: config.queue.poll_timeout_secs as i32,
                max_messages: config.queue.batch_size as i32,
            };
            Queue::new(queue_config).await?
        }
        None => {
            warn!("queue.sync_queue_url not set, waiting for shutdown signal...");
            tokio::signal::ctrl_c().await?;
            info!("Sync worker shutting down");
            return Ok(());
        }
    };

    info!("Sync worker ready, starting queue polling...");

    // Circuit breaker state
    let mut consecutive_failures = 0;
    const MAX_FAILURES: u32 = 5;
    const CIRCUIT_BREAK_DURATION: std::time::Duration = std::time::Duration::from_secs(30);

    // Start polling loop
    loop {
        // Circuit breaker check
        if consecutive_failures >= MAX_FAILURES {
            warn!(
                failures = consecutive_failures,
                "Circuit breaker open, pausing..."
            );
            tokio::time::sleep(CIRCUIT_BREAK_DURATION).await;
            consecutive_failures = 0;
            info!("Circuit breaker reset, resuming...");
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            result = sync_queue.receive::<SyncJobMessage>() => {
                match result {
                    Ok(messages) => {
                        for (job, receipt_handle) in messages {
                            info!(
                                job_id = %job.job_id,
                                episode_id = %job.episode_id,
                                "Received sync job"
                            );

                            match processor.process_job(job.clone()).await {
                                Ok(()) => {
                                    consecutive_failures = 0;
                                    // Delete message on success
                                    if let Err(e) = sync_queue.delete(&receipt_handle).await {
                                        error!(error = %e, "Failed to delete message");
                                    }
                                }
                                Err(e) => {
                                    consecutive_failures += 1;
                                    error!(
                                        job_id = %job.job_id,
                                        error = %e,
                                        failures = consecutive_failures,
                                        "Failed to process sync job"
                                    );
                                    // Message will be re-delivered or moved to DLQ
                                }
                            }
                        }
                    }
                    Err(e) => {
                        consecutive_failures += 1;
                        error!(error = %e, "Failed to receive messages from queue");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    }
                }
            }
        }
    }

    info!("Sync worker shutting down");
    Ok(())
}
