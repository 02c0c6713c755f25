use std::{sync::Arc, time::Duration};

use sluice_components::queues::MemoryQueue;
use sluice_config::GenericConfiguration;
use sluice_error::{ErrorContext as _, GenericError};
use tokio::{io::BufReader, select, signal::ctrl_c, sync::oneshot, time::sleep};
use tracing::{error, info, warn};

use super::ResolvedConfiguration;
use crate::{config::RunConfig, feeder::feed};

/// Entrypoint for the `run` command.
pub async fn handle_run_command(config: GenericConfiguration, args: RunConfig) -> Result<(), GenericError> {
    let resolved = ResolvedConfiguration::from_configuration(&config)?;

    let batch_size = resolved.sink.batch_size();
    let queue = Arc::new(
        resolved
            .queue
            .build(batch_size)
            .error_context("Invalid queue configuration.")?,
    );
    let sink = resolved
        .ingest
        .build()
        .error_context("Failed to build ingestion sink.")?;

    info!(
        sink_name = resolved.sink.sink_name(),
        batch_size = batch_size.get(),
        process_id = std::process::id(),
        "Sluice starting..."
    );

    let (input_done_tx, input_done_rx) = oneshot::channel();
    let feeder = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move {
            match feed(BufReader::new(tokio::io::stdin()), &queue, batch_size.get()).await {
                Ok(fed) => info!(fed, "Standard input closed."),
                Err(e) => warn!(error = %e, "Stopped reading standard input."),
            }
            let _ = input_done_tx.send(());
        })
    };

    let shutdown = shutdown_signal(Arc::clone(&queue), input_done_rx, args.exit_when_drained);

    let mut runner = resolved.sink.build_runner(Arc::clone(&queue), sink);
    runner.start();
    let result = runner.run(shutdown).await;
    runner.stop().await;
    feeder.abort();

    let counters = runner.counters().snapshot();
    info!(
        counters = %serde_json::to_string(&counters).unwrap_or_default(),
        remaining = queue.len(),
        "Final counters."
    );

    result.error_context("Sink failed unrecoverably.")
}

async fn shutdown_signal(queue: Arc<MemoryQueue>, input_done: oneshot::Receiver<()>, exit_when_drained: bool) {
    let drained = async {
        if !exit_when_drained || input_done.await.is_err() {
            std::future::pending::<()>().await;
        }
        while !queue.is_empty() {
            sleep(Duration::from_millis(50)).await;
        }
        info!("Input drained. Shutting down.");
    };

    select! {
        result = ctrl_c() => match result {
            Ok(()) => info!("Received interrupt. Shutting down."),
            Err(e) => error!(error = %e, "Failed to listen for interrupt. Shutting down."),
        },
        _ = drained => {}
    }
}
