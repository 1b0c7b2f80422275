// ABOUTME: bridge command: serves the transfer API over stdin/stdout
// ABOUTME: On EOF an active transfer is cancelled at its next batch boundary

use crate::transfer::TransferController;
use anyhow::Result;
use tokio::io::BufReader;

pub async fn bridge(controller: TransferController) -> Result<()> {
    tracing::info!("Bridge ready on stdin/stdout");

    crate::bridge::serve(
        controller.clone(),
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await?;

    if controller.cancel() {
        tracing::info!("Input closed; waiting for the current batch to finish");
    }
    controller.wait().await;
    Ok(())
}
