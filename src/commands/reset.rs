// ABOUTME: reset command: discards saved transfer progress after confirmation
// ABOUTME: The next start copies every table from the beginning

use crate::checkpoint::CheckpointStore;
use anyhow::{bail, Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm};

/// Ask before destructive actions unless `yes` was passed
pub fn confirm(prompt: &str, yes: bool) -> Result<()> {
    if yes {
        return Ok(());
    }

    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to get confirmation")?;

    if !confirmed {
        tracing::warn!("⚠ User cancelled operation");
        bail!("Cancelled by user");
    }
    Ok(())
}

pub fn reset(checkpoints: &dyn CheckpointStore, yes: bool) -> Result<()> {
    let records = checkpoints.load().context("Failed to read saved progress")?;
    if records.is_empty() {
        tracing::info!("No transfer progress recorded; nothing to reset");
        return Ok(());
    }

    confirm(
        &format!(
            "Discard progress for {} tables? The next transfer starts over",
            records.len()
        ),
        yes,
    )?;

    checkpoints.reset().context("Failed to reset progress")?;
    tracing::info!("✓ Transfer progress reset");
    Ok(())
}
