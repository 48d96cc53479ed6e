// UI layer: the terminal side of `nbcmd`. Resolves the signing key,
// shows a spinner while a request is in flight and prints results.
// All network work is delegated to `api`.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use dialoguer::{Confirm, Password};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::info;

use crate::api::{CallOptions, NostrBuildClient};
use crate::auth::Signer;
use crate::keys::Keys;

/// Returns the keys to sign with, or `None` when `anonymous` is set.
///
/// `secret` is the `--nsec` / `NBCMD_NSEC` value; when it is absent and
/// stdin is a terminal, the user is prompted for it with hidden input.
pub fn resolve_signer(anonymous: bool, secret: Option<&str>) -> Result<Option<Keys>> {
    if anonymous {
        info!("sending requests without an auth event");
        return Ok(None);
    }
    let secret = match secret {
        Some(secret) if !secret.trim().is_empty() => secret.to_string(),
        _ if std::io::stdin().is_terminal() => Password::new()
            .with_prompt("nsec")
            .interact()
            .context("Failed to read secret key")?,
        _ => bail!("NBCMD_NSEC is not set; export it, pass --nsec or pass --anonymous"),
    };
    let keys = Keys::parse(&secret).context("Failed to decode secret key")?;
    info!(pubkey = %keys.public_key_hex(), "signing requests");
    Ok(Some(keys))
}

/// Upload each file in order, stopping at the first failure.
pub fn upload_files(
    api: &NostrBuildClient,
    signer: Option<&dyn Signer>,
    options: &CallOptions,
    files: &[PathBuf],
    verbose: bool,
) -> Result<()> {
    for path in files {
        let bytes = read_upload(path)?;
        let spinner = spinner(format!("Uploading {}...", path.display()))?;
        let result = api.upload_with(bytes, signer, options);
        spinner.finish_and_clear();

        let result = result.with_context(|| format!("Upload of {} failed", path.display()))?;
        let summary = result.primary_url().unwrap_or_default().to_string();
        println!("{}", render(&result, &summary, verbose)?);
    }
    Ok(())
}

/// Delete each URL in order, stopping at the first failure. Asks for
/// confirmation on an interactive terminal unless `assume_yes`.
pub fn delete_urls(
    api: &NostrBuildClient,
    signer: Option<&dyn Signer>,
    options: &CallOptions,
    urls: &[String],
    verbose: bool,
    assume_yes: bool,
) -> Result<()> {
    let interactive = std::io::stdin().is_terminal();
    for url in urls {
        if !assume_yes && interactive {
            let confirmed = Confirm::new()
                .with_prompt(format!("Delete {}?", url))
                .default(false)
                .interact()?;
            if !confirmed {
                eprintln!("skipped {}", url);
                continue;
            }
        }

        let spinner = spinner(format!("Deleting {}...", url))?;
        let result = api.delete_with(url, signer, options);
        spinner.finish_and_clear();

        let result = result.with_context(|| format!("Delete of {} failed", url))?;
        println!("{}", render(&result, &result.message, verbose)?);
    }
    Ok(())
}

/// Reads a whole file for upload.
pub fn read_upload(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Full JSON when `verbose`, otherwise the one-line summary.
pub fn render<T: Serialize>(result: &T, summary: &str, verbose: bool) -> Result<String> {
    if verbose {
        Ok(serde_json::to_string(result)?)
    } else {
        Ok(summary.to_string())
    }
}

// Drawn on stderr; hidden automatically when stderr is not a terminal.
fn spinner(message: String) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}
