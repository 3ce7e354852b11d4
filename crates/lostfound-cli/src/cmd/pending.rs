//! `lf pending` and `lf retry-pending`: reports saved on this device.

use crate::app::App;
use crate::output::{OutputMode, fail, render, render_list};
use lostfound_core::remote::ItemFilter;
use lostfound_core::sync::mutator::RetrySummary;
use lostfound_core::sync::reconcile::{Origin, ViewEntry};
use std::io::{self, Write};

/// Execute `lf pending`.
///
/// # Errors
///
/// Returns an error when the local slot cannot be reached. A corrupt slot
/// is quarantined, reset, and listed as empty.
pub fn run_pending(output: OutputMode, app: &App) -> anyhow::Result<()> {
    let local = app.mutator.local();
    let items = local.read_or_reset().map_err(|err| fail(output, &err))?;
    if !output.is_json() {
        let claims = local.pending_claims();
        if !claims.is_empty() {
            eprintln!("note: {} claim(s) waiting to be sent: {}", claims.len(), claims.join(", "));
        }
        if items.is_empty() {
            println!("Nothing pending.");
            return Ok(());
        }
    }
    let entries: Vec<ViewEntry> = items
        .into_iter()
        .map(|item| ViewEntry {
            item,
            origin: Origin::Local,
        })
        .collect();
    render_list(&entries, output)?;
    Ok(())
}

fn write_summary(summary: &RetrySummary, w: &mut dyn Write) -> io::Result<()> {
    writeln!(
        w,
        "sent {}, still pending {}, rejected {}",
        summary.promoted.len() + summary.claims_sent.len(),
        summary.still_pending.len() + summary.claims_pending.len(),
        summary.rejected.len()
    )?;
    for id in &summary.promoted {
        writeln!(w, "  sent      {id}")?;
    }
    for id in &summary.still_pending {
        writeln!(w, "  pending   {id}")?;
    }
    for id in &summary.claims_sent {
        writeln!(w, "  claimed   {id}")?;
    }
    for id in &summary.claims_pending {
        writeln!(w, "  claim     {id} (pending)")?;
    }
    for (id, message) in &summary.rejected {
        writeln!(w, "  rejected  {id}: {message}")?;
    }
    Ok(())
}

/// Execute `lf retry-pending`.
///
/// # Errors
///
/// Returns an error when the local slot cannot be read or rewritten.
pub async fn run_retry_pending(output: OutputMode, app: &App) -> anyhow::Result<()> {
    let ctx = app.context(ItemFilter::default());
    let summary = app
        .mutator
        .retry_pending(&ctx)
        .await
        .map_err(|err| fail(output, &err))?;
    render(output, &summary, write_summary)
}
