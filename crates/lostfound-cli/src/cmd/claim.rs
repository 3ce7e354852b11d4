//! `lf claim`: mark an item as claimed.

use crate::app::App;
use crate::output::{OutputMode, fail, render_report};
use clap::Args;
use lostfound_core::remote::ItemFilter;

#[derive(Args, Debug)]
pub struct ClaimArgs {
    /// Item identity.
    pub id: String,
}

/// Execute `lf claim <id>`.
///
/// The view is loaded first so the claim can be shown at once, even when
/// the service is down.
///
/// # Errors
///
/// Returns an error when the item is unknown or the server refuses.
pub async fn run_claim(args: &ClaimArgs, output: OutputMode, app: &App) -> anyhow::Result<()> {
    let ctx = app.context(ItemFilter::default());
    app.mutator.refresh(&ctx.filter).await;
    match app.mutator.claim(&ctx, &args.id).await {
        Ok(report) => render_report(output, &report),
        Err(err) => Err(fail(output, &err)),
    }
}
