//! `lf delete`: remove an item.

use crate::app::App;
use crate::output::{OutputMode, fail, render_report};
use clap::Args;
use lostfound_core::remote::ItemFilter;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Item identity.
    pub id: String,
}

/// Execute `lf delete <id>`.
///
/// # Errors
///
/// Returns an error unless the service confirms the delete or the item is
/// still pending on this device.
pub async fn run_delete(args: &DeleteArgs, output: OutputMode, app: &App) -> anyhow::Result<()> {
    let ctx = app.context(ItemFilter::default());
    match app.mutator.delete(&ctx, &args.id).await {
        Ok(report) => render_report(output, &report),
        Err(err) => Err(fail(output, &err)),
    }
}
