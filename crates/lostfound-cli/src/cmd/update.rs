//! `lf update`: edit fields or moderate an item.

use crate::app::App;
use crate::output::{CliError, OutputMode, fail, render_error, render_report};
use clap::Args;
use lostfound_core::model::{Category, ItemPatch, Status};
use lostfound_core::remote::ItemFilter;

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Item identity.
    pub id: String,

    #[arg(short, long)]
    pub title: Option<String>,

    #[arg(short, long)]
    pub description: Option<String>,

    #[arg(short, long)]
    pub location: Option<String>,

    #[arg(short, long)]
    pub category: Option<Category>,

    #[arg(short, long)]
    pub status: Option<Status>,

    #[arg(long)]
    pub contact: Option<String>,

    #[arg(long)]
    pub phone: Option<String>,

    #[arg(long)]
    pub image_url: Option<String>,

    /// Approve the report (clears a rejection).
    #[arg(long, conflicts_with = "reject")]
    pub approve: bool,

    /// Reject the report (clears an approval).
    #[arg(long)]
    pub reject: bool,
}

impl UpdateArgs {
    fn patch(&self) -> ItemPatch {
        let review = if self.approve {
            Some(true)
        } else if self.reject {
            Some(false)
        } else {
            None
        };
        ItemPatch {
            title: self.title.clone(),
            description: self.description.clone(),
            location: self.location.clone(),
            category: self.category,
            status: self.status,
            contact: self.contact.clone(),
            phone: self.phone.clone(),
            image_url: self.image_url.clone(),
            approved: review,
            rejected: review.map(|approved| !approved),
        }
    }
}

/// Execute `lf update <id>`.
///
/// # Errors
///
/// Returns an error when no field is given, or the service is
/// unreachable or refuses for an item it owns.
pub async fn run_update(args: &UpdateArgs, output: OutputMode, app: &App) -> anyhow::Result<()> {
    let patch = args.patch();
    if patch.is_empty() {
        render_error(
            output,
            &CliError::new("nothing to update; pass at least one field flag"),
        )?;
        anyhow::bail!("empty update");
    }

    let ctx = app.context(ItemFilter::default());
    match app.mutator.update(&ctx, &args.id, &patch).await {
        Ok(report) => render_report(output, &report),
        Err(err) => Err(fail(output, &err)),
    }
}
