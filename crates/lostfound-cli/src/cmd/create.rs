//! `lf create`: report a lost or found item.

use crate::app::App;
use crate::output::{CliError, OutputMode, fail, render_error, render_report};
use clap::Args;
use lostfound_core::model::{Category, NewItem, Status};
use lostfound_core::remote::ItemFilter;

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Short title of the item.
    #[arg(short, long)]
    pub title: String,

    #[arg(short, long)]
    pub description: Option<String>,

    /// Where it was lost or found.
    #[arg(short, long)]
    pub location: Option<String>,

    /// electronic, document, clothing, accessory or other.
    #[arg(short, long)]
    pub category: Option<Category>,

    /// lost or found.
    #[arg(short, long)]
    pub status: Option<Status>,

    #[arg(long)]
    pub contact: Option<String>,

    #[arg(long)]
    pub phone: Option<String>,

    #[arg(long)]
    pub image_url: Option<String>,
}

impl CreateArgs {
    fn into_draft(self) -> NewItem {
        NewItem {
            description: self.description.unwrap_or_default(),
            location: self.location.unwrap_or_default(),
            category: self.category.unwrap_or_default(),
            status: self.status,
            contact: self.contact,
            phone: self.phone,
            image_url: self.image_url,
            ..NewItem::titled(self.title.trim())
        }
    }
}

/// Execute `lf create`.
///
/// # Errors
///
/// Returns an error for an empty title, a rejected report, or a local
/// fallback that cannot be written.
pub async fn run_create(args: CreateArgs, output: OutputMode, app: &App) -> anyhow::Result<()> {
    if args.title.trim().is_empty() {
        render_error(output, &CliError::new("title must not be empty"))?;
        anyhow::bail!("title must not be empty");
    }

    let ctx = app.context(ItemFilter::default());
    match app.mutator.create(&ctx, args.into_draft()).await {
        Ok(report) => render_report(output, &report),
        Err(err) => Err(fail(output, &err)),
    }
}
