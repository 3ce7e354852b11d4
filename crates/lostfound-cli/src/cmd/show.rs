//! `lf show`: full details of one entry of the reconciled view.

use crate::app::App;
use crate::cmd::list::{note_fallback, origin_label, review_label};
use crate::output::{OutputMode, fail, pretty_kv, pretty_rule, pretty_section, render};
use clap::Args;
use lostfound_core::SyncError;
use lostfound_core::model::Status;
use lostfound_core::remote::ItemFilter;
use lostfound_core::sync::reconcile::ViewEntry;
use std::io::{self, Write};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Item identity (`id` or `_id` as the service sends it).
    pub id: String,
}

fn write_detail(entry: &ViewEntry, w: &mut dyn Write) -> io::Result<()> {
    let item = &entry.item;
    pretty_section(w, &item.title)?;
    pretty_kv(w, "ID", item.identity().unwrap_or("-"))?;
    pretty_kv(w, "Status", item.status.map_or("-", Status::as_str))?;
    pretty_kv(w, "Category", item.category.as_str())?;
    pretty_kv(w, "Claimed", if item.claimed { "yes" } else { "no" })?;
    pretty_kv(w, "Review", review_label(item.review()))?;
    pretty_kv(w, "Origin", origin_label(entry.origin))?;
    if !item.location.is_empty() {
        pretty_kv(w, "Location", &item.location)?;
    }
    for (key, value) in [
        ("Contact", &item.contact),
        ("Phone", &item.phone),
        ("Image", &item.image_url),
    ] {
        if let Some(value) = value {
            pretty_kv(w, key, value)?;
        }
    }
    if let Some(owner) = item.owner_id() {
        pretty_kv(w, "Owner", owner)?;
    }
    if let Some(when) = item.timestamp() {
        pretty_kv(w, "Reported", when.format("%Y-%m-%d %H:%M").to_string())?;
    }
    if !item.description.is_empty() {
        pretty_rule(w)?;
        writeln!(w, "{}", item.description)?;
    }
    Ok(())
}

/// Execute `lf show <id>`.
///
/// # Errors
///
/// Returns an error when the identity is not in the view or output
/// rendering fails.
pub async fn run_show(args: &ShowArgs, output: OutputMode, app: &App) -> anyhow::Result<()> {
    let id = args.id.trim();
    app.mutator.refresh(&ItemFilter::default()).await;
    let feed = app.mutator.feed();
    note_fallback(output, feed.served().as_ref());

    let Some(entry) = feed.find(id) else {
        return Err(fail(output, &SyncError::NotFound { id: id.to_string() }));
    };
    render(output, &entry, write_detail)
}
