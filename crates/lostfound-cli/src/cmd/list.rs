//! `lf list`: the reconciled view: pending local items, then the catalog.

use crate::app::App;
use crate::output::{OutputMode, Renderable, fail, pretty_kv, pretty_section, render_list};
use clap::Args;
use lostfound_core::model::{Review, Status};
use lostfound_core::remote::{ItemFilter, Served};
use lostfound_core::sync::reconcile::{Origin, ViewEntry};
use std::io::{self, Write};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Case-insensitive text matched against title, description and location.
    #[arg(short, long, default_value = "")]
    pub search: String,

    /// Category: electronic, document, clothing, accessory, other, or all.
    #[arg(short, long, default_value = "all")]
    pub category: String,

    /// Status: lost, found, or all.
    #[arg(long, default_value = "all")]
    pub status: String,
}

pub const fn review_label(review: Review) -> &'static str {
    match review {
        Review::Pending => "pending",
        Review::Approved => "approved",
        Review::Rejected => "rejected",
        Review::Conflicting => "conflicting",
    }
}

pub const fn origin_label(origin: Origin) -> &'static str {
    match origin {
        Origin::Local => "local",
        Origin::Remote => "remote",
    }
}

impl Renderable for ViewEntry {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let item = &self.item;
        let mark = if item.claimed { " [claimed]" } else { "" };
        pretty_section(w, &format!("{}{mark}", item.title))?;
        pretty_kv(w, "ID", item.identity().unwrap_or("-"))?;
        pretty_kv(w, "Status", item.status.map_or("-", Status::as_str))?;
        pretty_kv(w, "Category", item.category.as_str())?;
        if !item.location.is_empty() {
            pretty_kv(w, "Location", &item.location)?;
        }
        if self.origin == Origin::Local {
            pretty_kv(w, "Origin", "saved on this device")?;
        }
        writeln!(w)
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(&mut *w, self).map_err(io::Error::other)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        let item = &self.item;
        writeln!(
            w,
            "{}  {}  {}  {}  {}  {}",
            item.identity().unwrap_or("-"),
            item.status.map_or("-", Status::as_str),
            item.category,
            if item.claimed { "claimed" } else { "open" },
            origin_label(self.origin),
            item.title,
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["id", "status", "category", "claim", "origin", "title"]
    }
}

/// Tell a human reader the catalog could not be reached.
pub fn note_fallback(output: OutputMode, served: Option<&Served>) {
    if output.is_json() {
        return;
    }
    if let Some(Served::Fallback { reason }) = served {
        eprintln!("note: item service unavailable ({reason}); showing sample items");
    }
}

/// Execute `lf list`.
///
/// # Errors
///
/// Returns an error for an unknown category or status, or when output
/// cannot be written.
pub async fn run_list(args: &ListArgs, output: OutputMode, app: &App) -> anyhow::Result<()> {
    let filter = ItemFilter::parse(&args.search, &args.category, &args.status)
        .map_err(|err| fail(output, &err))?;

    app.mutator.refresh(&filter).await;
    let feed = app.mutator.feed();
    note_fallback(output, feed.served().as_ref());

    let entries = feed.entries();
    if entries.is_empty() && !output.is_json() {
        println!("No items match.");
        return Ok(());
    }
    render_list(&entries, output)?;
    Ok(())
}
