//! CLI commands that read and write records: `create`, `update`, `get`,
//! `list`, `delete`.
//!
//! Single records are printed as pretty JSON so the output can be piped
//! back into `update`. Pages are printed as a numbered listing.

use anyhow::Result;

use sightings_core::models::{format_timestamp, Sighting};
use sightings_core::page::Page;
use sightings_core::validate::parse_sighting_json;

use crate::backend;
use crate::config::Config;

pub async fn run_create(config: &Config, json: &str) -> Result<()> {
    let sighting = parse_sighting_json(json)?;
    let sync = backend::open(config).await?;
    let saved = sync.create(&sighting).await?;
    println!("{}", serde_json::to_string_pretty(&saved)?);
    Ok(())
}

pub async fn run_update(config: &Config, json: &str) -> Result<()> {
    let sighting = parse_sighting_json(json)?;
    let sync = backend::open(config).await?;
    let saved = sync.update(&sighting).await?;
    println!("{}", serde_json::to_string_pretty(&saved)?);
    Ok(())
}

pub async fn run_get(config: &Config, id: &str) -> Result<()> {
    let sync = backend::open(config).await?;
    let sighting = sync.get(id).await?;
    println!("{}", serde_json::to_string_pretty(&sighting)?);
    Ok(())
}

pub async fn run_delete(config: &Config, id: &str) -> Result<()> {
    let sync = backend::open(config).await?;
    sync.delete(id).await?;
    println!("Deleted {}.", id);
    Ok(())
}

pub async fn run_list(
    config: &Config,
    page: Option<u32>,
    size: Option<u32>,
    sort: &[String],
) -> Result<()> {
    let request = config.pagination.resolve(page, size, sort)?;
    let sync = backend::open(config).await?;
    let page = sync.list_page(&request).await?;
    print_page(&page);
    Ok(())
}

/// Numbered listing followed by a `Page x of y (n total)` footer.
pub fn print_page(page: &Page<Sighting>) {
    if page.content.is_empty() {
        println!("No results.");
    }

    let first = page.page as u64 * page.size as u64;
    for (i, s) in page.content.iter().enumerate() {
        println!(
            "{}. {} subject={} observer={} at {}",
            first + i as u64 + 1,
            s.id().unwrap_or("-"),
            s.subject_id,
            s.observer_id,
            format_timestamp(&s.occurred_at)
        );
        println!("    position: ({}, {})", s.latitude, s.longitude);
        if let Some(heading) = s.heading {
            println!("    heading: {}", heading);
        }
        if let Some(count) = s.count {
            println!("    count: {}", count);
        }
        if let Some(ref notes) = s.notes {
            println!("    notes: \"{}\"", notes);
        }
    }

    println!(
        "Page {} of {} ({} total)",
        u64::from(page.page) + 1,
        page.total_pages().max(1),
        page.total_elements
    );
}
