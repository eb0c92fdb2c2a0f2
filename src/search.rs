use anyhow::Result;

use crate::backend;
use crate::config::Config;
use crate::records::print_page;

/// CLI entry point for `sightings search`. The query is handed to the
/// index unchanged; `*` lists every indexed record.
pub async fn run_search(
    config: &Config,
    query: &str,
    page: Option<u32>,
    size: Option<u32>,
    sort: &[String],
) -> Result<()> {
    let request = config.pagination.resolve(page, size, sort)?;
    let sync = backend::open(config).await?;
    let results = sync.search(query, &request).await?;
    print_page(&results);
    Ok(())
}
