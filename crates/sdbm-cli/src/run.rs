//! Command handlers: wire config into the scraper and warehouse crates.
//!
//! Per-app failures never abort a run; they become error records. Only
//! setup problems, an unreadable catalog, and a failed warehouse write make
//! the process exit non-zero.

use std::collections::HashSet;
use std::time::Duration;

use sdbm_core::AppConfig;
use sdbm_scraper::{
    scrape_all, BrowserlessDriver, CatalogClient, FetchSettings, FetchStrategy, PageFetcher,
    ScrapeBatch, StdRandom, UnlockerClient,
};
use sdbm_warehouse::{BigQueryClient, SqlTemplates, TableRef, Warehouse, WarehouseWriter};

/// Full pass: catalog check, scrape, merge.
///
/// # Errors
///
/// Returns an error if the apps file or SQL templates cannot be loaded, a
/// client cannot be built, the catalog is unavailable, or the warehouse
/// write fails.
pub(crate) async fn run_scrape(config: &AppConfig, clear_first: bool) -> anyhow::Result<()> {
    let apps = sdbm_core::load_apps(&config.apps_path)?;
    let writer = build_writer(config)?;
    let mut strategy = build_fetch_strategy(config)?;

    let catalog = CatalogClient::new(&config.catalog_url, config.http_timeout_secs)
        .map_err(|e| anyhow::anyhow!("failed to build catalog client: {e}"))?;
    let catalog_ids = catalog.list_app_ids(Some(config.catalog_limit)).await;
    if catalog_ids.is_empty() {
        tracing::error!(url = %config.catalog_url, "app catalog is empty or unavailable");
    }

    run_pipeline(
        &mut strategy,
        &writer,
        &apps.app_ids(),
        &catalog_ids,
        Duration::from_secs(config.inter_app_delay_secs),
        clear_first,
    )
    .await?;
    Ok(())
}

/// Scrapes the configured apps and merges whatever was extracted.
///
/// With `clear_first`, today's rows are deleted right before the merge, and
/// only when at least one app produced metrics.
///
/// # Errors
///
/// Returns an error if `catalog` is empty, or if clearing or writing to the
/// warehouse fails. Apps that fail to scrape only show up as error records
/// in the returned batch.
pub(crate) async fn run_pipeline<F, W>(
    fetcher: &mut F,
    writer: &WarehouseWriter<W>,
    configured: &[i64],
    catalog: &[i64],
    delay: Duration,
    clear_first: bool,
) -> anyhow::Result<ScrapeBatch>
where
    F: PageFetcher,
    W: Warehouse,
{
    if catalog.is_empty() {
        anyhow::bail!("could not load the app catalog");
    }

    let selected = select_app_ids(configured, catalog);
    tracing::info!(apps = ?selected, "apps selected for scraping");

    let batch = scrape_all(fetcher, &selected, delay).await;

    let saved = if batch.successful == 0 {
        tracing::warn!(failed = batch.failed(), "no successful records to save");
        true
    } else {
        if clear_first && !writer.clear_today().await {
            anyhow::bail!("failed to clear today's rows from {}", writer.target());
        }
        tracing::info!(records = batch.records.len(), table = %writer.target(), "saving records");
        writer.write(&batch.records).await
    };

    tracing::info!(
        successful = batch.successful,
        total = selected.len(),
        "scrape finished: {}/{} apps extracted",
        batch.successful,
        selected.len()
    );

    if !saved {
        anyhow::bail!("failed to save records to {}", writer.target());
    }
    tracing::info!(table = %writer.target(), "records saved");
    Ok(batch)
}

/// Deletes today's rows from the metrics table.
///
/// # Errors
///
/// Returns an error if the writer cannot be built or the delete fails.
pub(crate) async fn run_clear_today(config: &AppConfig) -> anyhow::Result<()> {
    let writer = build_writer(config)?;
    if !writer.clear_today().await {
        anyhow::bail!("failed to clear today's rows from {}", writer.target());
    }
    Ok(())
}

/// Configured ids in file order. Ids absent from the fetched catalog prefix
/// are kept but logged, since the prefix is bounded.
pub(crate) fn select_app_ids(configured: &[i64], catalog: &[i64]) -> Vec<i64> {
    let known: HashSet<i64> = catalog.iter().copied().collect();
    for app_id in configured.iter().filter(|id| !known.contains(*id)) {
        tracing::warn!(app_id, "configured app not found in catalog prefix");
    }
    configured.to_vec()
}

fn build_writer(config: &AppConfig) -> anyhow::Result<WarehouseWriter<BigQueryClient>> {
    let templates = SqlTemplates::load(&config.sql_dir)
        .map_err(|e| anyhow::anyhow!("failed to load SQL templates: {e}"))?;
    let client = BigQueryClient::new(
        &config.bq_project,
        &config.bq_access_token,
        config.bq_location.as_deref(),
        config.http_timeout_secs,
    )
    .map_err(|e| anyhow::anyhow!("failed to build BigQuery client: {e}"))?;

    Ok(WarehouseWriter::new(
        client,
        TableRef::new(&config.bq_project, &config.bq_dataset, &config.bq_table),
        templates,
        config.staging_dir.clone(),
    ))
}

fn build_fetch_strategy(
    config: &AppConfig,
) -> anyhow::Result<FetchStrategy<BrowserlessDriver, StdRandom>> {
    let driver = BrowserlessDriver::new(&config.browserless_url, config.browserless_token.as_deref())
        .map_err(|e| anyhow::anyhow!("failed to build browser driver: {e}"))?;

    let unlocker = match config.unlocker_token.as_deref() {
        Some(token) => Some(
            UnlockerClient::new(
                &config.unlocker_url,
                token,
                &config.unlocker_zone,
                config.unlocker_timeout_secs,
            )
            .map_err(|e| anyhow::anyhow!("failed to build unlocker client: {e}"))?,
        ),
        None => {
            tracing::warn!("SDBM_UNLOCKER_TOKEN not set; challenge fallback disabled");
            None
        }
    };

    let settings = FetchSettings::new(
        &config.target_base_url,
        Duration::from_secs(config.navigation_timeout_secs),
    );
    Ok(FetchStrategy::new(
        driver,
        unlocker,
        StdRandom::from_os_rng(),
        settings,
    ))
}

#[cfg(test)]
#[path = "run_test.rs"]
mod tests;
