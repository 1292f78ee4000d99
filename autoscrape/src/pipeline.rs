//! Fetch, extract, keep what is new, store it and tell about it.

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::{error, info, instrument};

use crate::error::Result;
use crate::extract::extract_with;
use crate::fetch::Fetcher;
use crate::notify::{ChannelOutcome, Notifier};
use crate::record::Record;
use crate::store;
use crate::target::CompiledTarget;

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Store used by targets without their own `csv_path`.
    pub csv_path: PathBuf,
    pub unique_key: String,
    pub alerts_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct TargetReport {
    pub name: String,
    pub path: PathBuf,
    /// Records extracted from the page, after dedup.
    pub scraped: usize,
    /// Records appended to the store.
    pub new_records: Vec<Record>,
    pub alerts: Vec<ChannelOutcome>,
}

/// Fetch and extract one target without storing anything.
pub async fn scrape(site: &CompiledTarget, fetcher: &Fetcher) -> Result<Vec<Record>> {
    // selectors first, a broken target should not cost a request
    let rules = site.rules()?;
    let target = &site.target;
    let html = fetcher.fetch(&target.url).await?;
    Ok(extract_with(&html, rules, &target.url, &target.name))
}

/// Keep records whose unique value is set and neither stored nor seen earlier in the batch.
pub fn select_new(records: Vec<Record>, existing: &HashSet<String>, unique_key: &str) -> Vec<Record> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| match r.value(unique_key) {
            Some(k) => !existing.contains(k) && seen.insert(k.to_string()),
            None => false,
        })
        .collect()
}

#[instrument(skip_all, fields(site = %site.name()))]
pub async fn run_target(
    site: &CompiledTarget,
    opts: &RunOptions,
    fetcher: &Fetcher,
    notifier: &Notifier,
) -> Result<TargetReport> {
    let target = &site.target;
    info!("Scraping: {}", target.name);

    let scraped = scrape(site, fetcher).await?;
    let count = scraped.len();

    let path = target.csv_path.clone().unwrap_or_else(|| opts.csv_path.clone());
    let existing = store::load_existing_keys(&path, &opts.unique_key)?;
    let new_records = select_new(scraped, &existing, &opts.unique_key);

    let mut alerts = Vec::new();
    if new_records.is_empty() {
        info!("No new items for {}", target.name);
    } else {
        info!("{} new item(s) for {}", new_records.len(), target.name);
        store::append(&path, &new_records)?;

        if opts.alerts_enabled {
            alerts = notifier
                .notify(&new_records, &opts.unique_key, &target.name)
                .await;
        }
    }

    Ok(TargetReport {
        name: target.name.clone(),
        path,
        scraped: count,
        new_records,
        alerts,
    })
}

/// Run every target in turn; a failing target is logged and the others still run.
pub async fn run_all(
    sites: &[CompiledTarget],
    opts: &RunOptions,
    fetcher: &Fetcher,
    notifier: &Notifier,
) -> Vec<(String, Result<TargetReport>)> {
    let mut results = Vec::with_capacity(sites.len());
    for site in sites {
        let res = run_target(site, opts, fetcher, notifier).await;
        if let Err(e) = &res {
            error!("Failed to scrape {}: {e}", site.name());
        }
        results.push((site.name().to_string(), res));
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(link: &str) -> Record {
        Record::new().with("link", link).with("title", "t")
    }

    #[test]
    fn test_select_new() {
        let existing = HashSet::from(["old".to_string()]);
        let mut no_key = Record::new().with("title", "x");
        no_key.set("link", None);
        let records = vec![
            rec("old"),
            rec("new1"),
            no_key,
            rec(""),
            rec("new2"),
            Record::new().with("link", "new1").with("title", "other"),
        ];

        let res = select_new(records, &existing, "link");
        let keys: Vec<_> = res.iter().filter_map(|r| r.value("link")).collect();
        assert_eq!(vec!["new1", "new2"], keys);
    }

    #[test]
    fn test_select_new_nothing_stored() {
        let res = select_new(vec![rec("a"), rec("b")], &HashSet::new(), "link");
        assert_eq!(2, res.len());
    }
}
