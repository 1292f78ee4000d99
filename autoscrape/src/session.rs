//! Run-time state shared by the command handlers and the interactive menu.

use crate::config::Config;
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::notify::Notifier;
use crate::pipeline::{self, RunOptions, TargetReport};
use crate::record::Record;
use crate::target::CompiledTarget;

/// Records shown by a dry run.
pub const DRY_RUN_PREVIEW: usize = 5;

pub struct Session {
    pub config: Config,
    pub alerts_enabled: bool,
    sites: Vec<CompiledTarget>,
    fetcher: Fetcher,
    notifier: Notifier,
}

impl Session {
    pub fn new(config: Config, fetcher: Fetcher, notifier: Notifier) -> Self {
        let alerts_enabled = config.alerts.enabled;
        let sites = config.targets.iter().cloned().map(CompiledTarget::new).collect();
        Self {
            config,
            alerts_enabled,
            sites,
            fetcher,
            notifier,
        }
    }

    /// Flip the alerts flag, returning the new value.
    pub fn toggle_alerts(&mut self) -> bool {
        self.alerts_enabled = !self.alerts_enabled;
        self.alerts_enabled
    }

    pub fn options(&self) -> RunOptions {
        self.config.run_options(self.alerts_enabled)
    }

    pub fn sites(&self) -> &[CompiledTarget] {
        &self.sites
    }

    pub fn site(&self, name: &str) -> Option<&CompiledTarget> {
        self.sites.iter().find(|s| s.name() == name)
    }

    pub async fn run_all(&self) -> Vec<(String, Result<TargetReport>)> {
        pipeline::run_all(&self.sites, &self.options(), &self.fetcher, &self.notifier).await
    }

    pub async fn run(&self, site: &CompiledTarget) -> Result<TargetReport> {
        pipeline::run_target(site, &self.options(), &self.fetcher, &self.notifier).await
    }

    /// Scrape without storing or alerting.
    pub async fn scrape(&self, site: &CompiledTarget) -> Result<Vec<Record>> {
        pipeline::scrape(site, &self.fetcher).await
    }

    /// Scrape every target, keeping at most `limit` records of each.
    pub async fn preview(&self, limit: usize) -> Vec<(String, Result<Vec<Record>>)> {
        let mut res = Vec::with_capacity(self.sites.len());
        for site in &self.sites {
            let records = self.scrape(site).await.map(|mut r| {
                r.truncate(limit);
                r
            });
            res.push((site.name().to_string(), records));
        }
        res
    }

    pub fn preview_line(&self, record: &Record) -> String {
        preview_line(record, &self.config.storage.unique_key)
    }
}

/// `• <unique value> <title>`, either part possibly empty.
pub fn preview_line(record: &Record, unique_key: &str) -> String {
    let key = record.value(unique_key).unwrap_or("");
    let title = record.value("title").unwrap_or("");
    format!("• {key} {title}").trim().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    ScrapeAll,
    ChooseTarget,
    DryRun,
    Limit,
    ToggleAlerts,
    Quit,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(Self::ScrapeAll),
            "2" => Some(Self::ChooseTarget),
            "3" => Some(Self::DryRun),
            "4" => Some(Self::Limit),
            "o" | "O" => Some(Self::ToggleAlerts),
            "q" | "Q" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// 1-based menu index to a target.
pub fn pick_target<'a>(sites: &'a [CompiledTarget], input: &str) -> Option<&'a CompiledTarget> {
    let idx: usize = input.trim().parse().ok()?;
    sites.get(idx.checked_sub(1)?)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rstest::rstest;

    use super::*;
    use crate::fetch::FetchOptions;
    use crate::target::Target;

    fn site(name: &str) -> CompiledTarget {
        CompiledTarget::new(Target {
            name: name.to_string(),
            url: "http://127.0.0.1:1/".to_string(),
            item_selector: "li".to_string(),
            fields: BTreeMap::new(),
            csv_path: None,
        })
    }

    #[rstest]
    #[case("1", Some(MenuChoice::ScrapeAll))]
    #[case(" 2\n", Some(MenuChoice::ChooseTarget))]
    #[case("3", Some(MenuChoice::DryRun))]
    #[case("4", Some(MenuChoice::Limit))]
    #[case("o", Some(MenuChoice::ToggleAlerts))]
    #[case("Q", Some(MenuChoice::Quit))]
    #[case("9", None)]
    #[case("", None)]
    fn test_menu_choice(#[case] input: &str, #[case] expected: Option<MenuChoice>) {
        assert_eq!(expected, MenuChoice::parse(input));
    }

    #[test]
    fn test_pick_target() {
        let targets = vec![site("a"), site("b")];
        assert_eq!("a", pick_target(&targets, "1").unwrap().name());
        assert_eq!("b", pick_target(&targets, "2\n").unwrap().name());
        assert!(pick_target(&targets, "0").is_none());
        assert!(pick_target(&targets, "3").is_none());
        assert!(pick_target(&targets, "x").is_none());
    }

    #[test]
    fn test_preview_line() {
        let r = Record::new().with("link", "u").with("title", "T");
        assert_eq!("• u T", preview_line(&r, "link"));
        let r = Record::new().with("title", "T");
        assert_eq!("•  T", preview_line(&r, "link"));
        assert_eq!("•", preview_line(&Record::new(), "link"));
    }

    #[test]
    fn test_toggle_alerts() {
        let config = Config::parse(
            "[storage]\ncsv_path = \"x.csv\"\n[alerts]\nenabled = false\n",
        )
        .unwrap();
        let fetcher = Fetcher::new(FetchOptions::default()).unwrap();
        let notifier = Notifier::new(Vec::new()).unwrap();
        let mut s = Session::new(config, fetcher, notifier);

        assert!(!s.options().alerts_enabled);
        assert!(s.toggle_alerts());
        assert!(s.options().alerts_enabled);
        assert!(!s.toggle_alerts());
    }
}
