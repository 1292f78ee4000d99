use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use eyre::{eyre, Result};
use tracing::{error, info};

use autoscrape::config::{Config, CONFIG};
use autoscrape::logging::init_logging;
use autoscrape::session::{pick_target, MenuChoice, Session, DRY_RUN_PREVIEW};
use autoscrape::{CompiledTarget, FetchOptions, Fetcher, Notifier, TargetReport};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = CONFIG)]
    config: PathBuf,

    /// Directory receiving the log file
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Only log to the terminal
    #[arg(long)]
    no_log_file: bool,

    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape targets, store new items and send alerts
    Run {
        /// Only this target
        #[arg(short, long)]
        target: Option<String>,

        /// Force alerts on
        #[arg(long, conflicts_with = "no_alerts")]
        alerts: bool,

        /// Force alerts off
        #[arg(long)]
        no_alerts: bool,
    },
    /// Scrape one target and show a few items, nothing is saved or sent
    DryRun {
        /// Defaults to the first target
        #[arg(short, long)]
        target: Option<String>,
    },
    /// Scrape every target and show at most `limit` items each
    Preview {
        #[arg(short, long)]
        limit: usize,
    },
    /// Interactive menu
    Menu,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env holds the alert channel credentials
    dotenv().ok();

    let args = Args::parse();

    let log_dir = if args.no_log_file {
        None
    } else {
        fs::create_dir_all(&args.log_dir)?;
        Some(args.log_dir.as_path())
    };
    init_logging(log_dir);

    let config = Config::load(&args.config)?;
    let fetcher = Fetcher::new(FetchOptions::default())?;
    let notifier = Notifier::from_env()?;
    let mut session = Session::new(config, fetcher, notifier);

    match args.cmd.unwrap_or(Command::Menu) {
        Command::Run {
            target,
            alerts,
            no_alerts,
        } => {
            if alerts {
                session.alerts_enabled = true;
            } else if no_alerts {
                session.alerts_enabled = false;
            }
            run(&session, target.as_deref()).await
        }
        Command::DryRun { target } => {
            let site = find_target(&session, target.as_deref())?;
            dry_run(&session, site).await;
            Ok(())
        }
        Command::Preview { limit } => {
            preview(&session, limit).await;
            Ok(())
        }
        Command::Menu => menu(&mut session).await,
    }
}

fn find_target<'a>(session: &'a Session, name: Option<&str>) -> Result<&'a CompiledTarget> {
    match name {
        Some(name) => session
            .site(name)
            .ok_or_else(|| eyre!("unknown target {name}")),
        None => session
            .sites()
            .first()
            .ok_or_else(|| eyre!("no targets configured")),
    }
}

async fn run(session: &Session, name: Option<&str>) -> Result<()> {
    let results = match name {
        Some(name) => {
            let site = find_target(session, Some(name))?;
            vec![(site.name().to_string(), session.run(site).await)]
        }
        None => session.run_all().await,
    };

    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
    for (name, res) in &results {
        match res {
            Ok(report) => summary(report),
            Err(e) => error!("{name}: {e}"),
        }
    }
    if failed > 0 {
        return Err(eyre!("{failed} of {} target(s) failed", results.len()));
    }
    Ok(())
}

fn summary(report: &TargetReport) {
    info!(
        "{}: {} scraped, {} new, stored in {}",
        report.name,
        report.scraped,
        report.new_records.len(),
        report.path.display()
    );
    for alert in &report.alerts {
        info!("{}: {} alert {:?}", report.name, alert.channel, alert.delivery);
    }
}

async fn dry_run(session: &Session, site: &CompiledTarget) {
    println!("Dry-run mode: nothing is saved or sent.");
    match session.scrape(site).await {
        Ok(records) => {
            println!("Preview (first {DRY_RUN_PREVIEW} items):");
            for r in records.iter().take(DRY_RUN_PREVIEW) {
                match serde_json::to_string(r) {
                    Ok(s) => println!("  {s}"),
                    Err(e) => error!("cannot render record: {e}"),
                }
            }
        }
        Err(e) => error!("Dry-run failed: {e}"),
    }
}

async fn preview(session: &Session, limit: usize) {
    for (name, res) in session.preview(limit).await {
        println!("🔍 Scraping: {name}");
        match res {
            Ok(records) => {
                println!("Preview ({limit} items):");
                for r in &records {
                    println!("{}", session.preview_line(r));
                }
            }
            Err(e) => error!("Failed to scrape {name}: {e}"),
        }
    }
}

fn prompt(msg: &str) -> Result<String> {
    print!("{msg}");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        // EOF behaves like quitting
        return Ok("q".to_string());
    }
    Ok(line.trim().to_string())
}

async fn menu(session: &mut Session) -> Result<()> {
    loop {
        println!("\n=== AutoScrape Alerts ===");
        println!("[1] Scrape all sites");
        println!("[2] Choose a specific site to scrape");
        println!("[3] Dry-run mode (test without saving)");
        println!("[4] Scrape with item limit");
        println!(
            "[o] Alert options: {}",
            if session.alerts_enabled {
                "Enabled 🔔"
            } else {
                "Disabled 🔕"
            }
        );
        println!("[q] Quit");

        let Some(choice) = MenuChoice::parse(&prompt("→ Choice: ")?) else {
            println!("❌ Invalid choice");
            continue;
        };

        match choice {
            MenuChoice::ScrapeAll => {
                if let Err(e) = run(session, None).await {
                    error!("{e}");
                }
            }
            MenuChoice::ChooseTarget => {
                println!("\nAvailable sites:");
                for (i, site) in session.sites().iter().enumerate() {
                    println!("[{}] {}", i + 1, site.name());
                }
                let input = prompt("→ Choose a site: ")?;
                match pick_target(session.sites(), &input) {
                    Some(site) => {
                        let name = site.name().to_string();
                        if let Err(e) = run(session, Some(&name)).await {
                            error!("{e}");
                        }
                    }
                    None => println!("❌ Invalid site number"),
                }
            }
            MenuChoice::DryRun => match session.sites().first() {
                Some(site) => dry_run(session, site).await,
                None => println!("❌ No targets configured"),
            },
            MenuChoice::Limit => match prompt("Item limit: ")?.parse::<usize>() {
                Ok(limit) => preview(session, limit).await,
                Err(_) => println!("❌ Invalid number"),
            },
            MenuChoice::ToggleAlerts => {
                let status = if session.toggle_alerts() {
                    "enabled 🔔"
                } else {
                    "disabled 🔕"
                };
                println!("Alerts {status}");
                info!("Alerts {status}");
            }
            MenuChoice::Quit => {
                println!("👋 Bye");
                return Ok(());
            }
        }
    }
}
