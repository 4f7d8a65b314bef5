//! `scout` command line.
//!
//! Learns and replays per-site locators to scrape search results. Knowledge is
//! kept under `knowledge_dir` (see `scout.toml`), one JSON file per site.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};

use scout::exit_codes;
use scout::io::browser::ChromeSession;
use scout::io::config::{DEFAULT_CONFIG_PATH, ScoutConfig, load_config, write_config};
use scout::io::knowledge::KnowledgeStore;
use scout::io::oracle::CommandOracle;
use scout::logging;
use scout::pipeline::{SiteOutcome, SiteRequest, run_site};

#[derive(Parser)]
#[command(name = "scout", version, about = "Self-configuring search-result scraper")]
struct Cli {
    /// Config file; defaults apply when it does not exist.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a config file with default values.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Learn missing locators for a site, then collect matching posts.
    Scrape {
        /// Site home page.
        url: String,
        /// Search keyword.
        #[arg(short, long)]
        keyword: String,
        /// Only keep posts from the last N days.
        #[arg(short, long)]
        days: Option<u32>,
        /// Print posts as JSON instead of one URL per line.
        #[arg(long)]
        json: bool,
    },
    /// Print the stored knowledge for a site.
    Show { url: String },
    /// Delete the stored knowledge for a site.
    Forget { url: String },
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Scrape {
            url,
            keyword,
            days,
            json,
        } => cmd_scrape(&cli.config, &url, &keyword, days, json),
        Command::Show { url } => cmd_show(&cli.config, &url),
        Command::Forget { url } => cmd_forget(&cli.config, &url),
    }
}

fn cmd_init(config: &Path, force: bool) -> Result<i32> {
    if config.exists() && !force {
        return Err(anyhow!(
            "{} already exists (use --force to overwrite)",
            config.display()
        ));
    }
    write_config(config, &ScoutConfig::default())?;
    println!("{}", config.display());
    Ok(exit_codes::OK)
}

fn cmd_scrape(
    config: &Path,
    url: &str,
    keyword: &str,
    days: Option<u32>,
    json: bool,
) -> Result<i32> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Err(anyhow!("--keyword must not be empty"));
    }
    let cfg = load_config(config)?;
    let store = KnowledgeStore::new(&cfg.knowledge_dir);
    let oracle = CommandOracle::new(cfg.oracle.clone());
    let mut session = ChromeSession::launch(&cfg)?;
    let now = chrono::Local::now().naive_local();
    let request = SiteRequest::new(url, keyword, days, now, &cfg);

    match run_site(&mut session, &oracle, &store, &request)? {
        SiteOutcome::Scraped(report) => {
            if json {
                let out =
                    serde_json::to_string_pretty(&report.posts).context("serialize posts")?;
                println!("{out}");
            } else {
                for post in &report.posts {
                    println!("{}", post.url);
                }
            }
            Ok(exit_codes::OK)
        }
        SiteOutcome::DiscoveryFailed { section, outcome } => {
            eprintln!(
                "could not learn the {section} section of {url} after {} attempt(s): {outcome:?}",
                outcome.attempts()
            );
            Ok(exit_codes::DISCOVERY_FAILED)
        }
    }
}

fn cmd_show(config: &Path, url: &str) -> Result<i32> {
    let cfg = load_config(config)?;
    let store = KnowledgeStore::new(&cfg.knowledge_dir);
    match store.lookup(url)? {
        Some(record) => {
            let out = serde_json::to_string_pretty(&record).context("serialize knowledge")?;
            println!("{out}");
            Ok(exit_codes::OK)
        }
        None => {
            eprintln!("no knowledge stored for {url}");
            Ok(exit_codes::NO_KNOWLEDGE)
        }
    }
}

fn cmd_forget(config: &Path, url: &str) -> Result<i32> {
    let cfg = load_config(config)?;
    let store = KnowledgeStore::new(&cfg.knowledge_dir);
    if store.forget(url)? {
        println!("{}", store.path_for(url).display());
        Ok(exit_codes::OK)
    } else {
        eprintln!("no knowledge stored for {url}");
        Ok(exit_codes::NO_KNOWLEDGE)
    }
}
