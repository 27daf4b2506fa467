//! CLI parser and command implementations.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::style;

use crate::config::SpiderConfig;
use crate::fetch::cookies::{load_cookies, masked_value};
use crate::output::{self, DataSaver, OutputFormat};
use crate::spider::manager::{
    TemplateKind, DEFAULT_CONFIG_DIR, DEFAULT_MANAGER_OUTPUT_DIR, DEFAULT_MAX_WORKERS,
};
use crate::spider::{RunStatus, Spider, SpiderManager};

const PREVIEW_ITEMS: usize = 5;

#[derive(Parser)]
#[command(name = "smartspider")]
#[command(about = "Configuration-driven list/detail web data extraction")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl a single spider config and save the results
    Crawl {
        /// Path to the spider config (JSON)
        #[arg(short, long)]
        config: PathBuf,
        /// Output file (defaults to the config's output_path, then a timestamped file)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Only load and show the configured cookie file, do not crawl
        #[arg(long)]
        check_cookies: bool,
    },

    /// Run every config in a directory
    RunAll {
        /// Directory holding spider configs
        #[arg(long, default_value = DEFAULT_CONFIG_DIR)]
        config_dir: PathBuf,
        /// Directory for result files
        #[arg(long, default_value = DEFAULT_MANAGER_OUTPUT_DIR)]
        output_dir: PathBuf,
        /// Number of spiders to run at once
        #[arg(short, long, default_value_t = DEFAULT_MAX_WORKERS)]
        workers: usize,
    },

    /// List available spider configs
    List {
        /// Directory holding spider configs
        #[arg(long, default_value = DEFAULT_CONFIG_DIR)]
        config_dir: PathBuf,
    },

    /// Write a starter config
    Template {
        /// Config name (file stem)
        name: String,
        /// Template shape: listing or feed
        #[arg(short, long, default_value = "listing")]
        kind: String,
        /// Directory to write the config into
        #[arg(long, default_value = DEFAULT_CONFIG_DIR)]
        config_dir: PathBuf,
    },
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl {
            config,
            output,
            check_cookies,
        } => {
            if check_cookies {
                cmd_check_cookies(&config)
            } else {
                cmd_crawl(&config, output.as_deref()).await
            }
        }
        Commands::RunAll {
            config_dir,
            output_dir,
            workers,
        } => cmd_run_all(config_dir, output_dir, workers).await,
        Commands::List { config_dir } => cmd_list(config_dir),
        Commands::Template {
            name,
            kind,
            config_dir,
        } => cmd_template(config_dir, &name, &kind),
    }
}

fn load_config(path: &Path) -> anyhow::Result<SpiderConfig> {
    SpiderConfig::from_path(path)
        .with_context(|| format!("Failed to load config {}", path.display()))
}

async fn cmd_crawl(config_path: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let format = OutputFormat::parse(&config.output_format)?;
    let name = config.name.clone();
    let target = output
        .map(Path::to_path_buf)
        .or_else(|| config.output_path.clone());

    let spider = Spider::new(config).context("Invalid spider config")?;
    println!(
        "{} Crawling with {} ({:?})",
        style("→").cyan(),
        style(&name).bold(),
        spider.plan()
    );

    let records = spider.crawl().await.context("Crawl failed")?;
    println!(
        "{} Collected {} records",
        style("✓").green(),
        records.len()
    );

    match DataSaver::default().save(&records, &name, format, target.as_deref())? {
        Some(path) => println!("{} Saved to {}", style("✓").green(), path.display()),
        None => println!("{} Nothing saved", style("!").yellow()),
    }

    output::preview(&records, PREVIEW_ITEMS);
    Ok(())
}

fn cmd_check_cookies(config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let Some(ref cookie_path) = config.cookies_file else {
        println!(
            "{} {} has no cookies_file configured",
            style("!").yellow(),
            config.name
        );
        return Ok(());
    };

    let cookies = load_cookies(cookie_path);
    println!(
        "\n{} ({} cookies from {})",
        style("Cookies").bold(),
        cookies.len(),
        cookie_path.display()
    );
    println!("{}", "-".repeat(60));
    for cookie in &cookies {
        println!(
            "  {:<24} {:<24} {}",
            style(&cookie.name).cyan(),
            cookie.domain,
            masked_value(cookie)
        );
    }
    Ok(())
}

async fn cmd_run_all(config_dir: PathBuf, output_dir: PathBuf, workers: usize) -> anyhow::Result<()> {
    let manager = SpiderManager::new(config_dir, output_dir).with_max_workers(workers);
    let mut reports = manager
        .run_all()
        .await
        .with_context(|| format!("Failed to read {}", manager.config_dir().display()))?;

    if reports.is_empty() {
        println!(
            "{} No configs in {}",
            style("!").yellow(),
            manager.config_dir().display()
        );
        return Ok(());
    }

    reports.sort_by(|a, b| a.config_name.cmp(&b.config_name));
    println!("\n{}", style("Run summary").bold());
    println!("{}", "-".repeat(60));
    for report in &reports {
        match report.status {
            RunStatus::Success => println!(
                "  {} {:<24} {:>6} records  {}",
                style("✓").green(),
                report.config_name,
                report.data_count,
                report
                    .output_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "-".to_string())
            ),
            RunStatus::Failed => println!(
                "  {} {:<24} {}",
                style("✗").red(),
                report.config_name,
                report.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }

    let failed = reports
        .iter()
        .filter(|r| r.status == RunStatus::Failed)
        .count();
    println!(
        "\n{} succeeded, {} failed",
        reports.len() - failed,
        failed
    );
    Ok(())
}

fn cmd_list(config_dir: PathBuf) -> anyhow::Result<()> {
    let manager = SpiderManager::new(config_dir, DEFAULT_MANAGER_OUTPUT_DIR);
    let names = manager.list_configs()?;

    if names.is_empty() {
        println!(
            "{} No configs in {}",
            style("!").yellow(),
            manager.config_dir().display()
        );
        return Ok(());
    }

    println!("\n{}", style("Spider configs").bold());
    for name in names {
        println!("  {}", name);
    }
    Ok(())
}

fn cmd_template(config_dir: PathBuf, name: &str, kind: &str) -> anyhow::Result<()> {
    let kind = TemplateKind::parse(kind)
        .with_context(|| format!("Unknown template kind '{}' (expected listing or feed)", kind))?;
    let manager = SpiderManager::new(config_dir, DEFAULT_MANAGER_OUTPUT_DIR);
    let path = manager.create_template(name, kind)?;
    println!("{} Created {}", style("✓").green(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crawl_args() {
        let cli = Cli::parse_from(["smartspider", "-v", "crawl", "-c", "shop.json", "-o", "out"]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Crawl {
                config,
                output,
                check_cookies,
            } => {
                assert_eq!(config, PathBuf::from("shop.json"));
                assert_eq!(output, Some(PathBuf::from("out")));
                assert!(!check_cookies);
            }
            _ => panic!("expected crawl"),
        }
    }

    #[test]
    fn test_run_all_defaults() {
        let cli = Cli::parse_from(["smartspider", "run-all"]);
        match cli.command {
            Commands::RunAll {
                config_dir,
                output_dir,
                workers,
            } => {
                assert_eq!(config_dir, PathBuf::from("configs"));
                assert_eq!(output_dir, PathBuf::from("output"));
                assert_eq!(workers, 3);
            }
            _ => panic!("expected run-all"),
        }
    }

    #[test]
    fn test_template_kind_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(cmd_template(dir.path().to_path_buf(), "x", "carousel").is_err());
        assert!(cmd_template(dir.path().to_path_buf(), "x", "feed").is_ok());
        assert!(dir.path().join("x.json").exists());
    }
}
