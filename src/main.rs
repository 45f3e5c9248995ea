use anyhow::{Context, Result};
use clap::Parser;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};

use link_spam_checker::utils::logger::init_logger;
use link_spam_checker::{Blocklist, CheckerConfig, SpamChecker};

/// Flags text whose links lead to blocklisted hosts
#[derive(Debug, Parser)]
#[command(name = "link_spam_checker", version)]
struct Args {
    /// Text to check; read from stdin when omitted
    text: Vec<String>,

    /// Configuration file (TOML, JSON or YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// File with one blocklisted hostname per line
    #[arg(short, long)]
    blocklist: Option<PathBuf>,

    /// Blocklisted hostname, may be repeated
    #[arg(long = "block", value_name = "HOST")]
    block: Vec<String>,

    /// Redirect hop budget; zero or negative disables redirect following
    #[arg(long, allow_negative_numbers = true)]
    hops: Option<i64>,

    /// Write logs to a timestamped file in this directory instead of stderr
    #[arg(long)]
    log_dir: Option<String>,
}

fn read_content(args: &Args) -> Result<String> {
    if !args.text.is_empty() {
        return Ok(args.text.join(" "));
    }
    let mut content = String::new();
    std::io::stdin()
        .read_to_string(&mut content)
        .context("Failed to read content from stdin")?;
    Ok(content)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logger(args.log_dir.as_deref())?;

    let config = CheckerConfig::load(args.config.as_deref())?;
    debug!("Effective configuration: {:?}", config);

    let hop_budget = match args.hops {
        Some(hops) => hops,
        None => i64::try_from(config.max_hops).context("max_hops is too large")?,
    };

    let mut blocklist = Blocklist::new(config.blocklist.iter().cloned()).with_matching(config.host_matching);
    if let Some(path) = &args.blocklist {
        blocklist.extend(Blocklist::from_file(path)?.hosts().iter().cloned());
    }
    blocklist.extend(args.block.iter().cloned());
    info!("Using {} blocklisted hosts", blocklist.len());

    let content = read_content(&args)?;
    let checker = SpamChecker::from_config(config)?;

    if checker.is_spam(&content, &blocklist, hop_budget).await {
        println!("spam");
        Ok(ExitCode::from(1))
    } else {
        println!("clean");
        Ok(ExitCode::SUCCESS)
    }
}
