//! Command-line front end: the dashboard server, a headless polling run, and
//! one-shot list maintenance commands.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::io::{BufRead, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::AppConfig;
use crate::event_log::{self, DRAIN_INTERVAL};
use crate::models::{format_money, parse_target_price, PriceCheck, TrackedProduct};
use crate::plugins::notifiers::{EmailConfig, EmailNotifier};
use crate::plugins::trackers::PriceTracker;
use crate::plugins::traits::{NotifierPlugin, TrackerPlugin};
use crate::product_manager::ProductManager;
use crate::scheduler::{LoopState, ProductScheduler};
use crate::web::{self, AppState, ProductView};

pub const REMOVE_PROMPT: &str = "Are you sure you want to remove the selected product?";
pub const QUIT_WARNING: &str = "Scraper is running. Press Ctrl-C again to quit.";

#[derive(Debug, Parser)]
#[command(name = "deal-hunter", version, about = "Watch product pages and email when prices drop")]
pub struct Cli {
    /// Tracking list CSV (overrides storage.products_file)
    #[arg(long, global = true, value_name = "FILE")]
    pub products_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the web dashboard (default)
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        #[command(flatten)]
        email: EmailArgs,
    },
    /// Poll in the foreground, printing the activity log
    Run {
        #[command(flatten)]
        email: EmailArgs,
    },
    /// Track a product page
    Add { url: String, price: String },
    /// Stop tracking the product at INDEX (see `list`)
    Remove {
        index: usize,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show the tracking list
    List {
        #[arg(long)]
        json: bool,
    },
    /// Check one page now without tracking it
    Check { url: String },
}

#[derive(Debug, Clone, Default, Args)]
pub struct EmailArgs {
    /// Address alerts are sent from (also the SMTP login)
    #[arg(long, env = "DEALHUNTER_SENDER")]
    pub sender: Option<String>,

    /// Address alerts are sent to
    #[arg(long, env = "DEALHUNTER_RECEIVER")]
    pub receiver: Option<String>,

    /// SMTP app password for the sender account
    #[arg(long, env = "DEALHUNTER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

impl EmailArgs {
    pub fn into_config(self) -> EmailConfig {
        EmailConfig::new(
            self.sender.unwrap_or_default(),
            self.receiver.unwrap_or_default(),
            self.password.unwrap_or_default(),
        )
    }
}

impl Cli {
    /// Applies command-line overrides on top of the layered configuration.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(path) = &self.products_file {
            config.storage.products_file = path.to_string_lossy().into_owned();
        }
        if let Some(Command::Serve { host, port, .. }) = &self.command {
            if let Some(host) = host {
                config.server.host = host.clone();
            }
            if let Some(port) = port {
                config.server.port = *port;
            }
        }
    }
}

pub async fn execute(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    let command = cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
        email: EmailArgs::default(),
    });

    match command {
        Command::Serve { email, .. } => serve(&config, email.into_config()).await,
        Command::Run { email } => run_headless(&config, email.into_config()).await,
        Command::Add { url, price } => {
            let mut products = load_products(&config)?;
            let message = add_product(&mut products, &url, &price)?;
            println!("{}", message);
            Ok(())
        }
        Command::Remove { index, yes } => {
            let mut products = load_products(&config)?;
            if !yes {
                let stdin = std::io::stdin();
                let confirmed = confirm(stdin.lock(), std::io::stdout(), REMOVE_PROMPT)?;
                if !confirmed {
                    println!("Nothing removed.");
                    return Ok(());
                }
            }
            let removed = products.remove(index)?;
            println!("Product removed: {}", removed.url);
            Ok(())
        }
        Command::List { json } => {
            let products = load_products(&config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&ProductView::list(products.products()))?);
            } else {
                print!("{}", format_list(products.products()));
            }
            Ok(())
        }
        Command::Check { url } => {
            let product = TrackedProduct::new(url, 0.0)?;
            let tracker = PriceTracker::new(&config.scraper)?;
            let check = tracker.check(&product.url).await;
            println!("{}", describe_check(&check));
            Ok(())
        }
    }
}

fn load_products(config: &AppConfig) -> anyhow::Result<ProductManager> {
    ProductManager::load(&config.storage.products_file)
        .with_context(|| format!("Failed to load tracking list from {}", config.storage.products_file))
}

fn plugins(config: &AppConfig) -> anyhow::Result<(Arc<dyn TrackerPlugin>, Arc<dyn NotifierPlugin>)> {
    let tracker: Arc<dyn TrackerPlugin> = Arc::new(PriceTracker::new(&config.scraper)?);
    let notifier: Arc<dyn NotifierPlugin> = Arc::new(EmailNotifier::new(config.notifications.smtp.clone()));
    Ok((tracker, notifier))
}

async fn serve(config: &AppConfig, email: EmailConfig) -> anyhow::Result<()> {
    let products = load_products(config)?;
    let (tracker, notifier) = plugins(config)?;

    let state = AppState::new(config, products, tracker, notifier, email);
    web::serve(config, state).await
}

/// Polls in the foreground until Ctrl-C. The first Ctrl-C stops the loop and warns;
/// a second one quits without waiting for the worker.
async fn run_headless(config: &AppConfig, email: EmailConfig) -> anyhow::Result<()> {
    let products = Arc::new(RwLock::new(load_products(config)?));
    let (tracker, notifier) = plugins(config)?;
    let (log, mut receiver) = event_log::channel();

    let mut scheduler = ProductScheduler::new(tracker, notifier, products, config.scheduler.clone(), log);
    scheduler.start(email).await?;

    let color = std::io::stdout().is_terminal();
    let mut ticker = tokio::time::interval(DRAIN_INTERVAL);
    let mut quit_armed = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for entry in receiver.drain() {
                    println!("{}", entry.render(color));
                }
                if scheduler.state() == LoopState::Stopped {
                    break;
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                if quit_armed {
                    tracing::warn!("Quitting while the scraper is still stopping");
                    return Ok(());
                }
                quit_armed = true;
                scheduler.stop();
                eprintln!("{}", QUIT_WARNING);
            }
        }
    }

    scheduler.wait().await;
    for entry in receiver.drain() {
        println!("{}", entry.render(color));
    }
    Ok(())
}

pub fn add_product(products: &mut ProductManager, url: &str, price: &str) -> crate::Result<String> {
    let target_price = parse_target_price(price)?;
    products.add(TrackedProduct::new(url, target_price)?)?;
    Ok("Product added successfully.".to_string())
}

/// Asks a yes/no question; anything but `y`/`yes` is a no.
pub fn confirm(mut input: impl BufRead, mut output: impl Write, prompt: &str) -> std::io::Result<bool> {
    write!(output, "{} [y/N] ", prompt)?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

pub fn format_list(products: &[TrackedProduct]) -> String {
    if products.is_empty() {
        return "No products tracked yet.\n".to_string();
    }
    products
        .iter()
        .enumerate()
        .map(|(index, p)| format!("{:>3}  {:>10}  {}\n", index, format_money(p.target_price), p.url))
        .collect()
}

pub fn describe_check(check: &PriceCheck) -> String {
    match check {
        PriceCheck::Found { title, price } => format!("{}\n  - Price: {}", title, format_money(*price)),
        PriceCheck::Failed { title: Some(title), reason } => format!("{}\n  - {}", title, reason),
        PriceCheck::Failed { title: None, reason } => format!("  - {}", reason),
    }
}
