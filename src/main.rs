//! Console front end for the auth demo
//!
//! Usage:
//!   auth-demo [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>   Configuration file path
//!   -u, --url <URL>       Gateway server URL override
//!   -l, --log-level       Log level (error, warn, info, debug, trace)
//!   -h, --help            Print help
//!
//! A small command loop stands in for the demo's web page; `help` lists
//! the commands.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use mqtt_auth_demo::auth::UserDirectory;
use mqtt_auth_demo::client::ClientEvent;
use mqtt_auth_demo::config::Config;
use mqtt_auth_demo::controller::{Controller, Row, RowColor, UiSink};
use mqtt_auth_demo::gateway::{DemoAuthHook, Gateway};

/// Log level for CLI
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum LogLevel {
    /// Only errors
    Error,
    /// Warnings and errors
    #[default]
    Warn,
    /// Informational messages
    Info,
    /// Debug messages
    Debug,
    /// Trace messages (very verbose)
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

/// MQTT authentication and authorization demo
#[derive(Parser, Debug)]
#[command(name = "auth-demo")]
#[command(version = "0.1.0")]
#[command(about = "MQTT authentication and authorization demo")]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Gateway server URL override
    #[arg(short = 'u', long)]
    url: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, value_enum)]
    log_level: Option<LogLevel>,
}

/// UiSink that renders onto the terminal.
struct ConsoleUi;

impl ConsoleUi {
    fn color_tag(color: Option<RowColor>) -> &'static str {
        match color {
            Some(RowColor::Yellow) => "[yellow]",
            Some(RowColor::Orange) => "[orange]",
            Some(RowColor::Red) => "[red]",
            None => "",
        }
    }
}

impl UiSink for ConsoleUi {
    fn toast_error(&self, message: &str) {
        println!("!! {}", message);
    }

    fn row_changed(&self, row: &Row) {
        println!("{:>16} {} {}", row.id, Self::color_tag(row.color), row.label);
    }

    fn connect_changed(&self, armed: bool) {
        if armed {
            println!("-- type `connect` to attach to the broker");
        }
    }

    fn panels_revealed(&self) {
        println!("-- connected; `pub N` and `sub N` are live");
    }

    fn application_shown(&self) {
        println!("-- logged in");
    }

    fn application_hidden(&self) {
        println!("-- logged out");
    }

    fn user_table(&self, table: &str) {
        println!("{}", table);
    }
}

const HELP: &str = "\
commands:
  users             show the demo user table
  login USER PASS   authenticate and open a gateway session
  connect           attach the client to the broker
  pub N             click publish row N
  sub N             click subscription row N
  grid              print every grid row
  logout            close the session
  quit              exit";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = if let Some(config_path) = &args.config {
        match Config::load(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Error loading config file: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::from_env().unwrap_or_default()
    };
    if let Some(url) = args.url {
        config.gateway.server_url = url;
    }

    // CLI overrides config, config overrides default (warn)
    let log_level = args.log_level.unwrap_or_else(|| {
        match config.log.level.to_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" => LogLevel::Warn,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => LogLevel::Warn,
        }
    });

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level.to_tracing_level())
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if let Some(path) = &args.config {
        info!("Loaded configuration from {:?}", path);
    }
    info!("Gateway server URL: {}", config.gateway.server_url);

    let hook = Arc::new(DemoAuthHook::new(&config.users));
    let gateway = Gateway::new(&config.gateway, hook);
    let directory = UserDirectory::new(&config.users);

    let (event_tx, mut event_rx) = mpsc::channel::<ClientEvent>(64);
    let mut controller = Controller::new(&config, gateway, directory, ConsoleUi, event_tx);

    controller.show_user_table();
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !dispatch(&mut controller, line.trim()).await {
                    break;
                }
            }
            Some(event) = event_rx.recv() => {
                controller.handle_event(event).await;
            }
        }
    }

    controller.logout().await;
    // Drain whatever the shutdown produced.
    while let Ok(event) = event_rx.try_recv() {
        controller.handle_event(event).await;
    }
    Ok(())
}

/// Run one console command. Returns false when the loop should stop.
async fn dispatch(controller: &mut Controller<ConsoleUi>, line: &str) -> bool {
    let mut parts = line.split_whitespace();
    match parts.next() {
        None => {}
        Some("users") => controller.show_user_table(),
        Some("login") => match (parts.next(), parts.next()) {
            (Some(user), Some(pass)) => controller.login(user, pass).await,
            _ => println!("usage: login USER PASS"),
        },
        Some("connect") => controller.connect().await,
        Some("pub") => match parts.next().and_then(|n| n.parse().ok()) {
            Some(n) => controller.publish_row(n).await,
            None => println!("usage: pub N"),
        },
        Some("sub") => match parts.next().and_then(|n| n.parse().ok()) {
            Some(n) => controller.subscribe_row(n).await,
            None => println!("usage: sub N"),
        },
        Some("grid") => {
            for row in controller.grid().rows() {
                println!(
                    "{:>16} {} {}",
                    row.id,
                    ConsoleUi::color_tag(row.color),
                    row.label
                );
            }
        }
        Some("logout") => controller.logout().await,
        Some("help") => println!("{}", HELP),
        Some("quit") | Some("exit") => return false,
        Some(other) => println!("unknown command: {} (try `help`)", other),
    }
    true
}
