//! Traffic generator for the auth demo
//!
//! Connects straight to the MQTT broker (no gateway, no authentication)
//! and publishes a short random payload to every demo topic on a fixed
//! interval, so subscription rows have something to show.
//!
//! Usage:
//!   feed <BROKER_URL> [OPTIONS]

use std::path::PathBuf;

use clap::Parser;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use mqtt_auth_demo::client::{parse_broker_url, random_payload};
use mqtt_auth_demo::config::Config;

/// Auth demo traffic generator
#[derive(Parser, Debug)]
#[command(name = "feed")]
#[command(version = "0.1.0")]
#[command(about = "Publishes random messages to the demo topics")]
struct Args {
    /// Broker URL, e.g. mqtt://localhost:1883
    broker_url: Option<String>,

    /// Configuration file path (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let Some(broker_url) = args.broker_url else {
        eprintln!("Please specify a valid broker URL, e.g. mqtt://localhost:1883");
        std::process::exit(1);
    };

    let config = if let Some(config_path) = &args.config {
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

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let (host, port) = match parse_broker_url(&broker_url) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Invalid broker URL: {}", e);
            std::process::exit(1);
        }
    };

    let client_id = format!("feed-{}", random_payload(6));
    let mut options = MqttOptions::new(client_id, host, port);
    options.set_keep_alive(std::time::Duration::from_secs(30));

    let (client, mut eventloop) = AsyncClient::new(options, 10);

    let topics = config.topics.all();
    let interval = config.feed.interval;
    let payload_len = config.feed.payload_len;
    info!(
        "Feeding {} topics every {:?} via {}",
        topics.len(),
        interval,
        broker_url
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            for topic in &topics {
                let payload = random_payload(payload_len);
                if client
                    .publish(topic.as_str(), QoS::AtMostOnce, false, payload)
                    .await
                    .is_err()
                {
                    // The request channel is gone; the event loop side
                    // reports the cause and exits.
                    return;
                }
            }
        }
    });

    // Keep the event loop turning; publishes only flush through here.
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!("Connected to broker: {:?}", ack.code);
            }
            Ok(_) => {}
            Err(e) => {
                error!("Connection to broker lost: {}", e);
                std::process::exit(1);
            }
        }
    }
}
