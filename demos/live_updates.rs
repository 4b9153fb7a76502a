//! Live station updates
//!
//! Subscribes twice to the same station feed and prints every update. Both
//! subscribers share one upstream connection.
//!
//! Usage:
//!   cargo run --example live_updates -- <api-base-url> <server> <station>
//!
//! Example:
//!   cargo run --example live_updates -- https://weather.example/api/ wu KUTPROVO12

use std::time::Duration;

use sse_fanout::registry::{Delivery, RegistryConfig, Subscription};
use sse_fanout::weather::{Conditions, WeatherApi};

fn print_usage() {
    println!("Usage: live_updates <api-base-url> <server> <station>");
}

async fn watch(name: &'static str, mut updates: Subscription<Conditions>) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    tokio::pin!(ctrl_c);

    loop {
        match updates.recv_or_cancel(&mut ctrl_c).await {
            Delivery::Value(conditions) => {
                let mut sensors: Vec<_> = conditions.sensors.iter().collect();
                sensors.sort_by(|a, b| a.0.cmp(b.0));

                println!("[{}] {} @ {}", name, conditions.station, conditions.time);
                for (sensor, readings) in sensors {
                    for reading in readings {
                        println!("    {:<16} {:>10.2} {}", sensor, reading.value, reading.unit);
                    }
                }
            }
            Delivery::Closed(reason) => {
                println!("[{}] feed closed: {:?}", name, reason);
                break;
            }
            Delivery::Cancelled => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let (base, server, station) = match args.as_slice() {
        [_, base, server, station] => (base, server, station),
        _ => {
            print_usage();
            std::process::exit(1);
        }
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sse_fanout=info".parse()?)
                .add_directive("live_updates=info".parse()?),
        )
        .init();

    let config = RegistryConfig::default()
        .idle_timeout(Duration::from_secs(300))
        .reclaim_interval(Duration::from_secs(30));
    let api = WeatherApi::connect(base, config)?;
    let reclaim = api.conditions_registry().spawn_reclaim_task();

    match api.station_info(server, station).await {
        Ok(info) => println!(
            "{} {} ({} {}), {}, {}",
            info.station, info.make, info.model, info.software, info.city, info.country
        ),
        Err(e) if e.is_not_found() => {
            eprintln!("Station {}/{} not found", server, station);
            std::process::exit(1);
        }
        Err(e) => eprintln!("Station info unavailable: {}", e),
    }

    let first = api.station_condition_updates(server, station).await?;
    let second = api.station_condition_updates(server, station).await?;

    tokio::join!(watch("a", first), watch("b", second));

    println!("\nShutting down...");
    api.conditions_registry().shutdown().await;
    reclaim.abort();

    Ok(())
}
