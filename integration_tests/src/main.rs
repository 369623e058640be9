//! Downstream monitor for the radar proxy.
//!
//! Connects to the flashed bridge as a client, reads the current values,
//! then checks every notification for the given duration.

mod ble_client;
mod checks;

use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use futures::StreamExt;

use ble_client::{ProxyClient, Source};
use checks::Tally;

#[derive(Parser)]
#[command(name = "proxy-monitor")]
#[command(about = "Monitor the radar proxy's downstream characteristics")]
struct Args {
    /// Advertised name of the bridge
    #[arg(long, default_value = "RadarProxy")]
    name: String,

    /// BLE scan timeout in seconds
    #[arg(long, default_value = "10")]
    scan_timeout: u64,

    /// How long to watch notifications, in seconds
    #[arg(short, long, default_value = "30")]
    duration: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!("{}", "Radar Proxy Monitor".bold());
    println!("Scanning for \"{}\"...", args.name);

    let client = ProxyClient::connect_by_name(&args.name, Duration::from_secs(args.scan_timeout)).await?;
    println!("{}", "Connected!".green());

    let mut tally = Tally::default();
    println!("  Advertised services: {:?}", client.advertised_services);
    tally.advertisement(&client.advertised_services);

    let (radar, battery) = client.read_both().await?;
    println!("  Initial radar:   {:02X?}", radar);
    println!("  Initial battery: {:02X?}", battery);
    tally.radar(&radar);
    tally.battery(&battery);

    println!("\nWatching notifications for {} s...\n", args.duration);
    let mut updates = client.updates().await?;
    let watch = async {
        while let Some(update) = updates.next().await {
            match update.source {
                Source::Radar => {
                    println!("  {} {:02X?}", "radar  ".cyan(), update.value);
                    tally.radar(&update.value);
                }
                Source::Battery => {
                    println!("  {} {:02X?}", "battery".cyan(), update.value);
                    tally.battery(&update.value);
                }
            }
        }
    };
    if tokio::time::timeout(Duration::from_secs(args.duration), watch).await.is_ok() {
        println!("{}", "Notification stream ended early".yellow());
    }

    client.disconnect().await?;
    tally.print();

    if !tally.passed() {
        std::process::exit(1);
    }

    Ok(())
}
