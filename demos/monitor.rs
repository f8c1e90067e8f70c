use std::env;
use std::time::Duration;

use thermopi::{ThermoPiClient, ThermoPiConfig};

#[tokio::main]
async fn main() -> thermopi::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let host = args.get(1).expect("usage: monitor <host> [port] [interval-secs]");
    let port: u16 = args
        .get(2)
        .and_then(|p| p.parse().ok())
        .unwrap_or(thermopi::DEFAULT_PORT);
    let interval: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(30);

    let client = ThermoPiClient::builder(ThermoPiConfig::new(host).port(port))
        .on_event(|event| {
            println!("{event:?}");
        })
        .on_snapshot(|snap| {
            println!(
                "[{}] {:.1}{} -> {:.1}{} | {} | fan: {}",
                snap.name,
                snap.temp,
                snap.units,
                snap.target_temp,
                snap.units,
                snap.current_operation(),
                if snap.fan { "on" } else { "off" },
            );
        })
        .on_error(|e| eprintln!("Device error: {e}"))
        .build()?;

    println!("Polling {host}:{port} every {interval}s...");

    loop {
        // Failures are already reported through on_error.
        let _ = client.refresh().await;
        tokio::time::sleep(Duration::from_secs(interval)).await;
    }
}
