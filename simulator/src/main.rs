mod telemetry;

use clap::Parser;
use rand::Rng;
use std::time::Duration;
use telemetry::TelemetryRequest;
use tracing::{error, info, warn};

/// HTTP device simulator for the telemetry gateway. Registers a device and
/// pushes randomized readings, optionally forcing anomalous temperatures
/// after a number of sends.
#[derive(Parser, Debug)]
struct Args {
    /// Gateway base URL
    #[arg(long, env = "GATEWAY_URL", default_value = "http://127.0.0.1:8080")]
    url: String,

    /// Device identifier
    #[arg(long, env = "DEVICE_ID", default_value = "sim-device-01")]
    device_id: String,

    /// Device token presented at registration and on every reading
    #[arg(long, env = "DEVICE_TOKEN", default_value = "secret123")]
    token: String,

    /// Seconds between sends
    #[arg(long, env = "SEND_INTERVAL", default_value_t = 3)]
    interval: u64,

    /// Switch to anomalous temperatures after this many sends (0 = never)
    #[arg(long, env = "FORCE_ANOMALY_AFTER", default_value_t = 0)]
    force_anomaly_after: u64,

    /// Stop after this many readings (0 = run forever)
    #[arg(long, env = "COUNT", default_value_t = 0)]
    count: u64,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt::init();

    info!("Starting device simulator");
    info!(
        "Gateway: {}, device: {}, interval: {}s",
        args.url, args.device_id, args.interval
    );

    let client = reqwest::Client::new();

    // Register before sending; the gateway rejects unregistered devices
    let resp = client
        .post(format!("{}/register", args.url))
        .json(&serde_json::json!({ "device_id": args.device_id, "token": args.token }))
        .send()
        .await;
    match resp {
        Ok(resp) if resp.status().is_success() => {
            info!("Registered device {}", args.device_id);
        }
        Ok(resp) => {
            error!("Registration rejected with status {}", resp.status());
            std::process::exit(1);
        }
        Err(e) => {
            error!("Registration request failed: {}", e);
            std::process::exit(1);
        }
    }

    let mut counter = 0u64;
    loop {
        counter += 1;
        let force_anomaly = args.force_anomaly_after > 0 && counter >= args.force_anomaly_after;
        let request = generate_reading(&args, force_anomaly);

        match client
            .post(format!("{}/data", args.url))
            .json(&request)
            .send()
            .await
        {
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                if status.is_success() {
                    info!(
                        "Sent temp={:.2} hum={:.2} -> {} {}",
                        request.temperature, request.humidity, status, body
                    );
                } else {
                    warn!(
                        "Reading rejected: {} {} (temp={:.2})",
                        status, body, request.temperature
                    );
                }
            }
            Err(e) => {
                warn!("Failed to send reading: {}", e);
            }
        }

        if args.count > 0 && counter >= args.count {
            info!("Sent {} readings, exiting", counter);
            break;
        }

        tokio::time::sleep(Duration::from_secs(args.interval)).await;
    }
}

fn generate_reading(args: &Args, force_anomaly: bool) -> TelemetryRequest {
    let mut rng = rand::thread_rng();

    let temperature = if force_anomaly {
        rng.gen_range(60.0..80.0)
    } else {
        rng.gen_range(25.0..30.0)
    };
    let humidity = rng.gen_range(40.0..55.0);

    TelemetryRequest {
        device_id: args.device_id.clone(),
        token: args.token.clone(),
        temperature,
        humidity,
    }
}
