//! Load Client
//!
//! Generates random property descriptions and posts them to a running
//! price service.

use futures::stream::{self, StreamExt};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Request body matching the service's JSON endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PropertyPayload {
    city: String,
    locality: String,
    property_type: String,
    area_sqft: f64,
    bedrooms: u32,
    bathrooms: u32,
    age_years: f64,
    floor: u32,
    total_floors: u32,
    furnishing: String,
    parking: String,
    facing: String,
    gym: bool,
    swimming_pool: bool,
}

/// City and locality pairs the reference encoders know together
const NEIGHBOURHOODS: [(&str, &str); 6] = [
    ("Mumbai", "Andheri"),
    ("Bengaluru", "Whitefield"),
    ("Pune", "Baner"),
    ("Delhi", "Dwarka"),
    ("Hyderabad", "Gachibowli"),
    ("Chennai", "Velachery"),
];

/// Property generator for load testing
struct PropertyGenerator {
    rng: rand::rngs::ThreadRng,
}

impl PropertyGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// Generate a plausible property in a supported city
    fn generate_typical(&mut self) -> PropertyPayload {
        let bedrooms = self.rng.gen_range(1..=4);
        let total_floors = self.rng.gen_range(2..=30);

        let (city, locality) = NEIGHBOURHOODS[self.rng.gen_range(0..NEIGHBOURHOODS.len())];

        PropertyPayload {
            city: city.to_string(),
            locality: locality.to_string(),
            property_type: self
                .random_choice(&["Apartment", "Independent House", "Villa"])
                .to_string(),
            area_sqft: (self.rng.gen_range(350.0..3_500.0_f64)).round(),
            bedrooms,
            bathrooms: self.rng.gen_range(1..=bedrooms),
            age_years: self.rng.gen_range(0..25) as f64,
            floor: self.rng.gen_range(0..=total_floors),
            total_floors,
            furnishing: self
                .random_choice(&["Furnished", "Semi-Furnished", "Unfurnished"])
                .to_string(),
            parking: self.random_choice(&["Yes", "No"]).to_string(),
            facing: self
                .random_choice(&["North", "East", "South", "West", "North-East"])
                .to_string(),
            gym: self.rng.gen_bool(0.3),
            swimming_pool: self.rng.gen_bool(0.2),
        }
    }

    /// Generate a property in a locality the encoders have never seen
    fn generate_unseen(&mut self) -> PropertyPayload {
        let mut payload = self.generate_typical();
        payload.locality = format!("New Layout {}", self.rng.gen_range(1..500));
        payload
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

#[derive(Debug, Default)]
struct Tally {
    ok: u64,
    client_errors: u64,
    server_errors: u64,
    transport_errors: u64,
    latencies_ms: Vec<f64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("load_client=info".parse()?),
        )
        .init();

    info!("Starting Load Client");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let base_url = args
        .get(1)
        .map(|s| s.trim_end_matches('/').to_string())
        .unwrap_or_else(|| "http://localhost:5000".to_string());
    let count: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(100);
    let unseen_rate: f64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(0.1);
    let concurrency: usize = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(8);

    info!(
        base_url = %base_url,
        count = count,
        unseen_rate = unseen_rate,
        concurrency = concurrency,
        "Configuration loaded"
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    // Check the service before sending load
    match client.get(format!("{base_url}/health")).send().await {
        Ok(response) if response.status().is_success() => {
            let health: serde_json::Value = response.json().await?;
            info!(health = %health, "Service is up");
        }
        Ok(response) => {
            warn!(status = %response.status(), "Service is not healthy. Running in dry-run mode.");
            return run_dry_mode(count, unseen_rate);
        }
        Err(e) => {
            warn!(error = %e, "Failed to reach service. Running in dry-run mode.");
            return run_dry_mode(count, unseen_rate);
        }
    }

    let mut generator = PropertyGenerator::new();
    let mut rng = rand::thread_rng();
    let payloads: Vec<PropertyPayload> = (0..count)
        .map(|_| {
            if rng.gen_bool(unseen_rate) {
                generator.generate_unseen()
            } else {
                generator.generate_typical()
            }
        })
        .collect();

    info!("Starting to post {} properties...", count);
    let started = Instant::now();
    let url = format!("{base_url}/api/predict");

    let results: Vec<(Result<reqwest::StatusCode, reqwest::Error>, Duration)> =
        stream::iter(payloads)
            .map(|payload| {
                let client = client.clone();
                let url = url.clone();
                async move {
                    let sent = Instant::now();
                    let status = client
                        .post(&url)
                        .json(&payload)
                        .send()
                        .await
                        .map(|r| r.status());
                    (status, sent.elapsed())
                }
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

    let mut tally = Tally::default();
    for (status, elapsed) in results {
        match status {
            Ok(s) if s.is_success() => {
                tally.ok += 1;
                tally.latencies_ms.push(elapsed.as_secs_f64() * 1000.0);
            }
            Ok(s) if s.is_client_error() => tally.client_errors += 1,
            Ok(_) => tally.server_errors += 1,
            Err(e) => {
                warn!(error = %e, "Request failed");
                tally.transport_errors += 1;
            }
        }
    }

    tally.latencies_ms.sort_by(|a, b| a.total_cmp(b));
    let p50 = percentile(&tally.latencies_ms, 0.5);
    let p95 = percentile(&tally.latencies_ms, 0.95);
    let elapsed = started.elapsed().as_secs_f64();

    info!(
        "Completed! {} ok, {} rejected, {} failed, {} transport errors in {:.2}s ({:.1} req/s, p50 {:.1} ms, p95 {:.1} ms)",
        tally.ok,
        tally.client_errors,
        tally.server_errors,
        tally.transport_errors,
        elapsed,
        count as f64 / elapsed.max(f64::EPSILON),
        p50,
        p95
    );

    Ok(())
}

fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    sorted[((sorted.len() as f64 * q) as usize).min(sorted.len() - 1)]
}

fn run_dry_mode(count: u64, unseen_rate: f64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no service connection)");

    let mut generator = PropertyGenerator::new();
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let payload = if rng.gen_bool(unseen_rate) {
            generator.generate_unseen()
        } else {
            generator.generate_typical()
        };

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample property {}:\n{}", i + 1, serde_json::to_string_pretty(&payload)?);
        }
    }

    Ok(())
}
