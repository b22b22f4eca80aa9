#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Operations CLI for the blockwatch alert service.
//!
//! Bundles the day-to-day tooling: start the API server, check how a raw
//! location input normalizes, preview how a set of reports would cluster
//! in moderation, seed a running server with demo data, and send a single
//! test push to verify credentials and delivery.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use blockwatch_alert_models::{IncidentType, RawReport};
use blockwatch_cluster::cluster_reports;
use blockwatch_geo::parse_location;
use blockwatch_push::PushClient;
use blockwatch_push::credentials::{
    CredentialProvider, ServiceAccountKey, ServiceAccountTokenSource,
};
use blockwatch_push::payload::{AndroidBlock, Notification, PushPayload};
use blockwatch_push::registry::fcm_provider;
use chrono::Utc;
use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "blockwatch_cli", about = "Blockwatch operations tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve,
    /// Normalize a raw location input to a canonical coordinate pair
    Parse {
        /// Raw location text: a `"lat, lon"` pair, a maps URL, or
        /// free-form text with embedded numbers
        input: String,
    },
    /// Preview how a set of raw locations would cluster in moderation
    Preview {
        /// Raw location inputs, one per report
        #[arg(required = true)]
        locations: Vec<String>,
        /// Dedup radius in kilometers
        #[arg(long, default_value = "5.0")]
        radius_km: f64,
    },
    /// Seed a running server with demo reports and subscribers
    Seed {
        /// Base URL of the server
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        server: String,
    },
    /// Send a single test push notification to a device token
    SendTest {
        /// Path to the service account key JSON file
        #[arg(long)]
        key: PathBuf,
        /// Target device push token
        #[arg(long)]
        token: String,
        /// Notification title
        #[arg(long, default_value = "Blockwatch test")]
        title: String,
        /// Notification body
        #[arg(long, default_value = "Push delivery is working.")]
        body: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            // The server uses actix-web's runtime, so we need to run it
            // in a blocking task to avoid nesting tokio runtimes.
            tokio::task::spawn_blocking(|| {
                actix_web::rt::System::new().block_on(blockwatch_server::run_server())
            })
            .await??;
        }
        Commands::Parse { input } => {
            let coord = parse_location(&input)?;
            println!("{coord}");
        }
        Commands::Preview {
            locations,
            radius_km,
        } => preview_clusters(locations, radius_km),
        Commands::Seed { server } => seed_demo_data(&server).await?,
        Commands::SendTest {
            key,
            token,
            title,
            body,
        } => send_test(&key, token, title, body).await?,
    }

    Ok(())
}

/// Clusters synthetic reports built from the given locations and prints
/// the grouping, marking members that only matched by text.
fn preview_clusters(locations: Vec<String>, radius_km: f64) {
    let now = Utc::now();
    let reports: Vec<RawReport> = locations
        .into_iter()
        .map(|location| RawReport {
            id: Uuid::new_v4(),
            incident_type: IncidentType::Other,
            severity: IncidentType::Other.default_severity(),
            location,
            description: String::new(),
            image_ref: None,
            submitter_id: "preview".to_string(),
            created_at: now,
        })
        .collect();

    let clusters = cluster_reports(reports, radius_km);

    println!("{} cluster(s) within {radius_km} km:", clusters.len());
    for (i, cluster) in clusters.iter().enumerate() {
        println!(
            "  #{}: {} report(s), anchored at {:?}",
            i + 1,
            cluster.size(),
            cluster.anchor_location,
        );
        for member in &cluster.members {
            match parse_location(&member.location) {
                Ok(coord) => println!("     {coord}"),
                Err(_) => println!("     {:?} (text match)", member.location),
            }
        }
    }
}

/// Posts a demo set of reports and subscribers to a running server: three
/// fire reports that cluster, two standalone reports, and subscribers
/// near and far from the fire.
async fn seed_demo_data(server: &str) -> Result<(), Box<dyn std::error::Error>> {
    let client = reqwest::Client::new();

    let reports = [
        ("FIRE", "37.7749, -122.4194", "Smoke coming from the roof"),
        ("FIRE", "37.7755, -122.4190", "Flames visible from the street"),
        (
            "FIRE",
            "https://maps.example.com/?q=37.7760%2C-122.4189",
            "Fire trucks arriving",
        ),
        ("FLOOD", "37.8044, -122.2712", "Water rising on the underpass"),
        (
            "ROAD_HAZARD",
            "Outside the old mill",
            "Fallen tree blocking the lane",
        ),
    ];

    for (incident_type, location, description) in reports {
        client
            .post(format!("{server}/api/reports"))
            .json(&serde_json::json!({
                "incidentType": incident_type,
                "location": location,
                "description": description,
                "submitterId": "seed",
            }))
            .send()
            .await?
            .error_for_status()?;
        log::info!("Seeded {incident_type} report at {location:?}");
    }

    let subscribers = [
        ("near-1", 37.7732, -122.4210, Some("demo-token-near-1")),
        ("near-2", 37.7790, -122.4120, Some("demo-token-near-2")),
        ("far-1", 40.7128, -74.0060, Some("demo-token-far-1")),
        ("no-token", 37.7749, -122.4194, None),
    ];

    for (user_id, latitude, longitude, token) in subscribers {
        client
            .put(format!("{server}/api/subscribers/{user_id}/location"))
            .json(&serde_json::json!({ "latitude": latitude, "longitude": longitude }))
            .send()
            .await?
            .error_for_status()?;

        if let Some(token) = token {
            client
                .put(format!("{server}/api/subscribers/{user_id}/token"))
                .json(&serde_json::json!({ "pushToken": token }))
                .send()
                .await?
                .error_for_status()?;
        }
        log::info!("Seeded subscriber {user_id}");
    }

    log::info!("Demo data seeded against {server}");
    Ok(())
}

/// Exchanges the service account key for a bearer token and delivers one
/// test notification, exercising the same path as a real fan-out.
async fn send_test(
    key_path: &Path,
    token: String,
    title: String,
    body: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let provider = fcm_provider();
    let key = ServiceAccountKey::from_file(key_path)?;
    let source = ServiceAccountTokenSource::new(key, &provider.auth)?;
    let project_id = source.project_id().to_string();
    let client = PushClient::new(&provider, &project_id)?;
    let credentials = CredentialProvider::new(Box::new(source));

    let bearer = credentials.bearer_token().await?;
    let payload = PushPayload::new(
        token,
        Notification { title, body },
        BTreeMap::new(),
        AndroidBlock::from_config(&provider.android),
    );

    client.send(&bearer, &payload).await?;
    log::info!("Test notification delivered via project {project_id}");
    Ok(())
}
