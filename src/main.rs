use chrono::Utc;
use clap::{Parser, Subcommand};
use hora_chronos::birth::{BirthInput, BirthReport, BirthResolver};
use hora_chronos::config::Settings;
use hora_chronos::facts::{extract_facts, load_chart_document};
use hora_chronos::location::{GeocodingResolver, ResolutionCache, TimezoneResolver};
use hora_chronos::period::PeriodSelector;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Hora Chronos: birth-place resolution and active-period lookup.
///
/// Examples:
///   hora geocode "Chennai, India"
///   hora timezone --lat 13.08 --lon 80.27
///   hora birth --date 1990-04-12 --time 06:45 --location "Chennai, India"
///   hora facts chart.json --at 2024-01-01
///   hora serve --port 8000
#[derive(Parser)]
#[command(name = "hora", version, about, long_about = None)]
struct Cli {
    /// LocationIQ API key (overrides LOCATIONIQ_KEY).
    #[arg(long, global = true)]
    locationiq_key: Option<String>,

    /// Per-request HTTP timeout in seconds (overrides HORA_HTTP_TIMEOUT_SECS).
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a free-text place name to coordinates.
    Geocode {
        query: String,
    },
    /// Resolve coordinates to a timezone and UTC offset.
    Timezone {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
    /// Fill in coordinates and offset for a birth record.
    Birth {
        /// Date (YYYY-MM-DD).
        #[arg(long)]
        date: String,
        /// Local time (HH:MM or HH:MM:SS).
        #[arg(long)]
        time: String,
        /// Explicit UTC offset, e.g. +05:30.
        #[arg(long, allow_hyphen_values = true)]
        tz: Option<String>,
        #[arg(long, allow_hyphen_values = true, requires = "lon")]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true, requires = "lat")]
        lon: Option<f64>,
        /// Birth place, e.g. "Chennai, India".
        #[arg(long)]
        location: Option<String>,
        #[arg(long, default_value_t = 1)]
        ayanamsa: i32,
    },
    /// Extract facts and active periods from a chart document.
    Facts {
        chart: PathBuf,
        /// Reference instant for period selection. Defaults to now.
        #[arg(long)]
        at: Option<String>,
    },
    /// Run the HTTP API.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => fail(e),
    }
}

fn fail(e: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", e);
    std::process::exit(1);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()
        .with_locationiq_key(cli.locationiq_key)
        .with_timeout_secs(cli.timeout);

    match cli.command {
        Command::Geocode { query } => {
            let resolver = GeocodingResolver::from_settings(&settings, Arc::new(ResolutionCache::new()));
            match resolver.resolve(&query) {
                Ok(place) => print_json(&place),
                Err(e) => fail(e),
            }
        }
        Command::Timezone { lat, lon } => {
            let resolver = TimezoneResolver::from_settings(&settings, Arc::new(ResolutionCache::new()));
            match resolver.resolve(lat, lon) {
                Ok(zone) => print_json(&zone),
                Err(e) => fail(e),
            }
        }
        Command::Birth {
            date,
            time,
            tz,
            lat,
            lon,
            location,
            ayanamsa,
        } => {
            let input = BirthInput {
                date,
                time,
                timezone: tz,
                latitude: lat,
                longitude: lon,
                location,
                ayanamsa,
                la: "en".to_string(),
            };
            match BirthResolver::from_settings(&settings).resolve(&input) {
                Ok(birth) => print_json(&BirthReport::from(birth)),
                Err(e) => fail(e),
            }
        }
        Command::Facts { chart, at } => {
            let reference = match at {
                Some(at) => PeriodSelector::utc().normalize(&at).unwrap_or_else(|e| fail(e)),
                None => Utc::now(),
            };
            let doc = load_chart_document(&chart).unwrap_or_else(|e| fail(e));
            print_json(&extract_facts(&doc, reference));
        }
        Command::Serve { host, port } => {
            let births = BirthResolver::from_settings(&settings);
            let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| fail(e));
            if let Err(e) = runtime.block_on(hora_chronos::server::start(births, &host, port)) {
                fail(format!("cannot serve on {}:{}: {}", host, port, e));
            }
        }
    }
}
