use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use vantage::config::{Config, SensorSource};
use vantage::dashboard::{render_text, Dashboard};
use vantage::http::UreqClient;

/// Vantage: live dashboard with fail-open location resolution.
///
/// Resolves where this machine is (device sensor, then IP lookup), pulls
/// recent significant earthquakes and the ISS position, and shows them
/// together. Each panel degrades on its own.
///
/// Examples:
///   vantage
///   vantage --location --json
///   vantage --lat 37.77 --lon -122.42 --tz America/Los_Angeles
///   vantage --fix-file /run/gps/fix.json --watch
///   vantage --serve --port 8080
#[derive(Parser)]
#[command(name = "vantage", version, about, long_about = None)]
struct Cli {
    /// Config file. Defaults to ~/.vantage/config.json when present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fixed sensor latitude (-90 to 90). Requires --lon.
    #[arg(long, allow_hyphen_values = true, requires = "lon")]
    lat: Option<f64>,

    /// Fixed sensor longitude (-180 to 180). Requires --lat.
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    lon: Option<f64>,

    /// Read device fixes from this JSON file.
    #[arg(long, conflicts_with_all = ["lat", "no_sensor"])]
    fix_file: Option<PathBuf>,

    /// Skip the sensor and go straight to IP lookup.
    #[arg(long, conflicts_with = "lat")]
    no_sensor: bool,

    /// IANA timezone for displayed times (e.g. Europe/Oslo).
    #[arg(long)]
    tz: Option<String>,

    /// Seconds between refreshes in --watch and --serve.
    #[arg(long)]
    interval: Option<u64>,

    /// Resolve the location only.
    #[arg(long, conflicts_with_all = ["watch", "serve"])]
    location: bool,

    /// Keep refreshing the dashboard in the terminal.
    #[arg(long, conflicts_with = "serve")]
    watch: bool,

    /// Run the HTTP API.
    #[arg(long)]
    serve: bool,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Print JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Debug-level logging.
    #[arg(long, short = 'v')]
    verbose: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let (Some(latitude), Some(longitude)) = (self.lat, self.lon) {
            config.sensor = SensorSource::Static { latitude, longitude };
        }
        if let Some(path) = &self.fix_file {
            config.sensor = SensorSource::FixFile { path: path.clone() };
        }
        if self.no_sensor {
            config.sensor = SensorSource::None;
        }
        if let Some(tz) = &self.tz {
            config.display_tz = Some(tz.clone());
        }
        if let Some(secs) = self.interval {
            config.refresh_interval_secs = secs;
        }
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "vantage=debug,info" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    cli.apply(&mut config);
    config.validate().context("applying command-line overrides")?;
    let tz = config.display_tz()?;

    let http = Arc::new(UreqClient::new(&config.user_agent, config.http_timeout()));
    let dashboard = Arc::new(Dashboard::from_config(&config, http)?);

    if cli.serve {
        let host = config.server.host.clone();
        vantage::server::start(dashboard, &host, config.server.port, config.refresh_interval())
            .await
            .with_context(|| format!("serving on {}:{}", host, config.server.port))?;
        return Ok(());
    }

    if cli.location {
        return match dashboard.resolver().resolve().await {
            Ok(loc) => {
                eprintln!("  {}", loc.display_line());
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&loc)?);
                }
                Ok(())
            }
            Err(unresolved) => {
                eprintln!("  \u{26A0}\u{FE0F}  Location unavailable");
                for a in &unresolved.attempts {
                    eprintln!("     {}: {}", a.strategy, a.reason);
                }
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&unresolved.attempts)?);
                }
                std::process::exit(1);
            }
        };
    }

    if cli.watch {
        watch(&dashboard, config.refresh_interval(), tz, cli.json).await;
        return Ok(());
    }

    // One-shot
    if let Some(snapshot) = dashboard.refresh_if_idle(&CancellationToken::new()).await {
        eprint!("{}", render_text(&snapshot, tz, chrono::Utc::now()));
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
    }
    Ok(())
}

async fn watch(dashboard: &Arc<Dashboard>, every: Duration, tz: Option<chrono_tz::Tz>, json: bool) {
    let cancel = CancellationToken::new();
    let refresher = {
        let (dashboard, cancel) = (dashboard.clone(), cancel.clone());
        tokio::spawn(async move { dashboard.run_periodic(every, &cancel).await })
    };

    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };
    dashboard
        .follow(ctrl_c, |snapshot| {
            eprint!("\x1B[2J\x1B[H{}", render_text(snapshot, tz, chrono::Utc::now()));
            if json {
                match serde_json::to_string(snapshot) {
                    Ok(line) => println!("{}", line),
                    Err(e) => tracing::warn!(error = %e, "cannot encode snapshot"),
                }
            }
        })
        .await;

    cancel.cancel();
    if let Err(e) = refresher.await {
        tracing::warn!(error = %e, "refresh loop ended abnormally");
    }
}
