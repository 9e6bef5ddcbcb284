use std::{
    convert::Infallible, fs::OpenOptions, net::SocketAddr, path::PathBuf, sync::Arc, time::Duration,
};

use anyhow::bail;
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use navigator::{
    config::{
        NavigatorConfig, DEFAULT_BACKEND_URL, DEFAULT_LANG, DEFAULT_OSRM_URL,
        DEFAULT_REPLAY_INTERVAL_MS, DEFAULT_TRAVELLER,
    },
    console, display,
    runtime::{Command, Runtime, Services},
    services::{
        BackendItinerarySource, BackendSmsGateway, GpxItinerarySource, GpxReplaySource,
        ItinerarySource, LinePositionSource, LogNotifier, LogSpeechEngine, OsrmRouteService,
        PositionSource,
    },
};
use navigator_data::DataManager;
use navigator_lib::{
    navigator::{NavigationError, Navigator},
    preferences::Preferences,
    speech::Narrator,
};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "navigator")]
#[command(about = "Turn-by-turn companion for a planned trip", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Navigate through a trip's stops
    Navigate(NavigateArgs),
    /// Show or change the stored preferences
    Prefs {
        #[command(subcommand)]
        action: Option<PrefsAction>,
    },
    /// List the SMS alerts sent for a trip
    Alerts { trip_id: String },
}

#[derive(Args)]
#[command(group(ArgGroup::new("itinerary").required(true).args(["trip_id", "itinerary_gpx"])))]
#[command(group(ArgGroup::new("position_feed").required(true).args(["replay", "positions"])))]
struct NavigateArgs {
    /// Saved trip to fetch from the backend
    #[arg(long)]
    trip_id: Option<String>,
    /// Itinerary stored as GPX routes or waypoints
    #[arg(long)]
    itinerary_gpx: Option<PathBuf>,
    /// Replay a recorded GPX track as the device position
    #[arg(long)]
    replay: Option<PathBuf>,
    /// Read positions from a file or pipe, one `lat,lon[,heading]` per line
    #[arg(long)]
    positions: Option<PathBuf>,
    #[arg(long, default_value_t = DEFAULT_REPLAY_INTERVAL_MS)]
    replay_interval_ms: u64,
    /// Serve the display endpoint on this address
    #[arg(long)]
    display_addr: Option<SocketAddr>,
    #[arg(long, default_value = DEFAULT_BACKEND_URL)]
    backend_url: String,
    #[arg(long, default_value = DEFAULT_OSRM_URL)]
    osrm_url: String,
    #[arg(long, default_value = DEFAULT_TRAVELLER)]
    traveller: String,
    #[arg(long, default_value = DEFAULT_LANG)]
    lang: String,
    /// Deny the notification permission prompt
    #[arg(long)]
    no_notifications: bool,
    /// Start navigating right away instead of waiting for `start`
    #[arg(long)]
    autostart: bool,
}

impl NavigateArgs {
    fn config(&self) -> NavigatorConfig {
        NavigatorConfig {
            backend_url: self.backend_url.clone(),
            osrm_url: self.osrm_url.clone(),
            traveller: self.traveller.clone(),
            lang: self.lang.clone(),
            display_addr: self.display_addr,
            replay_interval: Duration::from_millis(self.replay_interval_ms),
        }
    }
}

#[derive(Subcommand)]
enum PrefsAction {
    /// Set the SMS number. Turns alerts on
    Phone { number: String },
    Alerts { state: Toggle },
    Radius { meters: f64 },
    Voice { state: Toggle },
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

impl Toggle {
    fn is_on(self) -> bool {
        matches!(self, Toggle::On)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    std::fs::create_dir_all("log")?;
    let log_file = "log/navigator.log";

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let crate_name = env!("CARGO_CRATE_NAME");
            format!("{crate_name}=trace,navigator_data=debug,tower_http=debug").into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Navigate(args) => navigate(args).await,
        Commands::Prefs { action } => prefs(action).await,
        Commands::Alerts { trip_id } => alerts(&trip_id).await,
    }
}

async fn navigate(args: NavigateArgs) -> anyhow::Result<()> {
    let config = args.config();
    let client = config.http_client()?;
    let data = DataManager::start().await?;
    let preferences = data.load_preferences().await?;

    let itinerary = match (&args.itinerary_gpx, &args.trip_id) {
        (Some(path), _) => {
            GpxItinerarySource::new(data.clone())
                .fetch_itinerary(&path.to_string_lossy())
                .await
        }
        (None, Some(trip_id)) => BackendItinerarySource::new(client.clone(), &config.backend_url)
            .fetch_itinerary(trip_id)
            .await,
        (None, None) => bail!("No itinerary given"),
    };
    let itinerary = match itinerary {
        Ok(itinerary) => itinerary,
        Err(err) => {
            let err = NavigationError::ItineraryUnavailable(err.to_string());
            tracing::error!("{err}");
            return Err(err.into());
        }
    };

    let positions: Arc<dyn PositionSource> = match (&args.replay, &args.positions) {
        (Some(path), _) => {
            Arc::new(GpxReplaySource::from_gpx(&data, path, config.replay_interval)?)
        }
        (None, Some(path)) => Arc::new(LinePositionSource::new(path)),
        (None, None) => bail!("No position feed given"),
    };

    let services = Services {
        positions,
        routes: Arc::new(OsrmRouteService::new(client.clone(), &config.osrm_url)),
        sms: Arc::new(BackendSmsGateway::new(client, &config.backend_url)),
    };

    let Preferences { alerts, voice_enabled } = preferences;
    let (speech_signals, speech_rx) = mpsc::unbounded_channel();
    let engine = LogSpeechEngine::new(&config.lang, speech_signals);
    let runtime = Runtime::new(
        Navigator::new(itinerary, alerts, config.traveller.as_str()),
        Narrator::new(engine, config.lang.as_str(), voice_enabled),
        LogNotifier::new(!args.no_notifications),
        services,
        Some(data),
    );
    runtime.listen_speech(speech_rx);
    let handle = runtime.handle();

    if let Some(addr) = config.display_addr {
        let state = runtime.state();
        tokio::spawn(async move {
            if let Err(err) = display::serve(state, addr).await {
                tracing::error!("Display server failed: {err}");
            }
        });
    }

    println!("{}", console::HELP);
    console::spawn_stdin(handle.clone())?;

    let interrupt = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, shutting down");
            interrupt.send(Command::Shutdown);
        }
    });

    let runtime = tokio::spawn(runtime.run());
    if args.autostart {
        handle.send(Command::Start);
    } else {
        println!("Type 'start' to begin navigating.");
    }
    runtime.await??;

    Ok(())
}

async fn prefs(action: Option<PrefsAction>) -> anyhow::Result<()> {
    let data = DataManager::start().await?;

    let preferences = match action {
        None => data.load_preferences().await?,
        Some(PrefsAction::Phone { number }) => {
            data.update_preferences(|prefs| prefs.alerts.set_phone_number(&number)).await?
        }
        Some(PrefsAction::Alerts { state }) => {
            data.update_preferences(|prefs| prefs.alerts.set_enabled(state.is_on())).await?
        }
        Some(PrefsAction::Radius { meters }) => {
            data.update_preferences(|prefs| prefs.alerts.set_radius(meters)).await?
        }
        Some(PrefsAction::Voice { state }) => {
            data.update_preferences(|prefs| {
                prefs.voice_enabled = state.is_on();
                Ok::<(), Infallible>(())
            })
            .await?
        }
    };

    let on_off = |on: bool| if on { "on" } else { "off" };
    println!("Phone:\t{}", preferences.alerts.phone_number.as_deref().unwrap_or("-"));
    println!("Alerts:\t{}", on_off(preferences.alerts.enabled));
    println!("Radius:\t{} m", preferences.alerts.proximity_radius_m);
    println!("Voice:\t{}", on_off(preferences.voice_enabled));
    Ok(())
}

async fn alerts(trip_id: &str) -> anyhow::Result<()> {
    let data = DataManager::start().await?;

    for alert in data.get_alerts(trip_id).await? {
        println!(
            "{}\t{}\t#{}\t{}\t{}m\t{}",
            alert.timestamp.format("%d/%m/%Y %H:%M (UTC)"),
            if alert.delivered { "sent" } else { "failed" },
            alert.stop_index + 1,
            alert.place_name,
            alert.distance,
            alert.phone_number
        );
    }
    Ok(())
}
