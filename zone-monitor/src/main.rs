use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub mod playhead;
pub mod zone_lookup;

use playhead::Playhead;
use sync2gear_api::{ClientConfig, Sync2gearClient};
use sync2gear_playback::logging::{init_logging, LoggingMode};
use sync2gear_playback::{
    ChannelKind, Effect, PlaybackSession, PlaybackSnapshot, ResumePolicy, SessionConfig,
    SimulatedChannel, StoreChangeKind, TracingSink, TransportDispatcher, Zone, ZoneSelector,
};
use sync2gear_stream::{FeedConfig, FeedSubscriber};
use zone_lookup::{find_zone, first_zone, format_zone_list};

/// How long the event loop waits for a feed event before ticking
const TICK: Duration = Duration::from_millis(250);

/// sync2gear zone monitor
///
/// Follows the realtime feed of one zone and logs every load, seek, play and
/// pause the local player would perform, without producing any audio.
#[derive(Parser, Debug)]
#[command(name = "zone-monitor")]
#[command(about = "Follow a sync2gear zone and log what the local player would do")]
#[command(version)]
pub struct Args {
    /// Zone name or id to follow
    #[arg(short, long, env = "SYNC2GEAR_ZONE")]
    pub zone: Option<String>,

    /// Base URL of the REST API
    #[arg(long, env = "SYNC2GEAR_API_BASE_URL", default_value = "http://localhost:8000/api/v1")]
    pub api_url: String,

    /// Base URL of the realtime feed (derived from the API URL when omitted)
    #[arg(long, env = "SYNC2GEAR_WS_BASE_URL")]
    pub ws_url: Option<String>,

    /// Access token for the API and the feed
    #[arg(long, env = "SYNC2GEAR_ACCESS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Refresh token used when the access token expires
    #[arg(long, env = "SYNC2GEAR_REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: Option<String>,

    /// Seconds without a snapshot before the feed is reported stale
    #[arg(long, default_value = "45")]
    pub stale_after: u64,

    /// Which position music resumes from after an announcement
    #[arg(long, value_enum, default_value_t = ResumeFrom::Backend)]
    pub resume_from: ResumeFrom,

    /// Stop after this many seconds (runs until Ctrl+C when omitted)
    #[arg(short, long)]
    pub duration: Option<u64>,

    /// Use the first zone if no zone was given
    #[arg(long)]
    pub use_first_available: bool,

    /// List zones and exit
    #[arg(long)]
    pub list_zones: bool,

    /// Logging mode (silent, development, debug)
    #[arg(long, env = "SYNC2GEAR_LOG_MODE", default_value = "development")]
    pub log_mode: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResumeFrom {
    /// The position in the backend's snapshot, if it reports one
    Backend,
    /// The position captured locally when the announcement started
    Captured,
}

impl From<ResumeFrom> for ResumePolicy {
    fn from(value: ResumeFrom) -> Self {
        match value {
            ResumeFrom::Backend => ResumePolicy::PreferBackend,
            ResumeFrom::Captured => ResumePolicy::PreferCaptured,
        }
    }
}

impl Args {
    /// Validate command line arguments
    pub fn validate(&self) -> Result<()> {
        if self.stale_after == 0 {
            return Err(anyhow::anyhow!("Stale timeout must be positive"));
        }

        if self.duration == Some(0) {
            return Err(anyhow::anyhow!("Duration must be positive"));
        }

        if !self.list_zones && self.zone.is_none() && !self.use_first_available {
            return Err(anyhow::anyhow!(
                "No zone given. Pass --zone, set SYNC2GEAR_ZONE or use --use-first-available"
            ));
        }

        if LoggingMode::from_name(&self.log_mode).is_none() {
            return Err(anyhow::anyhow!(
                "Invalid log mode '{}'. Valid modes: silent, development, debug",
                self.log_mode
            ));
        }

        Ok(())
    }
}

/// Configuration derived from command line arguments and environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub zone: Option<String>,
    pub client: ClientConfig,
    pub session: SessionConfig,
    pub duration: Option<Duration>,
    pub use_first_available: bool,
    pub list_zones: bool,
    pub log_mode: LoggingMode,
}

impl TryFrom<Args> for Config {
    type Error = anyhow::Error;

    fn try_from(args: Args) -> Result<Self> {
        args.validate()?;

        let mut client = ClientConfig::new().with_api_base_url(args.api_url);
        if let Some(ws_url) = args.ws_url {
            client = client.with_ws_base_url(ws_url);
        }
        if let Some(token) = args.token {
            client = client.with_tokens(token, args.refresh_token);
        }
        client.validate().context("Invalid client configuration")?;

        let session = SessionConfig::default()
            .with_stale_after(Duration::from_secs(args.stale_after))
            .with_resume_policy(args.resume_from.into());
        session.validate().context("Invalid session configuration")?;

        Ok(Self {
            zone: args.zone,
            client,
            session,
            duration: args.duration.map(Duration::from_secs),
            use_first_available: args.use_first_available,
            list_zones: args.list_zones,
            log_mode: LoggingMode::from_name(&args.log_mode).unwrap_or(LoggingMode::Development),
        })
    }
}

impl Config {
    /// Print configuration summary
    pub fn print_summary(&self) {
        info!("Configuration:");
        info!("  API: {}", self.client.api_base_url);
        info!("  Feed: {}", self.client.ws_base_url);
        info!("  Authenticated: {}", self.client.access_token.is_some());
        info!("  Zone: {}", self.zone.as_deref().unwrap_or("(first available)"));
        info!("  Stale after: {}s", self.session.stale_after.as_secs());
        info!("  Resume policy: {:?}", self.session.resume_policy);
        match self.duration {
            Some(duration) => info!("  Duration: {}s", duration.as_secs()),
            None => info!("  Duration: until Ctrl+C"),
        }
    }
}

/// Cleared on Ctrl+C
fn install_interrupt_handler() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl+C handler")?;
    Ok(running)
}

/// Run the monitor workflow
///
/// Lists zones, selects one, then follows its feed until interrupted or the
/// configured duration runs out.
fn run_monitor(config: Config) -> Result<()> {
    // Phase 1: Zone listing
    info!("Phase 1: Listing zones...");
    let client = Sync2gearClient::from_config(&config.client)
        .context("Failed to create API client")?;
    let mut selector = ZoneSelector::new();
    selector.refresh_from_wire(client.zones().context("Failed to list zones")?);
    info!("Found {} zone(s)", selector.zones().len());

    if config.list_zones {
        println!("\n{}", format_zone_list(selector.zones()));
        return Ok(());
    }

    // Phase 2: Zone selection
    info!("Phase 2: Selecting zone...");
    let zone = select_zone(&config, &mut selector).context("Zone selection failed")?;
    info!("Selected zone '{}' ({})", zone.name, zone.id);

    // Phase 3: Session and feed setup
    info!("Phase 3: Connecting to the zone feed...");
    let (music, music_handle) = SimulatedChannel::auto_start(ChannelKind::Music);
    let (announcements, announcement_handle) =
        SimulatedChannel::auto_start(ChannelKind::Announcement);
    let transport =
        TransportDispatcher::spawn(client).context("Failed to start transport worker")?;

    let mut session =
        PlaybackSession::with_config(music, announcements, transport, TracingSink, config.session);
    let mut subscriber = FeedSubscriber::with_config(FeedConfig::new(&config.client.ws_base_url))
        .context("Failed to start feed subscriber")?;

    let generation = session.select_zone(zone.id.clone());
    session.store().watch(zone.id.clone());
    subscriber
        .select_zone_as(
            zone.id.as_str(),
            config.client.access_token.as_deref(),
            generation,
        )
        .context("Failed to subscribe to the zone feed")?;

    // Phase 4: Event loop
    info!("Phase 4: Following zone (press Ctrl+C to stop)...");
    let running = install_interrupt_handler()?;
    let deadline = config.duration.map(|duration| Instant::now() + duration);
    let mut playhead = Playhead::new(music_handle, announcement_handle, Instant::now());
    let feed = subscriber.iter();
    let changes = session.store().iter();

    while running.load(Ordering::SeqCst) {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            info!("Duration elapsed");
            break;
        }

        if let Some(event) = feed.recv_timeout(TICK) {
            log_effects(&session.handle_feed_event(event));
        }

        let now = Instant::now();
        let latest = session.store().latest(&zone.id);
        for event in playhead.advance(now, latest.as_ref()) {
            log_effects(&session.handle_audio_event(event));
        }

        for change in changes.try_iter() {
            match change.kind {
                StoreChangeKind::Snapshot => {
                    if let Some(snapshot) = session.store().latest(&change.zone_id) {
                        info!("Now: {}", describe(&snapshot));
                    }
                }
                StoreChangeKind::Status(status) => info!("Feed {}", status),
            }
        }

        session.poll_transport();
        session.tick(now);
    }

    // Phase 5: Cleanup
    info!("Phase 5: Cleaning up...");
    session.teardown();
    if let Err(e) = subscriber.clear_zone() {
        warn!("Failed to leave zone feed: {}", e);
    }
    subscriber.shutdown();

    info!("Monitor stopped");
    Ok(())
}

fn select_zone(config: &Config, selector: &mut ZoneSelector) -> Result<Zone> {
    if let Some(target) = &config.zone {
        match find_zone(selector, target) {
            Ok(zone) => return Ok(zone.clone()),
            Err(e) if config.use_first_available => warn!("{}", e),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(first_zone(selector)?.clone())
}

fn log_effects(effects: &[Effect]) {
    for effect in effects {
        match effect {
            Effect::Request(intent) => info!("Asked backend to {}", intent),
            Effect::Notify(_) => {}
            Effect::Discarded(reason) => debug!("Ignored: {:?}", reason),
        }
    }
}

/// One-line description of what a snapshot asks for
fn describe(snapshot: &PlaybackSnapshot) -> String {
    match snapshot.audible() {
        Some((ChannelKind::Announcement, item)) => format!(
            "announcement '{}' at {:.1}s, volume {}",
            item.title,
            snapshot.position,
            snapshot.volume.value()
        ),
        Some((ChannelKind::Music, item)) => format!(
            "track '{}' at {:.1}s, volume {}",
            item.title,
            snapshot.position,
            snapshot.volume.value()
        ),
        None if snapshot.current_track.is_some() => "paused".to_string(),
        None => "idle".to_string(),
    }
}

fn main() -> Result<()> {
    let config = Config::try_from(Args::parse()).context("Failed to parse configuration")?;

    init_logging(config.log_mode).context("Failed to initialize logging")?;
    config.print_summary();

    if let Err(e) = run_monitor(config) {
        error!("Zone monitor failed: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync2gear_playback::{MediaItem, ZoneId};

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["zone-monitor"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_zone_required_unless_listing() {
        let listing = args(&["--list-zones"]);
        let first = args(&["--use-first-available"]);
        let named = args(&["--zone", "Lobby"]);
        assert!(listing.validate().is_ok());
        assert!(first.validate().is_ok());
        assert!(named.validate().is_ok());

        let mut missing = args(&[]);
        missing.zone = None;
        missing.use_first_available = false;
        missing.list_zones = false;
        assert!(missing.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(args(&["--zone", "Lobby", "--stale-after", "0"]).validate().is_err());
        assert!(args(&["--zone", "Lobby", "--duration", "0"]).validate().is_err());
        assert!(args(&["--zone", "Lobby", "--log-mode", "loud"]).validate().is_err());
    }

    #[test]
    fn test_config_from_args() {
        let config = Config::try_from(args(&[
            "--zone",
            "Lobby",
            "--api-url",
            "https://api.sync2gear.com/api/v1/",
            "--resume-from",
            "captured",
            "--stale-after",
            "20",
            "--log-mode",
            "silent",
        ]))
        .unwrap();

        assert_eq!(config.client.api_base_url, "https://api.sync2gear.com/api/v1");
        assert!(config.client.ws_base_url.starts_with("wss://"));
        assert_eq!(config.session.resume_policy, ResumePolicy::PreferCaptured);
        assert_eq!(config.session.stale_after, Duration::from_secs(20));
        assert_eq!(config.log_mode, LoggingMode::Silent);
    }

    #[test]
    fn test_describe() {
        let zone = ZoneId::parse("2f1c9a4e-0000-4000-8000-000000000001").unwrap();
        let track = MediaItem::new("t1", "a.mp3").with_title("Morning Jazz");

        let playing = PlaybackSnapshot::playing_track(zone.clone(), track.clone(), 12.0);
        assert_eq!(describe(&playing), "track 'Morning Jazz' at 12.0s, volume 70");

        let paused = PlaybackSnapshot {
            is_playing: false,
            ..playing
        };
        assert_eq!(describe(&paused), "paused");
        assert_eq!(describe(&PlaybackSnapshot::idle(zone)), "idle");
    }
}
