use std::sync::Arc;

use chrono::Local;
use chrono::NaiveTime;
use tracing::info;
use tracing::warn;

use super::result::TransitionRun;
use super::result::{TransitionKind, TransitionResult};
use crate::config::{ComfortConfig, Config, HvacConfig, ScheduleConfig};
use crate::devices::{Climate, HttpClimate, HttpOutlets, Outlets};
use crate::hvac;
use crate::notify::{self, Notifier, Priority};
use crate::store::StateStore;
use crate::weather::{self, WeatherSource};

/// Appended to the away notification; the grow light keeps its own timer
const GROW_LIGHT_AWAY_NOTE: &str = "🌱 Grow light left on its own schedule";

/// The devices a transition touches, in the order it touches them
#[derive(Clone)]
pub struct Devices {
    pub thermostat: Arc<dyn Climate>,
    pub ac: Arc<dyn Climate>,
    pub outlets: Arc<dyn Outlets>,
}

/// The config slices the engine decides with
#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    pub hvac: HvacConfig,
    pub comfort: ComfortConfig,
    pub schedule: ScheduleConfig,
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            hvac: config.hvac.clone(),
            comfort: config.comfort.clone(),
            schedule: config.schedule.clone(),
        }
    }
}

/// Runs the wake/sleep/away/home transitions.
///
/// There is no stored "current mode": every transition can run at any time and
/// re-running one is harmless. Device failures never stop a transition; they
/// are recorded and the next device is tried. Retrying is left to whatever
/// triggers the next run.
pub struct TransitionEngine {
    devices: Devices,
    weather: Arc<dyn WeatherSource>,
    notifier: Arc<dyn Notifier>,
    store: StateStore,
    settings: EngineSettings,
    dry_run: bool,
}

impl TransitionEngine {
    pub fn new(
        devices: Devices,
        weather: Arc<dyn WeatherSource>,
        notifier: Arc<dyn Notifier>,
        store: StateStore,
        settings: EngineSettings,
        dry_run: bool,
    ) -> Self {
        Self {
            devices,
            weather,
            notifier,
            store,
            settings,
            dry_run,
        }
    }

    /// Wire up the HTTP-backed devices and collaborators described by `config`
    pub fn from_config(config: &Config, dry_run: bool) -> anyhow::Result<Self> {
        let devices = Devices {
            thermostat: Arc::new(HttpClimate::new(&config.devices.thermostat, dry_run)?),
            ac: Arc::new(HttpClimate::new(&config.devices.ac, dry_run)?),
            outlets: Arc::new(HttpOutlets::new(&config.devices.outlets, dry_run)?),
        };
        let weather: Arc<dyn WeatherSource> = Arc::from(weather::from_config(&config.weather)?);
        let notifier: Arc<dyn Notifier> = Arc::from(notify::from_config(&config.notify)?);

        Ok(Self::new(
            devices,
            weather,
            notifier,
            StateStore::new(&config.state.dir),
            EngineSettings::from(config),
            dry_run,
        ))
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Run a transition by kind. Home always notifies.
    pub async fn run(&self, kind: TransitionKind) -> TransitionResult {
        match kind {
            TransitionKind::Wake => self.wake().await,
            TransitionKind::Sleep => self.sleep().await,
            TransitionKind::Away => self.away().await,
            TransitionKind::Home => self.home(true).await,
        }
    }

    /// Morning: comfort temperature picked from today's outdoor temperature
    pub async fn wake(&self) -> TransitionResult {
        let mut run = self.begin(TransitionKind::Wake);

        // One weather fetch for the whole transition
        let outdoor = match self.weather.current_weather().await {
            Ok(w) => {
                info!("Outdoor: {:.0}°F, {}", w.temperature_f, w.condition);
                Some(w.temperature_f)
            }
            Err(e) => {
                warn!(
                    "Weather unavailable ({}), using default comfort {}°F",
                    e, self.settings.comfort.default_f
                );
                None
            }
        };
        let target = self.wake_target(outdoor);

        self.thermostat_comfort(
            &mut run,
            target,
            Some(outdoor.unwrap_or(self.settings.hvac.fallback_outdoor_f)),
        )
        .await;
        self.ac_comfort(&mut run, target).await;
        info!("Grow light: no-op, it runs on its own timer");

        self.update_night_mode(false);
        self.complete(run, &[], true).await
    }

    /// Night: eco thermostat, cool AC, every outlet off
    pub async fn sleep(&self) -> TransitionResult {
        let mut run = self.begin(TransitionKind::Sleep);

        self.thermostat_sleep(&mut run).await;
        self.ac_sleep(&mut run).await;
        self.outlets_off(&mut run).await;
        info!("Grow light: no-op, it runs on its own timer");

        self.update_night_mode(true);
        self.complete(run, &[], true).await
    }

    /// Everyone left. The grow light is deliberately not touched.
    pub async fn away(&self) -> TransitionResult {
        let mut run = self.begin(TransitionKind::Away);

        let thermostat = &self.devices.thermostat;
        match thermostat.set_away_mode().await {
            Ok(()) => run.succeeded(format!("{} → ECO (away)", thermostat.name())),
            Err(e) => self.record_failure(&mut run, "Thermostat", thermostat.name(), e),
        }

        let ac = &self.devices.ac;
        match ac.set_away_mode().await {
            Ok(()) => run.succeeded(format!("{} → off", ac.name())),
            Err(e) => self.record_failure(&mut run, "AC", ac.name(), e),
        }

        self.outlets_off(&mut run).await;

        self.complete(run, &[GROW_LIGHT_AWAY_NOTE.to_string()], true)
            .await
    }

    /// Someone arrived. During sleep hours the house goes to its night
    /// settings rather than full comfort.
    ///
    /// `notify = false` is for the first stage of a two-stage arrival, which
    /// pre-conditions the house silently.
    pub async fn home(&self, notify: bool) -> TransitionResult {
        self.home_at(notify, Local::now().time()).await
    }

    /// [`home`](Self::home) with an explicit wall-clock time
    pub async fn home_at(&self, notify: bool, now: NaiveTime) -> TransitionResult {
        let mut run = self.begin(TransitionKind::Home);
        let night = hvac::is_sleep_time_at(&self.settings.schedule, now);

        if night {
            info!("Arrived during sleep hours, using night settings");
            self.thermostat_sleep(&mut run).await;
            self.ac_sleep(&mut run).await;
        } else {
            let target = self.settings.comfort.default_f;
            self.thermostat_comfort(&mut run, target, None).await;
            self.ac_comfort(&mut run, target).await;
        }

        self.complete(run, &[], notify).await
    }

    /// Morning target from outdoor temperature bands
    fn wake_target(&self, outdoor_f: Option<f64>) -> f64 {
        let comfort = &self.settings.comfort;
        match outdoor_f {
            Some(t) if t < comfort.cold_outdoor_below => comfort.cold_target_f,
            Some(t) if t > comfort.hot_outdoor_above => comfort.hot_target_f,
            _ => comfort.default_f,
        }
    }

    fn begin(&self, kind: TransitionKind) -> TransitionRun {
        info!(transition = %kind, dry_run = self.dry_run, "Transition starting");
        TransitionRun::start(kind)
    }

    fn record_failure(
        &self,
        run: &mut TransitionRun,
        role: &str,
        device: &str,
        error: crate::devices::DeviceError,
    ) {
        warn!("[{}] {} call failed: {}", device, role, error);
        run.failed(role, device, &error);
    }

    async fn thermostat_comfort(&self, run: &mut TransitionRun, target: f64, outdoor: Option<f64>) {
        let thermostat = &self.devices.thermostat;

        // Indoor reading only sharpens the mode choice; losing it is not a failure
        let indoor = match thermostat.get_status().await {
            Ok(status) => status.current_temp_f,
            Err(e) => {
                warn!("[{}] status unavailable: {}", thermostat.name(), e);
                None
            }
        };
        let mode = hvac::select_hvac_mode(
            &self.settings.hvac,
            self.weather.as_ref(),
            target,
            indoor,
            outdoor,
        )
        .await;

        match thermostat.set_comfort_mode(Some(target), Some(mode)).await {
            Ok(()) => run.succeeded(format!("{} → {:.0}°F {}", thermostat.name(), target, mode)),
            Err(e) => self.record_failure(run, "Thermostat", thermostat.name(), e),
        }
    }

    async fn ac_comfort(&self, run: &mut TransitionRun, target: f64) {
        let ac = &self.devices.ac;
        match ac.set_comfort_mode(Some(target), None).await {
            Ok(()) => run.succeeded(format!("{} → {:.0}°F", ac.name(), target)),
            Err(e) => self.record_failure(run, "AC", ac.name(), e),
        }
    }

    /// The thermostat has no sleep preset; its sleep is the eco preset
    async fn thermostat_sleep(&self, run: &mut TransitionRun) {
        let thermostat = &self.devices.thermostat;
        match thermostat.set_sleep_mode(None).await {
            Ok(()) => run.succeeded(format!("{} → ECO (sleep)", thermostat.name())),
            Err(e) => self.record_failure(run, "Thermostat", thermostat.name(), e),
        }
    }

    async fn ac_sleep(&self, run: &mut TransitionRun) {
        let ac = &self.devices.ac;
        let temp = self.settings.comfort.ac_sleep_f;
        match ac.set_sleep_mode(Some(temp)).await {
            Ok(()) => run.succeeded(format!("{} → {:.0}°F (sleep)", ac.name(), temp)),
            Err(e) => self.record_failure(run, "AC", ac.name(), e),
        }
    }

    async fn outlets_off(&self, run: &mut TransitionRun) {
        let outlets = &self.devices.outlets;
        match outlets.turn_off_all().await {
            Ok(()) => run.succeeded(format!("{} → all off", outlets.name())),
            Err(e) => self.record_failure(run, "Outlets", outlets.name(), e),
        }
    }

    /// Night mode is advisory; failing to write it never fails a transition
    fn update_night_mode(&self, enabled: bool) {
        if self.dry_run {
            info!("Dry run: would set night mode to {}", enabled);
            return;
        }
        if let Err(e) = self.store.set_night_mode(enabled) {
            warn!("Failed to update night mode marker: {}", e);
        }
    }

    async fn complete(
        &self,
        run: TransitionRun,
        notes: &[String],
        notify: bool,
    ) -> TransitionResult {
        let result = run.finish();

        if notify {
            self.send_notification(&result, notes).await;
        }

        info!(
            transition = %result.transition,
            status = %result.status,
            actions = result.actions.len(),
            errors = result.errors.len(),
            duration_ms = result.duration_ms,
            dry_run = self.dry_run,
            "Transition complete"
        );
        result
    }

    /// Exactly one summary per transition. A failed send is only logged so it
    /// cannot turn a clean transition into a partial one.
    async fn send_notification(&self, result: &TransitionResult, notes: &[String]) {
        let title = result.notification_title();
        let priority = if result.errors.is_empty() {
            Priority::Normal
        } else {
            Priority::High
        };
        let lines: Vec<String> = result.actions.iter().chain(notes).cloned().collect();

        if self.dry_run {
            info!("Dry run: would send notification '{}': {:?}", title, lines);
            return;
        }

        if let Err(e) = self.notifier.send_summary(&title, &lines, priority).await {
            warn!("Failed to send '{}' notification: {}", title, e);
        }
    }
}
