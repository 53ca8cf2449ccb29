use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use smarthome_common::{
    evaluate, ControllerConfig, DeviceState, MergedState, PartialState, SettingsUpdate,
    UserSettings,
};

use crate::link::{HouseLink, LinkError};
use crate::login::{AuthError, LoginHandler, UserLogin};

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("could not reach house: {0}")]
    Link(#[from] LinkError),
}

/// Everything the poll loop, away timers, and user-facing calls contend
/// over. One lock per house; every path that touches the link or the
/// snapshot goes through it, which also serializes frames on the wire.
struct Shared {
    login: LoginHandler,
    link: Option<HouseLink>,
    last_state: Option<DeviceState>,
    settings: UserSettings,
    log_history: Vec<String>,
    missed_updates: u32,
}

/// Supervises one house: authenticates, polls on a fixed tick, runs each
/// reading through the evaluator, and pushes the result back. Cheap to
/// clone; all clones share the same house.
#[derive(Clone)]
pub struct ControlManager {
    shared: Arc<Mutex<Shared>>,
    config: Arc<ControllerConfig>,
    tz: Tz,
}

impl ControlManager {
    pub fn new(config: ControllerConfig, users: Vec<UserLogin>) -> Self {
        let tz = match config.timezone.parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                warn!(zone = %config.timezone, "unknown timezone, falling back to UTC");
                chrono_tz::UTC
            }
        };
        let mut settings = UserSettings::default();
        settings.sanitize();
        Self {
            shared: Arc::new(Mutex::new(Shared {
                login: LoginHandler::new(users, config.max_login_failures),
                link: None,
                last_state: None,
                settings,
                log_history: Vec::new(),
                missed_updates: 0,
            })),
            config: Arc::new(config),
            tz,
        }
    }

    /// Authenticate and open the link, then start the poll loop. Calling
    /// again while connected is a no-op.
    pub async fn connect(
        &self,
        address: &str,
        port: u16,
        username: &str,
        password: &str,
    ) -> Result<(), ConnectError> {
        let timeout = Duration::from_secs(self.config.link_timeout_secs);
        {
            let mut shared = self.shared.lock().await;
            if shared.link.is_some() {
                return Ok(());
            }
            shared.login.authenticate(username, password)?;

            info!(%address, port, "connecting to house");
            let link = HouseLink::connect(address, port, timeout).await?;
            shared.link = Some(link);
            let entry = self.history_entry(&format!("Connected to house at {address}:{port}"));
            shared.log_history.push(entry);
            let entry = self.history_entry("Started update monitor");
            shared.log_history.push(entry);
        }

        self.spawn_poll_loop();
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.shared.lock().await.link.is_some()
    }

    /// Last state successfully pushed to the house. `None` until the first
    /// poll cycle completes.
    pub async fn current_state(&self) -> Option<DeviceState> {
        self.shared.lock().await.last_state.clone()
    }

    /// Accumulated decision log, oldest first.
    pub async fn log_messages(&self) -> Vec<String> {
        self.shared.lock().await.log_history.clone()
    }

    pub async fn update_settings(&self, update: SettingsUpdate) {
        let mut shared = self.shared.lock().await;
        shared.settings.apply(&update);
        debug!(settings = ?shared.settings, "settings updated");
    }

    pub async fn settings(&self) -> UserSettings {
        self.shared.lock().await.settings.clone()
    }

    /// Apply a user-requested change: fetch the live state, overlay the
    /// requested fields on top, evaluate, and push the outcome. Requested
    /// fields win over what the house reports for this one cycle; the
    /// evaluator still has the final word.
    pub async fn process_state_update(&self, changes: PartialState) {
        if changes.is_empty() {
            return;
        }
        let now = self.local_time();
        let mut guard = self.shared.lock().await;
        let shared = &mut *guard;
        let Some(link) = shared.link.as_mut() else {
            warn!("state update requested while disconnected, dropping");
            return;
        };

        let mut reading = match link.get_state().await {
            Ok(reading) => reading,
            Err(err) => {
                warn!(error = %err, "could not fetch state for user update");
                return;
            }
        };
        reading.apply(&changes);

        let merged = MergedState::build(&reading, &shared.settings, false, now);
        let evaluation = match evaluate(&merged) {
            Ok(evaluation) => evaluation,
            Err(err) => {
                warn!(error = %err, "user update rejected by evaluation");
                return;
            }
        };
        shared.log_history.extend(evaluation.log.iter().cloned());

        match link.set_state(&PartialState::from(&evaluation.state)).await {
            Ok(true) => {
                shared.last_state = Some(evaluation.state.clone());
                if evaluation.state.away_timer_fired {
                    self.schedule_away_timer(shared.settings.alarm_delay_secs);
                }
            }
            Ok(false) => warn!("house rejected user update"),
            Err(err) => warn!(error = %err, "could not push user update"),
        }
    }

    fn spawn_poll_loop(&self) {
        let manager = self.clone();
        let period = Duration::from_secs(self.config.poll_interval_secs);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                manager.poll_once().await;
            }
        });
    }

    /// One poll cycle: fetch, evaluate, push. Any failure on the fetch or
    /// push side counts toward the revert threshold; an evaluation error
    /// only skips the cycle.
    async fn poll_once(&self) {
        let now = self.local_time();
        let mut guard = self.shared.lock().await;
        let shared = &mut *guard;
        let Some(link) = shared.link.as_mut() else {
            return;
        };

        let reading = match link.get_state().await {
            Ok(reading) => reading,
            Err(err) => {
                warn!(error = %err, "missed state update");
                Self::record_miss(shared, self.config.missed_update_threshold).await;
                return;
            }
        };

        let merged = MergedState::build(&reading, &shared.settings, false, now);
        let evaluation = match evaluate(&merged) {
            Ok(evaluation) => evaluation,
            Err(err) => {
                warn!(error = %err, "evaluation failed, skipping cycle");
                return;
            }
        };
        shared.log_history.extend(evaluation.log.iter().cloned());

        match link.set_state(&PartialState::from(&evaluation.state)).await {
            Ok(true) => {
                shared.last_state = Some(evaluation.state.clone());
                shared.missed_updates = 0;
                if evaluation.state.away_timer_fired {
                    self.schedule_away_timer(shared.settings.alarm_delay_secs);
                }
            }
            Ok(false) => {
                warn!("house rejected state push");
                Self::record_miss(shared, self.config.missed_update_threshold).await;
            }
            Err(err) => {
                warn!(error = %err, "could not push state");
                Self::record_miss(shared, self.config.missed_update_threshold).await;
            }
        }
    }

    /// Count a miss and, past the threshold, force the house back to the
    /// last-known-good state. The counter is left untouched by the revert
    /// itself; only a clean poll cycle clears it, so the revert repeats
    /// every tick until the house is healthy again.
    async fn record_miss(shared: &mut Shared, threshold: u32) {
        shared.missed_updates += 1;
        if shared.missed_updates <= threshold {
            return;
        }
        let Some(last) = shared.last_state.clone() else {
            return;
        };
        let Some(link) = shared.link.as_mut() else {
            return;
        };
        info!(missed = shared.missed_updates, "reverting house to last known state");
        match link.set_state(&PartialState::from(&last)).await {
            Ok(true) => info!("revert acknowledged"),
            Ok(false) => warn!("house rejected revert"),
            Err(err) => warn!(error = %err, "revert failed"),
        }
    }

    /// Arm a one-shot lockdown timer: after `delay_secs` the manager re-runs
    /// the last-known-good state through the evaluator with the away flag
    /// set, which forces the light off, the door closed, and the alarm armed.
    /// Timers are never deduplicated; each pending one fires independently
    /// through the shared lock.
    pub fn schedule_away_timer(&self, delay_secs: u64) {
        let manager = self.clone();
        debug!(delay_secs, "away timer armed");
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(delay_secs)).await;
            manager.fire_away_timer().await;
        });
    }

    async fn fire_away_timer(&self) {
        let now = self.local_time();
        let mut guard = self.shared.lock().await;
        let shared = &mut *guard;
        let Some(last) = shared.last_state.clone() else {
            return;
        };
        let Some(link) = shared.link.as_mut() else {
            return;
        };

        let merged = MergedState::build(
            &PartialState::from(&last),
            &shared.settings,
            true,
            now,
        );
        let evaluation = match evaluate(&merged) {
            Ok(evaluation) => evaluation,
            Err(err) => {
                warn!(error = %err, "away timer evaluation failed");
                return;
            }
        };
        shared.log_history.extend(evaluation.log.iter().cloned());

        match link.set_state(&PartialState::from(&evaluation.state)).await {
            Ok(true) => shared.last_state = Some(evaluation.state.clone()),
            Ok(false) => warn!("house rejected away lockdown"),
            Err(err) => warn!(error = %err, "could not push away lockdown"),
        }
    }

    fn local_time(&self) -> NaiveTime {
        Utc::now().with_timezone(&self.tz).time()
    }

    fn history_entry(&self, message: &str) -> String {
        let stamp = Utc::now().with_timezone(&self.tz).format("%H:%M");
        format!("[{stamp}]: {message}")
    }
}
