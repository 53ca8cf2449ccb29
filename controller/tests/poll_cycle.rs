//! End-to-end tests driving a scripted in-process TCP house.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use smarthome_common::{ControllerConfig, PartialState};
use smarthome_controller::{AuthError, ConnectError, ControlManager, UserLogin};

const HEALTHY_UPDATE: &str =
    "SU:TR=65;HR=50;DS=0;LS=0;PS=0;AS=0;AA=0;HUS=0;HES=0;CHS=0;HM=1;LKS=0;ID=0.\n";

/// Answers `GS` with scripted frames (repeating the last one once the script
/// runs out), acks everything else, and records every frame it received.
struct ScriptedHouse {
    port: u16,
    frames: Arc<Mutex<Vec<String>>>,
}

impl ScriptedHouse {
    async fn spawn(mut responses: VecDeque<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let frames = Arc::new(Mutex::new(Vec::new()));
        let seen = frames.clone();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut reader = BufReader::new(read_half);
            let fallback = responses.back().cloned().unwrap();
            let mut buf = Vec::new();
            loop {
                buf.clear();
                if reader.read_until(b'.', &mut buf).await.unwrap() == 0 {
                    return;
                }
                let frame = String::from_utf8(buf.clone()).unwrap();
                seen.lock().await.push(frame.clone());
                if frame.starts_with("GS") {
                    let response = responses.pop_front().unwrap_or_else(|| fallback.clone());
                    write_half.write_all(response.as_bytes()).await.unwrap();
                } else {
                    write_half.write_all(b"OK.\n").await.unwrap();
                }
            }
        });

        Self { port, frames }
    }

    async fn set_state_frames(&self) -> Vec<String> {
        self.frames
            .lock()
            .await
            .iter()
            .filter(|frame| frame.starts_with("SS"))
            .cloned()
            .collect()
    }
}

fn config(poll_secs: u64, missed_threshold: u32) -> ControllerConfig {
    ControllerConfig {
        poll_interval_secs: poll_secs,
        missed_update_threshold: missed_threshold,
        link_timeout_secs: 1,
        max_login_failures: 3,
        timezone: "UTC".to_string(),
    }
}

fn manager(config: ControllerConfig) -> ControlManager {
    ControlManager::new(config, vec![UserLogin::new("admin", "1234")])
}

#[tokio::test]
async fn poll_cycle_pushes_evaluated_state() {
    let house = ScriptedHouse::spawn(VecDeque::from([HEALTHY_UPDATE.to_string()])).await;
    let manager = manager(config(1, 6));

    manager
        .connect("127.0.0.1", house.port, "admin", "1234")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    // 65F against the default 70F target turns the heater on, and a vacant
    // house refuses the disarm the reading requested.
    let state = manager.current_state().await.expect("poll completed");
    assert_eq!(state.temperature, 65);
    assert!(state.heater_on);
    assert!(state.alarm_armed);

    let log = manager.log_messages().await;
    assert!(log
        .iter()
        .any(|line| line.contains("Cannot disable the alarm, house is empty")));

    let pushes = house.set_state_frames().await;
    assert!(!pushes.is_empty());
    assert!(pushes[0].contains("HES=1"));
    assert!(pushes[0].contains("AS=1"));
}

#[tokio::test]
async fn sustained_misses_revert_to_last_known_good() {
    // One healthy reading, then nothing but garbage.
    let house = ScriptedHouse::spawn(VecDeque::from([
        HEALTHY_UPDATE.to_string(),
        "XX:0.\n".to_string(),
    ]))
    .await;
    let manager = manager(config(1, 0));

    manager
        .connect("127.0.0.1", house.port, "admin", "1234")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(2600)).await;

    let pushes = house.set_state_frames().await;
    assert!(
        pushes.len() >= 2,
        "expected the revert to re-push, saw {pushes:?}"
    );
    // The revert repeats the last acknowledged push verbatim, every tick,
    // until the house recovers.
    for push in &pushes[1..] {
        assert_eq!(push, &pushes[0]);
    }
}

#[tokio::test]
async fn user_update_takes_precedence_over_reading() {
    let house = ScriptedHouse::spawn(VecDeque::from([HEALTHY_UPDATE.to_string()])).await;
    let manager = manager(config(60, 6));

    manager
        .connect("127.0.0.1", house.port, "admin", "1234")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    manager
        .process_state_update(PartialState {
            target_temp: Some(80),
            ..PartialState::default()
        })
        .await;

    let state = manager.current_state().await.expect("update pushed");
    assert_eq!(state.target_temp, 80);
    assert!(state.heater_on);

    let pushes = house.set_state_frames().await;
    assert!(pushes.last().unwrap().contains("TT=80"));
}

#[tokio::test]
async fn away_timer_locks_the_house_down() {
    let house = ScriptedHouse::spawn(VecDeque::from([HEALTHY_UPDATE.to_string()])).await;
    let manager = manager(config(60, 6));

    manager
        .connect("127.0.0.1", house.port, "admin", "1234")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    manager.schedule_away_timer(1);
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let state = manager.current_state().await.expect("timer fired");
    assert!(!state.light_on);
    assert!(!state.door_open);
    assert!(state.alarm_armed);
    assert!(!state.away_timer_fired);

    let pushes = house.set_state_frames().await;
    assert!(pushes.last().unwrap().contains("AS=1"));
}

#[tokio::test]
async fn overlapping_away_timers_each_fire() {
    let house = ScriptedHouse::spawn(VecDeque::from([HEALTHY_UPDATE.to_string()])).await;
    let manager = manager(config(60, 6));

    manager
        .connect("127.0.0.1", house.port, "admin", "1234")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    let before = house.set_state_frames().await.len();

    // Timers are not deduplicated: arming twice before the first fires
    // produces two independent lockdown pushes through the shared lock.
    manager.schedule_away_timer(1);
    manager.schedule_away_timer(1);
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let pushes = house.set_state_frames().await;
    assert_eq!(pushes.len(), before + 2);
    for push in &pushes[before..] {
        assert!(push.contains("AS=1"));
        assert!(push.contains("LS=0"));
    }
}

#[tokio::test]
async fn connect_is_idempotent() {
    let house = ScriptedHouse::spawn(VecDeque::from([HEALTHY_UPDATE.to_string()])).await;
    let manager = manager(config(60, 6));

    manager
        .connect("127.0.0.1", house.port, "admin", "1234")
        .await
        .unwrap();
    // Second call is a no-op, not a second session.
    manager
        .connect("127.0.0.1", house.port, "admin", "1234")
        .await
        .unwrap();
    assert!(manager.is_connected().await);
}

#[tokio::test]
async fn repeated_bad_credentials_lock_the_account() {
    let manager = ControlManager::new(
        ControllerConfig {
            max_login_failures: 1,
            ..config(60, 6)
        },
        vec![UserLogin::new("admin", "1234")],
    );

    for _ in 0..2 {
        let err = manager
            .connect("127.0.0.1", 1, "admin", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ConnectError::Auth(AuthError::InvalidCredentials)
        ));
    }

    // Even good credentials are refused once locked out; the socket is
    // never dialed.
    let err = manager
        .connect("127.0.0.1", 1, "admin", "1234")
        .await
        .unwrap_err();
    assert!(matches!(err, ConnectError::Auth(AuthError::LockedOut)));
}
