//! # Polling Session
//!
//! One background task per tracked device. The task polls the platform,
//! drains queued events through a [`UsageCounter`] and writes increments to
//! the session's [`UsageRecord`]. Nothing else writes that record; callers
//! get clones via [`PollingSession::snapshot`].
//!
//! Platform calls may block, so the loop runs on tokio's blocking pool with
//! a thread of its own rather than on a runtime worker.
//!
//! Stopping is cooperative: [`PollingSession::stop`] clears a flag that the
//! task checks at the top of each tick and after the (possibly blocking)
//! platform poll.

use super::debounce::UsageCounter;
use super::TrackerSettings;
use crate::device::DeviceType;
use crate::platform::Platform;
use crate::usage::UsageRecord;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Per-device polling loop and the record it owns
pub struct PollingSession {
    device_name: String,
    device_type: DeviceType,
    platform: Arc<dyn Platform>,
    record: Arc<Mutex<UsageRecord>>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    poll_interval: Duration,
    axis_saturation: f32,
}

impl PollingSession {
    /// Create a stopped session seeded with a previously persisted record
    pub fn new(
        device_name: impl Into<String>,
        device_type: DeviceType,
        record: UsageRecord,
        platform: Arc<dyn Platform>,
        settings: &TrackerSettings,
    ) -> Self {
        Self {
            device_name: device_name.into(),
            device_type,
            platform,
            record: Arc::new(Mutex::new(record)),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            poll_interval: settings.poll_interval,
            axis_saturation: settings.axis_saturation,
        }
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Start polling. No-op if already running.
    ///
    /// If a previous task has been told to stop but has not exited yet, it
    /// is awaited first so two tasks never write the same record.
    pub async fn start(&mut self) {
        if self.running.load(Ordering::Acquire) {
            return;
        }

        self.join().await;

        self.running.store(true, Ordering::Release);
        info!("Starting polling for: {}", self.device_name);

        let task = SessionTask {
            device_name: self.device_name.clone(),
            platform: Arc::clone(&self.platform),
            record: Arc::clone(&self.record),
            running: Arc::clone(&self.running),
            counter: UsageCounter::new(self.device_type, self.axis_saturation),
            poll_interval: self.poll_interval,
        };
        self.handle = Some(tokio::task::spawn_blocking(move || task.run()));
    }

    /// Ask the task to exit after its current tick. Returns immediately.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            info!("Stopping polling for: {}", self.device_name);
        }
    }

    /// Reflects the flag, not whether the task has exited yet
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Wait for a stopped task to exit. Returns at once if no task exists;
    /// waits forever if the session is still running, so call `stop` first.
    pub async fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                warn!("Polling task for '{}' ended abnormally: {}", self.device_name, err);
            }
        }
    }

    /// Stop and wait for the task to exit
    pub async fn shutdown(&mut self) {
        self.stop();
        self.join().await;
    }

    /// Copy of the current counters
    pub fn snapshot(&self) -> UsageRecord {
        lock(&self.record).clone()
    }
}

impl Drop for PollingSession {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

fn lock(record: &Mutex<UsageRecord>) -> MutexGuard<'_, UsageRecord> {
    record.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State moved into the spawned task
struct SessionTask {
    device_name: String,
    platform: Arc<dyn Platform>,
    record: Arc<Mutex<UsageRecord>>,
    running: Arc<AtomicBool>,
    counter: UsageCounter,
    poll_interval: Duration,
}

impl SessionTask {
    fn run(mut self) {
        while self.is_running() {
            if self.tick() == 0 {
                std::thread::sleep(self.poll_interval);
            }
        }
        debug!("Polling task for '{}' exited", self.device_name);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// One poll. Returns the number of events drained.
    fn tick(&mut self) -> usize {
        if let Err(err) = self.platform.poll(&self.device_name) {
            warn!("Poll failed for '{}': {}", self.device_name, err);
            return 0;
        }
        if !self.is_running() {
            return 0;
        }

        let events = match self.platform.drain_events(&self.device_name) {
            Ok(events) => events,
            Err(err) => {
                warn!("Reading events failed for '{}': {}", self.device_name, err);
                return 0;
            }
        };

        // Drained events are always counted, otherwise they would be lost
        let drained = events.len();
        if drained > 0 {
            let mut record = lock(&self.record);
            self.counter.process(events, &mut record);
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Component, DeviceIdentity, InputEvent, PortType};
    use crate::platform::MemoryPlatform;
    use std::time::Instant;

    const MS: u64 = 1_000_000;

    fn settings() -> TrackerSettings {
        TrackerSettings {
            poll_interval: Duration::from_millis(1),
            ..TrackerSettings::default()
        }
    }

    fn setup() -> (Arc<MemoryPlatform>, PollingSession) {
        let platform = Arc::new(MemoryPlatform::new());
        platform.insert(DeviceIdentity::new("PadX", DeviceType::Gamepad, PortType::Usb));
        let session = PollingSession::new(
            "PadX",
            DeviceType::Gamepad,
            UsageRecord::new(),
            platform.clone(),
            &settings(),
        );
        (platform, session)
    }

    fn press_release(ms: u64) -> Vec<InputEvent> {
        vec![
            InputEvent::new(Component::button("A"), 1.0, ms * MS),
            InputEvent::new(Component::button("A"), 0.0, (ms + 1) * MS),
        ]
    }

    async fn wait_for(session: &PollingSession, component: &str, count: u64) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if session.snapshot().get(component) >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_session_counts_queued_events() {
        let (platform, mut session) = setup();
        session.start().await;
        assert!(session.is_running());

        platform.push_events("PadX", press_release(10));
        platform.push_events("PadX", press_release(20));
        assert!(wait_for(&session, "A", 2).await);

        session.shutdown().await;
        assert!(!session.is_running());
        assert_eq!(session.snapshot().get("A"), 2);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (platform, mut session) = setup();
        session.start().await;
        session.start().await;

        platform.push_events("PadX", press_release(10));
        assert!(wait_for(&session, "A", 1).await);
        session.shutdown().await;
        assert_eq!(session.snapshot().get("A"), 1);
    }

    #[tokio::test]
    async fn test_no_increments_after_stop() {
        let (platform, mut session) = setup();
        session.start().await;
        session.shutdown().await;

        platform.push_events("PadX", press_release(10));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(session.snapshot().get("A"), 0);
        assert_eq!(platform.pending("PadX"), 2);
    }

    #[tokio::test]
    async fn test_stop_while_events_flow_freezes_count() {
        let (platform, mut session) = setup();
        session.start().await;
        platform.push_events("PadX", press_release(10));
        assert!(wait_for(&session, "A", 1).await);

        // Stop lands while the next batch is queued or being drained
        platform.push_events("PadX", press_release(20));
        session.stop();
        session.join().await;
        assert!(!session.is_running());
        let frozen = session.snapshot().get("A");
        assert!((1..=2).contains(&frozen));

        platform.push_events("PadX", press_release(30));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(session.snapshot().get("A"), frozen);
        assert!(platform.pending("PadX") >= 2);
    }

    #[tokio::test]
    async fn test_restart_keeps_counts() {
        let (platform, mut session) = setup();
        session.start().await;
        platform.push_events("PadX", press_release(10));
        assert!(wait_for(&session, "A", 1).await);
        session.stop();

        // Restart right after stop, before the old task noticed
        session.start().await;
        platform.push_events("PadX", press_release(20));
        assert!(wait_for(&session, "A", 2).await);

        session.shutdown().await;
        assert_eq!(session.snapshot().get("A"), 2);
    }

    #[tokio::test]
    async fn test_vanished_device_keeps_polling() {
        let (platform, mut session) = setup();
        session.start().await;
        platform.detach("PadX");
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(session.is_running());
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_seeded_record_is_continued() {
        let platform = Arc::new(MemoryPlatform::new());
        platform.insert(DeviceIdentity::new("PadX", DeviceType::Gamepad, PortType::Usb));
        let seeded: UsageRecord = [("A".to_string(), 41)].into_iter().collect();
        let mut session = PollingSession::new(
            "PadX",
            DeviceType::Gamepad,
            seeded,
            platform.clone(),
            &settings(),
        );

        session.start().await;
        platform.push_events("PadX", press_release(10));
        assert!(wait_for(&session, "A", 42).await);
        session.shutdown().await;
    }
}
