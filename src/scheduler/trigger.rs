//! Cron-driven rotation trigger
//!
//! The trigger owns the duty desk and is the only place where the rotation
//! moves. Timer fires and operator commands are handled one at a time in a
//! single loop: advance, persist the index, then hand the new name to the
//! notifier on a background task so a slow notifier never delays the next
//! fire.

use chrono::{DateTime, Local, TimeZone};
use cron::Schedule;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use super::error::{SchedulerError, SchedulerResult};
use crate::availability::{system_clock, AvailabilityStore};
use crate::commands::{Command, DutyDesk, Reply};
use crate::config::Config;
use crate::notifications::{self, DeliveryStatus, Notifier};
use crate::rotation::{Assignment, FileStateStore, RotationEngine, StateStore};
use crate::utils::human_duration;

/// Schedule used when none is configured: 09:00 on working days
pub const DEFAULT_SCHEDULE: &str = "0 9 * * Mon-Fri";

const EVENT_CAPACITY: usize = 100;
const REQUEST_CAPACITY: usize = 32;

// ============================================================================
// Trigger Configuration
// ============================================================================

/// Configuration for the rotation trigger
///
/// `schedule` takes 5 fields (`min hour dom mon dow`) or 6 with a leading
/// seconds field (`sec min hour dom mon dow`). A 6-field expression that
/// only parses with the seconds field last, such as `0 9 * * MON-FRI *`,
/// is read that way instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Cron expression
    pub schedule: String,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            schedule: DEFAULT_SCHEDULE.to_string(),
        }
    }
}

impl TriggerConfig {
    /// Config firing on `schedule`
    pub fn new(schedule: impl Into<String>) -> Self {
        Self {
            schedule: schedule.into(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> SchedulerResult<()> {
        if self.schedule.trim().is_empty() {
            return Err(SchedulerError::trigger_config(
                "schedule",
                "Schedule expression cannot be empty",
            ));
        }
        parse_cron(&self.schedule).map(|_| ())
    }
}

/// Parse a cron expression.
///
/// 5-field input gets a zero seconds field prepended. 6-field input is
/// read seconds-first; when that fails, the last field is tried as the
/// seconds field, with `*` there meaning second 0.
pub fn parse_cron(expr: &str) -> SchedulerResult<Schedule> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    let normalized = if fields.len() == 5 {
        format!("0 {}", fields.join(" "))
    } else {
        fields.join(" ")
    };

    match Schedule::from_str(&normalized) {
        Ok(schedule) => Ok(schedule),
        Err(e) if fields.len() == 6 => {
            let (head, seconds) = fields.split_at(5);
            // A trailing wildcard means "on the minute", not every second
            let seconds = match seconds[0] {
                "*" => "0",
                other => other,
            };
            let seconds_first = format!("{seconds} {}", head.join(" "));
            Schedule::from_str(&seconds_first)
                .map(|schedule| {
                    debug!(expr = %expr, "Read the last cron field as seconds");
                    schedule
                })
                .map_err(|_| SchedulerError::invalid_schedule(expr, e.to_string()))
        }
        Err(e) => Err(SchedulerError::invalid_schedule(expr, e.to_string())),
    }
}

/// First fire time strictly after `after`
pub fn next_fire<Tz: TimeZone>(schedule: &Schedule, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    schedule.after(after).next()
}

// ============================================================================
// Trigger Events
// ============================================================================

/// Why the rotation moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdvanceReason {
    /// The schedule fired
    Scheduled,
    /// Someone asked for the next person
    Manual,
    /// Someone named the new person explicitly
    SetCurrent,
}

/// Result of one rotation change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvanceOutcome {
    /// Person on duty before the change
    pub previous: Assignment,
    /// Person on duty after the change
    pub assignment: Assignment,
    /// Whether the new index reached the state store
    pub persisted: bool,
    /// What caused the change
    pub reason: AdvanceReason,
}

/// Events emitted by the trigger
#[derive(Debug, Clone)]
pub enum TriggerEvent {
    /// The rotation moved
    Advanced(AdvanceOutcome),

    /// The new index could not be stored; memory and disk disagree
    PersistFailed { index: usize, reason: String },

    /// The notifier accepted the announcement
    NotificationDelivered {
        person: String,
        status: DeliveryStatus,
    },

    /// The notifier failed; the rotation is unaffected
    NotificationFailed { person: String, reason: String },

    /// The timer was armed for a new fire time
    Rescheduled { next_fire: DateTime<Local> },
}

// ============================================================================
// Rotation Trigger
// ============================================================================

/// What a background notification task has to say
enum Announcement {
    DutyChanged { person: String },
    Question { person: String, asker: String },
}

enum Request {
    Execute {
        command: Command,
        reply: oneshot::Sender<Reply>,
    },
    SwitchNow {
        reply: oneshot::Sender<AdvanceOutcome>,
    },
}

/// Owner of the rotation: timer, persistence and notification
pub struct RotationTrigger {
    config: TriggerConfig,
    schedule: Schedule,
    desk: DutyDesk,
    state: Box<dyn StateStore>,
    notifier: Arc<dyn Notifier>,
    event_sender: broadcast::Sender<TriggerEvent>,
    notifications: JoinSet<()>,
}

impl RotationTrigger {
    /// Create a trigger and restore the persisted rotation index.
    ///
    /// An unreadable state file is logged and the rotation starts from the
    /// desk's current position.
    pub fn new(
        config: TriggerConfig,
        mut desk: DutyDesk,
        state: Box<dyn StateStore>,
        notifier: Arc<dyn Notifier>,
    ) -> SchedulerResult<Self> {
        config.validate()?;
        let schedule = parse_cron(&config.schedule)?;

        match state.load() {
            Ok(Some(index)) => {
                let restored = desk.engine_mut().set_index(index);
                info!(person = %restored.name, index = restored.index, "Restored rotation position");
            }
            Ok(None) => debug!("No stored rotation position, starting from the top"),
            Err(e) => warn!(error = %e, "Cannot read rotation position, starting from the top"),
        }

        let (event_sender, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            config,
            schedule,
            desk,
            state,
            notifier,
            event_sender,
            notifications: JoinSet::new(),
        })
    }

    /// Assemble the trigger described by `config`: roster, availability
    /// file, index file, notifier and schedule.
    pub fn from_config(config: &Config) -> crate::error::Result<Self> {
        let engine = RotationEngine::new(&config.team.members)?;
        let store = AvailabilityStore::open(&config.team.daysoff_file, system_clock());
        let desk = DutyDesk::new(engine, store)
            .with_question_interval(Duration::from_secs(config.team.question_interval_secs));
        let state = Box::new(FileStateStore::new(&config.team.state_file));
        let notifier = notifications::from_config(&config.notifier)?;

        Ok(Self::new(config.trigger.clone(), desk, state, notifier)?)
    }

    /// Trigger configuration
    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    /// Duty desk driven by this trigger
    pub fn desk(&self) -> &DutyDesk {
        &self.desk
    }

    /// Subscribe to trigger events
    pub fn subscribe(&self) -> broadcast::Receiver<TriggerEvent> {
        self.event_sender.subscribe()
    }

    /// Next fire time strictly after now
    pub fn next_fire_time(&self) -> Option<DateTime<Local>> {
        next_fire(&self.schedule, &Local::now())
    }

    /// Advance immediately, persist, and dispatch the notification.
    ///
    /// The notification runs in the background; use
    /// [`drain_notifications`](Self::drain_notifications) to wait for it.
    pub fn switch_now(&mut self) -> AdvanceOutcome {
        let previous = self.desk.show_current();
        let assignment = self.desk.advance();
        self.commit(previous, assignment, AdvanceReason::Manual)
    }

    /// Execute an operator command.
    ///
    /// Commands that move the rotation are persisted and notified exactly
    /// like a scheduled advance.
    pub fn execute(&mut self, command: Command) -> Reply {
        let previous = self.desk.show_current();
        let reply = self.desk.execute(command);

        let reason = match &reply {
            Reply::Switched(_) => Some(AdvanceReason::Manual),
            Reply::CurrentSet(_) => Some(AdvanceReason::SetCurrent),
            _ => None,
        };
        if let (Some(reason), Some(assignment)) = (reason, reply.rotation_change()) {
            self.commit(previous, assignment.clone(), reason);
        }
        if let Reply::QuestionRelay { sheriff, asker } = &reply {
            self.dispatch(Announcement::Question {
                person: sheriff.name.clone(),
                asker: asker.clone(),
            });
        }

        reply
    }

    /// Wait for every in-flight notification to finish
    pub async fn drain_notifications(&mut self) {
        while let Some(result) = self.notifications.join_next().await {
            log_join_result(result);
        }
    }

    /// Run the trigger loop on the current runtime
    pub fn spawn(self) -> TriggerHandle {
        let (request_tx, request_rx) = mpsc::channel(REQUEST_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let event_sender = self.event_sender.clone();

        let task = tokio::spawn(self.run(request_rx, shutdown_rx));

        TriggerHandle {
            commands: CommandSender {
                requests: request_tx,
            },
            event_sender,
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run(
        mut self,
        mut requests: mpsc::Receiver<Request>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(schedule = %self.config.schedule, "Rotation trigger started");

        let mut last_target: Option<DateTime<Local>> = None;
        let mut announced: Option<Option<DateTime<Local>>> = None;
        let mut requests_open = true;

        loop {
            let now = Local::now();
            let from = match last_target {
                Some(t) if t > now => t,
                _ => now,
            };
            let target = next_fire(&self.schedule, &from);

            if announced != Some(target) {
                self.announce(target, now);
                announced = Some(target);
            }

            let delay = target.map(|t| (t - now).to_std().unwrap_or_default());

            tokio::select! {
                _ = sleep_or_forever(delay) => {
                    last_target = target;
                    self.fire();
                }
                request = requests.recv(), if requests_open => match request {
                    Some(request) => self.handle(request),
                    None => {
                        debug!("All command senders dropped, running on the timer only");
                        requests_open = false;
                    }
                },
                Some(result) = self.notifications.join_next(), if !self.notifications.is_empty() => {
                    log_join_result(result);
                }
                _ = shutdown.changed() => {
                    break;
                }
            }
        }

        let pending = self.notifications.len();
        if pending > 0 {
            warn!(pending, "Abandoning in-flight notifications");
        }
        self.notifications.shutdown().await;
        info!("Rotation trigger stopped");
    }

    fn handle(&mut self, request: Request) {
        match request {
            Request::Execute { command, reply } => {
                let answer = self.execute(command);
                let _ = reply.send(answer);
            }
            Request::SwitchNow { reply } => {
                let outcome = self.switch_now();
                let _ = reply.send(outcome);
            }
        }
    }

    fn fire(&mut self) {
        let previous = self.desk.show_current();
        let assignment = self.desk.advance();
        self.commit(previous, assignment, AdvanceReason::Scheduled);
    }

    fn announce(&self, target: Option<DateTime<Local>>, now: DateTime<Local>) {
        match target {
            Some(next_fire) => {
                let wait = human_duration((next_fire - now).num_seconds());
                info!(
                    next_fire = %next_fire.format("%Y-%m-%d %H:%M:%S"),
                    "Next rotation in {wait}"
                );
                let _ = self.event_sender.send(TriggerEvent::Rescheduled { next_fire });
            }
            None => {
                let err = SchedulerError::no_upcoming_fire(&self.config.schedule);
                error!(error = %err, "Timer disarmed, only commands will move the rotation");
            }
        }
    }

    fn commit(
        &mut self,
        previous: Assignment,
        assignment: Assignment,
        reason: AdvanceReason,
    ) -> AdvanceOutcome {
        let persisted = match self.state.save(assignment.index) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    index = assignment.index,
                    category = e.category().as_str(),
                    recoverable = e.is_recoverable(),
                    error = %e,
                    "Failed to persist rotation index, continuing in memory"
                );
                let _ = self.event_sender.send(TriggerEvent::PersistFailed {
                    index: assignment.index,
                    reason: e.to_string(),
                });
                false
            }
        };

        let outcome = AdvanceOutcome {
            previous,
            assignment,
            persisted,
            reason,
        };
        info!(
            person = %outcome.assignment.name,
            index = outcome.assignment.index,
            reason = ?reason,
            persisted,
            "Person-on-duty changed"
        );
        let _ = self.event_sender.send(TriggerEvent::Advanced(outcome.clone()));

        self.dispatch(Announcement::DutyChanged {
            person: outcome.assignment.name.clone(),
        });
        outcome
    }

    fn dispatch(&mut self, announcement: Announcement) {
        let notifier = Arc::clone(&self.notifier);
        let events = self.event_sender.clone();

        self.notifications.spawn(async move {
            let (person, result) = match announcement {
                Announcement::DutyChanged { person } => {
                    let result = notifier.notify_current(&person).await;
                    (person, result)
                }
                Announcement::Question { person, asker } => {
                    let result = notifier.relay_question(&person, &asker).await;
                    (person, result)
                }
            };
            let event = match result {
                Ok(status) if status.success => {
                    debug!(person = %person, status = %status, "Notification delivered");
                    TriggerEvent::NotificationDelivered { person, status }
                }
                Ok(status) => {
                    warn!(person = %person, status = %status, "Notification not delivered");
                    TriggerEvent::NotificationFailed {
                        person,
                        reason: status.to_string(),
                    }
                }
                Err(e) => {
                    warn!(person = %person, notifier = notifier.name(), error = %e, "Notification failed");
                    TriggerEvent::NotificationFailed {
                        person,
                        reason: e.to_string(),
                    }
                }
            };
            let _ = events.send(event);
        });
    }
}

async fn sleep_or_forever(delay: Option<std::time::Duration>) {
    match delay {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending::<()>().await,
    }
}

fn log_join_result(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            let err = SchedulerError::execution_failed(format!("notification task panicked: {e}"));
            error!(error = %err, "Notification task aborted");
        }
    }
}

// ============================================================================
// Handles
// ============================================================================

/// Cloneable entry point into a running trigger's command queue
#[derive(Clone)]
pub struct CommandSender {
    requests: mpsc::Sender<Request>,
}

impl CommandSender {
    /// Queue `command` and wait for its reply
    pub async fn execute(&self, command: Command) -> SchedulerResult<Reply> {
        let (reply, answer) = oneshot::channel();
        self.requests
            .send(Request::Execute { command, reply })
            .await
            .map_err(|_| SchedulerError::LoopStopped)?;
        answer.await.map_err(|_| SchedulerError::LoopStopped)
    }

    /// Advance immediately and wait for the outcome
    pub async fn switch_now(&self) -> SchedulerResult<AdvanceOutcome> {
        let (reply, answer) = oneshot::channel();
        self.requests
            .send(Request::SwitchNow { reply })
            .await
            .map_err(|_| SchedulerError::LoopStopped)?;
        answer.await.map_err(|_| SchedulerError::LoopStopped)
    }
}

/// Control handle for a spawned trigger loop
///
/// Dropping the handle stops the loop as if [`shutdown`](Self::shutdown)
/// had been called, without waiting for it.
pub struct TriggerHandle {
    commands: CommandSender,
    event_sender: broadcast::Sender<TriggerEvent>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl TriggerHandle {
    /// A sender that can be moved into other tasks
    pub fn commands(&self) -> CommandSender {
        self.commands.clone()
    }

    /// Queue `command` and wait for its reply
    pub async fn execute(&self, command: Command) -> SchedulerResult<Reply> {
        self.commands.execute(command).await
    }

    /// Advance immediately and wait for the outcome
    pub async fn switch_now(&self) -> SchedulerResult<AdvanceOutcome> {
        self.commands.switch_now().await
    }

    /// Subscribe to trigger events
    pub fn subscribe(&self) -> broadcast::Receiver<TriggerEvent> {
        self.event_sender.subscribe()
    }

    /// Cancel the pending timer and wait for the loop to exit
    pub async fn shutdown(self) -> SchedulerResult<()> {
        let _ = self.shutdown.send(true);
        self.task
            .await
            .map_err(|e| SchedulerError::execution_failed(format!("trigger loop failed: {e}")))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::{fixed_clock, AvailabilityStore};
    use crate::error::{Error, ErrorCategory, Result};
    use crate::notifications::NotifyError;
    use crate::rotation::{MemoryStateStore, RotationEngine};
    use async_trait::async_trait;
    use chrono::{NaiveDate, Timelike, Utc};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::timeout;

    /// Records every name it is asked to announce
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
        questions: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl Recorder {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }

        fn questions(&self) -> Vec<(String, String)> {
            self.questions.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        async fn notify_current(&self, person: &str) -> std::result::Result<DeliveryStatus, NotifyError> {
            self.seen.lock().unwrap().push(person.to_string());
            if self.fail {
                Err(NotifyError::Unavailable("chat is down".into()))
            } else {
                Ok(DeliveryStatus::success(self.name()))
            }
        }

        async fn relay_question(
            &self,
            person: &str,
            asker: &str,
        ) -> std::result::Result<DeliveryStatus, NotifyError> {
            self.questions
                .lock()
                .unwrap()
                .push((person.to_string(), asker.to_string()));
            Ok(DeliveryStatus::success(self.name()))
        }
    }

    /// Never finishes a delivery
    struct Stalled;

    #[async_trait]
    impl Notifier for Stalled {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn notify_current(&self, _person: &str) -> std::result::Result<DeliveryStatus, NotifyError> {
            std::future::pending().await
        }

        async fn relay_question(
            &self,
            _person: &str,
            _asker: &str,
        ) -> std::result::Result<DeliveryStatus, NotifyError> {
            std::future::pending().await
        }
    }

    struct BrokenDisk;

    impl StateStore for BrokenDisk {
        fn load(&self) -> Result<Option<usize>> {
            Ok(None)
        }

        fn save(&self, _index: usize) -> Result<()> {
            Err(Error::io(
                "cache.txt",
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            ))
        }
    }

    fn desk() -> DutyDesk {
        // 2016-02-22 is a Monday
        let monday = NaiveDate::from_ymd_opt(2016, 2, 22).unwrap();
        let engine = RotationEngine::new(["alice", "bob", "carol"]).unwrap();
        let mut store = AvailabilityStore::in_memory().with_clock(fixed_clock(monday));
        store.add("alice", ["MON"]);
        DutyDesk::new(engine, store)
    }

    #[test]
    fn test_parse_cron_five_and_six_fields() {
        assert!(parse_cron("0 9 * * Mon-Fri").is_ok());
        assert!(parse_cron("*/5 * * * * *").is_ok());
        assert!(matches!(
            parse_cron("not a schedule"),
            Err(SchedulerError::InvalidSchedule { .. })
        ));
    }

    #[test]
    fn test_parse_cron_trailing_seconds() {
        let schedule = parse_cron("0 9 * * MON-FRI *").unwrap();
        let friday = Utc.with_ymd_and_hms(2016, 2, 26, 10, 0, 0).unwrap();

        let next = next_fire(&schedule, &friday).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2016, 2, 29, 9, 0, 0).unwrap());
        // Only once that minute, not every second of it
        let after = next_fire(&schedule, &next).unwrap();
        assert_eq!(after, Utc.with_ymd_and_hms(2016, 3, 1, 9, 0, 0).unwrap());

        assert!(parse_cron("0 9 * * MON-FRI nope").is_err());
    }

    #[test]
    fn test_trigger_config_validate() {
        assert!(TriggerConfig::default().validate().is_ok());
        assert!(matches!(
            TriggerConfig::new("  ").validate(),
            Err(SchedulerError::TriggerConfigError { .. })
        ));
        assert!(TriggerConfig::new("99 * * * *").validate().is_err());
    }

    #[test]
    fn test_next_fire_skips_weekend() {
        let schedule = parse_cron(DEFAULT_SCHEDULE).unwrap();
        // Friday 2016-02-26 10:00, after that day's fire
        let friday = Utc.with_ymd_and_hms(2016, 2, 26, 10, 0, 0).unwrap();

        let next = next_fire(&schedule, &friday).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2016, 2, 29, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_next_fire_is_strictly_after() {
        let schedule = parse_cron(DEFAULT_SCHEDULE).unwrap();
        let at_fire = Utc.with_ymd_and_hms(2016, 2, 22, 9, 0, 0).unwrap();

        let next = next_fire(&schedule, &at_fire).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2016, 2, 23, 9, 0, 0).unwrap());
        assert_eq!(next.hour(), 9);
    }

    #[tokio::test]
    async fn test_switch_now_persists_and_notifies() {
        let state = MemoryStateStore::new();
        let notifier = Arc::new(Recorder::default());
        let mut trigger = RotationTrigger::new(
            TriggerConfig::default(),
            desk(),
            Box::new(state.clone()),
            notifier.clone(),
        )
        .unwrap();

        let outcome = trigger.switch_now();
        trigger.drain_notifications().await;

        assert_eq!(outcome.previous.name, "alice");
        assert_eq!(outcome.assignment.name, "bob");
        assert!(outcome.persisted);
        assert_eq!(outcome.reason, AdvanceReason::Manual);
        assert_eq!(state.get(), Some(1));
        assert_eq!(notifier.seen(), vec!["bob".to_string()]);
    }

    #[tokio::test]
    async fn test_restores_persisted_index() {
        let trigger = RotationTrigger::new(
            TriggerConfig::default(),
            desk(),
            Box::new(MemoryStateStore::with_index(5)),
            Arc::new(Recorder::default()),
        )
        .unwrap();

        // 5 wraps to 2 in a roster of three
        assert_eq!(trigger.desk().show_current().name, "carol");
    }

    #[tokio::test]
    async fn test_persist_failure_keeps_rotating() {
        let mut trigger = RotationTrigger::new(
            TriggerConfig::default(),
            desk(),
            Box::new(BrokenDisk),
            Arc::new(Recorder::default()),
        )
        .unwrap();
        let mut events = trigger.subscribe();

        let outcome = trigger.switch_now();
        assert!(!outcome.persisted);
        assert_eq!(trigger.desk().show_current().name, "bob");

        match events.try_recv().unwrap() {
            TriggerEvent::PersistFailed { index, reason } => {
                assert_eq!(index, 1);
                assert!(reason.contains("read-only"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(events.try_recv().unwrap(), TriggerEvent::Advanced(_)));
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_roll_back() {
        let state = MemoryStateStore::new();
        let mut trigger = RotationTrigger::new(
            TriggerConfig::default(),
            desk(),
            Box::new(state.clone()),
            Arc::new(Recorder::failing()),
        )
        .unwrap();
        let mut events = trigger.subscribe();

        trigger.switch_now();
        trigger.drain_notifications().await;

        assert_eq!(state.get(), Some(1));
        assert_eq!(trigger.desk().show_current().name, "bob");

        let mut failed = false;
        while let Ok(event) = events.try_recv() {
            if let TriggerEvent::NotificationFailed { person, reason } = event {
                assert_eq!(person, "bob");
                assert!(reason.contains("chat is down"));
                failed = true;
            }
        }
        assert!(failed);
    }

    #[tokio::test]
    async fn test_execute_set_current_commits() {
        let state = MemoryStateStore::new();
        let notifier = Arc::new(Recorder::default());
        let mut trigger = RotationTrigger::new(
            TriggerConfig::default(),
            desk(),
            Box::new(state.clone()),
            notifier.clone(),
        )
        .unwrap();

        let reply = trigger.execute(Command::SetCurrent { prefix: "CA".into() });
        trigger.drain_notifications().await;
        assert!(matches!(reply, Reply::CurrentSet(ref a) if a.name == "carol"));
        assert_eq!(state.get(), Some(2));
        assert_eq!(notifier.seen(), vec!["carol".to_string()]);

        // Not found: nothing persisted, nobody notified
        let reply = trigger.execute(Command::SetCurrent { prefix: "zz".into() });
        trigger.drain_notifications().await;
        assert_eq!(reply, Reply::UnknownMember("zz".into()));
        assert_eq!(notifier.seen().len(), 1);

        // Read-only commands never persist
        trigger.execute(Command::ShowNext);
        assert_eq!(state.get(), Some(2));
    }

    #[tokio::test]
    async fn test_question_is_relayed_without_moving_rotation() {
        let state = MemoryStateStore::new();
        let notifier = Arc::new(Recorder::default());
        let mut trigger = RotationTrigger::new(
            TriggerConfig::default(),
            desk(),
            Box::new(state.clone()),
            notifier.clone(),
        )
        .unwrap();

        let reply = trigger.execute(Command::Question {
            asker: "dave".into(),
        });
        // Inside the default interval the second one is dropped
        let again = trigger.execute(Command::Question {
            asker: "erin".into(),
        });
        trigger.drain_notifications().await;

        assert!(matches!(reply, Reply::QuestionRelay { ref sheriff, .. } if sheriff.name == "alice"));
        assert_eq!(again, Reply::Silent);
        assert_eq!(notifier.questions(), vec![("alice".to_string(), "dave".to_string())]);
        assert!(notifier.seen().is_empty());
        assert_eq!(state.get(), None);
    }

    #[tokio::test]
    async fn test_stalled_notifier_never_blocks_the_loop() {
        let state = MemoryStateStore::new();
        let trigger = RotationTrigger::new(
            TriggerConfig::default(),
            desk(),
            Box::new(state.clone()),
            Arc::new(Stalled),
        )
        .unwrap();
        let handle = trigger.spawn();

        for expected in ["bob", "carol"] {
            let outcome = timeout(Duration::from_secs(2), handle.switch_now())
                .await
                .expect("switch_now waited on the notifier")
                .unwrap();
            assert_eq!(outcome.assignment.name, expected);
        }

        let reply = timeout(Duration::from_secs(2), handle.execute(Command::ShowCurrent))
            .await
            .expect("command waited on the notifier")
            .unwrap();
        assert_eq!(reply.to_string(), "The current sheriff is: carol");
        assert_eq!(state.get(), Some(2));

        timeout(Duration::from_secs(2), handle.shutdown())
            .await
            .expect("shutdown waited on the notifier")
            .unwrap();
    }

    #[test]
    fn test_from_config_assembles_trigger() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.team.members = vec!["bob".into(), "alice".into()];
        config.team.daysoff_file = dir.path().join("daysoff.txt");
        config.team.state_file = dir.path().join("cache.txt");
        std::fs::write(&config.team.state_file, "[schedule]\nlast_idx = 1\n").unwrap();

        let trigger = RotationTrigger::from_config(&config).unwrap();

        assert_eq!(trigger.desk().show_current().name, "bob");
        assert_eq!(trigger.desk().show_days_off("alice"), Some(vec![]));
        let daysoff = std::fs::read_to_string(&config.team.daysoff_file).unwrap();
        assert!(daysoff.contains("[alice]") && daysoff.contains("[bob]"));
    }

    #[test]
    fn test_from_config_reports_error_category() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.team.daysoff_file = dir.path().join("daysoff.txt");
        config.team.state_file = dir.path().join("cache.txt");

        let err = RotationTrigger::from_config(&config).err().unwrap();
        assert_eq!(err.category(), ErrorCategory::Rotation);
        assert!(!err.is_recoverable());

        config.team.members = vec!["alice".into()];
        config.trigger.schedule = "every morning".into();
        let err = RotationTrigger::from_config(&config).err().unwrap();
        assert_eq!(err.category(), ErrorCategory::Scheduler);
        assert!(matches!(err, Error::Scheduler(SchedulerError::InvalidSchedule { .. })));
    }

    #[tokio::test]
    async fn test_spawned_loop_fires_on_schedule() {
        let state = MemoryStateStore::new();
        let trigger = RotationTrigger::new(
            TriggerConfig::new("* * * * * *"),
            desk(),
            Box::new(state.clone()),
            Arc::new(Recorder::default()),
        )
        .unwrap();
        let mut events = trigger.subscribe();
        let handle = trigger.spawn();

        let outcome = timeout(Duration::from_secs(5), async {
            loop {
                match events.recv().await {
                    Ok(TriggerEvent::Advanced(outcome)) => return outcome,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => panic!("trigger loop exited"),
                }
            }
        })
        .await
        .expect("timer should fire within a few seconds");

        assert_eq!(outcome.reason, AdvanceReason::Scheduled);
        assert_eq!(outcome.assignment.name, "bob");
        handle.shutdown().await.unwrap();
        assert!(state.get().is_some());
    }

    #[tokio::test]
    async fn test_handle_routes_commands_through_loop() {
        let state = MemoryStateStore::new();
        let trigger = RotationTrigger::new(
            TriggerConfig::default(),
            desk(),
            Box::new(state.clone()),
            Arc::new(Recorder::default()),
        )
        .unwrap();
        let handle = trigger.spawn();

        let reply = handle.execute(Command::ShowCurrent).await.unwrap();
        assert_eq!(reply.to_string(), "The current sheriff is: alice");

        let outcome = handle.switch_now().await.unwrap();
        assert_eq!(outcome.assignment.name, "bob");
        assert_eq!(state.get(), Some(1));

        let commands = handle.commands();
        handle.shutdown().await.unwrap();
        assert_eq!(
            commands.execute(Command::ShowCurrent).await.unwrap_err(),
            SchedulerError::LoopStopped
        );
    }
}
