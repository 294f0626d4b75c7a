//! Operator and chat commands
//!
//! Every request that reads or changes the rotation, whether typed into a
//! chat room, the console, or given on the command line, becomes a
//! [`Command`]. A [`DutyDesk`] executes it against the rotation engine and
//! the availability store and answers with a [`Reply`] whose `Display`
//! output is what the person sees.
//!
//! # Chat syntax
//!
//! ```text
//! !IM_OFF @bob mon 2016-02-24
//! !SHOW_DAYS
//! !NEXT_SHERIFF
//! does anyone know why the build is red?
//! ```
//!
//! Plain lines ending in `?` are questions; they are relayed to the
//! current sheriff, at most once per throttle interval.

use chrono::NaiveDate;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::availability::{AvailabilityStore, ChangeSet, DayOff};
use crate::rotation::{Assignment, RotationEngine};

/// Text shown for `!HELP`
pub const HELP_TEXT: &str = "\
Available commands (all commands start with '!'):
  !HELP                      : show this message.
  !IM_OFF  [@someone] <args> : add your (or someone's) days off.
           - @someone : (optional) if specified, the days are added for that person instead of you.
           - Format   : yyyy-mm-dd (2016-01-31) or \"mon\", \"tue\", etc. (not case-sensitive)
  !IM_BACK [@someone] <args> : remove your (or someone's) days off.
           - @someone : (optional) if specified, the days are removed for that person instead of you.
           - Format   : yyyy-mm-dd (2016-01-31) or \"mon\", \"tue\", etc. (not case-sensitive)
  !SHOW_DAYS [@someone]      : show a list of your (or someone's) days off.
  !SHOW_SHERIFF              : show the current sheriff.
  !SHOW_NEXT_SHERIFF         : show the next sheriff.
  !NEXT_SHERIFF              : switch to the next sheriff.
  !SET_SHERIFF <name>        : make the first member whose name starts with <name> the sheriff.
Any other message ending with '?' is forwarded to the current sheriff.";

/// Minimum time between two relayed questions
pub const DEFAULT_QUESTION_INTERVAL: Duration = Duration::from_secs(10);

// ============================================================================
// Commands
// ============================================================================

/// Whose days off a command is about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Who {
    /// The person issuing the command, taken verbatim
    Caller(String),
    /// A name or name prefix that must resolve against the roster
    Mention(String),
}

/// A request against the duty desk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show the command summary
    Help,
    /// Declare days off
    AddDaysOff { who: Who, tokens: Vec<String> },
    /// Withdraw days off
    RemoveDaysOff { who: Who, tokens: Vec<String> },
    /// List someone's days off
    ShowDaysOff { who: Who },
    /// Who is on duty now
    ShowCurrent,
    /// Who would be picked by the next advance today
    ShowNext,
    /// Advance the rotation immediately
    AdvanceNow,
    /// Hand the duty to the first member matching a prefix
    SetCurrent { prefix: String },
    /// Someone asked the room a question
    Question { asker: String },
}

/// Parse a chat line sent by `caller`.
///
/// Returns `None` for lines that are neither commands nor questions.
/// Command names are case-insensitive; the first `@name` argument, if any,
/// selects whose days off are meant.
pub fn parse_line(line: &str, caller: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();
    let head = parts.next()?;
    let Some(name) = head.strip_prefix('!') else {
        return question(line, caller);
    };
    let name = name.to_uppercase();
    let args: Vec<&str> = parts.collect();

    let command = match name.as_str() {
        "HELP" => Command::Help,
        "IM_OFF" => {
            let (who, tokens) = split_mention(&args, caller);
            Command::AddDaysOff { who, tokens }
        }
        "IM_BACK" => {
            let (who, tokens) = split_mention(&args, caller);
            Command::RemoveDaysOff { who, tokens }
        }
        "SHOW_DAYS" => Command::ShowDaysOff {
            who: split_mention(&args, caller).0,
        },
        "SHOW_SHERIFF" => Command::ShowCurrent,
        "SHOW_NEXT_SHERIFF" => Command::ShowNext,
        "NEXT_SHERIFF" => Command::AdvanceNow,
        "SET_SHERIFF" => match args.first().map(|a| a.trim_start_matches('@')) {
            Some(prefix) if !prefix.is_empty() => Command::SetCurrent {
                prefix: prefix.to_string(),
            },
            _ => Command::Help,
        },
        _ => {
            debug!(command = %head, "Not a known command");
            return question(line, caller);
        }
    };

    Some(command)
}

fn question(line: &str, caller: &str) -> Option<Command> {
    line.trim().ends_with('?').then(|| Command::Question {
        asker: caller.to_string(),
    })
}

fn split_mention(args: &[&str], caller: &str) -> (Who, Vec<String>) {
    let mut who = None;
    let mut tokens = Vec::with_capacity(args.len());

    for arg in args {
        match arg.strip_prefix('@') {
            Some(name) if who.is_none() => who = Some(Who::Mention(name.to_string())),
            _ => tokens.push(arg.to_string()),
        }
    }

    (who.unwrap_or_else(|| Who::Caller(caller.to_string())), tokens)
}

// ============================================================================
// Replies
// ============================================================================

/// Answer to a [`Command`], rendered as chat text by `Display`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Command summary
    Help,
    /// Someone's days off, with any tokens that were rejected
    DaysOff {
        name: String,
        days: Vec<DayOff>,
        invalid: Vec<String>,
    },
    /// A mention or prefix matched nobody on the roster
    UnknownMember(String),
    /// Current person-on-duty
    Current(Assignment),
    /// Who the next advance would pick
    Next(Assignment),
    /// The rotation advanced
    Switched(Assignment),
    /// The duty was handed over explicitly
    CurrentSet(Assignment),
    /// A question is forwarded to the person on duty
    QuestionRelay { sheriff: Assignment, asker: String },
    /// Nothing to say, e.g. a question inside the throttle interval
    Silent,
}

impl Reply {
    /// The new person-on-duty when this reply reports a rotation change
    pub fn rotation_change(&self) -> Option<&Assignment> {
        match self {
            Self::Switched(a) | Self::CurrentSet(a) => Some(a),
            _ => None,
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Help => f.write_str(HELP_TEXT),
            Self::DaysOff {
                name,
                days,
                invalid,
            } => {
                if days.is_empty() {
                    write!(f, "{name} doesn't have any days off registered")?;
                } else {
                    let listed: Vec<String> = days.iter().map(DayOff::to_string).collect();
                    write!(f, "{name} has the following days off: [{}]", listed.join(", "))?;
                }
                if !invalid.is_empty() {
                    write!(f, "\nIgnored invalid entries: [{}]", invalid.join(", "))?;
                }
                Ok(())
            }
            Self::UnknownMember(name) => {
                write!(f, "could not find team member with name '{name}'")
            }
            Self::Current(a) => write!(f, "The current sheriff is: {}", a.name),
            Self::Next(a) => write!(f, "Next sheriff is: {}", a.name),
            Self::Switched(a) => write!(f, "Switching to the next sheriff: {}", a.name),
            Self::CurrentSet(a) => write!(f, "The sheriff is now: {}", a.name),
            Self::QuestionRelay { sheriff, asker } => write!(
                f,
                "Hi sheriff {}, {asker} may have asked a question. Could you have a look?",
                sheriff.name
            ),
            Self::Silent => Ok(()),
        }
    }
}

// ============================================================================
// Duty desk
// ============================================================================

/// Lets one question through per interval
#[derive(Debug, Clone)]
struct QuestionThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl QuestionThrottle {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    fn admit(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Rotation engine and availability store behind one command interface
#[derive(Debug)]
pub struct DutyDesk {
    engine: RotationEngine,
    availability: AvailabilityStore,
    questions: QuestionThrottle,
}

impl DutyDesk {
    /// Combine an engine with the store it consults.
    ///
    /// Every roster member gets a record in the store, so a member without
    /// days off reads as "none registered" rather than unknown.
    pub fn new(engine: RotationEngine, mut availability: AvailabilityStore) -> Self {
        availability.track(engine.roster());
        Self {
            engine,
            availability,
            questions: QuestionThrottle::new(DEFAULT_QUESTION_INTERVAL),
        }
    }

    /// Relay at most one question per `interval`
    pub fn with_question_interval(mut self, interval: Duration) -> Self {
        self.questions = QuestionThrottle::new(interval);
        self
    }

    /// Rotation engine
    pub fn engine(&self) -> &RotationEngine {
        &self.engine
    }

    /// Mutable rotation engine, used to restore a persisted position
    pub fn engine_mut(&mut self) -> &mut RotationEngine {
        &mut self.engine
    }

    /// Availability store
    pub fn availability(&self) -> &AvailabilityStore {
        &self.availability
    }

    /// The availability store's notion of today
    pub fn today(&self) -> NaiveDate {
        self.availability.today()
    }

    /// Roster member named `query`.
    ///
    /// An exact case-insensitive match wins; otherwise the first member
    /// whose name starts with `query` is returned. A leading `@` is ignored.
    pub fn resolve_member(&self, query: &str) -> Option<String> {
        let query = query.trim().trim_start_matches('@');
        if query.is_empty() {
            return None;
        }

        self.engine
            .roster()
            .iter()
            .find(|m| m.eq_ignore_ascii_case(query))
            .cloned()
            .or_else(|| self.engine.find_member(query).map(|a| a.name))
    }

    /// Declare days off for `name`
    pub fn add_days_off(&mut self, name: &str, tokens: &[String]) -> ChangeSet {
        self.availability.add(name, tokens)
    }

    /// Withdraw days off for `name`
    pub fn remove_days_off(&mut self, name: &str, tokens: &[String]) -> ChangeSet {
        self.availability.remove(name, tokens)
    }

    /// Days off for `name`, or `None` when there is no record
    pub fn show_days_off(&self, name: &str) -> Option<Vec<DayOff>> {
        self.availability.get(name).map(<[DayOff]>::to_vec)
    }

    /// Current person-on-duty
    pub fn show_current(&self) -> Assignment {
        self.engine.current()
    }

    /// Who the next advance would pick today, without moving the rotation
    pub fn show_next(&mut self) -> Assignment {
        let today = self.today();
        self.engine.next_eligible(today, &mut self.availability)
    }

    /// Advance the rotation using today's availability
    pub fn advance(&mut self) -> Assignment {
        let today = self.today();
        self.advance_on(today)
    }

    /// Advance the rotation using availability on `date`
    pub fn advance_on(&mut self, date: NaiveDate) -> Assignment {
        let previous = self.engine.current();
        let next = self.engine.advance(date, &mut self.availability);
        info!(
            from = %previous.name,
            to = %next.name,
            index = next.index,
            %date,
            "Rotation advanced"
        );
        next
    }

    /// Hand the duty to the first member matching `prefix`
    pub fn set_current(&mut self, prefix: &str) -> Option<Assignment> {
        let found = self.engine.set_current(prefix)?;
        info!(person = %found.name, index = found.index, "Person-on-duty set explicitly");
        Some(found)
    }

    /// Current person-on-duty, if a question from `asker` should be relayed now
    pub fn relay_question(&mut self, asker: &str) -> Option<Assignment> {
        if !self.questions.admit(Instant::now()) {
            debug!(asker = %asker, "Question within throttle interval, not relayed");
            return None;
        }
        let sheriff = self.engine.current();
        info!(asker = %asker, sheriff = %sheriff.name, "Relaying question");
        Some(sheriff)
    }

    /// Execute `command` and describe the outcome
    pub fn execute(&mut self, command: Command) -> Reply {
        match command {
            Command::Help => Reply::Help,
            Command::AddDaysOff { who, tokens } => match self.target(who) {
                Ok(name) => {
                    let change = self.add_days_off(&name, &tokens);
                    self.days_off_reply(name, change.invalid)
                }
                Err(reply) => reply,
            },
            Command::RemoveDaysOff { who, tokens } => match self.target(who) {
                Ok(name) => {
                    let change = self.remove_days_off(&name, &tokens);
                    self.days_off_reply(name, change.invalid)
                }
                Err(reply) => reply,
            },
            Command::ShowDaysOff { who } => match self.target(who) {
                Ok(name) => self.days_off_reply(name, Vec::new()),
                Err(reply) => reply,
            },
            Command::ShowCurrent => Reply::Current(self.show_current()),
            Command::ShowNext => Reply::Next(self.show_next()),
            Command::AdvanceNow => Reply::Switched(self.advance()),
            Command::SetCurrent { prefix } => match self.set_current(&prefix) {
                Some(found) => Reply::CurrentSet(found),
                None => Reply::UnknownMember(prefix),
            },
            Command::Question { asker } => match self.relay_question(&asker) {
                Some(sheriff) => Reply::QuestionRelay { sheriff, asker },
                None => Reply::Silent,
            },
        }
    }

    fn target(&self, who: Who) -> Result<String, Reply> {
        match who {
            Who::Caller(name) => Ok(name),
            Who::Mention(query) => self
                .resolve_member(&query)
                .ok_or(Reply::UnknownMember(query)),
        }
    }

    fn days_off_reply(&self, name: String, invalid: Vec<String>) -> Reply {
        let days = self.show_days_off(&name).unwrap_or_default();
        Reply::DaysOff {
            name,
            days,
            invalid,
        }
    }
}
