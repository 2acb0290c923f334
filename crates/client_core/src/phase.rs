//! Round phase engine.
//!
//! A round's phase is a pure function of the current instant and the round's
//! bounds. Both bounds are inclusive for `Active`, so a round whose start and
//! end coincide is active for exactly that instant.

use std::fmt;

use chrono::{DateTime, Utc};
use shared::domain::{RoundStatusFilter, RoundSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoundPhase {
    Waiting,
    Active,
    Finished,
}

impl RoundPhase {
    pub fn accepts_taps(self) -> bool {
        self == RoundPhase::Active
    }

    pub fn status_filter(self) -> RoundStatusFilter {
        match self {
            RoundPhase::Waiting => RoundStatusFilter::Waiting,
            RoundPhase::Active => RoundStatusFilter::Active,
            RoundPhase::Finished => RoundStatusFilter::Finished,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RoundPhase::Waiting => "waiting",
            RoundPhase::Active => "active",
            RoundPhase::Finished => "finished",
        }
    }
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One evaluation of the phase engine. `Unknown` is reported while no round
/// detail is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundClock {
    Unknown,
    Known {
        phase: RoundPhase,
        countdown_secs: u64,
    },
}

impl RoundClock {
    pub fn phase(&self) -> Option<RoundPhase> {
        match self {
            RoundClock::Unknown => None,
            RoundClock::Known { phase, .. } => Some(*phase),
        }
    }

    pub fn countdown_secs(&self) -> Option<u64> {
        match self {
            RoundClock::Unknown => None,
            RoundClock::Known { countdown_secs, .. } => Some(*countdown_secs),
        }
    }

    pub fn accepts_taps(&self) -> bool {
        self.phase().is_some_and(RoundPhase::accepts_taps)
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub fn phase_at(now: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> RoundPhase {
    if now < start {
        RoundPhase::Waiting
    } else if now <= end {
        RoundPhase::Active
    } else {
        RoundPhase::Finished
    }
}

/// Whole seconds until the next phase boundary, rounded down. Zero once the
/// round has finished.
pub fn countdown_at(now: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    let target = match phase_at(now, start, end) {
        RoundPhase::Waiting => start,
        RoundPhase::Active => end,
        RoundPhase::Finished => return 0,
    };
    u64::try_from((target - now).num_seconds()).unwrap_or(0)
}

pub fn read_clock(now: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> RoundClock {
    RoundClock::Known {
        phase: phase_at(now, start, end),
        countdown_secs: countdown_at(now, start, end),
    }
}

pub fn read_round(now: DateTime<Utc>, round: Option<&RoundSummary>) -> RoundClock {
    match round {
        Some(round) => read_clock(now, round.start_time, round.end_time),
        None => RoundClock::Unknown,
    }
}

pub fn round_phase(now: DateTime<Utc>, round: &RoundSummary) -> RoundPhase {
    phase_at(now, round.start_time, round.end_time)
}

/// `MM:SS`; minutes are not wrapped into hours.
pub fn format_countdown(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
