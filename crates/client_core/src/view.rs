//! Viewing context for a single round: owns the once-per-second phase ticker
//! and gates taps on the current phase.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use shared::domain::{RoundDetail, RoundId, TapDelta};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::debug;

use crate::{
    error::Result,
    phase::{read_round, Clock, RoundClock, RoundPhase},
    ClientError, RoundCache,
};

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

fn held_detail(detail: Option<RoundDetail>, round_id: &RoundId) -> Option<RoundDetail> {
    detail.filter(|detail| detail.round.id == *round_id)
}

/// Periodic phase evaluation for the held round detail. The task stops on
/// its own once the detail is released and is aborted when the ticker is
/// dropped.
pub struct PhaseTicker {
    task: JoinHandle<()>,
    readings: watch::Receiver<RoundClock>,
}

impl PhaseTicker {
    pub fn start(cache: Arc<RoundCache>, clock: Arc<dyn Clock>, round_id: RoundId) -> Self {
        let (tx, readings) = watch::channel(RoundClock::Unknown);
        let task = tokio::spawn(async move {
            debug!(%round_id, "ticker: started");
            let mut interval = time::interval(TICK_PERIOD);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let detail = held_detail(cache.current_round().await, &round_id);
                tx.send_replace(read_round(
                    clock.now(),
                    detail.as_ref().map(|detail| &detail.round),
                ));
                if detail.is_none() {
                    break;
                }
            }
            debug!(%round_id, "ticker: round released; stopped");
        });
        Self { task, readings }
    }

    pub fn readings(&self) -> watch::Receiver<RoundClock> {
        self.readings.clone()
    }

    pub fn latest(&self) -> RoundClock {
        *self.readings.borrow()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for PhaseTicker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct TapGuard<'a>(&'a AtomicBool);

impl<'a> TapGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        (!flag.swap(true, Ordering::AcqRel)).then_some(Self(flag))
    }
}

impl Drop for TapGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct RoundView {
    cache: Arc<RoundCache>,
    clock: Arc<dyn Clock>,
    round_id: RoundId,
    ticker: Option<PhaseTicker>,
    tapping: AtomicBool,
}

impl RoundView {
    /// Loads the round detail and starts ticking. Dropping the returned
    /// future before it resolves leaves no ticker behind.
    pub async fn open(
        cache: Arc<RoundCache>,
        clock: Arc<dyn Clock>,
        round_id: RoundId,
    ) -> Result<Self> {
        cache.get_round_detail(&round_id).await?;
        let ticker = PhaseTicker::start(Arc::clone(&cache), Arc::clone(&clock), round_id.clone());
        Ok(Self {
            cache,
            clock,
            round_id,
            ticker: Some(ticker),
            tapping: AtomicBool::new(false),
        })
    }

    pub fn round_id(&self) -> &RoundId {
        &self.round_id
    }

    /// Latest reading published by the ticker.
    pub fn clock(&self) -> RoundClock {
        self.ticker
            .as_ref()
            .map_or(RoundClock::Unknown, PhaseTicker::latest)
    }

    pub fn subscribe(&self) -> Option<watch::Receiver<RoundClock>> {
        self.ticker.as_ref().map(PhaseTicker::readings)
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.as_ref().is_some_and(PhaseTicker::is_running)
    }

    pub async fn detail(&self) -> Option<RoundDetail> {
        held_detail(self.cache.current_round().await, &self.round_id)
    }

    /// Evaluates the phase right now instead of waiting for the next tick.
    pub async fn evaluate_now(&self) -> RoundClock {
        let detail = self.detail().await;
        read_round(self.clock.now(), detail.as_ref().map(|detail| &detail.round))
    }

    /// Re-fetches the detail and restarts the ticker if it had stopped.
    pub async fn refresh(&mut self) -> Result<RoundDetail> {
        let detail = self.cache.get_round_detail(&self.round_id).await?;
        if !self.is_ticking() {
            self.ticker = Some(PhaseTicker::start(
                Arc::clone(&self.cache),
                Arc::clone(&self.clock),
                self.round_id.clone(),
            ));
        }
        Ok(detail)
    }

    /// Taps the viewed round. Rejected locally, without any request, when the
    /// round is not active right now or another tap is still pending.
    pub async fn tap(&self) -> Result<TapDelta> {
        match self.evaluate_now().await.phase() {
            Some(RoundPhase::Active) => {}
            Some(phase) => return Err(ClientError::TapRejected(phase)),
            None => return Err(ClientError::RoundUnavailable),
        }

        let Some(_guard) = TapGuard::acquire(&self.tapping) else {
            return Err(ClientError::TapInFlight);
        };
        self.cache.register_tap(&self.round_id).await
    }

    /// Stops the ticker and releases the held detail if it is still ours.
    pub async fn close(mut self) {
        self.ticker.take();
        if self.detail().await.is_some() {
            self.cache.clear_current_round().await;
        }
    }
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
