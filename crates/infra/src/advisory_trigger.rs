//! When to ask the advisory service for fresh advice.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Events after which an advisory is requested regardless of time or moisture.
pub const EVENTS_PER_ADVISORY: u32 = 20;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    /// No advisory has been requested yet.
    FirstRun,
    IntervalElapsed,
    LowMoisture,
    EventCount,
}

/// Counts telemetry events and decides when the next advisory is due.
///
/// Firing resets both the time reference and the event counter, whether or
/// not the advisory that follows succeeds.
#[derive(Debug, Clone, Default)]
pub struct AdvisoryTrigger {
    last_fired: Option<DateTime<Utc>>,
    events_since: u32,
}

impl AdvisoryTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_fired(&self) -> Option<DateTime<Utc>> {
        self.last_fired
    }

    pub fn events_since(&self) -> u32 {
        self.events_since
    }

    /// Register one telemetry event and report whether an advisory is due.
    pub fn on_event(
        &mut self,
        now: DateTime<Utc>,
        moisture: f64,
        interval: Duration,
        low_moisture: f64,
    ) -> Option<TriggerReason> {
        self.events_since = self.events_since.saturating_add(1);

        let reason = match self.last_fired {
            None => Some(TriggerReason::FirstRun),
            Some(last) if elapsed(last, now) >= interval => Some(TriggerReason::IntervalElapsed),
            Some(_) if moisture <= low_moisture => Some(TriggerReason::LowMoisture),
            Some(_) if self.events_since >= EVENTS_PER_ADVISORY => Some(TriggerReason::EventCount),
            Some(_) => None,
        };

        if reason.is_some() {
            self.last_fired = Some(now);
            self.events_since = 0;
        }
        reason
    }
}

fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const INTERVAL: Duration = Duration::from_secs(30 * 60);

    fn t(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 6, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
    }

    fn primed() -> AdvisoryTrigger {
        let mut trigger = AdvisoryTrigger::new();
        assert_eq!(trigger.on_event(t(0), 50.0, INTERVAL, 20.0), Some(TriggerReason::FirstRun));
        trigger
    }

    #[test]
    fn first_event_fires() {
        let trigger = primed();
        assert_eq!(trigger.last_fired(), Some(t(0)));
        assert_eq!(trigger.events_since(), 0);
    }

    #[test]
    fn interval_elapsed_fires() {
        let mut trigger = primed();
        assert_eq!(trigger.on_event(t(29), 50.0, INTERVAL, 20.0), None);
        assert_eq!(
            trigger.on_event(t(30), 50.0, INTERVAL, 20.0),
            Some(TriggerReason::IntervalElapsed)
        );
    }

    #[test]
    fn low_moisture_fires_immediately() {
        let mut trigger = primed();
        assert_eq!(
            trigger.on_event(t(1), 20.0, INTERVAL, 20.0),
            Some(TriggerReason::LowMoisture)
        );
        assert_eq!(trigger.last_fired(), Some(t(1)));
    }

    #[test]
    fn twentieth_event_fires_and_resets_counter() {
        let mut trigger = primed();
        for i in 1..EVENTS_PER_ADVISORY {
            assert_eq!(trigger.on_event(t(0), 50.0, INTERVAL, 20.0), None, "event {i}");
        }
        assert_eq!(
            trigger.on_event(t(0), 50.0, INTERVAL, 20.0),
            Some(TriggerReason::EventCount)
        );
        assert_eq!(trigger.events_since(), 0);
    }

    #[test]
    fn clock_going_backwards_does_not_fire() {
        let mut trigger = primed();
        assert_eq!(trigger.on_event(t(-10), 50.0, INTERVAL, 20.0), None);
    }
}
