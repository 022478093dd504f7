use crate::dispatch::{CollectorTransport, DispatchOutcome, UpdateDispatcher};
use crate::error::AppError;
use crate::indicator::{IndicatorDriver, IndicatorLines};
use crate::occupancy::{ChangeEvent, Classification, OccupancyTracker, SlotClassifier};
use crate::sensor::DistanceSensor;
use crate::state::{AppState, DispatchStats, ParkingSummary, SlotStates, SlotStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, warn};

/// Hardware attached to one configured slot.
pub struct SlotHardware {
    pub name: String,
    pub sensor: Box<dyn DistanceSensor + Send>,
    pub lamp: Box<dyn IndicatorLines + Send>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub dispatched: Vec<(ChangeEvent, DispatchOutcome)>,
    pub summary: ParkingSummary,
}

/// Owns every per-slot collaborator and runs one sequential pass per cycle.
pub struct Monitor<T> {
    slots: Vec<SlotHardware>,
    states: SlotStates,
    classifier: SlotClassifier,
    tracker: OccupancyTracker,
    indicator: IndicatorDriver,
    dispatcher: UpdateDispatcher<T>,
    inter_slot_delay: Duration,
    stats: DispatchStats,
    app_state: Arc<RwLock<AppState>>,
}

impl<T> Monitor<T>
where
    T: CollectorTransport,
{
    pub fn new(
        slots: Vec<SlotHardware>,
        classifier: SlotClassifier,
        indicator: IndicatorDriver,
        dispatcher: UpdateDispatcher<T>,
        inter_slot_delay: Duration,
        app_state: Arc<RwLock<AppState>>,
    ) -> Self {
        let names: Vec<String> = slots.iter().map(|slot| slot.name.clone()).collect();
        Self {
            states: SlotStates::new(names.iter().cloned()),
            tracker: OccupancyTracker::new(names),
            slots,
            classifier,
            indicator,
            dispatcher,
            inter_slot_delay,
            stats: DispatchStats::default(),
            app_state,
        }
    }

    /// Turn every lamp off before the first cycle.
    pub fn reset_indicators(&mut self) {
        for slot in &mut self.slots {
            self.indicator.show(&slot.name, &mut slot.lamp, SlotStatus::Unknown);
        }
    }

    pub fn run_cycle(&mut self) -> Result<CycleReport, AppError> {
        let mut dispatched = Vec::new();
        let count = self.slots.len();

        for index in 0..count {
            if let Some(pair) = self.process_slot(index)? {
                dispatched.push(pair);
            }
            if index + 1 < count && !self.inter_slot_delay.is_zero() {
                std::thread::sleep(self.inter_slot_delay);
            }
        }

        let summary = self.states.summary();
        info!(
            total = summary.total,
            occupied = summary.occupied,
            available = summary.available,
            invalid = summary.invalid,
            unknown = summary.unknown,
            "Parking summary"
        );

        let mut guard = self.app_state.write().map_err(|_| AppError::StateLock)?;
        guard.publish_cycle(&self.states, self.stats, SystemTime::now());

        Ok(CycleReport {
            dispatched,
            summary,
        })
    }

    fn process_slot(
        &mut self,
        index: usize,
    ) -> Result<Option<(ChangeEvent, DispatchOutcome)>, AppError> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(AppError::UnknownSlot(index))?;
        let outcome = slot.sensor.measure();
        let classification = self.classifier.classify_outcome(outcome);

        let state = self
            .states
            .get_mut(index)
            .ok_or(AppError::UnknownSlot(index))?;
        state.record(outcome.distance_cm(), classification, SystemTime::now());
        let status = state.status();

        match classification {
            Classification::Invalid(reason) => warn!(
                slot = %slot.name,
                distance_cm = ?outcome.distance_cm(),
                reason = ?reason,
                "Invalid reading"
            ),
            _ => debug!(
                slot = %slot.name,
                distance_cm = ?outcome.distance_cm(),
                status = ?status,
                "Slot measured"
            ),
        }

        self.indicator.show(&slot.name, &mut slot.lamp, status);

        let Some(event) = self.tracker.update(index, classification) else {
            return Ok(None);
        };
        let outcome = self.dispatcher.dispatch(&event);
        self.stats.record(&outcome);
        Ok(Some((event, outcome)))
    }
}

/// Spawn the monitoring loop on a dedicated thread.
pub fn spawn_monitor_thread<T>(
    mut monitor: Monitor<T>,
    interval: Duration,
    stop: Arc<AtomicBool>,
) -> std::thread::JoinHandle<()>
where
    T: CollectorTransport + Send + 'static,
{
    std::thread::spawn(move || {
        monitor.reset_indicators();
        while !stop.load(Ordering::Relaxed) {
            let cycle_start = Instant::now();

            if let Err(e) = monitor.run_cycle() {
                warn!(error = %e, "Monitoring cycle failed");
            }

            sleep_with_stop(interval, &stop, cycle_start);
        }
    })
}

fn sleep_with_stop(duration: Duration, stop: &AtomicBool, start: Instant) {
    let elapsed = start.elapsed();
    if elapsed >= duration {
        return;
    }
    let remaining = duration - elapsed;
    let step = Duration::from_millis(100);
    let mut slept = Duration::ZERO;

    while slept < remaining {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        let chunk = step.min(remaining - slept);
        std::thread::sleep(chunk);
        slept += chunk;
    }
}
