use crate::dispatch::DispatchOutcome;
use crate::occupancy::Classification;
use serde::Serialize;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    /// No reading classified yet.
    Unknown,
    Invalid,
    Occupied,
    Available,
}

/// Last classification of one slot.
///
/// `occupied` keeps the last valid verdict across invalid readings; it is
/// only meaningful to callers while `valid` is true.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotState {
    pub distance_cm: Option<f32>,
    pub valid: bool,
    pub occupied: Option<bool>,
    pub readings: u64,
    pub updated_at: Option<SystemTime>,
}

impl SlotState {
    pub fn record(
        &mut self,
        distance_cm: Option<f32>,
        classification: Classification,
        at: SystemTime,
    ) {
        self.distance_cm = distance_cm;
        self.valid = classification.is_valid();
        if let Some(occupied) = classification.occupied() {
            self.occupied = Some(occupied);
        }
        self.readings += 1;
        self.updated_at = Some(at);
    }

    pub fn status(&self) -> SlotStatus {
        if self.readings == 0 {
            return SlotStatus::Unknown;
        }
        if !self.valid {
            return SlotStatus::Invalid;
        }
        match self.occupied {
            Some(true) => SlotStatus::Occupied,
            Some(false) => SlotStatus::Available,
            None => SlotStatus::Unknown,
        }
    }
}

/// Per-slot state arena, indexed in configuration order.
#[derive(Debug, Clone, Default)]
pub struct SlotStates {
    slots: Vec<(String, SlotState)>,
}

impl SlotStates {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            slots: names
                .into_iter()
                .map(|name| (name.into(), SlotState::default()))
                .collect(),
        }
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut SlotState> {
        self.slots.get_mut(index).map(|(_, state)| state)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SlotState)> {
        self.slots.iter().map(|(name, state)| (name.as_str(), state))
    }

    pub fn summary(&self) -> ParkingSummary {
        let mut summary = ParkingSummary {
            total: self.slots.len(),
            ..ParkingSummary::default()
        };
        for (_, state) in &self.slots {
            match state.status() {
                SlotStatus::Occupied => summary.occupied += 1,
                SlotStatus::Available => summary.available += 1,
                SlotStatus::Invalid => summary.invalid += 1,
                SlotStatus::Unknown => summary.unknown += 1,
            }
        }
        summary
    }

    pub fn snapshots(&self) -> Vec<SlotSnapshot> {
        self.iter()
            .map(|(name, state)| SlotSnapshot {
                name: name.to_string(),
                status: state.status(),
                distance_cm: state.distance_cm,
                updated_at: state.updated_at,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParkingSummary {
    pub total: usize,
    pub occupied: usize,
    pub available: usize,
    pub invalid: usize,
    pub unknown: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotSnapshot {
    pub name: String,
    pub status: SlotStatus,
    pub distance_cm: Option<f32>,
    pub updated_at: Option<SystemTime>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub sent: u64,
    pub rejected: u64,
    pub transport_errors: u64,
}

impl DispatchStats {
    pub fn record(&mut self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Sent(_) => self.sent += 1,
            DispatchOutcome::Rejected(_) => self.rejected += 1,
            DispatchOutcome::TransportError(_) => self.transport_errors += 1,
        }
    }
}

/// Latest monitoring results shared with the status API.
#[derive(Debug)]
pub struct AppState {
    slots: Vec<SlotSnapshot>,
    summary: ParkingSummary,
    dispatch: DispatchStats,
    last_cycle_at: Option<SystemTime>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            summary: ParkingSummary::default(),
            dispatch: DispatchStats::default(),
            last_cycle_at: None,
        }
    }

    pub fn slots(&self) -> &[SlotSnapshot] {
        &self.slots
    }

    pub fn summary(&self) -> ParkingSummary {
        self.summary
    }

    pub fn dispatch_stats(&self) -> DispatchStats {
        self.dispatch
    }

    pub fn last_cycle_at(&self) -> Option<SystemTime> {
        self.last_cycle_at
    }

    /// Publish the results of one monitoring cycle.
    pub fn publish_cycle(&mut self, states: &SlotStates, dispatch: DispatchStats, at: SystemTime) {
        self.slots = states.snapshots();
        self.summary = states.summary();
        self.dispatch = dispatch;
        self.last_cycle_at = Some(at);
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
