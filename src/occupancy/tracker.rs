use crate::occupancy::classifier::Classification;
use tracing::info;

/// A genuine change in a slot's occupancy verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub slot_id: String,
    pub occupied: bool,
    /// Verdict before the change; `None` for the first valid reading.
    pub previous: Option<bool>,
}

#[derive(Debug)]
struct TrackedSlot {
    slot_id: String,
    last_occupied: Option<bool>,
}

/// Edge detector over per-slot verdicts, indexed by slot position.
#[derive(Debug)]
pub struct OccupancyTracker {
    slots: Vec<TrackedSlot>,
}

impl OccupancyTracker {
    pub fn new<I, S>(slot_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            slots: slot_ids
                .into_iter()
                .map(|slot_id| TrackedSlot {
                    slot_id: slot_id.into(),
                    last_occupied: None,
                })
                .collect(),
        }
    }

    /// Record a classification; returns an event only when the verdict changed.
    ///
    /// Invalid readings leave the stored verdict untouched.
    pub fn update(&mut self, slot: usize, classification: Classification) -> Option<ChangeEvent> {
        let occupied = classification.occupied()?;
        let tracked = self.slots.get_mut(slot)?;
        if tracked.last_occupied == Some(occupied) {
            return None;
        }

        let previous = tracked.last_occupied.replace(occupied);
        info!(
            slot = %tracked.slot_id,
            from = verdict_label(previous),
            to = verdict_label(Some(occupied)),
            "Slot status changed"
        );
        Some(ChangeEvent {
            slot_id: tracked.slot_id.clone(),
            occupied,
            previous,
        })
    }
}

fn verdict_label(occupied: Option<bool>) -> &'static str {
    match occupied {
        Some(true) => "OCCUPIED",
        Some(false) => "AVAILABLE",
        None => "UNKNOWN",
    }
}
