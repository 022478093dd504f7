pub mod classifier;
pub mod tracker;

pub use classifier::{Classification, ClassifierConfig, InvalidReason, SlotClassifier};
pub use tracker::{ChangeEvent, OccupancyTracker};
