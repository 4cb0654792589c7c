pub mod history;
pub mod live;

pub use history::{HistoryBuffer, HISTORY_CAPACITY};
pub use live::MeasurementStore;
