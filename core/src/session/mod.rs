pub mod recorder;
pub mod stats;

pub use recorder::{Session, SessionRecorder, SESSION_CAPACITY};
pub use stats::{ChannelStats, SessionStats};
