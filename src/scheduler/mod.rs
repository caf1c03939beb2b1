pub mod refresh;
pub mod trigger;

pub use refresh::{HistorySelection, QuoteInput, RefreshScheduler, SchedulerConfig};
pub use trigger::RefreshTrigger;
