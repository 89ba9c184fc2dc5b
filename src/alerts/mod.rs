pub mod dedup;
pub mod messages;
pub mod notifier;

pub use dedup::{AlertDedupState, CycleSignals};
pub use messages::{AlertKind, Notification, Priority};
pub use notifier::{CaelumNotifier, LogNotifier, Notifier};
