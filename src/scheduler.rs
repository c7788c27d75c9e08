pub mod daemon;
pub(crate) mod jobs;
pub(crate) mod lock;

pub use jobs::{RunContext, Scheduler, Trigger};
pub use lock::RunPermit;
