//! Optional process-wide scheduler.
//!
//! Most callers should own a [`Scheduler`] and pass it around. For code that
//! genuinely needs one instance per process, [`global`] builds it lazily
//! from the `KEYLANE_*` environment on first use.

use std::sync::OnceLock;

use keylane_core::{SchedulerConfig, SchedulerError};

use crate::runner::Scheduler;

static GLOBAL: OnceLock<Scheduler> = OnceLock::new();

/// The process-wide scheduler, created on first call.
///
/// It never shuts down on drain, so draining it does not strand later
/// callers. If two threads race on first use, one of the freshly built
/// schedulers is discarded.
pub fn global() -> Result<&'static Scheduler, SchedulerError> {
    if let Some(scheduler) = GLOBAL.get() {
        return Ok(scheduler);
    }
    keylane_core::load_dotenv();
    let config = SchedulerConfig {
        shutdown_on_drain: false,
        ..SchedulerConfig::from_env()?
    };
    let scheduler = Scheduler::with_config(config)?;
    Ok(GLOBAL.get_or_init(move || scheduler))
}
