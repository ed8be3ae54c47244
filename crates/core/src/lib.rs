pub mod config;
pub mod error;

pub use config::{load_dotenv, DispatchStrategy, SchedulerConfig};
pub use error::*;
