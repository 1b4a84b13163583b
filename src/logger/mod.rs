//! Global `tracing` subscriber with a reloadable filter and output format.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};
