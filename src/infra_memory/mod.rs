mod clock_manual;
mod kv_store_memory;

pub use clock_manual::*;
pub use kv_store_memory::*;
