mod clock;
mod kv_store;

pub use clock::*;
pub use kv_store::*;
