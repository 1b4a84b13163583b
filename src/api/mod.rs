mod gate;
pub mod v1;

pub use gate::*;
