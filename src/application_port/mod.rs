mod auth_error;
mod security_manager;
mod token_manager;

pub use auth_error::*;
pub use security_manager::*;
pub use token_manager::*;
