mod security_manager_impl;
mod token_manager_impl;

pub use security_manager_impl::*;
pub use token_manager_impl::*;
