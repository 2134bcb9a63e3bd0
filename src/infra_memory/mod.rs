//! Process-local backends. Used by tests and by the `memory` settings
//! backends for running without Redis or MySQL.

mod manual_clock;
mod payment_repo_memory;
mod session_store_memory;
mod user_repo_memory;

pub use manual_clock::*;
pub use payment_repo_memory::*;
pub use session_store_memory::*;
pub use user_repo_memory::*;
