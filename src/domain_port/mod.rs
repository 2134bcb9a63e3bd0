// store

mod clock;
mod session_store;

pub use clock::*;
pub use session_store::*;

// repo

mod payment_repo;
mod user_repo;

pub use payment_repo::*;
pub use user_repo::*;
