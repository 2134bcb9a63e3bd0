mod payment;
mod session;
mod token;
mod user;

pub use payment::*;
pub use session::*;
pub use token::*;
pub use user::*;
