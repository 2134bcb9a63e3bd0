mod auth_service;
mod payment_service;
mod token_service;
mod user_service;

pub use auth_service::*;
pub use payment_service::*;
pub use token_service::*;
pub use user_service::*;
