mod auth_service_impl;
mod credential_hasher;
mod jwt_codec;
mod payment_service_impl;
mod token_service_impl;
mod user_service_impl;

pub use auth_service_impl::*;
pub use credential_hasher::*;
pub use jwt_codec::*;
pub use payment_service_impl::*;
pub use token_service_impl::*;
pub use user_service_impl::*;
