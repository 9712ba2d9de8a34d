pub mod auth_session;
pub mod token_store;

pub use auth_session::{AuthError, AuthSession};
pub use token_store::TokenStore;
