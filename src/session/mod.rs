pub mod api_session;
pub mod backend;
pub mod dto;
pub mod urls;

pub use backend::{ApiError, Backend, HttpBackend};
pub use dto::User;
pub use urls::*;
