pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod state;

pub use error::AccountError;
pub use models::*;
pub use router::*;
pub use state::AccountState;
