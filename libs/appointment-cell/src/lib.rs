pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod state;
pub mod store;

pub use error::*;
pub use models::*;
pub use router::*;
pub use state::SchedulingState;
