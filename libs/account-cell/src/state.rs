use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::directory::DirectoryStore;
use shared_utils::clock::{Clock, SystemClock};

use crate::error::AccountError;
use crate::services::validation::AccountValidator;

pub struct AccountState {
    pub config: Arc<AppConfig>,
    pub directory: Arc<dyn DirectoryStore>,
    pub clock: Arc<dyn Clock>,
    pub validator: AccountValidator,
}

impl AccountState {
    pub fn new(config: Arc<AppConfig>, directory: Arc<dyn DirectoryStore>) -> Result<Self, AccountError> {
        Self::with_clock(config, directory, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: Arc<AppConfig>,
        directory: Arc<dyn DirectoryStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AccountError> {
        Ok(Self {
            config,
            directory,
            clock,
            validator: AccountValidator::new()?,
        })
    }
}
