use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::directory::DirectoryStore;
use shared_database::supabase::SupabaseClient;
use shared_utils::clock::{Clock, SystemClock};

use crate::store::{MemorySchedulingStore, SchedulingStore, SupabaseSchedulingStore};

/// Shared handles behind every appointment and audit route.
pub struct SchedulingState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn SchedulingStore>,
    pub directory: Arc<dyn DirectoryStore>,
    pub clock: Arc<dyn Clock>,
}

impl SchedulingState {
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn SchedulingStore>,
        directory: Arc<dyn DirectoryStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            store,
            directory,
            clock,
        }
    }

    pub fn in_memory(config: Arc<AppConfig>, directory: Arc<dyn DirectoryStore>) -> Self {
        Self::new(
            config,
            Arc::new(MemorySchedulingStore::new()),
            directory,
            Arc::new(SystemClock),
        )
    }

    pub fn with_supabase(
        config: Arc<AppConfig>,
        supabase: Arc<SupabaseClient>,
        directory: Arc<dyn DirectoryStore>,
    ) -> Self {
        Self::new(
            config,
            Arc::new(SupabaseSchedulingStore::new(supabase)),
            directory,
            Arc::new(SystemClock),
        )
    }
}
