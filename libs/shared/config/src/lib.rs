use std::env;
use std::ops::RangeInclusive;
use std::str::FromStr;
use tracing::warn;

/// One day either side of the slot.
pub const MAX_CONFLICT_WINDOW_MINUTES: i64 = 24 * 60;
/// One year of advance notice.
pub const MAX_NOTICE_HOURS: i64 = 365 * 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Supabase,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictStrategyKind {
    ExactSlot,
    Windowed,
}

/// Knobs of the scheduling engine. Every value has a default matching the
/// clinic's historical behaviour.
#[derive(Debug, Clone)]
pub struct SchedulingConfig {
    pub conflict_strategy: ConflictStrategyKind,
    pub conflict_window_minutes: i64,
    pub release_cancelled_slots: bool,
    pub clinic_utc_offset_minutes: i32,
    pub business_open_hour: u32,
    pub business_close_hour: u32,
    pub enforce_business_hours: bool,
    pub cancellation_notice_hours: i64,
    pub patient_reschedule_notice_hours: i64,
    pub max_patient_reschedules: u8,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            conflict_strategy: ConflictStrategyKind::ExactSlot,
            conflict_window_minutes: 30,
            release_cancelled_slots: true,
            clinic_utc_offset_minutes: -180,
            business_open_hour: 8,
            business_close_hour: 20,
            enforce_business_hours: true,
            cancellation_notice_hours: 24,
            patient_reschedule_notice_hours: 72,
            max_patient_reschedules: 2,
        }
    }
}

impl SchedulingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let conflict_strategy = match env::var("CONFLICT_STRATEGY") {
            Ok(value) => match value.to_ascii_lowercase().as_str() {
                "exact_slot" | "exact" => ConflictStrategyKind::ExactSlot,
                "windowed" | "window" => ConflictStrategyKind::Windowed,
                other => {
                    warn!("Unknown CONFLICT_STRATEGY '{}', using exact_slot", other);
                    ConflictStrategyKind::ExactSlot
                }
            },
            Err(_) => defaults.conflict_strategy,
        };

        let config = Self {
            conflict_strategy,
            conflict_window_minutes: parse_in_range(
                "CONFLICT_WINDOW_MINUTES",
                0..=MAX_CONFLICT_WINDOW_MINUTES,
                defaults.conflict_window_minutes,
            ),
            release_cancelled_slots: parse_or("RELEASE_CANCELLED_SLOTS", defaults.release_cancelled_slots),
            clinic_utc_offset_minutes: parse_or("CLINIC_UTC_OFFSET_MINUTES", defaults.clinic_utc_offset_minutes),
            business_open_hour: parse_or("BUSINESS_OPEN_HOUR", defaults.business_open_hour),
            business_close_hour: parse_or("BUSINESS_CLOSE_HOUR", defaults.business_close_hour),
            enforce_business_hours: parse_or("ENFORCE_BUSINESS_HOURS", defaults.enforce_business_hours),
            cancellation_notice_hours: parse_in_range(
                "CANCELLATION_NOTICE_HOURS",
                0..=MAX_NOTICE_HOURS,
                defaults.cancellation_notice_hours,
            ),
            patient_reschedule_notice_hours: parse_in_range(
                "PATIENT_RESCHEDULE_NOTICE_HOURS",
                0..=MAX_NOTICE_HOURS,
                defaults.patient_reschedule_notice_hours,
            ),
            max_patient_reschedules: parse_or("MAX_PATIENT_RESCHEDULES", defaults.max_patient_reschedules),
        };

        if config.business_open_hour >= config.business_close_hour || config.business_close_hour > 24 {
            warn!(
                "Business hours {}-{} are not a valid range, using 8-20",
                config.business_open_hour, config.business_close_hour
            );
            return Self {
                business_open_hour: defaults.business_open_hour,
                business_close_hour: defaults.business_close_hour,
                ..config
            };
        }

        config
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub storage_backend: StorageBackend,
    pub directory_seed_path: Option<String>,
    pub port: u16,
    pub scheduling: SchedulingConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_SERVICE_ROLE_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            storage_backend: StorageBackend::Memory,
            directory_seed_path: env::var("DIRECTORY_SEED_PATH").ok(),
            port: parse_or("PORT", 3000),
            scheduling: SchedulingConfig::from_env(),
        };

        config.storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(value) if value.eq_ignore_ascii_case("supabase") => StorageBackend::Supabase,
            Ok(value) if value.eq_ignore_ascii_case("memory") => StorageBackend::Memory,
            Ok(value) => {
                warn!("Unknown STORAGE_BACKEND '{}', falling back", value);
                config.default_backend()
            }
            Err(_) => config.default_backend(),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    fn default_backend(&self) -> StorageBackend {
        if self.is_supabase_configured() {
            StorageBackend::Supabase
        } else {
            StorageBackend::Memory
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_jwt_secret.is_empty()
            && (self.storage_backend == StorageBackend::Memory || self.is_supabase_configured())
    }

    pub fn is_supabase_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_service_role_key.is_empty()
    }
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using {:?}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

fn parse_in_range(key: &str, range: RangeInclusive<i64>, default: i64) -> i64 {
    let value = parse_or(key, default);
    if range.contains(&value) {
        value
    } else {
        warn!(
            "{}={} is outside {}..={}, using {}",
            key,
            value,
            range.start(),
            range.end(),
            default
        );
        default
    }
}
