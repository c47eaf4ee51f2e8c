use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone,
    Timelike, Utc, Weekday,
};
use tracing::{debug, warn};

use shared_config::{SchedulingConfig, MAX_NOTICE_HOURS};

use crate::error::{AppointmentError, RuleViolation};
use crate::models::{Appointment, Payment};

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

// Offset-bearing inputs RFC 3339 rejects, e.g. a missing seconds field.
const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%d %H:%M:%S%:z",
];

fn notice(hours: i64) -> Duration {
    Duration::hours(hours.clamp(0, MAX_NOTICE_HOURS))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessHours {
    pub open_hour: u32,
    pub close_hour: u32,
}

/// Advance-notice, reschedule-limit and business-hour rules, evaluated in
/// the clinic's local offset.
#[derive(Debug, Clone)]
pub struct SchedulingRules {
    pub cancellation_notice: Duration,
    pub patient_reschedule_notice: Duration,
    pub max_patient_reschedules: u8,
    pub business_hours: Option<BusinessHours>,
    pub clinic_offset: FixedOffset,
}

impl Default for SchedulingRules {
    fn default() -> Self {
        Self::from_config(&SchedulingConfig::default())
    }
}

impl SchedulingRules {
    pub fn from_config(config: &SchedulingConfig) -> Self {
        let clinic_offset = FixedOffset::east_opt(config.clinic_utc_offset_minutes * 60).unwrap_or_else(|| {
            warn!(
                "CLINIC_UTC_OFFSET_MINUTES={} is out of range, using UTC",
                config.clinic_utc_offset_minutes
            );
            Utc.fix()
        });

        Self {
            cancellation_notice: notice(config.cancellation_notice_hours),
            patient_reschedule_notice: notice(config.patient_reschedule_notice_hours),
            max_patient_reschedules: config.max_patient_reschedules,
            business_hours: config.enforce_business_hours.then_some(BusinessHours {
                open_hour: config.business_open_hour,
                close_hour: config.business_close_hour,
            }),
            clinic_offset,
        }
    }

    /// Converts a client timestamp to UTC. Offsets in the input win; naive
    /// values are read as clinic local time.
    pub fn parse_timestamp(&self, raw: &str) -> Result<DateTime<Utc>, AppointmentError> {
        let raw = raw.trim();

        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Ok(parsed.with_timezone(&Utc));
        }

        if let Some(parsed) = OFFSET_FORMATS
            .iter()
            .find_map(|format| DateTime::parse_from_str(raw, format).ok())
        {
            return Ok(parsed.with_timezone(&Utc));
        }

        let naive = NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .ok_or_else(|| {
                AppointmentError::Validation(format!(
                    "Invalid scheduled_at '{}': expected an ISO-8601 date and time",
                    raw
                ))
            })?;

        let local = self
            .clinic_offset
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(|| AppointmentError::Validation(format!("Ambiguous local time '{}'", raw)))?;

        debug!("Interpreted naive timestamp {} as {}", raw, local);
        Ok(local.with_timezone(&Utc))
    }

    pub fn local(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        at.with_timezone(&self.clinic_offset)
    }

    /// Checks a slot a booking or reschedule wants to move into.
    pub fn validate_slot(&self, at: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), RuleViolation> {
        if at <= now {
            return Err(RuleViolation::SlotInPast);
        }

        if let Some(hours) = self.business_hours {
            let local = self.local(at);
            if local.weekday() == Weekday::Sun {
                return Err(RuleViolation::ClosedDay);
            }
            if local.hour() < hours.open_hour || local.hour() >= hours.close_hour {
                return Err(RuleViolation::OutsideBusinessHours {
                    open: hours.open_hour,
                    close: hours.close_hour,
                });
            }
        }

        Ok(())
    }

    pub fn check_patient_cancellation(
        &self,
        appointment: &Appointment,
        payment: Option<&Payment>,
        now: DateTime<Utc>,
    ) -> Result<(), RuleViolation> {
        if appointment.scheduled_at - now < self.cancellation_notice {
            return Err(RuleViolation::CancellationNotice {
                hours: self.cancellation_notice.num_hours(),
            });
        }
        if payment.is_some_and(Payment::is_settled) {
            return Err(RuleViolation::PaymentSettled);
        }
        Ok(())
    }

    pub fn check_patient_reschedule(
        &self,
        appointment: &Appointment,
        payment: Option<&Payment>,
        now: DateTime<Utc>,
    ) -> Result<(), RuleViolation> {
        if appointment.scheduled_at - now < self.patient_reschedule_notice {
            return Err(RuleViolation::RescheduleNotice {
                hours: self.patient_reschedule_notice.num_hours(),
            });
        }
        if payment.is_some_and(Payment::is_settled) {
            return Err(RuleViolation::PaymentSettled);
        }
        if appointment.patient_reschedule_count >= self.max_patient_reschedules {
            return Err(RuleViolation::RescheduleLimit {
                limit: self.max_patient_reschedules,
            });
        }
        Ok(())
    }

    /// UTC bounds `[start, end)` of a clinic-local calendar day.
    pub fn day_bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.local_midnight(date);
        (start, start + Duration::days(1))
    }

    /// UTC bounds `[start, end)` of a clinic-local calendar month.
    pub fn month_bounds(&self, year: i32, month: u32) -> Result<(DateTime<Utc>, DateTime<Utc>), AppointmentError> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| AppointmentError::Validation(format!("Invalid month {}-{}", year, month)))?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(|| AppointmentError::Validation(format!("Invalid month {}-{}", year, month)))?;

        Ok((self.local_midnight(first), self.local_midnight(next)))
    }

    fn local_midnight(&self, date: NaiveDate) -> DateTime<Utc> {
        let midnight = date.and_time(NaiveTime::default());
        (midnight - self.clinic_offset_duration()).and_utc()
    }

    fn clinic_offset_duration(&self) -> Duration {
        Duration::seconds(self.clinic_offset.local_minus_utc() as i64)
    }
}
