//! Device-local timestamps to display-timezone text

use chrono::{DateTime, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use contracts::{ContractError, OverlayConfig};

/// Converts naive device timestamps into the display timezone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayClock {
    device: Tz,
    display: Tz,
}

impl DisplayClock {
    pub fn new(device: Tz, display: Tz) -> Self {
        Self { device, display }
    }

    /// # Errors
    /// `ConfigValidation` for unknown IANA names
    pub fn from_config(overlay: &OverlayConfig) -> Result<Self, ContractError> {
        let parse = |field: &str, name: &str| {
            name.parse::<Tz>().map_err(|_| {
                ContractError::config_validation(field, format!("unknown IANA timezone '{name}'"))
            })
        };
        Ok(Self {
            device: parse("overlay.device_timezone", overlay.device_timezone())?,
            display: parse("overlay.timezone", &overlay.timezone)?,
        })
    }

    /// Device-local instant in the display timezone.
    ///
    /// Ambiguous local times take the earlier instant; local times skipped by
    /// a DST jump are read as UTC.
    pub fn localize(&self, at: NaiveDateTime) -> DateTime<Tz> {
        let device = self
            .device
            .from_local_datetime(&at)
            .earliest()
            .unwrap_or_else(|| self.device.from_utc_datetime(&at));
        device.with_timezone(&self.display)
    }

    /// `dd/mm/YYYY HH:MM <TZ><±hhmm>`
    pub fn format(&self, at: NaiveDateTime) -> String {
        self.localize(at).format("%d/%m/%Y %H:%M %Z%z").to_string()
    }
}
