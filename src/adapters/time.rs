//! Wall-clock adapter.
//!
//! Implements [`ClockPort`]:
//!
//! - **`target_os = "espidf"`**: SNTP via `esp_idf_svc::sntp`, polled until
//!   the first sync completes or the timeout runs out.  The wall clock is
//!   the system clock, which the RTC keeps across deep sleep.
//! - **`not(target_os = "espidf")`**: a settable simulated clock for
//!   host-side testing.

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::app::ports::ClockPort;
use crate::error::TimeError;

/// Interval between sync-status polls (ms).
pub const POLL_INTERVAL_MS: u32 = 250;

#[cfg(target_os = "espidf")]
#[derive(Default)]
pub struct SntpClock;

#[cfg(target_os = "espidf")]
impl SntpClock {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "espidf")]
impl ClockPort for SntpClock {
    fn sync(&mut self, server: &str, timeout_ms: u32) -> Result<(), TimeError> {
        use esp_idf_svc::sntp::{EspSntp, SntpConf, SyncStatus};

        let mut conf = SntpConf::default();
        conf.servers[0] = server;
        info!("SNTP: syncing with {}", server);
        let sntp = EspSntp::new(&conf).map_err(|e| TimeError::SntpInit(e.code()))?;

        let mut elapsed_ms = 0u32;
        while elapsed_ms < timeout_ms {
            if sntp.get_sync_status() == SyncStatus::Completed {
                info!("SNTP: time synchronized after {} ms ({})", elapsed_ms, self.now());
                return Ok(());
            }
            std::thread::sleep(std::time::Duration::from_millis(u64::from(POLL_INTERVAL_MS)));
            elapsed_ms += POLL_INTERVAL_MS;
        }

        warn!("SNTP: no sync within {} ms", timeout_ms);
        Err(TimeError::SyncTimeout(timeout_ms))
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Host clock.  Starts at the real time unless pinned with
/// [`SntpClock::sim_set_now`].
#[cfg(not(target_os = "espidf"))]
#[derive(Default)]
pub struct SntpClock {
    pinned: Option<DateTime<Utc>>,
    fail_sync: bool,
    syncs: u32,
}

#[cfg(not(target_os = "espidf"))]
impl SntpClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sim_set_now(&mut self, now: DateTime<Utc>) {
        self.pinned = Some(now);
    }

    pub fn sim_fail_sync(&mut self, fail: bool) {
        self.fail_sync = fail;
    }

    pub fn sim_syncs(&self) -> u32 {
        self.syncs
    }
}

#[cfg(not(target_os = "espidf"))]
impl ClockPort for SntpClock {
    fn sync(&mut self, server: &str, timeout_ms: u32) -> Result<(), TimeError> {
        self.syncs += 1;
        if self.fail_sync {
            warn!("SNTP(sim): {} did not answer within {} ms", server, timeout_ms);
            return Err(TimeError::SyncTimeout(timeout_ms));
        }
        info!("SNTP(sim): synced with {}", server);
        Ok(())
    }

    fn now(&self) -> DateTime<Utc> {
        self.pinned.unwrap_or_else(Utc::now)
    }
}
