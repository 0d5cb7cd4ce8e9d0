//! Wall-clock time source
//!
//! Network time is fetched once and then carried forward on the uptime clock
//! from a sync anchor. The local offset comes from the DST engine and is
//! cached in the settings store until the next transition.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal_async::delay::DelayNs;
use hal_abstractions::{DateTime, Monotonic, NtpTransport, SettingsMedium};

use super::calendar::unix_to_datetime;
use super::dst::{compute_dst_schedule, TimezoneCache};
use super::sntp::SntpClient;
use super::TimeError;
use crate::config::SntpConfig;
use crate::store::{keys, Settings, SharedStore, StoreError};

const SECONDS_PER_HOUR: i64 = 3600;

/// UTC time observed at a given uptime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SyncAnchor {
    utc: i64,
    uptime_ms: u64,
}

pub struct TimeSource<'a, M: RawMutex, S: SettingsMedium, T, C, D> {
    store: &'a SharedStore<M, S>,
    client: SntpClient<T, C, D>,
    config: SntpConfig,
    anchor: Option<SyncAnchor>,
    last_attempt_ms: Option<u64>,
    timezone: Option<TimezoneCache>,
}

impl<'a, M, S, T, C, D> TimeSource<'a, M, S, T, C, D>
where
    M: RawMutex,
    S: SettingsMedium,
    T: NtpTransport,
    C: Monotonic,
    D: DelayNs,
{
    pub fn new(
        store: &'a SharedStore<M, S>,
        transport: T,
        clock: C,
        delay: D,
        config: SntpConfig,
    ) -> Self {
        Self {
            store,
            client: SntpClient::new(transport, clock, delay, config.retry_backoff_ms),
            config,
            anchor: None,
            last_attempt_ms: None,
            timezone: None,
        }
    }

    /// Synchronize with the first configured server that answers.
    ///
    /// The overall deadline is shared by the servers: each one gets an even
    /// split of whatever budget the previous ones left over.
    pub async fn sync(&mut self) -> Result<i64, TimeError> {
        let started_ms = self.client.clock().now_ms();
        self.last_attempt_ms = Some(started_ms);

        let servers = self.config.servers;
        for (index, host) in servers.iter().enumerate() {
            let elapsed = self.client.clock().now_ms().saturating_sub(started_ms);
            let remaining = self.config.deadline_ms.saturating_sub(elapsed);
            if remaining == 0 {
                break;
            }
            let share = remaining / (servers.len() - index) as u64;

            match self
                .client
                .fetch_utc_unix_time(host, self.config.port, self.config.attempt_timeout_ms, share)
                .await
            {
                Ok(utc) => {
                    self.anchor = Some(SyncAnchor {
                        utc,
                        uptime_ms: self.client.clock().now_ms(),
                    });
                    return Ok(utc);
                }
                Err(_) => debug!("Falling back from NTP server {}", host),
            }
        }

        error!("Time synchronization failed");
        Err(TimeError::Unreachable)
    }

    pub fn is_synced(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.client.clock().now_secs()
    }

    /// Current UTC time, or `None` if time has never been synchronized.
    ///
    /// Resynchronizes first when the anchor is older than the resync
    /// interval. Attempts are spaced by the same interval, so an unreachable
    /// server costs at most one deadline per interval. A failed resync keeps
    /// the previous anchor.
    pub async fn now_utc(&mut self) -> Option<i64> {
        if self.resync_due() {
            if let Err(e) = self.sync().await {
                warn!("Resync failed ({}), keeping previous time base", e);
            }
        }

        let now_ms = self.client.clock().now_ms();
        self.anchor.map(|anchor| {
            let elapsed_secs = now_ms.saturating_sub(anchor.uptime_ms) / 1000;
            anchor.utc + elapsed_secs as i64
        })
    }

    fn resync_due(&self) -> bool {
        let now_ms = self.client.clock().now_ms();
        let interval_ms = self.config.resync_interval_secs.saturating_mul(1000);
        let anchor_stale = self
            .anchor
            .map_or(true, |a| now_ms.saturating_sub(a.uptime_ms) >= interval_ms);
        let attempted_recently = self
            .last_attempt_ms
            .is_some_and(|t| now_ms.saturating_sub(t) < interval_ms);
        anchor_stale && !attempted_recently
    }

    /// UTC offset in hours at `current_unix_time`.
    ///
    /// The persisted cache is used while `current_unix_time` has not passed
    /// its expiry. Otherwise the offset is recomputed and `timezone` and
    /// `tz_expiry` are persisted together. A failed write is logged and the
    /// new value is kept in memory.
    pub fn get_utc_offset(&mut self, current_unix_time: i64) -> i32 {
        let cached = self.store.read_all().timezone().or(self.timezone);
        if let Some(tz) = cached.filter(|tz| tz.is_valid_at(current_unix_time)) {
            self.timezone = Some(tz);
            return tz.offset_hours();
        }

        let tz = compute_dst_schedule(current_unix_time);
        info!(
            "Timezone recomputed: UTC+{} until {}",
            tz.offset_hours(),
            tz.expiry()
        );
        if let Err(e) = self.persist_timezone(&tz) {
            warn!("Failed to persist timezone: {}", e);
        }
        self.timezone = Some(tz);
        tz.offset_hours()
    }

    fn persist_timezone(&self, tz: &TimezoneCache) -> Result<(), StoreError> {
        let updates = Settings::new()
            .with_i64(keys::TIMEZONE, i64::from(tz.offset_hours()))?
            .with_i64(keys::TZ_EXPIRY, tz.expiry())?;
        self.store.write(&updates)
    }

    pub fn local_time_from_utc(&mut self, unix_time_utc: i64) -> i64 {
        unix_time_utc + i64::from(self.get_utc_offset(unix_time_utc)) * SECONDS_PER_HOUR
    }

    /// Local civil time and local unix seconds, for RTC calibration
    pub async fn time_now(&mut self) -> Result<(DateTime, i64), TimeError> {
        let utc = self.now_utc().await.ok_or(TimeError::NotSynced)?;
        let local = self.local_time_from_utc(utc);
        Ok((unix_to_datetime(local), local))
    }
}
