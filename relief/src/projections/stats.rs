//! Stats Aggregator: read-only rollups over ledger and registry state.
//!
//! Nothing here is cached. Every call reads the current documents and
//! computes from them, so a rollup is at most as stale as the slowest of its
//! reads. Reads of several documents are not taken from one snapshot: a
//! system rollup computed while an admission commits may count the guest but
//! not yet the occupancy change, never the reverse of a committed state.

use crate::config::StatsConfig;
use chrono::{DateTime, Duration, Utc};
use relief_core::center::{Center, CenterId, CenterStatus, SupplyLevels, occupancy_rate};
use relief_core::environment::Clock;
use relief_core::error::ReliefError;
use relief_core::guest::Guest;
use relief_core::store::{ActivityKind, ActivityRecord, GuestQuery, ShelterStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Most buckets a trend request may ask for.
pub const MAX_TREND_BUCKETS: i64 = 1_000;

/// Longest trend lookback, five years.
pub const MAX_LOOKBACK_HOURS: i64 = 5 * 365 * 24;

// ============================================================================
// Views
// ============================================================================

/// Centers per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    /// Accepting guests
    pub active: u64,
    /// Closed by an operator
    pub inactive: u64,
    /// At capacity
    pub full: u64,
}

/// System-wide rollup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStats {
    /// Number of centers
    pub total_centers: u64,
    /// Sum of capacities
    pub total_capacity: u64,
    /// Sum of occupancies
    pub total_occupancy: u64,
    /// `total_capacity - total_occupancy`
    pub available_space: u64,
    /// Percent, one decimal, zero without capacity
    pub occupancy_rate: f64,
    /// Centers at or above the critical occupancy rate
    pub critical_centers: u64,
    /// Centers with any supply below the critical level
    pub supply_shortage_centers: u64,
    /// Centers changed within the recent window
    pub recently_updated: u64,
    /// Centers per status
    pub by_status: StatusCounts,
    /// When this was computed
    pub generated_at: DateTime<Utc>,
}

impl SystemStats {
    /// Rollup of `centers` as of `now`.
    #[must_use]
    pub fn compute(centers: &[Center], config: &StatsConfig, now: DateTime<Utc>) -> Self {
        let recent_since = now - Duration::minutes(config.recent_update_window_minutes);
        let mut stats = Self {
            total_centers: centers.len() as u64,
            total_capacity: 0,
            total_occupancy: 0,
            available_space: 0,
            occupancy_rate: 0.0,
            critical_centers: 0,
            supply_shortage_centers: 0,
            recently_updated: 0,
            by_status: StatusCounts::default(),
            generated_at: now,
        };

        for center in centers {
            stats.total_capacity += u64::from(center.total_capacity);
            stats.total_occupancy += u64::from(center.current_occupancy);
            if center.availability().occupancy_percentage >= config.critical_occupancy_threshold
                && center.total_capacity > 0
            {
                stats.critical_centers += 1;
            }
            if !center.supplies.below(config.critical_supply_threshold).is_empty() {
                stats.supply_shortage_centers += 1;
            }
            if center.last_updated >= recent_since {
                stats.recently_updated += 1;
            }
            match center.status {
                CenterStatus::Active => stats.by_status.active += 1,
                CenterStatus::Inactive => stats.by_status.inactive += 1,
                CenterStatus::Full => stats.by_status.full += 1,
            }
        }

        stats.available_space = stats.total_capacity.saturating_sub(stats.total_occupancy);
        stats.occupancy_rate = occupancy_rate(stats.total_occupancy, stats.total_capacity);
        stats
    }
}

/// One center's figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CenterStats {
    /// Center
    pub center_id: CenterId,
    /// Display name
    pub name: String,
    /// Capacity
    pub total_capacity: u32,
    /// Active guests
    pub current_occupancy: u32,
    /// Free slots
    pub available_space: u32,
    /// Percent, one decimal
    pub occupancy_rate: f64,
    /// Supply snapshot
    pub supplies: SupplyLevels,
    /// Lifecycle status
    pub status: CenterStatus,
    /// Last change
    pub last_updated: DateTime<Utc>,
}

impl From<&Center> for CenterStats {
    fn from(center: &Center) -> Self {
        let availability = center.availability();
        Self {
            center_id: center.id,
            name: center.name.clone(),
            total_capacity: availability.total_capacity,
            current_occupancy: availability.current_occupancy,
            available_space: availability.available_capacity,
            occupancy_rate: availability.occupancy_percentage,
            supplies: center.supplies.clone(),
            status: center.status,
            last_updated: center.last_updated,
        }
    }
}

/// A supply under the critical level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowSupply {
    /// Supply name
    pub supply: String,
    /// Current level
    pub level: f64,
}

/// A center with at least one low supply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shortage {
    /// Center
    pub center_id: CenterId,
    /// Display name
    pub name: String,
    /// Supplies below the threshold
    pub low_supplies: Vec<LowSupply>,
}

/// Resource-shortage report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortageReport {
    /// Level under which a supply counts as low
    pub threshold: f64,
    /// Affected centers by name
    pub centers: Vec<Shortage>,
}

impl ShortageReport {
    /// Report over `centers`.
    #[must_use]
    pub fn compute(centers: &[Center], threshold: f64) -> Self {
        let mut shortages: Vec<Shortage> = centers
            .iter()
            .filter_map(|center| {
                let low = center.supplies.below(threshold);
                (!low.is_empty()).then(|| Shortage {
                    center_id: center.id,
                    name: center.name.clone(),
                    low_supplies: low
                        .into_iter()
                        .map(|(supply, level)| LowSupply { supply, level })
                        .collect(),
                })
            })
            .collect();
        shortages.sort_by(|a, b| a.name.cmp(&b.name).then(a.center_id.cmp(&b.center_id)));
        Self {
            threshold,
            centers: shortages,
        }
    }
}

/// Guests at one center.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CenterGuests {
    /// Center
    pub center_id: CenterId,
    /// Display name, absent once the center is deleted
    pub name: Option<String>,
    /// Every guest record
    pub total: u64,
    /// Guests still staying there
    pub active: u64,
}

/// Guest totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestRollup {
    /// Every guest record
    pub total: u64,
    /// Active guests
    pub active: u64,
    /// Discharged guests
    pub discharged: u64,
    /// Grouped by center, largest first
    pub by_center: Vec<CenterGuests>,
}

impl GuestRollup {
    /// Rollup of `guests`, naming centers from `centers`.
    #[must_use]
    pub fn compute(guests: &[Guest], centers: &[Center]) -> Self {
        let mut groups: BTreeMap<CenterId, (u64, u64)> = BTreeMap::new();
        let mut active = 0;
        for guest in guests {
            let entry = groups.entry(guest.center_id).or_default();
            entry.0 += 1;
            if guest.is_active() {
                entry.1 += 1;
                active += 1;
            }
        }

        let names: BTreeMap<CenterId, &str> =
            centers.iter().map(|c| (c.id, c.name.as_str())).collect();
        let mut by_center: Vec<CenterGuests> = groups
            .into_iter()
            .map(|(center_id, (total, active))| CenterGuests {
                center_id,
                name: names.get(&center_id).map(|n| (*n).to_string()),
                total,
                active,
            })
            .collect();
        by_center.sort_by(|a, b| b.total.cmp(&a.total).then(a.center_id.cmp(&b.center_id)));

        let total = guests.len() as u64;
        Self {
            total,
            active,
            discharged: total - active,
            by_center,
        }
    }
}

// ============================================================================
// Trends
// ============================================================================

/// Window and resolution of a trend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendQuery {
    /// How far back to look
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: i64,
    /// Width of one bucket
    #[serde(default = "default_bucket_minutes")]
    pub bucket_minutes: i64,
}

const fn default_lookback_hours() -> i64 {
    24
}

const fn default_bucket_minutes() -> i64 {
    60
}

impl Default for TrendQuery {
    fn default() -> Self {
        Self {
            lookback_hours: default_lookback_hours(),
            bucket_minutes: default_bucket_minutes(),
        }
    }
}

impl TrendQuery {
    /// Number of buckets, after checking the request is sensible.
    ///
    /// # Errors
    ///
    /// Returns [`ReliefError::Validation`] for a non-positive bucket, a
    /// lookback outside `1..=`[`MAX_LOOKBACK_HOURS`], a window shorter than
    /// one bucket, or more than [`MAX_TREND_BUCKETS`].
    pub fn buckets(&self) -> Result<i64, ReliefError> {
        if self.bucket_minutes <= 0 {
            return Err(ReliefError::invalid("bucket_minutes", "must be positive"));
        }
        if !(1..=MAX_LOOKBACK_HOURS).contains(&self.lookback_hours) {
            return Err(ReliefError::invalid(
                "lookback_hours",
                format!("must be between 1 and {MAX_LOOKBACK_HOURS}"),
            ));
        }
        let lookback_minutes = self
            .lookback_hours
            .checked_mul(60)
            .ok_or_else(|| ReliefError::invalid("lookback_hours", "window too large"))?;
        if lookback_minutes < self.bucket_minutes {
            return Err(ReliefError::invalid(
                "lookback_hours",
                "must cover at least one bucket",
            ));
        }
        let buckets = lookback_minutes
            .checked_add(self.bucket_minutes - 1)
            .map(|total| total / self.bucket_minutes)
            .ok_or_else(|| ReliefError::invalid("lookback_hours", "window too large"))?;
        if buckets > MAX_TREND_BUCKETS {
            return Err(ReliefError::invalid(
                "bucket_minutes",
                format!("at most {MAX_TREND_BUCKETS} buckets per request"),
            ));
        }
        Ok(buckets)
    }

    /// Bucket count, bucket width and window start for a window ending at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`ReliefError::Validation`] when the query is invalid or the
    /// window cannot be represented.
    pub fn window(&self, now: DateTime<Utc>) -> Result<(i64, Duration, DateTime<Utc>), ReliefError> {
        let count = self.buckets()?;
        let out_of_range = || ReliefError::invalid("lookback_hours", "window out of range");
        let width = Duration::try_minutes(self.bucket_minutes).ok_or_else(out_of_range)?;
        let span = count
            .checked_mul(self.bucket_minutes)
            .and_then(Duration::try_minutes)
            .ok_or_else(out_of_range)?;
        let since = now.checked_sub_signed(span).ok_or_else(out_of_range)?;
        Ok((count, width, since))
    }
}

/// Activity within one time bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendBucket {
    /// Inclusive start
    pub start: DateTime<Utc>,
    /// Admissions
    pub admissions: u64,
    /// Discharges
    pub discharges: u64,
    /// Transfers
    pub transfers: u64,
    /// Record deletions
    pub removals: u64,
}

/// Time-bucketed activity counts, oldest bucket first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trends {
    /// Start of the first bucket
    pub since: DateTime<Utc>,
    /// Bucket width in minutes
    pub bucket_minutes: i64,
    /// Buckets
    pub buckets: Vec<TrendBucket>,
}

impl Trends {
    /// Buckets `records` into the window ending at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`ReliefError::Validation`] for an invalid `query`.
    pub fn compute(
        records: &[ActivityRecord],
        query: TrendQuery,
        now: DateTime<Utc>,
    ) -> Result<Self, ReliefError> {
        let (count, width, since) = query.window(now)?;

        let mut buckets: Vec<TrendBucket> = (0..count)
            .map(|i| TrendBucket {
                start: since + Duration::minutes(i * query.bucket_minutes),
                admissions: 0,
                discharges: 0,
                transfers: 0,
                removals: 0,
            })
            .collect();

        let last = buckets.len().saturating_sub(1);
        for record in records.iter().filter(|r| r.occurred_at >= since && r.occurred_at <= now) {
            let offset = (record.occurred_at - since).num_seconds() / width.num_seconds();
            let Some(bucket) = usize::try_from(offset)
                .ok()
                .and_then(|i| buckets.get_mut(i.min(last)))
            else {
                continue;
            };
            match record.kind {
                ActivityKind::Admission => bucket.admissions += 1,
                ActivityKind::Discharge => bucket.discharges += 1,
                ActivityKind::Transfer => bucket.transfers += 1,
                ActivityKind::Removal => bucket.removals += 1,
            }
        }

        Ok(Self {
            since,
            bucket_minutes: query.bucket_minutes,
            buckets,
        })
    }
}

// ============================================================================
// Aggregator
// ============================================================================

/// Computes rollups on demand from the store.
pub struct StatsAggregator {
    store: Arc<dyn ShelterStore>,
    clock: Arc<dyn Clock>,
    config: StatsConfig,
}

impl StatsAggregator {
    /// Creates a new `StatsAggregator`
    #[must_use]
    pub fn new(store: Arc<dyn ShelterStore>, clock: Arc<dyn Clock>, config: StatsConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    async fn centers(&self) -> Result<Vec<Center>, ReliefError> {
        Ok(self
            .store
            .list_centers()
            .await?
            .into_iter()
            .map(|c| c.value)
            .collect())
    }

    /// System-wide rollup.
    ///
    /// # Errors
    ///
    /// [`ReliefError::StorageUnavailable`] when the store fails.
    pub async fn system_stats(&self) -> Result<SystemStats, ReliefError> {
        let centers = self.centers().await?;
        Ok(SystemStats::compute(&centers, &self.config, self.clock.now()))
    }

    /// One center's figures.
    ///
    /// # Errors
    ///
    /// [`ReliefError::NotFound`] when absent.
    pub async fn center_stats(&self, id: CenterId) -> Result<CenterStats, ReliefError> {
        let center = self
            .store
            .load_center(id)
            .await?
            .ok_or_else(|| ReliefError::center_not_found(id))?;
        Ok(CenterStats::from(&center.value))
    }

    /// Centers with supplies below the configured threshold.
    ///
    /// # Errors
    ///
    /// [`ReliefError::StorageUnavailable`] when the store fails.
    pub async fn shortage_report(&self) -> Result<ShortageReport, ReliefError> {
        let centers = self.centers().await?;
        Ok(ShortageReport::compute(&centers, self.config.critical_supply_threshold))
    }

    /// Guest totals, grouped by center.
    ///
    /// # Errors
    ///
    /// [`ReliefError::StorageUnavailable`] when the store fails.
    pub async fn guest_rollup(&self) -> Result<GuestRollup, ReliefError> {
        let guests = self.store.find_guests(GuestQuery::all()).await?;
        let centers = self.centers().await?;
        Ok(GuestRollup::compute(&guests, &centers))
    }

    /// Activity counts per bucket over the requested window.
    ///
    /// # Errors
    ///
    /// - [`ReliefError::Validation`] for an invalid window
    /// - [`ReliefError::StorageUnavailable`] when the store fails
    pub async fn trends(&self, query: TrendQuery) -> Result<Trends, ReliefError> {
        let now = self.clock.now();
        let (_, _, since) = query.window(now)?;
        let records = self.store.activity_since(since).await?;
        Trends::compute(&records, query, now)
    }
}
