//! Read side: derived statistics over centers, guests and activity.
//!
//! Nothing here is stored. Every view is recomputed from the documents the
//! store currently holds, so views can never drift from the counters the
//! write side maintains.
//!
//! ```text
//! ShelterStore ──list_centers──────> SystemStats, CenterStats, ShortageReport
//!              ──find_guests───────> GuestRollup
//!              ──activity_since────> Trends
//! ```

mod stats;

pub use stats::{
    CenterGuests, CenterStats, GuestRollup, LowSupply, MAX_TREND_BUCKETS, Shortage, ShortageReport,
    StatsAggregator, StatusCounts, SystemStats, TrendBucket, TrendQuery, Trends,
};
