//! # Relief Testing
//!
//! Testing utilities and helpers for the relief capacity-consistency engine.
//!
//! This crate provides:
//! - Deterministic implementations of Environment traits
//! - Fixture builders for centers and guests
//! - Fault-injecting store and event bus wrappers
//! - Property-based testing strategies
//! - The [`ReducerTest`] Given-When-Then builder
//!
//! ## Example
//!
//! ```ignore
//! use relief_testing::{fixtures::CenterBuilder, test_clock};
//!
//! #[tokio::test]
//! async fn test_admission_fills_center() {
//!     let center = CenterBuilder::new("Riverside").capacity(1).build();
//!     let services = test_services(vec![center.clone()]).await;
//!
//!     services.coordinator.admit(&admin(), request(center.id)).await?;
//!
//!     let availability = services.ledger.get_availability(center.id).await?;
//!     assert_eq!(availability.available_capacity, 0);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use chrono::{DateTime, Utc};
use relief_core::environment::Clock;

pub mod faults;
pub mod fixtures;
pub mod reducer_test;

/// Mock implementations of Environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use relief_core::center::CenterId;
    use relief_core::environment::IdGenerator;
    use relief_core::guest::GuestId;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use relief_testing::mocks::FixedClock;
    /// use relief_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_time())
    }

    /// 2025-01-01 00:00:00 UTC
    ///
    /// # Panics
    ///
    /// Never in practice: the timestamp is a valid constant.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc)
    }

    /// Predictable identifiers: `GST-TEST-000001`, `GST-TEST-000002`, ...
    ///
    /// Center ids are UUIDs built from the same counter.
    #[derive(Debug, Default)]
    pub struct SequentialIdGenerator {
        next: AtomicU64,
    }

    impl SequentialIdGenerator {
        /// Starts counting at 1.
        #[must_use]
        pub const fn new() -> Self {
            Self {
                next: AtomicU64::new(0),
            }
        }

        fn bump(&self) -> u64 {
            self.next.fetch_add(1, Ordering::SeqCst) + 1
        }
    }

    impl IdGenerator for SequentialIdGenerator {
        fn next_guest_id(&self, _now: DateTime<Utc>) -> GuestId {
            GuestId::new(format!("GST-TEST-{:06}", self.bump()))
        }

        fn next_center_id(&self) -> CenterId {
            CenterId::from_uuid(uuid::Uuid::from_u128(u128::from(self.bump())))
        }
    }
}

/// Property-based testing strategies using proptest.
pub mod properties {
    use proptest::prelude::*;
    use relief_core::guest::GuestProfile;

    /// Guest profiles with non-empty names and optional contact details.
    pub fn arb_profile() -> impl Strategy<Value = GuestProfile> {
        (
            "[A-Z][a-z]{1,10}",
            "[A-Z][a-z]{1,12}",
            proptest::option::of(0u32..110),
            proptest::option::of("[0-9]{7,10}"),
        )
            .prop_map(|(first, last, age, phone)| GuestProfile {
                age,
                phone,
                ..GuestProfile::named(first, last)
            })
    }

    /// Center capacities, zero included.
    pub fn arb_capacity() -> impl Strategy<Value = u32> {
        prop_oneof![Just(0u32), Just(1u32), 2u32..20]
    }
}

/// Install a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`; output goes through the test harness capture.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use mocks::{FixedClock, SequentialIdGenerator, test_clock, test_time};
pub use reducer_test::ReducerTest;
