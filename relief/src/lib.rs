//! Relief - capacity-consistency engine for disaster relief centers.
//!
//! Relief centers have a finite number of slots; guests occupy them. This
//! crate keeps every center's occupancy counter equal to the number of its
//! active guests, no matter how many operators admit, discharge, transfer
//! and delete guests at the same time.
//!
//! # Architecture
//!
//! ```text
//!              HTTP / WebSocket (api, server)
//!                          │
//!        ┌─────────────────┼──────────────────┐
//!        ▼                 ▼                  ▼
//!  ┌────────────┐  ┌───────────────┐  ┌───────────────┐
//!  │  Center    │  │   Admission   │  │     Stats     │
//!  │  Ledger    │◄─┤  Coordinator  ├─►│  Aggregator   │
//!  └────────────┘  └───────┬───────┘  └───────────────┘
//!                          ▼
//!                  ┌───────────────┐
//!                  │ Guest Registry│
//!                  └───────────────┘
//!        │                 │
//!        ▼                 ▼
//!   ShelterStore (one atomic commit)   EventBus (after commit)
//! ```
//!
//! # Key Features
//!
//! ## 1. Coupled changes commit together
//!
//! Admission writes the guest, the center's incremented counter and an
//! activity record in one transaction guarded by the versions that were
//! read. A concurrent writer makes the commit fail with a conflict and the
//! whole operation is retried from a fresh read:
//!
//! ```text
//! load center (v7) ─► reducers on copies ─► commit { guest, center@v7, activity }
//!                                                │
//!                         conflict ◄─────────────┤ someone wrote v8
//!                         retry from load         └─► ok: publish events
//! ```
//!
//! ## 2. Capacity is never exceeded
//!
//! The last free slot goes to exactly one of any number of concurrent
//! admissions; the others fail with `CENTER_FULL` and write nothing.
//!
//! ## 3. Pure transitions
//!
//! Every center and guest change is a [`Reducer`](relief_core::reducer::Reducer)
//! transition that validates first and mutates only on success.
//!
//! # Usage
//!
//! ```rust,ignore
//! let services = Services::new(context, StatsConfig::default());
//! let guest = services.coordinator.admit(&actor, request).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregates;
pub mod api;
pub mod app;
pub mod config;
pub mod metrics;
pub mod projections;
pub mod server;
pub mod types;

pub use app::{AdmissionCoordinator, CenterLedger, Context, DischargeOutcome, GuestRegistry, Services};
pub use config::{Config, StatsConfig};
pub use projections::StatsAggregator;
pub use server::{AppState, Application, build_router};
