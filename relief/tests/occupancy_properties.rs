//! Property tests: random admit/discharge/transfer/delete sequences never
//! break the occupancy invariants.
//!
//! Run with: `cargo test -p relief --test occupancy_properties`

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{admin, harness};
use proptest::prelude::*;
use relief::types::{AdmitRequest, TransferRequest};
use relief_core::center::{CenterId, CenterStatus};
use relief_core::error::ReliefError;
use relief_core::guest::{GuestId, GuestProfile, GuestStatus};
use relief_core::store::GuestQuery;
use relief_testing::fixtures::CenterBuilder;
use relief_testing::properties::{arb_capacity, arb_profile};

#[derive(Debug, Clone)]
enum Op {
    Admit { center: usize, profile: GuestProfile },
    Discharge { guest: usize },
    Transfer { guest: usize, center: usize },
    Delete { guest: usize },
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0usize..3, arb_profile()).prop_map(|(center, profile)| Op::Admit { center, profile }),
        2 => (0usize..32).prop_map(|guest| Op::Discharge { guest }),
        2 => (0usize..32, 0usize..3).prop_map(|(guest, center)| Op::Transfer { guest, center }),
        1 => (0usize..32).prop_map(|guest| Op::Delete { guest }),
    ]
}

/// Errors a well-formed operation may legitimately end with.
fn expected_rejection(err: &ReliefError) -> bool {
    matches!(
        err,
        ReliefError::CenterFull { .. }
            | ReliefError::SameCenter { .. }
            | ReliefError::NotFound { .. }
            | ReliefError::Validation(_)
    )
}

async fn run(capacities: Vec<u32>, ops: Vec<Op>) {
    let centers: Vec<_> = capacities
        .iter()
        .enumerate()
        .map(|(i, &capacity)| CenterBuilder::new(&format!("C{i}")).capacity(capacity).build())
        .collect();
    let ids: Vec<CenterId> = centers.iter().map(|c| c.id).collect();
    let h = harness(&centers, &[]).await;
    let coordinator = &h.services.coordinator;
    let mut admitted: Vec<GuestId> = Vec::new();

    for op in ops {
        let before_total: u32 = h
            .services
            .ledger
            .list_centers()
            .await
            .unwrap()
            .iter()
            .map(|c| c.current_occupancy)
            .sum();

        let result = match op {
            Op::Admit { center, profile } => coordinator
                .admit(
                    &admin(),
                    AdmitRequest {
                        center_id: ids[center % ids.len()],
                        profile,
                    },
                )
                .await
                .map(|g| admitted.push(g.id)),
            Op::Discharge { guest } if !admitted.is_empty() => coordinator
                .discharge(&admin(), &admitted[guest % admitted.len()])
                .await
                .map(|_| ()),
            Op::Transfer { guest, center } if !admitted.is_empty() => {
                let id = admitted[guest % admitted.len()].clone();
                let target = ids[center % ids.len()];
                let result = coordinator
                    .transfer(&admin(), &id, TransferRequest { target_center_id: target })
                    .await
                    .map(|_| ());
                if result.is_ok() {
                    let after_total: u32 = h
                        .services
                        .ledger
                        .list_centers()
                        .await
                        .unwrap()
                        .iter()
                        .map(|c| c.current_occupancy)
                        .sum();
                    assert_eq!(after_total, before_total, "transfer changed total occupancy");
                }
                result
            }
            Op::Delete { guest } if !admitted.is_empty() => {
                let id = admitted.remove(guest % admitted.len());
                coordinator.delete_guest(&admin(), &id).await.map(|_| ())
            }
            _ => Ok(()),
        };
        if let Err(err) = &result {
            assert!(expected_rejection(err), "unexpected error: {err}");
        }

        for center in h.services.ledger.list_centers().await.unwrap() {
            assert!(center.current_occupancy <= center.total_capacity);
            assert_eq!(
                center.status == CenterStatus::Full,
                center.current_occupancy == center.total_capacity,
                "full iff at capacity"
            );
            let active = h
                .store
                .find_guests(GuestQuery {
                    status: Some(GuestStatus::Active),
                    ..GuestQuery::at_center(center.id)
                })
                .await
                .unwrap();
            assert_eq!(center.current_occupancy as usize, active.len());
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_occupancy_tracks_active_guests(
        capacities in proptest::collection::vec(arb_capacity(), 3),
        ops in proptest::collection::vec(arb_op(), 1..40),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(run(capacities, ops));
    }
}
