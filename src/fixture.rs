//! Fixtures for tests

use crate::commodity::Commodity;
use crate::energy_system::EnergySystem;
use crate::location::LocationID;
use crate::storage::StorageParameters;
use crate::temporal::{Aggregation, Segmentation, TimeStructure};
use indexmap::IndexSet;
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

#[fixture]
pub fn locations() -> IndexSet<LocationID> {
    ["north".into(), "south".into()].into_iter().collect()
}

/// Twelve two-hour time steps in three chronological periods, represented by two segmented
/// typical periods
#[fixture]
pub fn segmented_time() -> TimeStructure {
    TimeStructure::new(12, 2.0)
        .unwrap()
        .with_aggregation(Aggregation {
            time_steps_per_period: 4,
            typical_periods: 2,
            periods_order: vec![0, 0, 1],
            segmentation: Some(Segmentation {
                time_steps_per_segment: vec![vec![3, 1], vec![1, 3]],
            }),
        })
        .unwrap()
}

#[fixture]
pub fn energy_system(locations: IndexSet<LocationID>) -> EnergySystem {
    EnergySystem::new(
        locations,
        [Commodity::new("electricity", "GW_el").unwrap()],
        TimeStructure::new(4, 1.0).unwrap(),
        "1e9 Euro",
    )
    .unwrap()
}

/// A lossy electricity storage, eligible everywhere
#[fixture]
pub fn storage_parameters() -> StorageParameters {
    StorageParameters {
        charge_efficiency: 0.9,
        discharge_efficiency: 0.9,
        ..StorageParameters::new("electricity")
    }
}
