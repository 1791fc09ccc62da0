//! Locations are the spatial nodes at which components can be built and operated.
use crate::id::{IDCollection, define_id_type};
use anyhow::{Result, ensure};
use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;

define_id_type! {LocationID}

/// A value which is either the same everywhere or given per location.
///
/// When read from TOML, a bare value applies to every location and a table maps location IDs to
/// values.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum LocationalValue<T> {
    /// One value for all locations
    Uniform(T),
    /// A value for each listed location
    PerLocation(IndexMap<LocationID, T>),
}

impl<T: Copy> LocationalValue<T> {
    /// Expand to a value for every location.
    ///
    /// Locations missing from a [`LocationalValue::PerLocation`] map get `default`. Unknown
    /// locations are an error.
    pub fn resolve(
        &self,
        locations: &IndexSet<LocationID>,
        default: T,
    ) -> Result<IndexMap<LocationID, T>> {
        match self {
            LocationalValue::Uniform(value) => {
                Ok(locations.iter().map(|loc| (loc.clone(), *value)).collect())
            }
            LocationalValue::PerLocation(map) => {
                locations.check_ids(map.keys())?;

                Ok(locations
                    .iter()
                    .map(|loc| (loc.clone(), map.get(loc).copied().unwrap_or(default)))
                    .collect())
            }
        }
    }

    /// Expand to values only for the listed locations, with no default.
    pub fn resolve_sparse(
        &self,
        locations: &IndexSet<LocationID>,
    ) -> Result<IndexMap<LocationID, T>> {
        match self {
            LocationalValue::Uniform(value) => {
                Ok(locations.iter().map(|loc| (loc.clone(), *value)).collect())
            }
            LocationalValue::PerLocation(map) => map
                .iter()
                .map(|(loc, value)| Ok((locations.get_id(loc)?, *value)))
                .collect(),
        }
    }
}

impl<T> From<T> for LocationalValue<T> {
    fn from(value: T) -> Self {
        LocationalValue::Uniform(value)
    }
}

/// Check that a set of locations is usable for building models
pub fn check_locations(locations: &IndexSet<LocationID>) -> Result<()> {
    ensure!(!locations.is_empty(), "At least one location is required");
    ensure!(
        locations.iter().all(|loc| !loc.0.trim().is_empty()),
        "Location IDs cannot be empty"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, locations};
    use indexmap::indexmap;
    use rstest::rstest;

    #[rstest]
    fn test_resolve_uniform(locations: IndexSet<LocationID>) {
        let value = LocationalValue::Uniform(2.0);
        let resolved = value.resolve(&locations, 0.0).unwrap();
        assert_eq!(resolved.len(), locations.len());
        assert!(resolved.values().all(|v| *v == 2.0));
    }

    #[rstest]
    fn test_resolve_per_location(locations: IndexSet<LocationID>) {
        let value = LocationalValue::PerLocation(indexmap! {"south".into() => 3.0});
        let resolved = value.resolve(&locations, 1.0).unwrap();
        assert_eq!(resolved["north"], 1.0);
        assert_eq!(resolved["south"], 3.0);

        let sparse = value.resolve_sparse(&locations).unwrap();
        assert_eq!(sparse.len(), 1);
    }

    #[rstest]
    fn test_resolve_unknown_location(locations: IndexSet<LocationID>) {
        let value = LocationalValue::PerLocation(indexmap! {"east".into() => 3.0});
        assert_error!(value.resolve(&locations, 1.0), "Unknown ID east found");
    }

    #[test]
    fn test_deserialise_locational_value() {
        #[derive(Deserialize)]
        struct Wrapper {
            value: LocationalValue<f64>,
        }

        let uniform: Wrapper = toml::from_str("value = 4.0").unwrap();
        assert_eq!(uniform.value, LocationalValue::Uniform(4.0));

        let per_location: Wrapper = toml::from_str("value = { north = 1.0 }").unwrap();
        assert_eq!(
            per_location.value,
            LocationalValue::PerLocation(indexmap! {"north".into() => 1.0})
        );
    }

    #[test]
    fn test_check_locations_empty() {
        assert_error!(
            check_locations(&IndexSet::new()),
            "At least one location is required"
        );
    }
}
