//! Design parameters shared by all kinds of component.
//!
//! Every component may have a capacity variable (continuous or in whole plant units), a binary
//! build decision and capacity-related costs. These are validated here, once per component, and
//! the locations at which the component may be built or operated are derived from them.
use crate::energy_system::EnergySystem;
use crate::error::ConfigurationError;
use crate::finance::capital_recovery_factor;
use crate::id::define_id_type;
use crate::location::{LocationID, LocationalValue};
use crate::time_series::TimeSeries;
use crate::units::{Dimensionless, Year};
use anyhow::{Result, ensure};
use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;

pub mod design;

define_id_type! {ComponentID}

/// A (location, component) pair at which a component is eligible
pub type LocationComponent = (LocationID, ComponentID);

/// The domain of a capacity variable
#[derive(DeserializeLabeledStringEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapacityDomain {
    /// Capacity can take any non-negative value
    #[default]
    #[string = "continuous"]
    Continuous,
    /// Capacity is a whole number of plant units
    #[string = "discrete"]
    Discrete,
}

/// Raw design parameters of a component, as provided by the user
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DesignParameters {
    /// Whether the component's capacity is a decision variable
    #[serde(default = "default_true")]
    pub has_capacity_variable: bool,
    /// The domain of the capacity variable
    #[serde(default)]
    pub capacity_variable_domain: CapacityDomain,
    /// Capacity of one plant unit (discrete domain only)
    #[serde(default = "default_capacity_per_plant_unit")]
    pub capacity_per_plant_unit: f64,
    /// Whether a binary decision variable indicates if the component is built at a location
    #[serde(default)]
    pub has_is_built_binary_variable: bool,
    /// Big-M value for the build decision and part-load constraints
    pub big_m: Option<f64>,
    /// Minimum part load as a fraction of capacity
    pub part_load_min: Option<f64>,
    /// Explicit locations at which the component may exist
    pub locational_eligibility: Option<LocationalValue<bool>>,
    /// Minimum capacity
    pub capacity_min: Option<LocationalValue<f64>>,
    /// Maximum capacity
    pub capacity_max: Option<LocationalValue<f64>>,
    /// Fixed capacity
    pub capacity_fix: Option<LocationalValue<f64>>,
    /// Fixed build decision
    pub is_built_fix: Option<LocationalValue<bool>>,
    /// Investment per unit of capacity
    #[serde(default = "default_zero")]
    pub invest_per_capacity: LocationalValue<f64>,
    /// Investment if the component is built
    #[serde(default = "default_zero")]
    pub invest_if_built: LocationalValue<f64>,
    /// Annual operating cost per unit of capacity
    #[serde(default = "default_zero")]
    pub opex_per_capacity: LocationalValue<f64>,
    /// Annual operating cost if the component is built
    #[serde(default = "default_zero")]
    pub opex_if_built: LocationalValue<f64>,
    /// Interest rate used to annualise investments
    #[serde(default = "default_interest_rate")]
    pub interest_rate: LocationalValue<f64>,
    /// Economic lifetime in years
    #[serde(default = "default_economic_lifetime")]
    pub economic_lifetime: LocationalValue<f64>,
    /// Technical lifetime in years (defaults to the economic lifetime)
    pub technical_lifetime: Option<LocationalValue<f64>>,
}

fn default_true() -> bool {
    true
}

fn default_capacity_per_plant_unit() -> f64 {
    1.0
}

fn default_zero() -> LocationalValue<f64> {
    LocationalValue::Uniform(0.0)
}

fn default_interest_rate() -> LocationalValue<f64> {
    LocationalValue::Uniform(0.08)
}

fn default_economic_lifetime() -> LocationalValue<f64> {
    LocationalValue::Uniform(10.0)
}

impl Default for DesignParameters {
    fn default() -> Self {
        Self {
            has_capacity_variable: true,
            capacity_variable_domain: CapacityDomain::Continuous,
            capacity_per_plant_unit: default_capacity_per_plant_unit(),
            has_is_built_binary_variable: false,
            big_m: None,
            part_load_min: None,
            locational_eligibility: None,
            capacity_min: None,
            capacity_max: None,
            capacity_fix: None,
            is_built_fix: None,
            invest_per_capacity: default_zero(),
            invest_if_built: default_zero(),
            opex_per_capacity: default_zero(),
            opex_if_built: default_zero(),
            interest_rate: default_interest_rate(),
            economic_lifetime: default_economic_lifetime(),
            technical_lifetime: None,
        }
    }
}

/// Validated design of a component
#[derive(Debug, Clone, PartialEq)]
pub struct Design {
    /// Whether the component's capacity is a decision variable
    pub has_capacity_variable: bool,
    /// The domain of the capacity variable
    pub capacity_domain: CapacityDomain,
    /// Capacity of one plant unit
    pub capacity_per_plant_unit: f64,
    /// Whether the component has a binary build decision
    pub has_is_built_binary_variable: bool,
    /// Big-M value
    pub big_m: Option<f64>,
    /// Minimum part load as a fraction of capacity
    pub part_load_min: Option<f64>,
    /// Minimum capacity at the locations where it is given
    pub capacity_min: IndexMap<LocationID, f64>,
    /// Maximum capacity at the locations where it is given
    pub capacity_max: IndexMap<LocationID, f64>,
    /// Fixed capacity at the locations where it is given
    pub capacity_fix: IndexMap<LocationID, f64>,
    /// Fixed build decision at the locations where it is given
    pub is_built_fix: IndexMap<LocationID, bool>,
    /// Investment per unit of capacity at every location
    pub invest_per_capacity: IndexMap<LocationID, f64>,
    /// Investment if built at every location
    pub invest_if_built: IndexMap<LocationID, f64>,
    /// Annual operating cost per unit of capacity at every location
    pub opex_per_capacity: IndexMap<LocationID, f64>,
    /// Annual operating cost if built at every location
    pub opex_if_built: IndexMap<LocationID, f64>,
    /// Interest rate at every location
    pub interest_rate: IndexMap<LocationID, f64>,
    /// Economic lifetime at every location
    pub economic_lifetime: IndexMap<LocationID, f64>,
    /// Technical lifetime at every location
    pub technical_lifetime: IndexMap<LocationID, f64>,
    /// Capital charge factor (annuity factor) at every location
    pub capital_charge_factor: IndexMap<LocationID, f64>,
    /// The locations at which the component may exist
    pub eligibility: IndexSet<LocationID>,
}

impl Design {
    /// Validate design parameters for a component.
    ///
    /// `operation_data` is the sum of the component's operation time series, if it has any. It
    /// determines the eligible locations when neither explicit eligibility nor capacity bounds are
    /// given.
    pub fn new(
        system: &EnergySystem,
        id: &ComponentID,
        params: &DesignParameters,
        operation_data: Option<&TimeSeries>,
    ) -> Result<Self> {
        let resolve = |parameter, value: &LocationalValue<f64>| {
            resolve_parameter(system, id, parameter, value)
        };
        let resolve_sparse = |parameter, value: &Option<LocationalValue<f64>>| match value {
            None => Ok(IndexMap::new()),
            Some(value) => resolve_sparse_parameter(system, id, parameter, value),
        };

        ensure!(
            params.capacity_per_plant_unit > 0.0,
            ConfigurationError::invalid(id, "capacity_per_plant_unit", "must be positive")
        );
        if let Some(big_m) = params.big_m {
            ensure!(
                big_m > 0.0,
                ConfigurationError::invalid(id, "big_m", "must be positive")
            );
        }
        if params.has_is_built_binary_variable {
            ensure!(
                params.has_capacity_variable,
                ConfigurationError::invalid(
                    id,
                    "has_is_built_binary_variable",
                    "requires a capacity variable"
                )
            );
            ensure!(
                params.big_m.is_some(),
                ConfigurationError::invalid(id, "has_is_built_binary_variable", "requires big_m")
            );
        }
        if let Some(part_load_min) = params.part_load_min {
            ensure!(
                part_load_min > 0.0 && part_load_min <= 1.0,
                ConfigurationError::invalid(id, "part_load_min", "must be in (0, 1]")
            );
            ensure!(
                params.big_m.is_some(),
                ConfigurationError::invalid(id, "part_load_min", "requires big_m")
            );
            ensure!(
                params.has_capacity_variable,
                ConfigurationError::invalid(id, "part_load_min", "requires a capacity variable")
            );
        }

        let capacity_min = resolve_sparse("capacity_min", &params.capacity_min)?;
        let capacity_max = resolve_sparse("capacity_max", &params.capacity_max)?;
        let capacity_fix = resolve_sparse("capacity_fix", &params.capacity_fix)?;
        check_capacity_bounds(id, params, &capacity_min, &capacity_max, &capacity_fix)?;

        let is_built_fix = match &params.is_built_fix {
            None => IndexMap::new(),
            Some(value) => resolve_sparse_parameter(system, id, "is_built_fix", value)?,
        };
        ensure!(
            is_built_fix.is_empty() || params.has_is_built_binary_variable,
            ConfigurationError::invalid(id, "is_built_fix", "requires a build decision variable")
        );

        let invest_per_capacity = resolve("invest_per_capacity", &params.invest_per_capacity)?;
        let invest_if_built = resolve("invest_if_built", &params.invest_if_built)?;
        let opex_per_capacity = resolve("opex_per_capacity", &params.opex_per_capacity)?;
        let opex_if_built = resolve("opex_if_built", &params.opex_if_built)?;
        for (parameter, values) in [
            ("invest_per_capacity", &invest_per_capacity),
            ("invest_if_built", &invest_if_built),
            ("opex_per_capacity", &opex_per_capacity),
            ("opex_if_built", &opex_if_built),
        ] {
            check_non_negative(id, parameter, values)?;
        }

        let interest_rate = resolve("interest_rate", &params.interest_rate)?;
        check_non_negative(id, "interest_rate", &interest_rate)?;
        let economic_lifetime = resolve("economic_lifetime", &params.economic_lifetime)?;
        ensure!(
            economic_lifetime.values().all(|v| *v > 0.0),
            ConfigurationError::invalid(id, "economic_lifetime", "must be positive")
        );
        let technical_lifetime = match &params.technical_lifetime {
            None => economic_lifetime.clone(),
            Some(value) => resolve("technical_lifetime", value)?,
        };
        ensure!(
            economic_lifetime
                .iter()
                .all(|(loc, lifetime)| *lifetime <= technical_lifetime[loc]),
            ConfigurationError::invalid(
                id,
                "economic_lifetime",
                "cannot exceed the technical lifetime"
            )
        );

        let capital_charge_factor = interest_rate
            .iter()
            .map(|(loc, rate)| {
                let crf =
                    capital_recovery_factor(Year(economic_lifetime[loc]), Dimensionless(*rate));
                (loc.clone(), crf.value())
            })
            .collect();

        let mut design = Self {
            has_capacity_variable: params.has_capacity_variable,
            capacity_domain: params.capacity_variable_domain,
            capacity_per_plant_unit: params.capacity_per_plant_unit,
            has_is_built_binary_variable: params.has_is_built_binary_variable,
            big_m: params.big_m,
            part_load_min: params.part_load_min,
            capacity_min,
            capacity_max,
            capacity_fix,
            is_built_fix,
            invest_per_capacity,
            invest_if_built,
            opex_per_capacity,
            opex_if_built,
            interest_rate,
            economic_lifetime,
            technical_lifetime,
            capital_charge_factor,
            eligibility: IndexSet::new(),
        };
        design.eligibility = design.derive_eligibility(system, id, params, operation_data)?;

        Ok(design)
    }

    /// Decide where the component may exist.
    ///
    /// Explicit eligibility takes precedence. Otherwise, with a capacity variable, the first of
    /// `is_built_fix`, `capacity_fix`, `capacity_max` and the operation time series which is given
    /// marks the locations with a positive value; if none is given the component is eligible
    /// everywhere. Without a capacity variable the operation time series decide.
    fn derive_eligibility(
        &self,
        system: &EnergySystem,
        id: &ComponentID,
        params: &DesignParameters,
        operation_data: Option<&TimeSeries>,
    ) -> Result<IndexSet<LocationID>> {
        let positive = |values: &IndexMap<LocationID, f64>| {
            values
                .iter()
                .filter(|(_, v)| **v > 0.0)
                .map(|(loc, _)| loc.clone())
                .collect::<IndexSet<_>>()
        };
        let from_time_series = |data: &TimeSeries| positive(&data.location_sums());

        if let Some(eligibility) = &params.locational_eligibility {
            let resolved = resolve_full(system, id, "locational_eligibility", eligibility, false)?;
            return Ok(resolved
                .into_iter()
                .filter(|(_, eligible)| *eligible)
                .map(|(loc, _)| loc)
                .collect());
        }

        if self.has_capacity_variable {
            let eligibility: IndexSet<LocationID> = if !self.is_built_fix.is_empty() {
                self.is_built_fix
                    .iter()
                    .filter(|(_, built)| **built)
                    .map(|(loc, _)| loc.clone())
                    .collect()
            } else if !self.capacity_fix.is_empty() {
                positive(&self.capacity_fix)
            } else if !self.capacity_max.is_empty() {
                positive(&self.capacity_max)
            } else if let Some(data) = operation_data {
                from_time_series(data)
            } else {
                system.locations.clone()
            };
            return Ok(eligibility);
        }

        let data = operation_data.ok_or_else(|| {
            ConfigurationError::invalid(
                id,
                "has_capacity_variable",
                "an operation time series is required for components without a capacity variable",
            )
        })?;

        Ok(from_time_series(data))
    }

    /// Whether the component may exist at a location
    pub fn is_eligible(&self, location: &LocationID) -> bool {
        self.eligibility.contains(location)
    }
}

/// Resolve a parameter which is given for every location, reporting unknown locations
fn resolve_parameter(
    system: &EnergySystem,
    id: &ComponentID,
    parameter: &'static str,
    value: &LocationalValue<f64>,
) -> Result<IndexMap<LocationID, f64>> {
    resolve_full(system, id, parameter, value, 0.0)
}

fn resolve_full<T: Copy>(
    system: &EnergySystem,
    id: &ComponentID,
    parameter: &'static str,
    value: &LocationalValue<T>,
    default: T,
) -> Result<IndexMap<LocationID, T>> {
    check_known_locations(system, id, parameter, value)?;
    value.resolve(&system.locations, default)
}

fn resolve_sparse_parameter<T: Copy>(
    system: &EnergySystem,
    id: &ComponentID,
    parameter: &'static str,
    value: &LocationalValue<T>,
) -> Result<IndexMap<LocationID, T>> {
    check_known_locations(system, id, parameter, value)?;
    value.resolve_sparse(&system.locations)
}

/// Check that a location-indexed parameter only refers to locations of the energy system
pub fn check_known_locations<T>(
    system: &EnergySystem,
    id: &ComponentID,
    parameter: &'static str,
    value: &LocationalValue<T>,
) -> Result<()> {
    let LocationalValue::PerLocation(map) = value else {
        return Ok(());
    };
    if let Some(location) = map.keys().find(|loc| !system.locations.contains(*loc)) {
        Err(ConfigurationError::UnknownLocation {
            component: id.to_string(),
            parameter,
            location: location.to_string(),
        })?;
    }

    Ok(())
}

fn check_non_negative(
    id: &ComponentID,
    parameter: &'static str,
    values: &IndexMap<LocationID, f64>,
) -> Result<()> {
    ensure!(
        values.values().all(|v| v.is_finite() && *v >= 0.0),
        ConfigurationError::invalid(id, parameter, "must be a finite, non-negative number")
    );

    Ok(())
}

fn check_capacity_bounds(
    id: &ComponentID,
    params: &DesignParameters,
    capacity_min: &IndexMap<LocationID, f64>,
    capacity_max: &IndexMap<LocationID, f64>,
    capacity_fix: &IndexMap<LocationID, f64>,
) -> Result<()> {
    for (parameter, values) in [
        ("capacity_min", capacity_min),
        ("capacity_max", capacity_max),
        ("capacity_fix", capacity_fix),
    ] {
        ensure!(
            values.is_empty() || params.has_capacity_variable,
            ConfigurationError::invalid(id, parameter, "requires a capacity variable")
        );
        check_non_negative(id, parameter, values)?;
    }

    for (loc, min) in capacity_min {
        if let Some(max) = capacity_max.get(loc) {
            ensure!(
                min <= max,
                ConfigurationError::invalid(
                    id,
                    "capacity_min",
                    &format!("exceeds capacity_max at {loc}")
                )
            );
        }
    }
    for (loc, fix) in capacity_fix {
        let below_min = capacity_min.get(loc).is_some_and(|min| fix < min);
        let above_max = capacity_max.get(loc).is_some_and(|max| fix > max);
        ensure!(
            !below_min && !above_max,
            ConfigurationError::invalid(
                id,
                "capacity_fix",
                &format!("lies outside [capacity_min, capacity_max] at {loc}")
            )
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::energy_system;
    use float_cmp::assert_approx_eq;
    use indexmap::indexmap;
    use rstest::rstest;

    fn config_error(result: Result<Design>) -> ConfigurationError {
        result
            .unwrap_err()
            .downcast::<ConfigurationError>()
            .unwrap()
    }

    #[rstest]
    fn test_defaults_eligible_everywhere(energy_system: EnergySystem) {
        let design = Design::new(
            &energy_system,
            &"battery".into(),
            &DesignParameters::default(),
            None,
        )
        .unwrap();
        assert_eq!(design.eligibility, energy_system.locations);
        assert_approx_eq!(
            f64,
            design.capital_charge_factor["north"],
            0.14902948869707912,
            epsilon = 1e-10
        );
        assert_eq!(design.technical_lifetime["south"], 10.0);
    }

    #[rstest]
    fn test_eligibility_from_capacity_max(energy_system: EnergySystem) {
        let params = DesignParameters {
            capacity_max: Some(LocationalValue::PerLocation(indexmap! {
                "north".into() => 0.0,
                "south".into() => 5.0,
            })),
            ..DesignParameters::default()
        };
        let design = Design::new(&energy_system, &"battery".into(), &params, None).unwrap();
        assert_eq!(design.eligibility.len(), 1);
        assert!(design.is_eligible(&"south".into()));
    }

    #[rstest]
    fn test_eligibility_fix_takes_precedence_over_max(energy_system: EnergySystem) {
        let params = DesignParameters {
            capacity_fix: Some(LocationalValue::PerLocation(indexmap! {"north".into() => 1.0})),
            capacity_max: Some(5.0.into()),
            ..DesignParameters::default()
        };
        let design = Design::new(&energy_system, &"battery".into(), &params, None).unwrap();
        assert_eq!(design.eligibility, IndexSet::from(["north".into()]));
    }

    #[rstest]
    fn test_eligibility_explicit(energy_system: EnergySystem) {
        let params = DesignParameters {
            locational_eligibility: Some(LocationalValue::PerLocation(
                indexmap! {"south".into() => true},
            )),
            capacity_max: Some(5.0.into()),
            ..DesignParameters::default()
        };
        let design = Design::new(&energy_system, &"battery".into(), &params, None).unwrap();
        assert_eq!(design.eligibility, IndexSet::from(["south".into()]));
    }

    #[rstest]
    fn test_eligibility_from_time_series(energy_system: EnergySystem) {
        let params = DesignParameters {
            has_capacity_variable: false,
            ..DesignParameters::default()
        };
        let data = TimeSeries(indexmap! {
            "north".into() => vec![0.0; 4],
            "south".into() => vec![0.0, 1.0, 0.0, 0.0],
        });
        let design = Design::new(&energy_system, &"battery".into(), &params, Some(&data)).unwrap();
        assert_eq!(design.eligibility, IndexSet::from(["south".into()]));

        assert_eq!(
            config_error(Design::new(&energy_system, &"battery".into(), &params, None)),
            ConfigurationError::invalid(
                &"battery".into(),
                "has_capacity_variable",
                "an operation time series is required for components without a capacity variable"
            )
        );
    }

    #[rstest]
    fn test_unknown_location(energy_system: EnergySystem) {
        let params = DesignParameters {
            capacity_max: Some(LocationalValue::PerLocation(indexmap! {"east".into() => 1.0})),
            ..DesignParameters::default()
        };
        assert_eq!(
            config_error(Design::new(&energy_system, &"battery".into(), &params, None)),
            ConfigurationError::UnknownLocation {
                component: "battery".into(),
                parameter: "capacity_max",
                location: "east".into(),
            }
        );
    }

    #[rstest]
    #[case(DesignParameters {
        has_is_built_binary_variable: true,
        ..DesignParameters::default()
    }, "has_is_built_binary_variable")]
    #[case(DesignParameters {
        part_load_min: Some(0.5),
        ..DesignParameters::default()
    }, "part_load_min")]
    #[case(DesignParameters {
        capacity_min: Some(5.0.into()),
        capacity_max: Some(1.0.into()),
        ..DesignParameters::default()
    }, "capacity_min")]
    #[case(DesignParameters {
        capacity_fix: Some(1.0.into()),
        has_capacity_variable: false,
        ..DesignParameters::default()
    }, "capacity_fix")]
    #[case(DesignParameters {
        economic_lifetime: 20.0.into(),
        technical_lifetime: Some(15.0.into()),
        ..DesignParameters::default()
    }, "economic_lifetime")]
    #[case(DesignParameters {
        invest_per_capacity: (-1.0).into(),
        ..DesignParameters::default()
    }, "invest_per_capacity")]
    fn test_invalid_design(
        energy_system: EnergySystem,
        #[case] params: DesignParameters,
        #[case] expected_parameter: &str,
    ) {
        let err = config_error(Design::new(&energy_system, &"battery".into(), &params, None));
        let ConfigurationError::InvalidParameter { parameter, .. } = err else {
            panic!("Unexpected error: {err}");
        };
        assert_eq!(parameter, expected_parameter);
    }

    #[test]
    fn test_deserialise_design_parameters() {
        let params: DesignParameters = toml::from_str(
            r#"
            capacity_variable_domain = "discrete"
            capacity_per_plant_unit = 2.5
            capacity_max = { north = 10.0 }
            interest_rate = 0.05
            "#,
        )
        .unwrap();
        assert_eq!(params.capacity_variable_domain, CapacityDomain::Discrete);
        assert_eq!(params.capacity_per_plant_unit, 2.5);
        assert!(params.has_capacity_variable);
        assert_eq!(params.interest_rate, LocationalValue::Uniform(0.05));
        assert_eq!(params.economic_lifetime, LocationalValue::Uniform(10.0));
    }
}
