//! User-facing parameters of storage components and reading them from TOML.
use crate::commodity::CommodityID;
use crate::component::{ComponentID, DesignParameters};
use crate::input::{deserialise_proportion, deserialise_proportion_nonzero, read_toml};
use crate::location::LocationalValue;
use crate::time_series::TimeSeries;
use anyhow::{Result, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

/// The raw parameters of a storage component
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StorageParameters {
    /// The stored commodity
    pub commodity: CommodityID,
    /// Maximum charge per hour as a fraction of capacity
    #[serde(default = "one", deserialize_with = "deserialise_proportion")]
    pub charge_rate: f64,
    /// Maximum discharge per hour as a fraction of capacity
    #[serde(default = "one", deserialize_with = "deserialise_proportion")]
    pub discharge_rate: f64,
    /// Fraction of charged energy which is stored
    #[serde(default = "one", deserialize_with = "deserialise_proportion_nonzero")]
    pub charge_efficiency: f64,
    /// Fraction of withdrawn energy which is delivered
    #[serde(default = "one", deserialize_with = "deserialise_proportion_nonzero")]
    pub discharge_efficiency: f64,
    /// Fraction of the state of charge lost per hour
    #[serde(default, deserialize_with = "deserialise_proportion")]
    pub self_discharge: f64,
    /// Number of full cycle equivalents the storage can perform over its economic lifetime
    pub cyclic_lifetime: Option<f64>,
    /// Minimum state of charge as a fraction of capacity
    #[serde(default, deserialize_with = "deserialise_proportion")]
    pub state_of_charge_min: f64,
    /// Maximum state of charge as a fraction of capacity
    #[serde(default = "one", deserialize_with = "deserialise_proportion")]
    pub state_of_charge_max: f64,
    /// Model every time step's state of charge bounds under time series aggregation
    #[serde(default)]
    pub do_precise_tsa_modeling: bool,
    /// Force the state of charge to repeat in every period
    #[serde(default)]
    pub is_periodical_storage: bool,
    /// Maximum charge rate per time step
    pub charge_op_rate_max: Option<TimeSeries>,
    /// Fixed charge rate per time step
    pub charge_op_rate_fix: Option<TimeSeries>,
    /// Weight of the charge rate in time series aggregation
    #[serde(default = "one")]
    pub charge_tsa_weight: f64,
    /// Maximum discharge rate per time step
    pub discharge_op_rate_max: Option<TimeSeries>,
    /// Fixed discharge rate per time step
    pub discharge_op_rate_fix: Option<TimeSeries>,
    /// Weight of the discharge rate in time series aggregation
    #[serde(default = "one")]
    pub discharge_tsa_weight: f64,
    /// Cost per unit of charged energy
    #[serde(default = "zero")]
    pub opex_per_charge_operation: LocationalValue<f64>,
    /// Cost per unit of discharged energy
    #[serde(default = "zero")]
    pub opex_per_discharge_operation: LocationalValue<f64>,
    /// Penalty per unit of upward state of charge offset at period boundaries (negative disables)
    #[serde(default = "disabled")]
    pub soc_offset_up: f64,
    /// Penalty per unit of downward state of charge offset at period boundaries (negative disables)
    #[serde(default = "disabled")]
    pub soc_offset_down: f64,
    /// Design parameters shared with other components
    #[serde(flatten)]
    pub design: DesignParameters,
}

fn one() -> f64 {
    1.0
}

fn zero() -> LocationalValue<f64> {
    LocationalValue::Uniform(0.0)
}

fn disabled() -> f64 {
    -1.0
}

impl StorageParameters {
    /// Parameters for a storage of the given commodity with default values
    pub fn new(commodity: &str) -> Self {
        Self {
            commodity: commodity.into(),
            charge_rate: 1.0,
            discharge_rate: 1.0,
            charge_efficiency: 1.0,
            discharge_efficiency: 1.0,
            self_discharge: 0.0,
            cyclic_lifetime: None,
            state_of_charge_min: 0.0,
            state_of_charge_max: 1.0,
            do_precise_tsa_modeling: false,
            is_periodical_storage: false,
            charge_op_rate_max: None,
            charge_op_rate_fix: None,
            charge_tsa_weight: 1.0,
            discharge_op_rate_max: None,
            discharge_op_rate_fix: None,
            discharge_tsa_weight: 1.0,
            opex_per_charge_operation: zero(),
            opex_per_discharge_operation: zero(),
            soc_offset_up: disabled(),
            soc_offset_down: disabled(),
            design: DesignParameters::default(),
        }
    }
}

/// Read the parameters of storage components from a TOML file.
///
/// Each top-level table describes one component, keyed by its ID.
pub fn read_storage_parameters(file_path: &Path) -> Result<IndexMap<ComponentID, StorageParameters>> {
    let parameters: IndexMap<ComponentID, StorageParameters> = read_toml(file_path)?;
    ensure!(
        !parameters.is_empty(),
        "No storage components found in {}",
        file_path.display()
    );

    Ok(parameters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::CapacityDomain;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_read_storage_parameters() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("storage.toml");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(
                file,
                r#"
[battery]
commodity = "electricity"
charge_efficiency = 0.95
discharge_efficiency = 0.95
self_discharge = 0.0001
cyclic_lifetime = 10000.0
capacity_variable_domain = "discrete"
capacity_max = {{ north = 20.0 }}
invest_per_capacity = 0.151
soc_offset_down = 0.5

[battery.charge_op_rate_max]
north = [1.0, 0.5, 0.0, 1.0]

[hydrogen_tank]
commodity = "hydrogen"
"#
            )
            .unwrap();
        }

        let parameters = read_storage_parameters(&file_path).unwrap();
        assert_eq!(parameters.len(), 2);

        let battery = &parameters["battery"];
        assert_eq!(battery.commodity, "electricity".into());
        assert_eq!(battery.charge_efficiency, 0.95);
        assert_eq!(battery.discharge_rate, 1.0);
        assert_eq!(battery.cyclic_lifetime, Some(10000.0));
        assert_eq!(battery.soc_offset_up, -1.0);
        assert_eq!(battery.soc_offset_down, 0.5);
        assert_eq!(
            battery.design.capacity_variable_domain,
            CapacityDomain::Discrete
        );
        assert_eq!(
            battery
                .charge_op_rate_max
                .as_ref()
                .unwrap()
                .get(&"north".into()),
            Some([1.0, 0.5, 0.0, 1.0].as_slice())
        );

        let tank = &parameters["hydrogen_tank"];
        assert_eq!(*tank, StorageParameters::new("hydrogen"));
    }

    #[test]
    fn test_read_storage_parameters_bad_efficiency() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("storage.toml");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "[battery]\ncommodity = \"electricity\"\ncharge_efficiency = 0.0").unwrap();
        }

        assert!(read_storage_parameters(&file_path).is_err());
    }
}
