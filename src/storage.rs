//! Storage components, such as batteries or reservoirs.
//!
//! A storage charges a commodity, holds it as its state of charge (SOC) and later discharges it,
//! with losses on both legs and a self-discharge per hour. The [`StorageModel`] turns a set of
//! storages into variables and constraints of the shared optimisation problem.
use crate::commodity::CommodityID;
use crate::component::{ComponentID, Design, check_known_locations};
use crate::energy_system::EnergySystem;
use crate::error::{ConfigurationError, ConsistencyWarning, Direction, emit_warning};
use crate::id::define_id_getter;
use crate::location::{LocationID, LocationalValue};
use crate::temporal::Aggregation;
use crate::time_series::TimeSeries;
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use log::debug;

mod constraints;
mod model;
mod parameters;
mod results;
mod sets;
mod variables;
pub use constraints::{ConstraintGroup, StorageConstraints};
pub use model::StorageModel;
pub use parameters::{StorageParameters, read_storage_parameters};
pub use results::{
    DesignValues, OperationValues, OptimalValue, OptimalValueName, OptimalValues, StorageResults,
    decompose_state_of_charge, reconstruct_state_of_charge,
};
pub use sets::{OperationModeSets, StorageSets};
pub use variables::{PairVariables, StorageVariables};

/// Operation rate time series of one flow direction
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRates {
    /// Fixed rates over the full horizon
    pub full_fix: Option<TimeSeries>,
    /// Maximum rates over the full horizon
    pub full_max: Option<TimeSeries>,
    /// Fixed rates of the typical periods
    pub aggregated_fix: Option<TimeSeries>,
    /// Maximum rates of the typical periods
    pub aggregated_max: Option<TimeSeries>,
    /// The fixed rates used in the optimisation
    pub processed_fix: Option<TimeSeries>,
    /// The maximum rates used in the optimisation
    pub processed_max: Option<TimeSeries>,
    /// Weight of the rates in time series aggregation
    pub tsa_weight: f64,
}

impl OperationRates {
    fn new(full_fix: Option<TimeSeries>, full_max: Option<TimeSeries>, tsa_weight: f64) -> Self {
        Self {
            full_fix,
            full_max,
            aggregated_fix: None,
            aggregated_max: None,
            processed_fix: None,
            processed_max: None,
            tsa_weight,
        }
    }

    /// Select full or aggregated rates for the optimisation
    pub fn set_time_series_data(&mut self, has_tsa: bool) -> Result<()> {
        if has_tsa {
            ensure!(
                self.full_fix.is_none() || self.aggregated_fix.is_some(),
                "Fixed operation rates have not been aggregated"
            );
            ensure!(
                self.full_max.is_none() || self.aggregated_max.is_some(),
                "Maximum operation rates have not been aggregated"
            );
            self.processed_fix.clone_from(&self.aggregated_fix);
            self.processed_max.clone_from(&self.aggregated_max);
        } else {
            self.processed_fix.clone_from(&self.full_fix);
            self.processed_max.clone_from(&self.full_max);
        }

        Ok(())
    }

    /// The series to feed into time series aggregation: fixed rates if given, else maximum rates
    pub fn data_for_aggregation(&self) -> Option<(&TimeSeries, f64)> {
        self.full_fix
            .as_ref()
            .or(self.full_max.as_ref())
            .map(|data| (data, self.tsa_weight))
    }

    /// Aggregate the full rates using the representative period of each typical period
    pub fn set_aggregated(&mut self, aggregation: &Aggregation, representatives: &[usize]) -> Result<()> {
        self.aggregated_fix = self
            .full_fix
            .as_ref()
            .map(|ts| ts.aggregate(aggregation, representatives))
            .transpose()?;
        self.aggregated_max = self
            .full_max
            .as_ref()
            .map(|ts| ts.aggregate(aggregation, representatives))
            .transpose()?;

        Ok(())
    }

    /// Whether any time series is given for this direction
    pub fn has_time_series(&self) -> bool {
        self.full_fix.is_some() || self.full_max.is_some()
    }
}

/// A validated storage component
#[derive(Debug, Clone, PartialEq)]
pub struct Storage {
    /// The component's ID
    pub id: ComponentID,
    /// The stored commodity
    pub commodity: CommodityID,
    /// Unit of the stored commodity
    pub commodity_unit: String,
    /// Maximum charge per hour as a fraction of capacity
    pub charge_rate: f64,
    /// Maximum discharge per hour as a fraction of capacity
    pub discharge_rate: f64,
    /// Fraction of charged energy which is stored
    pub charge_efficiency: f64,
    /// Fraction of withdrawn energy which is delivered
    pub discharge_efficiency: f64,
    /// Fraction of the state of charge lost per hour
    pub self_discharge: f64,
    /// Full cycle equivalents over the economic lifetime
    pub cyclic_lifetime: Option<f64>,
    /// Minimum state of charge as a fraction of capacity
    pub state_of_charge_min: f64,
    /// Maximum state of charge as a fraction of capacity
    pub state_of_charge_max: f64,
    /// Whether every time step's SOC is bounded under time series aggregation
    pub do_precise_tsa_modeling: bool,
    /// Whether the state of charge repeats in every period
    pub is_periodical_storage: bool,
    /// Charge operation rates
    pub charge: OperationRates,
    /// Discharge operation rates
    pub discharge: OperationRates,
    /// Cost per unit of charged energy at every location
    pub opex_per_charge_operation: IndexMap<LocationID, f64>,
    /// Cost per unit of discharged energy at every location
    pub opex_per_discharge_operation: IndexMap<LocationID, f64>,
    /// Penalty for upward SOC offsets (negative if disabled)
    pub soc_offset_up: f64,
    /// Penalty for downward SOC offsets (negative if disabled)
    pub soc_offset_down: f64,
    /// Design of the component
    pub design: Design,
    /// Warnings raised while configuring the component
    pub warnings: Vec<ConsistencyWarning>,
}
define_id_getter! {Storage, ComponentID}

impl Storage {
    /// Validate the parameters of a storage component.
    ///
    /// If both a fixed and a maximum operation rate are given for the same direction, the maximum
    /// is discarded and a [`ConsistencyWarning`] is recorded. Only the rates which remain are
    /// checked against the minimum part load.
    pub fn new(system: &EnergySystem, id: &str, params: StorageParameters) -> Result<Self> {
        let id = ComponentID::new(id);
        let commodity = system.commodity(&id, &params.commodity)?;

        check_storage_values(&id, &params)?;

        let mut warnings = Vec::new();
        let mut rates = |direction, fix: Option<TimeSeries>, max: Option<TimeSeries>, weight| {
            let max = if fix.is_some() && max.is_some() {
                let warning = ConsistencyWarning::FixOverridesMax {
                    component: id.clone(),
                    direction,
                };
                emit_warning(warning, system.verbose, &mut warnings);
                None
            } else {
                max
            };
            OperationRates::new(fix, max, weight)
        };
        let charge = rates(
            Direction::Charge,
            params.charge_op_rate_fix,
            params.charge_op_rate_max,
            params.charge_tsa_weight,
        );
        let discharge = rates(
            Direction::Discharge,
            params.discharge_op_rate_fix,
            params.discharge_op_rate_max,
            params.discharge_tsa_weight,
        );

        let series = [
            ("charge_op_rate_fix", &charge.full_fix),
            ("charge_op_rate_max", &charge.full_max),
            ("discharge_op_rate_fix", &discharge.full_fix),
            ("discharge_op_rate_max", &discharge.full_max),
        ];
        for (name, ts) in series {
            if let Some(ts) = ts {
                check_time_series(system, &id, name, ts, params.design.part_load_min)?;
            }
        }

        let operation_data = TimeSeries::sum(series.iter().filter_map(|(_, ts)| ts.as_ref()))?;
        let design = Design::new(system, &id, &params.design, operation_data.as_ref())?;

        let opex = |parameter: &'static str,
                    value: &LocationalValue<f64>|
         -> Result<IndexMap<LocationID, f64>> {
            check_known_locations(system, &id, parameter, value)?;
            let resolved = value.resolve(&system.locations, 0.0)?;
            ensure!(
                resolved.values().all(|v| v.is_finite() && *v >= 0.0),
                ConfigurationError::invalid(&id, parameter, "must be a finite, non-negative number")
            );
            Ok(resolved)
        };
        let opex_per_charge_operation =
            opex("opex_per_charge_operation", &params.opex_per_charge_operation)?;
        let opex_per_discharge_operation =
            opex("opex_per_discharge_operation", &params.opex_per_discharge_operation)?;

        debug!(
            "Storage {id} for {} eligible at {} location(s)",
            params.commodity,
            design.eligibility.len()
        );

        Ok(Self {
            id,
            commodity: params.commodity,
            commodity_unit: commodity.unit.clone(),
            charge_rate: params.charge_rate,
            discharge_rate: params.discharge_rate,
            charge_efficiency: params.charge_efficiency,
            discharge_efficiency: params.discharge_efficiency,
            self_discharge: params.self_discharge,
            cyclic_lifetime: params.cyclic_lifetime,
            state_of_charge_min: params.state_of_charge_min,
            state_of_charge_max: params.state_of_charge_max,
            do_precise_tsa_modeling: params.do_precise_tsa_modeling,
            is_periodical_storage: params.is_periodical_storage,
            charge,
            discharge,
            opex_per_charge_operation,
            opex_per_discharge_operation,
            soc_offset_up: params.soc_offset_up,
            soc_offset_down: params.soc_offset_down,
            design,
            warnings,
        })
    }

    /// The operation rates of a flow direction
    pub fn rates(&self, direction: Direction) -> &OperationRates {
        match direction {
            Direction::Charge => &self.charge,
            Direction::Discharge => &self.discharge,
        }
    }

    /// Per-unit operating cost of a flow direction at a location
    pub fn opex_per_operation(&self, direction: Direction, location: &LocationID) -> f64 {
        let opex = match direction {
            Direction::Charge => &self.opex_per_charge_operation,
            Direction::Discharge => &self.opex_per_discharge_operation,
        };
        opex.get(location).copied().unwrap_or(0.0)
    }

    /// Whether upward SOC offsets are allowed
    pub fn has_offset_up(&self) -> bool {
        self.soc_offset_up >= 0.0
    }

    /// Whether downward SOC offsets are allowed
    pub fn has_offset_down(&self) -> bool {
        self.soc_offset_down >= 0.0
    }

    /// Select full or aggregated operation rates for the optimisation
    pub fn set_time_series_data(&mut self, has_tsa: bool) -> Result<()> {
        self.charge
            .set_time_series_data(has_tsa)
            .with_context(|| format!("Charge rates of storage {}", self.id))?;
        self.discharge
            .set_time_series_data(has_tsa)
            .with_context(|| format!("Discharge rates of storage {}", self.id))
    }

    /// The series and weights this component contributes to time series aggregation, labelled
    /// `chargeRate` and `dischargeRate`
    pub fn data_for_time_series_aggregation(&self) -> Vec<(&'static str, &TimeSeries, f64)> {
        [
            ("chargeRate", self.charge.data_for_aggregation()),
            ("dischargeRate", self.discharge.data_for_aggregation()),
        ]
        .into_iter()
        .filter_map(|(name, data)| data.map(|(ts, weight)| (name, ts, weight)))
        .collect()
    }

    /// Aggregate the operation rates using the representative period of each typical period
    pub fn set_aggregated_time_series_data(
        &mut self,
        aggregation: &Aggregation,
        representatives: &[usize],
    ) -> Result<()> {
        self.charge.set_aggregated(aggregation, representatives)?;
        self.discharge.set_aggregated(aggregation, representatives)
    }
}

/// The designs of the given components
fn designs(components: &IndexMap<ComponentID, Storage>) -> IndexMap<ComponentID, &Design> {
    components
        .iter()
        .map(|(id, storage)| (id.clone(), &storage.design))
        .collect()
}

/// Check the scalar storage parameters
fn check_storage_values(id: &ComponentID, params: &StorageParameters) -> Result<()> {
    let in_unit_interval = |v: f64| (0.0..=1.0).contains(&v);
    for (parameter, value) in [
        ("charge_efficiency", params.charge_efficiency),
        ("discharge_efficiency", params.discharge_efficiency),
    ] {
        ensure!(
            value > 0.0 && value <= 1.0,
            ConfigurationError::invalid(id, parameter, "must be in (0, 1]")
        );
    }
    for (parameter, value) in [
        ("charge_rate", params.charge_rate),
        ("discharge_rate", params.discharge_rate),
        ("self_discharge", params.self_discharge),
        ("state_of_charge_min", params.state_of_charge_min),
        ("state_of_charge_max", params.state_of_charge_max),
    ] {
        ensure!(
            in_unit_interval(value),
            ConfigurationError::invalid(id, parameter, "must be in [0, 1]")
        );
    }
    ensure!(
        params.state_of_charge_min <= params.state_of_charge_max,
        ConfigurationError::invalid(
            id,
            "state_of_charge_min",
            "cannot exceed state_of_charge_max"
        )
    );
    if let Some(cyclic_lifetime) = params.cyclic_lifetime {
        ensure!(
            cyclic_lifetime > 0.0,
            ConfigurationError::invalid(id, "cyclic_lifetime", "must be positive")
        );
    }
    for (parameter, value) in [
        ("charge_tsa_weight", params.charge_tsa_weight),
        ("discharge_tsa_weight", params.discharge_tsa_weight),
    ] {
        ensure!(
            value.is_finite() && value >= 0.0,
            ConfigurationError::invalid(id, parameter, "must be non-negative")
        );
    }
    for (parameter, value) in [
        ("soc_offset_up", params.soc_offset_up),
        ("soc_offset_down", params.soc_offset_down),
    ] {
        ensure!(
            value.is_finite(),
            ConfigurationError::invalid(id, parameter, "must be a finite number")
        );
    }

    Ok(())
}

/// Check that an operation rate time series fits the energy system and the part-load minimum
fn check_time_series(
    system: &EnergySystem,
    id: &ComponentID,
    name: &'static str,
    ts: &TimeSeries,
    part_load_min: Option<f64>,
) -> Result<()> {
    let invalid = |reason: String| ConfigurationError::InvalidParameter {
        component: id.to_string(),
        parameter: name,
        reason,
    };

    if let Err(err) = ts.validate(&system.locations, system.time.total_time_steps()) {
        Err(invalid(err.to_string()))?;
    }
    if let Some(location) = system.locations.iter().find(|loc| ts.get(loc).is_none()) {
        Err(invalid(format!("no values given for location {location}")))?;
    }

    let Some(part_load_min) = part_load_min else {
        return Ok(());
    };
    if let Some((location, value)) = ts.first_between_zero_and(part_load_min) {
        Err(ConfigurationError::BelowPartLoadMin {
            component: id.to_string(),
            series: name,
            location: location.to_string(),
            value,
            part_load_min,
        })?;
    }

    Ok(())
}
