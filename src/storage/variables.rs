//! Variables of the storage model.
use super::{Storage, StorageSets, designs};
use crate::component::design::DesignVariables;
use crate::component::{ComponentID, LocationComponent};
use crate::energy_system::EnergySystem;
use crate::error::Direction;
use crate::optimisation::OptimisationOptions;
use crate::solver::{Problem, Variable, VariableKind};
use crate::temporal::TemporalMode;
use indexmap::IndexMap;

/// The variables of one (location, component) pair.
///
/// Operation variables are indexed by `period * steps + step` and the intra-period state of charge
/// by `period * (steps + 1) + step`, where `steps` is the number of modelled time steps per period.
#[derive(Debug, Clone, PartialEq)]
pub struct PairVariables {
    steps: usize,
    /// Charged amount per modelled time step
    pub charge: Vec<Variable>,
    /// Discharged amount per modelled time step
    pub discharge: Vec<Variable>,
    /// Whether the storage charges, for pairs with a minimum part load
    pub charge_binary: Option<Vec<Variable>>,
    /// Whether the storage discharges, for pairs with a minimum part load
    pub discharge_binary: Option<Vec<Variable>>,
    /// State of charge at each time step boundary. Under aggregation, relative to the start of
    /// the period.
    pub soc: Vec<Variable>,
    /// Lowest intra-period state of charge of each typical period (simple aggregated modelling)
    pub soc_min: Option<Vec<Variable>>,
    /// Highest intra-period state of charge of each typical period (simple aggregated modelling)
    pub soc_max: Option<Vec<Variable>>,
    /// State of charge at the start of each chronological period and at the end of the horizon
    pub soc_inter: Option<Vec<Variable>>,
    /// Upward state of charge offsets at period boundaries
    pub offset_up: Option<Vec<Variable>>,
    /// Downward state of charge offsets at period boundaries
    pub offset_down: Option<Vec<Variable>>,
}

impl PairVariables {
    /// The operation variable of a flow direction
    pub fn operation(&self, direction: Direction, period: usize, step: usize) -> Variable {
        let vars = match direction {
            Direction::Charge => &self.charge,
            Direction::Discharge => &self.discharge,
        };
        vars[period * self.steps + step]
    }

    /// The binary operation variable of a flow direction, if any
    pub fn binary(&self, direction: Direction, period: usize, step: usize) -> Option<Variable> {
        let vars = match direction {
            Direction::Charge => self.charge_binary.as_ref(),
            Direction::Discharge => self.discharge_binary.as_ref(),
        };
        vars.map(|vars| vars[period * self.steps + step])
    }

    /// The state of charge at the start of a modelled time step (`step == steps` for the end of
    /// the period)
    pub fn soc(&self, period: usize, step: usize) -> Variable {
        self.soc[period * (self.steps + 1) + step]
    }

    /// The `(up, down)` offsets at a boundary index, where present
    pub fn offsets(&self, index: usize) -> [Option<Variable>; 2] {
        [
            self.offset_up.as_ref().map(|vars| vars[index]),
            self.offset_down.as_ref().map(|vars| vars[index]),
        ]
    }
}

/// Handles to all variables of the storage model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorageVariables {
    /// Operation and state of charge variables of each pair
    pub pairs: IndexMap<LocationComponent, PairVariables>,
    /// Design variables
    pub design: DesignVariables,
}

/// Add `count` variables created by `new`
fn add_variables<F>(problem: &mut Problem, count: usize, mut new: F) -> Vec<Variable>
where
    F: FnMut(&mut Problem) -> Variable,
{
    (0..count).map(|_| new(problem)).collect()
}

impl StorageVariables {
    /// Add the storage variables to the problem
    pub fn declare(
        system: &EnergySystem,
        sets: &StorageSets,
        components: &IndexMap<ComponentID, Storage>,
        problem: &mut Problem,
        options: &OptimisationOptions,
    ) -> Self {
        let designs = designs(components);
        let design = DesignVariables::declare(&sets.design, &designs, problem, options);

        let periods = system.time.modelled_periods();
        let steps = system.time.modelled_steps();
        let boundaries = match system.time.mode() {
            TemporalMode::Full => 1,
            TemporalMode::Aggregated(_) => system.time.inter_period_steps().count(),
        };
        let aggregated = system.time.has_aggregation();

        let binary = |problem: &mut Problem| problem.add_variable(0.0, 1.0, VariableKind::Binary);

        let mut pairs = IndexMap::new();
        for key in &sets.operation {
            let part_load = sets.part_load.contains(key);
            let charge = add_variables(problem, periods * steps, Problem::add_non_negative);
            let discharge = add_variables(problem, periods * steps, Problem::add_non_negative);
            let charge_binary =
                part_load.then(|| add_variables(problem, periods * steps, binary));
            let discharge_binary =
                part_load.then(|| add_variables(problem, periods * steps, binary));

            // The intra-period state of charge is relative to the inter-period level when
            // aggregated, so it may become negative
            let soc_kind = if aggregated {
                Problem::add_free
            } else {
                Problem::add_non_negative
            };
            let soc = add_variables(problem, periods * (steps + 1), soc_kind);

            let simple = sets.simple_tsa.contains(key);
            let soc_min = simple.then(|| add_variables(problem, periods, Problem::add_free));
            let soc_max = simple.then(|| add_variables(problem, periods, Problem::add_free));
            let soc_inter =
                aggregated.then(|| add_variables(problem, boundaries, Problem::add_non_negative));
            let offset_up = sets
                .offset_up
                .contains(key)
                .then(|| add_variables(problem, boundaries, Problem::add_non_negative));
            let offset_down = sets
                .offset_down
                .contains(key)
                .then(|| add_variables(problem, boundaries, Problem::add_non_negative));

            pairs.insert(
                key.clone(),
                PairVariables {
                    steps,
                    charge,
                    discharge,
                    charge_binary,
                    discharge_binary,
                    soc,
                    soc_min,
                    soc_max,
                    soc_inter,
                    offset_up,
                    offset_down,
                },
            );
        }

        Self { pairs, design }
    }

    /// The capacity variable of a pair, if it has one
    pub fn capacity(&self, key: &LocationComponent) -> Option<Variable> {
        self.design.capacity.get(key).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{energy_system, segmented_time, storage_parameters};
    use crate::storage::StorageParameters;
    use crate::temporal::TimeStructure;
    use rstest::rstest;

    fn declare(
        system: &EnergySystem,
        params: StorageParameters,
    ) -> (StorageVariables, Problem, LocationComponent) {
        let mut storage = Storage::new(system, "battery", params).unwrap();
        storage.set_time_series_data(false).unwrap();
        let components = IndexMap::from([(storage.id.clone(), storage)]);
        let sets = StorageSets::new(system, &components);
        let mut problem = Problem::default();
        let variables = StorageVariables::declare(
            system,
            &sets,
            &components,
            &mut problem,
            &OptimisationOptions::default(),
        );

        (variables, problem, ("north".into(), "battery".into()))
    }

    #[rstest]
    fn test_full_variables(energy_system: EnergySystem, storage_parameters: StorageParameters) {
        let params = StorageParameters {
            soc_offset_down: 1.0,
            ..storage_parameters
        };
        let (variables, problem, key) = declare(&energy_system, params);
        assert_eq!(variables.pairs.len(), 2);
        assert_eq!(variables.design.capacity.len(), 2);

        let pair = &variables.pairs[&key];
        assert_eq!(pair.charge.len(), 4);
        assert_eq!(pair.soc.len(), 5);
        assert!(pair.soc_inter.is_none() && pair.soc_min.is_none());
        assert!(pair.offset_up.is_none());
        assert_eq!(pair.offset_down.as_ref().unwrap().len(), 1);
        assert_eq!(problem.variable(pair.soc(0, 4)).min, 0.0);
        assert_eq!(
            pair.operation(Direction::Discharge, 0, 2),
            pair.discharge[2]
        );
        assert!(pair.binary(Direction::Charge, 0, 0).is_none());
    }

    #[rstest]
    fn test_aggregated_variables(
        energy_system: EnergySystem,
        segmented_time: TimeStructure,
        storage_parameters: StorageParameters,
    ) {
        let system = EnergySystem {
            time: segmented_time,
            ..energy_system
        };
        let (variables, problem, key) = declare(&system, storage_parameters);

        // Two typical periods of two segments, three chronological periods
        let pair = &variables.pairs[&key];
        assert_eq!(pair.charge.len(), 4);
        assert_eq!(pair.soc.len(), 6);
        assert_eq!(pair.soc(1, 0), pair.soc[3]);
        assert_eq!(pair.soc_min.as_ref().unwrap().len(), 2);
        assert_eq!(pair.soc_inter.as_ref().unwrap().len(), 4);
        assert_eq!(problem.variable(pair.soc(1, 0)).min, f64::NEG_INFINITY);
    }

    #[rstest]
    fn test_part_load_binaries(
        energy_system: EnergySystem,
        storage_parameters: StorageParameters,
    ) {
        let mut params = storage_parameters;
        params.design.part_load_min = Some(0.2);
        params.design.big_m = Some(100.0);
        let (variables, problem, key) = declare(&energy_system, params);

        let pair = &variables.pairs[&key];
        let binary = pair.binary(Direction::Discharge, 0, 3).unwrap();
        assert_eq!(problem.variable(binary).kind, VariableKind::Binary);
    }
}
