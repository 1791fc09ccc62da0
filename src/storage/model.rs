//! The storage model: a class of storage components taking part in one optimisation.
use super::{
    OptimalValue, OptimalValueName, Storage, StorageConstraints, StorageParameters,
    StorageResults, StorageSets, StorageVariables, designs,
};
use crate::commodity::CommodityID;
use crate::component::ComponentID;
use crate::component::design;
use crate::energy_system::EnergySystem;
use crate::error::{ConsistencyWarning, Direction};
use crate::location::LocationID;
use crate::optimisation::{ComponentModel, OptimisationOptions};
use crate::solver::{Problem, Solution, Variable};
use crate::temporal::Aggregation;
use crate::time_series::TimeSeries;
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use log::{debug, info};

/// All storage components of an energy system and their part of the optimisation problem
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorageModel {
    components: IndexMap<ComponentID, Storage>,
    sets: StorageSets,
    variables: StorageVariables,
    constraints: StorageConstraints,
    results: StorageResults,
    result_warnings: Vec<ConsistencyWarning>,
}

impl StorageModel {
    /// Create an empty model
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a model from the parameters of several components
    pub fn from_parameters(
        system: &EnergySystem,
        parameters: IndexMap<ComponentID, StorageParameters>,
    ) -> Result<Self> {
        let mut model = Self::new();
        for (id, params) in parameters {
            let storage = Storage::new(system, &id.0, params)
                .with_context(|| format!("Invalid storage component {id}"))?;
            model.add(storage)?;
        }

        Ok(model)
    }

    /// Add a component to the model
    pub fn add(&mut self, storage: Storage) -> Result<()> {
        ensure!(
            !self.components.contains_key(&storage.id),
            "Storage component {} has already been added",
            storage.id
        );
        info!("Adding storage component {}", storage.id);
        self.components.insert(storage.id.clone(), storage);

        Ok(())
    }

    /// The components of the model
    pub fn components(&self) -> &IndexMap<ComponentID, Storage> {
        &self.components
    }

    /// The index sets, once declared
    pub fn sets(&self) -> &StorageSets {
        &self.sets
    }

    /// The variables, once declared
    pub fn variables(&self) -> &StorageVariables {
        &self.variables
    }

    /// The constraints, once declared
    pub fn constraints(&self) -> &StorageConstraints {
        &self.constraints
    }

    /// The results of the last optimisation (empty if it failed)
    pub fn results(&self) -> &StorageResults {
        &self.results
    }

    /// Warnings raised while configuring the components and reading the last results
    pub fn warnings(&self) -> impl Iterator<Item = &ConsistencyWarning> {
        self.components
            .values()
            .flat_map(|storage| &storage.warnings)
            .chain(&self.result_warnings)
    }

    /// The optimal values stored under a name
    pub fn optimal_value(&self, name: OptimalValueName) -> OptimalValue<'_> {
        self.results.optimal_value(name)
    }

    /// All optimal values, keyed by name
    pub fn all_optimal_values(&self) -> IndexMap<OptimalValueName, OptimalValue<'_>> {
        self.results.all_optimal_values()
    }

    /// The operation rate series of every component which should inform time series aggregation,
    /// with their weights
    pub fn data_for_time_series_aggregation(
        &self,
    ) -> Vec<(&ComponentID, &'static str, &TimeSeries, f64)> {
        self.components
            .iter()
            .flat_map(|(id, storage)| {
                storage
                    .data_for_time_series_aggregation()
                    .into_iter()
                    .map(move |(name, ts, weight)| (id, name, ts, weight))
            })
            .collect()
    }

    /// Aggregate the operation rates of every component
    pub fn set_aggregated_time_series_data(
        &mut self,
        aggregation: &Aggregation,
        representatives: &[usize],
    ) -> Result<()> {
        for storage in self.components.values_mut() {
            storage
                .set_aggregated_time_series_data(aggregation, representatives)
                .with_context(|| format!("Could not aggregate time series of {}", storage.id))?;
        }

        Ok(())
    }
}

impl ComponentModel for StorageModel {
    fn name(&self) -> &str {
        "storage"
    }

    fn declare_sets(&mut self, system: &EnergySystem) -> Result<()> {
        for storage in self.components.values_mut() {
            storage.set_time_series_data(system.time.has_aggregation())?;
        }
        self.sets = StorageSets::new(system, &self.components);
        debug!(
            "Storage model operates {} (location, component) pairs",
            self.sets.operation.len()
        );

        Ok(())
    }

    fn declare_variables(
        &mut self,
        system: &EnergySystem,
        problem: &mut Problem,
        options: &OptimisationOptions,
    ) {
        let before = problem.num_variables();
        self.variables =
            StorageVariables::declare(system, &self.sets, &self.components, problem, options);
        debug!(
            "Storage model declared {} variables",
            problem.num_variables() - before
        );
    }

    fn declare_constraints(&mut self, system: &EnergySystem, problem: &mut Problem) {
        let before = problem.num_constraints();
        self.constraints = StorageConstraints::declare(
            system,
            &self.sets,
            &self.variables,
            &self.components,
            problem,
        );
        debug!(
            "Storage model declared {} constraints",
            problem.num_constraints() - before
        );
    }

    fn has_operation_for(&self, location: &LocationID, commodity: &CommodityID) -> bool {
        self.components
            .values()
            .any(|storage| storage.commodity == *commodity && storage.design.is_eligible(location))
    }

    fn commodity_balance_contribution(
        &self,
        location: &LocationID,
        commodity: &CommodityID,
        period: usize,
        step: usize,
    ) -> Vec<(Variable, f64)> {
        self.variables
            .pairs
            .iter()
            .filter(|((loc, id), _)| {
                loc == location && self.components[id].commodity == *commodity
            })
            .flat_map(|(_, vars)| {
                [
                    (vars.operation(Direction::Discharge, period, step), 1.0),
                    (vars.operation(Direction::Charge, period, step), -1.0),
                ]
            })
            .collect()
    }

    fn objective_contribution(&self, system: &EnergySystem) -> Vec<(Variable, f64)> {
        let mut terms =
            design::objective_contribution(&self.variables.design, &designs(&self.components));

        let time = &system.time;
        let years = time.number_of_years();
        for ((loc, id), vars) in &self.variables.pairs {
            let storage = &self.components[id];
            for direction in [Direction::Charge, Direction::Discharge] {
                let opex = storage.opex_per_operation(direction, loc);
                if opex <= 0.0 {
                    continue;
                }
                terms.extend(time.time_set().map(|(p, t)| {
                    let weight = time.period_occurrences(p) / years;
                    (vars.operation(direction, p, t), opex * weight)
                }));
            }

            for (offsets, penalty) in [
                (&vars.offset_up, storage.soc_offset_up),
                (&vars.offset_down, storage.soc_offset_down),
            ] {
                terms.extend(offsets.iter().flatten().map(|var| (*var, penalty)));
            }
        }

        terms
    }

    fn extract_results(&mut self, system: &EnergySystem, solution: Option<&Solution>) {
        self.result_warnings.clear();
        let Some(solution) = solution else {
            debug!("No solution available; clearing storage results");
            self.results = StorageResults::default();
            return;
        };

        self.results = StorageResults::extract(
            system,
            &self.components,
            &self.variables,
            solution,
            &mut self.result_warnings,
        );
    }
}
