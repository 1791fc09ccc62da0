//! Shared helpers for integration tests.
#![allow(dead_code)]
use esm_storage::commodity::{Commodity, CommodityID};
use esm_storage::energy_system::EnergySystem;
use esm_storage::location::LocationID;
use esm_storage::optimisation::{ComponentModel, OptimisationOptions};
use esm_storage::solver::{Problem, Solution, Variable, VariableKind};
use esm_storage::temporal::TimeStructure;
use indexmap::IndexMap;

/// An energy system with one location and electricity as the only commodity
pub fn energy_system(time: TimeStructure) -> EnergySystem {
    EnergySystem::new(
        ["north".into()],
        [Commodity::new("electricity", "GW_el").unwrap()],
        time,
        "1e9 Euro",
    )
    .unwrap()
}

/// A grid connection which supplies a commodity at a price per modelled time step and absorbs a
/// fixed demand
pub struct Grid {
    commodity: CommodityID,
    price: Vec<f64>,
    demand: Vec<f64>,
    supply_vars: IndexMap<(LocationID, usize, usize), Variable>,
    demand_vars: IndexMap<(LocationID, usize, usize), Variable>,
    /// Optimal supply per location, over the modelled time steps
    pub supply: IndexMap<LocationID, Vec<f64>>,
}

impl Grid {
    pub fn new(commodity: &str, price: &[f64], demand: &[f64]) -> Self {
        Self {
            commodity: commodity.into(),
            price: price.to_vec(),
            demand: demand.to_vec(),
            supply_vars: IndexMap::new(),
            demand_vars: IndexMap::new(),
            supply: IndexMap::new(),
        }
    }
}

impl ComponentModel for Grid {
    fn name(&self) -> &str {
        "grid"
    }

    fn declare_sets(&mut self, _system: &EnergySystem) -> anyhow::Result<()> {
        Ok(())
    }

    fn declare_variables(
        &mut self,
        system: &EnergySystem,
        problem: &mut Problem,
        _options: &OptimisationOptions,
    ) {
        let steps = system.time.modelled_steps();
        for location in &system.locations {
            for (p, t) in system.time.time_set() {
                let key = (location.clone(), p, t);
                let demand = self.demand[p * steps + t];
                self.supply_vars.insert(key.clone(), problem.add_non_negative());
                self.demand_vars.insert(
                    key,
                    problem.add_variable(demand, demand, VariableKind::Continuous),
                );
            }
        }
    }

    fn declare_constraints(&mut self, _system: &EnergySystem, _problem: &mut Problem) {}

    fn has_operation_for(&self, _location: &LocationID, commodity: &CommodityID) -> bool {
        *commodity == self.commodity
    }

    fn commodity_balance_contribution(
        &self,
        location: &LocationID,
        _commodity: &CommodityID,
        period: usize,
        step: usize,
    ) -> Vec<(Variable, f64)> {
        let key = (location.clone(), period, step);
        vec![(self.supply_vars[&key], 1.0), (self.demand_vars[&key], -1.0)]
    }

    fn objective_contribution(&self, system: &EnergySystem) -> Vec<(Variable, f64)> {
        let time = &system.time;
        let steps = time.modelled_steps();
        let years = time.number_of_years();
        self.supply_vars
            .iter()
            .map(|((_, p, t), var)| {
                let price = self.price[p * steps + t];
                (*var, price * time.period_occurrences(*p) / years)
            })
            .collect()
    }

    fn extract_results(&mut self, system: &EnergySystem, solution: Option<&Solution>) {
        self.supply.clear();
        let Some(solution) = solution else {
            return;
        };
        for location in &system.locations {
            let values = system
                .time
                .time_set()
                .map(|(p, t)| solution.value(self.supply_vars[&(location.clone(), p, t)]))
                .collect();
            self.supply.insert(location.clone(), values);
        }
    }
}
