//! Code for assembling component models into one optimisation problem and solving it.
//!
//! Each kind of component implements [`ComponentModel`]. The host declares sets, variables and
//! constraints for every model, adds one commodity balance per location, commodity and time step,
//! collects the objective contributions and hands the problem to the solver.
use crate::commodity::CommodityID;
use crate::energy_system::EnergySystem;
use crate::location::LocationID;
use crate::solver::{ConstraintID, Problem, Sense, Solution, Variable};
use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::{debug, info};

/// Options affecting how the optimisation problem is built
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OptimisationOptions {
    /// Treat build decisions as continuous variables in `[0, 1]` instead of binaries
    pub relax_is_built_binary: bool,
}

/// The contract between the host and a class of components
pub trait ComponentModel {
    /// A short name for the model class, used in log messages
    fn name(&self) -> &str;

    /// Build the sparse index sets of the model.
    ///
    /// Fails if the model's data does not fit the temporal structure of the energy system (e.g. a
    /// time series was never aggregated).
    fn declare_sets(&mut self, system: &EnergySystem) -> Result<()>;

    /// Add the model's variables to the problem
    fn declare_variables(
        &mut self,
        system: &EnergySystem,
        problem: &mut Problem,
        options: &OptimisationOptions,
    );

    /// Add the model's constraints to the problem
    fn declare_constraints(&mut self, system: &EnergySystem, problem: &mut Problem);

    /// Whether the model has operation variables for a commodity at a location
    fn has_operation_for(&self, location: &LocationID, commodity: &CommodityID) -> bool;

    /// The model's net injection into a commodity balance at a modelled time step
    fn commodity_balance_contribution(
        &self,
        location: &LocationID,
        commodity: &CommodityID,
        period: usize,
        step: usize,
    ) -> Vec<(Variable, f64)>;

    /// The model's terms in the (minimised) objective function
    fn objective_contribution(&self, system: &EnergySystem) -> Vec<(Variable, f64)>;

    /// Store the optimal values, or clear them if no solution is available
    fn extract_results(&mut self, system: &EnergySystem, solution: Option<&Solution>);
}

/// Identifies a commodity balance constraint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BalanceKey {
    /// The location of the balance
    pub location: LocationID,
    /// The balanced commodity
    pub commodity: CommodityID,
    /// The modelled period
    pub period: usize,
    /// The modelled time step
    pub step: usize,
}

/// A fully declared optimisation problem
#[derive(Debug)]
pub struct ModelProblem {
    /// The problem passed to the solver
    pub problem: Problem,
    /// The commodity balance constraints
    pub balances: IndexMap<BalanceKey, ConstraintID>,
}

/// The outcome of a successful optimisation
#[derive(Debug, Clone)]
pub struct OptimisationOutcome {
    /// The optimal objective value (total annual cost)
    pub objective_value: f64,
    /// The solution of the problem
    pub solution: Solution,
}

/// Declare every model and the commodity balances, without solving
pub fn build_problem(
    system: &EnergySystem,
    models: &mut [&mut dyn ComponentModel],
    options: &OptimisationOptions,
) -> Result<ModelProblem> {
    let mut problem = Problem::default();

    for model in models.iter_mut() {
        debug!("Declaring sets for {}", model.name());
        model
            .declare_sets(system)
            .with_context(|| format!("Could not declare sets for {}", model.name()))?;
    }
    for model in models.iter_mut() {
        debug!("Declaring variables for {}", model.name());
        model.declare_variables(system, &mut problem, options);
    }
    for model in models.iter_mut() {
        debug!("Declaring constraints for {}", model.name());
        model.declare_constraints(system, &mut problem);
    }

    let balances = add_commodity_balances(system, models, &mut problem);

    for model in models.iter() {
        for (var, coeff) in model.objective_contribution(system) {
            problem.add_objective_term(var, coeff);
        }
    }

    Ok(ModelProblem { problem, balances })
}

/// Add `sum(contributions) == 0` for every location, commodity and modelled time step at which
/// some model operates
fn add_commodity_balances(
    system: &EnergySystem,
    models: &[&mut dyn ComponentModel],
    problem: &mut Problem,
) -> IndexMap<BalanceKey, ConstraintID> {
    let mut balances = IndexMap::new();
    for location in &system.locations {
        for commodity in system.commodities.keys() {
            let active: Vec<_> = models
                .iter()
                .filter(|model| model.has_operation_for(location, commodity))
                .collect();
            if active.is_empty() {
                continue;
            }

            for (period, step) in system.time.time_set() {
                let terms: Vec<_> = active
                    .iter()
                    .flat_map(|model| {
                        model.commodity_balance_contribution(location, commodity, period, step)
                    })
                    .collect();
                let key = BalanceKey {
                    location: location.clone(),
                    commodity: commodity.clone(),
                    period,
                    step,
                };
                balances.insert(key, problem.add_equality(0.0, terms));
            }
        }
    }

    balances
}

/// Solve a declared problem and hand the results to the models.
///
/// If the solver fails, every model is told that no solution is available before the error is
/// returned.
pub fn solve_problem(
    system: &EnergySystem,
    models: &mut [&mut dyn ComponentModel],
    model_problem: &ModelProblem,
) -> Result<OptimisationOutcome> {
    match model_problem.problem.solve(Sense::Minimise) {
        Ok(solution) => {
            info!(
                "Optimisation finished with total annual cost {:.6} [{}/a]",
                solution.objective_value(),
                system.cost_unit
            );
            for model in models.iter_mut() {
                model.extract_results(system, Some(&solution));
            }
            Ok(OptimisationOutcome {
                objective_value: solution.objective_value(),
                solution,
            })
        }
        Err(err) => {
            for model in models.iter_mut() {
                model.extract_results(system, None);
            }
            Err(err)
        }
    }
}

/// Build and solve the optimisation problem for the given models
pub fn optimise(
    system: &EnergySystem,
    models: &mut [&mut dyn ComponentModel],
    options: &OptimisationOptions,
) -> Result<OptimisationOutcome> {
    let model_problem = build_problem(system, models, options)?;
    solve_problem(system, models, &model_problem)
}
