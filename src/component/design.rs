//! Design decisions (capacity, plant units and build decisions) of a class of components.
use super::{CapacityDomain, ComponentID, Design, LocationComponent};
use crate::energy_system::EnergySystem;
use crate::location::LocationID;
use crate::optimisation::OptimisationOptions;
use crate::solver::{ConstraintID, Problem, Solution, Variable, VariableKind};
use crate::summary::{Summary, SummaryKey, SummaryProperty};
use indexmap::{IndexMap, IndexSet};

/// The (location, component) pairs carrying each kind of design variable
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesignSets {
    /// Pairs with a capacity variable
    pub capacity: IndexSet<LocationComponent>,
    /// Pairs whose capacity is a whole number of plant units
    pub discrete: IndexSet<LocationComponent>,
    /// Pairs with a build decision
    pub decision: IndexSet<LocationComponent>,
}

impl DesignSets {
    /// Build the design sets from the eligible locations of each component
    pub fn new<'a, I>(components: I) -> Self
    where
        I: IntoIterator<Item = (&'a ComponentID, &'a Design)>,
    {
        let mut sets = Self::default();
        for (id, design) in components {
            if !design.has_capacity_variable {
                continue;
            }
            for loc in &design.eligibility {
                let key = (loc.clone(), id.clone());
                if design.capacity_domain == CapacityDomain::Discrete {
                    sets.discrete.insert(key.clone());
                }
                if design.has_is_built_binary_variable {
                    sets.decision.insert(key.clone());
                }
                sets.capacity.insert(key);
            }
        }

        sets
    }
}

/// Handles to the design variables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesignVariables {
    /// Installed capacity
    pub capacity: IndexMap<LocationComponent, Variable>,
    /// Number of installed plant units
    pub plant_units: IndexMap<LocationComponent, Variable>,
    /// Build decision
    pub is_built: IndexMap<LocationComponent, Variable>,
}

impl DesignVariables {
    /// Add the design variables to the problem.
    ///
    /// Capacity bounds come from `capacity_min` (unless a build decision enforces it) and
    /// `capacity_max`.
    pub fn declare(
        sets: &DesignSets,
        designs: &IndexMap<ComponentID, &Design>,
        problem: &mut Problem,
        options: &OptimisationOptions,
    ) -> Self {
        let mut variables = Self::default();
        for key in &sets.capacity {
            let (loc, id) = key;
            let design = designs[id];
            let min = if sets.decision.contains(key) {
                0.0
            } else {
                design.capacity_min.get(loc).copied().unwrap_or(0.0)
            };
            let max = design.capacity_max.get(loc).copied().unwrap_or(f64::INFINITY);
            let var = problem.add_variable(min, max, VariableKind::Continuous);
            variables.capacity.insert(key.clone(), var);
        }
        for key in &sets.discrete {
            let var = problem.add_variable(0.0, f64::INFINITY, VariableKind::Integer);
            variables.plant_units.insert(key.clone(), var);
        }
        for key in &sets.decision {
            let kind = if options.relax_is_built_binary {
                VariableKind::Continuous
            } else {
                VariableKind::Binary
            };
            let var = problem.add_variable(0.0, 1.0, kind);
            variables.is_built.insert(key.clone(), var);
        }

        variables
    }
}

/// Handles to the design constraints
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesignConstraints {
    /// `capacity == plant units * capacity per plant unit`
    pub capacity_to_plant_units: IndexMap<LocationComponent, ConstraintID>,
    /// `capacity <= is built * big M`
    pub big_m: IndexMap<LocationComponent, ConstraintID>,
    /// `capacity >= capacity_min * is built`
    pub capacity_min_decision: IndexMap<LocationComponent, ConstraintID>,
    /// `capacity == capacity_fix`
    pub capacity_fix: IndexMap<LocationComponent, ConstraintID>,
    /// `is built == is_built_fix`
    pub is_built_fix: IndexMap<LocationComponent, ConstraintID>,
}

impl DesignConstraints {
    /// Add the design constraints to the problem
    pub fn declare(
        sets: &DesignSets,
        variables: &DesignVariables,
        designs: &IndexMap<ComponentID, &Design>,
        problem: &mut Problem,
    ) -> Self {
        let mut constraints = Self::default();

        for (key, units) in &variables.plant_units {
            let cap = variables.capacity[key];
            let per_unit = designs[&key.1].capacity_per_plant_unit;
            let id = problem.add_equality(0.0, [(cap, 1.0), (*units, -per_unit)]);
            constraints.capacity_to_plant_units.insert(key.clone(), id);
        }

        for key in &sets.decision {
            let (loc, id) = key;
            let design = designs[id];
            let cap = variables.capacity[key];
            let bin = variables.is_built[key];
            if let Some(big_m) = design.big_m {
                let row = problem.add_upper_bound(0.0, [(cap, 1.0), (bin, -big_m)]);
                constraints.big_m.insert(key.clone(), row);
            }
            if let Some(min) = design.capacity_min.get(loc) {
                let row = problem.add_lower_bound(0.0, [(cap, 1.0), (bin, -min)]);
                constraints.capacity_min_decision.insert(key.clone(), row);
            }
            if let Some(fix) = design.is_built_fix.get(loc) {
                let value = if *fix { 1.0 } else { 0.0 };
                let row = problem.add_equality(value, [(bin, 1.0)]);
                constraints.is_built_fix.insert(key.clone(), row);
            }
        }

        for (key, cap) in &variables.capacity {
            let (loc, id) = key;
            if let Some(fix) = designs[id].capacity_fix.get(loc) {
                let row = problem.add_equality(*fix, [(*cap, 1.0)]);
                constraints.capacity_fix.insert(key.clone(), row);
            }
        }

        constraints
    }
}

/// Objective terms for capital and fixed operating costs
pub fn objective_contribution(
    variables: &DesignVariables,
    designs: &IndexMap<ComponentID, &Design>,
) -> Vec<(Variable, f64)> {
    let capacity_terms = variables.capacity.iter().map(|((loc, id), var)| {
        let design = designs[id];
        let coeff = design.invest_per_capacity[loc] * design.capital_charge_factor[loc]
            + design.opex_per_capacity[loc];
        (*var, coeff)
    });
    let decision_terms = variables.is_built.iter().map(|((loc, id), var)| {
        let design = designs[id];
        let coeff = design.invest_if_built[loc] * design.capital_charge_factor[loc]
            + design.opex_if_built[loc];
        (*var, coeff)
    });

    capacity_terms.chain(decision_terms).collect()
}

/// Optimal values of the design variables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesignResults {
    /// Optimal capacity per component and location
    pub capacity: IndexMap<ComponentID, IndexMap<LocationID, f64>>,
    /// Optimal build decision per component and location
    pub is_built: IndexMap<ComponentID, IndexMap<LocationID, f64>>,
    /// Design rows of the summary table
    pub summary: Summary,
}

impl DesignResults {
    /// Read the optimal design and its costs from a solution.
    ///
    /// `capacity_unit` is the unit of capacity of each component, e.g. `GW_el*h` for storage.
    pub fn extract(
        system: &EnergySystem,
        variables: &DesignVariables,
        designs: &IndexMap<ComponentID, &Design>,
        capacity_unit: &IndexMap<ComponentID, String>,
        solution: &Solution,
    ) -> Self {
        let mut results = Self::default();
        let cost = |suffix: &str| format!("[{}{suffix}]", system.cost_unit);

        for ((loc, id), var) in &variables.capacity {
            let design = designs[id];
            let capacity = solution.value(*var);
            let is_built = variables
                .is_built
                .get(&(loc.clone(), id.clone()))
                .map(|bin| solution.value(*bin));
            let crf = design.capital_charge_factor[loc];

            let invest_cap = capacity * design.invest_per_capacity[loc];
            let invest_bin = is_built.map_or(0.0, |bin| bin * design.invest_if_built[loc]);
            let capex_cap = invest_cap * crf;
            let capex_bin = invest_bin * crf;
            let opex_cap = capacity * design.opex_per_capacity[loc];
            let opex_bin = is_built.map_or(0.0, |bin| bin * design.opex_if_built[loc]);
            // Without a build decision, a component counts as built if it has capacity
            let built = is_built.unwrap_or(if capacity > 0.0 { 1.0 } else { 0.0 });

            results
                .capacity
                .entry(id.clone())
                .or_default()
                .insert(loc.clone(), capacity);
            if let Some(bin) = is_built {
                results
                    .is_built
                    .entry(id.clone())
                    .or_default()
                    .insert(loc.clone(), bin);
            }

            let unit = format!("[{}]", capacity_unit[id]);
            let rows = [
                (SummaryProperty::Capacity, unit, capacity),
                (SummaryProperty::IsBuilt, "[-]".to_string(), built),
                (SummaryProperty::Invest, cost(""), invest_cap + invest_bin),
                (SummaryProperty::CapexCap, cost("/a"), capex_cap),
                (SummaryProperty::CapexIfBuilt, cost("/a"), capex_bin),
                (SummaryProperty::OpexCap, cost("/a"), opex_cap),
                (SummaryProperty::OpexIfBuilt, cost("/a"), opex_bin),
                (
                    SummaryProperty::Tac,
                    cost("/a"),
                    capex_cap + capex_bin + opex_cap + opex_bin,
                ),
            ];
            for (property, unit, value) in rows {
                results
                    .summary
                    .set(SummaryKey::new(id, property, &unit), loc, value);
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::DesignParameters;
    use crate::fixture::energy_system;
    use crate::solver::Sense;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn design(system: &EnergySystem, params: &DesignParameters) -> Design {
        Design::new(system, &"battery".into(), params, None).unwrap()
    }

    #[rstest]
    fn test_design_sets(energy_system: EnergySystem) {
        let continuous = design(&energy_system, &DesignParameters::default());
        let discrete = design(
            &energy_system,
            &DesignParameters {
                capacity_variable_domain: CapacityDomain::Discrete,
                has_is_built_binary_variable: true,
                big_m: Some(100.0),
                ..DesignParameters::default()
            },
        );
        let a: ComponentID = "a".into();
        let b: ComponentID = "b".into();
        let sets = DesignSets::new([(&a, &continuous), (&b, &discrete)]);
        assert_eq!(sets.capacity.len(), 4);
        assert_eq!(sets.discrete.len(), 2);
        assert_eq!(sets.decision.len(), 2);
        assert!(sets.decision.iter().all(|(_, id)| *id == b));
    }

    #[rstest]
    fn test_discrete_capacity(energy_system: EnergySystem) {
        let params = DesignParameters {
            capacity_variable_domain: CapacityDomain::Discrete,
            capacity_per_plant_unit: 2.0,
            capacity_min: Some(3.0.into()),
            invest_per_capacity: 1.0.into(),
            ..DesignParameters::default()
        };
        let design = design(&energy_system, &params);
        let id: ComponentID = "battery".into();
        let designs = IndexMap::from([(id.clone(), &design)]);
        let sets = DesignSets::new([(&id, &design)]);

        let mut problem = Problem::default();
        let variables =
            DesignVariables::declare(&sets, &designs, &mut problem, &OptimisationOptions::default());
        let constraints = DesignConstraints::declare(&sets, &variables, &designs, &mut problem);
        assert_eq!(constraints.capacity_to_plant_units.len(), 2);
        for (var, coeff) in objective_contribution(&variables, &designs) {
            problem.add_objective_term(var, coeff);
        }

        let solution = problem.solve(Sense::Minimise).unwrap();
        for var in variables.capacity.values() {
            assert_approx_eq!(f64, solution.value(*var), 4.0, epsilon = 1e-8);
        }
    }

    #[rstest]
    fn test_build_decision_costs(energy_system: EnergySystem) {
        let params = DesignParameters {
            has_is_built_binary_variable: true,
            big_m: Some(50.0),
            capacity_min: Some(2.0.into()),
            is_built_fix: Some(true.into()),
            invest_if_built: 10.0.into(),
            opex_if_built: 1.0.into(),
            opex_per_capacity: 0.5.into(),
            interest_rate: 0.0.into(),
            ..DesignParameters::default()
        };
        let design = design(&energy_system, &params);
        let id: ComponentID = "battery".into();
        let designs = IndexMap::from([(id.clone(), &design)]);
        let sets = DesignSets::new([(&id, &design)]);

        let mut problem = Problem::default();
        let variables =
            DesignVariables::declare(&sets, &designs, &mut problem, &OptimisationOptions::default());
        DesignConstraints::declare(&sets, &variables, &designs, &mut problem);
        for (var, coeff) in objective_contribution(&variables, &designs) {
            problem.add_objective_term(var, coeff);
        }

        let solution = problem.solve(Sense::Minimise).unwrap();
        // Per location: 10 / 10 years + 1 if built, plus 0.5 * 2 for the minimum capacity
        assert_approx_eq!(f64, solution.objective_value(), 6.0, epsilon = 1e-8);

        let units = IndexMap::from([(id.clone(), "GW_el*h".to_string())]);
        let results = DesignResults::extract(&energy_system, &variables, &designs, &units, &solution);
        let north = "north".into();
        assert_approx_eq!(f64, results.capacity[&id][&north], 2.0, epsilon = 1e-8);
        assert_approx_eq!(f64, results.is_built[&id][&north], 1.0, epsilon = 1e-8);
        assert_approx_eq!(
            f64,
            results
                .summary
                .value(&id, SummaryProperty::Tac, &north)
                .unwrap(),
            3.0,
            epsilon = 1e-8
        );
    }
}
