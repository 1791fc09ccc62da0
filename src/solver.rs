//! Provides data structures and functions for building and solving optimisation problems.
//!
//! Component models append variables, constraints and objective terms to a shared [`Problem`].
//! Objective coefficients can be contributed after a variable is created, so the problem is only
//! handed to the HiGHS solver once it is complete.
use anyhow::{Result, anyhow, bail};
use highs::{HighsModelStatus, RowProblem};
use indexmap::IndexMap;
use log::{debug, log_enabled};
use std::ops::RangeInclusive;

pub use highs::Sense;

/// A decision variable in the optimisation
///
/// Note that this type does **not** include the value of the variable; it just refers to a
/// particular column of the problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable(usize);

/// Refers to a particular row of the problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintID(usize);

/// The domain of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// Real-valued
    Continuous,
    /// Integer-valued
    Integer,
    /// Either 0 or 1
    Binary,
}

/// The definition of a variable to be optimised.
///
/// The coefficient is the multiplying factor of the variable in the objective function to
/// minimise, with the variable taking values between min and max.
#[derive(PartialEq, Debug, Clone)]
pub struct VariableDefinition {
    /// The variable's minimum value
    pub min: f64,
    /// The variable's maximum value
    pub max: f64,
    /// The variable's domain
    pub kind: VariableKind,
    /// The coefficient of the variable in the objective
    pub coefficient: f64,
}

/// A constraint for an optimisation.
///
/// Each constraint adds an inequality equation to the problem to solve of the form:
///
/// min <= a1*x1 + a2*x2 + ... <= max
///
/// Often, constraints will impose only a min or a max value, with the other set to infinity or
/// minus infinity.
#[derive(PartialEq, Debug, Clone)]
pub struct Constraint {
    /// The minimum value for the constraint
    pub min: f64,
    /// The maximum value for the constraint
    pub max: f64,
    /// The coefficients of the variables appearing in the constraint. Each variable appears once.
    pub terms: Vec<(Variable, f64)>,
}

impl Constraint {
    /// Create a constraint, merging repeated variables into a single term
    pub fn new<I>(bounds: RangeInclusive<f64>, terms: I) -> Self
    where
        I: IntoIterator<Item = (Variable, f64)>,
    {
        let mut merged: IndexMap<Variable, f64> = IndexMap::new();
        for (var, coeff) in terms {
            *merged.entry(var).or_default() += coeff;
        }

        Self {
            min: *bounds.start(),
            max: *bounds.end(),
            terms: merged.into_iter().collect(),
        }
    }

    /// The coefficient of a variable in this constraint (zero if absent)
    pub fn coefficient(&self, var: Variable) -> f64 {
        self.terms
            .iter()
            .find(|(v, _)| *v == var)
            .map_or(0.0, |(_, coeff)| *coeff)
    }

    /// Whether the constraint is an equality
    pub fn is_equality(&self) -> bool {
        self.min == self.max
    }

    /// Evaluate the left-hand side for a solution
    pub fn activity(&self, solution: &Solution) -> f64 {
        self.terms
            .iter()
            .map(|(var, coeff)| coeff * solution.value(*var))
            .sum()
    }
}

/// An optimisation problem under construction
#[derive(Debug, Default)]
pub struct Problem {
    variables: Vec<VariableDefinition>,
    constraints: Vec<Constraint>,
}

impl Problem {
    /// Add a variable with the given bounds and domain. Binary variables are always bounded by
    /// `[0, 1]`.
    pub fn add_variable(&mut self, min: f64, max: f64, kind: VariableKind) -> Variable {
        let (min, max) = match kind {
            VariableKind::Binary => (min.max(0.0), max.min(1.0)),
            _ => (min, max),
        };
        self.variables.push(VariableDefinition {
            min,
            max,
            kind,
            coefficient: 0.0,
        });

        Variable(self.variables.len() - 1)
    }

    /// Add a non-negative continuous variable
    pub fn add_non_negative(&mut self) -> Variable {
        self.add_variable(0.0, f64::INFINITY, VariableKind::Continuous)
    }

    /// Add a free continuous variable
    pub fn add_free(&mut self) -> Variable {
        self.add_variable(f64::NEG_INFINITY, f64::INFINITY, VariableKind::Continuous)
    }

    /// Add to the objective coefficient of a variable
    pub fn add_objective_term(&mut self, var: Variable, coefficient: f64) {
        self.variables[var.0].coefficient += coefficient;
    }

    /// Add a constraint `min <= terms <= max`
    pub fn add_constraint<I>(&mut self, bounds: RangeInclusive<f64>, terms: I) -> ConstraintID
    where
        I: IntoIterator<Item = (Variable, f64)>,
    {
        self.constraints.push(Constraint::new(bounds, terms));
        ConstraintID(self.constraints.len() - 1)
    }

    /// Add a constraint `terms == rhs`
    pub fn add_equality<I>(&mut self, rhs: f64, terms: I) -> ConstraintID
    where
        I: IntoIterator<Item = (Variable, f64)>,
    {
        self.add_constraint(rhs..=rhs, terms)
    }

    /// Add a constraint `terms <= rhs`
    pub fn add_upper_bound<I>(&mut self, rhs: f64, terms: I) -> ConstraintID
    where
        I: IntoIterator<Item = (Variable, f64)>,
    {
        self.add_constraint(f64::NEG_INFINITY..=rhs, terms)
    }

    /// Add a constraint `terms >= rhs`
    pub fn add_lower_bound<I>(&mut self, rhs: f64, terms: I) -> ConstraintID
    where
        I: IntoIterator<Item = (Variable, f64)>,
    {
        self.add_constraint(rhs..=f64::INFINITY, terms)
    }

    /// The definition of a variable
    pub fn variable(&self, var: Variable) -> &VariableDefinition {
        &self.variables[var.0]
    }

    /// A constraint of the problem
    pub fn constraint(&self, id: ConstraintID) -> &Constraint {
        &self.constraints[id.0]
    }

    /// Number of variables in the problem
    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    /// Number of constraints in the problem
    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Perform an optimisation using the HiGHS solver.
    ///
    /// # Returns
    ///
    /// The solution, or an error if the problem is infeasible, unbounded or the solver fails.
    pub fn solve(&self, sense: Sense) -> Result<Solution> {
        let mut pb = RowProblem::default();

        // Add variables
        let cols: Vec<_> = self
            .variables
            .iter()
            .map(|def| match def.kind {
                VariableKind::Continuous => pb.add_column(def.coefficient, def.min..=def.max),
                VariableKind::Integer | VariableKind::Binary => {
                    pb.add_integer_column(def.coefficient, def.min..=def.max)
                }
            })
            .collect();

        // Add constraints
        for constraint in &self.constraints {
            pb.add_row(
                constraint.min..=constraint.max,
                constraint
                    .terms
                    .iter()
                    .map(|(var, coeff)| (cols[var.0], *coeff)),
            );
        }

        debug!(
            "Solving problem with {} variables and {} constraints",
            self.num_variables(),
            self.num_constraints()
        );

        let mut model = pb.optimise(sense);
        enable_highs_logging(&mut model);

        let solved = model
            .try_solve()
            .map_err(|status| anyhow!("HiGHS failed: {status:?}"))?;
        match solved.status() {
            HighsModelStatus::Optimal => {
                let columns = solved.get_solution().columns().to_vec();
                let objective_value = self
                    .variables
                    .iter()
                    .zip(&columns)
                    .map(|(def, value)| def.coefficient * value)
                    .sum();
                Ok(Solution {
                    columns,
                    objective_value,
                })
            }
            status => bail!("Could not solve: {status:?}"),
        }
    }
}

/// Only let HiGHS write to the console when debug logging is enabled
fn enable_highs_logging(model: &mut highs::Model) {
    let enabled = log_enabled!(log::Level::Debug);
    model.set_option("output_flag", enabled);
    model.set_option("log_to_console", enabled);
}

/// The optimal values of the variables of a solved [`Problem`]
#[derive(Debug, Clone)]
pub struct Solution {
    columns: Vec<f64>,
    objective_value: f64,
}

impl Solution {
    /// The optimal value of a variable
    pub fn value(&self, var: Variable) -> f64 {
        self.columns[var.0]
    }

    /// The optimal value of the objective function
    pub fn objective_value(&self) -> f64 {
        self.objective_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_constraint_merges_terms() {
        let mut problem = Problem::default();
        let x = problem.add_non_negative();
        let y = problem.add_free();
        let id = problem.add_equality(1.0, [(x, 1.0), (y, 2.0), (x, 0.5)]);

        let constraint = problem.constraint(id);
        assert_eq!(constraint.terms.len(), 2);
        assert_eq!(constraint.coefficient(x), 1.5);
        assert_eq!(constraint.coefficient(y), 2.0);
        assert!(constraint.is_equality());
    }

    #[test]
    fn test_binary_bounds() {
        let mut problem = Problem::default();
        let b = problem.add_variable(0.0, f64::INFINITY, VariableKind::Binary);
        assert_eq!(problem.variable(b).max, 1.0);
    }

    #[test]
    fn test_solve_highs() {
        // maximise x + 2y + z  ->  minimise -(x + 2y + z)
        let mut problem = Problem::default();
        let x = problem.add_variable(0.0, 1.0, VariableKind::Continuous);
        let y = problem.add_variable(0.0, 6.0, VariableKind::Continuous);
        let z = problem.add_variable(0.0, 0.5, VariableKind::Continuous);
        problem.add_objective_term(x, -1.0);
        problem.add_objective_term(y, -2.0);
        problem.add_objective_term(z, -1.0);
        problem.add_upper_bound(6.0, [(x, 1.0), (y, 1.0)]);

        let solution = problem.solve(Sense::Minimise).unwrap();
        assert_approx_eq!(f64, solution.value(x), 0.0, epsilon = 1e-8);
        assert_approx_eq!(f64, solution.value(y), 6.0, epsilon = 1e-8);
        assert_approx_eq!(f64, solution.value(z), 0.5, epsilon = 1e-8);
        assert_approx_eq!(f64, solution.objective_value(), -12.5, epsilon = 1e-8);
    }

    #[test]
    fn test_solve_integer() {
        let mut problem = Problem::default();
        let n = problem.add_variable(0.0, f64::INFINITY, VariableKind::Integer);
        problem.add_objective_term(n, 1.0);
        problem.add_lower_bound(2.5, [(n, 1.0)]);

        let solution = problem.solve(Sense::Minimise).unwrap();
        assert_approx_eq!(f64, solution.value(n), 3.0, epsilon = 1e-8);
    }

    #[test]
    fn test_solve_infeasible() {
        let mut problem = Problem::default();
        let x = problem.add_non_negative();
        problem.add_upper_bound(-1.0, [(x, 1.0)]);

        assert!(problem.solve(Sense::Minimise).is_err());
    }
}
