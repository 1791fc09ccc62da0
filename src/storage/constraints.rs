//! Constraints of the storage model.
//!
//! All state of charge (SOC) constraints decay the stored amount by `(1 - self_discharge)^hours`.
//! Under time series aggregation the SOC is split into an inter-period level at the start of each
//! chronological period and an intra-period deviation modelled within the typical periods.
use super::{PairVariables, Storage, StorageSets, StorageVariables, designs};
use crate::component::design::DesignConstraints;
use crate::component::{ComponentID, LocationComponent};
use crate::energy_system::EnergySystem;
use crate::error::Direction;
use crate::solver::{ConstraintID, Problem, Variable};
use crate::temporal::{Aggregation, TemporalMode};
use indexmap::IndexMap;

/// Constraint IDs of one group, per (location, component) pair
pub type ConstraintGroup = IndexMap<LocationComponent, Vec<ConstraintID>>;

/// Handles to the constraints of the storage model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorageConstraints {
    /// SOC continuity between consecutive time steps
    pub connect_soc: ConstraintGroup,
    /// The SOC at the end of the horizon equals the SOC at its start, up to offsets
    pub cyclic_state: ConstraintGroup,
    /// Limit on charged energy from the cyclic lifetime
    pub cyclic_lifetime: ConstraintGroup,
    /// Inter-period SOC continuity between chronological periods
    pub inter_soc: ConstraintGroup,
    /// The intra-period SOC starts every typical period at zero
    pub intra_soc_start: ConstraintGroup,
    /// The inter-period SOC is equal for all periods of periodical storages
    pub equal_inter_soc: ConstraintGroup,
    /// Upper SOC bounds at full resolution
    pub soc_max: ConstraintGroup,
    /// Lower SOC bounds at full resolution
    pub soc_min: ConstraintGroup,
    /// Intra-period SOC below the period maximum
    pub soc_intra_max: ConstraintGroup,
    /// Intra-period SOC above the period minimum
    pub soc_intra_min: ConstraintGroup,
    /// Upper SOC bounds from the period maxima
    pub soc_max_simple: ConstraintGroup,
    /// Lower SOC bounds from the period minima
    pub soc_min_simple: ConstraintGroup,
    /// Upper SOC bounds at every aggregated time step
    pub soc_max_precise: ConstraintGroup,
    /// Lower SOC bounds at every aggregated time step
    pub soc_min_precise: ConstraintGroup,
    /// Operation limits of charging
    pub charge_operation: ConstraintGroup,
    /// Operation limits of discharging
    pub discharge_operation: ConstraintGroup,
    /// Minimum part load of charging
    pub charge_part_load: ConstraintGroup,
    /// Minimum part load of discharging
    pub discharge_part_load: ConstraintGroup,
    /// Design constraints
    pub design: DesignConstraints,
}

/// Everything needed to write constraints for one (location, component) pair
struct PairContext<'a> {
    system: &'a EnergySystem,
    key: &'a LocationComponent,
    storage: &'a Storage,
    vars: &'a PairVariables,
    capacity: Option<Variable>,
}

impl PairContext<'_> {
    /// Remaining fraction of the SOC after `hours`
    fn retention(&self, hours: f64) -> f64 {
        (1.0 - self.storage.self_discharge).powf(hours)
    }

    /// Terms `up - down` of the offsets at a boundary
    fn offset_terms(&self, index: usize) -> Vec<(Variable, f64)> {
        let [up, down] = self.vars.offsets(index);
        up.map(|var| (var, 1.0))
            .into_iter()
            .chain(down.map(|var| (var, -1.0)))
            .collect()
    }

    fn soc_inter(&self) -> &[Variable] {
        self.vars.soc_inter.as_deref().unwrap_or_default()
    }
}

fn push(group: &mut ConstraintGroup, key: &LocationComponent, id: ConstraintID) {
    group.entry(key.clone()).or_default().push(id);
}

impl StorageConstraints {
    /// Add the storage constraints to the problem
    pub fn declare(
        system: &EnergySystem,
        sets: &StorageSets,
        variables: &StorageVariables,
        components: &IndexMap<ComponentID, Storage>,
        problem: &mut Problem,
    ) -> Self {
        let designs = designs(components);
        let mut constraints = Self {
            design: DesignConstraints::declare(&sets.design, &variables.design, &designs, problem),
            ..Self::default()
        };

        for (key, vars) in &variables.pairs {
            let ctx = PairContext {
                system,
                key,
                storage: &components[&key.1],
                vars,
                capacity: variables.capacity(key),
            };

            constraints.connect_soc(&ctx, problem);
            if sets.cyclic_lifetime.contains(key) {
                constraints.cyclic_lifetime(&ctx, problem);
            }
            for direction in [Direction::Charge, Direction::Discharge] {
                constraints.operation(&ctx, sets, direction, problem);
                if sets.part_load.contains(key) {
                    constraints.part_load(&ctx, direction, problem);
                }
            }

            match system.time.mode() {
                TemporalMode::Full => {
                    constraints.cyclic_state_full(&ctx, problem);
                    constraints.soc_bounds_full(&ctx, problem);
                }
                TemporalMode::Aggregated(aggregation) => {
                    constraints.cyclic_state_aggregated(&ctx, problem);
                    constraints.inter_soc(&ctx, aggregation, problem);
                    constraints.intra_soc_start(&ctx, problem);
                    if sets.periodical.contains(key) {
                        constraints.equal_inter_soc(&ctx, problem);
                    }
                    if sets.simple_tsa.contains(key) {
                        constraints.soc_bounds_simple(&ctx, aggregation, problem);
                    }
                    if sets.precise_tsa.contains(key) {
                        constraints.soc_bounds_precise(&ctx, aggregation, problem);
                    }
                }
            }
        }

        constraints
    }

    /// `soc[t+1] = soc[t] * retention + charge * eta_c - discharge / eta_d`
    fn connect_soc(&mut self, ctx: &PairContext, problem: &mut Problem) {
        let storage = ctx.storage;
        for (p, t) in ctx.system.time.time_set() {
            let retention = ctx.retention(ctx.system.time.step_hours(p, t));
            let terms = [
                (ctx.vars.soc(p, t + 1), 1.0),
                (ctx.vars.soc(p, t), -retention),
                (
                    ctx.vars.operation(Direction::Charge, p, t),
                    -storage.charge_efficiency,
                ),
                (
                    ctx.vars.operation(Direction::Discharge, p, t),
                    1.0 / storage.discharge_efficiency,
                ),
            ];
            push(&mut self.connect_soc, ctx.key, problem.add_equality(0.0, terms));
        }
    }

    /// `soc[0] = soc[T] + up - down`
    fn cyclic_state_full(&mut self, ctx: &PairContext, problem: &mut Problem) {
        let last = steps(ctx);
        let mut terms = vec![(ctx.vars.soc(0, 0), 1.0), (ctx.vars.soc(0, last), -1.0)];
        terms.extend(negated(ctx.offset_terms(0)));
        push(&mut self.cyclic_state, ctx.key, problem.add_equality(0.0, terms));
    }

    /// `inter[0] = inter[P] + up[P] - down[P]`
    fn cyclic_state_aggregated(&mut self, ctx: &PairContext, problem: &mut Problem) {
        let inter = ctx.soc_inter();
        let last = ctx.system.time.periods().end;
        let mut terms = vec![(inter[0], 1.0), (inter[last], -1.0)];
        terms.extend(negated(ctx.offset_terms(last)));
        push(&mut self.cyclic_state, ctx.key, problem.add_equality(0.0, terms));
    }

    /// Charged energy per year must not exceed the usable capacity cycled over the economic
    /// lifetime
    fn cyclic_lifetime(&mut self, ctx: &PairContext, problem: &mut Problem) {
        let (Some(capacity), Some(cycles)) = (ctx.capacity, ctx.storage.cyclic_lifetime) else {
            return;
        };
        let time = &ctx.system.time;
        let years = time.number_of_years();
        let storage = ctx.storage;
        let lifetime = storage.design.economic_lifetime[&ctx.key.0];

        let mut terms: Vec<_> = time
            .time_set()
            .map(|(p, t)| {
                let var = ctx.vars.operation(Direction::Charge, p, t);
                (var, time.period_occurrences(p) / years)
            })
            .collect();
        let usable = storage.state_of_charge_max - storage.state_of_charge_min;
        terms.push((capacity, -usable * cycles / lifetime));
        push(&mut self.cyclic_lifetime, ctx.key, problem.add_upper_bound(0.0, terms));
    }

    /// Limit the operation of one flow direction by capacity or time series
    fn operation(
        &mut self,
        ctx: &PairContext,
        sets: &StorageSets,
        direction: Direction,
        problem: &mut Problem,
    ) {
        let modes = sets.modes(direction);
        let key = ctx.key;
        let loc = &key.0;
        let rates = ctx.storage.rates(direction);
        let time = &ctx.system.time;
        let steps = steps(ctx);
        let constant_rate = match direction {
            Direction::Charge => ctx.storage.charge_rate,
            Direction::Discharge => ctx.storage.discharge_rate,
        };
        let group = match direction {
            Direction::Charge => &mut self.charge_operation,
            Direction::Discharge => &mut self.discharge_operation,
        };

        for (p, t) in time.time_set() {
            let op = ctx.vars.operation(direction, p, t);
            let hours = time.step_hours(p, t);
            let fix = rates.processed_fix.as_ref().map(|ts| ts.value_at(loc, steps, p, t));
            let max = rates.processed_max.as_ref().map(|ts| ts.value_at(loc, steps, p, t));

            let row = match (ctx.capacity, fix, max) {
                (Some(cap), None, None) if modes.rate_limited.contains(key) => {
                    problem.add_upper_bound(0.0, [(op, 1.0), (cap, -constant_rate * hours)])
                }
                (Some(cap), Some(fix), _) if modes.fix_relative.contains(key) => {
                    problem.add_equality(0.0, [(op, 1.0), (cap, -fix * hours)])
                }
                (Some(cap), None, Some(max)) if modes.max_relative.contains(key) => {
                    problem.add_upper_bound(0.0, [(op, 1.0), (cap, -max * hours)])
                }
                (None, Some(fix), _) if modes.fix_absolute.contains(key) => {
                    problem.add_equality(fix, [(op, 1.0)])
                }
                (None, None, Some(max)) if modes.max_absolute.contains(key) => {
                    problem.add_upper_bound(max, [(op, 1.0)])
                }
                _ => continue,
            };
            push(group, key, row);
        }
    }

    /// `op <= bin * big M` and `op >= part_load_min * cap * hours - (1 - bin) * big M`
    fn part_load(&mut self, ctx: &PairContext, direction: Direction, problem: &mut Problem) {
        let design = &ctx.storage.design;
        let (Some(cap), Some(big_m), Some(part_load_min)) =
            (ctx.capacity, design.big_m, design.part_load_min)
        else {
            return;
        };
        let group = match direction {
            Direction::Charge => &mut self.charge_part_load,
            Direction::Discharge => &mut self.discharge_part_load,
        };

        let time = &ctx.system.time;
        for (p, t) in time.time_set() {
            let Some(bin) = ctx.vars.binary(direction, p, t) else {
                continue;
            };
            let op = ctx.vars.operation(direction, p, t);
            let hours = time.step_hours(p, t);
            let upper = problem.add_upper_bound(0.0, [(op, 1.0), (bin, -big_m)]);
            let lower = problem.add_lower_bound(
                -big_m,
                [(op, 1.0), (cap, -part_load_min * hours), (bin, -big_m)],
            );
            push(group, ctx.key, upper);
            push(group, ctx.key, lower);
        }
    }

    /// `cap * soc_min <= soc <= cap * soc_max` at every time step
    fn soc_bounds_full(&mut self, ctx: &PairContext, problem: &mut Problem) {
        let Some(cap) = ctx.capacity else {
            return;
        };
        let storage = ctx.storage;
        for (p, t) in ctx.system.time.time_set() {
            let soc = ctx.vars.soc(p, t);
            let max = problem.add_upper_bound(0.0, [(soc, 1.0), (cap, -storage.state_of_charge_max)]);
            let min = problem.add_lower_bound(0.0, [(soc, 1.0), (cap, -storage.state_of_charge_min)]);
            push(&mut self.soc_max, ctx.key, max);
            push(&mut self.soc_min, ctx.key, min);
        }
    }

    /// `inter[k+1] = inter[k] * retention(period) + soc[order[k]][T] + up[k] - down[k]`
    fn inter_soc(&mut self, ctx: &PairContext, aggregation: &Aggregation, problem: &mut Problem) {
        let inter = ctx.soc_inter();
        let retention = ctx.retention(ctx.system.time.period_hours());
        let last = steps(ctx);
        for (k, typical) in aggregation.periods_order.iter().enumerate() {
            let mut terms = vec![
                (inter[k + 1], 1.0),
                (inter[k], -retention),
                (ctx.vars.soc(*typical, last), -1.0),
            ];
            terms.extend(negated(ctx.offset_terms(k)));
            push(&mut self.inter_soc, ctx.key, problem.add_equality(0.0, terms));
        }
    }

    /// `soc[p][0] = 0` for every typical period
    fn intra_soc_start(&mut self, ctx: &PairContext, problem: &mut Problem) {
        for p in 0..ctx.system.time.modelled_periods() {
            let row = problem.add_equality(0.0, [(ctx.vars.soc(p, 0), 1.0)]);
            push(&mut self.intra_soc_start, ctx.key, row);
        }
    }

    /// `inter[k] = inter[k+1]` for every chronological period
    fn equal_inter_soc(&mut self, ctx: &PairContext, problem: &mut Problem) {
        let inter = ctx.soc_inter();
        for k in ctx.system.time.periods() {
            let row = problem.add_equality(0.0, [(inter[k], 1.0), (inter[k + 1], -1.0)]);
            push(&mut self.equal_inter_soc, ctx.key, row);
        }
    }

    /// Bound the SOC by the extreme intra-period values of each typical period
    fn soc_bounds_simple(
        &mut self,
        ctx: &PairContext,
        aggregation: &Aggregation,
        problem: &mut Problem,
    ) {
        let (Some(soc_min), Some(soc_max)) = (&ctx.vars.soc_min, &ctx.vars.soc_max) else {
            return;
        };
        let storage = ctx.storage;
        for (p, t) in ctx.system.time.time_set() {
            let soc = ctx.vars.soc(p, t);
            let max = problem.add_upper_bound(0.0, [(soc, 1.0), (soc_max[p], -1.0)]);
            let min = problem.add_lower_bound(0.0, [(soc, 1.0), (soc_min[p], -1.0)]);
            push(&mut self.soc_intra_max, ctx.key, max);
            push(&mut self.soc_intra_min, ctx.key, min);
        }

        let inter = ctx.soc_inter();
        let retention = ctx.retention(ctx.system.time.period_hours());
        for (k, typical) in aggregation.periods_order.iter().enumerate() {
            if let Some(cap) = ctx.capacity {
                let row = problem.add_upper_bound(
                    0.0,
                    [
                        (inter[k], 1.0),
                        (soc_max[*typical], 1.0),
                        (cap, -storage.state_of_charge_max),
                    ],
                );
                push(&mut self.soc_max_simple, ctx.key, row);
            }

            let mut terms = vec![(inter[k], retention), (soc_min[*typical], 1.0)];
            let rhs = match ctx.capacity {
                Some(cap) => {
                    terms.push((cap, -storage.state_of_charge_min));
                    0.0
                }
                None => storage.state_of_charge_min,
            };
            push(&mut self.soc_min_simple, ctx.key, problem.add_lower_bound(rhs, terms));
        }
    }

    /// Bound the SOC at every time step of every chronological period
    fn soc_bounds_precise(
        &mut self,
        ctx: &PairContext,
        aggregation: &Aggregation,
        problem: &mut Problem,
    ) {
        let storage = ctx.storage;
        let time = &ctx.system.time;
        let inter = ctx.soc_inter();
        for (k, typical) in aggregation.periods_order.iter().enumerate() {
            for t in 0..steps(ctx) {
                let retention = ctx.retention(time.step_start_hours(*typical, t));
                let soc = ctx.vars.soc(*typical, t);

                if let Some(cap) = ctx.capacity {
                    let row = problem.add_upper_bound(
                        0.0,
                        [
                            (inter[k], retention),
                            (soc, 1.0),
                            (cap, -storage.state_of_charge_max),
                        ],
                    );
                    push(&mut self.soc_max_precise, ctx.key, row);
                }

                let mut terms = vec![(inter[k], retention), (soc, 1.0)];
                let rhs = match ctx.capacity {
                    Some(cap) => {
                        terms.push((cap, -storage.state_of_charge_min));
                        0.0
                    }
                    None => storage.state_of_charge_min,
                };
                push(&mut self.soc_min_precise, ctx.key, problem.add_lower_bound(rhs, terms));
            }
        }
    }
}

/// Number of modelled time steps per period
fn steps(ctx: &PairContext) -> usize {
    ctx.system.time.modelled_steps()
}

fn negated(terms: Vec<(Variable, f64)>) -> impl Iterator<Item = (Variable, f64)> {
    terms.into_iter().map(|(var, coeff)| (var, -coeff))
}
