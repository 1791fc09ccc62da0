//! Optimal values of the storage model.
use super::{Storage, StorageVariables, designs};
use crate::component::design::DesignResults;
use crate::component::ComponentID;
use crate::energy_system::EnergySystem;
use crate::error::{ConsistencyWarning, Direction, emit_warning};
use crate::location::LocationID;
use crate::solver::Solution;
use crate::summary::{Summary, SummaryKey, SummaryProperty};
use crate::temporal::{Aggregation, Segmentation, TemporalMode, TimeStructure};
use anyhow::{Result, ensure};
use indexmap::IndexMap;
use itertools::Itertools;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Operation values smaller than this are treated as zero when checking for simultaneous charge
/// and discharge
const OPERATION_TOLERANCE: f64 = 1e-5;

/// Optimal values of design variables per component and location
pub type DesignValues = IndexMap<ComponentID, IndexMap<LocationID, f64>>;

/// Optimal time series per component and location over the chronological horizon
pub type OperationValues = IndexMap<ComponentID, IndexMap<LocationID, Vec<f64>>>;

/// The names under which optimal values can be requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
#[strum(serialize_all = "camelCase")]
pub enum OptimalValueName {
    /// Installed capacities
    CapacityVariablesOptimum,
    /// Build decisions
    IsBuiltVariablesOptimum,
    /// Charged amounts
    ChargeOperationVariablesOptimum,
    /// Discharged amounts
    DischargeOperationVariablesOptimum,
    /// States of charge
    StateOfChargeOperationVariablesOptimum,
}

/// The values behind an [`OptimalValueName`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptimalValues<'a> {
    /// One value per component and location
    Design(&'a DesignValues),
    /// One series per component and location
    Operation(&'a OperationValues),
}

/// Optimal values together with whether they vary over time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimalValue<'a> {
    /// The values
    pub values: OptimalValues<'a>,
    /// Whether the values are time series
    pub time_dependent: bool,
}

/// Results of the storage model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorageResults {
    /// Installed capacity
    pub capacity: DesignValues,
    /// Build decisions
    pub is_built: DesignValues,
    /// Charged amount per original time step
    pub charge: OperationValues,
    /// Discharged amount per original time step
    pub discharge: OperationValues,
    /// State of charge at the start of each original time step
    pub state_of_charge: OperationValues,
    /// Upward state of charge offset at each period boundary, for pairs which allow it
    pub soc_offset_up: OperationValues,
    /// Downward state of charge offset at each period boundary, for pairs which allow it
    pub soc_offset_down: OperationValues,
    /// Summary table
    pub summary: Summary,
}

impl StorageResults {
    /// Read the results from a solution, recording a warning for every component which charges
    /// and discharges at the same time
    pub fn extract(
        system: &EnergySystem,
        components: &IndexMap<ComponentID, Storage>,
        variables: &StorageVariables,
        solution: &Solution,
        warnings: &mut Vec<ConsistencyWarning>,
    ) -> Self {
        let designs = designs(components);
        let capacity_units: IndexMap<ComponentID, String> = components
            .iter()
            .map(|(id, storage)| (id.clone(), format!("{}*h", storage.commodity_unit)))
            .collect();
        let design = DesignResults::extract(
            system,
            &variables.design,
            &designs,
            &capacity_units,
            solution,
        );

        let mut results = Self {
            capacity: design.capacity,
            is_built: design.is_built,
            summary: design.summary,
            ..Self::default()
        };

        let time = &system.time;
        let steps = time.modelled_steps();
        for ((loc, id), vars) in &variables.pairs {
            let storage = &components[id];
            let values = |direction| {
                time.time_set()
                    .map(|(p, t)| solution.value(vars.operation(direction, p, t)))
                    .collect_vec()
            };
            let charge = values(Direction::Charge);
            let discharge = values(Direction::Discharge);
            results.add_operation_summary(system, storage, loc, &charge, &discharge);

            let soc = match time.mode() {
                TemporalMode::Full => (0..steps)
                    .map(|t| solution.value(vars.soc(0, t)))
                    .collect_vec(),
                TemporalMode::Aggregated(aggregation) => {
                    let inter = vars
                        .soc_inter
                        .iter()
                        .flatten()
                        .map(|var| solution.value(*var))
                        .collect_vec();
                    let intra = time
                        .time_set()
                        .map(|(p, t)| solution.value(vars.soc(p, t)))
                        .collect_vec();
                    reconstruct_state_of_charge(aggregation, &inter, &intra)
                }
            };

            for (map, series) in [
                (&mut results.charge, expand_operation(time, &charge)),
                (&mut results.discharge, expand_operation(time, &discharge)),
                (&mut results.state_of_charge, soc),
            ] {
                map.entry(id.clone()).or_default().insert(loc.clone(), series);
            }
            for (map, offsets) in [
                (&mut results.soc_offset_up, &vars.offset_up),
                (&mut results.soc_offset_down, &vars.offset_down),
            ] {
                let Some(offsets) = offsets else {
                    continue;
                };
                let values = offsets.iter().map(|var| solution.value(*var)).collect();
                map.entry(id.clone()).or_default().insert(loc.clone(), values);
            }
        }

        for (id, storage) in components {
            if results.charges_and_discharges_simultaneously(id) {
                let warning = ConsistencyWarning::SimultaneousChargeDischarge {
                    component: storage.id.clone(),
                };
                emit_warning(warning, system.verbose, warnings);
            }
        }

        results.summary.accumulate_total_annual_cost(&[
            SummaryProperty::OpexCharge,
            SummaryProperty::OpexDischarge,
        ]);
        results.summary.sort();

        results
    }

    /// Add the operation rows of a (location, component) pair to the summary
    fn add_operation_summary(
        &mut self,
        system: &EnergySystem,
        storage: &Storage,
        location: &LocationID,
        charge: &[f64],
        discharge: &[f64],
    ) {
        let time = &system.time;
        let years = time.number_of_years();
        let id = &storage.id;
        let unit = &storage.commodity_unit;
        let cost_per_year = format!("[{}/a]", system.cost_unit);

        for (direction, values, operation, opex) in [
            (
                Direction::Charge,
                charge,
                SummaryProperty::OperationCharge,
                SummaryProperty::OpexCharge,
            ),
            (
                Direction::Discharge,
                discharge,
                SummaryProperty::OperationDischarge,
                SummaryProperty::OpexDischarge,
            ),
        ] {
            let total: f64 = time
                .time_set()
                .zip(values)
                .map(|((p, _), value)| value * time.period_occurrences(p))
                .sum();
            let cost = total * storage.opex_per_operation(direction, location) / years;

            let rows = [
                (operation, format!("[{unit}*h]"), total),
                (operation, format!("[{unit}*h/a]"), total / years),
                (opex, cost_per_year.clone(), cost),
            ];
            for (property, unit, value) in rows {
                self.summary
                    .set(SummaryKey::new(id, property, &unit), location, value);
            }
        }

        // Components without capacity variables have no design rows, but may have operating costs
        if self.summary.value(id, SummaryProperty::Tac, location).is_none() {
            let key = SummaryKey::new(id, SummaryProperty::Tac, &cost_per_year);
            self.summary.set(key, location, 0.0);
        }
    }

    fn charges_and_discharges_simultaneously(&self, id: &ComponentID) -> bool {
        let (Some(charge), Some(discharge)) = (self.charge.get(id), self.discharge.get(id)) else {
            return false;
        };

        charge.iter().any(|(loc, charge)| {
            discharge.get(loc).is_some_and(|discharge| {
                charge
                    .iter()
                    .zip(discharge)
                    .any(|(c, d)| *c > OPERATION_TOLERANCE && *d > OPERATION_TOLERANCE)
            })
        })
    }

    /// The optimal values stored under a name
    pub fn optimal_value(&self, name: OptimalValueName) -> OptimalValue<'_> {
        let values = match name {
            OptimalValueName::CapacityVariablesOptimum => OptimalValues::Design(&self.capacity),
            OptimalValueName::IsBuiltVariablesOptimum => OptimalValues::Design(&self.is_built),
            OptimalValueName::ChargeOperationVariablesOptimum => {
                OptimalValues::Operation(&self.charge)
            }
            OptimalValueName::DischargeOperationVariablesOptimum => {
                OptimalValues::Operation(&self.discharge)
            }
            OptimalValueName::StateOfChargeOperationVariablesOptimum => {
                OptimalValues::Operation(&self.state_of_charge)
            }
        };

        OptimalValue {
            values,
            time_dependent: matches!(values, OptimalValues::Operation(_)),
        }
    }

    /// All optimal values, keyed by name
    pub fn all_optimal_values(&self) -> IndexMap<OptimalValueName, OptimalValue<'_>> {
        OptimalValueName::iter()
            .map(|name| (name, self.optimal_value(name)))
            .collect()
    }
}

/// Number of original time steps covered by each modelled step of a typical period
fn step_lengths(aggregation: &Aggregation, typical: usize) -> Vec<usize> {
    match &aggregation.segmentation {
        Some(segmentation) => segmentation.time_steps_per_segment[typical].clone(),
        None => vec![1; aggregation.time_steps_per_period],
    }
}

/// Expand modelled operation values (indexed by `period * steps + step`) to the original time
/// steps of the chronological horizon.
///
/// An operation variable of a segment holds the amount over the whole segment, so its value is
/// divided evenly between the time steps the segment covers instead of being repeated. The total
/// over the horizon is unchanged by the expansion.
fn expand_operation(time: &TimeStructure, values: &[f64]) -> Vec<f64> {
    let TemporalMode::Aggregated(aggregation) = time.mode() else {
        return values.to_vec();
    };

    let steps = time.modelled_steps();
    let mut expanded = Vec::with_capacity(time.total_time_steps());
    for typical in &aggregation.periods_order {
        for (step, length) in step_lengths(aggregation, *typical).into_iter().enumerate() {
            let value = values[typical * steps + step] / length as f64;
            expanded.extend(std::iter::repeat_n(value, length));
        }
    }

    expanded
}

/// Combine inter-period and intra-period state of charge into a chronological series.
///
/// `inter[k]` is the level at the start of chronological period `k` and `intra` holds the values
/// at the start of each modelled step, indexed by `period * steps + step`. Within a segment, the
/// value at its start is repeated.
pub fn reconstruct_state_of_charge(
    aggregation: &Aggregation,
    inter: &[f64],
    intra: &[f64],
) -> Vec<f64> {
    let steps = aggregation
        .segmentation
        .as_ref()
        .map_or(aggregation.time_steps_per_period, Segmentation::segments_per_period);

    let mut soc = Vec::new();
    for (k, typical) in aggregation.periods_order.iter().enumerate() {
        for (step, length) in step_lengths(aggregation, *typical).into_iter().enumerate() {
            let value = inter[k] + intra[typical * steps + step];
            soc.extend(std::iter::repeat_n(value, length));
        }
    }

    soc
}

/// Split a chronological state of charge series into inter-period and intra-period values.
///
/// This is the inverse of [`reconstruct_state_of_charge`] for series whose intra-period values
/// start every period at zero. Intra-period values are taken from the first chronological period
/// represented by each typical period.
pub fn decompose_state_of_charge(
    aggregation: &Aggregation,
    soc: &[f64],
) -> Result<(Vec<f64>, Vec<f64>)> {
    let period_length = aggregation.time_steps_per_period;
    ensure!(
        soc.len() == aggregation.periods_order.len() * period_length,
        "State of charge series has {} values, expected {}",
        soc.len(),
        aggregation.periods_order.len() * period_length
    );

    let inter = soc.iter().step_by(period_length).copied().collect_vec();
    let mut intra = Vec::new();
    for typical in 0..aggregation.typical_periods {
        let lengths = step_lengths(aggregation, typical);
        let Some(k) = aggregation.periods_order.iter().position(|p| *p == typical) else {
            intra.extend(std::iter::repeat_n(0.0, lengths.len()));
            continue;
        };

        let mut start = k * period_length;
        for length in lengths {
            intra.push(soc[start] - inter[k]);
            start += length;
        }
    }

    Ok((inter, intra))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::segmented_time;
    use rstest::rstest;
    use std::str::FromStr;

    #[test]
    fn test_optimal_value_names() {
        assert_eq!(
            OptimalValueName::StateOfChargeOperationVariablesOptimum.to_string(),
            "stateOfChargeOperationVariablesOptimum"
        );
        assert_eq!(
            OptimalValueName::from_str("isBuiltVariablesOptimum").unwrap(),
            OptimalValueName::IsBuiltVariablesOptimum
        );
        assert!(OptimalValueName::from_str("unknown").is_err());
    }

    #[test]
    fn test_optimal_values() {
        let results = StorageResults::default();
        let all = results.all_optimal_values();
        assert_eq!(all.len(), 5);
        assert!(!all[&OptimalValueName::CapacityVariablesOptimum].time_dependent);
        assert!(all[&OptimalValueName::ChargeOperationVariablesOptimum].time_dependent);
    }

    #[rstest]
    fn test_expand_operation(segmented_time: TimeStructure) {
        // Typical periods [0, 1] with segments [3, 1] and [1, 3], order [0, 0, 1]
        let values = [3.0, 1.0, 2.0, 6.0];
        let expanded = expand_operation(&segmented_time, &values);
        assert_eq!(
            expanded,
            [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0]
        );
        // Two occurrences of typical period 0 and one of typical period 1
        let modelled_total = 2.0 * (3.0 + 1.0) + 2.0 + 6.0;
        assert_eq!(expanded.iter().sum::<f64>(), modelled_total);
    }

    #[rstest]
    fn test_reconstruct_state_of_charge(segmented_time: TimeStructure) {
        let aggregation = segmented_time.aggregation().unwrap();
        let inter = [1.0, 2.0, 3.0, 1.0];
        let intra = [0.0, 0.5, 0.0, -0.5];
        let soc = reconstruct_state_of_charge(aggregation, &inter, &intra);
        assert_eq!(
            soc,
            [1.0, 1.0, 1.0, 1.5, 2.0, 2.0, 2.0, 2.5, 3.0, 2.5, 2.5, 2.5]
        );

        let (inter_again, intra_again) = decompose_state_of_charge(aggregation, &soc).unwrap();
        assert_eq!(inter_again, inter[..3]);
        assert_eq!(intra_again, intra);
        assert_eq!(
            reconstruct_state_of_charge(aggregation, &inter_again, &intra_again),
            soc
        );
    }

    #[test]
    fn test_decompose_unsegmented() {
        let aggregation = Aggregation {
            time_steps_per_period: 2,
            typical_periods: 2,
            periods_order: vec![1, 1],
            segmentation: None,
        };
        let (inter, intra) = decompose_state_of_charge(&aggregation, &[4.0, 5.0, 6.0, 7.0]).unwrap();
        assert_eq!(inter, [4.0, 6.0]);
        // Typical period 0 never occurs
        assert_eq!(intra, [0.0, 0.0, 0.0, 1.0]);

        assert!(decompose_state_of_charge(&aggregation, &[1.0]).is_err());
    }

    #[test]
    fn test_step_lengths() {
        let aggregation = Aggregation {
            time_steps_per_period: 3,
            typical_periods: 1,
            periods_order: vec![0],
            segmentation: Some(Segmentation {
                time_steps_per_segment: vec![vec![2, 1]],
            }),
        };
        assert_eq!(step_lengths(&aggregation, 0), [2, 1]);
    }
}
