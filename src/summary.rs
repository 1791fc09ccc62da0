//! The optimisation summary: cost and quantity figures per component, property, unit and location.
use crate::component::ComponentID;
use crate::location::LocationID;
use indexmap::IndexMap;
use std::fmt;
use strum::{Display, EnumIter};

/// A row label of the summary table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter)]
#[strum(serialize_all = "camelCase")]
pub enum SummaryProperty {
    /// Installed capacity
    Capacity,
    /// Build decision
    IsBuilt,
    /// Total investment
    Invest,
    /// Annualised capital cost of the capacity
    CapexCap,
    /// Annualised capital cost of the build decision
    CapexIfBuilt,
    /// Fixed operating cost of the capacity
    OpexCap,
    /// Fixed operating cost of the build decision
    OpexIfBuilt,
    /// Charged quantity
    OperationCharge,
    /// Discharged quantity
    OperationDischarge,
    /// Operating cost of charging
    OpexCharge,
    /// Operating cost of discharging
    OpexDischarge,
    /// Total annual cost
    #[strum(serialize = "TAC")]
    Tac,
}

/// Identifies a row of the summary table
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SummaryKey {
    /// The component the row refers to
    pub component: ComponentID,
    /// The reported property
    pub property: SummaryProperty,
    /// The unit of the values, e.g. `[GW_el*h/a]`
    pub unit: String,
}

impl SummaryKey {
    /// Create a new key
    pub fn new(component: &ComponentID, property: SummaryProperty, unit: &str) -> Self {
        Self {
            component: component.clone(),
            property,
            unit: unit.to_string(),
        }
    }
}

impl fmt::Display for SummaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.component, self.property, self.unit)
    }
}

/// Summary figures for each row and location
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary(IndexMap<SummaryKey, IndexMap<LocationID, f64>>);

impl Summary {
    /// Set the value of a row at a location
    pub fn set(&mut self, key: SummaryKey, location: &LocationID, value: f64) {
        self.0
            .entry(key)
            .or_default()
            .insert(location.clone(), value);
    }

    /// Add the rows of another summary, replacing duplicates
    pub fn extend(&mut self, other: Summary) {
        for (key, values) in other.0 {
            self.0.entry(key).or_default().extend(values);
        }
    }

    /// The values of a row, if present
    pub fn row(&self, key: &SummaryKey) -> Option<&IndexMap<LocationID, f64>> {
        self.0.get(key)
    }

    /// The value of a property of a component at a location, for whichever unit it is given in
    pub fn value(
        &self,
        component: &ComponentID,
        property: SummaryProperty,
        location: &LocationID,
    ) -> Option<f64> {
        self.0
            .iter()
            .find(|(key, _)| key.component == *component && key.property == property)
            .and_then(|(_, values)| values.get(location).copied())
    }

    /// Iterate over rows
    pub fn iter(&self) -> impl Iterator<Item = (&SummaryKey, &IndexMap<LocationID, f64>)> {
        self.0.iter()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the summary has no rows
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Replace every `TAC` row by the sum of itself and the `addends` rows of the same component
    pub fn accumulate_total_annual_cost(&mut self, addends: &[SummaryProperty]) {
        let totals: Vec<_> = self
            .0
            .keys()
            .filter(|key| key.property == SummaryProperty::Tac)
            .map(|tac_key| {
                let mut total = self.0[tac_key].clone();
                for (key, values) in &self.0 {
                    if key.component != tac_key.component || !addends.contains(&key.property) {
                        continue;
                    }
                    for (loc, value) in values {
                        *total.entry(loc.clone()).or_default() += value;
                    }
                }
                (tac_key.clone(), total)
            })
            .collect();

        for (key, total) in totals {
            self.0.insert(key, total);
        }
    }

    /// Sort rows by component, property and unit
    pub fn sort(&mut self) {
        self.0.sort_keys();
    }
}
