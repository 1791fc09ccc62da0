//! The raw region-level data used to compare regions.
use crate::component::ComponentID;
use crate::location::LocationID;
use anyhow::{Result, bail, ensure};
use indexmap::{IndexMap, IndexSet};
use ndarray::{Array2, Array3, ArrayView1, ArrayView2, Axis};

/// A variable of the dataset. Entries of components to which the variable does not apply are
/// NaN.
#[derive(Debug, Clone, PartialEq)]
pub enum SpatialVariable {
    /// Values indexed by `[component, region, time step]`
    TimeSeries(Array3<f64>),
    /// Values indexed by `[component, region]`
    Scalar(Array2<f64>),
    /// Values between pairs of regions, indexed by `[component, region, column region]`
    Connectivity {
        /// The values
        values: Array3<f64>,
        /// The order of regions along the last axis
        column_regions: Vec<LocationID>,
    },
}

/// Regions, components and the variables describing them
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialDataset {
    regions: IndexSet<LocationID>,
    components: Vec<ComponentID>,
    variables: IndexMap<String, SpatialVariable>,
}

impl SpatialDataset {
    /// Create a dataset without variables
    pub fn new<R, C>(regions: R, components: C) -> Result<Self>
    where
        R: IntoIterator<Item = LocationID>,
        C: IntoIterator<Item = ComponentID>,
    {
        let mut region_set = IndexSet::new();
        for region in regions {
            let duplicate = region.clone();
            ensure!(region_set.insert(region), "Duplicate region {duplicate}");
        }
        ensure!(
            region_set.len() >= 2,
            "At least two regions are needed to compare regions"
        );

        Ok(Self {
            regions: region_set,
            components: components.into_iter().collect(),
            variables: IndexMap::new(),
        })
    }

    /// Add a variable, checking that its shape matches the regions and components
    pub fn add_variable(&mut self, name: &str, variable: SpatialVariable) -> Result<()> {
        ensure!(
            !self.variables.contains_key(name),
            "Variable {name} has already been added"
        );
        let n_components = self.components.len();
        let n_regions = self.regions.len();
        let shape_error = |shape: &[usize]| {
            format!(
                "Variable {name} has shape {shape:?}, which does not match {n_components} \
                components and {n_regions} regions"
            )
        };

        match &variable {
            SpatialVariable::TimeSeries(values) => {
                let shape = values.shape();
                ensure!(
                    shape[0] == n_components && shape[1] == n_regions && shape[2] > 0,
                    shape_error(shape)
                );
            }
            SpatialVariable::Scalar(values) => {
                let shape = values.shape();
                ensure!(
                    shape[0] == n_components && shape[1] == n_regions,
                    shape_error(shape)
                );
            }
            SpatialVariable::Connectivity {
                values,
                column_regions,
            } => {
                let shape = values.shape();
                ensure!(
                    shape[0] == n_components && shape[1] == n_regions && shape[2] == n_regions,
                    shape_error(shape)
                );
                let columns: IndexSet<_> = column_regions.iter().collect();
                ensure!(
                    columns.len() == n_regions && self.regions.iter().all(|r| columns.contains(r)),
                    "Column regions of variable {name} must list every region once"
                );
            }
        }

        self.variables.insert(name.to_string(), variable);
        Ok(())
    }

    /// The regions, in row order
    pub fn regions(&self) -> &IndexSet<LocationID> {
        &self.regions
    }

    /// The components, in the order of the first axis of every variable
    pub fn components(&self) -> &[ComponentID] {
        &self.components
    }

    /// The variables, keyed by name
    pub fn variables(&self) -> &IndexMap<String, SpatialVariable> {
        &self.variables
    }
}

/// Whether a variable applies to a component: true if all its values are numbers, false if all
/// are NaN
pub(super) fn applies_to(name: &str, component: &ComponentID, values: &[f64]) -> Result<bool> {
    let nan_count = values.iter().filter(|v| v.is_nan()).count();
    match nan_count {
        0 => Ok(true),
        n if n == values.len() => Ok(false),
        _ => bail!("Variable {name} is only partly given for component {component}"),
    }
}

/// The components a variable applies to, with their index along the component axis
pub(super) fn valid_components<'a, F>(
    name: &str,
    components: &'a [ComponentID],
    values_of: F,
) -> Result<Vec<(usize, &'a ComponentID)>>
where
    F: Fn(usize) -> Vec<f64>,
{
    let mut valid = Vec::new();
    for (index, component) in components.iter().enumerate() {
        if applies_to(name, component, &values_of(index))? {
            valid.push((index, component));
        }
    }

    Ok(valid)
}

/// All values of one component of a 3D variable
pub(super) fn component_values_3d(values: &Array3<f64>, index: usize) -> Vec<f64> {
    values.index_axis(Axis(0), index).iter().copied().collect()
}

/// All values of one component of a scalar variable
pub(super) fn component_values_2d(values: &Array2<f64>, index: usize) -> Vec<f64> {
    let row: ArrayView1<f64> = values.index_axis(Axis(0), index);
    row.to_vec()
}

/// Reorder the columns of a connectivity matrix from `column_regions` to `regions`
pub(super) fn reorder_columns(
    matrix: ArrayView2<f64>,
    column_regions: &[LocationID],
    regions: &IndexSet<LocationID>,
) -> Array2<f64> {
    let order: Vec<usize> = regions
        .iter()
        .filter_map(|region| column_regions.iter().position(|r| r == region))
        .collect();
    matrix.select(Axis(1), &order)
}
