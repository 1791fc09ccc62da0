//! Preprocessing of the dataset into normalised features per variable class.
use super::dataset::{
    component_values_2d, component_values_3d, reorder_columns, valid_components,
};
use super::{SpatialDataset, SpatialVariable, VariableWeights};
use crate::component::ComponentID;
use anyhow::{Result, ensure};
use indexmap::IndexMap;
use log::debug;
use ndarray::{Array1, Array2, Axis};

/// Replaces infinite connectivity values in an affinity matrix
const INFINITE_AFFINITY: f64 = 100_000.0;

/// Normalised features of every variable, ready for computing distances
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreprocessedDataset {
    /// Number of regions
    pub n_regions: usize,
    /// Standardised `[region, time step]` matrices per time series variable and valid component
    pub time_series: IndexMap<String, IndexMap<ComponentID, Array2<f64>>>,
    /// Standardised `[region, valid component]` matrix per scalar variable
    pub scalar: IndexMap<String, Array2<f64>>,
    /// Condensed dissimilarities per connectivity variable and valid component
    pub connectivity: IndexMap<String, IndexMap<ComponentID, Array1<f64>>>,
}

/// Standardise each column to zero mean and unit (population) variance. Constant columns become
/// zero.
pub fn standardise_columns(data: &Array2<f64>) -> Array2<f64> {
    let mut standardised = data.clone();
    for mut column in standardised.columns_mut() {
        let n = column.len() as f64;
        let mean = column.sum() / n;
        let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = if variance > 0.0 { variance.sqrt() } else { 1.0 };
        column.mapv_inplace(|v| (v - mean) / std);
    }

    standardised
}

/// The position of the pair `(a, b)` with `a < b` in the condensed upper triangle of an `n x n`
/// matrix
pub fn condensed_index(n: usize, a: usize, b: usize) -> usize {
    debug_assert!(a < b && b < n);
    n * a - a * (a + 1) / 2 + (b - a - 1)
}

/// Condense a symmetric matrix with zero diagonal into its upper triangle, row by row
fn condense(name: &str, component: &ComponentID, matrix: &Array2<f64>) -> Result<Array1<f64>> {
    let n = matrix.nrows();
    let mut condensed = Vec::with_capacity(n * (n - 1) / 2);
    for a in 0..n {
        ensure!(
            matrix[[a, a]] == 0.0,
            "Connectivity of variable {name} for component {component} must have a zero diagonal"
        );
        for b in (a + 1)..n {
            ensure!(
                float_cmp::approx_eq!(f64, matrix[[a, b]], matrix[[b, a]]),
                "Connectivity of variable {name} for component {component} must be symmetric"
            );
            condensed.push(matrix[[a, b]]);
        }
    }

    Ok(Array1::from(condensed))
}

/// Fail if the values of a component contain infinity
fn ensure_finite<'a>(
    name: &str,
    component: &ComponentID,
    mut values: impl Iterator<Item = &'a f64>,
) -> Result<()> {
    ensure!(
        !values.any(|v| v.is_infinite()),
        "Variable {name} for component {component} contains infinite values"
    );

    Ok(())
}

/// Scale values to `[0, 1]`. If all values are equal, they become zero.
fn min_max_scale(values: &Array1<f64>) -> Array1<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = if max > min { max - min } else { 1.0 };
    values.mapv(|v| (v - min) / range)
}

/// Preprocess every variable of the dataset.
///
/// Connectivity is treated as similarity: it is scaled to `[0, 1]` and turned into a
/// dissimilarity `1 - v`. Infinite values cannot be scaled and are rejected.
pub fn preprocess_dataset(dataset: &SpatialDataset) -> Result<PreprocessedDataset> {
    let components = dataset.components();
    let mut preprocessed = PreprocessedDataset {
        n_regions: dataset.regions().len(),
        ..PreprocessedDataset::default()
    };

    for (name, variable) in dataset.variables() {
        match variable {
            SpatialVariable::TimeSeries(values) => {
                let valid = valid_components(name, components, |index| {
                    component_values_3d(values, index)
                })?;
                let mut features = IndexMap::new();
                for (index, id) in valid {
                    let matrix = values.index_axis(Axis(0), index).to_owned();
                    ensure_finite(name, id, matrix.iter())?;
                    features.insert(id.clone(), standardise_columns(&matrix));
                }
                preprocessed.time_series.insert(name.clone(), features);
            }
            SpatialVariable::Scalar(values) => {
                let valid = valid_components(name, components, |index| {
                    component_values_2d(values, index)
                })?;
                for (index, id) in &valid {
                    ensure_finite(name, id, values.row(*index).iter())?;
                }
                let indices: Vec<usize> = valid.iter().map(|(index, _)| *index).collect();
                let block = values.select(Axis(0), &indices).reversed_axes();
                preprocessed
                    .scalar
                    .insert(name.clone(), standardise_columns(&block));
            }
            SpatialVariable::Connectivity {
                values,
                column_regions,
            } => {
                let valid = valid_components(name, components, |index| {
                    component_values_3d(values, index)
                })?;
                let mut features = IndexMap::new();
                for (index, id) in valid {
                    let matrix = reorder_columns(
                        values.index_axis(Axis(0), index),
                        column_regions,
                        dataset.regions(),
                    );
                    ensure_finite(name, id, matrix.iter())?;
                    let similarity = min_max_scale(&condense(name, id, &matrix)?);
                    features.insert(id.clone(), similarity.mapv(|v| 1.0 - v));
                }
                preprocessed.connectivity.insert(name.clone(), features);
            }
        }
    }

    debug!(
        "Preprocessed {} time series, {} scalar and {} connectivity variables",
        preprocessed.time_series.len(),
        preprocessed.scalar.len(),
        preprocessed.connectivity.len()
    );

    Ok(preprocessed)
}

/// Add up the weighted connectivity matrices of all variables and valid components into one
/// affinity matrix for spectral clustering.
///
/// Infinite values are replaced by a large finite affinity and NaN by zero.
pub fn extract_affinity_matrix(
    dataset: &SpatialDataset,
    weights: &VariableWeights,
) -> Result<Array2<f64>> {
    let n = dataset.regions().len();
    let mut affinity = Array2::zeros((n, n));
    for (name, variable) in dataset.variables() {
        let SpatialVariable::Connectivity {
            values,
            column_regions,
        } = variable
        else {
            continue;
        };

        let weight = weights.weight(name);
        for component in values.axis_iter(Axis(0)) {
            let matrix = reorder_columns(component, column_regions, dataset.regions());
            affinity.zip_mut_with(&matrix, |acc, v| {
                let v = if v.is_nan() {
                    0.0
                } else if v.is_infinite() {
                    INFINITE_AFFINITY
                } else {
                    *v
                };
                *acc += v * weight;
            });
        }
    }

    Ok(affinity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use crate::location::LocationID;
    use float_cmp::assert_approx_eq;
    use ndarray::{Array3, array};

    fn regions() -> Vec<LocationID> {
        vec!["a".into(), "b".into(), "c".into()]
    }

    #[test]
    fn test_standardise_columns() {
        let data = array![[1.0, 5.0], [3.0, 5.0]];
        assert_eq!(standardise_columns(&data), array![[-1.0, 0.0], [1.0, 0.0]]);
    }

    #[test]
    fn test_condensed_index() {
        let n = 4;
        let pairs = [(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)];
        for (expected, (a, b)) in pairs.into_iter().enumerate() {
            assert_eq!(condensed_index(n, a, b), expected);
        }
    }

    #[test]
    fn test_min_max_scale() {
        assert_eq!(min_max_scale(&array![2.0, 4.0, 3.0]), array![0.0, 1.0, 0.5]);
        assert_eq!(min_max_scale(&array![2.0, 2.0]), array![0.0, 0.0]);
    }

    #[test]
    fn test_preprocess_dataset() {
        let mut dataset =
            SpatialDataset::new(regions(), ["wind".into(), "line".into()]).unwrap();
        let mut ts = Array3::from_elem((2, 3, 2), f64::NAN);
        ts.index_axis_mut(Axis(0), 0)
            .assign(&array![[0.0, 1.0], [1.0, 1.0], [2.0, 1.0]]);
        dataset
            .add_variable("capacity_factor", SpatialVariable::TimeSeries(ts))
            .unwrap();
        let scalar = array![[1.0, 2.0, 3.0], [f64::NAN, f64::NAN, f64::NAN]];
        dataset
            .add_variable("capacity", SpatialVariable::Scalar(scalar))
            .unwrap();
        let mut lines = Array3::from_elem((2, 3, 3), f64::NAN);
        // Columns ordered c, a, b
        lines
            .index_axis_mut(Axis(0), 1)
            .assign(&array![[2.0, 0.0, 4.0], [0.0, 4.0, 0.0], [0.0, 2.0, 0.0]]);
        dataset
            .add_variable(
                "line_capacity",
                SpatialVariable::Connectivity {
                    values: lines,
                    column_regions: vec!["c".into(), "a".into(), "b".into()],
                },
            )
            .unwrap();

        let preprocessed = preprocess_dataset(&dataset).unwrap();
        assert_eq!(preprocessed.n_regions, 3);

        let wind = &preprocessed.time_series["capacity_factor"]["wind"];
        let scale = (2.0_f64 / 3.0).sqrt();
        assert_approx_eq!(f64, wind[[0, 0]], -1.0 / scale);
        assert_approx_eq!(f64, wind[[2, 1]], 0.0);
        assert!(!preprocessed.time_series["capacity_factor"].contains_key("line"));

        assert_eq!(preprocessed.scalar["capacity"].shape(), [3, 1]);

        // Connectivity a-b 4, a-c 2, b-c 0
        assert_eq!(
            preprocessed.connectivity["line_capacity"]["line"],
            array![0.0, 0.5, 1.0]
        );
    }

    #[test]
    fn test_asymmetric_connectivity() {
        let mut dataset = SpatialDataset::new(regions(), ["line".into()]).unwrap();
        let values = array![[[0.0, 1.0, 0.0], [2.0, 0.0, 0.0], [0.0, 0.0, 0.0]]];
        dataset
            .add_variable(
                "line_capacity",
                SpatialVariable::Connectivity {
                    values,
                    column_regions: regions(),
                },
            )
            .unwrap();
        assert_error!(
            preprocess_dataset(&dataset),
            "Connectivity of variable line_capacity for component line must be symmetric"
        );
    }

    #[test]
    fn test_infinite_connectivity() {
        let mut dataset = SpatialDataset::new(regions(), ["line".into()]).unwrap();
        let values = array![[
            [0.0, f64::INFINITY, 1.0],
            [f64::INFINITY, 0.0, 2.0],
            [1.0, 2.0, 0.0]
        ]];
        dataset
            .add_variable(
                "line_capacity",
                SpatialVariable::Connectivity {
                    values,
                    column_regions: regions(),
                },
            )
            .unwrap();
        assert_error!(
            preprocess_dataset(&dataset),
            "Variable line_capacity for component line contains infinite values"
        );

        // The affinity matrix still accepts infinite connectivity
        let affinity = extract_affinity_matrix(&dataset, &VariableWeights::default()).unwrap();
        assert!(affinity.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_infinite_scalar() {
        let mut dataset = SpatialDataset::new(regions(), ["pv".into()]).unwrap();
        let scalar = array![[1.0, f64::NEG_INFINITY, 3.0]];
        dataset
            .add_variable("capacity", SpatialVariable::Scalar(scalar))
            .unwrap();
        assert_error!(
            preprocess_dataset(&dataset),
            "Variable capacity for component pv contains infinite values"
        );
    }

    #[test]
    fn test_extract_affinity_matrix() {
        let mut dataset = SpatialDataset::new(regions(), ["line".into()]).unwrap();
        let values = array![[
            [0.0, f64::INFINITY, 1.0],
            [f64::INFINITY, 0.0, f64::NAN],
            [1.0, f64::NAN, 0.0]
        ]];
        dataset
            .add_variable(
                "line_capacity",
                SpatialVariable::Connectivity {
                    values,
                    column_regions: regions(),
                },
            )
            .unwrap();
        let weights = VariableWeights::new([("line_capacity".to_string(), 2.0)]).unwrap();
        let affinity = extract_affinity_matrix(&dataset, &weights).unwrap();
        assert_eq!(
            affinity,
            array![
                [0.0, 200_000.0, 2.0],
                [200_000.0, 0.0, 0.0],
                [2.0, 0.0, 0.0]
            ]
        );
    }
}
