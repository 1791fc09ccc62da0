//! The distance between two regions and the full distance matrix.
use super::{PreprocessedDataset, condensed_index};
use anyhow::{Result, ensure};
use indexmap::IndexMap;
use itertools::Itertools;
use log::debug;
use ndarray::{Array2, ArrayView1};
use std::cmp::Ordering;

/// Weights of variables in the distance. Variables without an explicit weight have weight 1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableWeights(IndexMap<String, f64>);

impl VariableWeights {
    /// Create weights from `(variable, weight)` pairs
    pub fn new<I>(weights: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, f64)>,
    {
        let weights: IndexMap<_, _> = weights.into_iter().collect();
        for (name, weight) in &weights {
            ensure!(
                weight.is_finite() && *weight >= 0.0,
                "Weight of variable {name} must be a finite, non-negative number"
            );
        }

        Ok(Self(weights))
    }

    /// The weight of a variable
    pub fn weight(&self, name: &str) -> f64 {
        self.0.get(name).copied().unwrap_or(1.0)
    }
}

/// A weighted sum and the weighted number of features it covers
#[derive(Default)]
struct Part {
    sum: f64,
    count: f64,
}

impl Part {
    fn add(&mut self, weight: f64, sum: f64, count: usize) {
        self.sum += weight * sum;
        self.count += weight * count as f64;
    }

    fn value(&self) -> f64 {
        if self.count > 0.0 {
            self.sum / self.count
        } else {
            0.0
        }
    }
}

fn absolute_difference(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}

/// The distance between regions `a` and `b`, given by their row index.
///
/// Each variable class contributes the weighted sum of absolute differences (or connectivity
/// dissimilarities) divided by the weighted number of features. A class without variables
/// contributes nothing.
pub fn distance(
    data: &PreprocessedDataset,
    weights: &VariableWeights,
    a: usize,
    b: usize,
) -> Result<f64> {
    let n = data.n_regions;
    ensure!(
        a < n && b < n,
        "Region indices ({a}, {b}) out of range for {n} regions"
    );

    Ok(match a.cmp(&b) {
        Ordering::Equal => 0.0,
        Ordering::Less => pair_distance(data, weights, a, b),
        Ordering::Greater => pair_distance(data, weights, b, a),
    })
}

/// The distance between two distinct regions with `a < b`
fn pair_distance(data: &PreprocessedDataset, weights: &VariableWeights, a: usize, b: usize) -> f64 {
    let mut time_series = Part::default();
    for (name, components) in &data.time_series {
        let weight = weights.weight(name);
        for matrix in components.values() {
            time_series.add(
                weight,
                absolute_difference(matrix.row(a), matrix.row(b)),
                matrix.ncols(),
            );
        }
    }

    let mut scalar = Part::default();
    for (name, matrix) in &data.scalar {
        scalar.add(
            weights.weight(name),
            absolute_difference(matrix.row(a), matrix.row(b)),
            matrix.ncols(),
        );
    }

    let index = condensed_index(data.n_regions, a, b);
    let mut connectivity = Part::default();
    for (name, components) in &data.connectivity {
        let weight = weights.weight(name);
        for dissimilarity in components.values() {
            connectivity.add(weight, dissimilarity[index], 1);
        }
    }

    time_series.value() + scalar.value() + connectivity.value()
}

/// The symmetric matrix of distances between all pairs of regions
pub fn distance_matrix(data: &PreprocessedDataset, weights: &VariableWeights) -> Array2<f64> {
    let n = data.n_regions;
    let mut matrix = Array2::zeros((n, n));
    for (a, b) in (0..n).tuple_combinations() {
        let value = pair_distance(data, weights, a, b);
        matrix[[a, b]] = value;
        matrix[[b, a]] = value;
    }
    debug!("Calculated distances between {n} regions");

    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use float_cmp::assert_approx_eq;
    use ndarray::array;
    use rstest::{fixture, rstest};

    /// Three regions with one feature of each class
    #[fixture]
    fn data() -> PreprocessedDataset {
        PreprocessedDataset {
            n_regions: 3,
            time_series: IndexMap::from([(
                "capacity_factor".to_string(),
                IndexMap::from([("wind".into(), array![[0.0, 1.0], [1.0, 1.0], [2.0, 3.0]])]),
            )]),
            scalar: IndexMap::from([("capacity".to_string(), array![[0.0], [2.0], [4.0]])]),
            connectivity: IndexMap::from([(
                "line_capacity".to_string(),
                IndexMap::from([("line".into(), array![0.0, 0.5, 1.0])]),
            )]),
        }
    }

    #[test]
    fn test_variable_weights() {
        let weights = VariableWeights::new([("capacity".to_string(), 2.0)]).unwrap();
        assert_approx_eq!(f64, weights.weight("capacity"), 2.0);
        assert_approx_eq!(f64, weights.weight("other"), 1.0);
        assert_error!(
            VariableWeights::new([("capacity".to_string(), -1.0)]),
            "Weight of variable capacity must be a finite, non-negative number"
        );
    }

    #[rstest]
    fn test_distance(data: PreprocessedDataset) {
        let weights = VariableWeights::default();
        // Time series 1/2, scalar 2, connectivity 0
        assert_approx_eq!(f64, distance(&data, &weights, 0, 1).unwrap(), 2.5);
        // Time series 4/2, scalar 4, connectivity 0.5
        assert_approx_eq!(f64, distance(&data, &weights, 2, 0).unwrap(), 6.5);
        assert_approx_eq!(f64, distance(&data, &weights, 1, 1).unwrap(), 0.0);
    }

    #[rstest]
    #[case(3, 0)]
    #[case(1, 5)]
    fn test_distance_out_of_range(data: PreprocessedDataset, #[case] a: usize, #[case] b: usize) {
        assert_error!(
            distance(&data, &VariableWeights::default(), a, b),
            format!("Region indices ({a}, {b}) out of range for 3 regions")
        );
    }

    #[rstest]
    fn test_distance_weighted(data: PreprocessedDataset) {
        let weights = VariableWeights::new([
            ("capacity".to_string(), 3.0),
            ("line_capacity".to_string(), 0.0),
        ])
        .unwrap();
        // A zero weight removes the class
        assert_approx_eq!(f64, distance(&data, &weights, 1, 2).unwrap(), 3.5);
    }

    #[test]
    fn test_distance_no_variables() {
        let data = PreprocessedDataset {
            n_regions: 2,
            ..PreprocessedDataset::default()
        };
        let value = distance(&data, &VariableWeights::default(), 0, 1).unwrap();
        assert_approx_eq!(f64, value, 0.0);
    }

    #[rstest]
    fn test_distance_matrix(data: PreprocessedDataset) {
        let matrix = distance_matrix(&data, &VariableWeights::default());
        assert_eq!(matrix.shape(), [3, 3]);
        for a in 0..3 {
            assert_approx_eq!(f64, matrix[[a, a]], 0.0);
            for b in 0..3 {
                assert_approx_eq!(f64, matrix[[a, b]], matrix[[b, a]]);
            }
        }
        assert_approx_eq!(f64, matrix[[1, 2]], 4.5);
    }
}
