//! A distance engine for grouping regions.
//!
//! Regions are described by three classes of variables: time series, scalars and connectivity
//! between pairs of regions. After preprocessing, the distance between two regions combines one
//! normalised part per class. The resulting matrix is meant for external hierarchical clustering;
//! alternatively, the connectivity data can be extracted as an affinity matrix for spectral
//! clustering.
mod dataset;
mod distance;
mod preprocess;
pub use dataset::{SpatialDataset, SpatialVariable};
pub use distance::{VariableWeights, distance, distance_matrix};
pub use preprocess::{
    PreprocessedDataset, condensed_index, extract_affinity_matrix, preprocess_dataset,
    standardise_columns,
};
