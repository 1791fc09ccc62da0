//! Storage component models for energy system optimisation, plus a spatial distance engine for
//! grouping regions.
//!
//! Storage components are declared into a shared MILP via the [`optimisation::ComponentModel`]
//! contract and solved with HiGHS. The [`spatial`] module scores how similar regions are, to
//! support spatial aggregation of the input data.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod commodity;
pub mod component;
pub mod energy_system;
pub mod error;
pub mod finance;
pub mod id;
pub mod input;
pub mod location;
pub mod log;
pub mod optimisation;
pub mod settings;
pub mod solver;
pub mod spatial;
pub mod storage;
pub mod summary;
pub mod temporal;
pub mod time_series;
pub mod units;

#[cfg(test)]
mod fixture;

/// Get the directory holding the program's configuration files
pub fn get_config_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_default();
    path.push("esm-storage");
    path
}
