//! Error and warning types raised while configuring and solving component models.
use crate::component::ComponentID;
use log::warn;
use std::fmt;
use thiserror::Error;

/// Verbosity at or above which consistency warnings are no longer logged
pub const QUIET_VERBOSITY: u8 = 2;

/// An invalid combination of component parameters.
///
/// These are fatal and are raised when a component is constructed. They travel inside an
/// [`anyhow::Error`] and can be recovered with `downcast_ref`, so IDs are stored as strings.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigurationError {
    /// The component refers to a commodity the energy system does not know about
    #[error("Component {component} refers to unknown commodity {commodity}")]
    UnknownCommodity {
        /// The offending component
        component: String,
        /// The commodity which could not be found
        commodity: String,
    },
    /// A location-indexed parameter refers to a location the energy system does not know about
    #[error("Parameter {parameter} of component {component} refers to unknown location {location}")]
    UnknownLocation {
        /// The offending component
        component: String,
        /// The parameter containing the location
        parameter: &'static str,
        /// The location which could not be found
        location: String,
    },
    /// An operation rate time series has values which are non-zero but below minimum part load
    #[error(
        "{series} of component {component} needs to be 0 or at least the part load minimum \
        {part_load_min} (found {value} at {location})"
    )]
    BelowPartLoadMin {
        /// The offending component
        component: String,
        /// The name of the time series
        series: &'static str,
        /// The location of the first offending value
        location: String,
        /// The first offending value
        value: f64,
        /// The minimum part load of the component
        part_load_min: f64,
    },
    /// A parameter is outside of its permitted range or inconsistent with other parameters
    #[error("Invalid value for {parameter} of component {component}: {reason}")]
    InvalidParameter {
        /// The offending component
        component: String,
        /// The parameter's name
        parameter: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

impl ConfigurationError {
    /// Shorthand for [`ConfigurationError::InvalidParameter`]
    pub fn invalid(component: &ComponentID, parameter: &'static str, reason: &str) -> Self {
        Self::InvalidParameter {
            component: component.to_string(),
            parameter,
            reason: reason.to_string(),
        }
    }
}

/// The flow direction of a storage operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Flow into the storage
    Charge,
    /// Flow out of the storage
    Discharge,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Charge => write!(f, "charge"),
            Direction::Discharge => write!(f, "discharge"),
        }
    }
}

/// A non-fatal inconsistency which was resolved automatically
#[derive(Debug, Clone, PartialEq)]
pub enum ConsistencyWarning {
    /// Both a fixed and a maximum operation rate were given; the maximum was dropped
    FixOverridesMax {
        /// The affected component
        component: ComponentID,
        /// The affected flow direction
        direction: Direction,
    },
    /// The solution charges and discharges the component in the same time step
    SimultaneousChargeDischarge {
        /// The affected component
        component: ComponentID,
    },
}

impl fmt::Display for ConsistencyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyWarning::FixOverridesMax {
                component,
                direction,
            } => write!(
                f,
                "Component {component}: if {direction}_op_rate_fix is specified, \
                {direction}_op_rate_max is not required. The {direction}_op_rate_max time series \
                was set to None."
            ),
            ConsistencyWarning::SimultaneousChargeDischarge { component } => write!(
                f,
                "Charge and discharge at the same time for component {component}"
            ),
        }
    }
}

/// Record a consistency warning, logging it unless `verbose` asks for quiet output
pub fn emit_warning(warning: ConsistencyWarning, verbose: u8, sink: &mut Vec<ConsistencyWarning>) {
    if verbose < QUIET_VERBOSITY {
        warn!("{warning}");
    }
    sink.push(warning);
}
