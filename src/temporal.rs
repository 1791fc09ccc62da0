//! The temporal structure of an energy system.
//!
//! A model runs either on the full chronological time series or on time-series-aggregated data,
//! where each chronological period is represented by one of a few typical periods. Typical periods
//! can additionally be split into segments of irregular length. The choice is captured once in a
//! [`TemporalMode`] so that component models can dispatch on it when declaring constraints.
use anyhow::{Result, ensure};
use itertools::Itertools;
use std::ops::RangeInclusive;

/// Hours in a (non-leap) year
pub const HOURS_PER_YEAR: f64 = 8760.0;

/// Segmentation of typical periods into contiguous blocks of time steps
#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    /// Number of original time steps represented by each segment, per typical period
    pub time_steps_per_segment: Vec<Vec<usize>>,
}

impl Segmentation {
    /// Number of segments in each typical period
    pub fn segments_per_period(&self) -> usize {
        self.time_steps_per_segment.first().map_or(0, Vec::len)
    }

    /// Index of the first original time step of a segment within its period
    pub fn segment_start_time(&self, period: usize, segment: usize) -> usize {
        self.time_steps_per_segment[period][..segment].iter().sum()
    }
}

/// Results of time series aggregation which define the temporal structure of the model
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    /// Number of original time steps in each period
    pub time_steps_per_period: usize,
    /// Number of typical periods
    pub typical_periods: usize,
    /// The typical period representing each chronological period
    pub periods_order: Vec<usize>,
    /// Optional segmentation of the typical periods
    pub segmentation: Option<Segmentation>,
}

/// How time is represented in the optimisation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TemporalMode<'a> {
    /// Every time step of the horizon is modelled in a single period
    Full,
    /// Typical periods (optionally segmented) stand in for the chronological periods
    Aggregated(&'a Aggregation),
}

/// The time steps of the energy system and, if present, their aggregation
#[derive(Debug, Clone, PartialEq)]
pub struct TimeStructure {
    total_time_steps: usize,
    hours_per_time_step: f64,
    aggregation: Option<Aggregation>,
}

impl TimeStructure {
    /// Create a time structure at full temporal resolution
    pub fn new(total_time_steps: usize, hours_per_time_step: f64) -> Result<Self> {
        ensure!(total_time_steps > 0, "Number of time steps must be positive");
        ensure!(
            hours_per_time_step.is_finite() && hours_per_time_step > 0.0,
            "Hours per time step must be a positive number"
        );

        Ok(Self {
            total_time_steps,
            hours_per_time_step,
            aggregation: None,
        })
    }

    /// Attach the results of a time series aggregation
    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Result<Self> {
        let steps = aggregation.time_steps_per_period;
        ensure!(steps > 0, "Number of time steps per period must be positive");
        ensure!(
            self.total_time_steps % steps == 0,
            "Number of time steps ({}) must be a multiple of the time steps per period ({steps})",
            self.total_time_steps
        );
        ensure!(
            aggregation.periods_order.len() == self.total_time_steps / steps,
            "Periods order must have one entry per chronological period ({})",
            self.total_time_steps / steps
        );
        ensure!(
            aggregation.typical_periods > 0,
            "Number of typical periods must be positive"
        );
        ensure!(
            aggregation
                .periods_order
                .iter()
                .all(|p| *p < aggregation.typical_periods),
            "Periods order refers to an unknown typical period"
        );

        if let Some(segmentation) = &aggregation.segmentation {
            ensure!(
                segmentation.time_steps_per_segment.len() == aggregation.typical_periods,
                "Segment durations must be given for every typical period"
            );
            let segments = segmentation.segments_per_period();
            ensure!(segments > 0, "Typical periods must have at least one segment");
            for (period, durations) in segmentation.time_steps_per_segment.iter().enumerate() {
                ensure!(
                    durations.len() == segments,
                    "Typical period {period} has {} segments, expected {segments}",
                    durations.len()
                );
                ensure!(
                    durations.iter().all(|d| *d > 0),
                    "Segments of typical period {period} must cover at least one time step"
                );
                ensure!(
                    durations.iter().sum::<usize>() == steps,
                    "Segments of typical period {period} must cover {steps} time steps"
                );
            }
        }

        self.aggregation = Some(aggregation);
        Ok(self)
    }

    /// The temporal representation used for the optimisation
    pub fn mode(&self) -> TemporalMode<'_> {
        match &self.aggregation {
            None => TemporalMode::Full,
            Some(aggregation) => TemporalMode::Aggregated(aggregation),
        }
    }

    /// Whether time series aggregation is active
    pub fn has_aggregation(&self) -> bool {
        self.aggregation.is_some()
    }

    /// The aggregation, if any
    pub fn aggregation(&self) -> Option<&Aggregation> {
        self.aggregation.as_ref()
    }

    /// Total number of original time steps in the horizon
    pub fn total_time_steps(&self) -> usize {
        self.total_time_steps
    }

    /// Hours represented by one original time step
    pub fn hours_per_time_step(&self) -> f64 {
        self.hours_per_time_step
    }

    /// Number of years represented by the horizon
    pub fn number_of_years(&self) -> f64 {
        self.total_time_steps as f64 * self.hours_per_time_step / HOURS_PER_YEAR
    }

    /// Number of original time steps per (chronological) period
    pub fn time_steps_per_period(&self) -> usize {
        match self.mode() {
            TemporalMode::Full => self.total_time_steps,
            TemporalMode::Aggregated(agg) => agg.time_steps_per_period,
        }
    }

    /// Number of modelled periods: one without aggregation, else the typical periods
    pub fn modelled_periods(&self) -> usize {
        match self.mode() {
            TemporalMode::Full => 1,
            TemporalMode::Aggregated(agg) => agg.typical_periods,
        }
    }

    /// Number of modelled time steps in each period (segments if segmentation is active)
    pub fn modelled_steps(&self) -> usize {
        match self.mode() {
            TemporalMode::Full => self.total_time_steps,
            TemporalMode::Aggregated(agg) => agg
                .segmentation
                .as_ref()
                .map_or(agg.time_steps_per_period, Segmentation::segments_per_period),
        }
    }

    /// Iterate over the modelled (period, time step) pairs
    pub fn time_set(&self) -> impl Iterator<Item = (usize, usize)> + use<> {
        (0..self.modelled_periods()).cartesian_product(0..self.modelled_steps())
    }

    /// Hours covered by a modelled time step
    pub fn step_hours(&self, period: usize, step: usize) -> f64 {
        self.step_length(period, step) as f64 * self.hours_per_time_step
    }

    /// Number of original time steps covered by a modelled time step
    pub fn step_length(&self, period: usize, step: usize) -> usize {
        match self.mode() {
            TemporalMode::Aggregated(Aggregation {
                segmentation: Some(segmentation),
                ..
            }) => segmentation.time_steps_per_segment[period][step],
            _ => 1,
        }
    }

    /// Hours from the start of the period to the start of a modelled time step
    pub fn step_start_hours(&self, period: usize, step: usize) -> f64 {
        let start = match self.mode() {
            TemporalMode::Aggregated(Aggregation {
                segmentation: Some(segmentation),
                ..
            }) => segmentation.segment_start_time(period, step),
            _ => step,
        };

        start as f64 * self.hours_per_time_step
    }

    /// Hours covered by one whole period
    pub fn period_hours(&self) -> f64 {
        self.time_steps_per_period() as f64 * self.hours_per_time_step
    }

    /// How often a modelled period occurs in the chronological horizon
    pub fn period_occurrences(&self, period: usize) -> f64 {
        match self.mode() {
            TemporalMode::Full => 1.0,
            TemporalMode::Aggregated(agg) => {
                agg.periods_order.iter().filter(|p| **p == period).count() as f64
            }
        }
    }

    /// The chronological periods of the horizon
    pub fn periods(&self) -> std::ops::Range<usize> {
        match self.mode() {
            TemporalMode::Full => 0..1,
            TemporalMode::Aggregated(agg) => 0..agg.periods_order.len(),
        }
    }

    /// Boundaries between chronological periods, including the start and end of the horizon
    pub fn inter_period_steps(&self) -> RangeInclusive<usize> {
        0..=self.periods().end
    }

    /// The typical period which represents a chronological period
    pub fn typical_period_of(&self, period: usize) -> usize {
        match self.mode() {
            TemporalMode::Full => 0,
            TemporalMode::Aggregated(agg) => agg.periods_order[period],
        }
    }
}
