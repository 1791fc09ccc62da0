//! Location-indexed time series used for operation rates.
use crate::location::LocationID;
use crate::temporal::Aggregation;
use anyhow::{Context, Result, ensure};
use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;

/// Values for each location over a sequence of time steps.
///
/// Full series cover every original time step of the horizon. Aggregated series are indexed by
/// `period * steps + step` over the modelled typical periods and steps.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(transparent)]
pub struct TimeSeries(pub IndexMap<LocationID, Vec<f64>>);

impl TimeSeries {
    /// Create a time series with the same profile at every listed location
    pub fn uniform<'a, I>(locations: I, values: &[f64]) -> Self
    where
        I: IntoIterator<Item = &'a LocationID>,
    {
        Self(
            locations
                .into_iter()
                .map(|loc| (loc.clone(), values.to_vec()))
                .collect(),
        )
    }

    /// The series for one location, if present
    pub fn get(&self, location: &LocationID) -> Option<&[f64]> {
        self.0.get(location).map(Vec::as_slice)
    }

    /// The value at a location and flat index, or zero where the location has no data
    pub fn value(&self, location: &LocationID, index: usize) -> f64 {
        self.get(location)
            .and_then(|values| values.get(index).copied())
            .unwrap_or(0.0)
    }

    /// The value at a modelled (period, step) pair of an aggregated or full series
    pub fn value_at(&self, location: &LocationID, steps: usize, period: usize, step: usize) -> f64 {
        self.value(location, period * steps + step)
    }

    /// Iterate over locations and their values
    pub fn iter(&self) -> impl Iterator<Item = (&LocationID, &[f64])> {
        self.0.iter().map(|(loc, values)| (loc, values.as_slice()))
    }

    /// Sum over the whole series at each location
    pub fn location_sums(&self) -> IndexMap<LocationID, f64> {
        self.0
            .iter()
            .map(|(loc, values)| (loc.clone(), values.iter().sum()))
            .collect()
    }

    /// Check the series covers known locations with finite, non-negative values of a given length
    pub fn validate(&self, locations: &IndexSet<LocationID>, length: usize) -> Result<()> {
        for (loc, values) in &self.0 {
            ensure!(
                locations.contains(loc),
                "Time series refers to unknown location {loc}"
            );
            ensure!(
                values.len() == length,
                "Time series for location {loc} has {} values, expected {length}",
                values.len()
            );
            ensure!(
                values.iter().all(|v| v.is_finite() && *v >= 0.0),
                "Time series for location {loc} must contain finite, non-negative values"
            );
        }

        Ok(())
    }

    /// Find the first value strictly between 0 and `threshold`
    pub fn first_between_zero_and(&self, threshold: f64) -> Option<(&LocationID, f64)> {
        self.0.iter().find_map(|(loc, values)| {
            values
                .iter()
                .find(|v| **v > 0.0 && **v < threshold)
                .map(|v| (loc, *v))
        })
    }

    /// Elementwise sum of several series over the union of their locations
    pub fn sum<'a, I>(series: I) -> Result<Option<Self>>
    where
        I: IntoIterator<Item = &'a TimeSeries>,
    {
        let mut total: Option<IndexMap<LocationID, Vec<f64>>> = None;
        for ts in series {
            let total = total.get_or_insert_with(IndexMap::new);
            for (loc, values) in &ts.0 {
                let entry = total
                    .entry(loc.clone())
                    .or_insert_with(|| vec![0.0; values.len()]);
                ensure!(
                    entry.len() == values.len(),
                    "Cannot add time series of different lengths"
                );
                for (acc, value) in entry.iter_mut().zip(values) {
                    *acc += value;
                }
            }
        }

        Ok(total.map(TimeSeries))
    }

    /// The values of one chronological period of a full series
    pub fn period_slice(&self, location: &LocationID, steps: usize, period: usize) -> Result<&[f64]> {
        let values = self
            .get(location)
            .with_context(|| format!("No time series data for location {location}"))?;
        let start = period * steps;
        values
            .get(start..start + steps)
            .with_context(|| format!("Time series for {location} is shorter than period {period}"))
    }

    /// Build an aggregated series from representative chronological periods.
    ///
    /// `representatives[p]` is the chronological period whose values stand in for typical period
    /// `p` (e.g. the medoid of a cluster). Segments take the mean of the time steps they cover.
    pub fn aggregate(&self, aggregation: &Aggregation, representatives: &[usize]) -> Result<Self> {
        ensure!(
            representatives.len() == aggregation.typical_periods,
            "Expected one representative period per typical period"
        );

        let steps = aggregation.time_steps_per_period;
        let mut aggregated = IndexMap::new();
        for loc in self.0.keys() {
            let mut values = Vec::new();
            for (typical, representative) in representatives.iter().enumerate() {
                let period = self.period_slice(loc, steps, *representative)?;
                match &aggregation.segmentation {
                    None => values.extend_from_slice(period),
                    Some(segmentation) => {
                        let mut start = 0;
                        for length in &segmentation.time_steps_per_segment[typical] {
                            let segment = &period[start..start + length];
                            values.push(segment.iter().sum::<f64>() / *length as f64);
                            start += length;
                        }
                    }
                }
            }
            aggregated.insert(loc.clone(), values);
        }

        Ok(Self(aggregated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, locations};
    use crate::temporal::Segmentation;
    use indexmap::indexmap;
    use rstest::rstest;

    #[rstest]
    fn test_validate(locations: IndexSet<LocationID>) {
        let ts = TimeSeries::uniform(&locations, &[0.0, 0.5, 1.0]);
        assert!(ts.validate(&locations, 3).is_ok());
        assert_error!(
            ts.validate(&locations, 4),
            "Time series for location north has 3 values, expected 4"
        );

        let negative = TimeSeries(indexmap! {"south".into() => vec![-1.0]});
        assert_error!(
            negative.validate(&locations, 1),
            "Time series for location south must contain finite, non-negative values"
        );
    }

    #[test]
    fn test_first_between_zero_and() {
        let ts = TimeSeries(indexmap! {
            "north".into() => vec![0.0, 0.6],
            "south".into() => vec![0.3, 0.0],
        });
        assert_eq!(
            ts.first_between_zero_and(0.5),
            Some((&LocationID::new("south"), 0.3))
        );
        assert_eq!(ts.first_between_zero_and(0.2), None);
    }

    #[test]
    fn test_sum() {
        let a = TimeSeries(indexmap! {"north".into() => vec![1.0, 2.0]});
        let b = TimeSeries(indexmap! {
            "north".into() => vec![0.5, 0.5],
            "south".into() => vec![1.0, 0.0],
        });
        let total = TimeSeries::sum([&a, &b]).unwrap().unwrap();
        assert_eq!(total.get(&"north".into()), Some([1.5, 2.5].as_slice()));
        assert_eq!(total.location_sums()["south"], 1.0);
        assert_eq!(TimeSeries::sum([]).unwrap(), None);
    }

    #[test]
    fn test_period_slice() {
        let ts = TimeSeries(indexmap! {"north".into() => vec![1.0, 2.0, 3.0, 4.0]});
        assert_eq!(ts.period_slice(&"north".into(), 2, 1).unwrap(), [3.0, 4.0]);
        assert!(ts.period_slice(&"north".into(), 2, 2).is_err());
    }

    #[test]
    fn test_aggregate_with_segments() {
        let ts = TimeSeries(indexmap! {"north".into() => vec![1.0, 3.0, 0.0, 0.0, 4.0, 2.0]});
        let aggregation = Aggregation {
            time_steps_per_period: 2,
            typical_periods: 2,
            periods_order: vec![0, 1, 0],
            segmentation: Some(Segmentation {
                time_steps_per_segment: vec![vec![2], vec![2]],
            }),
        };
        let aggregated = ts.aggregate(&aggregation, &[0, 2]).unwrap();
        assert_eq!(aggregated.get(&"north".into()), Some([2.0, 3.0].as_slice()));
    }
}
