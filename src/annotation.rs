//! Summary values drawn on top of a series.
//!
//! All of these work on the values in sequence order and refuse an empty series.

use chrono::NaiveDateTime;

use crate::error::{SpeedError, SpeedResult};
use crate::series::Series;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Extremum
{
    Max,
    Min,
}

fn non_empty(series: &Series) -> SpeedResult<()>
{
    if series.is_empty() { return Err(SpeedError::EmptySeries(series.name().to_string())) };
    Ok(())
}

/// Index and value of the maximum or minimum. The first occurrence wins on ties.
pub fn compute_extremum(
    series: &Series,
    kind: Extremum,
) -> SpeedResult<(usize, f64)>
{
    non_empty(series)?;
    let mut best = (0, f64::NAN);
    for (index, value) in series.values().enumerate()
    {
        let better = match kind {
            Extremum::Max => value > best.1,
            Extremum::Min => value < best.1,
        };
        if index == 0 || better { best = (index, value) };
    }
    Ok(best)
}

/// Median of the series. An even length series first loses its first value,
/// the returned index is the position of the median in what remains.
pub fn compute_median(series: &Series) -> SpeedResult<(usize, f64)>
{
    non_empty(series)?;
    let values: Vec<f64> = series.values().collect();
    let remaining = if values.len() % 2 == 0 { &values[1..] } else { &values[..] };
    let mut sorted = remaining.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let median = sorted[sorted.len() / 2];
    let index = remaining.iter().position(|value| *value == median).unwrap_or(sorted.len() / 2);
    Ok((index, median))
}

pub fn compute_mean(series: &Series) -> SpeedResult<f64>
{
    non_empty(series)?;
    Ok(series.values().sum::<f64>() / series.len() as f64)
}

/// Recency weighted average: every new value counts for half.
/// r[0] = v[0], r[i] = (r[i-1] + v[i]) / 2
pub fn compute_running_average(series: &Series) -> SpeedResult<Vec<f64>>
{
    non_empty(series)?;
    let mut running = Vec::with_capacity(series.len());
    for value in series.values()
    {
        let next = match running.last() {
            Some(previous) => (previous + value) / 2.,
            None => value,
        };
        running.push(next);
    }
    Ok(running)
}

/// Index of the point closest in time to `query`. The first occurrence wins on ties.
pub fn find_nearest_by_time(
    series: &Series,
    query: NaiveDateTime,
) -> SpeedResult<usize>
{
    non_empty(series)?;
    let distances = series.timestamps().map(|timestamp| (timestamp - query).num_milliseconds().unsigned_abs() as f64);
    Ok(position_of_smallest(distances))
}

/// Index of the point closest in value to `query`. The first occurrence wins on ties.
pub fn find_nearest_by_value(
    series: &Series,
    query: f64,
) -> SpeedResult<usize>
{
    non_empty(series)?;
    Ok(position_of_smallest(series.values().map(|value| (value - query).abs())))
}

fn position_of_smallest(distances: impl Iterator<Item = f64>) -> usize
{
    let mut best = (0, f64::INFINITY);
    for (index, distance) in distances.enumerate()
    {
        if distance < best.1 { best = (index, distance) };
    }
    best.0
}

/// Everything drawn on top of a series, computed in one go.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationSet {
    pub max: (usize, f64),
    pub min: (usize, f64),
    pub median: (usize, f64),
    pub mean: f64,
    pub running_average: Vec<f64>,
}

impl AnnotationSet {
    pub fn compute(series: &Series) -> SpeedResult<Self>
    {
        Ok(Self {
            max: compute_extremum(series, Extremum::Max)?,
            min: compute_extremum(series, Extremum::Min)?,
            median: compute_median(series)?,
            mean: compute_mean(series)?,
            running_average: compute_running_average(series)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::SeriesDescriptor;
    use chrono::{Duration, NaiveDate};

    fn t0() -> NaiveDateTime
    {
        NaiveDate::from_ymd_opt(2023, 4, 1).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    fn series(values: &[f64]) -> Series
    {
        let timestamps: Vec<NaiveDateTime> = (0..values.len()).map(|i| t0() + Duration::minutes(i as i64)).collect();
        Series::new(SeriesDescriptor { name: "Download".to_string(), unit: "Mbit/s".to_string(), data: values.to_vec() }, &timestamps).unwrap()
    }

    #[test]
    fn extremum_takes_the_first_occurrence()
    {
        let s = series(&[3.0, 7.0, 1.0, 7.0, 1.0]);
        assert_eq!(compute_extremum(&s, Extremum::Max).unwrap(), (1, 7.0));
        assert_eq!(compute_extremum(&s, Extremum::Min).unwrap(), (2, 1.0));
        assert_eq!(compute_extremum(&series(&[4.0]), Extremum::Max).unwrap(), (0, 4.0));
    }

    #[test]
    fn median_drops_the_first_value_on_even_length()
    {
        assert_eq!(compute_median(&series(&[1.0, 2.0, 3.0, 4.0, 5.0])).unwrap(), (2, 3.0));
        assert_eq!(compute_median(&series(&[1.0, 2.0, 3.0, 4.0])).unwrap(), (1, 3.0));
        assert_eq!(compute_median(&series(&[9.0, 1.0, 5.0])).unwrap(), (2, 5.0));
    }

    #[test]
    fn mean_and_running_average()
    {
        assert_eq!(compute_mean(&series(&[10.0, 20.0, 30.0])).unwrap(), 20.0);
        assert_eq!(compute_running_average(&series(&[10.0, 20.0, 30.0])).unwrap(), vec![10.0, 15.0, 22.5]);
    }

    #[test]
    fn nearest_by_time_and_value()
    {
        let timestamps = [t0(), t0() + Duration::seconds(10), t0() + Duration::seconds(30)];
        let s = Series::new(SeriesDescriptor { name: "Ping".to_string(), unit: "ms".to_string(), data: vec![5.0, 9.0, 7.0] }, &timestamps).unwrap();
        assert_eq!(find_nearest_by_time(&s, t0() + Duration::seconds(8)).unwrap(), 1);
        assert_eq!(find_nearest_by_time(&s, t0() + Duration::seconds(20)).unwrap(), 1);
        assert_eq!(find_nearest_by_time(&s, t0() - Duration::hours(1)).unwrap(), 0);
        assert_eq!(find_nearest_by_value(&s, 8.0).unwrap(), 1);
        assert_eq!(find_nearest_by_value(&s, 100.0).unwrap(), 1);
        assert_eq!(find_nearest_by_value(&s, 6.9).unwrap(), 2);
    }

    #[test]
    fn empty_series_is_refused()
    {
        let empty = series(&[]);
        assert!(matches!(compute_extremum(&empty, Extremum::Min), Err(SpeedError::EmptySeries(_))));
        assert!(matches!(compute_median(&empty), Err(SpeedError::EmptySeries(_))));
        assert!(matches!(compute_mean(&empty), Err(SpeedError::EmptySeries(_))));
        assert!(matches!(compute_running_average(&empty), Err(SpeedError::EmptySeries(_))));
        assert!(matches!(AnnotationSet::compute(&empty), Err(SpeedError::EmptySeries(_))));
    }
}
