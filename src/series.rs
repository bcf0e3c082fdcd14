use chrono::NaiveDateTime;
use clap::ValueEnum;

use crate::error::{SpeedError, SpeedResult};
use crate::parser::ParsedResults;

/// The measured quantities of a speed test.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum Metric
{
    Download,
    Upload,
    Ping,
}

impl Metric {
    pub fn name(self) -> &'static str
    {
        match self {
            Metric::Download => "Download",
            Metric::Upload => "Upload",
            Metric::Ping => "Ping",
        }
    }

    pub fn unit(self) -> &'static str
    {
        match self {
            Metric::Download | Metric::Upload => "Mbit/s",
            Metric::Ping => "ms",
        }
    }

    /// The two metrics shown next to a primary metric.
    pub fn auxiliaries(self) -> [Metric; 2]
    {
        match self {
            Metric::Download => [Metric::Upload, Metric::Ping],
            Metric::Upload => [Metric::Download, Metric::Ping],
            Metric::Ping => [Metric::Download, Metric::Upload],
        }
    }

    pub fn values(self, parsed: &ParsedResults) -> &[f64]
    {
        match self {
            Metric::Download => &parsed.downloads,
            Metric::Upload => &parsed.uploads,
            Metric::Ping => &parsed.pings,
        }
    }

    pub fn descriptor(self, parsed: &ParsedResults) -> SeriesDescriptor
    {
        SeriesDescriptor {
            name: self.name().to_string(),
            unit: self.unit().to_string(),
            data: self.values(parsed).to_vec(),
        }
    }
}

/// Selects a series by name and unit, with the values in timestamp order.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesDescriptor {
    pub name: String,
    pub unit: String,
    pub data: Vec<f64>,
}

/// A named series of (timestamp, value) points.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    name: String,
    unit: String,
    points: Vec<(NaiveDateTime, f64)>,
}

impl Series {
    /// Pair the descriptor values with the timestamps. Both must have the same length.
    pub fn new(
        descriptor: SeriesDescriptor,
        timestamps: &[NaiveDateTime],
    ) -> SpeedResult<Self>
    {
        if descriptor.data.len() != timestamps.len()
        {
            return Err(SpeedError::parse(format!("series {} has {} values for {} timestamps", descriptor.name, descriptor.data.len(), timestamps.len())));
        }
        Ok(Self {
            points: timestamps.iter().copied().zip(descriptor.data).collect(),
            name: descriptor.name,
            unit: descriptor.unit,
        })
    }

    pub fn name(&self) -> &str
    {
        &self.name
    }

    pub fn unit(&self) -> &str
    {
        &self.unit
    }

    pub fn points(&self) -> &[(NaiveDateTime, f64)]
    {
        &self.points
    }

    pub fn len(&self) -> usize
    {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.points.is_empty()
    }

    pub fn timestamp(&self, index: usize) -> Option<NaiveDateTime>
    {
        self.points.get(index).map(|(timestamp, _)| *timestamp)
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_
    {
        self.points.iter().map(|(_, value)| *value)
    }

    pub fn timestamps(&self) -> impl Iterator<Item = NaiveDateTime> + '_
    {
        self.points.iter().map(|(timestamp, _)| *timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auxiliaries_follow_the_fixed_pairing()
    {
        assert_eq!(Metric::Download.auxiliaries(), [Metric::Upload, Metric::Ping]);
        assert_eq!(Metric::Upload.auxiliaries(), [Metric::Download, Metric::Ping]);
        assert_eq!(Metric::Ping.auxiliaries(), [Metric::Download, Metric::Upload]);
    }

    #[test]
    fn length_mismatch_is_refused()
    {
        let descriptor = SeriesDescriptor { name: "Download".to_string(), unit: "Mbit/s".to_string(), data: vec![1.0, 2.0] };
        assert!(Series::new(descriptor, &[]).is_err());
    }
}
