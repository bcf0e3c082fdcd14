use chrono::NaiveDateTime;
use itertools::Itertools;

use crate::parser::ParsedResults;

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct MinMeanMax {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

impl MinMeanMax {
    fn from_values(values: &[f64]) -> Self
    {
        if values.is_empty() { return Default::default() };
        Self {
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            mean: values.iter().sum::<f64>() / values.len() as f64,
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SsidSummary {
    pub ssid: String,
    pub count: usize,
    pub first: NaiveDateTime,
    pub last: NaiveDateTime,
    pub download: MinMeanMax,
    pub upload: MinMeanMax,
    pub ping: MinMeanMax,
}

/// One summary per ssid, in order of first appearance.
pub fn summarize(parsed: &ParsedResults) -> Vec<SsidSummary>
{
    let mut summaries = Vec::new();
    for current_ssid in parsed.ssids.iter().unique()
    {
        let indexes: Vec<usize> = parsed.ssids.iter().positions(|ssid| ssid == current_ssid).collect();
        let pick = |values: &[f64]| -> Vec<f64> { indexes.iter().map(|index| values[*index]).collect() };
        let timestamps: Vec<NaiveDateTime> = indexes.iter().map(|index| parsed.timestamps[*index]).collect();
        let (Some(first), Some(last)) = (timestamps.iter().min(), timestamps.iter().max()) else { continue };
        summaries.push(SsidSummary {
            ssid: current_ssid.clone(),
            count: indexes.len(),
            first: *first,
            last: *last,
            download: MinMeanMax::from_values(&pick(&parsed.downloads)),
            upload: MinMeanMax::from_values(&pick(&parsed.uploads)),
            ping: MinMeanMax::from_values(&pick(&parsed.pings)),
        });
    }
    summaries
}

pub fn print_summary_header()
{
    println!("{:20} {:>6} {:19} {:19} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
             "ssid",
             "count",
             "first",
             "last",
             "dl min",
             "dl avg",
             "dl max",
             "ul min",
             "ul avg",
             "ul max",
             "ping min",
             "ping avg",
             "ping max",
    );
}

pub fn print_summary(parsed: &ParsedResults)
{
    for summary in summarize(parsed)
    {
        println!("{:20} {:6} {:19} {:19} {:8.2} {:8.2} {:8.2} {:8.2} {:8.2} {:8.2} {:8.2} {:8.2} {:8.2}",
                 summary.ssid,
                 summary.count,
                 summary.first.format("%Y-%m-%d %H:%M:%S").to_string(),
                 summary.last.format("%Y-%m-%d %H:%M:%S").to_string(),
                 summary.download.min,
                 summary.download.mean,
                 summary.download.max,
                 summary.upload.min,
                 summary.upload.mean,
                 summary.upload.max,
                 summary.ping.min,
                 summary.ping.mean,
                 summary.ping.max,
        );
    }
}
