use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::*;
use regex::Regex;

use crate::error::{SpeedError, SpeedResult};
use crate::store::ResultStore;

const TIMESTAMP_PATTERN: &str = r"^(\d{4})-(\d\d)-(\d\d) (\d\d):(\d\d):(\d\d)$";
const NUMBER_PATTERN: &str = r"(\d+(?:\.\d+)?)\s*[Mm]";

/// Day every timestamp is moved to when days are overlaid on one time-of-day axis.
pub fn reference_day() -> NaiveDate
{
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default()
}

/// The results as parallel vectors, ordered by timestamp.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParsedResults {
    pub timestamps: Vec<NaiveDateTime>,
    pub uploads: Vec<f64>,
    pub downloads: Vec<f64>,
    pub pings: Vec<f64>,
    pub ssids: Vec<String>,
    pub raw_infos: Vec<String>,
}

impl ParsedResults {
    pub fn len(&self) -> usize
    {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.timestamps.is_empty()
    }
}

pub struct ResultParser {
    timestamp: Regex,
    number: Regex,
}

impl ResultParser {
    pub fn new() -> Self
    {
        // both patterns are constants
        Self {
            timestamp: Regex::new(TIMESTAMP_PATTERN).unwrap(),
            number: Regex::new(NUMBER_PATTERN).unwrap(),
        }
    }

    pub fn parse_timestamp(&self, text: &str) -> SpeedResult<NaiveDateTime>
    {
        let captures = self.timestamp.captures(text)
            .ok_or_else(|| SpeedError::parse(format!("timestamp `{}` is not YYYY-MM-DD HH:MM:SS", text)))?;
        let part = |index: usize| -> u32 { captures[index].parse().unwrap_or(u32::MAX) };
        let year = captures[1].parse::<i32>().unwrap_or(i32::MAX);
        let date = NaiveDate::from_ymd_opt(year, part(2), part(3));
        let time = NaiveTime::from_hms_opt(part(4), part(5), part(6));
        match (date, time) {
            (Some(date), Some(time)) => Ok(date.and_time(time)),
            _ => Err(SpeedError::parse(format!("timestamp `{}` is not a valid date and time", text))),
        }
    }

    /// Take the number in front of the unit letter, eg. 34.5 from "34.5 Mbit/s" or 21.3 from "21.3 ms".
    pub fn parse_number(&self, text: &str) -> SpeedResult<f64>
    {
        let captures = self.number.captures(text)
            .ok_or_else(|| SpeedError::parse(format!("`{}` is not a number followed by a unit", text)))?;
        captures[1].parse::<f64>()
            .map_err(|error| SpeedError::parse(format!("`{}`: {}", text, error)))
    }

    /// Turn the store into ordered vectors.
    /// The first malformed record aborts the parse.
    /// With `normalize_days` every timestamp is moved to the reference day, so measurements of different days share one time axis.
    pub fn parse(
        &self,
        store: &ResultStore,
        normalize_days: bool,
    ) -> SpeedResult<ParsedResults>
    {
        let mut parsed = ParsedResults::default();
        for (key, record) in store.iter()
        {
            let timestamp = self.parse_timestamp(key)?;
            parsed.timestamps.push(if normalize_days { reference_day().and_time(timestamp.time()) } else { timestamp });
            parsed.uploads.push(self.parse_number(&record.upload)?);
            parsed.downloads.push(self.parse_number(&record.download)?);
            parsed.pings.push(self.parse_number(&record.ping)?);
            parsed.ssids.push(record.ssid.clone());
            parsed.raw_infos.push(record.all_info.clone());
        }
        debug!("parsed {} records, days normalized: {}", parsed.len(), normalize_days);
        Ok(parsed)
    }
}

impl Default for ResultParser {
    fn default() -> Self
    {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::record;

    #[test]
    fn numbers_are_taken_before_the_unit()
    {
        let parser = ResultParser::new();
        assert_eq!(parser.parse_number("34.5M").unwrap(), 34.5);
        assert_eq!(parser.parse_number("93.12 Mbit/s").unwrap(), 93.12);
        assert_eq!(parser.parse_number("21.337 ms").unwrap(), 21.337);
        assert!(matches!(parser.parse_number("fast"), Err(SpeedError::Parse(_))));
        assert!(matches!(parser.parse_number("12 kbit/s"), Err(SpeedError::Parse(_))));
    }

    #[test]
    fn timestamps_must_have_the_fixed_layout()
    {
        let parser = ResultParser::new();
        let parsed = parser.parse_timestamp("2023-04-01 13:05:09").unwrap();
        assert_eq!(parsed.to_string(), "2023-04-01 13:05:09");
        assert!(parser.parse_timestamp("2023-04-01T13:05:09").is_err());
        assert!(parser.parse_timestamp("2023-13-01 13:05:09").is_err());
        assert!(parser.parse_timestamp("x2023-04-01 13:05:09").is_err());
    }

    #[test]
    fn parse_orders_by_timestamp()
    {
        let store: ResultStore = vec![
            ("2023-04-02 08:00:00".to_string(), record("b", "20 Mbit/s", "2 Mbit/s", "12 ms")),
            ("2023-04-01 09:30:00".to_string(), record("a", "10 Mbit/s", "1 Mbit/s", "11 ms")),
        ].into_iter().collect();
        let parsed = ResultParser::new().parse(&store, true).unwrap();
        assert_eq!(parsed.downloads, vec![10.0, 20.0]);
        assert_eq!(parsed.uploads, vec![1.0, 2.0]);
        assert_eq!(parsed.pings, vec![11.0, 12.0]);
        assert_eq!(parsed.ssids, vec!["a", "b"]);
        assert_eq!(parsed.timestamps[0].to_string(), "2000-01-01 09:30:00");
        assert_eq!(parsed.timestamps[1].to_string(), "2000-01-01 08:00:00");
    }

    #[test]
    fn first_malformed_record_aborts()
    {
        let store: ResultStore = vec![
            ("2023-04-01 09:30:00".to_string(), record("a", "10 Mbit/s", "1 Mbit/s", "11 ms")),
            ("2023-04-01 10:30:00".to_string(), record("a", "n/a", "1 Mbit/s", "11 ms")),
        ].into_iter().collect();
        assert!(matches!(ResultParser::new().parse(&store, false), Err(SpeedError::Parse(_))));

        let store: ResultStore = vec![("yesterday".to_string(), record("a", "10 Mbit/s", "1 Mbit/s", "11 ms"))].into_iter().collect();
        assert!(matches!(ResultParser::new().parse(&store, false), Err(SpeedError::Parse(_))));
    }
}
