use log::*;

use crate::store::ResultStore;

/// Keep the records whose attribute `key` equals `value`. Both sides are compared with surrounding whitespace removed.
/// A store without matches gives an empty store.
pub fn filter_store(
    store: &ResultStore,
    key: &str,
    value: &str,
) -> ResultStore
{
    let key = key.trim();
    let value = value.trim();
    let filtered: ResultStore = store.iter()
        .filter(|(_, record)| record.field(key).map_or(false, |field| field.trim() == value))
        .map(|(timestamp, record)| (timestamp.clone(), record.clone()))
        .collect();
    debug!("filter {}={}: kept {} of {} records", key, value, filtered.len(), store.len());
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::record;

    fn store() -> ResultStore
    {
        vec![
            ("2023-04-01 10:00:00".to_string(), record("HomeNet", "30 Mbit/s", "5 Mbit/s", "20 ms")),
            ("2023-04-01 11:00:00".to_string(), record("Office", "60 Mbit/s", "9 Mbit/s", "10 ms")),
            ("2023-04-01 12:00:00".to_string(), record(" HomeNet ", "35 Mbit/s", "6 Mbit/s", "22 ms")),
        ].into_iter().collect()
    }

    #[test]
    fn keeps_only_matching_records_in_order()
    {
        let filtered = filter_store(&store(), "ssid", "HomeNet");
        let keys: Vec<&String> = filtered.iter().map(|(timestamp, _)| timestamp).collect();
        assert_eq!(keys, vec!["2023-04-01 10:00:00", "2023-04-01 12:00:00"]);
    }

    #[test]
    fn no_match_is_empty_not_an_error()
    {
        assert!(filter_store(&store(), "ssid", "Cafe").is_empty());
        assert!(filter_store(&store(), "no_such_key", "HomeNet").is_empty());
    }

    #[test]
    fn input_store_is_untouched()
    {
        let original = store();
        let _ = filter_store(&original, " Provider ", "Example Cable");
        assert_eq!(original, store());
    }
}
