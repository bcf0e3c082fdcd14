use std::{borrow::Cow, collections::BTreeMap, fs, io, path::Path};
use log::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{SpeedError, SpeedResult};

/// The keys every stored record must carry.
pub const RECORD_FIELDS: [&str; 7] = ["Provider", "ip_address", "ping", "download", "upload", "ssid", "all_info"];

/// Value stored as ssid when no wireless interface reported one.
pub const WIRED_SSID: &str = "wired";

/// One speed test run, in the layout of the results file.
/// The speed and ping values are kept as the text the speed test printed, eg. "34.56 Mbit/s".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    #[serde(rename = "Provider")]
    pub provider: String,
    pub ip_address: String,
    pub ping: String,
    pub download: String,
    pub upload: String,
    pub ssid: String,
    pub all_info: String,
    /// keys written by other tools are kept so a save does not drop them
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl MeasurementRecord {
    /// Look up an attribute by its key in the results file.
    pub fn field(&self, key: &str) -> Option<Cow<'_, str>>
    {
        match key {
            "Provider" => Some(Cow::Borrowed(self.provider.as_str())),
            "ip_address" => Some(Cow::Borrowed(self.ip_address.as_str())),
            "ping" => Some(Cow::Borrowed(self.ping.as_str())),
            "download" => Some(Cow::Borrowed(self.download.as_str())),
            "upload" => Some(Cow::Borrowed(self.upload.as_str())),
            "ssid" => Some(Cow::Borrowed(self.ssid.as_str())),
            "all_info" => Some(Cow::Borrowed(self.all_info.as_str())),
            other => self.extra.get(other).map(|value| match value {
                Value::String(text) => Cow::Borrowed(text.as_str()),
                value => Cow::Owned(value.to_string()),
            }),
        }
    }
}

/// All measurements, keyed by "YYYY-MM-DD HH:MM:SS".
/// Keys sort chronologically because of the fixed layout.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResultStore {
    records: BTreeMap<String, MeasurementRecord>,
}

impl ResultStore {
    pub fn new() -> Self
    {
        Default::default()
    }

    pub fn len(&self) -> usize
    {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.records.is_empty()
    }

    pub fn get(&self, timestamp: &str) -> Option<&MeasurementRecord>
    {
        self.records.get(timestamp)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MeasurementRecord)>
    {
        self.records.iter()
    }

    /// Add a new measurement. Existing records are never replaced.
    pub fn insert(
        &mut self,
        timestamp: String,
        record: MeasurementRecord,
    ) -> SpeedResult<()>
    {
        if self.records.contains_key(&timestamp)
        {
            return Err(SpeedError::DuplicateTimestamp(timestamp));
        }
        debug!("store: insert {} ssid: {}, download: {}, upload: {}, ping: {}", timestamp, record.ssid, record.download, record.upload, record.ping);
        self.records.insert(timestamp, record);
        Ok(())
    }

    pub fn from_json_str(json: &str) -> SpeedResult<Self>
    {
        if json.trim().is_empty() { return Ok(Self::new()) };

        let raw: BTreeMap<String, Map<String, Value>> = serde_json::from_str(json)?;
        let mut records = BTreeMap::new();
        for (timestamp, fields) in raw
        {
            if let Some(missing) = RECORD_FIELDS.iter().find(|field| !fields.contains_key(**field))
            {
                return Err(SpeedError::MissingField { timestamp, field: missing.to_string() });
            }
            let record: MeasurementRecord = serde_json::from_value(Value::Object(fields))?;
            records.insert(timestamp, record);
        }
        Ok(Self { records })
    }

    /// Serialize the store with the keys of every record sorted.
    /// Pretty output uses four space indentation so the file stays readable by hand.
    pub fn to_json_string(&self, pretty: bool) -> SpeedResult<String>
    {
        // serde_json maps are ordered by key, the record structs are not
        let sorted = serde_json::to_value(self)?;
        if !pretty { return Ok(serde_json::to_string(&sorted)?) };

        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        sorted.serialize(&mut serializer)?;
        String::from_utf8(buffer).map_err(|error| SpeedError::parse(error.to_string()))
    }

    /// Read a results file. A file that does not exist yet, or is empty, is an empty store.
    pub fn load(path: &Path) -> SpeedResult<Self>
    {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                info!("no results file at {}, starting with an empty store", path.display());
                return Ok(Self::new());
            },
            Err(error) => return Err(error.into()),
        };
        let store = Self::from_json_str(&json)?;
        debug!("loaded {} records from {}", store.len(), path.display());
        Ok(store)
    }

    pub fn save(
        &self,
        path: &Path,
        pretty: bool,
    ) -> SpeedResult<()>
    {
        let json = self.to_json_string(pretty)?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty())
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json)?;
        debug!("saved {} records to {}", self.len(), path.display());
        Ok(())
    }
}

impl FromIterator<(String, MeasurementRecord)> for ResultStore {
    fn from_iter<I: IntoIterator<Item = (String, MeasurementRecord)>>(iter: I) -> Self
    {
        Self { records: iter.into_iter().collect() }
    }
}
