use std::io;
use std::process::Command;
use chrono::Local;
use log::*;
use regex::Regex;

use crate::error::{SpeedError, SpeedResult};
use crate::store::{MeasurementRecord, WIRED_SSID};

const IPV4_PATTERN: &str = r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}";

/// Something that produces one timestamped measurement per call.
pub trait Measurement {
    fn measure(&mut self) -> SpeedResult<(String, MeasurementRecord)>;
}

/// Run a command and return its standard output.
pub fn run_command(argv: &[String]) -> SpeedResult<String>
{
    let Some((program, args)) = argv.split_first() else { return Err(SpeedError::Config("empty command".to_string())) };
    let rendered = argv.join(" ");
    debug!("running: {}", rendered);
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|error| match error.kind() {
            io::ErrorKind::NotFound => SpeedError::command(&rendered, format!("`{}` not found on PATH", program)),
            _ => SpeedError::command(&rendered, error.to_string()),
        })?;
    if !output.status.success()
    {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SpeedError::command(&rendered, format!("{} {}", output.status, stderr.trim())));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Pulls the fields of a record out of the text printed by speedtest-cli and the wireless interface listing.
pub struct OutputParser {
    from: Regex,
    ping: Regex,
    download: Regex,
    upload: Regex,
    ssid: Regex,
}

impl OutputParser {
    pub fn new() -> Self
    {
        // all patterns are constants
        Self {
            from: Regex::new(&format!(r"Testing from (.+) \(({})", IPV4_PATTERN)).unwrap(),
            ping: Regex::new(r"Hosted by.+?(\d+?.\d+?\sms)").unwrap(),
            download: Regex::new(r"Download: (.+?/s)").unwrap(),
            upload: Regex::new(r"Upload: (.+?/s)").unwrap(),
            ssid: Regex::new(r"SSID\s+: (.+)").unwrap(),
        }
    }

    fn capture(
        regex: &Regex,
        output: &str,
        group: usize,
        what: &str,
    ) -> SpeedResult<String>
    {
        regex.captures(output)
            .and_then(|captures| captures.get(group))
            .map(|found| found.as_str().to_string())
            .ok_or_else(|| SpeedError::Acquisition(what.to_string()))
    }

    /// The ssid is "wired" when the output has no SSID line.
    pub fn parse(&self, output: &str) -> SpeedResult<MeasurementRecord>
    {
        let provider = Self::capture(&self.from, output, 1, "provider")?;
        let ip_address = Self::capture(&self.from, output, 2, "ip address")?;
        let ping = Self::capture(&self.ping, output, 1, "ping")?;
        let download = Self::capture(&self.download, output, 1, "download speed")?;
        let upload = Self::capture(&self.upload, output, 1, "upload speed")?;
        let ssid = match self.ssid.captures(output).map(|captures| captures[1].trim().to_string()) {
            Some(ssid) if !ssid.is_empty() => ssid,
            _ => {
                info!("no SSID in the output, this is a wired connection");
                WIRED_SSID.to_string()
            },
        };
        debug!("provider: {}, ip: {}, ping: {}, download: {}, upload: {}, ssid: {}", provider, ip_address, ping, download, upload, ssid);
        Ok(MeasurementRecord {
            provider,
            ip_address,
            ping,
            download,
            upload,
            ssid,
            all_info: output.to_string(),
            extra: Default::default(),
        })
    }
}

impl Default for OutputParser {
    fn default() -> Self
    {
        Self::new()
    }
}

/// Runs the speed test command, and optionally the wireless interface command, and parses their output.
pub struct SpeedTester {
    speedtest_command: Vec<String>,
    ssid_command: Option<Vec<String>>,
    parser: OutputParser,
}

impl SpeedTester {
    pub fn new(
        speedtest_command: Vec<String>,
        ssid_command: Option<Vec<String>>,
    ) -> Self
    {
        Self {
            speedtest_command,
            ssid_command,
            parser: OutputParser::new(),
        }
    }
}

impl Measurement for SpeedTester {
    fn measure(&mut self) -> SpeedResult<(String, MeasurementRecord)>
    {
        info!("running test");
        let mut output = run_command(&self.speedtest_command)?;
        if let Some(ssid_command) = &self.ssid_command
        {
            match run_command(ssid_command) {
                Ok(interfaces) => output.push_str(&interfaces),
                Err(error) => warn!("no wireless interface information: {}", error),
            }
        }
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let record = self.parser.parse(&output)?;
        info!("test complete: download {}, upload {}, ping {}", record.download, record.upload, record.ping);
        Ok((timestamp, record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEEDTEST_OUTPUT: &str = "Retrieving speedtest.net configuration...\n\
Testing from Example Cable (203.0.113.7)...\n\
Retrieving speedtest.net server list...\n\
Selecting best server based on ping...\n\
Hosted by Fiber Town (Utrecht) [12.34 km]: 23.456 ms\n\
Testing download speed................................................................................\n\
Download: 93.12 Mbit/s\n\
Testing upload speed......................................................................................................\n\
Upload: 18.40 Mbit/s\n";

    const WLAN_OUTPUT: &str = "    SSID                   : HomeNet 5G\r\n    BSSID                  : aa:bb:cc:dd:ee:ff\r\n";

    #[test]
    fn speedtest_output_is_parsed()
    {
        let record = OutputParser::new().parse(SPEEDTEST_OUTPUT).unwrap();
        assert_eq!(record.provider, "Example Cable");
        assert_eq!(record.ip_address, "203.0.113.7");
        assert_eq!(record.ping, "23.456 ms");
        assert_eq!(record.download, "93.12 Mbit/s");
        assert_eq!(record.upload, "18.40 Mbit/s");
        assert_eq!(record.ssid, WIRED_SSID);
        assert_eq!(record.all_info, SPEEDTEST_OUTPUT);
    }

    #[test]
    fn ssid_is_taken_from_the_interface_listing()
    {
        let output = format!("{}{}", SPEEDTEST_OUTPUT, WLAN_OUTPUT);
        assert_eq!(OutputParser::new().parse(&output).unwrap().ssid, "HomeNet 5G");
    }

    #[test]
    fn missing_download_is_an_error()
    {
        let output = SPEEDTEST_OUTPUT.replace("Download:", "Dl:");
        match OutputParser::new().parse(&output) {
            Err(SpeedError::Acquisition(what)) => assert_eq!(what, "download speed"),
            other => panic!("expected an acquisition error, got {:?}", other),
        }
    }

    #[test]
    fn unknown_program_is_a_command_error()
    {
        let argv = vec!["speedgraph-no-such-program".to_string()];
        assert!(matches!(run_command(&argv), Err(SpeedError::Command { .. })));
        assert!(matches!(run_command(&[]), Err(SpeedError::Config(_))));
    }
}
