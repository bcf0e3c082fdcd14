use std::{fs, io, path::{Path, PathBuf}};
use std::sync::{atomic::{AtomicBool, Ordering}, Arc};
use std::time::Duration;
use log::*;
use tokio::time::{self, Instant};

use crate::acquisition::Measurement;
use crate::error::{SpeedError, SpeedResult};
use crate::store::ResultStore;

/// How often a sleeping runner looks at the stop flag.
const STOP_POLL: Duration = Duration::from_millis(250);

/// Turn "5" "min" into a duration. Units: s/sec/secs, m/min/mins, h/hour/hours, d/day/days.
pub fn parse_period(
    amount: &str,
    unit: &str,
) -> SpeedResult<Duration>
{
    let amount: u64 = amount.trim().parse()
        .map_err(|_| SpeedError::Config(format!("`{}` is not a whole number", amount)))?;
    let seconds_per_unit = match unit.trim() {
        "s" | "sec" | "secs" => 1,
        "m" | "min" | "mins" => 60,
        "h" | "hour" | "hours" => 3600,
        "d" | "day" | "days" => 86400,
        other => return Err(SpeedError::Config(format!("unit `{}` is not accepted, use sec, min, hour or day", other))),
    };
    let seconds = amount.checked_mul(seconds_per_unit)
        .ok_or_else(|| SpeedError::Config(format!("{} {} is too long a period", amount, unit.trim())))?;
    Ok(Duration::from_secs(seconds))
}

/// A control file holding the process id of a running runner.
/// Emptying the file asks the runner to stop after its current measurement.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Take the file for this process. It must be absent or empty, otherwise another runner owns it.
    pub fn claim(path: &Path) -> SpeedResult<Self>
    {
        match fs::read_to_string(path) {
            Ok(content) if !content.trim().is_empty() => {
                error!("pid file {} is not blank, cannot start", path.display());
                return Err(SpeedError::PidFile { path: path.to_path_buf(), reason: format!("not blank, holds `{}`", content.trim()) });
            },
            Ok(_) => {},
            Err(error) if error.kind() == io::ErrorKind::NotFound => {},
            Err(error) => return Err(error.into()),
        }
        fs::write(path, std::process::id().to_string())?;
        debug!("pid file {} claimed for pid {}", path.display(), std::process::id());
        Ok(Self { path: path.to_path_buf() })
    }

    /// True once the file was emptied (or removed).
    pub fn stop_requested(&self) -> SpeedResult<bool>
    {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.trim().is_empty()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(error) => Err(error.into()),
        }
    }
}

impl Drop for PidFile {
    fn drop(&mut self)
    {
        info!("tearing down runner, clearing {}", self.path.display());
        if let Err(error) = fs::write(&self.path, "")
        {
            warn!("could not clear pid file {}: {}", self.path.display(), error);
        }
    }
}

/// Ask the runner owning `path` to stop, by emptying the file.
pub fn request_stop(path: &Path) -> SpeedResult<()>
{
    let content = fs::read_to_string(path)
        .map_err(|error| SpeedError::PidFile { path: path.to_path_buf(), reason: error.to_string() })?;
    if content.trim().is_empty()
    {
        warn!("pid file {} is already blank, no runner to stop", path.display());
    }
    fs::write(path, "")?;
    info!("asked runner {} to stop", content.trim());
    Ok(())
}

/// Measures and saves the result every `interval`, until `duration` has passed or it is told to stop.
pub struct Runner<M: Measurement> {
    measurement: M,
    store: ResultStore,
    results_file: PathBuf,
    pretty: bool,
    interval: Duration,
    duration: Duration,
    pidfile: Option<PidFile>,
    stop: Arc<AtomicBool>,
}

impl<M: Measurement> Runner<M> {
    pub fn new(
        measurement: M,
        store: ResultStore,
        results_file: PathBuf,
        interval: Duration,
        duration: Duration,
    ) -> Self
    {
        Self {
            measurement,
            store,
            results_file,
            pretty: true,
            interval,
            duration,
            pidfile: None,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_pidfile(mut self, pidfile: PidFile) -> Self
    {
        self.pidfile = Some(pidfile);
        self
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self
    {
        self.pretty = pretty;
        self
    }

    /// Setting the returned flag stops the runner at the next check.
    pub fn stop_flag(&self) -> Arc<AtomicBool>
    {
        self.stop.clone()
    }

    pub fn store(&self) -> &ResultStore
    {
        &self.store
    }

    fn should_stop(&self) -> SpeedResult<bool>
    {
        if self.stop.load(Ordering::SeqCst) { return Ok(true) };
        match &self.pidfile {
            Some(pidfile) => pidfile.stop_requested(),
            None => Ok(false),
        }
    }

    async fn sleep(&self)
    {
        let deadline = Instant::now() + self.interval;
        while !self.stop.load(Ordering::SeqCst)
        {
            let now = Instant::now();
            if now >= deadline { break };
            time::sleep((deadline - now).min(STOP_POLL)).await;
        }
    }

    /// Run until done. Returns the number of executions.
    /// A failed measurement is logged and skipped; a failure to save the results ends the run.
    pub async fn run(&mut self) -> SpeedResult<u64>
    {
        let start_time = Instant::now();
        let mut executions: u64 = 0;
        loop
        {
            executions += 1;
            info!("execution number {}, elapsed secs = {:.0}", executions, start_time.elapsed().as_secs_f64());
            match self.measurement.measure() {
                Ok((timestamp, record)) => {
                    match self.store.insert(timestamp, record) {
                        Ok(()) => self.store.save(&self.results_file, self.pretty)?,
                        Err(error) => warn!("result not stored: {}", error),
                    }
                },
                Err(error) => warn!("measurement failed: {}", error),
            }
            if self.should_stop()?
            {
                info!("runner was told to stop");
                break;
            }
            info!("done, now sleeping for {} second(s)", self.interval.as_secs());
            self.sleep().await;
            if self.stop.load(Ordering::SeqCst)
            {
                info!("runner was interrupted");
                break;
            }
            if start_time.elapsed() > self.duration { break };
        }
        Ok(executions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::record;

    struct FakeMeasurement {
        calls: u32,
        empty_pidfile_after: Option<(u32, PathBuf)>,
        fail_on: Option<u32>,
    }

    impl Measurement for FakeMeasurement {
        fn measure(&mut self) -> SpeedResult<(String, crate::store::MeasurementRecord)>
        {
            self.calls += 1;
            if let Some((after, path)) = &self.empty_pidfile_after
            {
                if self.calls >= *after { fs::write(path, "").unwrap() };
            }
            if self.fail_on == Some(self.calls) { return Err(SpeedError::Acquisition("ping".to_string())) };
            Ok((format!("2023-04-01 10:00:{:02}", self.calls), record("HomeNet", "10 Mbit/s", "1 Mbit/s", "9 ms")))
        }
    }

    #[test]
    fn periods_in_every_unit()
    {
        assert_eq!(parse_period("30", "s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_period("5", "min").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_period("2", "hours").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_period("1", "day").unwrap(), Duration::from_secs(86400));
        assert!(matches!(parse_period("1", "fortnight"), Err(SpeedError::Config(_))));
        assert!(matches!(parse_period("soon", "min"), Err(SpeedError::Config(_))));
        assert!(matches!(parse_period("999999999999999", "days"), Err(SpeedError::Config(_))));
        assert_eq!(parse_period(&u64::MAX.to_string(), "s").unwrap(), Duration::from_secs(u64::MAX));
    }

    #[test]
    fn pid_file_must_be_blank_and_is_cleared_on_drop()
    {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runner.pid");
        fs::write(&path, "4242").unwrap();
        assert!(matches!(PidFile::claim(&path), Err(SpeedError::PidFile { .. })));

        fs::write(&path, "").unwrap();
        let pidfile = PidFile::claim(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), std::process::id().to_string());
        assert!(!pidfile.stop_requested().unwrap());
        drop(pidfile);
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn request_stop_empties_the_pid_file()
    {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runner.pid");
        let pidfile = PidFile::claim(&path).unwrap();
        request_stop(&path).unwrap();
        assert!(pidfile.stop_requested().unwrap());
        assert!(request_stop(&dir.path().join("missing.pid")).is_err());
    }

    #[tokio::test]
    async fn runner_stops_when_pid_file_is_emptied()
    {
        let dir = tempfile::tempdir().unwrap();
        let pid_path = dir.path().join("runner.pid");
        let results_file = dir.path().join("speedresults.json");
        let measurement = FakeMeasurement { calls: 0, empty_pidfile_after: Some((3, pid_path.clone())), fail_on: Some(2) };
        let mut runner = Runner::new(measurement, ResultStore::new(), results_file.clone(), Duration::from_millis(10), Duration::from_secs(60))
            .with_pidfile(PidFile::claim(&pid_path).unwrap());

        assert_eq!(runner.run().await.unwrap(), 3);
        // the second measurement failed
        assert_eq!(runner.store().len(), 2);
        assert_eq!(ResultStore::load(&results_file).unwrap(), *runner.store());
    }

    #[tokio::test]
    async fn runner_stops_after_its_duration()
    {
        let dir = tempfile::tempdir().unwrap();
        let measurement = FakeMeasurement { calls: 0, empty_pidfile_after: None, fail_on: None };
        let mut runner = Runner::new(measurement, ResultStore::new(), dir.path().join("speedresults.json"), Duration::from_millis(20), Duration::from_millis(50));
        let executions = runner.run().await.unwrap();
        assert!((1..=3).contains(&executions), "executions: {}", executions);
    }

    #[tokio::test]
    async fn stop_flag_interrupts_the_sleep()
    {
        let dir = tempfile::tempdir().unwrap();
        let measurement = FakeMeasurement { calls: 0, empty_pidfile_after: None, fail_on: None };
        let mut runner = Runner::new(measurement, ResultStore::new(), dir.path().join("speedresults.json"), Duration::from_secs(3600), Duration::from_secs(7200));
        runner.stop_flag().store(true, Ordering::SeqCst);
        assert_eq!(runner.run().await.unwrap(), 1);
    }
}
