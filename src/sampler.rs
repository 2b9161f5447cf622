//! Sampling loop: measure, record, wait out the rest of the interval
//!
//! The wait is measured from the start of each sample, so a slow camera
//! capture eats into the pause instead of stretching the cadence. A sample
//! that overruns the interval is followed immediately by the next one.

use anyhow::Context;
use chrono::Local;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::Instant;

use crate::actuators::camera::Camera;
use crate::config::Config;
use crate::datalog::{DayLog, Record, CPU_PREFIX};
use crate::sensors::sysinfo::HostMonitor;
use crate::stations::Station;

/// Where each sample goes once it has been measured
pub struct Recorder {
    station_log: DayLog,
    telemetry: Option<(DayLog, HostMonitor)>,
    camera: Option<Camera>,
}

impl Recorder {
    pub fn new(station_log: DayLog) -> Self {
        Self {
            station_log,
            telemetry: None,
            camera: None,
        }
    }

    /// Recorder for a station, honouring the storage and camera settings
    pub fn for_station<S: Station>(config: &Config, camera: bool) -> Self {
        let data_dir = &config.storage.data_dir;
        let mut recorder = Self::new(DayLog::new(data_dir, S::LOG_PREFIX));
        if config.storage.telemetry {
            recorder =
                recorder.with_telemetry(DayLog::new(data_dir, CPU_PREFIX), HostMonitor::new());
        }
        if camera {
            recorder = recorder.with_camera(Camera::new(
                config.camera.clone(),
                &config.storage.image_dir,
            ));
        }
        recorder
    }

    pub fn with_telemetry(mut self, log: DayLog, monitor: HostMonitor) -> Self {
        self.telemetry = Some((log, monitor));
        self
    }

    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.camera = Some(camera);
        self
    }

    /// Print and persist one sample.
    ///
    /// Only a failed station row is an error; telemetry and camera problems
    /// are logged and the sample still counts.
    pub async fn record<S: Station>(&mut self, sample: &S::Sample) -> anyhow::Result<()> {
        println!("{}", sample);

        let path = self
            .station_log
            .append(sample)
            .with_context(|| format!("Failed to append {} row", S::NAME))?;
        tracing::debug!("Appended {} row to {:?}", S::NAME, path);

        let taken_at = sample.taken_at();

        if let Some((log, monitor)) = &mut self.telemetry {
            let telemetry = monitor.sample(taken_at);
            if let Err(e) = log.append(&telemetry) {
                tracing::warn!("Failed to append telemetry row: {}", e);
            }
        }

        if let Some(camera) = &mut self.camera {
            if let Err(e) = camera.on_sample(taken_at).await {
                tracing::warn!("Image capture failed: {:#}", e);
            }
        }

        Ok(())
    }
}

/// Sample `station` every `interval` until `shutdown` resolves or a sample
/// fails. The station is released either way; returns the number of samples
/// recorded.
pub async fn run<S, F>(
    station: &mut S,
    recorder: &mut Recorder,
    interval: Duration,
    shutdown: F,
) -> anyhow::Result<u64>
where
    S: Station,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    tracing::info!("Sampling {} every {:?}", S::NAME, interval);

    let mut count = 0;
    let outcome = sample_loop(station, recorder, interval, shutdown.as_mut(), &mut count).await;

    let released = station
        .release()
        .with_context(|| format!("Failed to release {} sensors", S::NAME));

    match (outcome, released) {
        (Ok(()), Ok(())) => Ok(count),
        (Ok(()), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(release_err)) => {
            tracing::warn!("{:#}", release_err);
            Err(e)
        }
    }
}

async fn sample_loop<S, F>(
    station: &mut S,
    recorder: &mut Recorder,
    interval: Duration,
    mut shutdown: Pin<&mut F>,
    count: &mut u64,
) -> anyhow::Result<()>
where
    S: Station,
    F: Future<Output = ()>,
{
    loop {
        let started = Instant::now();

        let sample = station
            .measure(Local::now())
            .with_context(|| format!("{} measurement failed", S::NAME))?;
        recorder.record::<S>(&sample).await?;
        *count += 1;

        tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::info!("Shutdown requested, stopping {}", S::NAME);
                return Ok(());
            }
            _ = tokio::time::sleep_until(started + interval) => {}
        }
    }
}

/// Install the SIGINT and SIGTERM handlers and return a future that
/// resolves on the first of them.
///
/// The handlers are live from this call on, so a signal that lands while a
/// sample is being taken is held until the loop next waits.
pub fn shutdown_signal() -> io::Result<impl Future<Output = ()>> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => tracing::info!("Received SIGINT"),
            _ = terminate.recv() => tracing::info!("Received SIGTERM"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Local};
    use std::fmt;
    use std::fs;

    use crate::datalog::tests::scratch_dir;

    const INTERVAL: Duration = Duration::from_secs(10);

    struct Tick {
        at: DateTime<Local>,
        n: u32,
    }

    impl Record for Tick {
        fn taken_at(&self) -> DateTime<Local> {
            self.at
        }

        fn fields(&self) -> Vec<String> {
            vec![self.n.to_string()]
        }
    }

    impl fmt::Display for Tick {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "tick {}", self.n)
        }
    }

    #[derive(Default)]
    struct FakeStation {
        measured_at: Vec<Instant>,
        fail_on: Option<u32>,
        sigterm_on: Option<u32>,
        released: bool,
    }

    impl Station for FakeStation {
        type Sample = Tick;

        const NAME: &'static str = "fake";
        const LOG_PREFIX: &'static str = "fake_logs";

        fn measure(&mut self, at: DateTime<Local>) -> anyhow::Result<Tick> {
            let n = self.measured_at.len() as u32;
            if self.fail_on == Some(n) {
                anyhow::bail!("bus went away");
            }
            if self.sigterm_on == Some(n) {
                let status = std::process::Command::new("kill")
                    .args(["-TERM", &std::process::id().to_string()])
                    .status()?;
                assert!(status.success());
            }
            self.measured_at.push(Instant::now());
            Ok(Tick { at, n })
        }

        fn release(&mut self) -> anyhow::Result<()> {
            self.released = true;
            Ok(())
        }
    }

    fn rows(dir: &std::path::Path) -> Vec<String> {
        let mut rows = Vec::new();
        let mut files: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "csv"))
            .collect();
        files.sort();
        for file in files {
            let contents = fs::read_to_string(file).unwrap();
            rows.extend(contents.split_terminator("\r\n").map(str::to_string));
        }
        rows
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_shutdown_and_releases() {
        let dir = scratch_dir("sampler-shutdown");
        let mut station = FakeStation::default();
        let mut recorder = Recorder::new(DayLog::new(&dir, FakeStation::LOG_PREFIX));

        // Samples at 0s, 10s and 20s; shutdown lands during the third wait.
        let shutdown = tokio::time::sleep(Duration::from_secs(25));
        let count = run(&mut station, &mut recorder, INTERVAL, shutdown)
            .await
            .unwrap();

        assert_eq!(count, 3);
        assert!(station.released);

        let rows = rows(&dir);
        assert_eq!(rows.len(), 3);
        for (i, row) in rows.iter().enumerate() {
            assert!(row.ends_with(&format!(",{}", i)), "row {:?}", row);
        }
        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_samples_one_interval_apart() {
        let dir = scratch_dir("sampler-cadence");
        let mut station = FakeStation::default();
        let mut recorder = Recorder::new(DayLog::new(&dir, FakeStation::LOG_PREFIX));

        let shutdown = tokio::time::sleep(Duration::from_secs(45));
        run(&mut station, &mut recorder, INTERVAL, shutdown)
            .await
            .unwrap();

        assert_eq!(station.measured_at.len(), 5);
        for pair in station.measured_at.windows(2) {
            assert_eq!(pair[1] - pair[0], INTERVAL);
        }
        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_measure_error_still_releases() {
        let dir = scratch_dir("sampler-error");
        let mut station = FakeStation {
            fail_on: Some(2),
            ..FakeStation::default()
        };
        let mut recorder = Recorder::new(DayLog::new(&dir, FakeStation::LOG_PREFIX));

        let err = run(
            &mut station,
            &mut recorder,
            INTERVAL,
            std::future::pending::<()>(),
        )
        .await
        .unwrap_err();

        assert!(format!("{:#}", err).contains("bus went away"));
        assert!(station.released);
        assert_eq!(rows(&dir).len(), 2);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unwritable_log_is_fatal() {
        let dir = scratch_dir("sampler-unwritable");
        let missing = dir.join("not-created");
        let mut station = FakeStation::default();
        let mut recorder = Recorder::new(DayLog::new(&missing, FakeStation::LOG_PREFIX));

        let result = run(
            &mut station,
            &mut recorder,
            INTERVAL,
            std::future::pending::<()>(),
        )
        .await;

        assert!(result.is_err());
        assert!(station.released);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_sigterm_during_first_sample_still_releases() {
        let dir = scratch_dir("sampler-sigterm");
        let mut station = FakeStation {
            sigterm_on: Some(0),
            ..FakeStation::default()
        };
        let mut recorder = Recorder::new(DayLog::new(&dir, FakeStation::LOG_PREFIX));

        let shutdown = shutdown_signal().unwrap();
        let count = tokio::time::timeout(
            Duration::from_secs(30),
            run(&mut station, &mut recorder, Duration::from_secs(60), shutdown),
        )
        .await
        .expect("SIGTERM was not seen at the first wait")
        .unwrap();

        assert_eq!(count, 1);
        assert!(station.released);
        assert_eq!(rows(&dir).len(), 1);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_camera_and_telemetry_failures_do_not_stop_sampling() {
        use crate::config::CameraConfig;

        let dir = scratch_dir("sampler-aux");
        let image_dir = dir.join("img");
        let camera = Camera::new(
            CameraConfig {
                command: "false".to_string(),
                args: vec![],
                every_samples: 1000,
                ..CameraConfig::default()
            },
            &image_dir,
        );
        let mut station = FakeStation::default();
        let mut recorder = Recorder::new(DayLog::new(&dir, FakeStation::LOG_PREFIX))
            .with_telemetry(
                DayLog::new(dir.join("not-created"), CPU_PREFIX),
                HostMonitor::new(),
            )
            .with_camera(camera);

        let shutdown = tokio::time::sleep(Duration::from_secs(25));
        let count = run(&mut station, &mut recorder, INTERVAL, shutdown)
            .await
            .unwrap();

        assert_eq!(count, 3);
        assert!(station.released);
        // The capture was attempted on the first sample and failed.
        assert!(image_dir.is_dir());
        assert!(!dir.join("not-created").exists());

        assert_eq!(rows(&dir).len(), 3);
        fs::remove_dir_all(&dir).unwrap();
    }
}
