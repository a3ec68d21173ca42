//! Measures time taken by single phases of the backend.
//!
//! Every stage of a procedure's pipeline opens a [`timed_scope!`]. The
//! collected measurements are nested by their time intervals, so a stage
//! that runs inside another one is printed indented below it.
//!
//! This is NOT an utility that should be used for benchmarking!
//! Benchmarking involves running a program multiple times with
//! warm up phases and median/avg/stddev of measurements.

use std::{
    fmt,
    fs::File,
    io,
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

lazy_static::lazy_static! {
    static ref TIMINGS: Mutex<Timings> = Mutex::new(Timings { measurements: Vec::new() });
}

fn timings() -> MutexGuard<'static, Timings> {
    // a panic while holding the lock cannot leave a half-pushed measurement
    TIMINGS.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone)]
pub struct Measurement {
    start: Instant,
    label: String,
}

impl Measurement {
    pub fn start(label: impl Into<String>) -> Measurement {
        Self {
            start: Instant::now(),
            label: label.into(),
        }
    }

    pub fn stop(&self) {
        let measurement = CompletedMeasurement {
            label: self.label.clone(),
            start: self.start,
            stop: Instant::now(),
        };
        timings().measurements.push(measurement);
    }

    pub fn guard(label: impl Into<String>) -> MeasurementGuard {
        MeasurementGuard(Measurement::start(label))
    }
}

/// Stops the measurement when dropped.
pub struct MeasurementGuard(Measurement);

impl Drop for MeasurementGuard {
    fn drop(&mut self) {
        self.0.stop();
    }
}

/// Measure the rest of the enclosing scope. Takes a label or a format string
/// with arguments.
#[macro_export]
macro_rules! timed_scope {
    ($label:expr) => {
        let _measurement = $crate::timing::Measurement::guard($label);
    };
    ($fmt:expr, $($arg:tt)+) => {
        let _measurement = $crate::timing::Measurement::guard(format!($fmt, $($arg)+));
    };
}

#[derive(Debug, Clone)]
struct CompletedMeasurement {
    start: Instant,
    stop: Instant,
    label: String,
}

impl CompletedMeasurement {
    fn duration(&self) -> Duration {
        self.stop.duration_since(self.start)
    }
}

#[derive(Debug, Clone)]
struct Timings {
    measurements: Vec<CompletedMeasurement>,
}

impl fmt::Display for Timings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        AsciiDisp(&CompilerMeasurements::from(self.clone())).fmt(f)
    }
}

impl<'a> fmt::Display for AsciiDisp<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let min_label_width = 50;

        for timing in self.0 {
            let indent = "  ".repeat(timing.indent);

            writeln!(
                f,
                "{nesting}{: <label_width$}    {: >ms_width$}ms",
                timing.label,
                timing.duration.as_millis(),
                nesting = indent,
                label_width = min_label_width.max(indent.len()) - indent.len(),
                ms_width = 6
            )?;
        }

        Ok(())
    }
}

/// All measurements completed so far, nested and sorted by start time.
pub fn snapshot() -> CompilerMeasurements {
    CompilerMeasurements::from(timings().clone())
}

/// Report the measurements to stderr if `MEASURE_STDERR` is set and as JSON
/// to the file named by `MEASURE_JSON`.
pub fn print() -> io::Result<()> {
    if std::env::var("MEASURE_STDERR").is_ok() {
        eprintln!("Performance Analysis");
        eprintln!("====================\n");
        eprintln!("{}", *timings());
    }

    if let Ok(path) = std::env::var("MEASURE_JSON") {
        let file = File::create(path)?;
        serde_json::to_writer(file, &snapshot())?;
    }

    Ok(())
}

// Frozen and completed measurements that can be serialized
pub type CompilerMeasurements = Vec<SingleMeasurement>;
pub struct AsciiDisp<'a>(pub &'a CompilerMeasurements);

impl From<Timings> for CompilerMeasurements {
    fn from(measurements: Timings) -> Self {
        let mut frozen = vec![];
        let mut active = vec![];

        let mut listing = measurements.measurements;
        listing.sort_by(|a, b| a.start.cmp(&b.start));

        for timing in listing.into_iter() {
            active.retain(|measurement: &CompletedMeasurement| measurement.stop > timing.start);

            frozen.push(SingleMeasurement {
                label: timing.label.clone(),
                indent: active.len(),
                duration: timing.duration(),
            });

            active.push(timing);
        }

        frozen
    }
}

#[derive(Debug, Clone, serde_derive::Serialize, serde_derive::Deserialize)]
pub struct SingleMeasurement {
    pub label: String,
    pub indent: usize,
    pub duration: Duration,
}
