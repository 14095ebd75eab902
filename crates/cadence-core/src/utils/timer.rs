// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A minimal monotonic stopwatch.

use std::time::{Duration, Instant};

/// Measures elapsed wall-clock time from the moment it was started.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: Option<Instant>,
}

impl Stopwatch {
    /// Creates a stopwatch that is already running.
    pub fn new() -> Self {
        Self {
            start: Some(Instant::now()),
        }
    }

    /// Creates a stopwatch that has not been started yet.
    pub fn stopped() -> Self {
        Self { start: None }
    }

    /// Restarts the stopwatch from zero.
    pub fn restart(&mut self) {
        self.start = Some(Instant::now());
    }

    /// Returns the elapsed time, or `None` if the stopwatch was never started.
    pub fn elapsed(&self) -> Option<Duration> {
        self.start.map(|start| start.elapsed())
    }

    /// Returns the elapsed time in seconds.
    pub fn elapsed_secs_f64(&self) -> Option<f64> {
        self.elapsed().map(|d| d.as_secs_f64())
    }

    /// Returns the elapsed time in microseconds.
    pub fn elapsed_micros_f64(&self) -> Option<f64> {
        self.elapsed_secs_f64().map(|secs| secs * 1_000_000.0)
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopped_stopwatch_reports_nothing() {
        let watch = Stopwatch::stopped();
        assert!(watch.elapsed().is_none());
        assert!(watch.elapsed_micros_f64().is_none());
    }

    #[test]
    fn test_running_stopwatch_is_monotonic() {
        let mut watch = Stopwatch::stopped();
        watch.restart();
        let first = watch.elapsed().unwrap();
        std::thread::sleep(Duration::from_millis(2));
        let second = watch.elapsed().unwrap();
        assert!(second > first, "elapsed time must grow");
    }
}
