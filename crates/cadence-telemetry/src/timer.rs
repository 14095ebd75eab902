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

//! Provides RAII-based timers for automatically recording CPU samples. (RAII = Resource Acquisition Is Initialization)

use crate::timings::TimingSample;
use cadence_core::Stopwatch;
use std::borrow::Cow;

/// A utility for timing the duration of a scope and automatically pushing
/// the result into a sample list when it is dropped.
///
/// This leverages the RAII pattern to ensure that the measurement is always
/// recorded, even in the case of early returns.
pub struct ScopedTimer<'a> {
    stopwatch: Stopwatch,
    label: Cow<'static, str>,
    samples: &'a mut Vec<TimingSample>,
}

impl<'a> ScopedTimer<'a> {
    /// Creates a new timer for the given label and starts it immediately.
    pub fn new(label: impl Into<Cow<'static, str>>, samples: &'a mut Vec<TimingSample>) -> Self {
        Self {
            stopwatch: Stopwatch::new(),
            label: label.into(),
            samples,
        }
    }
}

/// When the timer goes out of scope, it records the elapsed time in microseconds.
impl Drop for ScopedTimer<'_> {
    fn drop(&mut self) {
        match self.stopwatch.elapsed_micros_f64() {
            Some(micros) => self
                .samples
                .push(TimingSample::new(self.label.clone(), micros)),
            None => log::warn!("[ScopedTimer] '{}' was never started", self.label),
        }
    }
}
