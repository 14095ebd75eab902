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

//! Labelled timing samples.

use cadence_core::renderer::RetiredTimestamps;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Label of the sample summing every GPU interval of a frame.
pub const GPU_TOTAL_LABEL: &str = "Total GPU";

/// A single labelled duration, in microseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingSample {
    /// What was measured.
    pub label: Cow<'static, str>,
    /// Duration in microseconds.
    pub micros: f64,
}

impl TimingSample {
    /// Creates a sample.
    pub fn new(label: impl Into<Cow<'static, str>>, micros: f64) -> Self {
        Self {
            label: label.into(),
            micros,
        }
    }
}

/// All samples recorded for one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameTimings {
    /// The frame the samples belong to.
    pub frame_number: u64,
    /// CPU-side samples.
    pub cpu: Vec<TimingSample>,
    /// GPU-side samples.
    pub gpu: Vec<TimingSample>,
}

/// Converts raw timestamps into per-label intervals.
///
/// Each label after the first reports the time elapsed since the previous
/// timestamp, so a timestamp written at the end of a pass measures that
/// pass. A final [`GPU_TOTAL_LABEL`] sample spans first to last.
pub fn resolve_gpu_timestamps(retired: &RetiredTimestamps) -> Vec<TimingSample> {
    let count = retired.labels.len().min(retired.ticks.len());
    if count < 2 {
        return Vec::new();
    }

    let to_micros = |ticks: u64| ticks as f64 * retired.period_ns / 1_000.0;
    let mut samples = Vec::with_capacity(count);
    for i in 1..count {
        let delta = retired.ticks[i].saturating_sub(retired.ticks[i - 1]);
        samples.push(TimingSample::new(retired.labels[i], to_micros(delta)));
    }
    let total = retired.ticks[count - 1].saturating_sub(retired.ticks[0]);
    samples.push(TimingSample::new(GPU_TOTAL_LABEL, to_micros(total)));
    samples
}
