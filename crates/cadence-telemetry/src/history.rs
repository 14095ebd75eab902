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

//! Rotating history of frame timings.
//!
//! CPU samples of a frame are known as soon as it is recorded, GPU samples only
//! once its frame slot comes around again. [`ProfilerHistory`] merges both by
//! frame number and keeps the most recent frames only.

use crate::timings::{FrameTimings, TimingSample};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::VecDeque;

/// Averaged timings over the frames kept by a [`ProfilerHistory`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimingSummary {
    /// Number of frames averaged.
    pub frames: usize,
    /// Mean CPU samples, in first-seen label order.
    pub cpu: Vec<TimingSample>,
    /// Mean GPU samples, in first-seen label order.
    pub gpu: Vec<TimingSample>,
}

/// A bounded, frame-indexed store of timing samples.
#[derive(Debug, Clone)]
pub struct ProfilerHistory {
    capacity: usize,
    frames: VecDeque<FrameTimings>,
}

impl ProfilerHistory {
    /// Creates a history keeping at most `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            frames: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    fn entry(&mut self, frame_number: u64) -> Option<&mut FrameTimings> {
        if let Some(position) = self
            .frames
            .iter()
            .position(|frame| frame.frame_number == frame_number)
        {
            return self.frames.get_mut(position);
        }

        // Samples for a frame older than everything kept are dropped.
        if self.frames.len() == self.capacity
            && self
                .frames
                .front()
                .is_some_and(|oldest| frame_number < oldest.frame_number)
        {
            return None;
        }

        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        let position = self
            .frames
            .iter()
            .position(|frame| frame.frame_number > frame_number)
            .unwrap_or(self.frames.len());
        self.frames.insert(
            position,
            FrameTimings {
                frame_number,
                ..FrameTimings::default()
            },
        );
        self.frames.get_mut(position)
    }

    /// Appends CPU samples of a frame.
    pub fn record_cpu(&mut self, frame_number: u64, samples: Vec<TimingSample>) {
        if let Some(frame) = self.entry(frame_number) {
            frame.cpu.extend(samples);
        }
    }

    /// Stores GPU samples of a frame, replacing earlier ones.
    pub fn record_gpu(&mut self, frame_number: u64, samples: Vec<TimingSample>) {
        if let Some(frame) = self.entry(frame_number) {
            frame.gpu = samples;
        }
    }

    /// Number of frames kept.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether nothing was recorded yet.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The timings of one frame, if still kept.
    pub fn frame(&self, frame_number: u64) -> Option<&FrameTimings> {
        self.frames
            .iter()
            .find(|frame| frame.frame_number == frame_number)
    }

    /// The most recent frame that has GPU samples.
    pub fn latest_gpu(&self) -> Option<&FrameTimings> {
        self.frames.iter().rev().find(|frame| !frame.gpu.is_empty())
    }

    /// Iterates frames from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &FrameTimings> {
        self.frames.iter()
    }

    /// Per-label means over the kept frames.
    pub fn summary(&self) -> TimingSummary {
        TimingSummary {
            frames: self.frames.len(),
            cpu: Self::mean_by_label(self.frames.iter().map(|frame| frame.cpu.as_slice())),
            gpu: Self::mean_by_label(self.frames.iter().map(|frame| frame.gpu.as_slice())),
        }
    }

    /// The summary as pretty-printed JSON.
    pub fn summary_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(&self.summary())?)
    }

    fn mean_by_label<'a>(frames: impl Iterator<Item = &'a [TimingSample]>) -> Vec<TimingSample> {
        let mut totals: Vec<(Cow<'static, str>, f64, u32)> = Vec::new();
        for samples in frames {
            for sample in samples {
                match totals.iter_mut().find(|(label, _, _)| *label == sample.label) {
                    Some((_, sum, count)) => {
                        *sum += sample.micros;
                        *count += 1;
                    }
                    None => totals.push((sample.label.clone(), sample.micros, 1)),
                }
            }
        }
        totals
            .into_iter()
            .map(|(label, sum, count)| TimingSample {
                label,
                micros: sum / f64::from(count),
            })
            .collect()
    }
}

impl Default for ProfilerHistory {
    fn default() -> Self {
        Self::new(120)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample(label: &'static str, micros: f64) -> TimingSample {
        TimingSample::new(label, micros)
    }

    #[test]
    fn test_gpu_samples_merge_into_earlier_cpu_frame() {
        let mut history = ProfilerHistory::new(8);
        history.record_cpu(1, vec![sample("Record", 10.0)]);
        history.record_cpu(2, vec![sample("Record", 12.0)]);
        history.record_gpu(1, vec![sample("Clear", 3.0)]);

        assert_eq!(history.len(), 2);
        let first = history.frame(1).unwrap();
        assert_eq!(first.cpu.len(), 1);
        assert_eq!(first.gpu.len(), 1);
        assert_eq!(history.latest_gpu().map(|f| f.frame_number), Some(1));
    }

    #[test]
    fn test_history_rotates_oldest_frames_out() {
        let mut history = ProfilerHistory::new(3);
        for frame in 1..=5 {
            history.record_cpu(frame, vec![sample("Record", frame as f64)]);
        }
        let kept: Vec<u64> = history.iter().map(|f| f.frame_number).collect();
        assert_eq!(kept, vec![3, 4, 5]);

        history.record_gpu(1, vec![sample("Clear", 1.0)]);
        assert!(history.frame(1).is_none(), "samples older than the window are dropped");
    }

    #[test]
    fn test_summary_averages_per_label_in_first_seen_order() {
        let mut history = ProfilerHistory::new(4);
        history.record_gpu(1, vec![sample("Clear", 2.0), sample("Bloom", 10.0)]);
        history.record_gpu(2, vec![sample("Clear", 4.0), sample("Bloom", 20.0)]);

        let summary = history.summary();
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.gpu[0].label, "Clear");
        assert_relative_eq!(summary.gpu[0].micros, 3.0);
        assert_relative_eq!(summary.gpu[1].micros, 15.0);
        assert!(summary.cpu.is_empty());
    }

    #[test]
    fn test_summary_serializes_to_json() {
        let mut history = ProfilerHistory::new(2);
        history.record_cpu(7, vec![sample("Record", 1.5)]);
        let json = history.summary_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["frames"], 1);
        assert_eq!(value["cpu"][0]["label"], "Record");
    }
}
