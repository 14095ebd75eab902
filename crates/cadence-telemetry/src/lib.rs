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

//! # Cadence Telemetry
//!
//! Frame timing collection for the orchestrator: labelled CPU and GPU samples,
//! a rotating profiler history owned by the render agent, and JSON summaries
//! for benchmark runs.

#![warn(missing_docs)]

pub mod history;
pub mod timer;
pub mod timings;

pub use history::{ProfilerHistory, TimingSummary};
pub use timer::ScopedTimer;
pub use timings::{resolve_gpu_timestamps, FrameTimings, TimingSample};
