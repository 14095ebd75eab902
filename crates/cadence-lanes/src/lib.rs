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

//! Hot-path recording pipelines of the frame orchestrator.
//!
//! Lanes own the pipelines and per-resolution surfaces of one rendering
//! concern and know how to record it. The [`render_lane::PassGraph`] strings
//! them together in a fixed order and inserts the state transitions between
//! them; the agents decide when a frame runs and what it contains.

#![warn(missing_docs)]

pub mod asset_lane;
pub mod postprocess_lane;
pub mod render_lane;

pub use asset_lane::{PreparedTexture, TexturePrepError, TexturePrepLane};
pub use postprocess_lane::PostProcessChain;
pub use render_lane::{
    CommandStream, DrawItem, FrameInputs, FrameSurfaces, GpuScene, GraphRun, PassContext,
    PassFeatures, PassGraph, PassId, RenderLane, RenderLanes, SurfaceStateTracker, TargetFormats,
};
