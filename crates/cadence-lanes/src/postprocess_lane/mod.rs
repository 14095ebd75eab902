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

//! Post-processing lanes - from the resolved HDR scene to the display

mod bloom;
mod chain;
mod color_conversion;
mod downsample;
mod taa;
mod tone_mapping;

pub use bloom::*;
pub use chain::*;
pub use color_conversion::*;
pub use downsample::*;
pub use taa::*;
pub use tone_mapping::*;

use cadence_core::renderer::{PipelineId, RenderError};

/// Returns the pipeline, or `NotInitialized` when the lane has not been
/// initialized on the GPU yet.
pub(crate) fn built(pipeline: Option<PipelineId>) -> Result<PipelineId, RenderError> {
    pipeline.ok_or(RenderError::NotInitialized)
}

/// Workgroup count covering `size` pixels with 8-wide groups.
pub(crate) const fn workgroups(size: u32) -> u32 {
    size.div_ceil(8)
}
