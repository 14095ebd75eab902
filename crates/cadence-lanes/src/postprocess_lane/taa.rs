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

//! Temporal anti-aliasing: projection jitter, the resolve and the sharpen
//! pass that refreshes the history.

use super::{built, workgroups};
use crate::render_lane::{
    release_pipeline, PassContext, PassStats, RenderLane, SurfaceSlot, TargetFormats,
};
use cadence_core::renderer::{
    Extent2D, GraphicsDevice, PipelineDescriptor, PipelineId, PipelineKind, RenderError,
};
use glam::Vec2;

/// Length of the jitter sequence before it repeats.
pub const JITTER_SAMPLES: u32 = 16;

/// Element `index` of the Halton low-discrepancy sequence in `base`.
pub fn halton(mut index: u32, base: u32) -> f32 {
    let mut fraction = 1.0;
    let mut result = 0.0;
    while index > 0 {
        fraction /= base as f32;
        result += fraction * (index % base) as f32;
        index /= base;
    }
    result
}

/// Clip-space projection offset of jitter sample `sample` at `extent`.
///
/// Samples come from the (2, 3) Halton sequence starting at index 1, so the
/// offset stays within one pixel.
pub fn jitter_offset(sample: u32, extent: Extent2D) -> Vec2 {
    let index = sample % JITTER_SAMPLES + 1;
    let pixel = Vec2::new(halton(index, 2), halton(index, 3)) - Vec2::splat(0.5);
    Vec2::new(
        2.0 * pixel.x / extent.width.max(1) as f32,
        2.0 * pixel.y / extent.height.max(1) as f32,
    )
}

/// What a frame needs from the TAA lane before recording.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaaFrame {
    /// Offset to add to the projection.
    pub jitter: Vec2,
    /// Whether the history must be ignored this frame.
    pub reset_history: bool,
}

/// Resolves the jittered frame against the history and sharpens the result.
#[derive(Debug, Default)]
pub struct TaaLane {
    resolve: Option<PipelineId>,
    sharpen: Option<PipelineId>,
    history_valid: bool,
    rotations: u64,
    sample: u32,
}

impl TaaLane {
    /// The resolve pipeline, once built.
    pub fn resolve_pipeline(&self) -> Option<PipelineId> {
        self.resolve
    }

    /// The sharpen pipeline, once built.
    pub fn sharpen_pipeline(&self) -> Option<PipelineId> {
        self.sharpen
    }

    /// Advances the jitter sequence for a new frame.
    pub fn begin_frame(&mut self, extent: Extent2D) -> TaaFrame {
        let frame = TaaFrame {
            jitter: jitter_offset(self.sample, extent),
            reset_history: !self.history_valid,
        };
        self.sample = (self.sample + 1) % JITTER_SAMPLES;
        frame
    }

    /// Records that this frame's sharpen pass refreshed the history.
    pub fn rotate_history(&mut self) {
        self.history_valid = true;
        self.rotations += 1;
    }

    /// Forgets the history, after a resize or a scene change.
    pub fn invalidate_history(&mut self) {
        if self.history_valid {
            log::debug!("TaaLane: history invalidated after {} frames", self.rotations);
        }
        self.history_valid = false;
        self.rotations = 0;
        self.sample = 0;
    }

    /// Whether the history holds a previous frame.
    pub fn history_valid(&self) -> bool {
        self.history_valid
    }

    /// Frames accumulated since the last invalidation.
    pub fn rotations(&self) -> u64 {
        self.rotations
    }
}

impl RenderLane for TaaLane {
    fn strategy_name(&self) -> &'static str {
        "TAA"
    }

    fn on_gpu_init(
        &mut self,
        device: &dyn GraphicsDevice,
        _targets: &TargetFormats,
    ) -> Result<(), RenderError> {
        let compute = |label: &str, kind| device.create_pipeline(&PipelineDescriptor::new(label, kind));
        self.resolve = Some(compute("TAA", PipelineKind::Taa)?);
        self.sharpen = Some(compute("Sharpen", PipelineKind::Sharpen)?);
        self.invalidate_history();
        Ok(())
    }

    fn on_gpu_shutdown(&mut self, device: &dyn GraphicsDevice) {
        release_pipeline(device, &mut self.sharpen, "TaaLane");
        release_pipeline(device, &mut self.resolve, "TaaLane");
    }
}

/// Blends the jittered `Hdr` with the reprojected history into the TAA
/// output.
pub fn record_taa(ctx: &mut PassContext<'_>) -> Result<PassStats, RenderError> {
    let pipeline = built(ctx.lanes.post.taa().resolve_pipeline())?;
    let surfaces = ctx.surfaces;
    let extent = surfaces.extent();
    let frame_uniforms = ctx.frame.frame_uniforms;
    let post_uniforms = ctx.frame.post_uniforms;

    let mut pass = ctx.encoder.begin_compute_pass(Some(ctx.pass));
    pass.set_pipeline(pipeline);
    pass.bind_buffer(0, frame_uniforms);
    pass.bind_buffer(1, post_uniforms);
    pass.bind_surface(0, surfaces.single(SurfaceSlot::Hdr)?);
    pass.bind_surface(1, surfaces.single(SurfaceSlot::MotionVectors)?);
    pass.bind_surface(2, surfaces.single(SurfaceSlot::Depth)?);
    pass.bind_surface(3, surfaces.single(SurfaceSlot::History)?);
    pass.bind_storage_surface(0, surfaces.single(SurfaceSlot::TaaOutput)?);
    pass.dispatch(workgroups(extent.width), workgroups(extent.height), 1);
    Ok(PassStats::dispatched(1))
}

/// Sharpens the TAA output into both `Hdr` and the history of the next
/// frame.
pub fn record_sharpen(ctx: &mut PassContext<'_>) -> Result<PassStats, RenderError> {
    let pipeline = built(ctx.lanes.post.taa().sharpen_pipeline())?;
    let surfaces = ctx.surfaces;
    let extent = surfaces.extent();
    let post_uniforms = ctx.frame.post_uniforms;

    let mut pass = ctx.encoder.begin_compute_pass(Some(ctx.pass));
    pass.set_pipeline(pipeline);
    pass.bind_buffer(0, post_uniforms);
    pass.bind_surface(0, surfaces.single(SurfaceSlot::TaaOutput)?);
    pass.bind_storage_surface(0, surfaces.single(SurfaceSlot::Hdr)?);
    pass.bind_storage_surface(1, surfaces.single(SurfaceSlot::History)?);
    pass.dispatch(workgroups(extent.width), workgroups(extent.height), 1);
    Ok(PassStats::dispatched(1))
}
