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

use super::{built, workgroups};
use crate::render_lane::{
    release_pipeline, PassContext, PassStats, RenderLane, SurfaceSlot, TargetFormats,
};
use cadence_core::renderer::{
    ClearValue, ColorAttachment, GraphicsDevice, LoadOp, PipelineDescriptor, PipelineId,
    PipelineKind, RenderError, RenderPassDescriptor,
};

/// Applies exposure and the selected tone-mapping operator.
///
/// SDR displays get a raster pass writing the backbuffer directly. HDR
/// displays tone map `Hdr` in place with a compute pass and leave the move
/// to the display color space to the color-conversion lane.
#[derive(Debug, Default)]
pub struct ToneMappingLane {
    in_place: Option<PipelineId>,
    to_display: Option<PipelineId>,
}

impl ToneMappingLane {
    /// The in-place compute pipeline, once built.
    pub fn in_place_pipeline(&self) -> Option<PipelineId> {
        self.in_place
    }

    /// The raster pipeline writing the swap-chain format, once built.
    pub fn display_pipeline(&self) -> Option<PipelineId> {
        self.to_display
    }

    /// Recreates the pipeline that targets the swap chain.
    pub fn rebuild_display_pipeline(
        &mut self,
        device: &dyn GraphicsDevice,
        targets: &TargetFormats,
    ) -> Result<(), RenderError> {
        release_pipeline(device, &mut self.to_display, "ToneMappingLane");
        self.to_display = Some(device.create_pipeline(
            &PipelineDescriptor::new("Tone mapping", PipelineKind::ToneMapRaster)
                .with_color(targets.swap),
        )?);
        Ok(())
    }
}

impl RenderLane for ToneMappingLane {
    fn strategy_name(&self) -> &'static str {
        "ToneMapping"
    }

    fn on_gpu_init(
        &mut self,
        device: &dyn GraphicsDevice,
        targets: &TargetFormats,
    ) -> Result<(), RenderError> {
        self.in_place = Some(device.create_pipeline(&PipelineDescriptor::new(
            "Tone mapping (in place)",
            PipelineKind::ToneMapCompute,
        ))?);
        self.rebuild_display_pipeline(device, targets)
    }

    fn on_gpu_shutdown(&mut self, device: &dyn GraphicsDevice) {
        release_pipeline(device, &mut self.to_display, "ToneMappingLane");
        release_pipeline(device, &mut self.in_place, "ToneMappingLane");
    }
}

/// Tone maps `Hdr` into the backbuffer.
pub fn record_tone_map(ctx: &mut PassContext<'_>) -> Result<PassStats, RenderError> {
    let pipeline = built(ctx.lanes.post.tone_mapping().display_pipeline())?;
    let hdr = ctx.surfaces.single(SurfaceSlot::Hdr)?;
    let backbuffer = ctx.surfaces.single(SurfaceSlot::Backbuffer)?;
    let post_uniforms = ctx.frame.post_uniforms;

    let attachments = [ColorAttachment {
        surface: backbuffer,
        mip_level: 0,
        load: LoadOp::Clear(ClearValue::Color([0.0, 0.0, 0.0, 1.0])),
    }];
    let mut pass = ctx.encoder.begin_render_pass(&RenderPassDescriptor {
        label: Some(ctx.pass),
        color_attachments: &attachments,
        depth_attachment: None,
    });
    pass.set_pipeline(pipeline);
    pass.bind_buffer(0, post_uniforms);
    pass.bind_surface(0, hdr);
    pass.draw(0..3, 0..1);
    Ok(PassStats::drawn(1))
}

/// Tone maps `Hdr` in place.
pub fn record_tone_map_in_place(ctx: &mut PassContext<'_>) -> Result<PassStats, RenderError> {
    let pipeline = built(ctx.lanes.post.tone_mapping().in_place_pipeline())?;
    let hdr = ctx.surfaces.single(SurfaceSlot::Hdr)?;
    let extent = ctx.surfaces.extent();
    let post_uniforms = ctx.frame.post_uniforms;

    let mut pass = ctx.encoder.begin_compute_pass(Some(ctx.pass));
    pass.set_pipeline(pipeline);
    pass.bind_buffer(0, post_uniforms);
    pass.bind_storage_surface(0, hdr);
    pass.dispatch(workgroups(extent.width), workgroups(extent.height), 1);
    Ok(PassStats::dispatched(1))
}
