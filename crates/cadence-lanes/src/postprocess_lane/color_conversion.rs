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

use super::built;
use crate::render_lane::{
    release_pipeline, PassContext, PassStats, RenderLane, SurfaceSlot, TargetFormats,
};
use cadence_core::renderer::{
    ClearValue, ColorAttachment, GraphicsDevice, LoadOp, PipelineDescriptor, PipelineId,
    PipelineKind, RenderError, RenderPassDescriptor, TextureFormat,
};

/// Encodes the tone-mapped `Hdr` image for an HDR display.
#[derive(Debug, Default)]
pub struct ColorConversionLane {
    pipeline: Option<PipelineId>,
    format: Option<TextureFormat>,
}

impl ColorConversionLane {
    /// The conversion pipeline, once built.
    pub fn pipeline(&self) -> Option<PipelineId> {
        self.pipeline
    }

    /// The swap-chain format the pipeline was built for.
    pub fn format(&self) -> Option<TextureFormat> {
        self.format
    }
}

impl RenderLane for ColorConversionLane {
    fn strategy_name(&self) -> &'static str {
        "ColorConversion"
    }

    fn on_gpu_init(
        &mut self,
        device: &dyn GraphicsDevice,
        targets: &TargetFormats,
    ) -> Result<(), RenderError> {
        let descriptor = PipelineDescriptor::new("Color conversion", PipelineKind::ColorConversion)
            .with_color(targets.swap)
            .with_define("COLOR_SPACE", format!("{:?}", targets.swap));
        self.pipeline = Some(device.create_pipeline(&descriptor)?);
        self.format = Some(targets.swap);
        Ok(())
    }

    fn on_gpu_shutdown(&mut self, device: &dyn GraphicsDevice) {
        release_pipeline(device, &mut self.pipeline, "ColorConversionLane");
        self.format = None;
    }
}

/// Converts `Hdr` into the backbuffer's color space. The display mode in the
/// post uniforms selects the transfer function.
pub fn record_color_conversion(ctx: &mut PassContext<'_>) -> Result<PassStats, RenderError> {
    let pipeline = built(ctx.lanes.post.color_conversion().pipeline())?;
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
