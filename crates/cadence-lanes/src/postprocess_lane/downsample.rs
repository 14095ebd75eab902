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
    release_pipeline, Access, PassContext, PassStats, RenderLane, SurfaceSlot, TargetFormats,
};
use cadence_core::renderer::{
    ClearValue, ColorAttachment, GraphicsDevice, LoadOp, PipelineDescriptor, PipelineId,
    PipelineKind, RenderError, RenderPassDescriptor, ResourceState,
};

/// Halves the HDR image repeatedly into the downsample chain.
#[derive(Debug, Default)]
pub struct DownsampleLane {
    pipeline: Option<PipelineId>,
}

impl DownsampleLane {
    /// The filter pipeline, once built.
    pub fn pipeline(&self) -> Option<PipelineId> {
        self.pipeline
    }
}

impl RenderLane for DownsampleLane {
    fn strategy_name(&self) -> &'static str {
        "Downsample"
    }

    fn on_gpu_init(
        &mut self,
        device: &dyn GraphicsDevice,
        targets: &TargetFormats,
    ) -> Result<(), RenderError> {
        self.pipeline = Some(device.create_pipeline(
            &PipelineDescriptor::new("Downsample", PipelineKind::Downsample).with_color(targets.hdr),
        )?);
        Ok(())
    }

    fn on_gpu_shutdown(&mut self, device: &dyn GraphicsDevice) {
        release_pipeline(device, &mut self.pipeline, "DownsampleLane");
    }
}

/// Filters `Hdr` into mip 0 of the chain, then each mip into the next.
pub fn record_downsample(ctx: &mut PassContext<'_>) -> Result<PassStats, RenderError> {
    let pipeline = built(ctx.lanes.post.downsample().pipeline())?;
    let surfaces = ctx.surfaces;
    let mut source = surfaces.single(SurfaceSlot::Hdr)?;
    let chain = surfaces.resolve(SurfaceSlot::DownsampleChain);
    let post_uniforms = ctx.frame.post_uniforms;

    for (level, &target) in chain.iter().enumerate() {
        if level > 0 {
            ctx.require(source, ResourceState::ShaderReadable, Access::Read)?;
        }
        ctx.require(target, ResourceState::RenderTarget, Access::Write)?;

        let attachments = [ColorAttachment {
            surface: target,
            mip_level: 0,
            load: LoadOp::Clear(ClearValue::Color([0.0; 4])),
        }];
        let mut pass = ctx.encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some(ctx.pass),
            color_attachments: &attachments,
            depth_attachment: None,
        });
        pass.set_pipeline(pipeline);
        pass.bind_buffer(0, post_uniforms);
        pass.bind_surface(0, source);
        pass.draw(0..3, 0..1);
        drop(pass);

        source = target;
    }
    Ok(PassStats::drawn(chain.len() as u32))
}
