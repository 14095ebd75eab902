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
    BlendMode, ColorAttachment, GraphicsDevice, PipelineDescriptor, PipelineId, PipelineKind,
    RenderError, RenderPassDescriptor, ResourceState, SurfaceId,
};

/// Upsamples the downsample chain back up, adding each level onto the one
/// above it, and finally onto `Hdr`.
#[derive(Debug, Default)]
pub struct BloomLane {
    pipeline: Option<PipelineId>,
}

impl BloomLane {
    /// The additive composite pipeline, once built.
    pub fn pipeline(&self) -> Option<PipelineId> {
        self.pipeline
    }
}

impl RenderLane for BloomLane {
    fn strategy_name(&self) -> &'static str {
        "Bloom"
    }

    fn on_gpu_init(
        &mut self,
        device: &dyn GraphicsDevice,
        targets: &TargetFormats,
    ) -> Result<(), RenderError> {
        self.pipeline = Some(device.create_pipeline(
            &PipelineDescriptor::new("Bloom composite", PipelineKind::BloomComposite)
                .with_color(targets.hdr)
                .with_blend(BlendMode::Additive),
        )?);
        Ok(())
    }

    fn on_gpu_shutdown(&mut self, device: &dyn GraphicsDevice) {
        release_pipeline(device, &mut self.pipeline, "BloomLane");
    }
}

fn composite(
    ctx: &mut PassContext<'_>,
    pipeline: PipelineId,
    source: SurfaceId,
    target: SurfaceId,
) -> Result<(), RenderError> {
    ctx.require(source, ResourceState::ShaderReadable, Access::Read)?;
    ctx.require(target, ResourceState::RenderTarget, Access::ReadWrite)?;
    let post_uniforms = ctx.frame.post_uniforms;

    let attachments = [ColorAttachment::load(target)];
    let mut pass = ctx.encoder.begin_render_pass(&RenderPassDescriptor {
        label: Some(ctx.pass),
        color_attachments: &attachments,
        depth_attachment: None,
    });
    pass.set_pipeline(pipeline);
    pass.bind_buffer(0, post_uniforms);
    pass.bind_surface(0, source);
    pass.draw(0..3, 0..1);
    Ok(())
}

/// Walks the chain from the smallest mip upward, then blends mip 0 into
/// `Hdr`. Every mip ends shader-readable.
pub fn record_bloom(ctx: &mut PassContext<'_>) -> Result<PassStats, RenderError> {
    let pipeline = built(ctx.lanes.post.bloom().pipeline())?;
    let surfaces = ctx.surfaces;
    let hdr = surfaces.single(SurfaceSlot::Hdr)?;
    let chain = surfaces.resolve(SurfaceSlot::DownsampleChain);
    let Some(&first) = chain.first() else {
        return Ok(PassStats::default());
    };

    for pair in chain.windows(2).rev() {
        composite(ctx, pipeline, pair[1], pair[0])?;
    }
    composite(ctx, pipeline, first, hdr)?;
    Ok(PassStats::drawn(chain.len() as u32))
}
