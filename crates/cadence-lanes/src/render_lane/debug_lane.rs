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

//! Bounding boxes and light frustums drawn over the scene.

use super::pass_graph::{PassContext, PassStats};
use super::surfaces::SurfaceSlot;
use cadence_core::renderer::{
    BufferSlice, ColorAttachment, DepthAttachment, LoadOp, RenderError, RenderPass,
    RenderPassDescriptor,
};

/// Vertices of the twelve edges of a unit cube, drawn as a line list.
pub const CUBE_EDGE_VERTICES: u32 = 24;

/// Draws one unit-cube outline per transform slice.
fn draw_outlines(pass: &mut dyn RenderPass, transforms: &[BufferSlice]) -> u32 {
    for &transform in transforms {
        pass.bind_buffer(1, transform);
        pass.draw(0..CUBE_EDGE_VERTICES, 0..1);
    }
    transforms.len() as u32
}

/// Draws the enabled debug outlines with the scene's wireframe pipeline.
///
/// Object bounding boxes and light frustums both arrive as transforms of the
/// unit cube, written into the frame arena by the orchestrator.
pub fn record_debug_overlay(ctx: &mut PassContext<'_>) -> Result<PassStats, RenderError> {
    let settings = &ctx.frame.settings;
    let Some(pipeline) = ctx.scene.and_then(|scene| scene.pipelines().wireframe) else {
        log::trace!("DebugLane: '{}' skipped, no wireframe pipeline", ctx.pass);
        return Ok(PassStats::default());
    };
    let color = ctx.surfaces.single(SurfaceSlot::SceneColor)?;
    let depth = ctx.surfaces.single(SurfaceSlot::Depth)?;
    let frame_uniforms = ctx.frame.frame_uniforms;

    let attachments = [ColorAttachment::load(color)];
    let mut pass = ctx.encoder.begin_render_pass(&RenderPassDescriptor {
        label: Some(ctx.pass),
        color_attachments: &attachments,
        depth_attachment: Some(DepthAttachment {
            surface: depth,
            load: LoadOp::Load,
            read_only: true,
        }),
    });
    pass.set_pipeline(pipeline);
    pass.bind_buffer(0, frame_uniforms);

    let mut draws = 0;
    if settings.draw_bounding_boxes {
        draws += draw_outlines(&mut *pass, &ctx.frame.bounding_boxes);
    }
    if settings.draw_light_frustums {
        draws += draw_outlines(&mut *pass, &ctx.frame.light_frustums);
    }
    Ok(PassStats::drawn(draws))
}
