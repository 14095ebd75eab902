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

//! Geometry passes: clear, motion vectors, opaque, transparent and the MSAA
//! resolve.

use super::{
    gpu_scene::GpuScene,
    pass_graph::{PassContext, PassStats},
    surfaces::SurfaceSlot,
};
use cadence_core::renderer::{
    BufferSlice, ClearValue, ColorAttachment, DepthAttachment, LoadOp, PipelineId, RenderError,
    RenderPass, RenderPassDescriptor, SurfaceId,
};
use cadence_core::scene::AlphaMode;

/// Clear color of the scene target.
pub const SCENE_CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Depth the scene is cleared to.
pub const FAR_DEPTH: f32 = 1.0;

/// One object to draw this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawItem {
    /// Index of the object in the scene.
    pub object: usize,
    /// Mesh index in the [`GpuScene`].
    pub mesh: usize,
    /// Material index in the [`GpuScene`].
    pub material: usize,
    /// The object's [`cadence_core::renderer::ObjectUniforms`].
    pub uniforms: BufferSlice,
    /// Distance from the camera to the object's bounds center.
    pub view_depth: f32,
}

/// Splits draws into opaque and blended lists, the latter sorted back to
/// front.
pub fn split_draw_items(scene: &GpuScene, items: Vec<DrawItem>) -> (Vec<DrawItem>, Vec<DrawItem>) {
    let (mut transparent, opaque): (Vec<_>, Vec<_>) = items.into_iter().partition(|item| {
        scene
            .material(item.material)
            .is_some_and(|material| material.alpha_mode == AlphaMode::Blend)
    });
    sort_back_to_front(&mut transparent);
    (opaque, transparent)
}

/// Sorts by decreasing view depth. Equal depths keep their order.
pub fn sort_back_to_front(items: &mut [DrawItem]) {
    items.sort_by(|a, b| b.view_depth.total_cmp(&a.view_depth));
}

/// Surfaces sampled by the lit passes.
pub(crate) struct LightingInputs {
    shadow_atlas: SurfaceId,
    environment: SurfaceId,
    fallback: SurfaceId,
}

impl LightingInputs {
    fn gather(ctx: &PassContext<'_>) -> Result<Self, RenderError> {
        let shadow_atlas = ctx.surfaces.single(SurfaceSlot::ShadowAtlas)?;
        let sky = &ctx.lanes.sky;
        match (sky.environment(), sky.fallback_texture()) {
            (Some(environment), Some(fallback)) => Ok(Self {
                shadow_atlas,
                environment,
                fallback,
            }),
            _ => Err(RenderError::NotInitialized),
        }
    }

    fn bind(&self, pass: &mut dyn RenderPass) {
        pass.bind_surface(0, self.shadow_atlas);
        pass.bind_surface(1, self.environment);
    }
}

/// Issues one indexed draw per item. Returns the number of draws.
pub(crate) fn draw_items(
    pass: &mut dyn RenderPass,
    scene: &GpuScene,
    items: &[DrawItem],
    lighting: Option<&LightingInputs>,
) -> u32 {
    let mut draws = 0;
    for item in items {
        let Some(mesh) = scene.mesh(item.mesh) else {
            log::warn!("GeometryLane: object {} references missing mesh {}", item.object, item.mesh);
            continue;
        };
        pass.bind_buffer(1, item.uniforms);
        if let Some(lighting) = lighting {
            let textures = scene
                .material(item.material)
                .map_or(&[][..], |material| material.textures.as_slice());
            if textures.is_empty() {
                pass.bind_surface(2, lighting.fallback);
            }
            for (binding, &texture) in (2u32..).zip(textures) {
                pass.bind_surface(binding, texture);
            }
        }
        pass.set_vertex_buffer(0, mesh.vertex_slice());
        pass.set_index_buffer(mesh.index_slice());
        pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        draws += 1;
    }
    draws
}

fn scene_pipeline<'a>(
    scene: Option<&'a GpuScene>,
    pass: &str,
    pick: fn(&GpuScene) -> Option<PipelineId>,
) -> Option<(&'a GpuScene, PipelineId)> {
    let scene = scene?;
    let pipeline = pick(scene);
    if pipeline.is_none() {
        log::trace!("GeometryLane: '{pass}' skipped, scene pipeline not built");
    }
    Some((scene, pipeline?))
}

/// Clears scene color and depth.
pub fn record_clear(ctx: &mut PassContext<'_>) -> Result<PassStats, RenderError> {
    let color = ctx.surfaces.single(SurfaceSlot::SceneColor)?;
    let depth = ctx.surfaces.single(SurfaceSlot::Depth)?;
    let attachments = [ColorAttachment {
        surface: color,
        mip_level: 0,
        load: LoadOp::Clear(ClearValue::Color(SCENE_CLEAR_COLOR)),
    }];
    drop(ctx.encoder.begin_render_pass(&RenderPassDescriptor {
        label: Some(ctx.pass),
        color_attachments: &attachments,
        depth_attachment: Some(DepthAttachment {
            surface: depth,
            load: LoadOp::Clear(ClearValue::Depth(FAR_DEPTH)),
            read_only: false,
        }),
    }));
    Ok(PassStats::default())
}

/// Clears the motion vectors and draws the opaque objects into them.
pub fn record_motion_vectors(ctx: &mut PassContext<'_>) -> Result<PassStats, RenderError> {
    let target = ctx.surfaces.single(SurfaceSlot::MotionVectors)?;
    let depth = ctx.surfaces.single(SurfaceSlot::Depth)?;
    let attachments = [ColorAttachment {
        surface: target,
        mip_level: 0,
        load: LoadOp::Clear(ClearValue::Color([0.0; 4])),
    }];
    let drawable = scene_pipeline(ctx.scene, ctx.pass, |scene| scene.pipelines().motion_vectors);
    let frame = ctx.frame;

    let mut pass = ctx.encoder.begin_render_pass(&RenderPassDescriptor {
        label: Some(ctx.pass),
        color_attachments: &attachments,
        depth_attachment: Some(DepthAttachment {
            surface: depth,
            load: LoadOp::Load,
            read_only: false,
        }),
    });
    let Some((scene, pipeline)) = drawable else {
        return Ok(PassStats::default());
    };
    pass.set_pipeline(pipeline);
    pass.bind_buffer(0, frame.frame_uniforms);
    let draws = draw_items(pass.as_mut(), scene, &frame.opaque, None);
    Ok(PassStats::drawn(draws))
}

/// Draws opaque and alpha-tested objects with lighting and shadows.
pub fn record_opaque(ctx: &mut PassContext<'_>) -> Result<PassStats, RenderError> {
    let wireframe = ctx.frame.settings.wireframe;
    let pick: fn(&GpuScene) -> Option<PipelineId> = if wireframe {
        |scene| scene.pipelines().wireframe
    } else {
        |scene| scene.pipelines().pbr_opaque
    };
    let frame = ctx.frame;
    record_lit(ctx, pick, false, &frame.opaque)
}

/// Draws blended objects back to front over the opaque scene.
pub fn record_transparent(ctx: &mut PassContext<'_>) -> Result<PassStats, RenderError> {
    let frame = ctx.frame;
    record_lit(
        ctx,
        |scene| scene.pipelines().pbr_transparent,
        true,
        &frame.transparent,
    )
}

fn record_lit(
    ctx: &mut PassContext<'_>,
    pick: fn(&GpuScene) -> Option<PipelineId>,
    depth_read_only: bool,
    items: &[DrawItem],
) -> Result<PassStats, RenderError> {
    let frame = ctx.frame;
    if items.is_empty() {
        return Ok(PassStats::default());
    }
    let Some((scene, pipeline)) = scene_pipeline(ctx.scene, ctx.pass, pick) else {
        return Ok(PassStats::default());
    };
    let lighting = LightingInputs::gather(ctx)?;
    let color = ctx.surfaces.single(SurfaceSlot::SceneColor)?;
    let depth = ctx.surfaces.single(SurfaceSlot::Depth)?;

    let attachments = [ColorAttachment::load(color)];
    let mut pass = ctx.encoder.begin_render_pass(&RenderPassDescriptor {
        label: Some(ctx.pass),
        color_attachments: &attachments,
        depth_attachment: Some(DepthAttachment {
            surface: depth,
            load: LoadOp::Load,
            read_only: depth_read_only,
        }),
    });
    pass.set_pipeline(pipeline);
    pass.bind_buffer(0, frame.frame_uniforms);
    lighting.bind(pass.as_mut());
    let draws = draw_items(pass.as_mut(), scene, items, Some(&lighting));
    Ok(PassStats::drawn(draws))
}

/// Resolves the multisampled scene color into `Hdr`.
pub fn record_msaa_resolve(ctx: &mut PassContext<'_>) -> Result<PassStats, RenderError> {
    let source = ctx.surfaces.single(SurfaceSlot::SceneColor)?;
    let destination = ctx.surfaces.single(SurfaceSlot::Hdr)?;
    ctx.encoder.resolve_surface(source, destination);
    Ok(PassStats::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::GpuMaterial;
    use cadence_core::renderer::BufferId;

    fn material(alpha_mode: AlphaMode) -> GpuMaterial {
        GpuMaterial {
            name: format!("{alpha_mode:?}"),
            alpha_mode,
            double_sided: false,
            textures: Vec::new(),
        }
    }

    fn item(object: usize, material: usize, view_depth: f32) -> DrawItem {
        DrawItem {
            object,
            mesh: 0,
            material,
            uniforms: BufferSlice {
                buffer: BufferId(0),
                offset: object as u64 * 256,
                size: 128,
            },
            view_depth,
        }
    }

    #[test]
    fn test_back_to_front_is_stable_for_equal_depths() {
        let mut items = vec![
            item(0, 0, 2.0),
            item(1, 0, 5.0),
            item(2, 0, 2.0),
            item(3, 0, 9.0),
            item(4, 0, 2.0),
        ];
        sort_back_to_front(&mut items);
        let order: Vec<_> = items.iter().map(|i| i.object).collect();
        assert_eq!(order, vec![3, 1, 0, 2, 4]);
    }

    #[test]
    fn test_blended_materials_go_to_the_transparent_list() {
        let mut scene = GpuScene::default();
        scene.add_material(material(AlphaMode::Opaque));
        scene.add_material(material(AlphaMode::Blend));
        scene.add_material(material(AlphaMode::Mask));

        let items = vec![
            item(0, 1, 1.0),
            item(1, 0, 3.0),
            item(2, 1, 4.0),
            item(3, 2, 2.0),
        ];
        let (opaque, transparent) = split_draw_items(&scene, items);
        assert_eq!(opaque.iter().map(|i| i.object).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(
            transparent.iter().map(|i| i.object).collect::<Vec<_>>(),
            vec![2, 0]
        );
    }
}
