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

//! Shadow atlas: up to four shadow maps packed in the quadrants of one depth
//! surface.

use super::{
    geometry_lane::draw_items,
    pass_graph::{PassContext, PassStats},
    surfaces::{SurfaceSlot, TargetFormats},
    RenderLane,
};
use cadence_core::renderer::{
    light_type, BufferSlice, ClearValue, DepthAttachment, Extent2D, GpuLight, GraphicsDevice,
    LoadOp, RenderError, RenderPassDescriptor, ResourceState, SurfaceDescriptor, SurfaceId,
    SurfaceUsage, Viewport, NO_SHADOW,
};
use cadence_core::scene::{LightKind, SceneLight};
use std::borrow::Cow;

/// Number of atlas quadrants.
pub const MAX_SHADOW_MAPS: usize = 4;

/// Shadow sampling bias of spot lights.
pub const SPOT_DEPTH_BIAS: f32 = 70.0e-5;

/// Shadow sampling bias of directional lights.
pub const DIRECTIONAL_DEPTH_BIAS: f32 = 1000.0e-5;

/// A shadow-casting light rendered this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowView {
    /// Index of the light in the scene.
    pub light: usize,
    /// Atlas quadrant.
    pub quadrant: u32,
    /// The light's [`cadence_core::renderer::ShadowUniforms`].
    pub uniforms: BufferSlice,
}

/// Gives the first four shadow casters, in scene order, one quadrant each.
///
/// Every other light gets `None`, as do all lights when shadows are off.
pub fn assign_shadow_slots(lights: &[SceneLight], enabled: bool) -> Vec<Option<u32>> {
    let mut next = 0u32;
    lights
        .iter()
        .map(|light| {
            if !enabled || !light.is_shadow_caster() || next as usize >= MAX_SHADOW_MAPS {
                return None;
            }
            next += 1;
            Some(next - 1)
        })
        .collect()
}

/// Depth bias applied when sampling a light's shadow.
pub fn depth_bias(kind: LightKind) -> f32 {
    match kind {
        LightKind::Spot => SPOT_DEPTH_BIAS,
        LightKind::Directional => DIRECTIONAL_DEPTH_BIAS,
        LightKind::Point => 0.0,
    }
}

/// The viewport of a quadrant, laid out left to right, then top to bottom.
pub fn quadrant_viewport(quadrant: u32, atlas_size: u32) -> Viewport {
    let half = (atlas_size / 2) as f32;
    Viewport {
        x: (quadrant % 2) as f32 * half,
        y: (quadrant / 2) as f32 * half,
        width: half,
        height: half,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// Encodes a light for the shaders.
pub fn gpu_light(light: &SceneLight, shadow: Option<u32>) -> GpuLight {
    let light_view_proj = if shadow.is_some() {
        light.view_projection()
    } else {
        glam::Mat4::IDENTITY
    };
    GpuLight {
        light_view_proj: light_view_proj.to_cols_array_2d(),
        direction: light.direction().to_array(),
        range: light.range,
        color: light.color.to_array(),
        intensity: light.intensity,
        position: light.position().to_array(),
        inner_cone_cos: light.inner_cone_angle.cos(),
        outer_cone_cos: light.outer_cone_angle.cos(),
        light_type: match light.kind {
            LightKind::Directional => light_type::DIRECTIONAL,
            LightKind::Point => light_type::POINT,
            LightKind::Spot => light_type::SPOT,
        },
        depth_bias: depth_bias(light.kind),
        shadow_map_index: shadow.map_or(NO_SHADOW, |quadrant| quadrant as i32),
    }
}

/// Owns the shadow atlas.
///
/// The atlas outlives resizes and scene loads. It is created shader-readable
/// so the lit passes may bind it on frames that skip shadow rendering.
#[derive(Debug)]
pub struct ShadowAtlasLane {
    size: u32,
    atlas: Option<SurfaceId>,
}

impl ShadowAtlasLane {
    /// A lane for a square atlas of `size` texels.
    pub fn new(size: u32) -> Self {
        Self { size, atlas: None }
    }

    /// Side length of the atlas.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// The atlas surface, once initialized.
    pub fn atlas(&self) -> Option<SurfaceId> {
        self.atlas
    }
}

impl RenderLane for ShadowAtlasLane {
    fn strategy_name(&self) -> &'static str {
        "ShadowAtlas"
    }

    fn on_gpu_init(
        &mut self,
        device: &dyn GraphicsDevice,
        targets: &TargetFormats,
    ) -> Result<(), RenderError> {
        if self.atlas.is_some() {
            return Ok(());
        }
        self.atlas = Some(device.create_surface(&SurfaceDescriptor {
            label: Some(Cow::Borrowed("Shadow atlas")),
            extent: Extent2D::new(self.size, self.size),
            format: targets.depth,
            mip_levels: 1,
            sample_count: 1,
            usage: SurfaceUsage::RENDER_ATTACHMENT | SurfaceUsage::SAMPLED,
            initial_state: ResourceState::ShaderReadable,
        })?);
        log::debug!("ShadowAtlasLane: {0}x{0} atlas created", self.size);
        Ok(())
    }

    fn on_gpu_shutdown(&mut self, device: &dyn GraphicsDevice) {
        if let Some(atlas) = self.atlas.take() {
            if let Err(e) = device.destroy_surface(atlas) {
                log::warn!("ShadowAtlasLane: Failed to destroy atlas: {e}");
            }
        }
    }
}

/// Clears the atlas and renders the opaque objects once per shadow view.
pub fn record_shadow_atlas(ctx: &mut PassContext<'_>) -> Result<PassStats, RenderError> {
    let atlas = ctx.surfaces.single(SurfaceSlot::ShadowAtlas)?;
    let atlas_size = ctx.lanes.shadow.size();
    let frame = ctx.frame;
    let drawable = ctx
        .scene
        .and_then(|scene| scene.pipelines().depth.map(|pipeline| (scene, pipeline)));

    let mut pass = ctx.encoder.begin_render_pass(&RenderPassDescriptor {
        label: Some(ctx.pass),
        color_attachments: &[],
        depth_attachment: Some(DepthAttachment {
            surface: atlas,
            load: LoadOp::Clear(ClearValue::Depth(1.0)),
            read_only: false,
        }),
    });
    let Some((scene, pipeline)) = drawable else {
        return Ok(PassStats::default());
    };

    pass.set_pipeline(pipeline);
    let mut draws = 0;
    for view in &frame.shadow_views {
        pass.set_viewport(quadrant_viewport(view.quadrant, atlas_size));
        pass.bind_buffer(0, view.uniforms);
        draws += draw_items(pass.as_mut(), scene, &frame.opaque, None);
    }
    Ok(PassStats::drawn(draws))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3};

    fn light(kind: LightKind, casts_shadow: bool) -> SceneLight {
        SceneLight {
            name: format!("{kind:?}"),
            kind,
            color: Vec3::ONE,
            intensity: 10.0,
            range: 20.0,
            inner_cone_angle: 0.3,
            outer_cone_angle: 0.5,
            casts_shadow,
            transform: Mat4::from_translation(Vec3::new(0.0, 5.0, 0.0)),
        }
    }

    #[test]
    fn test_first_four_casters_get_quadrants_in_order() {
        let lights = vec![
            light(LightKind::Point, true),
            light(LightKind::Spot, true),
            light(LightKind::Directional, true),
            light(LightKind::Spot, false),
            light(LightKind::Spot, true),
            light(LightKind::Directional, true),
            light(LightKind::Spot, true),
        ];
        let slots = assign_shadow_slots(&lights, true);
        assert_eq!(
            slots,
            vec![None, Some(0), Some(1), None, Some(2), Some(3), None]
        );
        assert!(assign_shadow_slots(&lights, false).iter().all(Option::is_none));
    }

    #[test]
    fn test_quadrants_tile_the_atlas() {
        let size = 2048;
        let viewports: Vec<_> = (0..4).map(|q| quadrant_viewport(q, size)).collect();
        assert_eq!((viewports[0].x, viewports[0].y), (0.0, 0.0));
        assert_eq!((viewports[1].x, viewports[1].y), (1024.0, 0.0));
        assert_eq!((viewports[2].x, viewports[2].y), (0.0, 1024.0));
        assert_eq!((viewports[3].x, viewports[3].y), (1024.0, 1024.0));
        assert!(viewports.iter().all(|v| v.width == 1024.0 && v.height == 1024.0));
    }

    #[test]
    fn test_encoded_lights_carry_bias_and_quadrant() {
        let spot = gpu_light(&light(LightKind::Spot, true), Some(2));
        assert_eq!(spot.shadow_map_index, 2);
        assert_eq!(spot.light_type, light_type::SPOT);
        approx::assert_relative_eq!(spot.depth_bias, 70.0e-5);
        approx::assert_relative_eq!(spot.outer_cone_cos, 0.5f32.cos());

        let sun = gpu_light(&light(LightKind::Directional, true), None);
        assert_eq!(sun.shadow_map_index, NO_SHADOW);
        approx::assert_relative_eq!(sun.depth_bias, 1000.0e-5);
        assert_eq!(sun.light_view_proj, Mat4::IDENTITY.to_cols_array_2d());
    }
}
