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

//! Fills the frame arena: uniforms, draw lists, shadow views and debug
//! outlines.

use super::frame::CameraView;
use crate::scene_agent::LoadedScene;
use cadence_core::config::RenderSettings;
use cadence_core::renderer::{
    DisplayMode, Extent2D, FrameSlot, GraphicsDevice, ObjectUniforms, PostUniforms, RenderError,
    ShadowUniforms, UniformFrame, MAX_LIGHTS,
};
use cadence_lanes::postprocess_lane::TaaFrame;
use cadence_lanes::render_lane::{assign_shadow_slots, gpu_light, split_draw_items, ShadowView};
use cadence_lanes::{DrawItem, FrameInputs};
use glam::{Mat4, Vec2, Vec3};

/// Maps the debug cube, [-1, 1]³, onto clip space with depth in [0, 1].
const CLIP_FROM_UNIT_CUBE: Mat4 = Mat4::from_cols_array(&[
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 0.5, 0.0, //
    0.0, 0.0, 0.5, 1.0,
]);

/// What the orchestrator knows about a frame before its data is written.
pub(crate) struct FramePrep<'a> {
    pub settings: &'a RenderSettings,
    pub camera: CameraView,
    pub extent: Extent2D,
    pub display_mode: DisplayMode,
    pub taa: Option<TaaFrame>,
    pub previous_view_proj: Option<Mat4>,
    pub previous_world: &'a [Mat4],
    pub shadows: bool,
}

/// The written frame.
pub(crate) struct PreparedFrame {
    pub inputs: FrameInputs,
    /// Unjittered, kept as next frame's previous matrix.
    pub view_proj: Mat4,
    pub world_transforms: Vec<Mat4>,
    pub triangles: u64,
}

pub(crate) fn prepare_frame(
    device: &dyn GraphicsDevice,
    slot: &mut FrameSlot,
    scene: Option<&LoadedScene>,
    prep: &FramePrep<'_>,
) -> Result<PreparedFrame, RenderError> {
    let settings = prep.settings;
    let view_proj = prep.camera.view_projection();
    let jitter = prep.taa.map_or(Vec2::ZERO, |taa| taa.jitter);
    let jittered = Mat4::from_translation(jitter.extend(0.0)) * view_proj;

    let mut uniforms = UniformFrame::new(
        jittered,
        prep.previous_view_proj.unwrap_or(view_proj),
        prep.camera.position,
    );
    uniforms.set_jitter(jitter);
    uniforms.inv_screen_resolution = [
        1.0 / prep.extent.width.max(1) as f32,
        1.0 / prep.extent.height.max(1) as f32,
    ];
    uniforms.ibl_factor = settings.ibl_factor;
    uniforms.emissive_factor = settings.emissive_factor;
    uniforms.exposure = settings.exposure;

    let mut shadow_views = Vec::new();
    let mut light_frustums = Vec::new();
    let mut bounding_boxes = Vec::new();
    let mut world_transforms = Vec::new();
    let mut opaque = Vec::new();
    let mut transparent = Vec::new();
    let mut triangles = 0;

    if let Some(scene) = scene {
        let description = scene.description();
        let lights = description.lights();
        let quadrants = assign_shadow_slots(lights, prep.shadows);
        for (index, (light, &quadrant)) in lights.iter().zip(&quadrants).enumerate() {
            if !uniforms.push_light(gpu_light(light, quadrant)) {
                log::warn!(
                    "RenderAgent: scene has {} lights, only {MAX_LIGHTS} are lit",
                    lights.len()
                );
                break;
            }
            let Some(quadrant) = quadrant else {
                continue;
            };
            let light_view_proj = light.view_projection();
            let shadow = ShadowUniforms {
                light_view_proj: light_view_proj.to_cols_array_2d(),
            };
            shadow_views.push(ShadowView {
                light: index,
                quadrant,
                uniforms: slot.write_uniform(device, &shadow)?,
            });
            if settings.draw_light_frustums {
                let frustum = light_view_proj.inverse() * CLIP_FROM_UNIT_CUBE;
                light_frustums.push(slot.write_uniform(device, &ObjectUniforms::new(frustum, frustum))?);
            }
        }

        let gpu = scene.gpu();
        let mut items = Vec::with_capacity(description.objects().len());
        for (index, object) in description.objects().iter().enumerate() {
            let world = description.world_transform(index);
            let previous = prep.previous_world.get(index).copied().unwrap_or(world);
            let bounds = gpu.mesh(object.mesh).map(|mesh| mesh.bounds);
            let center = bounds.map_or(Vec3::ZERO, |bounds| bounds.center());
            items.push(DrawItem {
                object: index,
                mesh: object.mesh,
                material: object.material,
                uniforms: slot.write_uniform(device, &ObjectUniforms::new(world, previous))?,
                view_depth: world.transform_point3(center).distance(prep.camera.position),
            });
            if let Some(bounds) = bounds.filter(|_| settings.draw_bounding_boxes) {
                let outline = world * bounds.unit_cube_transform();
                bounding_boxes.push(slot.write_uniform(device, &ObjectUniforms::new(outline, outline))?);
            }
            world_transforms.push(world);
        }
        (opaque, transparent) = split_draw_items(gpu, items);
        triangles = opaque
            .iter()
            .chain(&transparent)
            .filter_map(|item| gpu.mesh(item.mesh))
            .map(|mesh| u64::from(mesh.index_count / 3))
            .sum();
    }

    let post = PostUniforms {
        exposure: settings.exposure,
        tone_mapper: settings.tone_mapper.index(),
        color_space: prep.display_mode.color_space_index(),
        reset_history: u32::from(prep.taa.is_some_and(|taa| taa.reset_history)),
    };
    let mut inputs = FrameInputs::new(
        settings.clone(),
        prep.display_mode,
        slot.write_uniform(device, &uniforms)?,
        slot.write_uniform(device, &post)?,
    );
    inputs.opaque = opaque;
    inputs.transparent = transparent;
    inputs.shadow_views = shadow_views;
    inputs.bounding_boxes = bounding_boxes;
    inputs.light_frustums = light_frustums;

    Ok(PreparedFrame {
        inputs,
        view_proj,
        world_transforms,
        triangles,
    })
}
