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

//! A generated scene exercising every pass: textured opaque cubes, blended
//! panes at increasing depth, shadow-casting lights and an optional skin.

use cadence_core::renderer::{Extent2D, TextureFormat};
use cadence_core::scene::{
    Aabb, AlphaMode, LightKind, MaterialData, MeshData, SceneCamera, SceneLight, SceneObject,
    StaticScene, TextureSource,
};
use glam::{Mat4, Quat, Vec3};
use std::sync::Arc;

const VERTEX_FLOATS: usize = 8;

/// What [`showcase_scene`] generates.
#[derive(Debug, Clone, PartialEq)]
pub struct ShowcaseOptions {
    /// Opaque cubes, laid out on a grid.
    pub opaque_objects: usize,
    /// Blended panes, one behind the other along -Z.
    pub transparent_objects: usize,
    /// Lights asking for shadows, alternating directional and spot.
    pub shadow_lights: usize,
    /// Point lights. These never receive an atlas quadrant.
    pub point_lights: usize,
    /// Edge length of the checker texture.
    pub texture_size: u32,
    /// Adds one skinned cube.
    pub skinned: bool,
    /// Spin of the opaque cubes in radians per second.
    pub spin: f32,
}

impl Default for ShowcaseOptions {
    fn default() -> Self {
        Self {
            opaque_objects: 9,
            transparent_objects: 3,
            shadow_lights: 2,
            point_lights: 1,
            texture_size: 64,
            skinned: true,
            spin: 0.5,
        }
    }
}

impl ShowcaseOptions {
    /// The number of objects the scene will contain.
    pub fn object_count(&self) -> usize {
        self.opaque_objects + self.transparent_objects + usize::from(self.skinned)
    }

    /// A scene without any geometry or light.
    pub fn empty() -> Self {
        Self {
            opaque_objects: 0,
            transparent_objects: 0,
            shadow_lights: 0,
            point_lights: 0,
            texture_size: 0,
            skinned: false,
            spin: 0.0,
        }
    }
}

fn cube_mesh() -> MeshData {
    // (normal, tangent u, tangent v) per face.
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];
    let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

    let mut floats = Vec::with_capacity(faces.len() * corners.len() * VERTEX_FLOATS);
    let mut indices = Vec::with_capacity(36);
    for (face, (normal, u, v)) in faces.iter().enumerate() {
        for (cu, cv) in corners {
            let position = *normal + *u * cu + *v * cv;
            floats.extend_from_slice(&position.to_array());
            floats.extend_from_slice(&normal.to_array());
            floats.extend_from_slice(&[(cu + 1.0) * 0.5, (cv + 1.0) * 0.5]);
        }
        let base = (face * 4) as u32;
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    MeshData {
        name: "Cube".to_string(),
        vertices: bytemuck::cast_slice(&floats).to_vec(),
        vertex_stride: (VERTEX_FLOATS * std::mem::size_of::<f32>()) as u32,
        indices,
        bounds: Aabb {
            min: Vec3::splat(-1.0),
            max: Vec3::splat(1.0),
        },
    }
}

fn checker_texture(size: u32) -> TextureSource {
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let light = ((x / 8) + (y / 8)) % 2 == 0;
            let value = if light { 230 } else { 40 };
            pixels.extend_from_slice(&[value, value, value, 255]);
        }
    }
    TextureSource {
        name: "Checker".to_string(),
        extent: Extent2D::new(size, size),
        format: TextureFormat::Rgba8UnormSrgb,
        pixels: Arc::from(pixels),
        generate_mips: true,
    }
}

fn light(index: usize, kind: LightKind) -> SceneLight {
    let angle = index as f32 * 1.3;
    let position = Vec3::new(6.0 * angle.cos(), 8.0, 6.0 * angle.sin());
    let rotation = Quat::from_rotation_arc(Vec3::NEG_Z, (-position).normalize());
    SceneLight {
        name: format!("{kind:?} light {index}"),
        kind,
        color: Vec3::new(1.0, 0.95, 0.9),
        intensity: if kind == LightKind::Directional { 3.0 } else { 40.0 },
        range: 30.0,
        inner_cone_angle: 0.3,
        outer_cone_angle: 0.5,
        casts_shadow: true,
        transform: Mat4::from_rotation_translation(rotation, position),
    }
}

/// Builds the showcase scene.
pub fn showcase_scene(options: &ShowcaseOptions) -> StaticScene {
    let eye = Vec3::new(0.0, 4.0, 12.0);
    let mut scene = StaticScene::new("Showcase").with_camera(SceneCamera {
        name: "Main camera".to_string(),
        transform: Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y).inverse(),
        y_fov: 45f32.to_radians(),
        z_near: 0.1,
        z_far: 200.0,
    });

    for index in 0..options.shadow_lights {
        let kind = if index % 2 == 0 {
            LightKind::Directional
        } else {
            LightKind::Spot
        };
        scene = scene.with_light(light(index, kind));
    }
    for index in 0..options.point_lights {
        scene = scene.with_light(light(options.shadow_lights + index, LightKind::Point));
    }

    if options.object_count() == 0 {
        return scene;
    }

    let cube = scene.add_mesh(cube_mesh());
    let textures = if options.texture_size > 0 {
        vec![scene.add_texture(checker_texture(options.texture_size))]
    } else {
        Vec::new()
    };
    let opaque = scene.add_material(MaterialData {
        name: "Checker".to_string(),
        alpha_mode: AlphaMode::Opaque,
        double_sided: false,
        textures,
    });
    let glass = scene.add_material(MaterialData {
        name: "Glass".to_string(),
        alpha_mode: AlphaMode::Blend,
        double_sided: true,
        textures: Vec::new(),
    });

    let columns = (options.opaque_objects as f32).sqrt().ceil().max(1.0) as usize;
    for index in 0..options.opaque_objects {
        let x = (index % columns) as f32 * 3.0 - columns as f32;
        let z = (index / columns) as f32 * -3.0;
        let object = scene.add_object(
            SceneObject {
                name: format!("Cube {index}"),
                mesh: cube,
                material: opaque,
                skin: None,
            },
            Mat4::from_translation(Vec3::new(x, 1.0, z)),
        );
        scene.set_spin(object, options.spin);
    }

    for index in 0..options.transparent_objects {
        scene.add_object(
            SceneObject {
                name: format!("Pane {index}"),
                mesh: cube,
                material: glass,
                skin: None,
            },
            Mat4::from_scale_rotation_translation(
                Vec3::new(1.5, 1.5, 0.05),
                Quat::IDENTITY,
                Vec3::new(0.0, 2.0, 4.0 - index as f32 * 2.5),
            ),
        );
    }

    if options.skinned {
        let skin = scene.add_skin(vec![
            Mat4::IDENTITY,
            Mat4::from_translation(Vec3::Y * 0.5),
        ]);
        scene.add_object(
            SceneObject {
                name: "Skinned cube".to_string(),
                mesh: cube,
                material: opaque,
                skin: Some(skin),
            },
            Mat4::from_translation(Vec3::new(4.0, 1.0, 2.0)),
        );
    }

    scene
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::scene::SceneDescription;

    #[test]
    fn test_default_showcase_is_consistent() {
        let options = ShowcaseOptions::default();
        let scene = showcase_scene(&options);
        scene.validate().unwrap();
        assert_eq!(scene.objects().len(), options.object_count());
        assert_eq!(scene.lights().len(), 3);
        assert_eq!(scene.lights().iter().filter(|l| l.is_shadow_caster()).count(), 2);
        assert_eq!(scene.meshes()[0].vertex_count(), 24);
        assert_eq!(scene.textures()[0].pixels.len(), 64 * 64 * 4);
    }

    #[test]
    fn test_empty_showcase_has_only_a_camera() {
        let scene = showcase_scene(&ShowcaseOptions::empty());
        assert!(scene.objects().is_empty());
        assert!(scene.meshes().is_empty());
        assert_eq!(scene.cameras().len(), 1);
    }
}
