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

use super::{
    AssetError, MaterialData, MeshData, SceneCamera, SceneDescription, SceneLight, SceneObject,
    TextureSource,
};
use glam::Mat4;
use std::path::PathBuf;

#[derive(Debug, Clone)]
struct Placement {
    base: Mat4,
    spin_rate: f32,
}

/// An in-memory scene whose only animation is a per-object spin about +Y.
#[derive(Debug, Clone, Default)]
pub struct StaticScene {
    name: String,
    lights: Vec<SceneLight>,
    cameras: Vec<SceneCamera>,
    objects: Vec<SceneObject>,
    placements: Vec<Placement>,
    meshes: Vec<MeshData>,
    materials: Vec<MaterialData>,
    textures: Vec<TextureSource>,
    skins: Vec<Vec<Mat4>>,
    animation_time: f32,
}

impl StaticScene {
    /// Creates an empty scene.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// The scene name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a light.
    pub fn with_light(mut self, light: SceneLight) -> Self {
        self.lights.push(light);
        self
    }

    /// Adds a camera.
    pub fn with_camera(mut self, camera: SceneCamera) -> Self {
        self.cameras.push(camera);
        self
    }

    /// Adds a mesh and returns its index.
    pub fn add_mesh(&mut self, mesh: MeshData) -> usize {
        self.meshes.push(mesh);
        self.meshes.len() - 1
    }

    /// Adds a material and returns its index.
    pub fn add_material(&mut self, material: MaterialData) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    /// Adds a texture and returns its index.
    pub fn add_texture(&mut self, texture: TextureSource) -> usize {
        self.textures.push(texture);
        self.textures.len() - 1
    }

    /// Adds a skin and returns its index.
    pub fn add_skin(&mut self, joints: Vec<Mat4>) -> usize {
        self.skins.push(joints);
        self.skins.len() - 1
    }

    /// Places a mesh in the world and returns the object index.
    pub fn add_object(&mut self, object: SceneObject, transform: Mat4) -> usize {
        self.objects.push(object);
        self.placements.push(Placement {
            base: transform,
            spin_rate: 0.0,
        });
        self.objects.len() - 1
    }

    /// Makes an object spin about +Y at `radians_per_second`.
    pub fn set_spin(&mut self, object: usize, radians_per_second: f32) {
        if let Some(placement) = self.placements.get_mut(object) {
            placement.spin_rate = radians_per_second;
        }
    }

    /// The current animation time.
    pub fn animation_time(&self) -> f32 {
        self.animation_time
    }

    /// Checks that every cross reference points at an existing entry.
    pub fn validate(&self) -> Result<(), AssetError> {
        let malformed = |reason: String| AssetError::Malformed {
            path: PathBuf::from(&self.name),
            reason,
        };

        for object in &self.objects {
            if object.mesh >= self.meshes.len() {
                return Err(malformed(format!(
                    "object '{}' references mesh {} of {}",
                    object.name,
                    object.mesh,
                    self.meshes.len()
                )));
            }
            if object.material >= self.materials.len() {
                return Err(malformed(format!(
                    "object '{}' references material {} of {}",
                    object.name,
                    object.material,
                    self.materials.len()
                )));
            }
            if let Some(skin) = object.skin.filter(|&skin| skin >= self.skins.len()) {
                return Err(malformed(format!(
                    "object '{}' references skin {} of {}",
                    object.name,
                    skin,
                    self.skins.len()
                )));
            }
        }
        for material in &self.materials {
            if let Some(texture) = material.textures.iter().find(|&&t| t >= self.textures.len()) {
                return Err(malformed(format!(
                    "material '{}' references texture {} of {}",
                    material.name,
                    texture,
                    self.textures.len()
                )));
            }
        }
        Ok(())
    }
}

impl SceneDescription for StaticScene {
    fn lights(&self) -> &[SceneLight] {
        &self.lights
    }

    fn cameras(&self) -> &[SceneCamera] {
        &self.cameras
    }

    fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    fn meshes(&self) -> &[MeshData] {
        &self.meshes
    }

    fn materials(&self) -> &[MaterialData] {
        &self.materials
    }

    fn textures(&self) -> &[TextureSource] {
        &self.textures
    }

    fn set_animation_time(&mut self, seconds: f32) {
        self.animation_time = seconds;
    }

    fn world_transform(&self, object: usize) -> Mat4 {
        self.placements
            .get(object)
            .map_or(Mat4::IDENTITY, |placement| {
                placement.base * Mat4::from_rotation_y(placement.spin_rate * self.animation_time)
            })
    }

    fn skinning_matrices(&self, skin: usize) -> &[Mat4] {
        self.skins.get(skin).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Aabb, AlphaMode};
    use glam::Vec3;

    fn cube_mesh() -> MeshData {
        MeshData {
            name: "cube".into(),
            vertices: vec![0; 8 * 32],
            vertex_stride: 32,
            indices: (0..36).collect(),
            bounds: Aabb {
                min: Vec3::splat(-1.0),
                max: Vec3::splat(1.0),
            },
        }
    }

    fn object(mesh: usize, material: usize) -> SceneObject {
        SceneObject {
            name: "obj".into(),
            mesh,
            material,
            skin: None,
        }
    }

    #[test]
    fn test_dangling_mesh_reference_is_malformed() {
        let mut scene = StaticScene::new("broken");
        scene.add_material(MaterialData::default());
        scene.add_object(object(3, 0), Mat4::IDENTITY);
        let err = scene.validate().unwrap_err();
        assert!(matches!(err, AssetError::Malformed { .. }));
        assert!(err.to_string().contains("mesh 3 of 0"));
    }

    #[test]
    fn test_spin_animates_world_transform() {
        let mut scene = StaticScene::new("spin");
        let mesh = scene.add_mesh(cube_mesh());
        let material = scene.add_material(MaterialData {
            alpha_mode: AlphaMode::Opaque,
            ..MaterialData::default()
        });
        let index = scene.add_object(object(mesh, material), Mat4::IDENTITY);
        scene.set_spin(index, std::f32::consts::FRAC_PI_2);
        assert!(scene.validate().is_ok());

        scene.set_animation_time(1.0);
        let rotated = scene.world_transform(index).transform_vector3(Vec3::X);
        assert!(rotated.abs_diff_eq(-Vec3::Z, 1e-5), "got {rotated:?}");
    }

    #[test]
    fn test_unknown_skin_yields_no_joints() {
        let scene = StaticScene::new("empty");
        assert!(scene.skinning_matrices(0).is_empty());
        assert_eq!(scene.world_transform(5), Mat4::IDENTITY);
    }
}
