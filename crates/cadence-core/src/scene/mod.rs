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

//! Scene descriptions handed to the orchestrator by the asset loader.
//!
//! A [`SceneDescription`] is the CPU-side view of a loaded model: lights,
//! cameras, meshes, materials, textures and the objects placing them in the
//! world. Parsing files and evaluating animation curves happen behind the
//! trait; the orchestrator only samples the results.

mod static_scene;

pub use static_scene::StaticScene;

use crate::renderer::api::common::{Extent2D, TextureFormat};
use glam::{Mat4, Vec3};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Errors raised while producing a scene description.
#[derive(Debug)]
pub enum AssetError {
    /// Nothing exists at the requested path.
    AssetNotFound {
        /// The requested path.
        path: PathBuf,
    },
    /// The asset exists but its content is inconsistent.
    Malformed {
        /// The asset path, or a name for in-memory scenes.
        path: PathBuf,
        /// What is wrong with it.
        reason: String,
    },
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::AssetNotFound { path } => {
                write!(f, "Asset not found: '{}'", path.display())
            }
            AssetError::Malformed { path, reason } => {
                write!(f, "Malformed asset '{}': {reason}", path.display())
            }
        }
    }
}

impl std::error::Error for AssetError {}

/// The kind of a light source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightKind {
    /// Infinitely distant, parallel rays.
    Directional,
    /// Omnidirectional point light. Never rendered into the shadow atlas.
    Point,
    /// Cone-shaped spot light.
    Spot,
}

/// A light of the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneLight {
    /// Name from the asset.
    pub name: String,
    /// Kind.
    pub kind: LightKind,
    /// Linear color.
    pub color: Vec3,
    /// Intensity.
    pub intensity: f32,
    /// Attenuation range.
    pub range: f32,
    /// Inner cone angle in radians (spot lights).
    pub inner_cone_angle: f32,
    /// Outer cone angle in radians (spot lights).
    pub outer_cone_angle: f32,
    /// Whether the asset asks for shadows.
    pub casts_shadow: bool,
    /// World transform; the light looks down its local -Z axis.
    pub transform: Mat4,
}

impl SceneLight {
    /// Whether the light competes for a shadow-atlas quadrant.
    pub fn is_shadow_caster(&self) -> bool {
        self.casts_shadow && matches!(self.kind, LightKind::Directional | LightKind::Spot)
    }

    /// World-space position.
    pub fn position(&self) -> Vec3 {
        self.transform.w_axis.truncate()
    }

    /// World-space direction the light points at.
    pub fn direction(&self) -> Vec3 {
        (-self.transform.z_axis.truncate()).normalize_or_zero()
    }

    /// The view-projection used to render the light's shadow.
    pub fn view_projection(&self) -> Mat4 {
        let position = self.position();
        let direction = self.direction();
        let up = if direction.abs_diff_eq(Vec3::Y, 1e-3) || direction.abs_diff_eq(-Vec3::Y, 1e-3) {
            Vec3::Z
        } else {
            Vec3::Y
        };
        let view = Mat4::look_to_rh(position, direction, up);
        let projection = match self.kind {
            LightKind::Directional => {
                let half = self.range.max(1.0);
                Mat4::orthographic_rh(-half, half, -half, half, 0.1, 2.0 * half)
            }
            LightKind::Spot | LightKind::Point => Mat4::perspective_rh(
                (2.0 * self.outer_cone_angle).clamp(0.01, std::f32::consts::PI - 0.01),
                1.0,
                0.1,
                self.range.max(0.2),
            ),
        };
        projection * view
    }
}

/// A camera defined by the asset.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneCamera {
    /// Name from the asset.
    pub name: String,
    /// World transform of the camera.
    pub transform: Mat4,
    /// Vertical field of view in radians.
    pub y_fov: f32,
    /// Near plane.
    pub z_near: f32,
    /// Far plane.
    pub z_far: f32,
}

/// How a material treats alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AlphaMode {
    /// Fully opaque.
    #[default]
    Opaque,
    /// Alpha-tested.
    Mask,
    /// Alpha-blended; drawn in the transparent pass.
    Blend,
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// The center point.
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// The box mapping the unit cube [-1, 1]³ onto this box.
    pub fn unit_cube_transform(&self) -> Mat4 {
        Mat4::from_translation(self.center()) * Mat4::from_scale((self.max - self.min) * 0.5)
    }
}

/// Geometry of one mesh, interleaved and ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    /// Name from the asset.
    pub name: String,
    /// Interleaved vertex bytes.
    pub vertices: Vec<u8>,
    /// Size of one vertex.
    pub vertex_stride: u32,
    /// Triangle list indices.
    pub indices: Vec<u32>,
    /// Local-space bounds.
    pub bounds: Aabb,
}

impl MeshData {
    /// Number of vertices.
    pub fn vertex_count(&self) -> u32 {
        if self.vertex_stride == 0 {
            0
        } else {
            (self.vertices.len() / self.vertex_stride as usize) as u32
        }
    }
}

/// Material parameters relevant to pass assignment and binding.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MaterialData {
    /// Name from the asset.
    pub name: String,
    /// Alpha handling.
    pub alpha_mode: AlphaMode,
    /// Whether back faces are drawn.
    pub double_sided: bool,
    /// Indices into [`SceneDescription::textures`].
    pub textures: Vec<usize>,
}

/// Decoded pixels of a texture, mip level 0 only.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureSource {
    /// Name from the asset.
    pub name: String,
    /// Size of mip level 0.
    pub extent: Extent2D,
    /// Pixel format of `pixels`.
    pub format: TextureFormat,
    /// Tightly packed rows of mip level 0.
    pub pixels: Arc<[u8]>,
    /// Whether the remaining mip levels are generated at load time.
    pub generate_mips: bool,
}

/// An instance of a mesh in the world.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    /// Name from the asset.
    pub name: String,
    /// Index into [`SceneDescription::meshes`].
    pub mesh: usize,
    /// Index into [`SceneDescription::materials`].
    pub material: usize,
    /// Index of the skin deforming the mesh, if any.
    pub skin: Option<usize>,
}

/// The CPU-side description of a loaded scene.
pub trait SceneDescription: Send + Sync {
    /// Lights, in asset order.
    fn lights(&self) -> &[SceneLight];

    /// Cameras defined by the asset.
    fn cameras(&self) -> &[SceneCamera];

    /// Objects placing meshes in the world.
    fn objects(&self) -> &[SceneObject];

    /// Mesh geometry.
    fn meshes(&self) -> &[MeshData];

    /// Materials.
    fn materials(&self) -> &[MaterialData];

    /// Texture pixels.
    fn textures(&self) -> &[TextureSource];

    /// Samples animations at `seconds` and updates the world transforms.
    fn set_animation_time(&mut self, seconds: f32);

    /// World transform of an object at the current animation time.
    fn world_transform(&self, object: usize) -> Mat4;

    /// Joint matrices of a skin at the current animation time.
    fn skinning_matrices(&self, skin: usize) -> &[Mat4];
}

/// Produces scene descriptions from paths.
pub trait AssetLoader: Send + Sync {
    /// Loads the scene stored at `path`.
    fn load(&self, path: &Path) -> Result<Box<dyn SceneDescription>, AssetError>;
}
