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

//! GPU-side layouts of the per-frame uniform data.
//!
//! All structs are `#[repr(C)]` and `Pod` so they can be copied byte-for-byte
//! into a frame slot's arena. Matrices are column-major.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};

/// Maximum number of lights carried by one [`UniformFrame`].
pub const MAX_LIGHTS: usize = 32;

/// `shadow_map_index` of a light that has no atlas quadrant.
pub const NO_SHADOW: i32 = -1;

/// Encoded light type, matching `LightKind` ordering.
pub mod light_type {
    /// Directional light.
    pub const DIRECTIONAL: u32 = 0;
    /// Point light.
    pub const POINT: u32 = 1;
    /// Spot light.
    pub const SPOT: u32 = 2;
}

/// One light as seen by the shaders.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GpuLight {
    /// View-projection used to render and sample this light's shadow.
    pub light_view_proj: [[f32; 4]; 4],
    /// World-space direction.
    pub direction: [f32; 3],
    /// Attenuation range.
    pub range: f32,
    /// Linear color.
    pub color: [f32; 3],
    /// Intensity.
    pub intensity: f32,
    /// World-space position.
    pub position: [f32; 3],
    /// Cosine of the inner cone angle (spot lights).
    pub inner_cone_cos: f32,
    /// Cosine of the outer cone angle (spot lights).
    pub outer_cone_cos: f32,
    /// One of the [`light_type`] constants.
    pub light_type: u32,
    /// Depth bias applied when sampling the shadow.
    pub depth_bias: f32,
    /// Atlas quadrant, or [`NO_SHADOW`].
    pub shadow_map_index: i32,
}

/// Per-frame camera and light data shared by every pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct UniformFrame {
    /// Current view-projection, jittered when TAA is on.
    pub view_proj: [[f32; 4]; 4],
    /// View-projection of the previous rendered frame.
    pub prev_view_proj: [[f32; 4]; 4],
    /// Inverse of `view_proj`.
    pub inv_view_proj: [[f32; 4]; 4],
    /// World-space camera position (w = 1).
    pub camera_position: [f32; 4],
    /// 1 / render resolution.
    pub inv_screen_resolution: [f32; 2],
    /// Scale of image-based lighting.
    pub ibl_factor: f32,
    /// Scale of emissive contributions.
    pub emissive_factor: f32,
    /// Exposure applied before tone mapping.
    pub exposure: f32,
    /// Number of valid entries in `lights`.
    pub light_count: u32,
    /// Sub-pixel projection jitter, in clip space.
    pub jitter: [f32; 2],
    /// Lights, the first `light_count` are valid.
    pub lights: [GpuLight; MAX_LIGHTS],
}

impl UniformFrame {
    /// Starts a frame block from camera matrices.
    pub fn new(view_proj: Mat4, prev_view_proj: Mat4, camera_position: Vec3) -> Self {
        let mut frame = Self::zeroed();
        frame.view_proj = view_proj.to_cols_array_2d();
        frame.prev_view_proj = prev_view_proj.to_cols_array_2d();
        frame.inv_view_proj = view_proj.inverse().to_cols_array_2d();
        frame.camera_position = camera_position.extend(1.0).to_array();
        frame
    }

    /// Appends a light. Returns `false` once the block is full.
    pub fn push_light(&mut self, light: GpuLight) -> bool {
        let index = self.light_count as usize;
        if index >= MAX_LIGHTS {
            return false;
        }
        self.lights[index] = light;
        self.light_count += 1;
        true
    }

    /// The valid lights.
    pub fn active_lights(&self) -> &[GpuLight] {
        &self.lights[..self.light_count as usize]
    }

    /// Sets the sub-pixel jitter.
    pub fn set_jitter(&mut self, jitter: Vec2) {
        self.jitter = jitter.to_array();
    }
}

/// Per-object transforms.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ObjectUniforms {
    /// Current world transform.
    pub world: [[f32; 4]; 4],
    /// World transform of the previous rendered frame, for motion vectors.
    pub prev_world: [[f32; 4]; 4],
}

impl ObjectUniforms {
    /// Builds the block from both transforms.
    pub fn new(world: Mat4, prev_world: Mat4) -> Self {
        Self {
            world: world.to_cols_array_2d(),
            prev_world: prev_world.to_cols_array_2d(),
        }
    }
}

/// The camera of one shadow-atlas quadrant.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ShadowUniforms {
    /// The light's view-projection.
    pub light_view_proj: [[f32; 4]; 4],
}

/// Parameters of the post-process chain.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PostUniforms {
    /// Exposure applied before tone mapping.
    pub exposure: f32,
    /// Tone-mapping operator index.
    pub tone_mapper: u32,
    /// Display color-space index.
    pub color_space: u32,
    /// Non-zero on the first TAA frame after the history was invalidated.
    pub reset_history: u32,
}
