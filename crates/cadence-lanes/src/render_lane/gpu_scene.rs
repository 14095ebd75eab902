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

//! GPU-resident copy of a loaded scene.
//!
//! Meshes, textures and materials live in flat arenas and refer to each other
//! by index. The pipelines that depend on the scene's vertex layout are owned
//! here as well, so unloading a scene is a single [`GpuScene::release`].

use super::shadow_lane::MAX_SHADOW_MAPS;
use super::surfaces::TargetFormats;
use crate::asset_lane::PreparedTexture;
use cadence_core::renderer::{
    BlendMode, BufferDescriptor, BufferId, BufferSlice, BufferUsage, Extent2D, GraphicsDevice,
    PipelineDescriptor, PipelineId, PipelineKind, RenderError, ResourceState, StagingUploader,
    SurfaceDescriptor, SurfaceId, SurfaceUsage, TextureFormat, MAX_LIGHTS,
};
use cadence_core::scene::{Aabb, AlphaMode, MaterialData, MeshData};
use std::borrow::Cow;

/// Vertex and index buffers of one mesh.
#[derive(Debug, Clone)]
pub struct GpuMesh {
    /// Name from the asset.
    pub name: String,
    /// Interleaved vertices.
    pub vertex_buffer: BufferId,
    /// Size of the vertex data.
    pub vertex_bytes: u64,
    /// 32-bit triangle list indices.
    pub index_buffer: BufferId,
    /// Number of indices.
    pub index_count: u32,
    /// Local-space bounds.
    pub bounds: Aabb,
}

impl GpuMesh {
    /// The whole vertex buffer.
    pub fn vertex_slice(&self) -> BufferSlice {
        BufferSlice {
            buffer: self.vertex_buffer,
            offset: 0,
            size: self.vertex_bytes,
        }
    }

    /// The whole index buffer.
    pub fn index_slice(&self) -> BufferSlice {
        BufferSlice {
            buffer: self.index_buffer,
            offset: 0,
            size: u64::from(self.index_count) * 4,
        }
    }
}

/// A sampled texture with its full mip chain.
#[derive(Debug, Clone)]
pub struct GpuTexture {
    /// Name from the asset.
    pub name: String,
    /// The surface.
    pub surface: SurfaceId,
    /// Size of mip level 0.
    pub extent: Extent2D,
    /// Pixel format.
    pub format: TextureFormat,
    /// Number of mip levels.
    pub mip_levels: u32,
}

/// A material with its textures resolved to surfaces.
#[derive(Debug, Clone, PartialEq)]
pub struct GpuMaterial {
    /// Name from the asset.
    pub name: String,
    /// Alpha handling, which decides the pass.
    pub alpha_mode: AlphaMode,
    /// Whether back faces are drawn.
    pub double_sided: bool,
    /// Bound in order from slot 2 of the lit passes.
    pub textures: Vec<SurfaceId>,
}

/// Pipelines built for the scene's vertex layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScenePipelines {
    /// Depth-only rendering into the shadow atlas.
    pub depth: Option<PipelineId>,
    /// Motion vector output.
    pub motion_vectors: Option<PipelineId>,
    /// Lit opaque and alpha-tested geometry.
    pub pbr_opaque: Option<PipelineId>,
    /// Lit blended geometry.
    pub pbr_transparent: Option<PipelineId>,
    /// Line rendering for bounding boxes, frustums and wireframe mode.
    pub wireframe: Option<PipelineId>,
}

/// Sizes of the scene arenas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneCounts {
    /// Meshes.
    pub meshes: usize,
    /// Textures.
    pub textures: usize,
    /// Materials.
    pub materials: usize,
    /// Built pipelines.
    pub pipelines: usize,
}

/// GPU resources of one loaded scene.
#[derive(Debug, Default)]
pub struct GpuScene {
    meshes: Vec<GpuMesh>,
    textures: Vec<GpuTexture>,
    materials: Vec<GpuMaterial>,
    pipelines: ScenePipelines,
}

impl GpuScene {
    /// Creates the mesh buffers and stages their contents.
    pub fn create_mesh(
        &mut self,
        device: &dyn GraphicsDevice,
        uploader: &mut StagingUploader,
        mesh: &MeshData,
    ) -> Result<usize, RenderError> {
        let vertex_bytes = mesh.vertices.len() as u64;
        let index_bytes: &[u8] = bytemuck::cast_slice(&mesh.indices);

        let vertex_buffer = device.create_buffer(&BufferDescriptor {
            label: Some(Cow::Owned(format!("{} vertices", mesh.name))),
            size: vertex_bytes.max(4),
            usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
        })?;
        let index_buffer = match device.create_buffer(&BufferDescriptor {
            label: Some(Cow::Owned(format!("{} indices", mesh.name))),
            size: (index_bytes.len() as u64).max(4),
            usage: BufferUsage::INDEX | BufferUsage::COPY_DST,
        }) {
            Ok(buffer) => buffer,
            Err(err) => {
                release_buffer(device, vertex_buffer);
                return Err(err.into());
            }
        };

        self.meshes.push(GpuMesh {
            name: mesh.name.clone(),
            vertex_buffer,
            vertex_bytes,
            index_buffer,
            index_count: mesh.indices.len() as u32,
            bounds: mesh.bounds,
        });
        uploader.stage_buffer(device, &mesh.vertices, vertex_buffer, 0)?;
        uploader.stage_buffer(device, index_bytes, index_buffer, 0)?;
        Ok(self.meshes.len() - 1)
    }

    /// Creates a sampled surface for a prepared texture and stages every mip.
    pub fn create_texture(
        &mut self,
        device: &dyn GraphicsDevice,
        uploader: &mut StagingUploader,
        texture: &PreparedTexture,
    ) -> Result<usize, RenderError> {
        let mip_levels = texture.mips.len() as u32;
        let surface = device.create_surface(&SurfaceDescriptor {
            label: Some(Cow::Borrowed(texture.name.as_str())),
            extent: texture.extent,
            format: texture.format,
            mip_levels,
            sample_count: 1,
            usage: SurfaceUsage::SAMPLED | SurfaceUsage::COPY_DST,
            initial_state: ResourceState::Undecided,
        })?;
        self.textures.push(GpuTexture {
            name: texture.name.clone(),
            surface,
            extent: texture.extent,
            format: texture.format,
            mip_levels,
        });
        uploader.stage_surface(device, surface, texture.format, texture.extent, &texture.mips)?;
        Ok(self.textures.len() - 1)
    }

    /// Resolves a material's texture indices and stores it.
    pub fn create_material(&mut self, material: &MaterialData) -> Result<usize, RenderError> {
        let textures = material
            .textures
            .iter()
            .map(|&index| {
                self.textures
                    .get(index)
                    .map(|texture| texture.surface)
                    .ok_or_else(|| {
                        RenderError::Internal(format!(
                            "material '{}' references texture {index} of {}",
                            material.name,
                            self.textures.len()
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.add_material(GpuMaterial {
            name: material.name.clone(),
            alpha_mode: material.alpha_mode,
            double_sided: material.double_sided,
            textures,
        }))
    }

    /// Stores an already resolved material.
    pub fn add_material(&mut self, material: GpuMaterial) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    fn build(
        device: &dyn GraphicsDevice,
        slot: &mut Option<PipelineId>,
        descriptor: PipelineDescriptor,
    ) -> Result<(), RenderError> {
        if slot.is_none() {
            *slot = Some(device.create_pipeline(&descriptor)?);
            log::debug!("GpuScene: built pipeline '{}'", descriptor.label);
        }
        Ok(())
    }

    /// Builds the shadow depth pipeline. Does nothing if it exists.
    pub fn build_depth_pipeline(
        &mut self,
        device: &dyn GraphicsDevice,
        targets: &TargetFormats,
    ) -> Result<(), RenderError> {
        Self::build(
            device,
            &mut self.pipelines.depth,
            PipelineDescriptor::new("Shadow depth", PipelineKind::Depth).with_depth(targets.depth),
        )
    }

    /// Builds the motion vector pipeline. Does nothing if it exists.
    pub fn build_motion_vector_pipeline(
        &mut self,
        device: &dyn GraphicsDevice,
        targets: &TargetFormats,
    ) -> Result<(), RenderError> {
        Self::build(
            device,
            &mut self.pipelines.motion_vectors,
            PipelineDescriptor::new("Motion vectors", PipelineKind::MotionVectors)
                .with_color(targets.motion_vectors)
                .with_depth(targets.depth)
                .with_samples(targets.sample_count),
        )
    }

    /// Builds the opaque and transparent lit pipelines. Does nothing for the
    /// ones that exist.
    pub fn build_pbr_pipelines(
        &mut self,
        device: &dyn GraphicsDevice,
        targets: &TargetFormats,
    ) -> Result<(), RenderError> {
        let lit = |label: &str, kind: PipelineKind| {
            PipelineDescriptor::new(label, kind)
                .with_color(targets.hdr)
                .with_depth(targets.depth)
                .with_samples(targets.sample_count)
                .with_define("MAX_LIGHTS", MAX_LIGHTS.to_string())
                .with_define("MAX_SHADOW_MAPS", MAX_SHADOW_MAPS.to_string())
        };
        Self::build(
            device,
            &mut self.pipelines.pbr_opaque,
            lit("PBR opaque", PipelineKind::PbrOpaque),
        )?;
        Self::build(
            device,
            &mut self.pipelines.pbr_transparent,
            lit("PBR transparent", PipelineKind::PbrTransparent).with_blend(BlendMode::AlphaBlend),
        )
    }

    /// Builds the line pipeline. Does nothing if it exists.
    pub fn build_wireframe_pipeline(
        &mut self,
        device: &dyn GraphicsDevice,
        targets: &TargetFormats,
    ) -> Result<(), RenderError> {
        Self::build(
            device,
            &mut self.pipelines.wireframe,
            PipelineDescriptor::new("Wireframe", PipelineKind::Wireframe)
                .with_color(targets.hdr)
                .with_depth(targets.depth)
                .with_samples(targets.sample_count),
        )
    }

    /// A mesh by index.
    pub fn mesh(&self, index: usize) -> Option<&GpuMesh> {
        self.meshes.get(index)
    }

    /// A texture by index.
    pub fn texture(&self, index: usize) -> Option<&GpuTexture> {
        self.textures.get(index)
    }

    /// A material by index.
    pub fn material(&self, index: usize) -> Option<&GpuMaterial> {
        self.materials.get(index)
    }

    /// The scene pipelines.
    pub fn pipelines(&self) -> &ScenePipelines {
        &self.pipelines
    }

    /// Arena sizes.
    pub fn counts(&self) -> SceneCounts {
        let p = &self.pipelines;
        let pipelines = [
            p.depth,
            p.motion_vectors,
            p.pbr_opaque,
            p.pbr_transparent,
            p.wireframe,
        ]
        .iter()
        .flatten()
        .count();
        SceneCounts {
            meshes: self.meshes.len(),
            textures: self.textures.len(),
            materials: self.materials.len(),
            pipelines,
        }
    }

    /// Whether nothing was created yet.
    pub fn is_empty(&self) -> bool {
        self.counts() == SceneCounts::default()
    }

    /// Destroys everything in reverse creation order: line, lit, motion
    /// vector and depth pipelines, then textures, then meshes. The GPU must be
    /// done with the scene.
    pub fn release(&mut self, device: &dyn GraphicsDevice) {
        let counts = self.counts();
        let p = &mut self.pipelines;
        for pipeline in [
            &mut p.wireframe,
            &mut p.pbr_transparent,
            &mut p.pbr_opaque,
            &mut p.motion_vectors,
            &mut p.depth,
        ] {
            super::release_pipeline(device, pipeline, "GpuScene");
        }
        for texture in self.textures.drain(..).rev() {
            if let Err(e) = device.destroy_surface(texture.surface) {
                log::warn!("GpuScene: Failed to destroy texture '{}': {e}", texture.name);
            }
        }
        for mesh in self.meshes.drain(..).rev() {
            release_buffer(device, mesh.index_buffer);
            release_buffer(device, mesh.vertex_buffer);
        }
        self.materials.clear();
        log::debug!(
            "GpuScene: released {} meshes, {} textures, {} pipelines",
            counts.meshes,
            counts.textures,
            counts.pipelines
        );
    }
}

fn release_buffer(device: &dyn GraphicsDevice, buffer: BufferId) {
    if let Err(e) = device.destroy_buffer(buffer) {
        log::warn!("GpuScene: Failed to destroy buffer {buffer:?}: {e}");
    }
}
