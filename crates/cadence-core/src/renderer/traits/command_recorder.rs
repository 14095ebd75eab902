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

use crate::renderer::api::{
    command::{BufferCopy, BufferSurfaceCopy, CommandBufferId, RenderPassDescriptor, SurfaceBarrier},
    common::Viewport,
    pipeline::PipelineId,
    resource::{BufferSlice, QuerySetId, SurfaceId},
};
use std::ops::Range;

/// Commands recorded inside a render pass. The pass ends when it is dropped.
pub trait RenderPass {
    /// Binds a render pipeline.
    fn set_pipeline(&mut self, pipeline: PipelineId);

    /// Sets the viewport.
    fn set_viewport(&mut self, viewport: Viewport);

    /// Binds a uniform or storage buffer range to a slot.
    fn bind_buffer(&mut self, slot: u32, slice: BufferSlice);

    /// Binds a surface for sampling.
    fn bind_surface(&mut self, slot: u32, surface: SurfaceId);

    /// Binds a vertex buffer range.
    fn set_vertex_buffer(&mut self, slot: u32, slice: BufferSlice);

    /// Binds an index buffer range (32-bit indices).
    fn set_index_buffer(&mut self, slice: BufferSlice);

    /// Draws non-indexed primitives.
    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>);

    /// Draws indexed primitives.
    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>);
}

/// Commands recorded inside a compute pass. The pass ends when it is dropped.
pub trait ComputePass {
    /// Binds a compute pipeline.
    fn set_pipeline(&mut self, pipeline: PipelineId);

    /// Binds a uniform or storage buffer range to a slot.
    fn bind_buffer(&mut self, slot: u32, slice: BufferSlice);

    /// Binds a surface for sampling.
    fn bind_surface(&mut self, slot: u32, surface: SurfaceId);

    /// Binds a surface for unordered access.
    fn bind_storage_surface(&mut self, slot: u32, surface: SurfaceId);

    /// Dispatches workgroups.
    fn dispatch(&mut self, x: u32, y: u32, z: u32);
}

/// Records commands into a command buffer.
///
/// Encoders are created by [`GraphicsDevice::create_command_encoder`](super::GraphicsDevice::create_command_encoder)
/// and consumed by [`finish`](CommandEncoder::finish).
pub trait CommandEncoder: Send {
    /// Transitions a surface between states.
    fn transition(&mut self, barrier: SurfaceBarrier);

    /// Begins a render pass.
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'_>,
    ) -> Box<dyn RenderPass + 'encoder>;

    /// Begins a compute pass.
    fn begin_compute_pass<'encoder>(
        &'encoder mut self,
        label: Option<&str>,
    ) -> Box<dyn ComputePass + 'encoder>;

    /// Resolves a multisampled surface into a single-sampled one.
    fn resolve_surface(&mut self, source: SurfaceId, destination: SurfaceId);

    /// Copies between buffers.
    fn copy_buffer_to_buffer(&mut self, copy: &BufferCopy);

    /// Copies buffer data into a surface mip.
    fn copy_buffer_to_surface(&mut self, copy: &BufferSurfaceCopy);

    /// Copies a surface mip into a buffer.
    fn copy_surface_to_buffer(&mut self, copy: &BufferSurfaceCopy);

    /// Writes a GPU timestamp into a query.
    fn write_timestamp(&mut self, queries: QuerySetId, index: u32);

    /// Opens a labelled debug group.
    fn push_debug_group(&mut self, label: &str);

    /// Closes the innermost debug group.
    fn pop_debug_group(&mut self);

    /// Finalizes recording.
    fn finish(self: Box<Self>) -> CommandBufferId;
}
