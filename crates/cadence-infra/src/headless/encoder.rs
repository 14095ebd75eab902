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

use super::command::RecordedCommand;
use super::device::HeadlessDevice;
use cadence_core::renderer::{
    BufferCopy, BufferSlice, BufferSurfaceCopy, CommandBufferId, CommandEncoder, ComputePass,
    PipelineId, QuerySetId, RenderPass, RenderPassDescriptor, SurfaceBarrier, SurfaceId, Viewport,
};
use std::ops::Range;

pub struct HeadlessRenderPass<'a> {
    commands: &'a mut Vec<RecordedCommand>,
}

impl RenderPass for HeadlessRenderPass<'_> {
    fn set_pipeline(&mut self, pipeline: PipelineId) {
        self.commands.push(RecordedCommand::SetPipeline(pipeline));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.commands.push(RecordedCommand::SetViewport(viewport));
    }

    fn bind_buffer(&mut self, slot: u32, slice: BufferSlice) {
        self.commands.push(RecordedCommand::BindBuffer { slot, slice });
    }

    fn bind_surface(&mut self, slot: u32, surface: SurfaceId) {
        self.commands
            .push(RecordedCommand::BindSurface { slot, surface });
    }

    fn set_vertex_buffer(&mut self, slot: u32, slice: BufferSlice) {
        self.commands
            .push(RecordedCommand::SetVertexBuffer { slot, slice });
    }

    fn set_index_buffer(&mut self, slice: BufferSlice) {
        self.commands.push(RecordedCommand::SetIndexBuffer(slice));
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.commands
            .push(RecordedCommand::Draw { vertices, instances });
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        self.commands.push(RecordedCommand::DrawIndexed {
            indices,
            base_vertex,
            instances,
        });
    }
}

impl Drop for HeadlessRenderPass<'_> {
    fn drop(&mut self) {
        self.commands.push(RecordedCommand::EndRenderPass);
    }
}

pub struct HeadlessComputePass<'a> {
    commands: &'a mut Vec<RecordedCommand>,
}

impl ComputePass for HeadlessComputePass<'_> {
    fn set_pipeline(&mut self, pipeline: PipelineId) {
        self.commands.push(RecordedCommand::SetPipeline(pipeline));
    }

    fn bind_buffer(&mut self, slot: u32, slice: BufferSlice) {
        self.commands.push(RecordedCommand::BindBuffer { slot, slice });
    }

    fn bind_surface(&mut self, slot: u32, surface: SurfaceId) {
        self.commands
            .push(RecordedCommand::BindSurface { slot, surface });
    }

    fn bind_storage_surface(&mut self, slot: u32, surface: SurfaceId) {
        self.commands
            .push(RecordedCommand::BindStorageSurface { slot, surface });
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.commands.push(RecordedCommand::Dispatch([x, y, z]));
    }
}

impl Drop for HeadlessComputePass<'_> {
    fn drop(&mut self) {
        self.commands.push(RecordedCommand::EndComputePass);
    }
}

/// Records commands into a list that the [`HeadlessDevice`] replays on submission.
pub struct HeadlessCommandEncoder {
    pub(crate) label: String,
    pub(crate) commands: Vec<RecordedCommand>,
    pub(crate) device: HeadlessDevice,
}

impl CommandEncoder for HeadlessCommandEncoder {
    fn transition(&mut self, barrier: SurfaceBarrier) {
        self.commands.push(RecordedCommand::Transition(barrier));
    }

    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'_>,
    ) -> Box<dyn RenderPass + 'encoder> {
        self.commands.push(RecordedCommand::BeginRenderPass {
            label: descriptor.label.map(str::to_owned),
            color: descriptor.color_attachments.to_vec(),
            depth: descriptor.depth_attachment,
        });
        Box::new(HeadlessRenderPass {
            commands: &mut self.commands,
        })
    }

    fn begin_compute_pass<'encoder>(
        &'encoder mut self,
        label: Option<&str>,
    ) -> Box<dyn ComputePass + 'encoder> {
        self.commands.push(RecordedCommand::BeginComputePass {
            label: label.map(str::to_owned),
        });
        Box::new(HeadlessComputePass {
            commands: &mut self.commands,
        })
    }

    fn resolve_surface(&mut self, source: SurfaceId, destination: SurfaceId) {
        self.commands.push(RecordedCommand::Resolve {
            source,
            destination,
        });
    }

    fn copy_buffer_to_buffer(&mut self, copy: &BufferCopy) {
        self.commands.push(RecordedCommand::CopyBufferToBuffer(*copy));
    }

    fn copy_buffer_to_surface(&mut self, copy: &BufferSurfaceCopy) {
        self.commands
            .push(RecordedCommand::CopyBufferToSurface(*copy));
    }

    fn copy_surface_to_buffer(&mut self, copy: &BufferSurfaceCopy) {
        self.commands
            .push(RecordedCommand::CopySurfaceToBuffer(*copy));
    }

    fn write_timestamp(&mut self, queries: QuerySetId, index: u32) {
        self.commands
            .push(RecordedCommand::Timestamp { queries, index });
    }

    fn push_debug_group(&mut self, label: &str) {
        self.commands
            .push(RecordedCommand::PushDebugGroup(label.to_owned()));
    }

    fn pop_debug_group(&mut self) {
        self.commands.push(RecordedCommand::PopDebugGroup);
    }

    fn finish(self: Box<Self>) -> CommandBufferId {
        let HeadlessCommandEncoder {
            label,
            commands,
            device,
        } = *self;
        device.register_command_buffer(label, commands)
    }
}
