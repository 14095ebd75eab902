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

use cadence_core::renderer::{
    BufferCopy, BufferSlice, BufferSurfaceCopy, ColorAttachment, CompletionToken,
    DepthAttachment, PipelineId, QuerySetId, SurfaceBarrier, SurfaceId, Viewport,
};
use std::ops::Range;

/// One command as recorded by a [`HeadlessCommandEncoder`](super::HeadlessCommandEncoder).
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    Transition(SurfaceBarrier),
    BeginRenderPass {
        label: Option<String>,
        color: Vec<ColorAttachment>,
        depth: Option<DepthAttachment>,
    },
    EndRenderPass,
    BeginComputePass {
        label: Option<String>,
    },
    EndComputePass,
    SetPipeline(PipelineId),
    SetViewport(Viewport),
    BindBuffer {
        slot: u32,
        slice: BufferSlice,
    },
    BindSurface {
        slot: u32,
        surface: SurfaceId,
    },
    BindStorageSurface {
        slot: u32,
        surface: SurfaceId,
    },
    SetVertexBuffer {
        slot: u32,
        slice: BufferSlice,
    },
    SetIndexBuffer(BufferSlice),
    Draw {
        vertices: Range<u32>,
        instances: Range<u32>,
    },
    DrawIndexed {
        indices: Range<u32>,
        base_vertex: i32,
        instances: Range<u32>,
    },
    Dispatch([u32; 3]),
    Resolve {
        source: SurfaceId,
        destination: SurfaceId,
    },
    CopyBufferToBuffer(BufferCopy),
    CopyBufferToSurface(BufferSurfaceCopy),
    CopySurfaceToBuffer(BufferSurfaceCopy),
    Timestamp {
        queries: QuerySetId,
        index: u32,
    },
    PushDebugGroup(String),
    PopDebugGroup,
}

impl RecordedCommand {
    /// Buffer ranges the GPU reads while executing this command.
    pub fn buffer_reads(&self) -> Option<BufferSlice> {
        match self {
            RecordedCommand::BindBuffer { slice, .. }
            | RecordedCommand::SetVertexBuffer { slice, .. }
            | RecordedCommand::SetIndexBuffer(slice) => Some(*slice),
            RecordedCommand::CopyBufferToBuffer(copy) => Some(BufferSlice {
                buffer: copy.source,
                offset: copy.source_offset,
                size: copy.size,
            }),
            RecordedCommand::CopyBufferToSurface(copy) => Some(BufferSlice {
                buffer: copy.buffer,
                offset: copy.buffer_offset,
                size: u64::from(copy.bytes_per_row) * u64::from(copy.extent.height),
            }),
            _ => None,
        }
    }

    /// Whether the command is a draw call.
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            RecordedCommand::Draw { .. } | RecordedCommand::DrawIndexed { .. }
        )
    }
}

/// A command buffer as it was submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmittedStream {
    /// The token the submission returned.
    pub token: CompletionToken,
    /// The encoder label.
    pub label: String,
    /// The recorded commands, in order.
    pub commands: Vec<RecordedCommand>,
}

impl SubmittedStream {
    /// Labels of every debug group, in recording order.
    pub fn debug_groups(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                RecordedCommand::PushDebugGroup(label) => Some(label.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Number of draw calls.
    pub fn draw_count(&self) -> usize {
        self.commands.iter().filter(|c| c.is_draw()).count()
    }

    /// Number of compute dispatches.
    pub fn dispatch_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, RecordedCommand::Dispatch(_)))
            .count()
    }

    /// Barriers recorded for one surface.
    pub fn transitions_of(&self, surface: SurfaceId) -> Vec<SurfaceBarrier> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                RecordedCommand::Transition(barrier) if barrier.surface == surface => Some(*barrier),
                _ => None,
            })
            .collect()
    }

    /// Draw calls recorded inside the debug group named `group`.
    pub fn draws_in_group(&self, group: &str) -> usize {
        let mut depth_inside = None;
        let mut depth = 0usize;
        let mut draws = 0;
        for command in &self.commands {
            match command {
                RecordedCommand::PushDebugGroup(label) => {
                    depth += 1;
                    if depth_inside.is_none() && label == group {
                        depth_inside = Some(depth);
                    }
                }
                RecordedCommand::PopDebugGroup => {
                    if depth_inside == Some(depth) {
                        depth_inside = None;
                    }
                    depth = depth.saturating_sub(1);
                }
                command if depth_inside.is_some() && command.is_draw() => draws += 1,
                _ => {}
            }
        }
        draws
    }
}
