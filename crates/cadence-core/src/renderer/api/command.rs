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

//! Data types consumed by command encoders.

use super::{
    common::Extent2D,
    resource::{BufferId, ResourceState, SurfaceId},
};

/// An opaque handle to a finished, not yet submitted command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandBufferId(pub usize);

/// A state transition of one surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceBarrier {
    /// The surface being transitioned.
    pub surface: SurfaceId,
    /// Its state before the barrier.
    pub before: ResourceState,
    /// Its state after the barrier.
    pub after: ResourceState,
}

/// The value an attachment is cleared to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// A color.
    Color([f32; 4]),
    /// A depth value.
    Depth(f32),
}

/// What happens to an attachment's contents when a pass begins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LoadOp {
    /// Keep the existing contents.
    Load,
    /// Clear to the given value.
    Clear(ClearValue),
}

/// A color attachment of a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorAttachment {
    /// The target surface.
    pub surface: SurfaceId,
    /// The mip level rendered to.
    pub mip_level: u32,
    /// The load operation.
    pub load: LoadOp,
}

impl ColorAttachment {
    /// An attachment that keeps the existing contents of mip 0.
    pub fn load(surface: SurfaceId) -> Self {
        Self {
            surface,
            mip_level: 0,
            load: LoadOp::Load,
        }
    }
}

/// The depth attachment of a render pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthAttachment {
    /// The depth surface.
    pub surface: SurfaceId,
    /// The load operation.
    pub load: LoadOp,
    /// Depth testing without depth writes.
    pub read_only: bool,
}

/// Describes a render pass.
#[derive(Debug, Clone, Copy)]
pub struct RenderPassDescriptor<'a> {
    /// A debug label.
    pub label: Option<&'a str>,
    /// Color attachments, in binding order.
    pub color_attachments: &'a [ColorAttachment],
    /// The optional depth attachment.
    pub depth_attachment: Option<DepthAttachment>,
}

/// A buffer-to-buffer copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCopy {
    /// Source buffer.
    pub source: BufferId,
    /// Offset into the source.
    pub source_offset: u64,
    /// Destination buffer.
    pub destination: BufferId,
    /// Offset into the destination.
    pub destination_offset: u64,
    /// Number of bytes.
    pub size: u64,
}

/// A copy between a buffer and one mip level of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferSurfaceCopy {
    /// The buffer side of the copy.
    pub buffer: BufferId,
    /// Offset of the first row inside the buffer.
    pub buffer_offset: u64,
    /// Stride between rows inside the buffer.
    pub bytes_per_row: u32,
    /// The surface side of the copy.
    pub surface: SurfaceId,
    /// The mip level.
    pub mip_level: u32,
    /// The copied region, starting at the origin.
    pub extent: Extent2D,
}
