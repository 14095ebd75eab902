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

//! Identifiers, descriptors and states of GPU resources.

use super::common::{Extent2D, TextureFormat};
use bitflags::bitflags;
use std::borrow::Cow;

/// An opaque handle to a GPU 2D image (render target, depth buffer, texture or swap image).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub usize);

/// An opaque handle to a GPU buffer resource.
///
/// This ID is returned by [`GraphicsDevice::create_buffer`](crate::renderer::GraphicsDevice::create_buffer)
/// and is used to reference the buffer in all subsequent operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub usize);

/// An opaque handle to a set of GPU timestamp queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuerySetId(pub usize);

/// A byte range inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferSlice {
    /// The buffer.
    pub buffer: BufferId,
    /// Offset of the first byte.
    pub offset: u64,
    /// Length of the range in bytes.
    pub size: u64,
}

impl BufferSlice {
    /// Whether two slices of the same buffer share at least one byte.
    pub fn overlaps(&self, other: &BufferSlice) -> bool {
        self.buffer == other.buffer
            && self.offset < other.offset + other.size
            && other.offset < self.offset + self.size
    }
}

/// The usage state a surface is in. A surface is in exactly one state at a time.
///
/// `Undecided` doubles as "contents undefined": a freshly created surface, or
/// one whose contents were discarded, may be written but never read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceState {
    /// No defined usage and no defined contents.
    #[default]
    Undecided,
    /// Bound as a color or depth attachment.
    RenderTarget,
    /// Sampled by shaders.
    ShaderReadable,
    /// Read and written by compute shaders.
    UnorderedAccess,
    /// Source of a copy or resolve.
    TransferSrc,
    /// Destination of a copy or resolve.
    TransferDst,
    /// Handed to the presentation engine.
    Present,
}

impl ResourceState {
    /// A short name for logs.
    pub const fn label(&self) -> &'static str {
        match self {
            ResourceState::Undecided => "undecided",
            ResourceState::RenderTarget => "render-target",
            ResourceState::ShaderReadable => "shader-readable",
            ResourceState::UnorderedAccess => "unordered-access",
            ResourceState::TransferSrc => "transfer-src",
            ResourceState::TransferDst => "transfer-dst",
            ResourceState::Present => "present",
        }
    }
}

bitflags! {
    /// A set of flags describing how a surface may be used.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SurfaceUsage: u32 {
        /// Can be bound as a color or depth attachment.
        const RENDER_ATTACHMENT = 1 << 0;
        /// Can be sampled.
        const SAMPLED = 1 << 1;
        /// Can be bound for unordered (storage) access.
        const STORAGE = 1 << 2;
        /// Can be the source of a copy.
        const COPY_SRC = 1 << 3;
        /// Can be the destination of a copy.
        const COPY_DST = 1 << 4;
        /// Can be presented.
        const PRESENT = 1 << 5;
    }
}

/// A descriptor used to create a [`SurfaceId`].
#[derive(Debug, Clone)]
pub struct SurfaceDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// Size of mip level 0.
    pub extent: Extent2D,
    /// Pixel format.
    pub format: TextureFormat,
    /// Number of mip levels.
    pub mip_levels: u32,
    /// Samples per pixel.
    pub sample_count: u32,
    /// Allowed usages.
    pub usage: SurfaceUsage,
    /// The state the surface starts in. Anything other than `Undecided`
    /// means the backend clears the contents at creation.
    pub initial_state: ResourceState,
}

bitflags! {
    /// A set of flags describing the allowed usages of a [`BufferId`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// The buffer can be mapped for reading on the CPU.
        const MAP_READ = 1 << 0;
        /// The buffer can be mapped for writing on the CPU.
        const MAP_WRITE = 1 << 1;
        /// The buffer can be used as the source of a copy operation.
        const COPY_SRC = 1 << 2;
        /// The buffer can be used as the destination of a copy operation.
        const COPY_DST = 1 << 3;
        /// The buffer can be bound as a vertex buffer.
        const VERTEX = 1 << 4;
        /// The buffer can be bound as an index buffer.
        const INDEX = 1 << 5;
        /// The buffer can be bound as a uniform buffer.
        const UNIFORM = 1 << 6;
        /// The buffer can be bound as a storage buffer.
        const STORAGE = 1 << 7;
    }
}

/// A descriptor used to create a [`BufferId`].
#[derive(Debug, Clone)]
pub struct BufferDescriptor<'a> {
    /// An optional debug label for the buffer.
    pub label: Option<Cow<'a, str>>,
    /// The total size of the buffer in bytes.
    pub size: u64,
    /// A bitmask of [`BufferUsage`] flags describing how the buffer will be used.
    pub usage: BufferUsage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slices_of_different_buffers_never_overlap() {
        let a = BufferSlice {
            buffer: BufferId(1),
            offset: 0,
            size: 256,
        };
        let b = BufferSlice {
            buffer: BufferId(2),
            ..a
        };
        assert!(!a.overlaps(&b));
    }

    #[test]
    fn test_adjacent_slices_do_not_overlap() {
        let a = BufferSlice {
            buffer: BufferId(1),
            offset: 0,
            size: 256,
        };
        let b = BufferSlice { offset: 256, ..a };
        let c = BufferSlice { offset: 128, ..a };
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&b));
    }
}
