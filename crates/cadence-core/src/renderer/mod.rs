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

//! Backend-agnostic rendering contracts.
//!
//! Everything here is independent of a concrete graphics API. The `api` module
//! carries plain data types and the CPU-side helpers built on the traits
//! (transient frame ring, staging uploader); the `traits` module carries the
//! contracts a backend has to implement.

pub mod api;
pub mod error;
pub mod traits;

#[cfg(test)]
pub(crate) mod mock;

pub use self::api::{
    command::{
        BufferCopy, BufferSurfaceCopy, ClearValue, ColorAttachment, CommandBufferId,
        DepthAttachment, LoadOp, RenderPassDescriptor, SurfaceBarrier,
    },
    common::{Extent2D, TextureFormat, Viewport, MAX_FRAMES_IN_FLIGHT, MIN_UNIFORM_ALIGNMENT},
    display::{DisplayMode, SwapImage},
    pipeline::{BlendMode, PipelineDescriptor, PipelineId, PipelineKind},
    resource::{
        BufferDescriptor, BufferId, BufferSlice, BufferUsage, QuerySetId, ResourceState,
        SurfaceDescriptor, SurfaceId, SurfaceUsage,
    },
    staging::StagingUploader,
    sync::{wait_for_token, CompletionToken, FenceWaitPolicy},
    transient_ring::{FrameSlot, RetiredTimestamps, TransientResourceRing},
    uniforms::{
        light_type, GpuLight, ObjectUniforms, PostUniforms, ShadowUniforms, UniformFrame,
        MAX_LIGHTS, NO_SHADOW,
    },
};
pub use self::error::{RenderError, ResourceError, StateError};
pub use self::traits::{
    CapturedImage, CommandEncoder, ComputePass, GraphicsDevice, NoOverlay, RenderPass,
    ScreenshotSink, SwapChain, UiOverlay,
};
