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

use crate::renderer::{
    api::{
        command::CommandBufferId,
        pipeline::{PipelineDescriptor, PipelineId},
        resource::{BufferDescriptor, BufferId, QuerySetId, SurfaceDescriptor, SurfaceId},
        sync::CompletionToken,
    },
    error::{RenderError, ResourceError},
    traits::CommandEncoder,
};
use std::fmt::Debug;

/// Defines the contract for a graphics device, abstracting over a specific graphics API.
///
/// The device owns every GPU resource, records commands through
/// [`CommandEncoder`]s and runs them on a single in-order queue. Submissions
/// return a [`CompletionToken`]; the CPU learns about GPU progress only
/// through [`completed_token`](GraphicsDevice::completed_token).
pub trait GraphicsDevice: Send + Sync + Debug + 'static {
    // --- Surfaces ---

    /// Creates a 2D image.
    fn create_surface(&self, descriptor: &SurfaceDescriptor) -> Result<SurfaceId, ResourceError>;

    /// Destroys a 2D image. The caller guarantees the GPU no longer uses it.
    fn destroy_surface(&self, id: SurfaceId) -> Result<(), ResourceError>;

    // --- Buffers ---

    /// Creates a buffer.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Destroys a buffer. The caller guarantees the GPU no longer uses it.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Writes CPU data into a CPU-visible buffer.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Reads back a CPU-readable buffer.
    fn read_buffer(&self, id: BufferId, offset: u64, size: u64) -> Result<Vec<u8>, ResourceError>;

    // --- Pipelines ---

    /// Creates a render or compute pipeline.
    fn create_pipeline(&self, descriptor: &PipelineDescriptor) -> Result<PipelineId, ResourceError>;

    /// Destroys a pipeline.
    fn destroy_pipeline(&self, id: PipelineId) -> Result<(), ResourceError>;

    // --- Timestamp queries ---

    /// Creates a set of `count` timestamp queries.
    fn create_timestamp_queries(&self, count: u32) -> Result<QuerySetId, ResourceError>;

    /// Destroys a query set.
    fn destroy_timestamp_queries(&self, id: QuerySetId) -> Result<(), ResourceError>;

    /// Reads the first `count` timestamps of a query set, in ticks.
    /// Only valid once the work that wrote them has completed.
    fn read_timestamps(&self, id: QuerySetId, count: u32) -> Result<Vec<u64>, ResourceError>;

    /// Nanoseconds per timestamp tick.
    fn timestamp_period_ns(&self) -> f64;

    // --- Submission ---

    /// Creates a command encoder.
    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder>;

    /// Submits a finished command buffer and returns the token that signals its completion.
    fn submit(&self, command_buffer: CommandBufferId) -> Result<CompletionToken, RenderError>;

    /// The highest token whose work has completed.
    fn completed_token(&self) -> CompletionToken;

    /// Lets the backend make progress on completed work without blocking.
    fn poll(&self);

    /// Blocks until every submission has completed.
    fn wait_idle(&self) -> Result<(), RenderError>;

    /// A human-readable name of the adapter.
    fn adapter_name(&self) -> String;
}
