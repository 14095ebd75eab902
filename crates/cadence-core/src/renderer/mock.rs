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

//! A minimal in-memory device used by this crate's unit tests.

use crate::renderer::{
    api::{
        command::{BufferCopy, BufferSurfaceCopy, CommandBufferId, RenderPassDescriptor, SurfaceBarrier},
        common::Viewport,
        pipeline::{PipelineDescriptor, PipelineId},
        resource::{
            BufferDescriptor, BufferId, BufferSlice, QuerySetId, SurfaceDescriptor, SurfaceId,
        },
        sync::CompletionToken,
    },
    error::{RenderError, ResourceError},
    traits::{CommandEncoder, ComputePass, GraphicsDevice, RenderPass},
};
use std::collections::{HashMap, VecDeque};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct MockState {
    buffers: HashMap<BufferId, Vec<u8>>,
    surfaces: HashMap<SurfaceId, u32>,
    pipelines: usize,
    query_sets: HashMap<QuerySetId, u32>,
    recorded: HashMap<CommandBufferId, Vec<MockCommand>>,
    pending: VecDeque<(u64, Vec<MockCommand>)>,
    last_submitted: u64,
    completed: u64,
}

/// Commands the mock keeps; everything else is counted only.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MockCommand {
    Transition(SurfaceBarrier),
    CopyBuffer(BufferCopy),
    CopyToSurface(BufferSurfaceCopy),
    Timestamp(QuerySetId, u32),
    Other,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<MockState>,
    next_id: AtomicUsize,
}

#[derive(Debug)]
pub(crate) struct MockGraphicsDevice {
    shared: Arc<Shared>,
    latency: usize,
    stalled: AtomicBool,
    pub(crate) submitted_streams: Mutex<Vec<Vec<MockCommand>>>,
}

impl MockGraphicsDevice {
    pub(crate) fn new() -> Self {
        Self::with_latency(0)
    }

    /// The GPU stays `latency` submissions behind until polled.
    pub(crate) fn with_latency(latency: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(MockState::default()),
                next_id: AtomicUsize::new(1),
            }),
            latency,
            stalled: AtomicBool::new(false),
            submitted_streams: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    pub(crate) fn submit_empty(&self) -> CompletionToken {
        let encoder = self.create_command_encoder(Some("empty"));
        self.submit(encoder.finish()).unwrap()
    }

    pub(crate) fn live_buffers(&self) -> usize {
        self.shared.state.lock().unwrap().buffers.len()
    }

    pub(crate) fn buffer_contents(&self, id: BufferId) -> Vec<u8> {
        self.shared.state.lock().unwrap().buffers[&id].clone()
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.shared.state.lock().unwrap().pending.len()
    }

    fn next_id(&self) -> usize {
        self.shared.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn retire_one(state: &mut MockState) {
        if let Some((token, commands)) = state.pending.pop_front() {
            for command in commands {
                if let MockCommand::CopyBuffer(copy) = command {
                    let src = state.buffers[&copy.source].clone();
                    let start = copy.source_offset as usize;
                    let bytes = &src[start..start + copy.size as usize];
                    if let Some(dst) = state.buffers.get_mut(&copy.destination) {
                        let offset = copy.destination_offset as usize;
                        dst[offset..offset + bytes.len()].copy_from_slice(bytes);
                    }
                }
            }
            state.completed = token;
        }
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn create_surface(&self, descriptor: &SurfaceDescriptor) -> Result<SurfaceId, ResourceError> {
        let id = SurfaceId(self.next_id());
        let mut state = self.shared.state.lock().unwrap();
        state.surfaces.insert(id, descriptor.mip_levels);
        Ok(id)
    }

    fn destroy_surface(&self, id: SurfaceId) -> Result<(), ResourceError> {
        let mut state = self.shared.state.lock().unwrap();
        state.surfaces.remove(&id).map(|_| ()).ok_or(ResourceError::NotFound)
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let id = BufferId(self.next_id());
        let mut state = self.shared.state.lock().unwrap();
        state.buffers.insert(id, vec![0; descriptor.size as usize]);
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let mut state = self.shared.state.lock().unwrap();
        state.buffers.remove(&id).map(|_| ()).ok_or(ResourceError::NotFound)
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut state = self.shared.state.lock().unwrap();
        let buffer = state.buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
        let start = offset as usize;
        let end = start + data.len();
        if end > buffer.len() {
            return Err(ResourceError::OutOfBounds);
        }
        buffer[start..end].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&self, id: BufferId, offset: u64, size: u64) -> Result<Vec<u8>, ResourceError> {
        let state = self.shared.state.lock().unwrap();
        let buffer = state.buffers.get(&id).ok_or(ResourceError::NotFound)?;
        let start = offset as usize;
        buffer
            .get(start..start + size as usize)
            .map(<[u8]>::to_vec)
            .ok_or(ResourceError::OutOfBounds)
    }

    fn create_pipeline(&self, _descriptor: &PipelineDescriptor) -> Result<PipelineId, ResourceError> {
        self.shared.state.lock().unwrap().pipelines += 1;
        Ok(PipelineId(self.next_id()))
    }

    fn destroy_pipeline(&self, _id: PipelineId) -> Result<(), ResourceError> {
        self.shared.state.lock().unwrap().pipelines -= 1;
        Ok(())
    }

    fn create_timestamp_queries(&self, count: u32) -> Result<QuerySetId, ResourceError> {
        let id = QuerySetId(self.next_id());
        self.shared.state.lock().unwrap().query_sets.insert(id, count);
        Ok(id)
    }

    fn destroy_timestamp_queries(&self, id: QuerySetId) -> Result<(), ResourceError> {
        let mut state = self.shared.state.lock().unwrap();
        state.query_sets.remove(&id).map(|_| ()).ok_or(ResourceError::NotFound)
    }

    fn read_timestamps(&self, id: QuerySetId, count: u32) -> Result<Vec<u64>, ResourceError> {
        let state = self.shared.state.lock().unwrap();
        let capacity = *state.query_sets.get(&id).ok_or(ResourceError::NotFound)?;
        if count > capacity {
            return Err(ResourceError::OutOfBounds);
        }
        Ok((0..count as u64).map(|i| i * 1_000).collect())
    }

    fn timestamp_period_ns(&self) -> f64 {
        1.0
    }

    fn create_command_encoder(&self, _label: Option<&str>) -> Box<dyn CommandEncoder> {
        Box::new(MockEncoder {
            shared: Arc::clone(&self.shared),
            commands: Vec::new(),
        })
    }

    fn submit(&self, command_buffer: CommandBufferId) -> Result<CompletionToken, RenderError> {
        let mut state = self.shared.state.lock().unwrap();
        let commands = state
            .recorded
            .remove(&command_buffer)
            .ok_or(RenderError::Internal("unknown command buffer".into()))?;
        self.submitted_streams.lock().unwrap().push(commands.clone());
        state.last_submitted += 1;
        let token = state.last_submitted;
        state.pending.push_back((token, commands));
        while state.pending.len() > self.latency && !self.stalled.load(Ordering::SeqCst) {
            Self::retire_one(&mut state);
        }
        Ok(CompletionToken(token))
    }

    fn completed_token(&self) -> CompletionToken {
        CompletionToken(self.shared.state.lock().unwrap().completed)
    }

    fn poll(&self) {
        if !self.stalled.load(Ordering::SeqCst) {
            Self::retire_one(&mut self.shared.state.lock().unwrap());
        }
    }

    fn wait_idle(&self) -> Result<(), RenderError> {
        let mut state = self.shared.state.lock().unwrap();
        while !state.pending.is_empty() {
            Self::retire_one(&mut state);
        }
        Ok(())
    }

    fn adapter_name(&self) -> String {
        "mock".to_string()
    }
}

struct MockEncoder {
    shared: Arc<Shared>,
    commands: Vec<MockCommand>,
}

struct MockPass<'a> {
    commands: &'a mut Vec<MockCommand>,
}

impl RenderPass for MockPass<'_> {
    fn set_pipeline(&mut self, _pipeline: PipelineId) {}
    fn set_viewport(&mut self, _viewport: Viewport) {}
    fn bind_buffer(&mut self, _slot: u32, _slice: BufferSlice) {}
    fn bind_surface(&mut self, _slot: u32, _surface: SurfaceId) {}
    fn set_vertex_buffer(&mut self, _slot: u32, _slice: BufferSlice) {}
    fn set_index_buffer(&mut self, _slice: BufferSlice) {}
    fn draw(&mut self, _vertices: Range<u32>, _instances: Range<u32>) {
        self.commands.push(MockCommand::Other);
    }
    fn draw_indexed(&mut self, _indices: Range<u32>, _base_vertex: i32, _instances: Range<u32>) {
        self.commands.push(MockCommand::Other);
    }
}

impl ComputePass for MockPass<'_> {
    fn set_pipeline(&mut self, _pipeline: PipelineId) {}
    fn bind_buffer(&mut self, _slot: u32, _slice: BufferSlice) {}
    fn bind_surface(&mut self, _slot: u32, _surface: SurfaceId) {}
    fn bind_storage_surface(&mut self, _slot: u32, _surface: SurfaceId) {}
    fn dispatch(&mut self, _x: u32, _y: u32, _z: u32) {
        self.commands.push(MockCommand::Other);
    }
}

impl CommandEncoder for MockEncoder {
    fn transition(&mut self, barrier: SurfaceBarrier) {
        self.commands.push(MockCommand::Transition(barrier));
    }

    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        _descriptor: &RenderPassDescriptor<'_>,
    ) -> Box<dyn RenderPass + 'encoder> {
        Box::new(MockPass {
            commands: &mut self.commands,
        })
    }

    fn begin_compute_pass<'encoder>(
        &'encoder mut self,
        _label: Option<&str>,
    ) -> Box<dyn ComputePass + 'encoder> {
        Box::new(MockPass {
            commands: &mut self.commands,
        })
    }

    fn resolve_surface(&mut self, _source: SurfaceId, _destination: SurfaceId) {
        self.commands.push(MockCommand::Other);
    }

    fn copy_buffer_to_buffer(&mut self, copy: &BufferCopy) {
        self.commands.push(MockCommand::CopyBuffer(*copy));
    }

    fn copy_buffer_to_surface(&mut self, copy: &BufferSurfaceCopy) {
        self.commands.push(MockCommand::CopyToSurface(*copy));
    }

    fn copy_surface_to_buffer(&mut self, _copy: &BufferSurfaceCopy) {
        self.commands.push(MockCommand::Other);
    }

    fn write_timestamp(&mut self, queries: QuerySetId, index: u32) {
        self.commands.push(MockCommand::Timestamp(queries, index));
    }

    fn push_debug_group(&mut self, _label: &str) {}

    fn pop_debug_group(&mut self) {}

    fn finish(self: Box<Self>) -> CommandBufferId {
        let MockEncoder { shared, commands } = *self;
        let id = CommandBufferId(shared.next_id.fetch_add(1, Ordering::Relaxed));
        shared.state.lock().unwrap().recorded.insert(id, commands);
        id
    }
}
