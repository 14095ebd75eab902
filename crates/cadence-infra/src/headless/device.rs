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

//! A graphics device without a GPU.
//!
//! [`HeadlessDevice`] keeps every resource in host memory and runs submitted
//! command lists on a simulated, in-order GPU timeline that trails the CPU by
//! a configurable number of submissions. It validates what a real validation
//! layer would check: barrier `before` states, attachment and binding states,
//! and CPU writes into memory the GPU still reads.

use super::command::{RecordedCommand, SubmittedStream};
use super::encoder::HeadlessCommandEncoder;
use cadence_core::renderer::{
    BufferDescriptor, BufferId, BufferSurfaceCopy, ClearValue, CommandBufferId, CommandEncoder,
    CompletionToken, Extent2D, GraphicsDevice, LoadOp, PipelineDescriptor, PipelineId,
    PipelineKind, QuerySetId, RenderError, ResourceError, ResourceState, SurfaceDescriptor,
    SurfaceId, TextureFormat,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Tunables of the simulated GPU timeline.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// How many submissions the GPU may trail behind before a new submission
    /// forces the oldest one to complete.
    pub latency: usize,
    /// Nanoseconds per timestamp tick.
    pub timestamp_period_ns: f64,
    /// GPU clock advance per executed command.
    pub ticks_per_command: u64,
    /// Name reported by [`GraphicsDevice::adapter_name`].
    pub adapter_name: String,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            latency: 2,
            timestamp_period_ns: 1.0,
            ticks_per_command: 250,
            adapter_name: "Headless timeline".to_string(),
        }
    }
}

/// What a surface holds, as far as the simulated GPU knows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SurfaceContents {
    /// Never written.
    Undefined,
    /// Cleared to a value and not drawn to since.
    Cleared([f32; 4]),
    /// Last written by the submission with this token.
    Written(CompletionToken),
}

/// Live resource counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceCounts {
    pub surfaces: usize,
    pub buffers: usize,
    pub pipelines: usize,
    pub query_sets: usize,
}

/// A swap image handed to the presentation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentRecord {
    /// Swap image index.
    pub image: usize,
    /// The presented surface.
    pub surface: SurfaceId,
    /// The token the presentation waited for.
    pub after: CompletionToken,
}

#[derive(Debug)]
struct SurfaceEntry {
    label: String,
    extent: Extent2D,
    format: TextureFormat,
    size_bytes: u64,
    state: ResourceState,
    contents: SurfaceContents,
}

#[derive(Debug)]
struct BufferEntry {
    label: String,
    bytes: Vec<u8>,
}

#[derive(Debug)]
struct PipelineEntry {
    label: String,
    kind: PipelineKind,
}

#[derive(Debug)]
struct PendingSubmission {
    token: u64,
    label: String,
    commands: Vec<RecordedCommand>,
}

#[derive(Debug, Default)]
struct TimelineState {
    surfaces: HashMap<SurfaceId, SurfaceEntry>,
    buffers: HashMap<BufferId, BufferEntry>,
    pipelines: HashMap<PipelineId, PipelineEntry>,
    query_sets: HashMap<QuerySetId, Vec<u64>>,
    finished: HashMap<CommandBufferId, (String, Vec<RecordedCommand>)>,
    pending: VecDeque<PendingSubmission>,
    last_submitted: u64,
    completed: u64,
    clock: u64,
    submissions: Vec<SubmittedStream>,
    presents: Vec<PresentRecord>,
    validation_errors: Vec<String>,
    hazards: Vec<String>,
    destroyed: Vec<String>,
}

#[derive(Debug)]
struct HeadlessDeviceInternal {
    config: HeadlessConfig,
    state: Mutex<TimelineState>,
    stalled: AtomicBool,
    next_surface_id: AtomicUsize,
    next_buffer_id: AtomicUsize,
    next_pipeline_id: AtomicUsize,
    next_query_set_id: AtomicUsize,
    next_command_buffer_id: AtomicUsize,
    allocated_bytes: AtomicU64,
    peak_bytes: AtomicU64,
}

/// A clonable handle to the simulated device. Clones share all state.
#[derive(Debug, Clone)]
pub struct HeadlessDevice {
    internal: Arc<HeadlessDeviceInternal>,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new(HeadlessConfig::default())
    }
}

impl HeadlessDevice {
    pub fn new(config: HeadlessConfig) -> Self {
        log::info!(
            "HeadlessDevice: created '{}' (latency {} submissions)",
            config.adapter_name,
            config.latency
        );
        Self {
            internal: Arc::new(HeadlessDeviceInternal {
                config,
                state: Mutex::new(TimelineState::default()),
                stalled: AtomicBool::new(false),
                next_surface_id: AtomicUsize::new(1),
                next_buffer_id: AtomicUsize::new(1),
                next_pipeline_id: AtomicUsize::new(1),
                next_query_set_id: AtomicUsize::new(1),
                next_command_buffer_id: AtomicUsize::new(1),
                allocated_bytes: AtomicU64::new(0),
                peak_bytes: AtomicU64::new(0),
            }),
        }
    }

    /// A device whose GPU trails by `latency` submissions.
    pub fn with_latency(latency: usize) -> Self {
        Self::new(HeadlessConfig {
            latency,
            ..HeadlessConfig::default()
        })
    }

    fn state(&self) -> MutexGuard<'_, TimelineState> {
        self.internal
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn track_allocation(&self, bytes: u64) {
        let now = self
            .internal
            .allocated_bytes
            .fetch_add(bytes, Ordering::Relaxed)
            + bytes;
        self.internal.peak_bytes.fetch_max(now, Ordering::Relaxed);
    }

    fn track_release(&self, bytes: u64) {
        self.internal
            .allocated_bytes
            .fetch_sub(bytes, Ordering::Relaxed);
    }

    /// Freezes or resumes the GPU timeline. A frozen timeline completes nothing.
    pub fn set_stalled(&self, stalled: bool) {
        self.internal.stalled.store(stalled, Ordering::SeqCst);
    }

    fn is_stalled(&self) -> bool {
        self.internal.stalled.load(Ordering::SeqCst)
    }

    pub(crate) fn register_command_buffer(
        &self,
        label: String,
        commands: Vec<RecordedCommand>,
    ) -> CommandBufferId {
        let id = CommandBufferId(
            self.internal
                .next_command_buffer_id
                .fetch_add(1, Ordering::Relaxed),
        );
        self.state().finished.insert(id, (label, commands));
        id
    }

    pub(crate) fn record_present(&self, record: PresentRecord) -> Result<(), RenderError> {
        let mut state = self.state();
        let entry = state
            .surfaces
            .get(&record.surface)
            .ok_or(ResourceError::NotFound)?;
        if entry.state != ResourceState::Present {
            let message = format!(
                "present: '{}' is {} instead of present",
                entry.label,
                entry.state.label()
            );
            log::error!("HeadlessDevice: {message}");
            state.validation_errors.push(message);
        }
        state.presents.push(record);
        Ok(())
    }

    // --- Inspection ---

    /// Every submission so far, in submission order.
    pub fn submissions(&self) -> Vec<SubmittedStream> {
        self.state().submissions.clone()
    }

    /// Submissions made after the first `skip` ones.
    pub fn submissions_since(&self, skip: usize) -> Vec<SubmittedStream> {
        self.state().submissions.iter().skip(skip).cloned().collect()
    }

    /// Number of submissions so far.
    pub fn submission_count(&self) -> usize {
        self.state().submissions.len()
    }

    /// Every present, in order.
    pub fn presents(&self) -> Vec<PresentRecord> {
        self.state().presents.clone()
    }

    /// State violations found while replaying submissions.
    pub fn validation_errors(&self) -> Vec<String> {
        self.state().validation_errors.clone()
    }

    /// CPU writes that overlapped memory still read by pending GPU work.
    pub fn hazards(&self) -> Vec<String> {
        self.state().hazards.clone()
    }

    /// Labels of destroyed resources, in destruction order, prefixed by kind.
    pub fn destroyed_log(&self) -> Vec<String> {
        self.state().destroyed.clone()
    }

    /// Number of live resources of each kind.
    pub fn live_resource_counts(&self) -> ResourceCounts {
        let state = self.state();
        ResourceCounts {
            surfaces: state.surfaces.len(),
            buffers: state.buffers.len(),
            pipelines: state.pipelines.len(),
            query_sets: state.query_sets.len(),
        }
    }

    /// Labels of live pipelines of a kind.
    pub fn pipelines_of_kind(&self, kind: PipelineKind) -> Vec<String> {
        let mut labels: Vec<String> = self
            .state()
            .pipelines
            .values()
            .filter(|entry| entry.kind == kind)
            .map(|entry| entry.label.clone())
            .collect();
        labels.sort();
        labels
    }

    /// The state of a surface on the GPU timeline, after every submission so far.
    pub fn surface_state(&self, id: SurfaceId) -> Option<ResourceState> {
        self.state().surfaces.get(&id).map(|entry| entry.state)
    }

    /// What a surface holds after every completed submission.
    pub fn surface_contents(&self, id: SurfaceId) -> Option<SurfaceContents> {
        self.state().surfaces.get(&id).map(|entry| entry.contents)
    }

    /// The size of mip level 0 of a surface.
    pub fn surface_extent(&self, id: SurfaceId) -> Option<Extent2D> {
        self.state().surfaces.get(&id).map(|entry| entry.extent)
    }

    /// The debug label of a surface.
    pub fn surface_label(&self, id: SurfaceId) -> Option<String> {
        self.state().surfaces.get(&id).map(|entry| entry.label.clone())
    }

    /// Bytes currently allocated.
    pub fn allocated_bytes(&self) -> u64 {
        self.internal.allocated_bytes.load(Ordering::Relaxed)
    }

    /// The highest number of bytes allocated at once.
    pub fn peak_bytes(&self) -> u64 {
        self.internal.peak_bytes.load(Ordering::Relaxed)
    }

    /// Number of submitted but not yet completed command lists.
    pub fn pending_submissions(&self) -> usize {
        self.state().pending.len()
    }

    // --- Timeline ---

    fn retire_one(&self, state: &mut TimelineState) -> bool {
        let Some(submission) = state.pending.pop_front() else {
            return false;
        };
        execute(state, &submission, self.internal.config.ticks_per_command);
        state.completed = submission.token;
        log::trace!(
            "HeadlessDevice: '{}' completed (token {})",
            submission.label,
            submission.token
        );
        true
    }
}

fn usage_error(stream: &str, surface: &SurfaceEntry, usage: &str, required: ResourceState) -> String {
    format!(
        "{stream}: '{}' used as {usage} while {} (requires {})",
        surface.label,
        surface.state.label(),
        required.label()
    )
}

fn require_state(
    state: &TimelineState,
    errors: &mut Vec<String>,
    stream: &str,
    surface: SurfaceId,
    usage: &str,
    required: ResourceState,
) {
    match state.surfaces.get(&surface) {
        Some(entry) if entry.state != required => {
            errors.push(usage_error(stream, entry, usage, required));
        }
        Some(_) => {}
        None => errors.push(format!("{stream}: {usage} references destroyed {surface:?}")),
    }
}

/// Replays the state transitions of a submission in queue order.
fn validate_states(state: &mut TimelineState, stream: &str, commands: &[RecordedCommand]) {
    let mut errors = Vec::new();
    for command in commands {
        match command {
            RecordedCommand::Transition(barrier) => match state.surfaces.get_mut(&barrier.surface) {
                Some(entry) => {
                    if entry.state != barrier.before {
                        errors.push(format!(
                            "{stream}: barrier on '{}' expects {} but it is {}",
                            entry.label,
                            barrier.before.label(),
                            entry.state.label()
                        ));
                    }
                    entry.state = barrier.after;
                }
                None => errors.push(format!(
                    "{stream}: barrier references destroyed {:?}",
                    barrier.surface
                )),
            },
            RecordedCommand::BeginRenderPass { color, depth, .. } => {
                for attachment in color {
                    require_state(
                        state,
                        &mut errors,
                        stream,
                        attachment.surface,
                        "color attachment",
                        ResourceState::RenderTarget,
                    );
                }
                if let Some(depth) = depth {
                    require_state(
                        state,
                        &mut errors,
                        stream,
                        depth.surface,
                        "depth attachment",
                        ResourceState::RenderTarget,
                    );
                }
            }
            RecordedCommand::BindSurface { surface, .. } => require_state(
                state,
                &mut errors,
                stream,
                *surface,
                "sampled surface",
                ResourceState::ShaderReadable,
            ),
            RecordedCommand::BindStorageSurface { surface, .. } => require_state(
                state,
                &mut errors,
                stream,
                *surface,
                "storage surface",
                ResourceState::UnorderedAccess,
            ),
            RecordedCommand::Resolve {
                source,
                destination,
            } => {
                require_state(
                    state,
                    &mut errors,
                    stream,
                    *source,
                    "resolve source",
                    ResourceState::TransferSrc,
                );
                require_state(
                    state,
                    &mut errors,
                    stream,
                    *destination,
                    "resolve destination",
                    ResourceState::TransferDst,
                );
            }
            RecordedCommand::CopyBufferToSurface(copy) => require_state(
                state,
                &mut errors,
                stream,
                copy.surface,
                "copy destination",
                ResourceState::TransferDst,
            ),
            RecordedCommand::CopySurfaceToBuffer(copy) => require_state(
                state,
                &mut errors,
                stream,
                copy.surface,
                "copy source",
                ResourceState::TransferSrc,
            ),
            _ => {}
        }
    }

    for error in &errors {
        log::error!("HeadlessDevice: {error}");
    }
    state.validation_errors.extend(errors);
}

/// Encodes one pixel of `contents` in `format`.
///
/// Cleared RGBA8 surfaces yield their quantized clear color; written surfaces
/// carry the low 32 bits of the writing submission's token in their first
/// four bytes, so read-backs can be matched to the frame that produced them.
fn encode_pixel(contents: SurfaceContents, format: TextureFormat) -> Vec<u8> {
    let mut pixel = vec![0u8; format.bytes_per_pixel() as usize];
    match contents {
        SurfaceContents::Undefined => {}
        SurfaceContents::Cleared(color) if format.is_rgba8_family() => {
            let quantize = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
            let [r, g, b, a] = color.map(quantize);
            let ordered = if format == TextureFormat::Bgra8UnormSrgb {
                [b, g, r, a]
            } else {
                [r, g, b, a]
            };
            pixel[..4].copy_from_slice(&ordered);
        }
        SurfaceContents::Cleared(_) => {}
        SurfaceContents::Written(token) => {
            pixel[..4].copy_from_slice(&(token.0 as u32).to_le_bytes());
        }
    }
    pixel
}

fn read_back(state: &mut TimelineState, copy: &BufferSurfaceCopy) {
    let Some(surface) = state.surfaces.get(&copy.surface) else {
        return;
    };
    let pixel = encode_pixel(surface.contents, surface.format);
    let Some(buffer) = state.buffers.get_mut(&copy.buffer) else {
        return;
    };
    for row in 0..copy.extent.height as usize {
        let row_start = copy.buffer_offset as usize + row * copy.bytes_per_row as usize;
        for column in 0..copy.extent.width as usize {
            let start = row_start + column * pixel.len();
            if let Some(target) = buffer.bytes.get_mut(start..start + pixel.len()) {
                target.copy_from_slice(&pixel);
            }
        }
    }
}

struct OpenRenderPass {
    color: Vec<(SurfaceId, LoadOp)>,
    depth: Option<(SurfaceId, LoadOp, bool)>,
    draws: usize,
}

/// Executes a submission: buffer copies, timestamps and surface contents.
fn execute(state: &mut TimelineState, submission: &PendingSubmission, ticks_per_command: u64) {
    let written = SurfaceContents::Written(CompletionToken(submission.token));
    let mut render_pass: Option<OpenRenderPass> = None;
    let mut storage_targets: Vec<SurfaceId> = Vec::new();
    let mut dispatches = 0usize;

    for command in &submission.commands {
        state.clock += ticks_per_command;
        match command {
            RecordedCommand::Timestamp { queries, index } => {
                let clock = state.clock;
                if let Some(slot) = state
                    .query_sets
                    .get_mut(queries)
                    .and_then(|ticks| ticks.get_mut(*index as usize))
                {
                    *slot = clock;
                }
            }
            RecordedCommand::CopyBufferToBuffer(copy) => {
                let source = state.buffers.get(&copy.source).and_then(|entry| {
                    let start = copy.source_offset as usize;
                    entry.bytes.get(start..start + copy.size as usize).map(<[u8]>::to_vec)
                });
                if let (Some(bytes), Some(destination)) =
                    (source, state.buffers.get_mut(&copy.destination))
                {
                    let start = copy.destination_offset as usize;
                    if let Some(target) = destination.bytes.get_mut(start..start + bytes.len()) {
                        target.copy_from_slice(&bytes);
                    }
                }
            }
            RecordedCommand::CopyBufferToSurface(copy) => {
                if let Some(surface) = state.surfaces.get_mut(&copy.surface) {
                    surface.contents = written;
                }
            }
            RecordedCommand::CopySurfaceToBuffer(copy) => read_back(state, copy),
            RecordedCommand::Resolve {
                source,
                destination,
            } => {
                let contents = state.surfaces.get(source).map(|entry| entry.contents);
                if let (Some(contents), Some(target)) = (contents, state.surfaces.get_mut(destination)) {
                    target.contents = contents;
                }
            }
            RecordedCommand::BeginRenderPass { color, depth, .. } => {
                render_pass = Some(OpenRenderPass {
                    color: color.iter().map(|a| (a.surface, a.load)).collect(),
                    depth: depth.map(|d| (d.surface, d.load, d.read_only)),
                    draws: 0,
                });
            }
            command if command.is_draw() => {
                state.clock += ticks_per_command * 3;
                if let Some(pass) = render_pass.as_mut() {
                    pass.draws += 1;
                }
            }
            RecordedCommand::EndRenderPass => {
                if let Some(pass) = render_pass.take() {
                    let mut targets: Vec<(SurfaceId, LoadOp)> = pass.color;
                    if let Some((surface, load, read_only)) = pass.depth {
                        if !read_only {
                            targets.push((surface, load));
                        }
                    }
                    for (surface, load) in targets {
                        let Some(entry) = state.surfaces.get_mut(&surface) else {
                            continue;
                        };
                        entry.contents = match (load, pass.draws) {
                            (_, draws) if draws > 0 => written,
                            (LoadOp::Clear(ClearValue::Color(c)), _) => SurfaceContents::Cleared(c),
                            (LoadOp::Clear(ClearValue::Depth(d)), _) => {
                                SurfaceContents::Cleared([d, 0.0, 0.0, 0.0])
                            }
                            (LoadOp::Load, _) => entry.contents,
                        };
                    }
                }
            }
            RecordedCommand::BeginComputePass { .. } => {
                storage_targets.clear();
                dispatches = 0;
            }
            RecordedCommand::BindStorageSurface { surface, .. } => storage_targets.push(*surface),
            RecordedCommand::Dispatch(_) => {
                state.clock += ticks_per_command * 3;
                dispatches += 1;
            }
            RecordedCommand::EndComputePass => {
                if dispatches > 0 {
                    for surface in storage_targets.drain(..) {
                        if let Some(entry) = state.surfaces.get_mut(&surface) {
                            entry.contents = written;
                        }
                    }
                }
            }
            _ => {}
        }
    }
}

fn surface_bytes(descriptor: &SurfaceDescriptor) -> u64 {
    let mut total = 0u64;
    for level in 0..descriptor.mip_levels.max(1) {
        let extent = descriptor.extent.mip(level);
        total += u64::from(extent.width)
            * u64::from(extent.height)
            * u64::from(descriptor.format.bytes_per_pixel());
    }
    total * u64::from(descriptor.sample_count.max(1))
}

impl GraphicsDevice for HeadlessDevice {
    fn create_surface(&self, descriptor: &SurfaceDescriptor) -> Result<SurfaceId, ResourceError> {
        if descriptor.extent.is_empty() {
            return Err(ResourceError::BackendError(format!(
                "surface '{}' has an empty extent",
                descriptor.label.as_deref().unwrap_or_default()
            )));
        }
        let id = SurfaceId(self.internal.next_surface_id.fetch_add(1, Ordering::Relaxed));
        let label = descriptor
            .label
            .as_deref()
            .map_or_else(|| format!("{id:?}"), str::to_owned);
        let size_bytes = surface_bytes(descriptor);
        let contents = if descriptor.initial_state == ResourceState::Undecided {
            SurfaceContents::Undefined
        } else {
            SurfaceContents::Cleared([0.0; 4])
        };

        self.track_allocation(size_bytes);
        self.state().surfaces.insert(
            id,
            SurfaceEntry {
                label,
                extent: descriptor.extent,
                format: descriptor.format,
                size_bytes,
                state: descriptor.initial_state,
                contents,
            },
        );
        log::trace!("HeadlessDevice: created surface {id:?} ({:?})", descriptor.extent);
        Ok(id)
    }

    fn destroy_surface(&self, id: SurfaceId) -> Result<(), ResourceError> {
        let mut state = self.state();
        let entry = state.surfaces.remove(&id).ok_or(ResourceError::NotFound)?;
        let in_use = state.pending.iter().any(|submission| {
            submission.commands.iter().any(|command| references_surface(command, id))
        });
        if in_use {
            state.validation_errors.push(format!(
                "surface '{}' destroyed while pending work uses it",
                entry.label
            ));
        }
        state.destroyed.push(format!("surface:{}", entry.label));
        drop(state);
        self.track_release(entry.size_bytes);
        Ok(())
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        let id = BufferId(self.internal.next_buffer_id.fetch_add(1, Ordering::Relaxed));
        let label = descriptor
            .label
            .as_deref()
            .map_or_else(|| format!("{id:?}"), str::to_owned);
        self.track_allocation(descriptor.size);
        self.state().buffers.insert(
            id,
            BufferEntry {
                label,
                bytes: vec![0; descriptor.size as usize],
            },
        );
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        let mut state = self.state();
        let entry = state.buffers.remove(&id).ok_or(ResourceError::NotFound)?;
        let in_use = state.pending.iter().any(|submission| {
            submission
                .commands
                .iter()
                .any(|command| command.buffer_reads().is_some_and(|slice| slice.buffer == id))
        });
        if in_use {
            state.validation_errors.push(format!(
                "buffer '{}' destroyed while pending work uses it",
                entry.label
            ));
        }
        state.destroyed.push(format!("buffer:{}", entry.label));
        drop(state);
        self.track_release(entry.bytes.len() as u64);
        Ok(())
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        let mut state = self.state();
        let end = offset + data.len() as u64;
        let written = cadence_core::renderer::BufferSlice {
            buffer: id,
            offset,
            size: data.len() as u64,
        };
        let hazard = state.pending.iter().find_map(|submission| {
            submission
                .commands
                .iter()
                .filter_map(RecordedCommand::buffer_reads)
                .any(|read| read.overlaps(&written))
                .then_some(submission.token)
        });

        let entry = state.buffers.get_mut(&id).ok_or(ResourceError::NotFound)?;
        let label = entry.label.clone();
        let target = entry
            .bytes
            .get_mut(offset as usize..end as usize)
            .ok_or(ResourceError::OutOfBounds)?;
        target.copy_from_slice(data);

        if let Some(token) = hazard {
            let message = format!(
                "write to '{label}' [{offset}..{end}) overlaps memory read by pending token {token}"
            );
            log::warn!("HeadlessDevice: {message}");
            state.hazards.push(message);
        }
        Ok(())
    }

    fn read_buffer(&self, id: BufferId, offset: u64, size: u64) -> Result<Vec<u8>, ResourceError> {
        let state = self.state();
        let entry = state.buffers.get(&id).ok_or(ResourceError::NotFound)?;
        entry
            .bytes
            .get(offset as usize..(offset + size) as usize)
            .map(<[u8]>::to_vec)
            .ok_or(ResourceError::OutOfBounds)
    }

    fn create_pipeline(&self, descriptor: &PipelineDescriptor) -> Result<PipelineId, ResourceError> {
        let needs_target = !descriptor.kind.is_compute();
        if needs_target && descriptor.color_formats.is_empty() && descriptor.depth_format.is_none() {
            return Err(ResourceError::BackendError(format!(
                "render pipeline '{}' has no targets",
                descriptor.label
            )));
        }
        let id = PipelineId(self.internal.next_pipeline_id.fetch_add(1, Ordering::Relaxed));
        self.state().pipelines.insert(
            id,
            PipelineEntry {
                label: descriptor.label.clone(),
                kind: descriptor.kind,
            },
        );
        log::trace!("HeadlessDevice: created pipeline '{}'", descriptor.label);
        Ok(id)
    }

    fn destroy_pipeline(&self, id: PipelineId) -> Result<(), ResourceError> {
        let mut state = self.state();
        let entry = state.pipelines.remove(&id).ok_or(ResourceError::NotFound)?;
        state.destroyed.push(format!("pipeline:{}", entry.label));
        Ok(())
    }

    fn create_timestamp_queries(&self, count: u32) -> Result<QuerySetId, ResourceError> {
        let id = QuerySetId(self.internal.next_query_set_id.fetch_add(1, Ordering::Relaxed));
        self.state().query_sets.insert(id, vec![0; count as usize]);
        Ok(id)
    }

    fn destroy_timestamp_queries(&self, id: QuerySetId) -> Result<(), ResourceError> {
        self.state()
            .query_sets
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::NotFound)
    }

    fn read_timestamps(&self, id: QuerySetId, count: u32) -> Result<Vec<u64>, ResourceError> {
        let state = self.state();
        let ticks = state.query_sets.get(&id).ok_or(ResourceError::NotFound)?;
        ticks
            .get(..count as usize)
            .map(<[u64]>::to_vec)
            .ok_or(ResourceError::OutOfBounds)
    }

    fn timestamp_period_ns(&self) -> f64 {
        self.internal.config.timestamp_period_ns
    }

    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder> {
        Box::new(HeadlessCommandEncoder {
            label: label.unwrap_or("Unnamed encoder").to_owned(),
            commands: Vec::new(),
            device: self.clone(),
        })
    }

    fn submit(&self, command_buffer: CommandBufferId) -> Result<CompletionToken, RenderError> {
        let mut state = self.state();
        let (label, commands) = state
            .finished
            .remove(&command_buffer)
            .ok_or(ResourceError::InvalidHandle)?;

        validate_states(&mut state, &label, &commands);

        state.last_submitted += 1;
        let token = state.last_submitted;
        state.submissions.push(SubmittedStream {
            token: CompletionToken(token),
            label: label.clone(),
            commands: commands.clone(),
        });
        state.pending.push_back(PendingSubmission {
            token,
            label,
            commands,
        });

        if !self.is_stalled() {
            while state.pending.len() > self.internal.config.latency {
                self.retire_one(&mut state);
            }
        }
        Ok(CompletionToken(token))
    }

    fn completed_token(&self) -> CompletionToken {
        CompletionToken(self.state().completed)
    }

    fn poll(&self) {
        if self.is_stalled() {
            return;
        }
        let mut state = self.state();
        self.retire_one(&mut state);
    }

    fn wait_idle(&self) -> Result<(), RenderError> {
        let mut state = self.state();
        if self.is_stalled() && !state.pending.is_empty() {
            return Err(RenderError::Internal(format!(
                "GPU timeline stalled with {} pending submissions",
                state.pending.len()
            )));
        }
        while self.retire_one(&mut state) {}
        Ok(())
    }

    fn adapter_name(&self) -> String {
        self.internal.config.adapter_name.clone()
    }
}

fn references_surface(command: &RecordedCommand, id: SurfaceId) -> bool {
    match command {
        RecordedCommand::Transition(barrier) => barrier.surface == id,
        RecordedCommand::BeginRenderPass { color, depth, .. } => {
            color.iter().any(|a| a.surface == id) || depth.is_some_and(|d| d.surface == id)
        }
        RecordedCommand::BindSurface { surface, .. }
        | RecordedCommand::BindStorageSurface { surface, .. } => *surface == id,
        RecordedCommand::Resolve {
            source,
            destination,
        } => *source == id || *destination == id,
        RecordedCommand::CopyBufferToSurface(copy) | RecordedCommand::CopySurfaceToBuffer(copy) => {
            copy.surface == id
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::renderer::{
        BufferCopy, BufferUsage, ColorAttachment, RenderPassDescriptor, SurfaceBarrier,
        SurfaceUsage,
    };
    use std::borrow::Cow;

    fn surface(device: &HeadlessDevice, initial_state: ResourceState) -> SurfaceId {
        device
            .create_surface(&SurfaceDescriptor {
                label: Some(Cow::Borrowed("Target")),
                extent: Extent2D::new(4, 2),
                format: TextureFormat::Rgba8Unorm,
                mip_levels: 1,
                sample_count: 1,
                usage: SurfaceUsage::RENDER_ATTACHMENT | SurfaceUsage::COPY_SRC,
                initial_state,
            })
            .unwrap()
    }

    fn buffer(device: &HeadlessDevice, size: u64) -> BufferId {
        device
            .create_buffer(&BufferDescriptor {
                label: Some(Cow::Borrowed("Buffer")),
                size,
                usage: BufferUsage::COPY_DST | BufferUsage::COPY_SRC | BufferUsage::UNIFORM,
            })
            .unwrap()
    }

    #[test]
    fn test_gpu_trails_by_configured_latency() {
        let device = HeadlessDevice::with_latency(2);
        let mut tokens = Vec::new();
        for _ in 0..3 {
            let encoder = device.create_command_encoder(Some("empty"));
            tokens.push(device.submit(encoder.finish()).unwrap());
        }
        assert_eq!(device.completed_token(), tokens[0]);
        device.poll();
        assert_eq!(device.completed_token(), tokens[1]);
        device.wait_idle().unwrap();
        assert_eq!(device.completed_token(), tokens[2]);
    }

    #[test]
    fn test_stalled_timeline_completes_nothing() {
        let device = HeadlessDevice::with_latency(0);
        device.set_stalled(true);
        let encoder = device.create_command_encoder(None);
        device.submit(encoder.finish()).unwrap();
        device.poll();
        assert_eq!(device.completed_token(), CompletionToken::ORIGIN);
        assert!(device.wait_idle().is_err());
    }

    #[test]
    fn test_mismatched_barrier_is_reported() {
        let device = HeadlessDevice::default();
        let target = surface(&device, ResourceState::Undecided);
        let mut encoder = device.create_command_encoder(Some("frame"));
        encoder.transition(SurfaceBarrier {
            surface: target,
            before: ResourceState::ShaderReadable,
            after: ResourceState::RenderTarget,
        });
        device.submit(encoder.finish()).unwrap();

        let errors = device.validation_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("expects shader-readable"));
        assert_eq!(device.surface_state(target), Some(ResourceState::RenderTarget));
    }

    #[test]
    fn test_attachment_outside_render_target_state_is_reported() {
        let device = HeadlessDevice::default();
        let target = surface(&device, ResourceState::ShaderReadable);
        let mut encoder = device.create_command_encoder(Some("frame"));
        {
            let attachments = [ColorAttachment::load(target)];
            let _pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: None,
                color_attachments: &attachments,
                depth_attachment: None,
            });
        }
        device.submit(encoder.finish()).unwrap();
        assert!(device.validation_errors()[0].contains("color attachment"));
    }

    #[test]
    fn test_write_into_pending_read_is_a_hazard() {
        let device = HeadlessDevice::with_latency(4);
        let source = buffer(&device, 256);
        let destination = buffer(&device, 256);
        let mut encoder = device.create_command_encoder(Some("copy"));
        encoder.copy_buffer_to_buffer(&BufferCopy {
            source,
            source_offset: 0,
            destination,
            destination_offset: 0,
            size: 64,
        });
        device.submit(encoder.finish()).unwrap();

        device.write_buffer(source, 128, &[1; 16]).unwrap();
        assert!(device.hazards().is_empty());
        device.write_buffer(source, 32, &[1; 16]).unwrap();
        assert_eq!(device.hazards().len(), 1);
    }

    #[test]
    fn test_copies_apply_when_work_completes() {
        let device = HeadlessDevice::with_latency(4);
        let source = buffer(&device, 16);
        let destination = buffer(&device, 16);
        device.write_buffer(source, 0, &[7; 16]).unwrap();
        let mut encoder = device.create_command_encoder(None);
        encoder.copy_buffer_to_buffer(&BufferCopy {
            source,
            source_offset: 0,
            destination,
            destination_offset: 0,
            size: 16,
        });
        device.submit(encoder.finish()).unwrap();
        assert_eq!(device.read_buffer(destination, 0, 4).unwrap(), vec![0; 4]);
        device.wait_idle().unwrap();
        assert_eq!(device.read_buffer(destination, 0, 4).unwrap(), vec![7; 4]);
    }

    #[test]
    fn test_read_back_encodes_writing_submission() {
        let device = HeadlessDevice::with_latency(0);
        let target = surface(&device, ResourceState::Undecided);
        let readback = buffer(&device, 256 * 2);
        let mut encoder = device.create_command_encoder(Some("frame"));
        encoder.transition(SurfaceBarrier {
            surface: target,
            before: ResourceState::Undecided,
            after: ResourceState::RenderTarget,
        });
        {
            let attachments = [ColorAttachment::load(target)];
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: None,
                color_attachments: &attachments,
                depth_attachment: None,
            });
            pass.draw(0..3, 0..1);
        }
        encoder.transition(SurfaceBarrier {
            surface: target,
            before: ResourceState::RenderTarget,
            after: ResourceState::TransferSrc,
        });
        encoder.copy_surface_to_buffer(&BufferSurfaceCopy {
            buffer: readback,
            buffer_offset: 0,
            bytes_per_row: 256,
            surface: target,
            mip_level: 0,
            extent: Extent2D::new(4, 2),
        });
        let token = device.submit(encoder.finish()).unwrap();

        assert!(device.validation_errors().is_empty());
        let row = device.read_buffer(readback, 256, 4).unwrap();
        assert_eq!(row, (token.0 as u32).to_le_bytes().to_vec());
    }

    #[test]
    fn test_destruction_is_logged_in_order() {
        let device = HeadlessDevice::default();
        let a = buffer(&device, 16);
        let target = surface(&device, ResourceState::Undecided);
        device.destroy_surface(target).unwrap();
        device.destroy_buffer(a).unwrap();
        assert_eq!(device.destroyed_log(), vec!["surface:Target", "buffer:Buffer"]);
        assert_eq!(device.live_resource_counts(), ResourceCounts::default());
        assert_eq!(device.allocated_bytes(), 0);
        assert!(matches!(device.destroy_buffer(a), Err(ResourceError::NotFound)));
    }
}
