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

//! Revolving pool of per-frame transient GPU resources.
//!
//! The [`TransientResourceRing`] owns [`MAX_FRAMES_IN_FLIGHT`] frame slots. Each
//! slot carries everything a frame records into and that the GPU consumes
//! asynchronously: a sub-allocated uniform arena, a budget of command streams
//! and a set of timestamp queries, guarded by the completion token of the last
//! submission that used them.
//!
//! # Architecture
//!
//! ```text
//! Frame N:     [Slot 0: GPU executing]
//! Frame N+1:   [Slot 1: GPU executing]  [Slot 0: still in flight]
//! Frame N+2:   [Slot 2: CPU recording]
//! Frame N+3:   [Slot 0: CPU waits on its token, rewinds, records again]
//! ```
//!
//! A slot is only handed out again once the GPU has reached the token of the
//! frame that previously owned it, so the CPU never overwrites data the GPU
//! still reads.

use crate::config::RendererConfig;
use crate::renderer::{
    api::{
        common::{align_up, MAX_FRAMES_IN_FLIGHT, MIN_UNIFORM_ALIGNMENT},
        resource::{BufferDescriptor, BufferId, BufferSlice, BufferUsage, QuerySetId},
        sync::{wait_for_token, CompletionToken, FenceWaitPolicy},
    },
    error::{RenderError, ResourceError, StateError},
    traits::{CommandEncoder, GraphicsDevice},
};
use bytemuck::Pod;
use std::borrow::Cow;

/// Timestamps of a completed frame, read back when its slot came around again.
#[derive(Debug, Clone, PartialEq)]
pub struct RetiredTimestamps {
    /// The frame that wrote the timestamps.
    pub frame_number: u64,
    /// One label per timestamp, in recording order.
    pub labels: Vec<&'static str>,
    /// Raw GPU ticks, parallel to `labels`.
    pub ticks: Vec<u64>,
    /// Nanoseconds per tick.
    pub period_ns: f64,
}

#[derive(Debug)]
struct TimestampQueries {
    set: QuerySetId,
    capacity: u32,
    labels: Vec<&'static str>,
}

/// One slot of the ring: the transient resources of a single frame in flight.
#[derive(Debug)]
pub struct FrameSlot {
    index: usize,
    uniform_buffer: BufferId,
    uniform_capacity: u64,
    uniform_offset: u64,
    high_water: u64,
    queries: TimestampQueries,
    streams_begun: u32,
    streams_capacity: u32,
    fence: Option<CompletionToken>,
    recording: bool,
    frame_number: u64,
    retired: Option<RetiredTimestamps>,
}

impl FrameSlot {
    /// Position of the slot inside the ring.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The frame currently (or last) owning the slot, starting at 1.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// The token of the last submission made from this slot.
    pub fn fence(&self) -> Option<CompletionToken> {
        self.fence
    }

    /// The buffer backing the uniform arena.
    pub fn uniform_buffer(&self) -> BufferId {
        self.uniform_buffer
    }

    /// Bytes allocated from the arena since the last reset.
    pub fn uniform_bytes_used(&self) -> u64 {
        self.uniform_offset
    }

    /// The largest arena usage observed across all frames.
    pub fn high_water_mark(&self) -> u64 {
        self.high_water
    }

    /// Rewinds the arena, the stream budget and the timestamp labels.
    pub fn reset(&mut self) {
        self.high_water = self.high_water.max(self.uniform_offset);
        self.uniform_offset = 0;
        self.streams_begun = 0;
        self.queries.labels.clear();
    }

    /// Reserves an aligned range of the uniform arena.
    pub fn allocate_uniform(&mut self, size: u64) -> Result<BufferSlice, ResourceError> {
        let offset = align_up(self.uniform_offset, MIN_UNIFORM_ALIGNMENT);
        let end = offset + size;
        if end > self.uniform_capacity {
            return Err(ResourceError::CapacityExceeded {
                resource: "uniform arena",
                requested: end,
                capacity: self.uniform_capacity,
            });
        }
        self.uniform_offset = end;
        Ok(BufferSlice {
            buffer: self.uniform_buffer,
            offset,
            size,
        })
    }

    /// Allocates room for `value` in the arena and writes it.
    pub fn write_uniform<T: Pod>(
        &mut self,
        device: &dyn GraphicsDevice,
        value: &T,
    ) -> Result<BufferSlice, ResourceError> {
        self.write_uniform_bytes(device, bytemuck::bytes_of(value))
    }

    /// Allocates room for `values` in the arena and writes them contiguously.
    pub fn write_uniform_slice<T: Pod>(
        &mut self,
        device: &dyn GraphicsDevice,
        values: &[T],
    ) -> Result<BufferSlice, ResourceError> {
        self.write_uniform_bytes(device, bytemuck::cast_slice(values))
    }

    fn write_uniform_bytes(
        &mut self,
        device: &dyn GraphicsDevice,
        bytes: &[u8],
    ) -> Result<BufferSlice, ResourceError> {
        let slice = self.allocate_uniform(bytes.len() as u64)?;
        device.write_buffer(slice.buffer, slice.offset, bytes)?;
        Ok(slice)
    }

    /// Opens one of the slot's command streams.
    pub fn begin_stream(
        &mut self,
        device: &dyn GraphicsDevice,
        label: &str,
    ) -> Result<Box<dyn CommandEncoder>, ResourceError> {
        if self.streams_begun >= self.streams_capacity {
            return Err(ResourceError::CapacityExceeded {
                resource: "command streams per slot",
                requested: u64::from(self.streams_begun) + 1,
                capacity: u64::from(self.streams_capacity),
            });
        }
        self.streams_begun += 1;
        let label = format!("{label} [slot {}]", self.index);
        Ok(device.create_command_encoder(Some(&label)))
    }

    /// Records a labelled timestamp. Returns `false` once the query set is
    /// exhausted; the timestamp is then dropped.
    pub fn write_timestamp(&mut self, encoder: &mut dyn CommandEncoder, label: &'static str) -> bool {
        let index = self.queries.labels.len() as u32;
        if index >= self.queries.capacity {
            log::trace!(
                "FrameSlot {}: timestamp '{}' dropped, query set full",
                self.index,
                label
            );
            return false;
        }
        encoder.write_timestamp(self.queries.set, index);
        self.queries.labels.push(label);
        true
    }

    /// Takes the timestamps of the frame that used this slot before the
    /// current one, if they were read back.
    pub fn take_retired_timestamps(&mut self) -> Option<RetiredTimestamps> {
        self.retired.take()
    }

    /// Records the token of the slot's final submission for this frame.
    pub fn mark_submitted(&mut self, token: CompletionToken) {
        self.fence = Some(token);
        self.recording = false;
    }

    /// Whether the slot was acquired and not yet submitted.
    pub fn is_recording(&self) -> bool {
        self.recording
    }
}

/// A round-robin pool of [`FrameSlot`]s.
#[derive(Debug)]
pub struct TransientResourceRing {
    slots: Vec<FrameSlot>,
    next: usize,
    wait_policy: FenceWaitPolicy,
    frames_acquired: u64,
}

impl TransientResourceRing {
    /// Creates the ring and all of its GPU resources.
    ///
    /// # Errors
    ///
    /// Returns a [`ResourceError`] if buffer or query creation fails. Any
    /// resource created before the failure is released.
    pub fn new(device: &dyn GraphicsDevice, config: &RendererConfig) -> Result<Self, ResourceError> {
        let mut ring = Self {
            slots: Vec::with_capacity(MAX_FRAMES_IN_FLIGHT),
            next: 0,
            wait_policy: FenceWaitPolicy::from_config(config),
            frames_acquired: 0,
        };

        for index in 0..MAX_FRAMES_IN_FLIGHT {
            match Self::create_slot(device, config, index) {
                Ok(slot) => ring.slots.push(slot),
                Err(err) => {
                    if let Err(cleanup) = ring.destroy(device) {
                        log::warn!("TransientResourceRing: cleanup after failure failed: {cleanup}");
                    }
                    return Err(err);
                }
            }
        }

        log::debug!(
            "TransientResourceRing: {} slots, {} KiB uniform arena each",
            MAX_FRAMES_IN_FLIGHT,
            config.uniform_arena_bytes / 1024
        );
        Ok(ring)
    }

    fn create_slot(
        device: &dyn GraphicsDevice,
        config: &RendererConfig,
        index: usize,
    ) -> Result<FrameSlot, ResourceError> {
        let uniform_buffer = device.create_buffer(&BufferDescriptor {
            label: Some(Cow::Owned(format!("Uniform arena [slot {index}]"))),
            size: config.uniform_arena_bytes,
            usage: BufferUsage::UNIFORM | BufferUsage::STORAGE | BufferUsage::COPY_DST,
        })?;
        let set = match device.create_timestamp_queries(config.timestamps_per_frame) {
            Ok(set) => set,
            Err(err) => {
                device.destroy_buffer(uniform_buffer)?;
                return Err(err);
            }
        };

        Ok(FrameSlot {
            index,
            uniform_buffer,
            uniform_capacity: config.uniform_arena_bytes,
            uniform_offset: 0,
            high_water: 0,
            queries: TimestampQueries {
                set,
                capacity: config.timestamps_per_frame,
                labels: Vec::new(),
            },
            streams_begun: 0,
            streams_capacity: config.streams_per_slot,
            fence: None,
            recording: false,
            frame_number: 0,
            retired: None,
        })
    }

    /// Hands out the next slot, blocking until the GPU has finished the frame
    /// that previously owned it.
    ///
    /// The slot comes back rewound. Timestamps of its previous frame are read
    /// back and can be taken with [`FrameSlot::take_retired_timestamps`].
    ///
    /// # Errors
    ///
    /// - [`RenderError::FenceTimeout`] if the previous frame never completes.
    /// - [`StateError::SlotStillRecording`] if the slot was never submitted.
    pub fn acquire(&mut self, device: &dyn GraphicsDevice) -> Result<&mut FrameSlot, RenderError> {
        let index = self.next;
        let slot_count = self.slots.len();
        let policy = self.wait_policy;
        let slot = &mut self.slots[index];

        if slot.recording {
            return Err(StateError::SlotStillRecording { slot: index }.into());
        }

        // Cleared only once reached; a timed-out acquire must wait again.
        if let Some(token) = slot.fence {
            let waited = wait_for_token(device, token, &policy)?;
            slot.fence = None;
            if waited > policy.poll_interval {
                log::debug!(
                    "TransientResourceRing: slot {} waited {:.3} ms for token {}",
                    index,
                    waited.as_secs_f64() * 1000.0,
                    token.0
                );
            }
        }

        if !slot.queries.labels.is_empty() {
            let count = slot.queries.labels.len() as u32;
            let ticks = device.read_timestamps(slot.queries.set, count)?;
            slot.retired = Some(RetiredTimestamps {
                frame_number: slot.frame_number,
                labels: slot.queries.labels.clone(),
                ticks,
                period_ns: device.timestamp_period_ns(),
            });
        }

        slot.reset();
        slot.recording = true;
        self.frames_acquired += 1;
        slot.frame_number = self.frames_acquired;
        self.next = (index + 1) % slot_count;
        Ok(slot)
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the ring has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Total number of acquisitions so far.
    pub fn frames_acquired(&self) -> u64 {
        self.frames_acquired
    }

    /// Read-only access to a slot.
    pub fn slot(&self, index: usize) -> Option<&FrameSlot> {
        self.slots.get(index)
    }

    /// Releases every slot resource. The caller guarantees the GPU is idle.
    pub fn destroy(&mut self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        let mut first_error = None;
        for slot in self.slots.drain(..) {
            if let Err(err) = device.destroy_buffer(slot.uniform_buffer) {
                first_error.get_or_insert(err);
            }
            if let Err(err) = device.destroy_timestamp_queries(slot.queries.set) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
