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

//! One-shot linear allocator for copying asset bytes into GPU-resident memory.
//!
//! Bytes are written into a CPU-visible scratch buffer at a monotonically
//! growing offset, and a copy into the destination is appended to the
//! uploader's own command stream. [`StagingUploader::flush_and_wait`] submits
//! that stream, blocks until the GPU has executed it and rewinds the scratch.
//! Scratch memory is never reused before such a flush.

use crate::config::RendererConfig;
use crate::renderer::{
    api::{
        command::{BufferCopy, BufferSurfaceCopy, SurfaceBarrier},
        common::{align_up, Extent2D, TextureFormat, COPY_ROW_ALIGNMENT, SURFACE_COPY_ALIGNMENT},
        resource::{BufferDescriptor, BufferId, BufferUsage, ResourceState, SurfaceId},
        sync::{wait_for_token, FenceWaitPolicy},
    },
    error::{RenderError, ResourceError, StateError},
    traits::{CommandEncoder, GraphicsDevice},
};
use std::borrow::Cow;
use std::fmt;

const BUFFER_COPY_ALIGNMENT: u64 = 16;

/// Stages CPU data and copies it into GPU resources in batches.
pub struct StagingUploader {
    scratch: Option<BufferId>,
    capacity: u64,
    offset: u64,
    encoder: Option<Box<dyn CommandEncoder>>,
    pending_copies: usize,
    wait_policy: FenceWaitPolicy,
    flushes: u64,
    bytes_flushed: u64,
}

impl fmt::Debug for StagingUploader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagingUploader")
            .field("scratch", &self.scratch)
            .field("capacity", &self.capacity)
            .field("offset", &self.offset)
            .field("recording", &self.encoder.is_some())
            .field("pending_copies", &self.pending_copies)
            .field("flushes", &self.flushes)
            .finish()
    }
}

impl StagingUploader {
    /// Creates an uploader. The scratch buffer is created on first use.
    pub fn new(config: &RendererConfig) -> Self {
        Self {
            scratch: None,
            capacity: config.upload_heap_bytes,
            offset: 0,
            encoder: None,
            pending_copies: 0,
            wait_policy: FenceWaitPolicy::from_config(config),
            flushes: 0,
            bytes_flushed: 0,
        }
    }

    /// Size of the scratch buffer.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Scratch bytes used since the last flush.
    pub fn used(&self) -> u64 {
        self.offset
    }

    /// Copies recorded but not yet flushed.
    pub fn pending_copies(&self) -> usize {
        self.pending_copies
    }

    /// Number of completed flushes.
    pub fn flush_count(&self) -> u64 {
        self.flushes
    }

    /// Whether the scratch buffer currently exists.
    pub fn has_scratch(&self) -> bool {
        self.scratch.is_some()
    }

    fn reserve(
        &mut self,
        device: &dyn GraphicsDevice,
        size: u64,
        alignment: u64,
    ) -> Result<(BufferId, u64), ResourceError> {
        let offset = align_up(self.offset, alignment);
        let end = offset + size;
        if end > self.capacity {
            return Err(ResourceError::CapacityExceeded {
                resource: "upload heap",
                requested: end,
                capacity: self.capacity,
            });
        }

        let scratch = match self.scratch {
            Some(buffer) => buffer,
            None => {
                let buffer = device.create_buffer(&BufferDescriptor {
                    label: Some(Cow::Borrowed("Upload heap")),
                    size: self.capacity,
                    usage: BufferUsage::MAP_WRITE | BufferUsage::COPY_SRC,
                })?;
                self.scratch = Some(buffer);
                buffer
            }
        };

        self.offset = end;
        Ok((scratch, offset))
    }

    fn encoder(&mut self, device: &dyn GraphicsDevice) -> &mut dyn CommandEncoder {
        self.encoder
            .get_or_insert_with(|| device.create_command_encoder(Some("Upload heap")))
            .as_mut()
    }

    /// Stages `bytes` for a copy into `destination` at `destination_offset`.
    pub fn stage_buffer(
        &mut self,
        device: &dyn GraphicsDevice,
        bytes: &[u8],
        destination: BufferId,
        destination_offset: u64,
    ) -> Result<(), ResourceError> {
        if bytes.is_empty() {
            return Ok(());
        }
        let size = bytes.len() as u64;
        let (scratch, offset) = self.reserve(device, size, BUFFER_COPY_ALIGNMENT)?;
        device.write_buffer(scratch, offset, bytes)?;
        self.encoder(device).copy_buffer_to_buffer(&BufferCopy {
            source: scratch,
            source_offset: offset,
            destination,
            destination_offset,
            size,
        });
        self.pending_copies += 1;
        Ok(())
    }

    /// Stages every mip level of a freshly created surface.
    ///
    /// The surface goes from `Undecided` to `TransferDst` for the copies and
    /// ends in `ShaderReadable`. Rows are padded to the copy row alignment.
    pub fn stage_surface(
        &mut self,
        device: &dyn GraphicsDevice,
        destination: SurfaceId,
        format: TextureFormat,
        extent: Extent2D,
        mips: &[Vec<u8>],
    ) -> Result<(), ResourceError> {
        let bytes_per_pixel = format.bytes_per_pixel();
        let mut placements = Vec::with_capacity(mips.len());

        for (level, pixels) in mips.iter().enumerate() {
            let mip_extent = extent.mip(level as u32);
            let tight_row = mip_extent.width * bytes_per_pixel;
            let expected = u64::from(tight_row) * u64::from(mip_extent.height);
            if pixels.len() as u64 != expected {
                log::warn!(
                    "StagingUploader: mip {} of {:?} has {} bytes, expected {}",
                    level,
                    destination,
                    pixels.len(),
                    expected
                );
                return Err(ResourceError::OutOfBounds);
            }

            let pitch = align_up(u64::from(tight_row), u64::from(COPY_ROW_ALIGNMENT)) as u32;
            let size = u64::from(pitch) * u64::from(mip_extent.height);
            let (scratch, offset) = self.reserve(device, size, SURFACE_COPY_ALIGNMENT)?;

            if pitch == tight_row {
                device.write_buffer(scratch, offset, pixels)?;
            } else {
                let mut padded = vec![0u8; size as usize];
                for (row, src) in pixels.chunks_exact(tight_row as usize).enumerate() {
                    let start = row * pitch as usize;
                    padded[start..start + src.len()].copy_from_slice(src);
                }
                device.write_buffer(scratch, offset, &padded)?;
            }

            placements.push(BufferSurfaceCopy {
                buffer: scratch,
                buffer_offset: offset,
                bytes_per_row: pitch,
                surface: destination,
                mip_level: level as u32,
                extent: mip_extent,
            });
        }

        let encoder = self.encoder(device);
        encoder.transition(SurfaceBarrier {
            surface: destination,
            before: ResourceState::Undecided,
            after: ResourceState::TransferDst,
        });
        for copy in &placements {
            encoder.copy_buffer_to_surface(copy);
        }
        encoder.transition(SurfaceBarrier {
            surface: destination,
            before: ResourceState::TransferDst,
            after: ResourceState::ShaderReadable,
        });
        self.pending_copies += placements.len();
        Ok(())
    }

    /// Submits every staged copy, blocks until the GPU executed them and
    /// rewinds the scratch. Does nothing when nothing was staged.
    pub fn flush_and_wait(&mut self, device: &dyn GraphicsDevice) -> Result<(), RenderError> {
        let Some(encoder) = self.encoder.take() else {
            return Ok(());
        };

        let token = device.submit(encoder.finish())?;
        let waited = wait_for_token(device, token, &self.wait_policy)?;
        log::debug!(
            "StagingUploader: flushed {} copies ({} bytes) in {:.3} ms",
            self.pending_copies,
            self.offset,
            waited.as_secs_f64() * 1000.0
        );

        self.flushes += 1;
        self.bytes_flushed += self.offset;
        self.offset = 0;
        self.pending_copies = 0;
        Ok(())
    }

    /// Drops every staged copy without submitting it.
    pub fn discard(&mut self) {
        if self.pending_copies > 0 {
            log::warn!(
                "StagingUploader: discarding {} unflushed copies",
                self.pending_copies
            );
        }
        self.encoder = None;
        self.offset = 0;
        self.pending_copies = 0;
    }

    /// Frees the scratch buffer. It is recreated on the next stage call.
    ///
    /// # Errors
    ///
    /// [`StateError::PendingUploads`] if copies are still waiting for a flush.
    pub fn release_scratch(&mut self, device: &dyn GraphicsDevice) -> Result<(), RenderError> {
        if self.pending_copies > 0 {
            return Err(StateError::PendingUploads {
                copies: self.pending_copies,
            }
            .into());
        }
        if let Some(scratch) = self.scratch.take() {
            device.destroy_buffer(scratch)?;
            log::debug!(
                "StagingUploader: released upload heap after {} bytes in {} flushes",
                self.bytes_flushed,
                self.flushes
            );
        }
        Ok(())
    }

    /// Discards pending work and frees the scratch buffer.
    pub fn destroy(mut self, device: &dyn GraphicsDevice) -> Result<(), RenderError> {
        self.discard();
        self.release_scratch(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::mock::{MockCommand, MockGraphicsDevice};
    use crate::renderer::api::resource::SurfaceDescriptor;
    use crate::renderer::api::resource::SurfaceUsage;

    fn uploader(capacity: u64) -> StagingUploader {
        StagingUploader::new(&RendererConfig {
            upload_heap_bytes: capacity,
            fence_timeout_ms: 50,
            fence_poll_interval_us: 10,
            ..RendererConfig::default()
        })
    }

    fn vertex_buffer(device: &MockGraphicsDevice, size: u64) -> BufferId {
        device
            .create_buffer(&BufferDescriptor {
                label: None,
                size,
                usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
            })
            .unwrap()
    }

    #[test]
    fn test_staged_bytes_reach_destination_after_flush() {
        let device = MockGraphicsDevice::with_latency(8);
        let mut uploader = uploader(4096);
        let destination = vertex_buffer(&device, 8);

        uploader
            .stage_buffer(&device, &[1, 2, 3, 4, 5, 6, 7, 8], destination, 0)
            .unwrap();
        assert_eq!(uploader.pending_copies(), 1);
        assert_eq!(device.buffer_contents(destination), vec![0; 8]);

        uploader.flush_and_wait(&device).unwrap();
        assert_eq!(device.buffer_contents(destination), vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(uploader.used(), 0, "flush must rewind the scratch");
        assert_eq!(uploader.pending_copies(), 0);
        assert_eq!(device.pending_count(), 0);
    }

    #[test]
    fn test_scratch_overflow_is_a_capacity_error() {
        let device = MockGraphicsDevice::new();
        let mut uploader = uploader(32);
        let destination = vertex_buffer(&device, 64);

        uploader.stage_buffer(&device, &[0; 24], destination, 0).unwrap();
        let err = uploader
            .stage_buffer(&device, &[0; 24], destination, 24)
            .unwrap_err();
        assert!(matches!(
            err,
            ResourceError::CapacityExceeded {
                resource: "upload heap",
                requested: 56,
                capacity: 32
            }
        ));
    }

    #[test]
    fn test_flush_without_staged_work_is_a_no_op() {
        let device = MockGraphicsDevice::new();
        let mut uploader = uploader(64);
        uploader.flush_and_wait(&device).unwrap();
        assert_eq!(uploader.flush_count(), 0);
        assert!(!uploader.has_scratch());
    }

    #[test]
    fn test_releasing_scratch_with_pending_copies_fails() {
        let device = MockGraphicsDevice::new();
        let mut uploader = uploader(64);
        let destination = vertex_buffer(&device, 8);
        uploader.stage_buffer(&device, &[9; 8], destination, 0).unwrap();

        let err = uploader.release_scratch(&device).unwrap_err();
        assert!(matches!(
            err,
            RenderError::State(StateError::PendingUploads { copies: 1 })
        ));

        uploader.flush_and_wait(&device).unwrap();
        uploader.release_scratch(&device).unwrap();
        assert!(!uploader.has_scratch());
        assert_eq!(device.live_buffers(), 1, "only the destination remains");
    }

    #[test]
    fn test_surface_upload_pads_rows_and_transitions() {
        let device = MockGraphicsDevice::new();
        let mut uploader = uploader(1 << 20);
        let extent = Extent2D::new(4, 2);
        let surface = device
            .create_surface(&SurfaceDescriptor {
                label: None,
                extent,
                format: TextureFormat::Rgba8Unorm,
                mip_levels: 2,
                sample_count: 1,
                usage: SurfaceUsage::SAMPLED | SurfaceUsage::COPY_DST,
                initial_state: ResourceState::Undecided,
            })
            .unwrap();

        let mips = vec![vec![255u8; 4 * 2 * 4], vec![128u8; 2 * 4]];
        uploader
            .stage_surface(&device, surface, TextureFormat::Rgba8Unorm, extent, &mips)
            .unwrap();
        uploader.flush_and_wait(&device).unwrap();

        let streams = device.submitted_streams.lock().unwrap();
        let commands = &streams[0];
        assert_eq!(
            commands.first(),
            Some(&MockCommand::Transition(SurfaceBarrier {
                surface,
                before: ResourceState::Undecided,
                after: ResourceState::TransferDst,
            }))
        );
        assert_eq!(
            commands.last(),
            Some(&MockCommand::Transition(SurfaceBarrier {
                surface,
                before: ResourceState::TransferDst,
                after: ResourceState::ShaderReadable,
            }))
        );
        let copies: Vec<_> = commands
            .iter()
            .filter_map(|c| match c {
                MockCommand::CopyToSurface(copy) => Some(*copy),
                _ => None,
            })
            .collect();
        assert_eq!(copies.len(), 2);
        assert_eq!(copies[0].bytes_per_row, COPY_ROW_ALIGNMENT);
        assert_eq!(copies[1].extent, Extent2D::new(2, 1));
        assert_eq!(copies[1].buffer_offset % SURFACE_COPY_ALIGNMENT, 0);
    }

    #[test]
    fn test_surface_upload_rejects_wrong_sizes() {
        let device = MockGraphicsDevice::new();
        let mut uploader = uploader(1 << 20);
        let err = uploader
            .stage_surface(
                &device,
                SurfaceId(99),
                TextureFormat::Rgba8Unorm,
                Extent2D::new(4, 4),
                &[vec![0; 3]],
            )
            .unwrap_err();
        assert!(matches!(err, ResourceError::OutOfBounds));
        assert_eq!(uploader.pending_copies(), 0);
    }
}
