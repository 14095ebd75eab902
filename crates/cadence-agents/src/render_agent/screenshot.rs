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

//! Screenshot capture: a copy of the final image recorded into the present
//! stream, read back once the frame completes and encoded on a worker
//! thread.

use cadence_core::renderer::api::common::{align_up, COPY_ROW_ALIGNMENT};
use cadence_core::renderer::{
    wait_for_token, BufferDescriptor, BufferId, BufferSurfaceCopy, BufferUsage, CapturedImage,
    CommandEncoder, CompletionToken, Extent2D, FenceWaitPolicy, GraphicsDevice, RenderError,
    ResourceState, ScreenshotSink, SurfaceId, TextureFormat,
};
use cadence_lanes::render_lane::Access;
use cadence_lanes::SurfaceStateTracker;
use crossbeam_channel::{unbounded, Sender};
use std::borrow::Cow;
use std::thread::JoinHandle;

/// Label of the transitions around the copy.
pub const SCREENSHOT_PASS: &str = "Screenshot";

/// Feeds captured images to a [`ScreenshotSink`] on its own thread.
#[derive(Debug)]
pub struct ScreenshotWorker {
    sender: Option<Sender<CapturedImage>>,
    handle: Option<JoinHandle<()>>,
}

impl ScreenshotWorker {
    /// Starts the encoder thread.
    pub fn spawn(mut sink: Box<dyn ScreenshotSink>) -> std::io::Result<Self> {
        let (sender, receiver) = unbounded::<CapturedImage>();
        let handle = std::thread::Builder::new()
            .name("screenshot-encoder".to_string())
            .spawn(move || {
                for image in receiver {
                    let frame_number = image.frame_number;
                    match sink.write(image) {
                        Ok(()) => log::info!("ScreenshotWorker: frame {frame_number} encoded"),
                        Err(err) => {
                            log::error!("ScreenshotWorker: frame {frame_number} failed: {err:#}")
                        }
                    }
                }
            })?;
        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    /// Queues an image. Returns `false` if the worker has stopped.
    pub fn submit(&self, image: CapturedImage) -> bool {
        self.sender
            .as_ref()
            .is_some_and(|sender| sender.send(image).is_ok())
    }

    /// Encodes what is queued, then stops the thread.
    pub fn shutdown(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("ScreenshotWorker: encoder thread panicked");
            }
        }
    }
}

impl Drop for ScreenshotWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A copy recorded this frame, waiting for its submission to complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingCapture {
    frame_number: u64,
    extent: Extent2D,
    format: TextureFormat,
    bytes_per_row: u32,
    buffer: BufferId,
    size: u64,
}

/// The readback buffer, the request flag and the worker.
#[derive(Debug, Default)]
pub(crate) struct ScreenshotCapture {
    requested: bool,
    readback: Option<(BufferId, u64)>,
    worker: Option<ScreenshotWorker>,
    captured: u64,
}

impl ScreenshotCapture {
    pub(crate) fn set_sink(&mut self, sink: Box<dyn ScreenshotSink>) -> Result<(), RenderError> {
        if let Some(mut previous) = self.worker.take() {
            previous.shutdown();
        }
        let worker = ScreenshotWorker::spawn(sink).map_err(|err| {
            RenderError::Internal(format!("failed to start the screenshot encoder: {err}"))
        })?;
        self.worker = Some(worker);
        Ok(())
    }

    /// Flags the next rendered frame. Returns `false` without a sink.
    pub(crate) fn request(&mut self) -> bool {
        if self.worker.is_none() {
            log::warn!("RenderAgent: screenshot requested without a sink, ignored");
            return false;
        }
        self.requested = true;
        true
    }

    pub(crate) fn is_requested(&self) -> bool {
        self.requested
    }

    pub(crate) fn captured(&self) -> u64 {
        self.captured
    }

    fn readback_buffer(
        &mut self,
        device: &dyn GraphicsDevice,
        size: u64,
    ) -> Result<BufferId, RenderError> {
        if let Some((buffer, capacity)) = self.readback {
            if capacity == size {
                return Ok(buffer);
            }
            self.release_readback(device);
        }
        let buffer = device.create_buffer(&BufferDescriptor {
            label: Some(Cow::Borrowed("Screenshot readback")),
            size,
            usage: BufferUsage::COPY_DST | BufferUsage::MAP_READ,
        })?;
        self.readback = Some((buffer, size));
        Ok(buffer)
    }

    /// Copies `surface`, which must be presentable, into the readback buffer
    /// and leaves it presentable again.
    pub(crate) fn record(
        &mut self,
        device: &dyn GraphicsDevice,
        encoder: &mut dyn CommandEncoder,
        tracker: &mut SurfaceStateTracker,
        surface: SurfaceId,
        extent: Extent2D,
        format: TextureFormat,
        frame_number: u64,
    ) -> Result<PendingCapture, RenderError> {
        let tight_row = u64::from(extent.width) * u64::from(format.bytes_per_pixel());
        let bytes_per_row = align_up(tight_row, u64::from(COPY_ROW_ALIGNMENT)) as u32;
        let size = u64::from(bytes_per_row) * u64::from(extent.height);
        let buffer = self.readback_buffer(device, size)?;

        tracker.expect(surface, ResourceState::Present)?;
        tracker.require(encoder, surface, ResourceState::TransferSrc, Access::Read, SCREENSHOT_PASS)?;
        encoder.copy_surface_to_buffer(&BufferSurfaceCopy {
            buffer,
            buffer_offset: 0,
            bytes_per_row,
            surface,
            mip_level: 0,
            extent,
        });
        tracker.require(encoder, surface, ResourceState::Present, Access::Read, SCREENSHOT_PASS)?;
        Ok(PendingCapture {
            frame_number,
            extent,
            format,
            bytes_per_row,
            buffer,
            size,
        })
    }

    /// Reads the copy back once `token` completes and hands it to the
    /// worker. Clears the request.
    pub(crate) fn complete(
        &mut self,
        device: &dyn GraphicsDevice,
        capture: PendingCapture,
        token: CompletionToken,
        policy: &FenceWaitPolicy,
    ) -> Result<(), RenderError> {
        self.requested = false;
        wait_for_token(device, token, policy)?;
        let pixels = device.read_buffer(capture.buffer, 0, capture.size)?;
        let image = CapturedImage {
            frame_number: capture.frame_number,
            extent: capture.extent,
            format: capture.format,
            bytes_per_row: capture.bytes_per_row,
            pixels,
        };
        let queued = self.worker.as_ref().is_some_and(|worker| worker.submit(image));
        if queued {
            self.captured += 1;
            log::info!(
                "RenderAgent: captured frame {} ({}x{})",
                capture.frame_number,
                capture.extent.width,
                capture.extent.height
            );
        } else {
            log::warn!(
                "RenderAgent: screenshot of frame {} dropped, encoder stopped",
                capture.frame_number
            );
        }
        Ok(())
    }

    fn release_readback(&mut self, device: &dyn GraphicsDevice) {
        if let Some((buffer, _)) = self.readback.take() {
            if let Err(e) = device.destroy_buffer(buffer) {
                log::warn!("RenderAgent: Failed to destroy screenshot buffer {buffer:?}: {e}");
            }
        }
    }

    /// Stops the worker and frees the readback buffer. The GPU must be idle.
    pub(crate) fn shutdown(&mut self, device: &dyn GraphicsDevice) {
        if let Some(mut worker) = self.worker.take() {
            worker.shutdown();
        }
        self.release_readback(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_infra::MemoryScreenshotSink;

    #[test]
    fn test_worker_drains_queue_on_shutdown() {
        let sink = MemoryScreenshotSink::new();
        let mut worker = ScreenshotWorker::spawn(Box::new(sink.clone())).unwrap();
        for frame_number in 0..3 {
            assert!(worker.submit(CapturedImage {
                frame_number,
                extent: Extent2D::new(1, 1),
                format: TextureFormat::Rgba8Unorm,
                bytes_per_row: 256,
                pixels: vec![0; 256],
            }));
        }
        worker.shutdown();
        assert_eq!(sink.images().len(), 3);
        assert!(!worker.submit(CapturedImage {
            frame_number: 9,
            extent: Extent2D::new(1, 1),
            format: TextureFormat::Rgba8Unorm,
            bytes_per_row: 256,
            pixels: vec![0; 256],
        }));
    }

    #[test]
    fn test_request_without_sink_is_ignored() {
        let mut capture = ScreenshotCapture::default();
        assert!(!capture.request());
        assert!(!capture.is_requested());
    }
}
