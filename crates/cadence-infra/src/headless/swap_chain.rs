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

use super::device::{HeadlessDevice, PresentRecord};
use cadence_core::renderer::{
    CompletionToken, DisplayMode, Extent2D, GraphicsDevice, RenderError, ResourceState,
    SurfaceDescriptor, SurfaceId, SurfaceUsage, SwapChain, SwapImage, TextureFormat,
};
use std::borrow::Cow;
use std::time::Duration;

/// Swap images living on a [`HeadlessDevice`].
///
/// Images are handed out round-robin. Presenting records the image and the
/// token it waits for on the device, where tests can inspect it.
#[derive(Debug)]
pub struct HeadlessSwapChain {
    device: HeadlessDevice,
    images: Vec<SurfaceId>,
    image_count: usize,
    extent: Extent2D,
    mode: DisplayMode,
    next: usize,
    acquired: Option<usize>,
}

impl HeadlessSwapChain {
    pub fn new(
        device: HeadlessDevice,
        extent: Extent2D,
        image_count: usize,
        mode: DisplayMode,
    ) -> Result<Self, RenderError> {
        let mut swap_chain = Self {
            device,
            images: Vec::new(),
            image_count: image_count.max(2),
            extent,
            mode,
            next: 0,
            acquired: None,
        };
        swap_chain.create_images()?;
        Ok(swap_chain)
    }

    fn create_images(&mut self) -> Result<(), RenderError> {
        for index in 0..self.image_count {
            let surface = self.device.create_surface(&SurfaceDescriptor {
                label: Some(Cow::Owned(format!("Swap image {index}"))),
                extent: self.extent,
                format: self.mode.swap_format(),
                mip_levels: 1,
                sample_count: 1,
                usage: SurfaceUsage::RENDER_ATTACHMENT | SurfaceUsage::COPY_SRC | SurfaceUsage::PRESENT,
                initial_state: ResourceState::Undecided,
            })?;
            self.images.push(surface);
        }
        log::debug!(
            "HeadlessSwapChain: {} images at {}x{} ({:?})",
            self.image_count,
            self.extent.width,
            self.extent.height,
            self.mode
        );
        Ok(())
    }

    fn destroy_images(&mut self) -> Result<(), RenderError> {
        for surface in self.images.drain(..) {
            self.device.destroy_surface(surface)?;
        }
        self.next = 0;
        self.acquired = None;
        Ok(())
    }

    /// The current swap surfaces.
    pub fn images(&self) -> &[SurfaceId] {
        &self.images
    }
}

impl SwapChain for HeadlessSwapChain {
    fn acquire_next(&mut self, _timeout: Duration) -> Result<SwapImage, RenderError> {
        if let Some(index) = self.acquired {
            return Err(RenderError::SurfaceAcquisitionFailed(format!(
                "swap image {index} is still acquired"
            )));
        }
        let index = self.next;
        let surface = *self
            .images
            .get(index)
            .ok_or_else(|| RenderError::SurfaceAcquisitionFailed("no swap images".to_string()))?;
        self.next = (index + 1) % self.images.len();
        self.acquired = Some(index);
        Ok(SwapImage { index, surface })
    }

    fn present(&mut self, image: SwapImage, after: CompletionToken) -> Result<(), RenderError> {
        if self.acquired != Some(image.index) {
            return Err(RenderError::Internal(format!(
                "swap image {} presented without being acquired",
                image.index
            )));
        }
        self.acquired = None;
        self.device.record_present(PresentRecord {
            image: image.index,
            surface: image.surface,
            after,
        })
    }

    fn display_mode(&self) -> DisplayMode {
        self.mode
    }

    fn set_display_mode(&mut self, mode: DisplayMode) -> Result<(), RenderError> {
        if mode == self.mode {
            return Ok(());
        }
        self.destroy_images()?;
        self.mode = mode;
        self.create_images()
    }

    fn format(&self) -> TextureFormat {
        self.mode.swap_format()
    }

    fn extent(&self) -> Extent2D {
        self.extent
    }

    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn resize(&mut self, extent: Extent2D) -> Result<(), RenderError> {
        if extent == self.extent {
            return Ok(());
        }
        self.destroy_images()?;
        self.extent = extent;
        self.create_images()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_images_rotate_and_follow_display_mode() {
        let device = HeadlessDevice::default();
        let mut swap = HeadlessSwapChain::new(device.clone(), Extent2D::new(8, 8), 3, DisplayMode::Sdr).unwrap();
        let first = swap.acquire_next(Duration::from_millis(1)).unwrap();
        assert!(swap.acquire_next(Duration::from_millis(1)).is_err());
        swap.present(first, CompletionToken::ORIGIN).unwrap();
        let second = swap.acquire_next(Duration::from_millis(1)).unwrap();
        assert_eq!(second.index, 1);

        swap.present(second, CompletionToken::ORIGIN).unwrap();
        swap.set_display_mode(DisplayMode::Hdr10Pq).unwrap();
        assert_eq!(swap.format(), TextureFormat::Rgb10a2Unorm);
        assert_eq!(device.live_resource_counts().surfaces, 3);
        // Undecided swap images were never transitioned to present.
        assert_eq!(device.validation_errors().len(), 2);
    }
}
