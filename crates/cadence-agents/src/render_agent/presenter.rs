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

use cadence_core::renderer::{
    wait_for_token, CompletionToken, DisplayMode, Extent2D, FenceWaitPolicy, GraphicsDevice,
    RenderError, ResourceState, SurfaceId, SwapChain, SwapImage, TextureFormat,
};
use cadence_lanes::SurfaceStateTracker;

/// Owns the swap chain and keeps its images known to the state tracker.
///
/// Swap images are registered `Undecided` the first time they are handed
/// out; recreating the chain forgets them so stale ids never linger in the
/// tracker. An image is only handed out again once the work it was last
/// presented after has completed.
pub struct Presenter {
    swap_chain: Box<dyn SwapChain>,
    wait_policy: FenceWaitPolicy,
    // Swap surfaces registered with the tracker.
    registered: Vec<SurfaceId>,
    // Token each image was last presented after, by image index.
    in_flight: Vec<Option<CompletionToken>>,
    // Acquired from the chain but not yet free; retried by the next acquire.
    held: Option<SwapImage>,
    presented: u64,
}

impl Presenter {
    /// Wraps `swap_chain`. Acquisition blocks at most `wait_policy.timeout`.
    pub fn new(swap_chain: Box<dyn SwapChain>, wait_policy: FenceWaitPolicy) -> Self {
        Self {
            swap_chain,
            wait_policy,
            registered: Vec::new(),
            in_flight: Vec::new(),
            held: None,
            presented: 0,
        }
    }

    /// Waits for a free swap image.
    ///
    /// A timeout surfaces as [`RenderError::FenceTimeout`]; the image stays
    /// held and the next call waits on it again.
    pub fn acquire(
        &mut self,
        device: &dyn GraphicsDevice,
        tracker: &mut SurfaceStateTracker,
    ) -> Result<SwapImage, RenderError> {
        let image = match self.held.take() {
            Some(image) => image,
            None => self.swap_chain.acquire_next(self.wait_policy.timeout)?,
        };
        if let Some(token) = self.in_flight.get(image.index).copied().flatten() {
            if let Err(err) = wait_for_token(device, token, &self.wait_policy) {
                self.held = Some(image);
                return Err(err);
            }
            self.in_flight[image.index] = None;
        }

        let label = || format!("Backbuffer {}", image.index);
        if tracker.register_if_absent(image.surface, label, ResourceState::Undecided) {
            self.registered.push(image.surface);
        }
        Ok(image)
    }

    /// Queues `image` for display once `after` completes.
    pub fn present(&mut self, image: SwapImage, after: CompletionToken) -> Result<(), RenderError> {
        let index = image.index;
        self.swap_chain.present(image, after)?;
        if self.in_flight.len() <= index {
            self.in_flight.resize(index + 1, None);
        }
        self.in_flight[index] = Some(after);
        self.presented += 1;
        Ok(())
    }

    /// The token `index` was last presented after, if still tracked.
    pub fn pending_token(&self, index: usize) -> Option<CompletionToken> {
        self.in_flight.get(index).copied().flatten()
    }

    fn forget_images(&mut self, tracker: &mut SurfaceStateTracker) {
        for surface in self.registered.drain(..) {
            tracker.forget(surface);
        }
        self.in_flight.clear();
        self.held = None;
    }

    /// Recreates the swap images at `extent`. The GPU must be idle.
    pub fn resize(
        &mut self,
        extent: Extent2D,
        tracker: &mut SurfaceStateTracker,
    ) -> Result<(), RenderError> {
        if extent == self.swap_chain.extent() {
            return Ok(());
        }
        self.forget_images(tracker);
        self.swap_chain.resize(extent)
    }

    /// Switches the output mode. The GPU must be idle.
    pub fn set_display_mode(
        &mut self,
        mode: DisplayMode,
        tracker: &mut SurfaceStateTracker,
    ) -> Result<(), RenderError> {
        if mode == self.swap_chain.display_mode() {
            return Ok(());
        }
        self.forget_images(tracker);
        self.swap_chain.set_display_mode(mode)?;
        log::info!("Presenter: display mode is now {mode:?}");
        Ok(())
    }

    /// The swap chain's display mode.
    pub fn display_mode(&self) -> DisplayMode {
        self.swap_chain.display_mode()
    }

    /// The size of the swap images.
    pub fn extent(&self) -> Extent2D {
        self.swap_chain.extent()
    }

    /// The format of the swap images.
    pub fn format(&self) -> TextureFormat {
        self.swap_chain.format()
    }

    /// Number of images presented so far.
    pub fn presented(&self) -> u64 {
        self.presented
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_infra::{HeadlessDevice, HeadlessSwapChain};
    use std::time::Duration;

    fn policy(timeout_ms: u64) -> FenceWaitPolicy {
        FenceWaitPolicy {
            timeout: Duration::from_millis(timeout_ms),
            poll_interval: Duration::from_micros(100),
        }
    }

    #[test]
    fn test_swap_images_are_registered_once_and_forgotten_on_resize() {
        let device = HeadlessDevice::default();
        let swap_chain =
            HeadlessSwapChain::new(device.clone(), Extent2D::new(16, 16), 2, DisplayMode::Sdr)
                .unwrap();
        let mut presenter = Presenter::new(Box::new(swap_chain), policy(10));
        let mut tracker = SurfaceStateTracker::default();

        for _ in 0..4 {
            let image = presenter.acquire(&device, &mut tracker).unwrap();
            assert_eq!(tracker.state(image.surface), Some(ResourceState::Undecided));
            presenter.present(image, CompletionToken::ORIGIN).unwrap();
        }
        assert_eq!(tracker.len(), 2);
        assert_eq!(presenter.presented(), 4);

        presenter.resize(Extent2D::new(32, 16), &mut tracker).unwrap();
        assert!(tracker.is_empty());
        assert_eq!(presenter.extent(), Extent2D::new(32, 16));
        assert_eq!(presenter.pending_token(0), None);
    }

    #[test]
    fn test_an_image_is_not_reused_before_its_present_completes() {
        let device = HeadlessDevice::default();
        let swap_chain =
            HeadlessSwapChain::new(device.clone(), Extent2D::new(16, 16), 2, DisplayMode::Sdr)
                .unwrap();
        let mut presenter = Presenter::new(Box::new(swap_chain), policy(20));
        let mut tracker = SurfaceStateTracker::default();

        device.set_stalled(true);
        let mut tokens = Vec::new();
        for _ in 0..2 {
            let image = presenter.acquire(&device, &mut tracker).unwrap();
            let token = device.submit(device.create_command_encoder(None).finish()).unwrap();
            presenter.present(image, token).unwrap();
            tokens.push(token);
        }
        assert_eq!(presenter.pending_token(0), Some(tokens[0]));

        // Image 0 is still in use by the stalled GPU.
        match presenter.acquire(&device, &mut tracker) {
            Err(RenderError::FenceTimeout { token, .. }) => assert_eq!(token, tokens[0]),
            other => panic!("expected a fence timeout, got {other:?}"),
        }

        device.set_stalled(false);
        let image = presenter.acquire(&device, &mut tracker).unwrap();
        assert_eq!(image.index, 0);
        assert!(tokens[0].is_reached_by(device.completed_token()));
        assert_eq!(presenter.pending_token(0), None);
    }
}
