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
        common::{Extent2D, TextureFormat},
        display::{DisplayMode, SwapImage},
        sync::CompletionToken,
    },
    error::RenderError,
};
use std::time::Duration;

/// The presentation engine's swap surfaces.
pub trait SwapChain: Send {
    /// Returns the next swap image. Blocks at most `timeout`.
    fn acquire_next(&mut self, timeout: Duration) -> Result<SwapImage, RenderError>;

    /// Queues `image` for display once the GPU reaches `after`.
    fn present(&mut self, image: SwapImage, after: CompletionToken) -> Result<(), RenderError>;

    /// The current display mode.
    fn display_mode(&self) -> DisplayMode;

    /// Switches the output mode, recreating the swap images in the mode's
    /// format. The GPU must be idle.
    fn set_display_mode(&mut self, mode: DisplayMode) -> Result<(), RenderError>;

    /// The format of the swap images.
    fn format(&self) -> TextureFormat;

    /// The size of the swap images.
    fn extent(&self) -> Extent2D;

    /// The number of swap images.
    fn image_count(&self) -> usize;

    /// Recreates the swap images at a new size. The GPU must be idle.
    fn resize(&mut self, extent: Extent2D) -> Result<(), RenderError>;
}
