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

use crate::renderer::api::common::{Extent2D, TextureFormat};

/// Raw pixels read back from the present surface.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    /// The frame the pixels belong to.
    pub frame_number: u64,
    /// Image size.
    pub extent: Extent2D,
    /// Pixel format.
    pub format: TextureFormat,
    /// Row stride inside `pixels`.
    pub bytes_per_row: u32,
    /// Pixel rows.
    pub pixels: Vec<u8>,
}

/// Encodes and stores captured frames. Runs on a background thread.
pub trait ScreenshotSink: Send + 'static {
    /// Consumes one captured image.
    fn write(&mut self, image: CapturedImage) -> anyhow::Result<()>;
}
