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

//! Common constants and small value types shared by the renderer API.

use serde::{Deserialize, Serialize};

/// The number of frames the CPU may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 3;

/// Alignment of every sub-allocation made from a uniform arena.
pub const MIN_UNIFORM_ALIGNMENT: u64 = 256;

/// Alignment of buffer offsets used as the source of a buffer-to-surface copy.
pub const SURFACE_COPY_ALIGNMENT: u64 = 512;

/// Alignment of a row inside a buffer-to-surface (or surface-to-buffer) copy.
pub const COPY_ROW_ALIGNMENT: u32 = 256;

/// Rounds `value` up to the next multiple of `alignment` (a power of two).
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    (value + alignment - 1) & !(alignment - 1)
}

/// A two-dimensional size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Extent2D {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Extent2D {
    /// Creates a new extent.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether either dimension is zero (a minimized window).
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// The extent of mip level `level`, never smaller than one pixel.
    pub fn mip(&self, level: u32) -> Extent2D {
        Extent2D {
            width: (self.width >> level).max(1),
            height: (self.height >> level).max(1),
        }
    }

    /// The number of mip levels of a full chain down to 1×1.
    pub fn full_mip_count(&self) -> u32 {
        let largest = self.width.max(self.height).max(1);
        u32::BITS - largest.leading_zeros()
    }
}

/// Pixel formats used by the orchestrator's surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureFormat {
    /// 8-bit RGBA, linear.
    Rgba8Unorm,
    /// 8-bit RGBA, sRGB encoded.
    Rgba8UnormSrgb,
    /// 8-bit BGRA, sRGB encoded. The usual standard-range swap format.
    Bgra8UnormSrgb,
    /// 10-bit RGB with 2-bit alpha. Used for HDR10 output.
    Rgb10a2Unorm,
    /// 16-bit float RGBA. Used for HDR intermediates and scRGB output.
    Rgba16Float,
    /// 16-bit float RG. Used for motion vectors.
    Rg16Float,
    /// 32-bit float depth.
    Depth32Float,
}

impl TextureFormat {
    /// Size of one pixel in bytes.
    pub const fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8UnormSrgb
            | TextureFormat::Rgb10a2Unorm
            | TextureFormat::Rg16Float
            | TextureFormat::Depth32Float => 4,
            TextureFormat::Rgba16Float => 8,
        }
    }

    /// Whether this is a depth format.
    pub const fn is_depth(&self) -> bool {
        matches!(self, TextureFormat::Depth32Float)
    }

    /// Whether the format stores four 8-bit channels.
    pub const fn is_rgba8_family(&self) -> bool {
        matches!(
            self,
            TextureFormat::Rgba8Unorm | TextureFormat::Rgba8UnormSrgb | TextureFormat::Bgra8UnormSrgb
        )
    }
}

/// A viewport rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width.
    pub width: f32,
    /// Height.
    pub height: f32,
    /// Near depth.
    pub min_depth: f32,
    /// Far depth.
    pub max_depth: f32,
}

impl Viewport {
    /// A viewport covering the whole extent.
    pub fn full(extent: Extent2D) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up_rounds_to_multiple() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(257, 256), 512);
    }

    #[test]
    fn test_mip_extent_never_reaches_zero() {
        let extent = Extent2D::new(1280, 720);
        assert_eq!(extent.mip(1), Extent2D::new(640, 360));
        assert_eq!(extent.mip(20), Extent2D::new(1, 1));
        assert_eq!(extent.full_mip_count(), 11);
        assert_eq!(Extent2D::new(1, 1).full_mip_count(), 1);
    }

    #[test]
    fn test_zero_sized_extent_is_empty() {
        assert!(Extent2D::new(0, 0).is_empty());
        assert!(Extent2D::new(800, 0).is_empty());
        assert!(!Extent2D::new(1, 1).is_empty());
    }
}
