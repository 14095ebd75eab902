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

//! Display modes and swap images.

use super::{common::TextureFormat, resource::SurfaceId};
use serde::{Deserialize, Serialize};

/// The output mode of the display the presenter targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DisplayMode {
    /// Standard dynamic range.
    #[default]
    Sdr,
    /// FreeSync HDR with a gamma 2.2 transfer.
    FreeSyncHdrGamma22,
    /// FreeSync HDR in scRGB.
    FreeSyncHdrScRgb,
    /// HDR10 with the PQ transfer.
    Hdr10Pq,
    /// HDR10 in scRGB.
    Hdr10ScRgb,
}

impl DisplayMode {
    /// Whether the mode is an extended-range mode. Extended-range output
    /// tone-maps in place and needs the final color-conversion pass.
    pub const fn is_hdr(&self) -> bool {
        !matches!(self, DisplayMode::Sdr)
    }

    /// The swap surface format the mode expects.
    pub const fn swap_format(&self) -> TextureFormat {
        match self {
            DisplayMode::Sdr => TextureFormat::Bgra8UnormSrgb,
            DisplayMode::FreeSyncHdrGamma22 | DisplayMode::Hdr10Pq => TextureFormat::Rgb10a2Unorm,
            DisplayMode::FreeSyncHdrScRgb | DisplayMode::Hdr10ScRgb => TextureFormat::Rgba16Float,
        }
    }

    /// The index the color-conversion shader uses to select the mode.
    pub const fn color_space_index(&self) -> u32 {
        *self as u32
    }
}

/// A swap surface handed out by the presenter for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwapImage {
    /// Position inside the swap chain.
    pub index: usize,
    /// The surface to render into.
    pub surface: SurfaceId,
}
