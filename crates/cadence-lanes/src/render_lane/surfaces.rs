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

//! Surfaces whose size follows the render resolution.
//!
//! [`FrameSurfaces`] is recreated on every resize. The shadow atlas and the
//! swap images live elsewhere; [`SurfaceBindings`] joins all of them so a pass
//! can name what it touches by [`SurfaceSlot`].

use super::state_tracker::SurfaceStateTracker;
use cadence_core::renderer::{
    DisplayMode, Extent2D, GraphicsDevice, RenderError, ResourceState, SurfaceDescriptor,
    SurfaceId, SurfaceUsage, TextureFormat,
};
use std::borrow::Cow;
use std::slice;

/// A role a surface plays in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceSlot {
    /// Depth atlas holding up to four shadow maps.
    ShadowAtlas,
    /// Scene depth.
    Depth,
    /// Per-pixel screen-space motion.
    MotionVectors,
    /// Where geometry is drawn: the multisampled target, or `Hdr` without MSAA.
    SceneColor,
    /// Single-sampled HDR color.
    Hdr,
    /// Every level of the bloom downsample chain.
    DownsampleChain,
    /// Output of the TAA resolve.
    TaaOutput,
    /// Accumulated TAA history.
    History,
    /// The acquired swap image.
    Backbuffer,
}

impl SurfaceSlot {
    /// A short name used in diagnostics.
    pub const fn label(&self) -> &'static str {
        match self {
            SurfaceSlot::ShadowAtlas => "ShadowAtlas",
            SurfaceSlot::Depth => "Depth",
            SurfaceSlot::MotionVectors => "MotionVectors",
            SurfaceSlot::SceneColor => "SceneColor",
            SurfaceSlot::Hdr => "Hdr",
            SurfaceSlot::DownsampleChain => "DownsampleChain",
            SurfaceSlot::TaaOutput => "TaaOutput",
            SurfaceSlot::History => "History",
            SurfaceSlot::Backbuffer => "Backbuffer",
        }
    }
}

/// Formats and sample count of every render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetFormats {
    /// HDR scene color.
    pub hdr: TextureFormat,
    /// Scene and shadow depth.
    pub depth: TextureFormat,
    /// Motion vectors.
    pub motion_vectors: TextureFormat,
    /// The swap chain, which follows the display mode.
    pub swap: TextureFormat,
    /// MSAA sample count of the geometry targets.
    pub sample_count: u32,
}

impl TargetFormats {
    /// Target formats for a display mode.
    pub fn new(display_mode: DisplayMode, sample_count: u32) -> Self {
        Self {
            hdr: TextureFormat::Rgba16Float,
            depth: TextureFormat::Depth32Float,
            motion_vectors: TextureFormat::Rg16Float,
            swap: display_mode.swap_format(),
            sample_count: sample_count.max(1),
        }
    }

    /// Whether the geometry targets are multisampled.
    pub fn is_multisampled(&self) -> bool {
        self.sample_count > 1
    }
}

/// The render-resolution surfaces of one size epoch.
#[derive(Debug)]
pub struct FrameSurfaces {
    extent: Extent2D,
    depth: SurfaceId,
    motion_vectors: SurfaceId,
    msaa_color: Option<SurfaceId>,
    hdr: SurfaceId,
    downsample_mips: Vec<SurfaceId>,
    taa_output: SurfaceId,
    history: SurfaceId,
}

struct SurfaceBuilder<'d> {
    device: &'d dyn GraphicsDevice,
    created: Vec<SurfaceId>,
}

impl SurfaceBuilder<'_> {
    fn create(
        &mut self,
        label: String,
        extent: Extent2D,
        format: TextureFormat,
        sample_count: u32,
        usage: SurfaceUsage,
        initial_state: ResourceState,
    ) -> Result<SurfaceId, RenderError> {
        let id = self.device.create_surface(&SurfaceDescriptor {
            label: Some(Cow::Owned(label)),
            extent,
            format,
            mip_levels: 1,
            sample_count,
            usage,
            initial_state,
        })?;
        self.created.push(id);
        Ok(id)
    }

    fn abandon(self) {
        for id in self.created.into_iter().rev() {
            if let Err(e) = self.device.destroy_surface(id) {
                log::warn!("FrameSurfaces: Failed to destroy {id:?} during cleanup: {e}");
            }
        }
    }
}

impl FrameSurfaces {
    /// Creates every surface for `extent`.
    ///
    /// All of them start `Undecided` except the TAA history, which starts
    /// `ShaderReadable` so the first resolve may bind it. The downsample
    /// chain gets up to `downsample_mips` levels, each half the previous one.
    pub fn create(
        device: &dyn GraphicsDevice,
        extent: Extent2D,
        targets: &TargetFormats,
        downsample_mips: u32,
    ) -> Result<Self, RenderError> {
        let mut builder = SurfaceBuilder {
            device,
            created: Vec::new(),
        };
        match Self::create_all(&mut builder, extent, targets, downsample_mips) {
            Ok(surfaces) => {
                log::debug!(
                    "FrameSurfaces: created {} surfaces at {}x{} ({} samples)",
                    builder.created.len(),
                    extent.width,
                    extent.height,
                    targets.sample_count
                );
                Ok(surfaces)
            }
            Err(err) => {
                builder.abandon();
                Err(err)
            }
        }
    }

    fn create_all(
        builder: &mut SurfaceBuilder<'_>,
        extent: Extent2D,
        targets: &TargetFormats,
        downsample_mips: u32,
    ) -> Result<Self, RenderError> {
        let samples = targets.sample_count;
        let attachment = SurfaceUsage::RENDER_ATTACHMENT | SurfaceUsage::SAMPLED;
        let undecided = ResourceState::Undecided;

        let depth = builder.create(
            "Depth".into(),
            extent,
            targets.depth,
            samples,
            attachment,
            undecided,
        )?;
        let motion_vectors = builder.create(
            "Motion vectors".into(),
            extent,
            targets.motion_vectors,
            samples,
            attachment,
            undecided,
        )?;
        let msaa_color = if targets.is_multisampled() {
            Some(builder.create(
                "Scene color (MSAA)".into(),
                extent,
                targets.hdr,
                samples,
                SurfaceUsage::RENDER_ATTACHMENT | SurfaceUsage::COPY_SRC,
                undecided,
            )?)
        } else {
            None
        };
        let hdr = builder.create(
            "HDR".into(),
            extent,
            targets.hdr,
            1,
            attachment | SurfaceUsage::STORAGE | SurfaceUsage::COPY_DST,
            undecided,
        )?;

        let levels = downsample_mips
            .min(extent.full_mip_count().saturating_sub(1))
            .max(1);
        let mut downsample_mips = Vec::with_capacity(levels as usize);
        for level in 0..levels {
            downsample_mips.push(builder.create(
                format!("Downsample mip {level}"),
                extent.mip(level + 1),
                targets.hdr,
                1,
                attachment,
                undecided,
            )?);
        }

        let taa_output = builder.create(
            "TAA output".into(),
            extent,
            targets.hdr,
            1,
            SurfaceUsage::STORAGE | SurfaceUsage::SAMPLED,
            undecided,
        )?;
        let history = builder.create(
            "TAA history".into(),
            extent,
            targets.hdr,
            1,
            SurfaceUsage::STORAGE | SurfaceUsage::SAMPLED,
            ResourceState::ShaderReadable,
        )?;

        Ok(Self {
            extent,
            depth,
            motion_vectors,
            msaa_color,
            hdr,
            downsample_mips,
            taa_output,
            history,
        })
    }

    /// The render resolution of this epoch.
    pub fn extent(&self) -> Extent2D {
        self.extent
    }

    /// The HDR color surface.
    pub fn hdr(&self) -> SurfaceId {
        self.hdr
    }

    /// The TAA history surface.
    pub fn history(&self) -> SurfaceId {
        self.history
    }

    /// Levels of the downsample chain, largest first.
    pub fn downsample_mips(&self) -> &[SurfaceId] {
        &self.downsample_mips
    }

    fn labelled(&self) -> Vec<(SurfaceId, String, ResourceState)> {
        let mut all = vec![
            (self.depth, "Depth".to_string(), ResourceState::Undecided),
            (
                self.motion_vectors,
                "MotionVectors".to_string(),
                ResourceState::Undecided,
            ),
            (self.hdr, "Hdr".to_string(), ResourceState::Undecided),
            (self.taa_output, "TaaOutput".to_string(), ResourceState::Undecided),
            (self.history, "History".to_string(), ResourceState::ShaderReadable),
        ];
        if let Some(msaa) = self.msaa_color {
            all.push((msaa, "SceneColor".to_string(), ResourceState::Undecided));
        }
        for (level, &mip) in self.downsample_mips.iter().enumerate() {
            all.push((mip, format!("Downsample[{level}]"), ResourceState::Undecided));
        }
        all
    }

    /// Every surface of the epoch.
    pub fn all(&self) -> Vec<SurfaceId> {
        self.labelled().into_iter().map(|(id, _, _)| id).collect()
    }

    /// Starts tracking every surface in its creation state.
    pub fn register(&self, tracker: &mut SurfaceStateTracker) {
        for (id, label, state) in self.labelled() {
            tracker.register(id, label, state);
        }
    }

    /// Joins the epoch with the persistent and per-frame surfaces.
    pub fn bindings(&self, shadow_atlas: SurfaceId, backbuffer: Option<SurfaceId>) -> SurfaceBindings<'_> {
        SurfaceBindings {
            surfaces: self,
            shadow_atlas,
            backbuffer,
        }
    }

    /// Stops tracking and destroys every surface. The GPU must be done with
    /// them.
    pub fn destroy(self, device: &dyn GraphicsDevice, tracker: &mut SurfaceStateTracker) {
        for id in self.all() {
            tracker.forget(id);
            if let Err(e) = device.destroy_surface(id) {
                log::warn!("FrameSurfaces: Failed to destroy {id:?}: {e}");
            }
        }
        log::debug!(
            "FrameSurfaces: released {}x{} epoch",
            self.extent.width,
            self.extent.height
        );
    }
}

/// Resolves [`SurfaceSlot`]s to surfaces for one frame.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceBindings<'a> {
    surfaces: &'a FrameSurfaces,
    shadow_atlas: SurfaceId,
    backbuffer: Option<SurfaceId>,
}

impl<'a> SurfaceBindings<'a> {
    /// The surfaces filling `slot`, empty when the slot is unbound.
    pub fn resolve(&self, slot: SurfaceSlot) -> &[SurfaceId] {
        let surfaces = self.surfaces;
        match slot {
            SurfaceSlot::ShadowAtlas => slice::from_ref(&self.shadow_atlas),
            SurfaceSlot::Depth => slice::from_ref(&surfaces.depth),
            SurfaceSlot::MotionVectors => slice::from_ref(&surfaces.motion_vectors),
            SurfaceSlot::SceneColor => {
                slice::from_ref(surfaces.msaa_color.as_ref().unwrap_or(&surfaces.hdr))
            }
            SurfaceSlot::Hdr => slice::from_ref(&surfaces.hdr),
            SurfaceSlot::DownsampleChain => &surfaces.downsample_mips,
            SurfaceSlot::TaaOutput => slice::from_ref(&surfaces.taa_output),
            SurfaceSlot::History => slice::from_ref(&surfaces.history),
            SurfaceSlot::Backbuffer => match self.backbuffer.as_ref() {
                Some(backbuffer) => slice::from_ref(backbuffer),
                None => &[],
            },
        }
    }

    /// The single surface filling `slot`.
    pub fn single(&self, slot: SurfaceSlot) -> Result<SurfaceId, RenderError> {
        self.resolve(slot).first().copied().ok_or_else(|| {
            RenderError::Internal(format!("no surface bound to {}", slot.label()))
        })
    }

    /// The render resolution.
    pub fn extent(&self) -> Extent2D {
        self.surfaces.extent
    }
}
