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

//! The post-process stages and the lane owning their pipelines.

use super::{
    bloom::{self, BloomLane},
    color_conversion::{self, ColorConversionLane},
    downsample::{self, DownsampleLane},
    taa::{self, TaaLane},
    tone_mapping::{self, ToneMappingLane},
};
use crate::render_lane::{
    record_hdr_ui_composite, record_ui_composite, CommandStream, PassDescriptor, PassId,
    RenderLane, SurfaceAccess, SurfaceSlot, TargetFormats, UI_PASS_NAME,
};
use cadence_core::renderer::{GraphicsDevice, RenderError, ResourceState};
use ResourceState::{Present, RenderTarget, ShaderReadable, UnorderedAccess};
use SurfaceSlot::{Backbuffer, Depth, DownsampleChain, Hdr, History, MotionVectors, TaaOutput};

/// Post-process stages in recording order. The scene stream ends after
/// sharpening; the rest is recorded into the present stream once the
/// backbuffer is known.
pub static POST_PROCESS_STAGES: [PassDescriptor; 9] = [
    PassDescriptor {
        id: PassId::Downsample,
        name: "Downsample",
        stream: CommandStream::Scene,
        enabled: |_| true,
        accesses: &[
            SurfaceAccess::read(Hdr, ShaderReadable),
            SurfaceAccess::write(DownsampleChain, RenderTarget),
        ],
        record: downsample::record_downsample,
    },
    PassDescriptor {
        id: PassId::Bloom,
        name: "Bloom",
        stream: CommandStream::Scene,
        enabled: |_| true,
        accesses: &[
            SurfaceAccess::read_write(DownsampleChain, ShaderReadable),
            SurfaceAccess::read_write(Hdr, RenderTarget),
        ],
        record: bloom::record_bloom,
    },
    PassDescriptor {
        id: PassId::Taa,
        name: "TAA",
        stream: CommandStream::Scene,
        enabled: |features| features.taa,
        accesses: &[
            SurfaceAccess::read(Hdr, ShaderReadable),
            SurfaceAccess::read(MotionVectors, ShaderReadable),
            SurfaceAccess::read(Depth, ShaderReadable),
            SurfaceAccess::read(History, ShaderReadable),
            SurfaceAccess::write(TaaOutput, UnorderedAccess).then(ShaderReadable),
        ],
        record: taa::record_taa,
    },
    PassDescriptor {
        id: PassId::Sharpen,
        name: "Sharpen",
        stream: CommandStream::Scene,
        enabled: |features| features.taa,
        accesses: &[
            SurfaceAccess::read(TaaOutput, ShaderReadable),
            SurfaceAccess::write(Hdr, UnorderedAccess),
            SurfaceAccess::write(History, UnorderedAccess).then(ShaderReadable),
        ],
        record: taa::record_sharpen,
    },
    PassDescriptor {
        id: PassId::ToneMapInPlace,
        name: "Tone mapping",
        stream: CommandStream::Present,
        enabled: |features| features.hdr_output,
        accesses: &[SurfaceAccess::read_write(Hdr, UnorderedAccess)],
        record: tone_mapping::record_tone_map_in_place,
    },
    PassDescriptor {
        id: PassId::HdrUiComposite,
        name: UI_PASS_NAME,
        stream: CommandStream::Present,
        enabled: |features| features.hdr_output,
        accesses: &[SurfaceAccess::read_write(Hdr, RenderTarget)],
        record: record_hdr_ui_composite,
    },
    PassDescriptor {
        id: PassId::ColorConversion,
        name: "Color conversion",
        stream: CommandStream::Present,
        enabled: |features| features.hdr_output,
        accesses: &[
            SurfaceAccess::read(Hdr, ShaderReadable),
            SurfaceAccess::write(Backbuffer, RenderTarget).then(Present),
        ],
        record: color_conversion::record_color_conversion,
    },
    PassDescriptor {
        id: PassId::ToneMap,
        name: "Tone mapping",
        stream: CommandStream::Present,
        enabled: |features| !features.hdr_output,
        accesses: &[
            SurfaceAccess::read(Hdr, ShaderReadable),
            SurfaceAccess::write(Backbuffer, RenderTarget),
        ],
        record: tone_mapping::record_tone_map,
    },
    PassDescriptor {
        id: PassId::UiComposite,
        name: UI_PASS_NAME,
        stream: CommandStream::Present,
        enabled: |features| !features.hdr_output,
        accesses: &[SurfaceAccess::read_write(Backbuffer, RenderTarget).then(Present)],
        record: record_ui_composite,
    },
];

/// Owns the pipelines of every post-process stage.
#[derive(Debug, Default)]
pub struct PostProcessChain {
    downsample: DownsampleLane,
    bloom: BloomLane,
    taa: TaaLane,
    tone_mapping: ToneMappingLane,
    color_conversion: ColorConversionLane,
}

impl PostProcessChain {
    /// Creates the chain without touching the GPU.
    pub fn new() -> Self {
        Self::default()
    }

    /// The downsample lane.
    pub fn downsample(&self) -> &DownsampleLane {
        &self.downsample
    }

    /// The bloom lane.
    pub fn bloom(&self) -> &BloomLane {
        &self.bloom
    }

    /// The TAA lane.
    pub fn taa(&self) -> &TaaLane {
        &self.taa
    }

    /// The TAA lane, for per-frame jitter and history bookkeeping.
    pub fn taa_mut(&mut self) -> &mut TaaLane {
        &mut self.taa
    }

    /// The tone-mapping lane.
    pub fn tone_mapping(&self) -> &ToneMappingLane {
        &self.tone_mapping
    }

    /// The color-conversion lane.
    pub fn color_conversion(&self) -> &ColorConversionLane {
        &self.color_conversion
    }

    fn lanes_mut(&mut self) -> [&mut dyn RenderLane; 5] {
        [
            &mut self.downsample,
            &mut self.bloom,
            &mut self.taa,
            &mut self.tone_mapping,
            &mut self.color_conversion,
        ]
    }

    /// Rebuilds the pipelines that write the swap-chain format.
    pub fn on_display_mode_changed(
        &mut self,
        device: &dyn GraphicsDevice,
        targets: &TargetFormats,
    ) -> Result<(), RenderError> {
        self.tone_mapping.rebuild_display_pipeline(device, targets)?;
        self.color_conversion.on_gpu_shutdown(device);
        self.color_conversion.on_gpu_init(device, targets)?;
        log::info!(
            "PostProcessChain: display pipelines rebuilt for {:?}",
            targets.swap
        );
        Ok(())
    }
}

impl RenderLane for PostProcessChain {
    fn strategy_name(&self) -> &'static str {
        "PostProcess"
    }

    fn on_gpu_init(
        &mut self,
        device: &dyn GraphicsDevice,
        targets: &TargetFormats,
    ) -> Result<(), RenderError> {
        for lane in self.lanes_mut() {
            lane.on_gpu_init(device, targets)?;
            log::debug!("PostProcessChain: {} ready", lane.strategy_name());
        }
        Ok(())
    }

    fn on_gpu_shutdown(&mut self, device: &dyn GraphicsDevice) {
        for lane in self.lanes_mut().into_iter().rev() {
            lane.on_gpu_shutdown(device);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::renderer::{DisplayMode, PipelineKind};
    use cadence_infra::HeadlessDevice;

    #[test]
    fn test_init_builds_every_stage_and_shutdown_releases_them() {
        let device = HeadlessDevice::default();
        let mut chain = PostProcessChain::new();
        chain
            .on_gpu_init(&device, &TargetFormats::new(DisplayMode::Sdr, 1))
            .unwrap();
        assert!(chain.downsample().pipeline().is_some());
        assert!(chain.bloom().pipeline().is_some());
        assert!(chain.taa().resolve_pipeline().is_some());
        assert!(chain.taa().sharpen_pipeline().is_some());
        assert!(chain.tone_mapping().in_place_pipeline().is_some());
        assert!(chain.tone_mapping().display_pipeline().is_some());
        assert!(chain.color_conversion().pipeline().is_some());

        chain.on_gpu_shutdown(&device);
        assert!(chain.downsample().pipeline().is_none());
        assert!(chain.color_conversion().pipeline().is_none());
        assert_eq!(device.live_resource_counts().pipelines, 0);
        assert_eq!(device.pipelines_of_kind(PipelineKind::Taa).len(), 0);
    }

    #[test]
    fn test_display_mode_change_rebuilds_display_pipelines_only() {
        let device = HeadlessDevice::default();
        let mut chain = PostProcessChain::new();
        chain
            .on_gpu_init(&device, &TargetFormats::new(DisplayMode::Sdr, 1))
            .unwrap();
        let downsample = chain.downsample().pipeline();
        let tone_map = chain.tone_mapping().display_pipeline();

        let hdr = TargetFormats::new(DisplayMode::Hdr10Pq, 1);
        chain.on_display_mode_changed(&device, &hdr).unwrap();
        assert_eq!(chain.downsample().pipeline(), downsample);
        assert_ne!(chain.tone_mapping().display_pipeline(), tone_map);
        assert_eq!(chain.color_conversion().format(), Some(hdr.swap));
    }
}
