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

//! Sky dome and the default environment textures.

use super::{
    pass_graph::{PassContext, PassStats},
    release_pipeline,
    surfaces::{SurfaceSlot, TargetFormats},
    RenderLane,
};
use crate::asset_lane::generate_mips;
use cadence_core::config::SkyKind;
use cadence_core::renderer::{
    ColorAttachment, DepthAttachment, Extent2D, GraphicsDevice, LoadOp, PipelineDescriptor,
    PipelineId, PipelineKind, RenderError, RenderPassDescriptor, ResourceState, StagingUploader,
    SurfaceDescriptor, SurfaceId, SurfaceUsage, TextureFormat,
};
use std::borrow::Cow;

/// Size of the built-in environment map.
pub const ENVIRONMENT_EXTENT: Extent2D = Extent2D::new(64, 32);

const HORIZON: [f32; 3] = [0.85, 0.88, 0.92];
const ZENITH: [f32; 3] = [0.22, 0.42, 0.78];
const GROUND: [f32; 3] = [0.18, 0.16, 0.14];

/// An equirectangular sky gradient: zenith at the top row, ground below the
/// middle.
pub fn environment_pixels(extent: Extent2D) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((extent.width * extent.height * 4) as usize);
    let horizon_row = extent.height as f32 * 0.5;
    for y in 0..extent.height {
        let row = y as f32 + 0.5;
        let color = if row < horizon_row {
            let t = row / horizon_row;
            lerp(ZENITH, HORIZON, t)
        } else {
            GROUND
        };
        let texel = color.map(|c| (c * 255.0).round() as u8);
        for _ in 0..extent.width {
            pixels.extend_from_slice(&[texel[0], texel[1], texel[2], 255]);
        }
    }
    pixels
}

fn lerp(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

/// Renders the sky behind the geometry and owns the textures every scene
/// falls back on.
#[derive(Debug, Default)]
pub struct SkyLane {
    cube: Option<PipelineId>,
    procedural: Option<PipelineId>,
    environment: Option<SurfaceId>,
    fallback: Option<SurfaceId>,
}

impl SkyLane {
    /// Creates the environment map and the 1x1 white fallback texture and
    /// stages their contents. The caller flushes the uploader.
    pub fn upload_defaults(
        &mut self,
        device: &dyn GraphicsDevice,
        uploader: &mut StagingUploader,
    ) -> Result<(), RenderError> {
        if self.environment.is_none() {
            let format = TextureFormat::Rgba8UnormSrgb;
            let mips = generate_mips(
                ENVIRONMENT_EXTENT,
                format,
                &environment_pixels(ENVIRONMENT_EXTENT),
            );
            let surface = create_sampled(device, "Environment", ENVIRONMENT_EXTENT, format, &mips)?;
            self.environment = Some(surface);
            uploader.stage_surface(device, surface, format, ENVIRONMENT_EXTENT, &mips)?;
        }
        if self.fallback.is_none() {
            let extent = Extent2D::new(1, 1);
            let format = TextureFormat::Rgba8Unorm;
            let mips = vec![vec![255u8; 4]];
            let surface = create_sampled(device, "White", extent, format, &mips)?;
            self.fallback = Some(surface);
            uploader.stage_surface(device, surface, format, extent, &mips)?;
        }
        Ok(())
    }

    /// The environment map, once uploaded.
    pub fn environment(&self) -> Option<SurfaceId> {
        self.environment
    }

    /// The texture bound for materials without textures.
    pub fn fallback_texture(&self) -> Option<SurfaceId> {
        self.fallback
    }

    /// The pipeline drawing `kind`.
    pub fn pipeline(&self, kind: SkyKind) -> Option<PipelineId> {
        match kind {
            SkyKind::CubeMap => self.cube,
            SkyKind::Procedural => self.procedural,
        }
    }
}

fn create_sampled(
    device: &dyn GraphicsDevice,
    label: &'static str,
    extent: Extent2D,
    format: TextureFormat,
    mips: &[Vec<u8>],
) -> Result<SurfaceId, RenderError> {
    Ok(device.create_surface(&SurfaceDescriptor {
        label: Some(Cow::Borrowed(label)),
        extent,
        format,
        mip_levels: mips.len() as u32,
        sample_count: 1,
        usage: SurfaceUsage::SAMPLED | SurfaceUsage::COPY_DST,
        initial_state: ResourceState::Undecided,
    })?)
}

impl RenderLane for SkyLane {
    fn strategy_name(&self) -> &'static str {
        "SkyDome"
    }

    fn on_gpu_init(
        &mut self,
        device: &dyn GraphicsDevice,
        targets: &TargetFormats,
    ) -> Result<(), RenderError> {
        let dome = |label: &str, kind: PipelineKind| {
            PipelineDescriptor::new(label, kind)
                .with_color(targets.hdr)
                .with_depth(targets.depth)
                .with_samples(targets.sample_count)
        };
        self.cube = Some(device.create_pipeline(&dome("Skydome cube", PipelineKind::SkyDomeCube))?);
        self.procedural = Some(device.create_pipeline(&dome(
            "Skydome procedural",
            PipelineKind::SkyDomeProcedural,
        ))?);
        Ok(())
    }

    fn on_gpu_shutdown(&mut self, device: &dyn GraphicsDevice) {
        release_pipeline(device, &mut self.procedural, "SkyLane");
        release_pipeline(device, &mut self.cube, "SkyLane");
        for surface in [self.fallback.take(), self.environment.take()].into_iter().flatten() {
            if let Err(e) = device.destroy_surface(surface) {
                log::warn!("SkyLane: Failed to destroy {surface:?}: {e}");
            }
        }
    }
}

/// Draws a fullscreen triangle at the far plane, behind what the opaque
/// pass drew.
pub fn record_sky(ctx: &mut PassContext<'_>) -> Result<PassStats, RenderError> {
    let sky = &ctx.lanes.sky;
    let kind = ctx.frame.settings.sky;
    let Some(pipeline) = sky.pipeline(kind) else {
        log::trace!("SkyLane: '{}' skipped, pipelines not built", ctx.pass);
        return Ok(PassStats::default());
    };
    let environment = match (kind, sky.environment()) {
        (SkyKind::CubeMap, None) => return Err(RenderError::NotInitialized),
        (_, environment) => environment,
    };
    let color = ctx.surfaces.single(SurfaceSlot::SceneColor)?;
    let depth = ctx.surfaces.single(SurfaceSlot::Depth)?;
    let frame_uniforms = ctx.frame.frame_uniforms;

    let attachments = [ColorAttachment::load(color)];
    let mut pass = ctx.encoder.begin_render_pass(&RenderPassDescriptor {
        label: Some(ctx.pass),
        color_attachments: &attachments,
        depth_attachment: Some(DepthAttachment {
            surface: depth,
            load: LoadOp::Load,
            read_only: true,
        }),
    });
    pass.set_pipeline(pipeline);
    pass.bind_buffer(0, frame_uniforms);
    if kind == SkyKind::CubeMap {
        if let Some(environment) = environment {
            pass.bind_surface(0, environment);
        }
    }
    pass.draw(0..3, 0..1);
    Ok(PassStats::drawn(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_has_sky_on_top_and_ground_below() {
        let extent = Extent2D::new(4, 8);
        let pixels = environment_pixels(extent);
        assert_eq!(pixels.len(), 4 * 8 * 4);
        let top = &pixels[..4];
        let bottom = &pixels[pixels.len() - 4..];
        // The zenith is bluer than it is red; the ground is not.
        assert!(top[2] > top[0]);
        assert!(bottom[2] <= bottom[0]);
        assert_eq!(top[3], 255);
    }
}
