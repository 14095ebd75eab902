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

//! Rendering lanes - recording of the scene and present command streams

mod composite_lane;
mod debug_lane;
mod geometry_lane;
mod gpu_scene;
mod pass_graph;
mod shadow_lane;
mod sky_lane;
mod state_tracker;
mod surfaces;

pub use composite_lane::*;
pub use debug_lane::*;
pub use geometry_lane::*;
pub use gpu_scene::*;
pub use pass_graph::*;
pub use shadow_lane::*;
pub use sky_lane::*;
pub use state_tracker::*;
pub use surfaces::*;

use crate::postprocess_lane::PostProcessChain;
use cadence_core::config::RendererConfig;
use cadence_core::renderer::{GraphicsDevice, PipelineId, RenderError};

/// A trait defining the GPU lifecycle of a rendering lane.
///
/// A lane owns the pipelines (and sometimes the surfaces) of one rendering
/// concern. The orchestrator creates them once the device exists, and
/// destroys them after the GPU went idle. Recording itself goes through the
/// pass graph, which hands each lane a [`PassContext`].
pub trait RenderLane: Send {
    /// Returns a human-readable identifier for this lane.
    ///
    /// Used as the prefix of the lane's log messages.
    fn strategy_name(&self) -> &'static str;

    /// Creates the GPU objects of the lane for the given target formats.
    ///
    /// Calling it again after [`RenderLane::on_gpu_shutdown`] recreates them,
    /// which is how pipelines follow a display-mode change.
    fn on_gpu_init(
        &mut self,
        device: &dyn GraphicsDevice,
        targets: &TargetFormats,
    ) -> Result<(), RenderError>;

    /// Destroys every GPU object of the lane. The GPU must be idle.
    fn on_gpu_shutdown(&mut self, device: &dyn GraphicsDevice);
}

/// Destroys a pipeline slot if it is filled, logging failures.
pub(crate) fn release_pipeline(
    device: &dyn GraphicsDevice,
    pipeline: &mut Option<PipelineId>,
    owner: &str,
) {
    if let Some(id) = pipeline.take() {
        if let Err(e) = device.destroy_pipeline(id) {
            log::warn!("{owner}: Failed to destroy pipeline {id:?}: {e}");
        }
    }
}

/// Every lane that lives as long as the orchestrator.
///
/// Scene-dependent pipelines belong to the [`GpuScene`] instead; these are
/// created at startup and only rebuilt when the display mode changes.
#[derive(Debug)]
pub struct RenderLanes {
    /// The shadow atlas and its quadrant layout.
    pub shadow: ShadowAtlasLane,
    /// Sky dome and the default environment.
    pub sky: SkyLane,
    /// Downsample, bloom, TAA, tone mapping and color conversion.
    pub post: PostProcessChain,
}

impl RenderLanes {
    /// Creates the lanes without touching the GPU.
    pub fn new(config: &RendererConfig) -> Self {
        Self {
            shadow: ShadowAtlasLane::new(config.shadow_atlas_size),
            sky: SkyLane::default(),
            post: PostProcessChain::new(),
        }
    }

    /// Initializes every lane, tearing down the ones already initialized if
    /// one of them fails.
    pub fn on_gpu_init(
        &mut self,
        device: &dyn GraphicsDevice,
        targets: &TargetFormats,
    ) -> Result<(), RenderError> {
        let result = self
            .shadow
            .on_gpu_init(device, targets)
            .and_then(|()| self.sky.on_gpu_init(device, targets))
            .and_then(|()| self.post.on_gpu_init(device, targets));
        if let Err(err) = result {
            log::error!("RenderLanes: initialization failed: {err}");
            self.on_gpu_shutdown(device);
            return Err(err);
        }
        log::info!(
            "RenderLanes: {}, {} and {} ready",
            self.shadow.strategy_name(),
            self.sky.strategy_name(),
            self.post.strategy_name()
        );
        Ok(())
    }

    /// Rebuilds the pipelines whose target is the swap chain.
    pub fn on_display_mode_changed(
        &mut self,
        device: &dyn GraphicsDevice,
        targets: &TargetFormats,
    ) -> Result<(), RenderError> {
        self.post.on_display_mode_changed(device, targets)
    }

    /// Destroys every lane's GPU objects, in reverse initialization order.
    pub fn on_gpu_shutdown(&mut self, device: &dyn GraphicsDevice) {
        self.post.on_gpu_shutdown(device);
        self.sky.on_gpu_shutdown(device);
        self.shadow.on_gpu_shutdown(device);
    }
}
