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

//! Defines the RenderAgent, the per-frame orchestrator.

use super::frame::{CameraView, FrameError, FrameOutcome, FrameState, FrameStats};
use super::frame_prep::{prepare_frame, FramePrep};
use super::presenter::Presenter;
use super::screenshot::ScreenshotCapture;
use crate::scene_agent::{LoadProgress, LoadStage, LoadedScene, SceneLoader};
use cadence_core::config::{RenderSettings, RendererConfig};
use cadence_core::renderer::{
    DisplayMode, Extent2D, FenceWaitPolicy, GraphicsDevice, NoOverlay, RenderError,
    ResourceState, ScreenshotSink, StagingUploader, SwapChain, TransientResourceRing, UiOverlay,
};
use cadence_core::scene::AssetLoader;
use cadence_lanes::postprocess_lane::TaaLane;
use cadence_lanes::{
    CommandStream, FrameSurfaces, PassContext, PassFeatures, PassGraph, PassId, RenderLanes,
    SurfaceStateTracker, TargetFormats, TexturePrepLane,
};
use cadence_telemetry::{resolve_gpu_timestamps, ProfilerHistory, ScopedTimer};
use glam::Mat4;
use std::path::PathBuf;
use std::sync::Arc;

/// Frames of timings the profiler keeps.
pub const PROFILER_HISTORY_FRAMES: usize = 120;

/// Timestamp opening the scene stream.
pub const BEGIN_FRAME_LABEL: &str = "Begin Frame";

/// Timestamp closing the present stream.
pub const END_FRAME_LABEL: &str = "End Frame";

/// The agent that turns a [`FrameState`] into submitted GPU work.
///
/// Each frame either advances a scene load by one stage, or records two
/// command streams into a ring slot: the scene stream (geometry and
/// post-processing) is submitted before the presenter is asked for a swap
/// image, then the present stream draws the final composite into it.
pub struct RenderAgent {
    device: Arc<dyn GraphicsDevice>,
    config: RendererConfig,
    wait_policy: FenceWaitPolicy,
    targets: TargetFormats,
    // Per-frame command streams, uniform arenas and timestamps.
    ring: TransientResourceRing,
    // Scene and startup uploads.
    uploader: StagingUploader,
    // Startup lanes, alive until shutdown.
    lanes: RenderLanes,
    // Last recorded state of every tracked surface.
    tracker: SurfaceStateTracker,
    // Rebuilt whenever the frame's features change.
    graph: PassGraph,
    presenter: Presenter,
    loader: SceneLoader,
    // Window-size surfaces. `None` while minimized.
    surfaces: Option<FrameSurfaces>,
    ui: Box<dyn UiOverlay>,
    screenshots: ScreenshotCapture,
    profiler: ProfilerHistory,
    // --- Previous frame, for motion vectors ---
    previous_view_proj: Option<Mat4>,
    previous_world: Vec<Mat4>,
    animation_time: f32,
    last_stats: Option<FrameStats>,
    frames_rendered: u64,
}

impl RenderAgent {
    /// Validates `config`, creates the ring, the startup lanes and default
    /// resources, and the surfaces for the swap chain's current size.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        swap_chain: Box<dyn SwapChain>,
        assets: Arc<dyn AssetLoader>,
        config: RendererConfig,
    ) -> Result<Self, FrameError> {
        config.validate()?;
        let gpu = device.as_ref();
        let display_mode = swap_chain.display_mode();
        let targets = TargetFormats::new(display_mode, config.msaa_samples);

        let ring = TransientResourceRing::new(gpu, &config).map_err(RenderError::from)?;
        let mut uploader = StagingUploader::new(&config);
        let mut lanes = RenderLanes::new(&config);
        lanes.on_gpu_init(gpu, &targets)?;
        lanes.sky.upload_defaults(gpu, &mut uploader)?;
        uploader.flush_and_wait(gpu)?;

        let mut tracker = SurfaceStateTracker::default();
        if let Some(atlas) = lanes.shadow.atlas() {
            tracker.register(atlas, "Shadow atlas", ResourceState::ShaderReadable);
        }

        let features = PassFeatures::new(&RenderSettings::default(), targets.sample_count, display_mode);
        let graph = PassGraph::build(features).map_err(RenderError::from)?;

        let presenter = Presenter::new(
            swap_chain,
            FenceWaitPolicy {
                timeout: config.swap_acquire_timeout(),
                poll_interval: config.fence_poll_interval(),
            },
        );
        let extent = presenter.extent();
        let surfaces = if extent.is_empty() {
            None
        } else {
            let surfaces = FrameSurfaces::create(gpu, extent, &targets, config.downsample_mips)?;
            surfaces.register(&mut tracker);
            Some(surfaces)
        };

        let loader = SceneLoader::new(assets, TexturePrepLane::new(config.texture_worker_threads));
        log::info!(
            "RenderAgent: ready on '{}' ({}x{}, {:?}, {} slots)",
            device.adapter_name(),
            extent.width,
            extent.height,
            display_mode,
            ring.len()
        );

        Ok(Self {
            wait_policy: FenceWaitPolicy::from_config(&config),
            device,
            config,
            targets,
            ring,
            uploader,
            lanes,
            tracker,
            graph,
            presenter,
            loader,
            surfaces,
            ui: Box::new(NoOverlay),
            screenshots: ScreenshotCapture::default(),
            profiler: ProfilerHistory::new(PROFILER_HISTORY_FRAMES),
            previous_view_proj: None,
            previous_world: Vec::new(),
            animation_time: 0.0,
            last_stats: None,
            frames_rendered: 0,
        })
    }

    /// Replaces the UI drawn over the final image.
    pub fn set_ui_overlay(&mut self, ui: Box<dyn UiOverlay>) {
        self.ui = ui;
    }

    /// Starts the encoder thread screenshots are handed to.
    pub fn set_screenshot_sink(&mut self, sink: Box<dyn ScreenshotSink>) -> Result<(), FrameError> {
        self.screenshots.set_sink(sink)?;
        Ok(())
    }

    /// Captures the next rendered frame. Returns `false` without a sink.
    pub fn request_screenshot(&mut self) -> bool {
        self.screenshots.request()
    }

    /// Whether a screenshot waits for the next rendered frame.
    pub fn screenshot_pending(&self) -> bool {
        self.screenshots.is_requested()
    }

    /// Number of screenshots handed to the sink.
    pub fn screenshots_taken(&self) -> u64 {
        self.screenshots.captured()
    }

    /// Starts loading a scene. The following frames run one load stage each
    /// instead of rendering.
    pub fn load_scene(&mut self, path: impl Into<PathBuf>) -> Result<(), FrameError> {
        self.loader.request(path)?;
        Ok(())
    }

    /// Progress of the current or last load.
    pub fn progress(&self) -> LoadProgress {
        self.loader.progress()
    }

    /// Whether a complete scene is loaded and no load is running.
    pub fn ready_to_render(&self) -> bool {
        self.loader.ready_to_render()
    }

    /// The scene being rendered.
    pub fn scene(&self) -> Option<&LoadedScene> {
        self.loader.scene()
    }

    /// Statistics of the last rendered frame.
    pub fn last_stats(&self) -> Option<&FrameStats> {
        self.last_stats.as_ref()
    }

    /// Frames rendered since startup.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// CPU and GPU timings of recent frames.
    pub fn profiler(&self) -> &ProfilerHistory {
        &self.profiler
    }

    /// The frame slots.
    pub fn ring(&self) -> &TransientResourceRing {
        &self.ring
    }

    /// The TAA lane, for its history state.
    pub fn taa(&self) -> &TaaLane {
        self.lanes.post.taa()
    }

    /// Recorded surface states.
    pub fn tracker(&self) -> &SurfaceStateTracker {
        &self.tracker
    }

    /// The pass graph of the last frame.
    pub fn graph(&self) -> &PassGraph {
        &self.graph
    }

    /// The window-size surfaces, `None` while minimized.
    pub fn surfaces(&self) -> Option<&FrameSurfaces> {
        self.surfaces.as_ref()
    }

    /// The startup lanes.
    pub fn lanes(&self) -> &RenderLanes {
        &self.lanes
    }

    /// The current display mode.
    pub fn display_mode(&self) -> DisplayMode {
        self.presenter.display_mode()
    }

    /// Runs one frame.
    ///
    /// # Errors
    ///
    /// [`FrameError::SceneLoad`] leaves the previous scene in place and the
    /// agent usable. Any other error is fatal.
    pub fn render_frame(&mut self, state: &FrameState) -> Result<FrameOutcome, FrameError> {
        if self.loader.is_loading() {
            return self.advance_load();
        }
        if self.surfaces.is_none() {
            log::trace!("RenderAgent: minimized, frame skipped");
            return Ok(FrameOutcome::Skipped);
        }

        self.animation_time += state.delta_seconds.max(0.0);
        let animation_time = self.animation_time;
        if let Some(scene) = self.loader.scene_mut() {
            scene.description_mut().set_animation_time(animation_time);
        }
        self.refresh_graph(&state.settings)?;

        let device = Arc::clone(&self.device);
        let device = device.as_ref();
        let Self {
            ring,
            lanes,
            tracker,
            graph,
            presenter,
            loader,
            surfaces,
            ui,
            screenshots,
            profiler,
            previous_view_proj,
            previous_world,
            wait_policy,
            last_stats,
            frames_rendered,
            ..
        } = self;
        let Some(surfaces) = surfaces.as_ref() else {
            return Ok(FrameOutcome::Skipped);
        };
        let extent = surfaces.extent();

        let taa = if graph.contains(PassId::Taa) {
            Some(lanes.post.taa_mut().begin_frame(extent))
        } else {
            lanes.post.taa_mut().invalidate_history();
            None
        };

        let mut cpu = Vec::new();
        let slot = {
            let _timer = ScopedTimer::new("Acquire slot", &mut cpu);
            ring.acquire(device)?
        };
        if let Some(retired) = slot.take_retired_timestamps() {
            profiler.record_gpu(retired.frame_number, resolve_gpu_timestamps(&retired));
        }
        let frame_number = slot.frame_number();
        let slot_index = slot.index();

        let scene = loader.scene();
        let aspect = extent.width as f32 / extent.height.max(1) as f32;
        let camera = state
            .camera
            .or_else(|| {
                let camera = scene?.description().cameras().first()?;
                Some(CameraView::from_scene_camera(camera, aspect))
            })
            .unwrap_or_else(|| CameraView::fallback(aspect));

        let prepared = {
            let _timer = ScopedTimer::new("Prepare frame", &mut cpu);
            let prep = FramePrep {
                settings: &state.settings,
                camera,
                extent,
                display_mode: presenter.display_mode(),
                taa,
                previous_view_proj: *previous_view_proj,
                previous_world: previous_world.as_slice(),
                shadows: graph.contains(PassId::ShadowAtlas),
            };
            prepare_frame(device, slot, scene, &prep)?
        };
        let atlas = lanes.shadow.atlas().ok_or(RenderError::NotInitialized)?;
        let gpu_scene = scene.map(LoadedScene::gpu);

        let (scene_run, scene_token) = {
            let _timer = ScopedTimer::new("Record scene stream", &mut cpu);
            let mut encoder = slot.begin_stream(device, "Scene").map_err(RenderError::from)?;
            slot.write_timestamp(encoder.as_mut(), BEGIN_FRAME_LABEL);
            let mut ctx = PassContext {
                encoder: encoder.as_mut(),
                tracker: &mut *tracker,
                surfaces: surfaces.bindings(atlas, None),
                frame: &prepared.inputs,
                lanes: &*lanes,
                scene: gpu_scene,
                ui: &mut **ui,
                pass: "",
            };
            let run = graph.execute(CommandStream::Scene, &mut ctx, slot)?;
            (run, device.submit(encoder.finish())?)
        };

        let image = {
            let _timer = ScopedTimer::new("Acquire swap image", &mut cpu);
            presenter.acquire(device, tracker)
        };
        let image = match image {
            Ok(image) => image,
            Err(err) => {
                slot.mark_submitted(scene_token);
                return Err(err.into());
            }
        };

        let (present_run, capture, token) = {
            let _timer = ScopedTimer::new("Record present stream", &mut cpu);
            let mut encoder = slot.begin_stream(device, "Present").map_err(RenderError::from)?;
            let mut ctx = PassContext {
                encoder: encoder.as_mut(),
                tracker: &mut *tracker,
                surfaces: surfaces.bindings(atlas, Some(image.surface)),
                frame: &prepared.inputs,
                lanes: &*lanes,
                scene: gpu_scene,
                ui: &mut **ui,
                pass: "",
            };
            let run = graph.execute(CommandStream::Present, &mut ctx, slot)?;
            let capture = if screenshots.is_requested() {
                Some(screenshots.record(
                    device,
                    encoder.as_mut(),
                    tracker,
                    image.surface,
                    presenter.extent(),
                    presenter.format(),
                    frame_number,
                )?)
            } else {
                None
            };
            slot.write_timestamp(encoder.as_mut(), END_FRAME_LABEL);
            (run, capture, device.submit(encoder.finish())?)
        };
        slot.mark_submitted(token);
        presenter.present(image, token)?;

        if let Some(capture) = capture {
            screenshots.complete(device, capture, token, wait_policy)?;
        }
        if taa.is_some() {
            lanes.post.taa_mut().rotate_history();
        }
        *previous_view_proj = Some(prepared.view_proj);
        *previous_world = prepared.world_transforms;
        profiler.record_cpu(frame_number, cpu);

        let stats = FrameStats {
            frame_number,
            slot: slot_index,
            passes: scene_run.passes.len() + present_run.passes.len(),
            draw_calls: scene_run.draws + present_run.draws,
            dispatches: scene_run.dispatches + present_run.dispatches,
            triangles: prepared.triangles,
            shadow_casters: prepared.inputs.shadow_views.len(),
            transitions: tracker.take_log().len(),
            token,
        };
        log::trace!(
            "RenderAgent: frame {} on slot {}: {} passes, {} draws, token {}",
            frame_number,
            slot_index,
            stats.passes,
            stats.draw_calls,
            token.0
        );
        *last_stats = Some(stats);
        *frames_rendered += 1;
        Ok(FrameOutcome::Rendered(stats))
    }

    fn advance_load(&mut self) -> Result<FrameOutcome, FrameError> {
        let next = self
            .loader
            .advance(self.device.as_ref(), &mut self.uploader, &self.targets)?;
        let progress = self.loader.progress();
        if next != LoadStage::Idle {
            return Ok(FrameOutcome::Loading(progress));
        }
        // A new scene: nothing from the previous frames carries over.
        self.lanes.post.taa_mut().invalidate_history();
        self.previous_view_proj = None;
        self.previous_world.clear();
        self.animation_time = 0.0;
        Ok(FrameOutcome::SceneReady(progress))
    }

    fn refresh_graph(&mut self, settings: &RenderSettings) -> Result<(), RenderError> {
        let features = PassFeatures::new(
            settings,
            self.targets.sample_count,
            self.presenter.display_mode(),
        );
        if features != self.graph.features() {
            self.graph = PassGraph::build(features)?;
            log::debug!("RenderAgent: pass graph rebuilt for {features:?}");
        }
        Ok(())
    }

    /// Recreates the window-size surfaces and the swap images at `extent`.
    ///
    /// An empty extent means the window was minimized: the surfaces are
    /// destroyed and frames are skipped until the next non-empty resize.
    pub fn resize(&mut self, extent: Extent2D) -> Result<(), FrameError> {
        if self.surfaces.as_ref().map(FrameSurfaces::extent) == Some(extent) {
            return Ok(());
        }
        let device = self.device.as_ref();
        device.wait_idle()?;
        if let Some(surfaces) = self.surfaces.take() {
            surfaces.destroy(device, &mut self.tracker);
        }
        if extent.is_empty() {
            log::info!("RenderAgent: minimized, rendering paused");
            return Ok(());
        }

        self.presenter.resize(extent, &mut self.tracker)?;
        let surfaces =
            FrameSurfaces::create(device, extent, &self.targets, self.config.downsample_mips)?;
        surfaces.register(&mut self.tracker);
        self.surfaces = Some(surfaces);
        self.lanes.post.taa_mut().invalidate_history();
        log::info!("RenderAgent: resized to {}x{}", extent.width, extent.height);
        Ok(())
    }

    /// Switches the output mode and rebuilds the pipelines targeting the
    /// swap chain.
    pub fn set_display_mode(&mut self, mode: DisplayMode) -> Result<(), FrameError> {
        if mode == self.presenter.display_mode() {
            return Ok(());
        }
        let device = self.device.as_ref();
        device.wait_idle()?;
        self.presenter.set_display_mode(mode, &mut self.tracker)?;
        self.targets = TargetFormats::new(mode, self.config.msaa_samples);
        self.lanes.on_display_mode_changed(device, &self.targets)?;
        Ok(())
    }

    /// Waits for the GPU and releases everything, scene first.
    pub fn shutdown(mut self) -> Result<(), FrameError> {
        let device = Arc::clone(&self.device);
        let device = device.as_ref();
        device.wait_idle()?;

        self.loader.unload(device, &mut self.uploader)?;
        if let Some(surfaces) = self.surfaces.take() {
            surfaces.destroy(device, &mut self.tracker);
        }
        self.lanes.on_gpu_shutdown(device);
        self.screenshots.shutdown(device);
        self.ring.destroy(device).map_err(RenderError::from)?;
        self.uploader.destroy(device)?;
        log::info!(
            "RenderAgent: shut down after {} frames ({} presented)",
            self.frames_rendered,
            self.presenter.presented()
        );
        Ok(())
    }
}
