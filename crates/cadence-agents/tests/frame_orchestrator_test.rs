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

use cadence_agents::{FrameError, FrameOutcome, FrameState, FrameStats, RenderAgent};
use cadence_core::config::RendererConfig;
use cadence_core::renderer::{
    CompletionToken, DisplayMode, Extent2D, GraphicsDevice, RenderError, SwapChain, SwapImage,
    TextureFormat,
};
use cadence_infra::{
    showcase_scene, HeadlessDevice, HeadlessSwapChain, MemoryScreenshotSink, ShowcaseOptions,
    StaticSceneLoader,
};
use cadence_lanes::{CommandStream, PassId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SCENE: &str = "scenes/showcase.json";
const EXTENT: Extent2D = Extent2D {
    width: 64,
    height: 48,
};
const SWAP_IMAGES: usize = 3;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn create_agent(
    device: &HeadlessDevice,
    mode: DisplayMode,
    options: &ShowcaseOptions,
    config: RendererConfig,
) -> RenderAgent {
    let swap_chain = HeadlessSwapChain::new(device.clone(), EXTENT, SWAP_IMAGES, mode).unwrap();
    let assets = StaticSceneLoader::new().with_scene(SCENE, showcase_scene(options));
    RenderAgent::new(
        Arc::new(device.clone()),
        Box::new(swap_chain),
        Arc::new(assets),
        config,
    )
    .unwrap()
}

/// Runs frames until the requested scene is published.
fn load_showcase(agent: &mut RenderAgent) {
    agent.load_scene(SCENE).unwrap();
    loop {
        match agent.render_frame(&FrameState::default()).unwrap() {
            FrameOutcome::Loading(_) => continue,
            FrameOutcome::SceneReady(_) => break,
            other => panic!("unexpected outcome while loading: {other:?}"),
        }
    }
}

fn render(agent: &mut RenderAgent, state: &FrameState) -> FrameStats {
    match agent.render_frame(state).unwrap() {
        FrameOutcome::Rendered(stats) => stats,
        other => panic!("expected a rendered frame, got {other:?}"),
    }
}

fn assert_clean(device: &HeadlessDevice) {
    assert!(
        device.validation_errors().is_empty(),
        "validation errors: {:#?}",
        device.validation_errors()
    );
    assert!(device.hazards().is_empty(), "hazards: {:#?}", device.hazards());
}

#[test]
fn test_showcase_frames_present_without_validation_errors() {
    init_logging();
    let device = HeadlessDevice::default();
    let options = ShowcaseOptions::default();
    let mut agent = create_agent(&device, DisplayMode::Sdr, &options, RendererConfig::default());
    load_showcase(&mut agent);

    let mut tokens = Vec::new();
    for _ in 0..6 {
        let stats = render(&mut agent, &FrameState::default());
        assert_eq!(stats.triangles, options.object_count() as u64 * 12);
        assert!(stats.draw_calls > 0);
        tokens.push(stats.token);
    }

    assert_clean(&device);
    let presents = device.presents();
    assert_eq!(presents.len(), 6);
    for (present, token) in presents.iter().zip(&tokens) {
        assert_eq!(present.after, *token);
    }
    assert_eq!(agent.frames_rendered(), 6);
}

#[test]
fn test_frames_without_a_scene_still_reach_the_display() {
    init_logging();
    let device = HeadlessDevice::default();
    let mut agent = create_agent(
        &device,
        DisplayMode::Sdr,
        &ShowcaseOptions::empty(),
        RendererConfig::default(),
    );

    let stats = render(&mut agent, &FrameState::default());
    assert_eq!(stats.triangles, 0);
    assert_eq!(stats.shadow_casters, 0);
    assert!(stats.transitions > 0);
    assert_eq!(device.presents().len(), 1);
    assert_clean(&device);
}

#[test]
fn test_an_empty_scene_runs_every_pass_with_no_scene_draws() {
    init_logging();
    let device = HeadlessDevice::default();
    let mut agent = create_agent(
        &device,
        DisplayMode::Sdr,
        &ShowcaseOptions::empty(),
        RendererConfig::default(),
    );
    load_showcase(&mut agent);
    let stats = render(&mut agent, &FrameState::default());

    let scene_passes = agent.graph().pass_names(CommandStream::Scene);
    let present_passes = agent.graph().pass_names(CommandStream::Present);
    assert_eq!(stats.passes, scene_passes.len() + present_passes.len());
    for pass in ["Clear render targets", "PBR Opaque", "PBR Transparent"] {
        assert!(scene_passes.contains(&pass), "{pass} missing");
    }
    assert_eq!(present_passes, vec!["Tone mapping", "ImGUI Rendering"]);
    assert_eq!(stats.triangles, 0);
    assert_clean(&device);
}

#[test]
fn test_slots_are_reused_in_ring_order_behind_a_lagging_gpu() {
    init_logging();
    let device = HeadlessDevice::with_latency(2);
    let mut agent = create_agent(
        &device,
        DisplayMode::Sdr,
        &ShowcaseOptions::default(),
        RendererConfig::default(),
    );
    load_showcase(&mut agent);

    let slots: Vec<usize> = (0..7)
        .map(|_| render(&mut agent, &FrameState::default()).slot)
        .collect();
    assert_eq!(slots, vec![0, 1, 2, 0, 1, 2, 0]);
    assert_clean(&device);
}

#[test]
fn test_a_stalled_gpu_times_out_instead_of_reusing_a_slot() {
    init_logging();
    let device = HeadlessDevice::default();
    let config = RendererConfig {
        fence_timeout_ms: 20,
        ..RendererConfig::default()
    };
    let mut agent = create_agent(&device, DisplayMode::Sdr, &ShowcaseOptions::empty(), config);

    device.set_stalled(true);
    for _ in 0..3 {
        render(&mut agent, &FrameState::default());
    }
    let err = agent.render_frame(&FrameState::default()).unwrap_err();
    assert!(
        matches!(err, FrameError::Render(RenderError::FenceTimeout { .. })),
        "unexpected error: {err}"
    );

    device.set_stalled(false);
    assert_eq!(render(&mut agent, &FrameState::default()).slot, 0);
    assert_clean(&device);
    agent.shutdown().unwrap();
}

#[test]
fn test_minimizing_skips_frames_until_restored() {
    init_logging();
    let device = HeadlessDevice::default();
    let mut agent = create_agent(
        &device,
        DisplayMode::Sdr,
        &ShowcaseOptions::default(),
        RendererConfig::default(),
    );
    load_showcase(&mut agent);
    render(&mut agent, &FrameState::default());

    agent.resize(Extent2D::new(0, 0)).unwrap();
    assert!(agent.surfaces().is_none());
    let presented = device.presents().len();
    for _ in 0..3 {
        assert!(matches!(
            agent.render_frame(&FrameState::default()).unwrap(),
            FrameOutcome::Skipped
        ));
    }
    assert_eq!(device.presents().len(), presented);

    let restored = Extent2D::new(80, 60);
    agent.resize(restored).unwrap();
    assert_eq!(agent.surfaces().map(|s| s.extent()), Some(restored));
    render(&mut agent, &FrameState::default());
    assert_eq!(device.presents().len(), presented + 1);
    assert_clean(&device);
}

#[test]
fn test_resizing_discards_the_taa_history() {
    init_logging();
    let device = HeadlessDevice::default();
    let mut agent = create_agent(
        &device,
        DisplayMode::Sdr,
        &ShowcaseOptions::default(),
        RendererConfig::default(),
    );
    load_showcase(&mut agent);

    for _ in 0..4 {
        render(&mut agent, &FrameState::default());
    }
    assert!(agent.graph().contains(PassId::Taa));
    assert_eq!(agent.taa().rotations(), 4);
    assert!(agent.taa().history_valid());

    agent.resize(Extent2D::new(32, 32)).unwrap();
    assert!(!agent.taa().history_valid());
    render(&mut agent, &FrameState::default());
    assert_eq!(agent.taa().rotations(), 1);
}

#[test]
fn test_disabling_taa_and_shadows_rebuilds_the_graph() {
    init_logging();
    let device = HeadlessDevice::default();
    let mut agent = create_agent(
        &device,
        DisplayMode::Sdr,
        &ShowcaseOptions::default(),
        RendererConfig::default(),
    );
    load_showcase(&mut agent);

    let full = render(&mut agent, &FrameState::default());
    assert_eq!(full.shadow_casters, 2);

    let mut state = FrameState::default();
    state.settings.use_taa = false;
    state.settings.shadows_enabled = false;
    let reduced = render(&mut agent, &state);
    assert!(!agent.graph().contains(PassId::Taa));
    assert!(!agent.graph().contains(PassId::ShadowAtlas));
    assert_eq!(reduced.shadow_casters, 0);
    assert!(reduced.passes < full.passes);
    assert!(!agent.taa().history_valid());
    assert_clean(&device);
}

#[test]
fn test_debug_overlays_and_msaa_render_cleanly() {
    init_logging();
    let device = HeadlessDevice::default();
    let config = RendererConfig {
        msaa_samples: 4,
        ..RendererConfig::default()
    };
    let mut agent = create_agent(&device, DisplayMode::Sdr, &ShowcaseOptions::default(), config);
    load_showcase(&mut agent);

    let mut state = FrameState::default();
    state.settings.draw_bounding_boxes = true;
    state.settings.draw_light_frustums = true;
    for _ in 0..3 {
        render(&mut agent, &state);
    }
    assert!(agent.graph().contains(PassId::MsaaResolve));
    assert!(agent.graph().contains(PassId::DebugOverlay));
    assert_clean(&device);
}

#[test]
fn test_hdr_display_converts_color_after_the_ui() {
    init_logging();
    let device = HeadlessDevice::default();
    let mut agent = create_agent(
        &device,
        DisplayMode::Sdr,
        &ShowcaseOptions::default(),
        RendererConfig::default(),
    );
    load_showcase(&mut agent);
    render(&mut agent, &FrameState::default());
    assert!(agent.graph().contains(PassId::ToneMap));

    agent.set_display_mode(DisplayMode::Hdr10Pq).unwrap();
    assert_eq!(agent.display_mode(), DisplayMode::Hdr10Pq);
    for _ in 0..3 {
        render(&mut agent, &FrameState::default());
    }
    assert!(agent.graph().contains(PassId::ColorConversion));
    assert!(!agent.graph().contains(PassId::ToneMap));
    assert_clean(&device);
}

#[test]
fn test_screenshot_captures_the_presented_frame() {
    init_logging();
    let device = HeadlessDevice::default();
    let mut agent = create_agent(
        &device,
        DisplayMode::Sdr,
        &ShowcaseOptions::default(),
        RendererConfig::default(),
    );
    let sink = MemoryScreenshotSink::new();
    agent.set_screenshot_sink(Box::new(sink.clone())).unwrap();
    load_showcase(&mut agent);
    render(&mut agent, &FrameState::default());

    assert!(agent.request_screenshot());
    assert!(agent.screenshot_pending());
    let stats = render(&mut agent, &FrameState::default());
    assert!(!agent.screenshot_pending());
    assert_eq!(agent.screenshots_taken(), 1);
    render(&mut agent, &FrameState::default());
    assert_clean(&device);

    // Shutdown joins the encoder thread.
    agent.shutdown().unwrap();
    let images = sink.images();
    assert_eq!(images.len(), 1);
    let image = &images[0];
    assert_eq!(image.frame_number, stats.frame_number);
    assert_eq!(image.extent, EXTENT);
    assert_eq!(image.format, TextureFormat::Bgra8UnormSrgb);
    assert_eq!(image.bytes_per_row % 256, 0);
    assert_eq!(image.pixels[..4], (stats.token.0 as u32).to_le_bytes());
}

#[test]
fn test_screenshot_requests_without_a_sink_are_refused() {
    init_logging();
    let device = HeadlessDevice::default();
    let mut agent = create_agent(
        &device,
        DisplayMode::Sdr,
        &ShowcaseOptions::empty(),
        RendererConfig::default(),
    );
    assert!(!agent.request_screenshot());
    assert!(!agent.screenshot_pending());
}

#[test]
fn test_shutdown_releases_everything_but_the_swap_images() {
    init_logging();
    let device = HeadlessDevice::default();
    let mut agent = create_agent(
        &device,
        DisplayMode::Sdr,
        &ShowcaseOptions::default(),
        RendererConfig::default(),
    );
    load_showcase(&mut agent);
    for _ in 0..5 {
        render(&mut agent, &FrameState::default());
    }
    agent.shutdown().unwrap();

    let live = device.live_resource_counts();
    assert_eq!(live.surfaces, SWAP_IMAGES);
    assert_eq!(live.buffers, 0);
    assert_eq!(live.pipelines, 0);
    assert_eq!(live.query_sets, 0);
    assert_eq!(device.pending_submissions(), 0);
}

#[test]
fn test_cpu_and_gpu_timings_reach_the_profiler() {
    init_logging();
    let device = HeadlessDevice::default();
    let mut agent = create_agent(
        &device,
        DisplayMode::Sdr,
        &ShowcaseOptions::default(),
        RendererConfig::default(),
    );
    load_showcase(&mut agent);
    for _ in 0..6 {
        render(&mut agent, &FrameState::default());
    }

    let profiler = agent.profiler();
    assert!(!profiler.is_empty());
    let gpu = profiler.latest_gpu().expect("retired timestamps were resolved");
    assert!(gpu.gpu.iter().any(|sample| sample.label == "PBR Opaque"));
    let json = profiler.summary_json().unwrap();
    assert!(json.contains("Prepare frame"));
}

/// Counts presents into an image whose previous present had not completed
/// when the image was recorded into.
struct ReuseCheckingSwapChain {
    inner: HeadlessSwapChain,
    device: HeadlessDevice,
    last_present: Vec<Option<CompletionToken>>,
    early_reuses: Arc<AtomicUsize>,
}

impl SwapChain for ReuseCheckingSwapChain {
    fn acquire_next(&mut self, timeout: Duration) -> Result<SwapImage, RenderError> {
        self.inner.acquire_next(timeout)
    }

    fn present(&mut self, image: SwapImage, after: CompletionToken) -> Result<(), RenderError> {
        if let Some(previous) = self.last_present[image.index] {
            if !previous.is_reached_by(self.device.completed_token()) {
                self.early_reuses.fetch_add(1, Ordering::SeqCst);
            }
        }
        self.last_present[image.index] = Some(after);
        self.inner.present(image, after)
    }

    fn display_mode(&self) -> DisplayMode {
        self.inner.display_mode()
    }

    fn set_display_mode(&mut self, mode: DisplayMode) -> Result<(), RenderError> {
        self.inner.set_display_mode(mode)
    }

    fn format(&self) -> TextureFormat {
        self.inner.format()
    }

    fn extent(&self) -> Extent2D {
        self.inner.extent()
    }

    fn image_count(&self) -> usize {
        self.inner.image_count()
    }

    fn resize(&mut self, extent: Extent2D) -> Result<(), RenderError> {
        self.inner.resize(extent)
    }
}

#[test]
fn test_double_buffered_swap_images_wait_for_their_previous_present() {
    init_logging();
    let device = HeadlessDevice::with_latency(4);
    let early_reuses = Arc::new(AtomicUsize::new(0));
    let swap_chain = ReuseCheckingSwapChain {
        inner: HeadlessSwapChain::new(device.clone(), EXTENT, 2, DisplayMode::Sdr).unwrap(),
        device: device.clone(),
        last_present: vec![None; 2],
        early_reuses: Arc::clone(&early_reuses),
    };
    let assets = StaticSceneLoader::new()
        .with_scene(SCENE, showcase_scene(&ShowcaseOptions::default()));
    let mut agent = RenderAgent::new(
        Arc::new(device.clone()),
        Box::new(swap_chain),
        Arc::new(assets),
        RendererConfig::default(),
    )
    .unwrap();
    load_showcase(&mut agent);

    for _ in 0..8 {
        render(&mut agent, &FrameState::default());
    }
    assert_eq!(early_reuses.load(Ordering::SeqCst), 0);
    let images: Vec<_> = device.presents().iter().map(|p| p.image).collect();
    assert_eq!(images, vec![0, 1, 0, 1, 0, 1, 0, 1]);
    assert!(device.pending_submissions() > 0);
    assert_clean(&device);
    agent.shutdown().unwrap();
}
