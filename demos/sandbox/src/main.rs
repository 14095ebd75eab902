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

// Cadence Sandbox
// Drives the frame orchestrator against the headless backend

use anyhow::{Context, Result};
use cadence_agents::{FrameOutcome, FrameState, RenderAgent};
use cadence_core::config::RendererConfig;
use cadence_core::renderer::{DisplayMode, Extent2D};
use cadence_infra::{
    logging, showcase_scene, HeadlessDevice, HeadlessSwapChain, PpmScreenshotSink,
    ShowcaseOptions, StaticSceneLoader,
};
use std::process::ExitCode;
use std::sync::Arc;

const SCENE: &str = "scenes/showcase";
const WINDOW: Extent2D = Extent2D {
    width: 1280,
    height: 720,
};
const FRAMES: u64 = 240;

/// Reads the renderer configuration from the JSON file given as first
/// argument, or falls back to the defaults.
fn load_config() -> Result<RendererConfig> {
    let Some(path) = std::env::args().nth(1) else {
        return Ok(RendererConfig::default());
    };
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("reading config '{path}'"))?;
    let config = RendererConfig::from_json_str(&json)
        .with_context(|| format!("parsing config '{path}'"))?;
    log::info!("Sandbox: using config '{path}'");
    Ok(config)
}

/// Window events replayed by the sandbox, keyed by loop iteration.
fn apply_scripted_events(
    agent: &mut RenderAgent,
    state: &mut FrameState,
    iteration: u64,
) -> Result<()> {
    match iteration {
        60 => agent.resize(Extent2D::new(0, 0))?,
        70 => agent.resize(WINDOW)?,
        100 => agent.resize(Extent2D::new(960, 540))?,
        120 => {
            if !agent.request_screenshot() {
                log::warn!("Sandbox: screenshot refused");
            }
        }
        150 => {
            state.settings.draw_bounding_boxes = true;
            state.settings.draw_light_frustums = true;
        }
        180 => agent.set_display_mode(DisplayMode::Hdr10Pq)?,
        _ => {}
    }
    Ok(())
}

fn run() -> Result<()> {
    let config = load_config()?;
    let device = HeadlessDevice::default();
    let swap_chain = HeadlessSwapChain::new(device.clone(), WINDOW, 3, DisplayMode::Sdr)?;
    let assets = StaticSceneLoader::new()
        .with_scene(SCENE, showcase_scene(&ShowcaseOptions::default()));
    let mut agent = RenderAgent::new(
        Arc::new(device.clone()),
        Box::new(swap_chain),
        Arc::new(assets),
        config,
    )?;

    let output = std::env::temp_dir().join("cadence-sandbox");
    std::fs::create_dir_all(&output)
        .with_context(|| format!("creating '{}'", output.display()))?;
    agent.set_screenshot_sink(Box::new(PpmScreenshotSink::new(&output, "sandbox")))?;
    agent.load_scene(SCENE)?;

    let mut state = FrameState {
        delta_seconds: 1.0 / 60.0,
        ..FrameState::default()
    };
    for iteration in 0..FRAMES {
        apply_scripted_events(&mut agent, &mut state, iteration)?;
        match agent.render_frame(&state)? {
            FrameOutcome::Loading(progress) => {
                log::info!("Sandbox: loading, {:.0}%", progress.fraction() * 100.0);
            }
            FrameOutcome::SceneReady(_) => log::info!("Sandbox: scene ready"),
            FrameOutcome::Rendered(stats) if stats.frame_number % 60 == 0 => log::info!(
                "Sandbox: frame {} | {} passes | {} draws | {} triangles",
                stats.frame_number,
                stats.passes,
                stats.draw_calls,
                stats.triangles
            ),
            FrameOutcome::Rendered(_) | FrameOutcome::Skipped => {}
        }
    }

    println!("{}", agent.profiler().summary_json()?);
    let validation_errors = device.validation_errors();
    if !validation_errors.is_empty() {
        log::warn!(
            "Sandbox: {} validation errors, first: {}",
            validation_errors.len(),
            validation_errors[0]
        );
    }
    agent.shutdown()?;
    Ok(())
}

fn main() -> ExitCode {
    logging::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("Sandbox: {err:#}");
            ExitCode::FAILURE
        }
    }
}
