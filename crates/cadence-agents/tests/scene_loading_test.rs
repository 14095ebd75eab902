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

use cadence_agents::{FrameError, FrameOutcome, FrameState, LoadStage, RenderAgent, SceneLoadError};
use cadence_core::config::RendererConfig;
use cadence_core::renderer::{DisplayMode, Extent2D};
use cadence_infra::{
    showcase_scene, HeadlessDevice, HeadlessSwapChain, ShowcaseOptions, StaticSceneLoader,
};
use std::path::Path;
use std::sync::Arc;

const SHOWCASE: &str = "scenes/showcase.json";
const SMALL: &str = "scenes/small.json";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn create_agent(device: &HeadlessDevice) -> RenderAgent {
    let swap_chain =
        HeadlessSwapChain::new(device.clone(), Extent2D::new(64, 64), 3, DisplayMode::Sdr).unwrap();
    let small = ShowcaseOptions {
        opaque_objects: 2,
        transparent_objects: 0,
        shadow_lights: 1,
        point_lights: 0,
        skinned: false,
        ..ShowcaseOptions::default()
    };
    let assets = StaticSceneLoader::new()
        .with_scene(SHOWCASE, showcase_scene(&ShowcaseOptions::default()))
        .with_scene(SMALL, showcase_scene(&small));
    RenderAgent::new(
        Arc::new(device.clone()),
        Box::new(swap_chain),
        Arc::new(assets),
        RendererConfig::default(),
    )
    .unwrap()
}

/// Drives a requested load to the end and returns the completed-stage counts
/// reported along the way.
fn finish_load(agent: &mut RenderAgent) -> Vec<u32> {
    let mut completed = Vec::new();
    loop {
        match agent.render_frame(&FrameState::default()).unwrap() {
            FrameOutcome::Loading(progress) => completed.push(progress.completed),
            FrameOutcome::SceneReady(progress) => {
                completed.push(progress.completed);
                return completed;
            }
            other => panic!("unexpected outcome while loading: {other:?}"),
        }
    }
}

#[test]
fn test_one_stage_runs_per_frame_and_nothing_is_presented() {
    init_logging();
    let device = HeadlessDevice::default();
    let mut agent = create_agent(&device);
    agent.load_scene(SHOWCASE).unwrap();
    assert_eq!(agent.progress().stage, LoadStage::TextureAndBufferSetup);
    assert!(!agent.ready_to_render());

    let completed = finish_load(&mut agent);
    assert_eq!(completed, vec![1, 2, 3, 4, 5, 6, 7]);
    assert!(device.presents().is_empty());
    assert!(agent.ready_to_render());
    assert_eq!(agent.progress().stage, LoadStage::Idle);
    assert_eq!(agent.frames_rendered(), 0);

    let scene = agent.scene().unwrap();
    assert_eq!(scene.path(), Path::new(SHOWCASE));
    let counts = scene.gpu().counts();
    assert_eq!(counts.meshes, 1);
    assert_eq!(counts.textures, 1);
    assert_eq!(counts.materials, 2);

    assert!(matches!(
        agent.render_frame(&FrameState::default()).unwrap(),
        FrameOutcome::Rendered(_)
    ));
    assert_eq!(device.presents().len(), 1);
    assert!(device.validation_errors().is_empty());
}

#[test]
fn test_a_second_request_during_a_load_is_refused() {
    init_logging();
    let device = HeadlessDevice::default();
    let mut agent = create_agent(&device);
    agent.load_scene(SHOWCASE).unwrap();
    agent.render_frame(&FrameState::default()).unwrap();

    let err = agent.load_scene(SMALL).unwrap_err();
    assert!(matches!(err, FrameError::SceneLoad(SceneLoadError::Busy(_))));
    finish_load(&mut agent);
    assert_eq!(agent.scene().unwrap().path(), Path::new(SHOWCASE));
}

#[test]
fn test_switching_scenes_releases_the_previous_one() {
    init_logging();
    let device = HeadlessDevice::default();
    let mut agent = create_agent(&device);
    agent.load_scene(SHOWCASE).unwrap();
    finish_load(&mut agent);
    for _ in 0..3 {
        agent.render_frame(&FrameState::default()).unwrap();
    }
    let with_showcase = device.live_resource_counts();

    agent.load_scene(SMALL).unwrap();
    // Published only once the load finishes.
    assert_eq!(agent.scene().unwrap().path(), Path::new(SHOWCASE));
    finish_load(&mut agent);
    assert_eq!(agent.scene().unwrap().path(), Path::new(SMALL));
    assert!(!agent.taa().history_valid());

    agent.load_scene(SHOWCASE).unwrap();
    finish_load(&mut agent);
    for _ in 0..3 {
        agent.render_frame(&FrameState::default()).unwrap();
    }
    assert_eq!(device.live_resource_counts(), with_showcase);
    assert!(device.validation_errors().is_empty());
    assert!(device.hazards().is_empty());
}

#[test]
fn test_a_failed_load_keeps_the_current_scene() {
    init_logging();
    let device = HeadlessDevice::default();
    let mut agent = create_agent(&device);
    agent.load_scene(SMALL).unwrap();
    finish_load(&mut agent);
    agent.render_frame(&FrameState::default()).unwrap();
    let before = device.live_resource_counts();

    agent.load_scene("scenes/missing.json").unwrap();
    let err = agent.render_frame(&FrameState::default()).unwrap_err();
    assert!(
        matches!(err, FrameError::SceneLoad(SceneLoadError::Asset { .. })),
        "unexpected error: {err}"
    );
    assert_eq!(agent.progress().stage, LoadStage::Idle);
    assert!(agent.ready_to_render());
    assert_eq!(agent.scene().unwrap().path(), Path::new(SMALL));
    assert_eq!(device.live_resource_counts(), before);

    let outcome = agent.render_frame(&FrameState::default()).unwrap();
    assert!(matches!(outcome, FrameOutcome::Rendered(_)));
}

#[test]
fn test_loading_continues_while_minimized() {
    init_logging();
    let device = HeadlessDevice::default();
    let mut agent = create_agent(&device);
    agent.resize(Extent2D::new(0, 0)).unwrap();
    agent.load_scene(SMALL).unwrap();

    let completed = finish_load(&mut agent);
    assert_eq!(completed.last(), Some(&LoadStage::TOTAL));
    assert!(matches!(
        agent.render_frame(&FrameState::default()).unwrap(),
        FrameOutcome::Skipped
    ));

    agent.resize(Extent2D::new(64, 64)).unwrap();
    assert!(matches!(
        agent.render_frame(&FrameState::default()).unwrap(),
        FrameOutcome::Rendered(_)
    ));
}
