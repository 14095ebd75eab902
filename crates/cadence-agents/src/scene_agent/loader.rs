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

//! The staged scene loader.

use super::stage::{LoadProgress, LoadStage};
use cadence_core::renderer::{GraphicsDevice, RenderError, StagingUploader};
use cadence_core::scene::{AssetError, AssetLoader, SceneDescription};
use cadence_lanes::{GpuScene, PreparedTexture, TargetFormats, TexturePrepError, TexturePrepLane};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while loading a scene. The loader is back to idle, with the
/// previous scene untouched, whenever one of these is returned.
#[derive(Debug, Error)]
pub enum SceneLoadError {
    /// The asset loader could not produce a description.
    #[error("Failed to load scene '{}': {source}", .path.display())]
    Asset {
        /// The requested path.
        path: PathBuf,
        /// The loader's error.
        #[source]
        source: AssetError,
    },
    /// A texture could not be prepared.
    #[error("Failed to prepare scene textures: {0}")]
    Textures(#[from] TexturePrepError),
    /// A stage failed on the GPU side.
    #[error("Load stage '{}' failed: {source}", .stage.label())]
    Stage {
        /// The failing stage.
        stage: LoadStage,
        /// The device error.
        #[source]
        source: RenderError,
    },
    /// A load was requested while another one runs.
    #[error("A load of '{}' is already in progress", .0.display())]
    Busy(PathBuf),
}

/// A scene that finished loading and may be rendered.
pub struct LoadedScene {
    path: PathBuf,
    description: Box<dyn SceneDescription>,
    gpu: GpuScene,
}

impl LoadedScene {
    /// The path it was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The CPU-side description.
    pub fn description(&self) -> &dyn SceneDescription {
        self.description.as_ref()
    }

    /// The CPU-side description, for sampling animations.
    pub fn description_mut(&mut self) -> &mut dyn SceneDescription {
        self.description.as_mut()
    }

    /// The GPU resources.
    pub fn gpu(&self) -> &GpuScene {
        &self.gpu
    }
}

impl fmt::Debug for LoadedScene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedScene")
            .field("path", &self.path)
            .field("objects", &self.description.objects().len())
            .field("gpu", &self.gpu.counts())
            .finish()
    }
}

/// What a load in progress has built so far.
struct PendingLoad {
    path: PathBuf,
    description: Option<Box<dyn SceneDescription>>,
    gpu: GpuScene,
    prepared: Vec<PreparedTexture>,
}

/// Builds a scene's GPU resources one stage per call, so frames keep
/// flowing while a scene loads.
///
/// The scene being built is never visible: [`SceneLoader::scene`] keeps
/// returning the previously loaded one until the final stage publishes the
/// new scene. A failing stage rolls the partial scene back and leaves the
/// previous one in place.
pub struct SceneLoader {
    // Produces the CPU-side descriptions.
    assets: Arc<dyn AssetLoader>,
    // Mip generation on worker threads.
    textures: TexturePrepLane,
    // Whether the motion vector stage runs.
    motion_vectors: bool,
    // Cursor: the stage the next `advance` executes.
    stage: LoadStage,
    // Ordinal of the last completed stage of the current load.
    completed: u32,
    pending: Option<PendingLoad>,
    current: Option<LoadedScene>,
    loads_completed: u64,
}

impl fmt::Debug for SceneLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneLoader")
            .field("stage", &self.stage)
            .field("pending", &self.pending.as_ref().map(|p| &p.path))
            .field("current", &self.current)
            .field("loads_completed", &self.loads_completed)
            .finish()
    }
}

impl SceneLoader {
    /// Creates an idle loader.
    pub fn new(assets: Arc<dyn AssetLoader>, textures: TexturePrepLane) -> Self {
        Self {
            assets,
            textures,
            motion_vectors: true,
            stage: LoadStage::Idle,
            completed: 0,
            pending: None,
            current: None,
            loads_completed: 0,
        }
    }

    /// Enables or disables the motion vector stage.
    pub fn with_motion_vectors(mut self, enabled: bool) -> Self {
        self.motion_vectors = enabled;
        self
    }

    /// Starts loading `path`. The first stage runs on the next
    /// [`SceneLoader::advance`].
    pub fn request(&mut self, path: impl Into<PathBuf>) -> Result<(), SceneLoadError> {
        if let Some(pending) = &self.pending {
            return Err(SceneLoadError::Busy(pending.path.clone()));
        }
        let path = path.into();
        log::info!("SceneLoader: loading '{}'", path.display());
        self.pending = Some(PendingLoad {
            path,
            description: None,
            gpu: GpuScene::default(),
            prepared: Vec::new(),
        });
        self.stage = LoadStage::TextureAndBufferSetup;
        self.completed = 0;
        Ok(())
    }

    /// Whether a load is in progress.
    pub fn is_loading(&self) -> bool {
        self.stage != LoadStage::Idle
    }

    /// The stage the next [`SceneLoader::advance`] executes.
    pub fn stage(&self) -> LoadStage {
        self.stage
    }

    /// Progress of the current load.
    pub fn progress(&self) -> LoadProgress {
        LoadProgress {
            stage: self.stage,
            completed: self.completed,
            total: LoadStage::TOTAL,
        }
    }

    /// Whether a complete scene is available and no load is running.
    pub fn ready_to_render(&self) -> bool {
        !self.is_loading() && self.current.is_some()
    }

    /// The published scene.
    pub fn scene(&self) -> Option<&LoadedScene> {
        self.current.as_ref()
    }

    /// The published scene, mutably.
    pub fn scene_mut(&mut self) -> Option<&mut LoadedScene> {
        self.current.as_mut()
    }

    /// Number of loads that reached the final stage.
    pub fn loads_completed(&self) -> u64 {
        self.loads_completed
    }

    /// Executes the current stage and returns the next one.
    ///
    /// Returns [`LoadStage::Idle`] without doing anything when no load is in
    /// progress, and after the terminal stage published the scene.
    pub fn advance(
        &mut self,
        device: &dyn GraphicsDevice,
        uploader: &mut StagingUploader,
        targets: &TargetFormats,
    ) -> Result<LoadStage, SceneLoadError> {
        let stage = self.stage;
        let Some(pending) = self.pending.as_mut() else {
            self.stage = LoadStage::Idle;
            return Ok(LoadStage::Idle);
        };
        if stage == LoadStage::Idle {
            return Ok(LoadStage::Idle);
        }

        log::info!("SceneLoader: {stage} begin");
        let result = Self::run_stage(
            stage,
            pending,
            self.assets.as_ref(),
            &self.textures,
            device,
            uploader,
            targets,
        )
        .and_then(|()| {
            if stage == LoadStage::FinalFlush {
                self.publish(device)
            } else {
                Ok(())
            }
        });

        if let Err(err) = result {
            log::error!("SceneLoader: {stage} failed: {err}");
            self.rollback(device, uploader);
            return Err(err);
        }

        self.completed = stage.ordinal();
        self.stage = stage.next(self.motion_vectors);
        log::info!("SceneLoader: {stage} done");
        Ok(self.stage)
    }

    fn run_stage(
        stage: LoadStage,
        pending: &mut PendingLoad,
        assets: &dyn AssetLoader,
        textures: &TexturePrepLane,
        device: &dyn GraphicsDevice,
        uploader: &mut StagingUploader,
        targets: &TargetFormats,
    ) -> Result<(), SceneLoadError> {
        let failed = |source: RenderError| SceneLoadError::Stage { stage, source };
        match stage {
            LoadStage::Idle => {}
            LoadStage::TextureAndBufferSetup => {
                let description =
                    assets
                        .load(&pending.path)
                        .map_err(|source| SceneLoadError::Asset {
                            path: pending.path.clone(),
                            source,
                        })?;
                for mesh in description.meshes() {
                    pending
                        .gpu
                        .create_mesh(device, uploader, mesh)
                        .map_err(failed)?;
                }
                pending.prepared = textures.prepare(description.textures())?;
                pending.description = Some(description);
            }
            LoadStage::TextureUpload => {
                for texture in std::mem::take(&mut pending.prepared) {
                    pending
                        .gpu
                        .create_texture(device, uploader, &texture)
                        .map_err(failed)?;
                }
                let description = pending.description.as_deref().ok_or_else(|| {
                    failed(RenderError::Internal("scene description missing".to_string()))
                })?;
                for material in description.materials() {
                    pending.gpu.create_material(material).map_err(failed)?;
                }
                uploader.flush_and_wait(device).map_err(failed)?;
            }
            LoadStage::DepthPassBuild => {
                pending.gpu.build_depth_pipeline(device, targets).map_err(failed)?;
            }
            LoadStage::MotionVectorPassBuild => {
                pending
                    .gpu
                    .build_motion_vector_pipeline(device, targets)
                    .map_err(failed)?;
            }
            LoadStage::PbrPassBuild => {
                pending.gpu.build_pbr_pipelines(device, targets).map_err(failed)?;
            }
            LoadStage::BoundingBoxPassBuild => {
                pending
                    .gpu
                    .build_wireframe_pipeline(device, targets)
                    .map_err(failed)?;
            }
            LoadStage::FinalFlush => {
                uploader.flush_and_wait(device).map_err(failed)?;
                uploader.release_scratch(device).map_err(failed)?;
            }
        }
        Ok(())
    }

    /// Replaces the current scene with the finished one, releasing the old
    /// scene once the GPU no longer uses it.
    fn publish(&mut self, device: &dyn GraphicsDevice) -> Result<(), SceneLoadError> {
        let failed = |source: RenderError| SceneLoadError::Stage {
            stage: LoadStage::FinalFlush,
            source,
        };
        let Some(pending) = self.pending.take() else {
            return Err(failed(RenderError::Internal("no load in progress".to_string())));
        };
        let Some(mut description) = pending.description else {
            self.pending = None;
            return Err(failed(RenderError::Internal(
                "scene description missing".to_string(),
            )));
        };
        if let Some(mut previous) = self.current.take() {
            if let Err(err) = device.wait_idle() {
                // Keep the previous scene; rollback releases the new one.
                self.current = Some(previous);
                self.pending = Some(PendingLoad {
                    path: pending.path,
                    description: Some(description),
                    gpu: pending.gpu,
                    prepared: Vec::new(),
                });
                return Err(failed(err));
            }
            log::info!(
                "SceneLoader: releasing '{}'",
                previous.path.display()
            );
            previous.gpu.release(device);
        }

        description.set_animation_time(0.0);
        let counts = pending.gpu.counts();
        log::info!(
            "SceneLoader: '{}' ready ({} meshes, {} textures, {} materials, {} pipelines)",
            pending.path.display(),
            counts.meshes,
            counts.textures,
            counts.materials,
            counts.pipelines
        );
        self.current = Some(LoadedScene {
            path: pending.path,
            description,
            gpu: pending.gpu,
        });
        self.loads_completed += 1;
        Ok(())
    }

    /// Drops everything the failed load created.
    fn rollback(&mut self, device: &dyn GraphicsDevice, uploader: &mut StagingUploader) {
        if let Err(err) = device.wait_idle() {
            log::error!("SceneLoader: GPU did not go idle before rollback: {err}");
        }
        uploader.discard();
        if let Err(err) = uploader.release_scratch(device) {
            log::warn!("SceneLoader: Failed to release upload scratch: {err}");
        }
        if let Some(mut pending) = self.pending.take() {
            pending.gpu.release(device);
            log::warn!(
                "SceneLoader: rolled back '{}', keeping {}",
                pending.path.display(),
                self.current
                    .as_ref()
                    .map_or("no scene".to_string(), |scene| format!(
                        "'{}'",
                        scene.path.display()
                    ))
            );
        }
        self.stage = LoadStage::Idle;
        self.completed = 0;
    }

    /// Abandons any load in progress and releases the current scene. Waits
    /// for the GPU first.
    pub fn unload(
        &mut self,
        device: &dyn GraphicsDevice,
        uploader: &mut StagingUploader,
    ) -> Result<(), RenderError> {
        if self.pending.is_some() {
            self.rollback(device, uploader);
        }
        if let Some(mut scene) = self.current.take() {
            device.wait_idle()?;
            scene.gpu.release(device);
            log::info!("SceneLoader: unloaded '{}'", scene.path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::config::RendererConfig;
    use cadence_core::renderer::{DisplayMode, PipelineKind};
    use cadence_infra::{showcase_scene, HeadlessDevice, ShowcaseOptions, StaticSceneLoader};

    fn setup() -> (HeadlessDevice, StagingUploader, TargetFormats, SceneLoader) {
        let assets = StaticSceneLoader::new()
            .with_scene("showcase.gltf", showcase_scene(&ShowcaseOptions::default()));
        let loader = SceneLoader::new(Arc::new(assets), TexturePrepLane::new(2));
        (
            HeadlessDevice::default(),
            StagingUploader::new(&RendererConfig::default()),
            TargetFormats::new(DisplayMode::Sdr, 1),
            loader,
        )
    }

    const SCENE_PIPELINES: [PipelineKind; 5] = [
        PipelineKind::Depth,
        PipelineKind::MotionVectors,
        PipelineKind::PbrOpaque,
        PipelineKind::PbrTransparent,
        PipelineKind::Wireframe,
    ];

    fn built_pipelines(device: &HeadlessDevice) -> Vec<usize> {
        SCENE_PIPELINES
            .iter()
            .map(|&kind| device.pipelines_of_kind(kind).len())
            .collect()
    }

    /// Runs a whole load, returning the stages seen after each call.
    fn load_to_completion(
        device: &HeadlessDevice,
        uploader: &mut StagingUploader,
        targets: &TargetFormats,
        loader: &mut SceneLoader,
    ) -> Vec<u32> {
        loader.request("showcase.gltf").unwrap();
        let mut seen = vec![loader.stage().ordinal()];
        loop {
            let next = loader.advance(device, uploader, targets).unwrap();
            if next == LoadStage::Idle {
                return seen;
            }
            assert!(!loader.ready_to_render(), "half-built scene exposed");
            seen.push(next.ordinal());
        }
    }

    #[test]
    fn test_advance_runs_exactly_one_stage_per_call() {
        let (device, mut uploader, targets, mut loader) = setup();
        loader.request("showcase.gltf").unwrap();
        let start = device.live_resource_counts();

        // Texture and buffer setup: one mesh (vertex and index buffers) plus
        // the upload heap, nothing flushed yet.
        let next = loader.advance(&device, &mut uploader, &targets).unwrap();
        assert_eq!(next, LoadStage::TextureUpload);
        let setup_counts = device.live_resource_counts();
        assert_eq!(setup_counts.buffers, start.buffers + 3);
        assert_eq!(setup_counts.surfaces, start.surfaces);
        assert!(uploader.has_scratch());
        assert!(uploader.pending_copies() > 0);
        assert_eq!(built_pipelines(&device), vec![0, 0, 0, 0, 0]);

        // Texture upload: one sampled surface, copies flushed.
        let next = loader.advance(&device, &mut uploader, &targets).unwrap();
        assert_eq!(next, LoadStage::DepthPassBuild);
        let upload_counts = device.live_resource_counts();
        assert_eq!(upload_counts.surfaces, setup_counts.surfaces + 1);
        assert_eq!(upload_counts.buffers, setup_counts.buffers);
        assert_eq!(uploader.pending_copies(), 0);
        assert_eq!(uploader.flush_count(), 1);
        assert_eq!(built_pipelines(&device), vec![0, 0, 0, 0, 0]);

        let expected = [
            (LoadStage::MotionVectorPassBuild, vec![1, 0, 0, 0, 0]),
            (LoadStage::PbrPassBuild, vec![1, 1, 0, 0, 0]),
            (LoadStage::BoundingBoxPassBuild, vec![1, 1, 1, 1, 0]),
            (LoadStage::FinalFlush, vec![1, 1, 1, 1, 1]),
        ];
        for (stage, pipelines) in expected {
            let next = loader.advance(&device, &mut uploader, &targets).unwrap();
            assert_eq!(next, stage);
            assert_eq!(built_pipelines(&device), pipelines, "before {stage}");
            let counts = device.live_resource_counts();
            assert_eq!(counts.buffers, upload_counts.buffers);
            assert_eq!(counts.surfaces, upload_counts.surfaces);
            assert!(!loader.ready_to_render());
        }

        // Final flush: the upload heap goes away and the scene is published.
        let next = loader.advance(&device, &mut uploader, &targets).unwrap();
        assert_eq!(next, LoadStage::Idle);
        assert!(!uploader.has_scratch());
        assert_eq!(
            device.live_resource_counts().buffers,
            upload_counts.buffers - 1
        );
        assert_eq!(built_pipelines(&device), vec![1, 1, 1, 1, 1]);
        assert!(loader.ready_to_render());
        assert_eq!(loader.progress().completed, LoadStage::TOTAL);
        // Nothing was staged after the texture upload.
        assert_eq!(uploader.flush_count(), 1);
    }

    #[test]
    fn test_motion_vector_stage_is_skipped_when_disabled() {
        let (device, mut uploader, targets, loader) = setup();
        let mut loader = loader.with_motion_vectors(false);
        let seen = load_to_completion(&device, &mut uploader, &targets, &mut loader);
        assert_eq!(seen, vec![1, 2, 3, 5, 6, 7]);
        assert_eq!(built_pipelines(&device), vec![1, 0, 1, 1, 1]);
        assert_eq!(loader.scene().unwrap().gpu().counts().pipelines, 4);
        assert!(!uploader.has_scratch());
    }

    #[test]
    fn test_reloading_matches_a_reference_load() {
        let (reference_device, mut reference_uploader, targets, mut reference) = setup();
        let seen = load_to_completion(
            &reference_device,
            &mut reference_uploader,
            &targets,
            &mut reference,
        );
        assert_eq!(seen, vec![1, 2, 3, 4, 5, 6, 7]);
        let expected = reference.scene().unwrap().gpu().counts();
        let expected_resources = reference_device.live_resource_counts();

        // Load the same scene twice; the second load replaces the first.
        let (device, mut uploader, targets, mut loader) = setup();
        load_to_completion(&device, &mut uploader, &targets, &mut loader);
        load_to_completion(&device, &mut uploader, &targets, &mut loader);

        assert_eq!(loader.scene().unwrap().gpu().counts(), expected);
        assert_eq!(device.live_resource_counts(), expected_resources);
        assert_eq!(loader.loads_completed(), 2);
        assert_eq!(expected.meshes, 1);
        assert_eq!(expected.textures, 1);
        assert_eq!(expected.pipelines, 5);
    }

    #[test]
    fn test_advance_while_idle_does_nothing() {
        let (device, mut uploader, targets, mut loader) = setup();
        let before = device.live_resource_counts();
        for _ in 0..3 {
            assert_eq!(
                loader.advance(&device, &mut uploader, &targets).unwrap(),
                LoadStage::Idle
            );
        }
        assert_eq!(device.live_resource_counts(), before);
    }

    #[test]
    fn test_second_request_while_loading_is_busy() {
        let (_device, _uploader, _targets, mut loader) = setup();
        loader.request("showcase.gltf").unwrap();
        assert!(matches!(
            loader.request("other.gltf"),
            Err(SceneLoadError::Busy(path)) if path == Path::new("showcase.gltf")
        ));
    }

    #[test]
    fn test_missing_asset_returns_to_idle() {
        let (device, mut uploader, targets, mut loader) = setup();
        loader.request("missing.gltf").unwrap();
        let err = loader.advance(&device, &mut uploader, &targets).unwrap_err();
        assert!(matches!(
            err,
            SceneLoadError::Asset {
                source: AssetError::AssetNotFound { .. },
                ..
            }
        ));
        assert!(!loader.is_loading());
        assert!(loader.scene().is_none());
    }
}
