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

//! In-memory scene sources.

mod showcase;

pub use self::showcase::{showcase_scene, ShowcaseOptions};

use cadence_core::scene::{AssetError, AssetLoader, SceneDescription, StaticScene};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Serves pre-built [`StaticScene`]s by path.
#[derive(Debug, Default, Clone)]
pub struct StaticSceneLoader {
    scenes: HashMap<PathBuf, StaticScene>,
    latency: Duration,
}

impl StaticSceneLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a scene under `path`.
    pub fn with_scene(mut self, path: impl Into<PathBuf>, scene: StaticScene) -> Self {
        self.insert(path, scene);
        self
    }

    /// Registers a scene under `path`, replacing any previous one.
    pub fn insert(&mut self, path: impl Into<PathBuf>, scene: StaticScene) {
        self.scenes.insert(path.into(), scene);
    }

    /// Makes every load sleep, standing in for file parsing.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl AssetLoader for StaticSceneLoader {
    fn load(&self, path: &Path) -> Result<Box<dyn SceneDescription>, AssetError> {
        let scene = self.scenes.get(path).ok_or_else(|| AssetError::AssetNotFound {
            path: path.to_path_buf(),
        })?;
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        scene.validate()?;
        log::debug!(
            "StaticSceneLoader: '{}' -> {} objects, {} lights",
            path.display(),
            scene.objects().len(),
            scene.lights().len()
        );
        Ok(Box::new(scene.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::scene::{MaterialData, SceneObject};
    use glam::Mat4;

    #[test]
    fn test_unknown_path_is_asset_not_found() {
        let loader = StaticSceneLoader::new();
        let err = loader.load(Path::new("missing.gltf")).err().unwrap();
        assert!(matches!(err, AssetError::AssetNotFound { path } if path == Path::new("missing.gltf")));
    }

    #[test]
    fn test_malformed_scene_is_rejected() {
        let mut scene = StaticScene::new("broken");
        scene.add_material(MaterialData::default());
        scene.add_object(
            SceneObject {
                name: "orphan".into(),
                mesh: 0,
                material: 0,
                skin: None,
            },
            Mat4::IDENTITY,
        );
        let loader = StaticSceneLoader::new().with_scene("broken.gltf", scene);
        let err = loader.load(Path::new("broken.gltf")).err().unwrap();
        assert!(matches!(err, AssetError::Malformed { .. }));
    }

    #[test]
    fn test_registered_scene_loads() {
        let loader =
            StaticSceneLoader::new().with_scene("showcase.gltf", showcase_scene(&ShowcaseOptions::default()));
        let scene = loader.load(Path::new("showcase.gltf")).unwrap();
        assert_eq!(scene.objects().len(), ShowcaseOptions::default().object_count());
    }
}
