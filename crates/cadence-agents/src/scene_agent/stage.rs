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

use std::fmt;

/// A step of the staged scene load. The ordinal is the progress reported to
/// the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum LoadStage {
    /// Nothing to do. Also the value returned once a load completes.
    #[default]
    Idle = 0,
    /// Parses the asset, creates the mesh buffers and prepares textures.
    TextureAndBufferSetup = 1,
    /// Creates and uploads the textures, then resolves materials.
    TextureUpload = 2,
    /// Builds the shadow depth pipeline.
    DepthPassBuild = 3,
    /// Builds the motion vector pipeline. Skipped when TAA is unavailable.
    MotionVectorPassBuild = 4,
    /// Builds the lit opaque and transparent pipelines.
    PbrPassBuild = 5,
    /// Builds the wireframe pipeline used by the debug overlay.
    BoundingBoxPassBuild = 6,
    /// Flushes the uploads, releases the scratch and publishes the scene.
    FinalFlush = 7,
}

impl LoadStage {
    /// Number of working stages.
    pub const TOTAL: u32 = 7;

    /// The stage's position, 0 for [`LoadStage::Idle`].
    pub const fn ordinal(self) -> u32 {
        self as u32
    }

    /// Display label.
    pub const fn label(self) -> &'static str {
        match self {
            LoadStage::Idle => "Idle",
            LoadStage::TextureAndBufferSetup => "Texture and buffer setup",
            LoadStage::TextureUpload => "Texture upload",
            LoadStage::DepthPassBuild => "Depth pass build",
            LoadStage::MotionVectorPassBuild => "Motion vector pass build",
            LoadStage::PbrPassBuild => "PBR pass build",
            LoadStage::BoundingBoxPassBuild => "Bounding box pass build",
            LoadStage::FinalFlush => "Final flush",
        }
    }

    /// The stage that follows this one. The terminal stage wraps to `Idle`.
    pub const fn next(self, motion_vectors: bool) -> LoadStage {
        match self {
            LoadStage::Idle => LoadStage::Idle,
            LoadStage::TextureAndBufferSetup => LoadStage::TextureUpload,
            LoadStage::TextureUpload => LoadStage::DepthPassBuild,
            LoadStage::DepthPassBuild if motion_vectors => LoadStage::MotionVectorPassBuild,
            LoadStage::DepthPassBuild | LoadStage::MotionVectorPassBuild => {
                LoadStage::PbrPassBuild
            }
            LoadStage::PbrPassBuild => LoadStage::BoundingBoxPassBuild,
            LoadStage::BoundingBoxPassBuild => LoadStage::FinalFlush,
            LoadStage::FinalFlush => LoadStage::Idle,
        }
    }
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}/{})", self.label(), self.ordinal(), Self::TOTAL)
    }
}

/// How far a load went, as reported to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadProgress {
    /// The stage that runs next, or `Idle` once done.
    pub stage: LoadStage,
    /// Ordinal of the last completed stage.
    pub completed: u32,
    /// Number of stages of a load.
    pub total: u32,
}

impl LoadProgress {
    /// Completion in `[0, 1]`.
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f32 / self.total as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn walk(motion_vectors: bool) -> Vec<u32> {
        let mut stage = LoadStage::TextureAndBufferSetup;
        let mut visited = Vec::new();
        while stage != LoadStage::Idle {
            visited.push(stage.ordinal());
            stage = stage.next(motion_vectors);
        }
        visited
    }

    #[test]
    fn test_stages_are_strictly_increasing_and_end_idle() {
        assert_eq!(walk(true), vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(walk(false), vec![1, 2, 3, 5, 6, 7]);
        assert_eq!(LoadStage::Idle.next(true), LoadStage::Idle);
    }

    #[test]
    fn test_display_shows_progress() {
        assert_eq!(LoadStage::PbrPassBuild.to_string(), "PBR pass build (5/7)");
    }
}
