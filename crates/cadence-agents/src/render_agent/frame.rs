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

//! What the driver hands to a frame, and what it gets back.

use crate::scene_agent::{LoadProgress, SceneLoadError};
use cadence_core::config::{ConfigError, RenderSettings};
use cadence_core::renderer::{CompletionToken, RenderError};
use cadence_core::scene::SceneCamera;
use glam::{Mat4, Vec3};
use thiserror::Error;

/// The camera a frame is rendered from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraView {
    /// World to view.
    pub view: Mat4,
    /// View to clip, without jitter.
    pub projection: Mat4,
    /// Eye position in world space.
    pub position: Vec3,
}

impl CameraView {
    /// A perspective camera at `eye` looking at `target`.
    pub fn look_at(eye: Vec3, target: Vec3, y_fov: f32, aspect: f32) -> Self {
        Self {
            view: Mat4::look_at_rh(eye, target, Vec3::Y),
            projection: Mat4::perspective_rh(y_fov, aspect, 0.1, 1000.0),
            position: eye,
        }
    }

    /// The view of a camera defined by the scene.
    pub fn from_scene_camera(camera: &SceneCamera, aspect: f32) -> Self {
        Self {
            view: camera.transform.inverse(),
            projection: Mat4::perspective_rh(camera.y_fov, aspect, camera.z_near, camera.z_far),
            position: camera.transform.w_axis.truncate(),
        }
    }

    /// Used when neither the driver nor the scene provides a camera.
    pub fn fallback(aspect: f32) -> Self {
        Self::look_at(
            Vec3::new(0.0, 2.0, 8.0),
            Vec3::ZERO,
            std::f32::consts::FRAC_PI_4,
            aspect,
        )
    }

    /// Projection times view.
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// Per-frame input from the driver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameState {
    /// Settings of this frame.
    pub settings: RenderSettings,
    /// The camera, or `None` for the scene's first camera.
    pub camera: Option<CameraView>,
    /// Seconds since the previous frame, advancing the scene's animation.
    pub delta_seconds: f32,
}

/// Counters of one rendered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// The ring's frame number.
    pub frame_number: u64,
    /// The ring slot that recorded it.
    pub slot: usize,
    /// Passes executed in both streams.
    pub passes: usize,
    /// Draw calls, UI included.
    pub draw_calls: u32,
    /// Compute dispatches.
    pub dispatches: u32,
    /// Triangles of the scene draws.
    pub triangles: u64,
    /// Lights rendered into the shadow atlas.
    pub shadow_casters: usize,
    /// State transitions recorded.
    pub transitions: usize,
    /// Token of the frame's last submission.
    pub token: CompletionToken,
}

/// What [`super::RenderAgent::render_frame`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameOutcome {
    /// A frame was recorded, submitted and presented.
    Rendered(FrameStats),
    /// Nothing to render into: the window is minimized.
    Skipped,
    /// One load stage ran instead of a frame.
    Loading(LoadProgress),
    /// The last load stage ran; the next frame renders the new scene.
    SceneReady(LoadProgress),
}

impl FrameOutcome {
    /// The statistics of a rendered frame.
    pub fn stats(&self) -> Option<&FrameStats> {
        match self {
            FrameOutcome::Rendered(stats) => Some(stats),
            _ => None,
        }
    }
}

/// Errors surfaced to the driver. All of them are fatal except scene load
/// failures, after which the previous scene keeps rendering.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The renderer configuration is invalid.
    #[error("Invalid renderer configuration: {0}")]
    Config(#[from] ConfigError),
    /// A device, resource or state error.
    #[error(transparent)]
    Render(#[from] RenderError),
    /// A scene failed to load.
    #[error(transparent)]
    SceneLoad(#[from] SceneLoadError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_scene_camera_view_inverts_its_transform() {
        let camera = SceneCamera {
            name: "Main".to_string(),
            transform: Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)),
            y_fov: 1.0,
            z_near: 0.1,
            z_far: 100.0,
        };
        let view = CameraView::from_scene_camera(&camera, 1.5);
        assert_eq!(view.position, Vec3::new(1.0, 2.0, 3.0));
        let eye = view.view.transform_point3(view.position);
        assert_relative_eq!(eye.length(), 0.0, epsilon = 1e-6);
    }
}
