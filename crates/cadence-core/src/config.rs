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

//! Renderer configuration and per-frame render settings.
//!
//! [`RendererConfig`] holds the capacities and limits fixed at startup (arena
//! sizes, timeouts, atlas resolution). [`RenderSettings`] holds the toggles that
//! may change every frame, typically driven by the UI.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Errors raised while loading or validating a [`RendererConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// A field holds a value outside its accepted range.
    Invalid {
        /// The name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
    /// The configuration document could not be parsed.
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid { field, reason } => {
                write!(f, "Invalid renderer configuration for '{field}': {reason}")
            }
            ConfigError::Parse(err) => write!(f, "Failed to parse renderer configuration: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err)
    }
}

/// Capacities and limits of the renderer, fixed for the lifetime of a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Size in bytes of the per-frame uniform arena owned by each frame slot.
    pub uniform_arena_bytes: u64,
    /// Maximum number of command streams a frame slot may record per frame.
    pub streams_per_slot: u32,
    /// Number of GPU timestamp queries available to each frame slot.
    pub timestamps_per_frame: u32,
    /// Size in bytes of the staging scratch used for asset uploads.
    pub upload_heap_bytes: u64,
    /// Hard limit for any single completion-token wait, in milliseconds.
    pub fence_timeout_ms: u64,
    /// Sleep between two completion-token polls, in microseconds.
    pub fence_poll_interval_us: u64,
    /// Edge length of the square shadow atlas; each quadrant holds one light.
    pub shadow_atlas_size: u32,
    /// Sample count of the scene color and depth targets (1 disables MSAA).
    pub msaa_samples: u32,
    /// Number of mip levels produced by the downsample pass and consumed by bloom.
    pub downsample_mips: u32,
    /// Worker threads used to prepare texture data during scene loading.
    pub texture_worker_threads: usize,
    /// Limit for acquiring a swap surface from the presenter, in milliseconds.
    pub swap_acquire_timeout_ms: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            uniform_arena_bytes: 4 * 1024 * 1024,
            streams_per_slot: 8,
            timestamps_per_frame: 64,
            upload_heap_bytes: 64 * 1024 * 1024,
            fence_timeout_ms: 5_000,
            fence_poll_interval_us: 200,
            shadow_atlas_size: 2048,
            msaa_samples: 1,
            downsample_mips: 6,
            texture_worker_threads: 4,
            swap_acquire_timeout_ms: 1_000,
        }
    }
}

impl RendererConfig {
    /// Parses a configuration from a JSON document. Missing fields take their
    /// default value. The result is validated before being returned.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: RendererConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every field against its accepted range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.into(),
            }
        }

        if self.uniform_arena_bytes < crate::renderer::api::common::MIN_UNIFORM_ALIGNMENT {
            return Err(invalid(
                "uniform_arena_bytes",
                "must hold at least one aligned uniform block",
            ));
        }
        if self.streams_per_slot < 2 {
            return Err(invalid(
                "streams_per_slot",
                "a frame records two command streams",
            ));
        }
        if self.timestamps_per_frame < 2 {
            return Err(invalid("timestamps_per_frame", "must be at least 2"));
        }
        if self.upload_heap_bytes == 0 {
            return Err(invalid("upload_heap_bytes", "must not be zero"));
        }
        if self.fence_timeout_ms == 0 {
            return Err(invalid("fence_timeout_ms", "must not be zero"));
        }
        if self.shadow_atlas_size < 2 || self.shadow_atlas_size % 2 != 0 {
            return Err(invalid(
                "shadow_atlas_size",
                format!("{} cannot be split into quadrants", self.shadow_atlas_size),
            ));
        }
        if !matches!(self.msaa_samples, 1 | 2 | 4 | 8) {
            return Err(invalid(
                "msaa_samples",
                format!("{} is not one of 1, 2, 4, 8", self.msaa_samples),
            ));
        }
        if !(1..=12).contains(&self.downsample_mips) {
            return Err(invalid("downsample_mips", "must be within 1..=12"));
        }
        if self.texture_worker_threads == 0 {
            return Err(invalid("texture_worker_threads", "must not be zero"));
        }
        Ok(())
    }

    /// The hard limit for completion-token waits.
    pub fn fence_timeout(&self) -> Duration {
        Duration::from_millis(self.fence_timeout_ms)
    }

    /// The interval between two completion-token polls.
    pub fn fence_poll_interval(&self) -> Duration {
        Duration::from_micros(self.fence_poll_interval_us)
    }

    /// The limit for acquiring a swap surface.
    pub fn swap_acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.swap_acquire_timeout_ms)
    }
}

/// The sky drawn behind the scene geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SkyKind {
    /// Samples a cube-map environment.
    #[default]
    CubeMap,
    /// Evaluates an analytic sky model.
    Procedural,
}

/// Tone-mapping operators, selectable by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ToneMapper {
    /// AMD's tone-mapping curve.
    #[default]
    Amd,
    /// The curve from the DX11 DSK samples.
    Dx11Dsk,
    /// Reinhard.
    Reinhard,
    /// Uncharted 2 filmic curve.
    Uncharted2,
    /// ACES fitted curve.
    Aces,
    /// No tone mapping; values are clamped.
    Passthrough,
}

impl ToneMapper {
    /// Every operator, ordered by index.
    pub const ALL: [ToneMapper; 6] = [
        ToneMapper::Amd,
        ToneMapper::Dx11Dsk,
        ToneMapper::Reinhard,
        ToneMapper::Uncharted2,
        ToneMapper::Aces,
        ToneMapper::Passthrough,
    ];

    /// Returns the operator for a UI index, or `None` if out of range.
    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Returns the index the shaders use to select this operator.
    pub fn index(self) -> u32 {
        self as u32
    }

    /// A human-readable name.
    pub fn label(self) -> &'static str {
        match self {
            ToneMapper::Amd => "AMD Tonemapper",
            ToneMapper::Dx11Dsk => "DX11DSK",
            ToneMapper::Reinhard => "Reinhard",
            ToneMapper::Uncharted2 => "Uncharted2Tonemap",
            ToneMapper::Aces => "ACES",
            ToneMapper::Passthrough => "No tonemapper",
        }
    }
}

/// Toggles and factors that may change from one frame to the next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Enables the motion-vector pass and temporal anti-aliasing.
    pub use_taa: bool,
    /// Enables the shadow-atlas pass.
    pub shadows_enabled: bool,
    /// The tone-mapping operator.
    pub tone_mapper: ToneMapper,
    /// Exposure applied before tone mapping.
    pub exposure: f32,
    /// Scale of image-based lighting.
    pub ibl_factor: f32,
    /// Scale of emissive material contributions.
    pub emissive_factor: f32,
    /// The sky drawn behind the scene.
    pub sky: SkyKind,
    /// Draws object bounding boxes in the debug overlay.
    pub draw_bounding_boxes: bool,
    /// Draws light frustums in the debug overlay.
    pub draw_light_frustums: bool,
    /// Renders opaque geometry as wireframe.
    pub wireframe: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            use_taa: true,
            shadows_enabled: true,
            tone_mapper: ToneMapper::Amd,
            exposure: 1.0,
            ibl_factor: 2.0,
            emissive_factor: 1.0,
            sky: SkyKind::CubeMap,
            draw_bounding_boxes: false,
            draw_light_frustums: false,
            wireframe: false,
        }
    }
}

impl RenderSettings {
    /// Whether the debug overlay pass has anything to draw.
    pub fn debug_overlay_enabled(&self) -> bool {
        self.draw_bounding_boxes || self.draw_light_frustums
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(RendererConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = RendererConfig::from_json_str(r#"{ "msaa_samples": 4 }"#).unwrap();
        assert_eq!(config.msaa_samples, 4);
        assert_eq!(config.streams_per_slot, RendererConfig::default().streams_per_slot);
    }

    #[test]
    fn test_invalid_sample_count_is_rejected() {
        let err = RendererConfig::from_json_str(r#"{ "msaa_samples": 3 }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "msaa_samples",
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_json_reports_parse_error() {
        let err = RendererConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_odd_atlas_size_is_rejected() {
        let config = RendererConfig {
            shadow_atlas_size: 1023,
            ..RendererConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tone_mapper_index_round_trips() {
        for mapper in ToneMapper::ALL {
            assert_eq!(ToneMapper::from_index(mapper.index()), Some(mapper));
        }
        assert_eq!(ToneMapper::from_index(6), None);
    }
}
