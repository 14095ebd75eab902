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

//! Pipeline descriptors.
//!
//! Shader authoring and compilation happen outside the orchestrator; a
//! pipeline is described by its role and the formats of the targets it draws
//! into, and the backend maps the role to its compiled programs.

use super::common::TextureFormat;

/// An opaque handle to a compiled render or compute pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineId(pub usize);

/// The role of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    /// Depth-only geometry, used for the shadow atlas.
    Depth,
    /// Screen-space motion vectors.
    MotionVectors,
    /// Physically based shading of opaque and masked geometry.
    PbrOpaque,
    /// Physically based shading of blended geometry.
    PbrTransparent,
    /// Line rendering for bounding boxes and light frustums.
    Wireframe,
    /// Cube-map sky dome.
    SkyDomeCube,
    /// Analytic sky dome.
    SkyDomeProcedural,
    /// One step of the downsample chain.
    Downsample,
    /// Additive composite of a bloom level.
    BloomComposite,
    /// Temporal anti-aliasing resolve (compute).
    Taa,
    /// Post-TAA sharpen that also writes history (compute).
    Sharpen,
    /// In-place tone mapping of the HDR target (compute).
    ToneMapCompute,
    /// Tone mapping into the present surface.
    ToneMapRaster,
    /// Conversion into the display color space.
    ColorConversion,
}

impl PipelineKind {
    /// Whether the pipeline runs in a compute pass.
    pub const fn is_compute(&self) -> bool {
        matches!(
            self,
            PipelineKind::Taa | PipelineKind::Sharpen | PipelineKind::ToneMapCompute
        )
    }
}

/// Color blending of a render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Overwrite.
    #[default]
    Opaque,
    /// Source-over alpha blending.
    AlphaBlend,
    /// Additive.
    Additive,
}

/// Describes a pipeline to create.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineDescriptor {
    /// A debug label.
    pub label: String,
    /// The role.
    pub kind: PipelineKind,
    /// Formats of the color targets.
    pub color_formats: Vec<TextureFormat>,
    /// Format of the depth target, if any.
    pub depth_format: Option<TextureFormat>,
    /// Samples per pixel of the targets.
    pub sample_count: u32,
    /// Color blending.
    pub blend: BlendMode,
    /// Preprocessor defines handed to the shader compiler.
    pub defines: Vec<(String, String)>,
}

impl PipelineDescriptor {
    /// Starts a descriptor with no targets, single-sampled and opaque.
    pub fn new(label: impl Into<String>, kind: PipelineKind) -> Self {
        Self {
            label: label.into(),
            kind,
            color_formats: Vec::new(),
            depth_format: None,
            sample_count: 1,
            blend: BlendMode::Opaque,
            defines: Vec::new(),
        }
    }

    /// Adds a color target.
    pub fn with_color(mut self, format: TextureFormat) -> Self {
        self.color_formats.push(format);
        self
    }

    /// Sets the depth target.
    pub fn with_depth(mut self, format: TextureFormat) -> Self {
        self.depth_format = Some(format);
        self
    }

    /// Sets the sample count.
    pub fn with_samples(mut self, sample_count: u32) -> Self {
        self.sample_count = sample_count;
        self
    }

    /// Sets the blend mode.
    pub fn with_blend(mut self, blend: BlendMode) -> Self {
        self.blend = blend;
        self
    }

    /// Adds a shader define.
    pub fn with_define(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defines.push((name.into(), value.into()));
        self
    }
}
