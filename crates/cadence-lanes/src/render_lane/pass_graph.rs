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

//! The fixed-order pass graph of a frame.
//!
//! Each pass is a [`PassDescriptor`]: a name (also its timestamp label), the
//! command stream it is recorded into, the surfaces it touches with the state
//! it needs them in, and the function recording it. The graph filters the
//! static tables by the frame's [`PassFeatures`], checks that the resulting
//! order never reads a surface nobody wrote, and then drives recording,
//! inserting every barrier on the way.
//!
//! ```text
//! Scene:   Clear -> Shadow maps -> Motion vectors -> Opaque -> Sky -> Transparent
//!          -> Bounding boxes -> Resolve MSAA -> Downsample -> Bloom -> TAA -> Sharpen
//! Present: Tone mapping -> UI -> Color conversion   (HDR display)
//!          Tone mapping -> UI                        (SDR display)
//! ```

use super::{
    debug_lane,
    geometry_lane::{self, DrawItem},
    gpu_scene::GpuScene,
    shadow_lane::{self, ShadowView},
    sky_lane,
    state_tracker::{Access, SurfaceStateTracker},
    surfaces::{SurfaceBindings, SurfaceSlot},
    RenderLanes,
};
use crate::postprocess_lane::POST_PROCESS_STAGES;
use cadence_core::config::RenderSettings;
use cadence_core::renderer::{
    BufferSlice, CommandEncoder, DisplayMode, FrameSlot, RenderError, ResourceState, StateError,
    UiOverlay,
};
use std::fmt;
use ResourceState::{Present, RenderTarget, ShaderReadable, TransferDst, TransferSrc};
use SurfaceSlot::{Depth, Hdr, MotionVectors, SceneColor, ShadowAtlas};

/// Identifies a pass of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassId {
    /// Clears scene color and depth.
    Clear,
    /// Renders shadow-casting lights into the atlas.
    ShadowAtlas,
    /// Writes per-pixel motion for TAA.
    MotionVectors,
    /// Opaque and alpha-tested geometry.
    Opaque,
    /// The sky dome behind the geometry.
    Sky,
    /// Alpha-blended geometry, back to front.
    Transparent,
    /// Bounding boxes and light frustums.
    DebugOverlay,
    /// Resolves the multisampled scene color into `Hdr`.
    MsaaResolve,
    /// Builds the downsample chain from `Hdr`.
    Downsample,
    /// Upsamples the chain back and adds it onto `Hdr`.
    Bloom,
    /// Temporal anti-aliasing resolve.
    Taa,
    /// Sharpens the TAA output into `Hdr` and the history.
    Sharpen,
    /// Tone maps `Hdr` in place for HDR displays.
    ToneMapInPlace,
    /// Draws the UI into `Hdr` for HDR displays.
    HdrUiComposite,
    /// Converts `Hdr` into the display color space.
    ColorConversion,
    /// Tone maps `Hdr` into the backbuffer for SDR displays.
    ToneMap,
    /// Draws the UI into the backbuffer for SDR displays.
    UiComposite,
}

/// The command stream a pass is recorded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandStream {
    /// Geometry and post-processing, recorded before the swap image is needed.
    Scene,
    /// Everything writing the swap image.
    Present,
}

/// Which optional passes a frame contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PassFeatures {
    /// Shadow atlas rendering.
    pub shadows: bool,
    /// Motion vectors, TAA and sharpen.
    pub taa: bool,
    /// Bounding boxes or light frustums.
    pub debug_overlay: bool,
    /// Multisampled geometry targets.
    pub msaa: bool,
    /// An HDR display mode.
    pub hdr_output: bool,
}

impl PassFeatures {
    /// Derives the features of a frame.
    pub fn new(settings: &RenderSettings, sample_count: u32, display_mode: DisplayMode) -> Self {
        Self {
            shadows: settings.shadows_enabled,
            taa: settings.use_taa,
            debug_overlay: settings.debug_overlay_enabled(),
            msaa: sample_count > 1,
            hdr_output: display_mode.is_hdr(),
        }
    }
}

/// One surface a pass touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceAccess {
    /// The surface role.
    pub slot: SurfaceSlot,
    /// How the pass uses it.
    pub access: Access,
    /// State required while the pass runs.
    pub state: ResourceState,
    /// State the pass leaves it in, when it differs from `state`.
    pub post: Option<ResourceState>,
}

impl SurfaceAccess {
    /// Reads `slot` in `state`.
    pub const fn read(slot: SurfaceSlot, state: ResourceState) -> Self {
        Self {
            slot,
            access: Access::Read,
            state,
            post: None,
        }
    }

    /// Overwrites `slot` in `state`.
    pub const fn write(slot: SurfaceSlot, state: ResourceState) -> Self {
        Self {
            slot,
            access: Access::Write,
            state,
            post: None,
        }
    }

    /// Reads and writes `slot` in `state`.
    pub const fn read_write(slot: SurfaceSlot, state: ResourceState) -> Self {
        Self {
            slot,
            access: Access::ReadWrite,
            state,
            post: None,
        }
    }

    /// Leaves the surface in `post` once the pass is recorded.
    pub const fn then(self, post: ResourceState) -> Self {
        Self {
            post: Some(post),
            ..self
        }
    }
}

/// What a pass recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassStats {
    /// Draw calls.
    pub draws: u32,
    /// Compute dispatches.
    pub dispatches: u32,
}

impl PassStats {
    /// Stats of a pass issuing `draws` draw calls.
    pub const fn drawn(draws: u32) -> Self {
        Self {
            draws,
            dispatches: 0,
        }
    }

    /// Stats of a pass issuing `dispatches` dispatches.
    pub const fn dispatched(dispatches: u32) -> Self {
        Self {
            draws: 0,
            dispatches,
        }
    }
}

/// What one stream of the graph recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphRun {
    /// Names of the executed passes, in order.
    pub passes: Vec<&'static str>,
    /// Draw calls of every pass.
    pub draws: u32,
    /// Dispatches of every pass.
    pub dispatches: u32,
}

/// Records one pass.
pub type RecordFn = fn(&mut PassContext<'_>) -> Result<PassStats, RenderError>;

/// Static description of a pass.
pub struct PassDescriptor {
    /// The pass.
    pub id: PassId,
    /// Debug group and timestamp label.
    pub name: &'static str,
    /// The stream it is recorded into.
    pub stream: CommandStream,
    /// Whether the frame's features include it.
    pub enabled: fn(&PassFeatures) -> bool,
    /// Every surface it touches.
    pub accesses: &'static [SurfaceAccess],
    /// Records its commands.
    pub record: RecordFn,
}

impl fmt::Debug for PassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassDescriptor")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("stream", &self.stream)
            .field("accesses", &self.accesses)
            .finish_non_exhaustive()
    }
}

/// Per-frame data prepared by the orchestrator before recording.
#[derive(Debug, Clone)]
pub struct FrameInputs {
    /// Settings of this frame.
    pub settings: RenderSettings,
    /// Current display mode.
    pub display_mode: DisplayMode,
    /// The frame's [`cadence_core::renderer::UniformFrame`].
    pub frame_uniforms: BufferSlice,
    /// The frame's [`cadence_core::renderer::PostUniforms`].
    pub post_uniforms: BufferSlice,
    /// Opaque and alpha-tested draws.
    pub opaque: Vec<DrawItem>,
    /// Blended draws, back to front.
    pub transparent: Vec<DrawItem>,
    /// Shadow-casting lights with their atlas quadrant.
    pub shadow_views: Vec<ShadowView>,
    /// Per-object transforms of the unit cube onto each bounding box.
    pub bounding_boxes: Vec<BufferSlice>,
    /// Per-light transforms of the unit cube onto each light frustum.
    pub light_frustums: Vec<BufferSlice>,
}

impl FrameInputs {
    /// Inputs of a frame drawing no geometry.
    pub fn new(
        settings: RenderSettings,
        display_mode: DisplayMode,
        frame_uniforms: BufferSlice,
        post_uniforms: BufferSlice,
    ) -> Self {
        Self {
            settings,
            display_mode,
            frame_uniforms,
            post_uniforms,
            opaque: Vec::new(),
            transparent: Vec::new(),
            shadow_views: Vec::new(),
            bounding_boxes: Vec::new(),
            light_frustums: Vec::new(),
        }
    }
}

/// Everything a pass records with.
pub struct PassContext<'a> {
    /// The stream being recorded.
    pub encoder: &'a mut dyn CommandEncoder,
    /// Surface states, for transitions inside a pass.
    pub tracker: &'a mut SurfaceStateTracker,
    /// The frame's surfaces.
    pub surfaces: SurfaceBindings<'a>,
    /// Per-frame inputs.
    pub frame: &'a FrameInputs,
    /// Startup lanes and their pipelines.
    pub lanes: &'a RenderLanes,
    /// The loaded scene, if any.
    pub scene: Option<&'a GpuScene>,
    /// The UI drawn over the final image.
    pub ui: &'a mut dyn UiOverlay,
    /// Name of the pass being recorded.
    pub pass: &'static str,
}

impl PassContext<'_> {
    /// Brings `surface` into `state` for a transition inside the current pass.
    pub fn require(
        &mut self,
        surface: cadence_core::renderer::SurfaceId,
        state: ResourceState,
        access: Access,
    ) -> Result<(), RenderError> {
        self.tracker
            .require(&mut *self.encoder, surface, state, access, self.pass)
            .map_err(RenderError::from)
    }
}

/// Passes of the scene stream that precede post-processing.
pub static GEOMETRY_PASSES: [PassDescriptor; 8] = [
    PassDescriptor {
        id: PassId::Clear,
        name: "Clear render targets",
        stream: CommandStream::Scene,
        enabled: |_| true,
        accesses: &[
            SurfaceAccess::write(SceneColor, RenderTarget),
            SurfaceAccess::write(Depth, RenderTarget),
        ],
        record: geometry_lane::record_clear,
    },
    PassDescriptor {
        id: PassId::ShadowAtlas,
        name: "Shadow maps",
        stream: CommandStream::Scene,
        enabled: |features| features.shadows,
        accesses: &[SurfaceAccess::write(ShadowAtlas, RenderTarget).then(ShaderReadable)],
        record: shadow_lane::record_shadow_atlas,
    },
    PassDescriptor {
        id: PassId::MotionVectors,
        name: "Motion vectors",
        stream: CommandStream::Scene,
        enabled: |features| features.taa,
        accesses: &[
            SurfaceAccess::write(MotionVectors, RenderTarget).then(ShaderReadable),
            SurfaceAccess::read_write(Depth, RenderTarget),
        ],
        record: geometry_lane::record_motion_vectors,
    },
    PassDescriptor {
        id: PassId::Opaque,
        name: "PBR Opaque",
        stream: CommandStream::Scene,
        enabled: |_| true,
        accesses: &[
            SurfaceAccess::read_write(SceneColor, RenderTarget),
            SurfaceAccess::read_write(Depth, RenderTarget),
            SurfaceAccess::read(ShadowAtlas, ShaderReadable),
        ],
        record: geometry_lane::record_opaque,
    },
    PassDescriptor {
        id: PassId::Sky,
        name: "Skydome",
        stream: CommandStream::Scene,
        enabled: |_| true,
        accesses: &[
            SurfaceAccess::read_write(SceneColor, RenderTarget),
            SurfaceAccess::read(Depth, RenderTarget),
        ],
        record: sky_lane::record_sky,
    },
    PassDescriptor {
        id: PassId::Transparent,
        name: "PBR Transparent",
        stream: CommandStream::Scene,
        enabled: |_| true,
        accesses: &[
            SurfaceAccess::read_write(SceneColor, RenderTarget),
            SurfaceAccess::read(Depth, RenderTarget),
            SurfaceAccess::read(ShadowAtlas, ShaderReadable),
        ],
        record: geometry_lane::record_transparent,
    },
    PassDescriptor {
        id: PassId::DebugOverlay,
        name: "Bounding boxes",
        stream: CommandStream::Scene,
        enabled: |features| features.debug_overlay,
        accesses: &[
            SurfaceAccess::read_write(SceneColor, RenderTarget),
            SurfaceAccess::read(Depth, RenderTarget),
        ],
        record: debug_lane::record_debug_overlay,
    },
    PassDescriptor {
        id: PassId::MsaaResolve,
        name: "Resolve MSAA",
        stream: CommandStream::Scene,
        enabled: |features| features.msaa,
        accesses: &[
            SurfaceAccess::read(SceneColor, TransferSrc),
            SurfaceAccess::write(Hdr, TransferDst),
        ],
        record: geometry_lane::record_msaa_resolve,
    },
];

/// The passes of a frame, in recording order.
#[derive(Debug, Clone)]
pub struct PassGraph {
    passes: Vec<&'static PassDescriptor>,
    features: PassFeatures,
}

impl PassGraph {
    /// Builds and validates the frame graph for `features`.
    pub fn build(features: PassFeatures) -> Result<Self, StateError> {
        Self::from_descriptors(
            GEOMETRY_PASSES.iter().chain(POST_PROCESS_STAGES.iter()),
            features,
        )
    }

    /// Builds and validates a graph from an explicit pass table.
    pub fn from_descriptors(
        descriptors: impl IntoIterator<Item = &'static PassDescriptor>,
        features: PassFeatures,
    ) -> Result<Self, StateError> {
        let passes = descriptors
            .into_iter()
            .filter(|pass| (pass.enabled)(&features))
            .collect();
        let graph = Self { passes, features };
        graph.validate()?;
        log::debug!(
            "PassGraph: {} passes for {:?}",
            graph.passes.len(),
            features
        );
        Ok(graph)
    }

    /// The features the graph was built for.
    pub fn features(&self) -> PassFeatures {
        self.features
    }

    /// Whether the graph contains `id`.
    pub fn contains(&self, id: PassId) -> bool {
        self.passes.iter().any(|pass| pass.id == id)
    }

    /// The passes of `stream`, in order.
    pub fn pass_ids(&self, stream: CommandStream) -> Vec<PassId> {
        self.passes_of(stream).map(|pass| pass.id).collect()
    }

    /// The names of the passes of `stream`, in order.
    pub fn pass_names(&self, stream: CommandStream) -> Vec<&'static str> {
        self.passes_of(stream).map(|pass| pass.name).collect()
    }

    fn passes_of(&self, stream: CommandStream) -> impl Iterator<Item = &'static PassDescriptor> + '_ {
        self.passes
            .iter()
            .copied()
            .filter(move |pass| pass.stream == stream)
    }

    /// Slots sharing one surface share one simulated state.
    fn alias(&self, slot: SurfaceSlot) -> SurfaceSlot {
        match slot {
            SurfaceSlot::SceneColor if !self.features.msaa => SurfaceSlot::Hdr,
            other => other,
        }
    }

    /// Simulates two consecutive frames over the slots' states.
    ///
    /// Every surface starts `Undecided` except the shadow atlas and the TAA
    /// history, and each frame gets a fresh backbuffer.
    ///
    /// # Errors
    ///
    /// - [`StateError::ConflictingAccess`] if a pass needs one surface in two
    ///   states.
    /// - [`StateError::ReadOfUndefinedContents`] if a pass reads a surface
    ///   before any pass wrote it.
    /// - [`StateError::StateMismatch`] if the backbuffer is not left
    ///   presentable.
    pub fn validate(&self) -> Result<(), StateError> {
        let mut states: ahash::AHashMap<SurfaceSlot, ResourceState> = ahash::AHashMap::new();
        states.insert(SurfaceSlot::ShadowAtlas, ShaderReadable);
        states.insert(SurfaceSlot::History, ShaderReadable);

        for pass in &self.passes {
            for (i, a) in pass.accesses.iter().enumerate() {
                let conflicting = pass.accesses[i + 1..]
                    .iter()
                    .any(|b| self.alias(a.slot) == self.alias(b.slot) && a.state != b.state);
                if conflicting {
                    return Err(StateError::ConflictingAccess {
                        pass: pass.name,
                        surface: a.slot.label().to_string(),
                    });
                }
            }
        }

        let writes_backbuffer = self
            .passes
            .iter()
            .any(|pass| pass.accesses.iter().any(|a| a.slot == SurfaceSlot::Backbuffer));

        for _frame in 0..2 {
            states.remove(&SurfaceSlot::Backbuffer);
            for pass in &self.passes {
                for access in pass.accesses {
                    let key = self.alias(access.slot);
                    let state = states.entry(key).or_default();
                    if access.access.reads() && *state == ResourceState::Undecided {
                        return Err(StateError::ReadOfUndefinedContents {
                            pass: pass.name,
                            surface: access.slot.label().to_string(),
                        });
                    }
                    *state = access.post.unwrap_or(access.state);
                }
            }
            if writes_backbuffer {
                let found = states
                    .get(&SurfaceSlot::Backbuffer)
                    .copied()
                    .unwrap_or_default();
                if found != Present {
                    return Err(StateError::StateMismatch {
                        surface: SurfaceSlot::Backbuffer.label().to_string(),
                        expected: Present,
                        found,
                    });
                }
            }
        }
        Ok(())
    }

    /// Records every pass of `stream`.
    ///
    /// Each pass gets a debug group named after it, and a timestamp with
    /// the same label once it is recorded. The declared states are required
    /// before the pass records, and surfaces with a post-state are moved there
    /// right after.
    pub fn execute(
        &self,
        stream: CommandStream,
        ctx: &mut PassContext<'_>,
        slot: &mut FrameSlot,
    ) -> Result<GraphRun, RenderError> {
        let mut run = GraphRun::default();
        for pass in self.passes_of(stream) {
            ctx.pass = pass.name;
            ctx.encoder.push_debug_group(pass.name);

            let bindings = ctx.surfaces;
            for access in pass.accesses {
                let surfaces = bindings.resolve(access.slot);
                if surfaces.is_empty() {
                    return Err(RenderError::Internal(format!(
                        "pass '{}' has no surface bound to {}",
                        pass.name,
                        access.slot.label()
                    )));
                }
                for &surface in surfaces {
                    ctx.require(surface, access.state, access.access)?;
                }
            }

            let stats = (pass.record)(ctx)?;

            for access in pass.accesses {
                if let Some(post) = access.post {
                    for &surface in bindings.resolve(access.slot) {
                        ctx.require(surface, post, Access::Write)?;
                    }
                }
            }

            slot.write_timestamp(&mut *ctx.encoder, pass.name);
            ctx.encoder.pop_debug_group();
            run.passes.push(pass.name);
            run.draws += stats.draws;
            run.dispatches += stats.dispatches;
        }
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::{composite_lane, FrameSurfaces, TargetFormats};
    use cadence_core::config::RendererConfig;
    use cadence_core::renderer::{
        BufferId, GraphicsDevice, NoOverlay, SurfaceId, TransientResourceRing,
    };
    use cadence_infra::HeadlessDevice;

    fn all_feature_sets() -> Vec<PassFeatures> {
        (0u8..32)
            .map(|bits| PassFeatures {
                shadows: bits & 1 != 0,
                taa: bits & 2 != 0,
                debug_overlay: bits & 4 != 0,
                msaa: bits & 8 != 0,
                hdr_output: bits & 16 != 0,
            })
            .collect()
    }

    #[test]
    fn test_every_feature_combination_validates() {
        for features in all_feature_sets() {
            let graph = PassGraph::build(features)
                .unwrap_or_else(|err| panic!("{features:?} failed: {err}"));
            assert_eq!(graph.contains(PassId::MsaaResolve), features.msaa);
            assert_eq!(graph.contains(PassId::ColorConversion), features.hdr_output);
            assert_eq!(graph.contains(PassId::ToneMap), !features.hdr_output);
        }
    }

    #[test]
    fn test_default_sdr_frame_order() {
        let features = PassFeatures {
            shadows: true,
            taa: true,
            ..PassFeatures::default()
        };
        let graph = PassGraph::build(features).unwrap();
        assert_eq!(
            graph.pass_ids(CommandStream::Scene),
            vec![
                PassId::Clear,
                PassId::ShadowAtlas,
                PassId::MotionVectors,
                PassId::Opaque,
                PassId::Sky,
                PassId::Transparent,
                PassId::Downsample,
                PassId::Bloom,
                PassId::Taa,
                PassId::Sharpen,
            ]
        );
        assert_eq!(
            graph.pass_ids(CommandStream::Present),
            vec![PassId::ToneMap, PassId::UiComposite]
        );
    }

    #[test]
    fn test_hdr_frame_composites_ui_before_color_conversion() {
        let features = PassFeatures {
            hdr_output: true,
            ..PassFeatures::default()
        };
        let graph = PassGraph::build(features).unwrap();
        assert_eq!(
            graph.pass_ids(CommandStream::Present),
            vec![
                PassId::ToneMapInPlace,
                PassId::HdrUiComposite,
                PassId::ColorConversion
            ]
        );
        assert_eq!(
            graph.pass_names(CommandStream::Present)[1],
            composite_lane::UI_PASS_NAME
        );
    }

    fn nothing(_: &mut PassContext<'_>) -> Result<PassStats, RenderError> {
        Ok(PassStats::default())
    }

    static READ_BEFORE_WRITE: [PassDescriptor; 1] = [PassDescriptor {
        id: PassId::Downsample,
        name: "Downsample",
        stream: CommandStream::Scene,
        enabled: |_| true,
        accesses: &[SurfaceAccess::read(SurfaceSlot::Hdr, ShaderReadable)],
        record: nothing,
    }];

    static CONFLICTING: [PassDescriptor; 1] = [PassDescriptor {
        id: PassId::Opaque,
        name: "Opaque",
        stream: CommandStream::Scene,
        enabled: |_| true,
        accesses: &[
            SurfaceAccess::write(SurfaceSlot::SceneColor, RenderTarget),
            SurfaceAccess::read(SurfaceSlot::Hdr, ShaderReadable),
        ],
        record: nothing,
    }];

    static UNPRESENTED: [PassDescriptor; 1] = [PassDescriptor {
        id: PassId::ToneMap,
        name: "Tone mapping",
        stream: CommandStream::Present,
        enabled: |_| true,
        accesses: &[SurfaceAccess::write(SurfaceSlot::Backbuffer, RenderTarget)],
        record: nothing,
    }];

    #[test]
    fn test_reading_before_writing_is_rejected_at_build() {
        let err = PassGraph::from_descriptors(&READ_BEFORE_WRITE, PassFeatures::default())
            .unwrap_err();
        assert_eq!(
            err,
            StateError::ReadOfUndefinedContents {
                pass: "Downsample",
                surface: "Hdr".to_string()
            }
        );
    }

    #[test]
    fn test_aliased_slots_with_different_states_conflict() {
        let err =
            PassGraph::from_descriptors(&CONFLICTING, PassFeatures::default()).unwrap_err();
        assert!(matches!(err, StateError::ConflictingAccess { pass: "Opaque", .. }));

        // With MSAA the two slots are distinct surfaces, but Hdr is never written.
        let msaa = PassFeatures {
            msaa: true,
            ..PassFeatures::default()
        };
        let err = PassGraph::from_descriptors(&CONFLICTING, msaa).unwrap_err();
        assert!(matches!(err, StateError::ReadOfUndefinedContents { .. }));
    }

    #[test]
    fn test_backbuffer_must_end_presentable() {
        let err =
            PassGraph::from_descriptors(&UNPRESENTED, PassFeatures::default()).unwrap_err();
        assert!(matches!(
            err,
            StateError::StateMismatch {
                expected: Present,
                found: RenderTarget,
                ..
            }
        ));
    }

    static CLEAR_THEN_SAMPLE: [PassDescriptor; 2] = [
        PassDescriptor {
            id: PassId::Clear,
            name: "Clear",
            stream: CommandStream::Scene,
            enabled: |_| true,
            accesses: &[SurfaceAccess::write(SurfaceSlot::Hdr, RenderTarget)],
            record: nothing,
        },
        PassDescriptor {
            id: PassId::Downsample,
            name: "Sample",
            stream: CommandStream::Scene,
            enabled: |_| true,
            accesses: &[
                SurfaceAccess::read(SurfaceSlot::Hdr, ShaderReadable),
                SurfaceAccess::write(SurfaceSlot::DownsampleChain, RenderTarget)
                    .then(ShaderReadable),
            ],
            record: nothing,
        },
    ];

    #[test]
    fn test_execute_inserts_barriers_groups_and_timestamps() {
        let device = HeadlessDevice::default();
        let config = RendererConfig::default();
        let targets = TargetFormats::new(DisplayMode::Sdr, 1);
        let surfaces =
            FrameSurfaces::create(&device, cadence_core::renderer::Extent2D::new(32, 32), &targets, 2)
                .unwrap();
        let mut tracker = SurfaceStateTracker::default();
        surfaces.register(&mut tracker);

        let mut ring = TransientResourceRing::new(&device, &config).unwrap();
        let slot = ring.acquire(&device).unwrap();
        let mut encoder = slot.begin_stream(&device, "Scene").unwrap();

        let slice = BufferSlice {
            buffer: BufferId(0),
            offset: 0,
            size: 0,
        };
        let inputs = FrameInputs::new(RenderSettings::default(), DisplayMode::Sdr, slice, slice);
        let lanes = RenderLanes::new(&config);
        let mut ui = NoOverlay;
        let graph =
            PassGraph::from_descriptors(&CLEAR_THEN_SAMPLE, PassFeatures::default()).unwrap();

        let run = {
            let mut ctx = PassContext {
                encoder: encoder.as_mut(),
                tracker: &mut tracker,
                surfaces: surfaces.bindings(SurfaceId(usize::MAX), None),
                frame: &inputs,
                lanes: &lanes,
                scene: None,
                ui: &mut ui,
                pass: "",
            };
            graph.execute(CommandStream::Scene, &mut ctx, slot).unwrap()
        };
        assert_eq!(run.passes, vec!["Clear", "Sample"]);

        let log = tracker.take_log();
        let hdr: Vec<_> = log.iter().filter(|t| t.surface == surfaces.hdr()).collect();
        assert_eq!(hdr.len(), 2);
        assert_eq!(hdr[0].after, RenderTarget);
        assert_eq!(hdr[1].before, RenderTarget);
        assert_eq!(hdr[1].after, ShaderReadable);
        for &mip in surfaces.downsample_mips() {
            assert_eq!(tracker.state(mip), Some(ShaderReadable));
        }

        let token = device.submit(encoder.finish()).unwrap();
        slot.mark_submitted(token);
        device.wait_idle().unwrap();
        let submitted = device.submissions();
        let stream = submitted.last().unwrap();
        assert_eq!(stream.debug_groups(), vec!["Clear", "Sample"]);
        assert!(device.validation_errors().is_empty());
    }
}
