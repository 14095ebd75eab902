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

//! Per-surface resource state tracking.
//!
//! Every surface the frame touches is registered with the state it is in.
//! Before a pass runs, [`SurfaceStateTracker::require`] records the barrier
//! taking each surface from its recorded state to the one the pass needs, so
//! every barrier's `before` is by construction the `after` of the previous
//! one for that surface.

use ahash::AHashMap;
use cadence_core::renderer::{CommandEncoder, ResourceState, StateError, SurfaceBarrier, SurfaceId};

/// How a pass uses a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// Only reads the existing contents.
    Read,
    /// Overwrites the contents without reading them.
    Write,
    /// Reads the existing contents and writes over them.
    ReadWrite,
}

impl Access {
    /// Whether the existing contents are observed.
    pub const fn reads(&self) -> bool {
        matches!(self, Access::Read | Access::ReadWrite)
    }
}

/// One recorded transition, kept for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRecord {
    /// The surface.
    pub surface: SurfaceId,
    /// State before the barrier.
    pub before: ResourceState,
    /// State after the barrier.
    pub after: ResourceState,
    /// The pass that required it.
    pub pass: &'static str,
}

#[derive(Debug)]
struct TrackedSurface {
    label: String,
    state: ResourceState,
}

/// The last recorded state of every registered surface.
#[derive(Debug, Default)]
pub struct SurfaceStateTracker {
    surfaces: AHashMap<SurfaceId, TrackedSurface>,
    log: Vec<TransitionRecord>,
}

impl SurfaceStateTracker {
    /// Starts tracking `surface` in `state`. Replaces any previous entry.
    pub fn register(&mut self, surface: SurfaceId, label: impl Into<String>, state: ResourceState) {
        self.surfaces.insert(
            surface,
            TrackedSurface {
                label: label.into(),
                state,
            },
        );
    }

    /// Starts tracking `surface` unless it is already known.
    pub fn register_if_absent(
        &mut self,
        surface: SurfaceId,
        label: impl FnOnce() -> String,
        state: ResourceState,
    ) -> bool {
        if self.surfaces.contains_key(&surface) {
            return false;
        }
        self.register(surface, label(), state);
        true
    }

    /// Stops tracking `surface`.
    pub fn forget(&mut self, surface: SurfaceId) {
        self.surfaces.remove(&surface);
    }

    /// The recorded state of `surface`.
    pub fn state(&self, surface: SurfaceId) -> Option<ResourceState> {
        self.surfaces.get(&surface).map(|tracked| tracked.state)
    }

    /// The diagnostic label of `surface`.
    pub fn label(&self, surface: SurfaceId) -> Option<&str> {
        self.surfaces.get(&surface).map(|tracked| tracked.label.as_str())
    }

    /// Number of tracked surfaces.
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    /// Brings `surface` into `required` for `pass`, recording a barrier if its
    /// state differs.
    ///
    /// # Errors
    ///
    /// - [`StateError::UnknownSurface`] if the surface was never registered.
    /// - [`StateError::ReadOfUndefinedContents`] if `access` reads a surface
    ///   that is still `Undecided`.
    pub fn require(
        &mut self,
        encoder: &mut dyn CommandEncoder,
        surface: SurfaceId,
        required: ResourceState,
        access: Access,
        pass: &'static str,
    ) -> Result<(), StateError> {
        let tracked = self
            .surfaces
            .get_mut(&surface)
            .ok_or(StateError::UnknownSurface { pass, surface })?;

        if access.reads() && tracked.state == ResourceState::Undecided {
            return Err(StateError::ReadOfUndefinedContents {
                pass,
                surface: tracked.label.clone(),
            });
        }

        if tracked.state != required {
            let barrier = SurfaceBarrier {
                surface,
                before: tracked.state,
                after: required,
            };
            encoder.transition(barrier);
            log::trace!(
                "SurfaceStateTracker: '{}' {} -> {} for '{}'",
                tracked.label,
                barrier.before.label(),
                barrier.after.label(),
                pass
            );
            tracked.state = required;
            self.log.push(TransitionRecord {
                surface,
                before: barrier.before,
                after: barrier.after,
                pass,
            });
        }
        Ok(())
    }

    /// Checks that `surface` is in `expected` without recording anything.
    pub fn expect(&self, surface: SurfaceId, expected: ResourceState) -> Result<(), StateError> {
        let tracked = self
            .surfaces
            .get(&surface)
            .ok_or(StateError::UnknownSurface {
                pass: "expect",
                surface,
            })?;
        if tracked.state != expected {
            return Err(StateError::StateMismatch {
                surface: tracked.label.clone(),
                expected,
                found: tracked.state,
            });
        }
        Ok(())
    }

    /// Transitions recorded since the last [`SurfaceStateTracker::take_log`].
    pub fn log(&self) -> &[TransitionRecord] {
        &self.log
    }

    /// Returns and clears the transition log.
    pub fn take_log(&mut self) -> Vec<TransitionRecord> {
        std::mem::take(&mut self.log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::renderer::GraphicsDevice;
    use cadence_infra::HeadlessDevice;

    #[test]
    fn test_reading_an_undecided_surface_is_rejected() {
        let device = HeadlessDevice::default();
        let mut encoder = device.create_command_encoder(Some("test"));
        let mut tracker = SurfaceStateTracker::default();
        tracker.register(SurfaceId(1), "Hdr", ResourceState::Undecided);

        let err = tracker
            .require(
                encoder.as_mut(),
                SurfaceId(1),
                ResourceState::ShaderReadable,
                Access::Read,
                "Downsample",
            )
            .unwrap_err();
        assert_eq!(
            err,
            StateError::ReadOfUndefinedContents {
                pass: "Downsample",
                surface: "Hdr".to_string()
            }
        );
        assert!(tracker.log().is_empty());
    }

    #[test]
    fn test_consecutive_barriers_chain_their_states() {
        let device = HeadlessDevice::default();
        let mut encoder = device.create_command_encoder(Some("test"));
        let mut tracker = SurfaceStateTracker::default();
        let surface = SurfaceId(7);
        tracker.register(surface, "Hdr", ResourceState::Undecided);

        let steps = [
            (ResourceState::RenderTarget, Access::Write),
            (ResourceState::RenderTarget, Access::ReadWrite),
            (ResourceState::ShaderReadable, Access::Read),
            (ResourceState::UnorderedAccess, Access::ReadWrite),
            (ResourceState::RenderTarget, Access::Write),
        ];
        for (state, access) in steps {
            tracker
                .require(encoder.as_mut(), surface, state, access, "step")
                .unwrap();
        }

        let log = tracker.take_log();
        // The second step needs no barrier.
        assert_eq!(log.len(), 4);
        assert_eq!(log[0].before, ResourceState::Undecided);
        for pair in log.windows(2) {
            assert_eq!(pair[0].after, pair[1].before);
        }
        assert_eq!(tracker.state(surface), Some(ResourceState::RenderTarget));
        assert!(tracker.log().is_empty());
    }

    #[test]
    fn test_unknown_surfaces_and_mismatches_are_reported() {
        let device = HeadlessDevice::default();
        let mut encoder = device.create_command_encoder(Some("test"));
        let mut tracker = SurfaceStateTracker::default();

        let err = tracker
            .require(
                encoder.as_mut(),
                SurfaceId(3),
                ResourceState::RenderTarget,
                Access::Write,
                "Clear",
            )
            .unwrap_err();
        assert!(matches!(err, StateError::UnknownSurface { pass: "Clear", .. }));

        tracker.register(SurfaceId(3), "Swap image 0", ResourceState::RenderTarget);
        let err = tracker
            .expect(SurfaceId(3), ResourceState::Present)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "'Swap image 0' is render-target but present is required"
        );
    }

    #[test]
    fn test_register_if_absent_keeps_the_known_state() {
        let mut tracker = SurfaceStateTracker::default();
        assert!(tracker.register_if_absent(SurfaceId(1), || "a".into(), ResourceState::Undecided));
        tracker.register(SurfaceId(1), "a", ResourceState::Present);
        assert!(!tracker.register_if_absent(SurfaceId(1), || "a".into(), ResourceState::Undecided));
        assert_eq!(tracker.state(SurfaceId(1)), Some(ResourceState::Present));
        tracker.forget(SurfaceId(1));
        assert_eq!(tracker.len(), 0);
    }
}
