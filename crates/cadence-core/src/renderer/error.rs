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

//! Defines the error types used throughout the rendering contracts.
//!
//! Errors fall into four groups: resource errors (creation, lookup and
//! capacity), state errors (violated ordering invariants, always a programming
//! error), stalls (a completion token that never signals), and device loss.

use super::api::{
    resource::{ResourceState, SurfaceId},
    sync::CompletionToken,
};
use std::fmt;
use std::time::Duration;

/// An error related to the creation or use of a GPU resource (buffers, surfaces, etc.).
#[derive(Debug)]
pub enum ResourceError {
    /// A generic resource could not be found.
    NotFound,
    /// The handle or ID used to reference a resource is invalid.
    InvalidHandle,
    /// An error originating from the specific graphics backend implementation.
    BackendError(String),
    /// An attempt was made to access a resource out of its bounds (e.g., in a buffer).
    OutOfBounds,
    /// A fixed-capacity allocator ran out of space.
    CapacityExceeded {
        /// The allocator that overflowed.
        resource: &'static str,
        /// The number of bytes (or entries) needed to satisfy the request.
        requested: u64,
        /// The configured capacity.
        capacity: u64,
    },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::NotFound => write!(f, "Resource not found with ID."),
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle or ID."),
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
            ResourceError::OutOfBounds => {
                write!(f, "Resource access out of bounds.")
            }
            ResourceError::CapacityExceeded {
                resource,
                requested,
                capacity,
            } => write!(
                f,
                "Capacity of '{resource}' exceeded: {requested} requested, {capacity} available."
            ),
        }
    }
}

impl std::error::Error for ResourceError {}

/// A violated ordering invariant. These indicate a bug in pass ordering or
/// frame sequencing and are never recoverable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// A pass read a surface whose contents are undefined.
    ReadOfUndefinedContents {
        /// The pass that performed the read.
        pass: &'static str,
        /// A description of the surface.
        surface: String,
    },
    /// A pass declared two different states for the same surface.
    ConflictingAccess {
        /// The offending pass.
        pass: &'static str,
        /// A description of the surface.
        surface: String,
    },
    /// A pass referenced a surface the state tracker does not know about.
    UnknownSurface {
        /// The offending pass.
        pass: &'static str,
        /// The unknown surface.
        surface: SurfaceId,
    },
    /// A surface was handed over in a state other than the one required.
    StateMismatch {
        /// A description of the surface.
        surface: String,
        /// The state the consumer requires.
        expected: ResourceState,
        /// The state the surface is in.
        found: ResourceState,
    },
    /// A frame slot was acquired again before its previous frame was submitted.
    SlotStillRecording {
        /// The index of the slot.
        slot: usize,
    },
    /// Upload scratch was released while copies were still pending.
    PendingUploads {
        /// The number of copies not yet flushed.
        copies: usize,
    },
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::ReadOfUndefinedContents { pass, surface } => {
                write!(f, "Pass '{pass}' reads '{surface}' before anything wrote it")
            }
            StateError::ConflictingAccess { pass, surface } => {
                write!(f, "Pass '{pass}' declares conflicting states for '{surface}'")
            }
            StateError::UnknownSurface { pass, surface } => {
                write!(f, "Pass '{pass}' uses untracked surface {surface:?}")
            }
            StateError::StateMismatch {
                surface,
                expected,
                found,
            } => write!(
                f,
                "'{surface}' is {} but {} is required",
                found.label(),
                expected.label()
            ),
            StateError::SlotStillRecording { slot } => {
                write!(f, "Frame slot {slot} was re-acquired before it was submitted")
            }
            StateError::PendingUploads { copies } => {
                write!(f, "Upload scratch released with {copies} copies still pending")
            }
        }
    }
}

impl std::error::Error for StateError {}

/// A high-level error that can occur within the main rendering system or graphics device.
#[derive(Debug)]
pub enum RenderError {
    /// An operation was attempted before the rendering system was initialized.
    NotInitialized,
    /// Failed to acquire the next frame from the swapchain/surface for rendering.
    SurfaceAcquisitionFailed(String),
    /// An error occurred while managing a GPU resource.
    ResourceError(ResourceError),
    /// A frame-sequencing or surface-state invariant was violated.
    State(StateError),
    /// A completion token did not signal within the configured limit.
    FenceTimeout {
        /// The token that was waited on.
        token: CompletionToken,
        /// How long the wait lasted before giving up.
        waited: Duration,
    },
    /// The graphics device was lost (e.g., GPU driver crashed or was updated).
    /// This is a catastrophic error that typically requires reinitialization.
    DeviceLost,
    /// An unexpected or internal error occurred.
    Internal(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NotInitialized => {
                write!(f, "The rendering system is not initialized.")
            }
            RenderError::SurfaceAcquisitionFailed(msg) => {
                write!(f, "Failed to acquire surface for rendering: {msg}")
            }
            RenderError::ResourceError(err) => {
                write!(f, "Graphics resource operation failed: {err}")
            }
            RenderError::State(err) => write!(f, "Render state invariant violated: {err}"),
            RenderError::FenceTimeout { token, waited } => write!(
                f,
                "GPU did not reach token {} within {:.1} ms",
                token.0,
                waited.as_secs_f64() * 1000.0
            ),
            RenderError::DeviceLost => write!(
                f,
                "The graphics device was lost and needs to be reinitialized."
            ),
            RenderError::Internal(msg) => {
                write!(f, "An internal or unexpected error occurred: {msg}")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ResourceError(err) => Some(err),
            RenderError::State(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::ResourceError(err)
    }
}

impl From<StateError> for RenderError {
    fn from(err: StateError) -> Self {
        RenderError::State(err)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn test_capacity_error_display() {
        let err = ResourceError::CapacityExceeded {
            resource: "upload heap",
            requested: 2048,
            capacity: 1024,
        };
        assert_eq!(
            format!("{err}"),
            "Capacity of 'upload heap' exceeded: 2048 requested, 1024 available."
        );
    }

    #[test]
    fn test_render_error_wraps_state_error() {
        let state = StateError::ReadOfUndefinedContents {
            pass: "Downsample",
            surface: "Hdr".to_string(),
        };
        let render_err: RenderError = state.into();
        assert_eq!(
            format!("{render_err}"),
            "Render state invariant violated: Pass 'Downsample' reads 'Hdr' before anything wrote it"
        );
        assert!(render_err.source().is_some());
    }

    #[test]
    fn test_fence_timeout_display_reports_token() {
        let err = RenderError::FenceTimeout {
            token: CompletionToken(7),
            waited: Duration::from_millis(250),
        };
        assert_eq!(format!("{err}"), "GPU did not reach token 7 within 250.0 ms");
        assert!(err.source().is_none());
    }
}
