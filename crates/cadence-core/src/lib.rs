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

//! # Cadence Core
//!
//! Foundational crate containing the traits, core types, and interface contracts
//! shared by every layer of the frame orchestrator: the graphics device and
//! command-recording contracts, resource identifiers and states, the transient
//! per-frame resource ring, the staging uploader, scene descriptions, and
//! configuration.

#![warn(missing_docs)]

pub mod config;
pub mod renderer;
pub mod scene;
pub mod utils;

pub use config::{ConfigError, RenderSettings, RendererConfig, SkyKind, ToneMapper};
pub use utils::timer::Stopwatch;
