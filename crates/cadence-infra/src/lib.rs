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

//! Concrete implementations of the orchestrator's external collaborators.
//!
//! - [`headless`]: a graphics device and swap chain running on a simulated GPU timeline.
//! - [`scene`]: in-memory scene sources implementing `AssetLoader`.
//! - [`screenshot`]: screenshot sinks.
//! - [`logging`]: logger setup.

pub mod headless;
pub mod logging;
pub mod scene;
pub mod screenshot;

pub use headless::{HeadlessConfig, HeadlessDevice, HeadlessSwapChain};
pub use scene::{showcase_scene, ShowcaseOptions, StaticSceneLoader};
pub use screenshot::{MemoryScreenshotSink, PpmScreenshotSink};
