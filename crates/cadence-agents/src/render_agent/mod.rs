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

//! Acts as the **[A]gent** for rendering: the frame orchestrator.
//!
//! The [`RenderAgent`] decides what each displayed frame does. While a scene
//! loads it only advances the loader; otherwise it pulls a ring slot, writes
//! the frame's uniforms, walks the pass graph over two command streams and
//! hands the result to the [`Presenter`]. The GPU-side work itself is
//! recorded by the lanes.

mod agent;
mod frame;
mod frame_prep;
mod presenter;
mod screenshot;

pub use agent::*;
pub use frame::*;
pub use presenter::*;
pub use screenshot::{ScreenshotWorker, SCREENSHOT_PASS};
