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

use super::RenderPass;

/// Draws the user interface on top of the composited frame.
pub trait UiOverlay {
    /// Records the UI into an open render pass and returns the number of draws.
    fn draw(&mut self, pass: &mut dyn RenderPass) -> u32;
}

/// An overlay that draws nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOverlay;

impl UiOverlay for NoOverlay {
    fn draw(&mut self, _pass: &mut dyn RenderPass) -> u32 {
        0
    }
}
