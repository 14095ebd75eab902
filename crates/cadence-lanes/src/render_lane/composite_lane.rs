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

//! UI composition on top of the final image.

use super::pass_graph::{PassContext, PassStats};
use super::surfaces::SurfaceSlot;
use cadence_core::renderer::{ColorAttachment, RenderError, RenderPassDescriptor, SurfaceId};

/// Name of the UI pass, identical in both present layouts.
pub const UI_PASS_NAME: &str = "ImGUI Rendering";

fn composite_into(ctx: &mut PassContext<'_>, target: SurfaceId) -> PassStats {
    let attachments = [ColorAttachment::load(target)];
    let mut pass = ctx.encoder.begin_render_pass(&RenderPassDescriptor {
        label: Some(ctx.pass),
        color_attachments: &attachments,
        depth_attachment: None,
    });
    PassStats::drawn(ctx.ui.draw(&mut *pass))
}

/// Draws the UI straight into the backbuffer after SDR tone mapping.
pub fn record_ui_composite(ctx: &mut PassContext<'_>) -> Result<PassStats, RenderError> {
    let backbuffer = ctx.surfaces.single(SurfaceSlot::Backbuffer)?;
    Ok(composite_into(ctx, backbuffer))
}

/// Draws the UI into the tone-mapped HDR target, before color conversion
/// carries both to the display.
pub fn record_hdr_ui_composite(ctx: &mut PassContext<'_>) -> Result<PassStats, RenderError> {
    let hdr = ctx.surfaces.single(SurfaceSlot::Hdr)?;
    Ok(composite_into(ctx, hdr))
}
