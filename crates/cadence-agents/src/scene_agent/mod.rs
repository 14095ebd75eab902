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

//! Acts as the **[A]gent** for scene loading.
//!
//! A scene is built over several frames: each call to
//! [`SceneLoader::advance`] runs exactly one [`LoadStage`], so the frame
//! orchestrator keeps presenting while resources are created and pipelines
//! are compiled. The scene only becomes visible once its last stage has
//! flushed every upload.

mod loader;
mod stage;

pub use loader::*;
pub use stage::*;
