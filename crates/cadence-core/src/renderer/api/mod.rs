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

//! Plain data types describing GPU resources and commands, plus the CPU-side
//! frame helpers built on top of the device contracts.

pub mod command;
pub mod common;
pub mod display;
pub mod pipeline;
pub mod resource;
pub mod staging;
pub mod sync;
pub mod transient_ring;
pub mod uniforms;
