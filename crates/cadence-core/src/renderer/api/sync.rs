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

//! CPU/GPU synchronization through monotonic completion tokens.
//!
//! Every submission returns a [`CompletionToken`]. The device reports the
//! highest token whose work has finished; since the queue executes in order,
//! a token is complete once the reported value reaches it.

use crate::config::RendererConfig;
use crate::renderer::{error::RenderError, traits::GraphicsDevice};
use std::time::{Duration, Instant};

/// A monotonically increasing value identifying a point on the GPU timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CompletionToken(pub u64);

impl CompletionToken {
    /// The token that is complete before any submission.
    pub const ORIGIN: CompletionToken = CompletionToken(0);

    /// Whether this token is covered by `completed`.
    pub fn is_reached_by(&self, completed: CompletionToken) -> bool {
        completed >= *self
    }
}

/// How long a CPU wait on a completion token may last and how often it polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FenceWaitPolicy {
    /// Hard limit after which the wait fails.
    pub timeout: Duration,
    /// Sleep between two polls.
    pub poll_interval: Duration,
}

impl FenceWaitPolicy {
    /// Builds the policy described by a renderer configuration.
    pub fn from_config(config: &RendererConfig) -> Self {
        Self {
            timeout: config.fence_timeout(),
            poll_interval: config.fence_poll_interval(),
        }
    }
}

impl Default for FenceWaitPolicy {
    fn default() -> Self {
        Self::from_config(&RendererConfig::default())
    }
}

/// Blocks until the device has completed `token`, polling with bounded sleeps.
///
/// Returns how long the call blocked. Exceeding the policy's timeout yields
/// [`RenderError::FenceTimeout`]; callers treat it as fatal.
pub fn wait_for_token(
    device: &dyn GraphicsDevice,
    token: CompletionToken,
    policy: &FenceWaitPolicy,
) -> Result<Duration, RenderError> {
    let start = Instant::now();
    let mut polls: u32 = 0;
    loop {
        device.poll();
        if token.is_reached_by(device.completed_token()) {
            let waited = start.elapsed();
            if polls > 1 {
                log::debug!(
                    "wait_for_token: token {} reached after {} polls ({:.3} ms)",
                    token.0,
                    polls,
                    waited.as_secs_f64() * 1000.0
                );
            }
            return Ok(waited);
        }

        let waited = start.elapsed();
        if waited >= policy.timeout {
            log::error!(
                "wait_for_token: token {} not reached after {:.1} ms (completed: {})",
                token.0,
                waited.as_secs_f64() * 1000.0,
                device.completed_token().0
            );
            return Err(RenderError::FenceTimeout { token, waited });
        }

        polls += 1;
        std::thread::sleep(policy.poll_interval);
    }
}
