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

//! Texture preparation on a pool of worker threads.

use cadence_core::renderer::{Extent2D, TextureFormat};
use cadence_core::scene::TextureSource;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::thread;
use thiserror::Error;

/// Errors raised while preparing textures.
#[derive(Debug, Error)]
pub enum TexturePrepError {
    /// The pixel data does not match the declared size and format.
    #[error("Texture '{name}' holds {actual} bytes, expected {expected}")]
    SizeMismatch {
        /// The texture name.
        name: String,
        /// Bytes implied by extent and format.
        expected: usize,
        /// Bytes present.
        actual: usize,
    },
    /// A worker stopped before delivering the texture.
    #[error("Texture worker stopped before finishing '{name}'")]
    WorkerLost {
        /// The texture name.
        name: String,
    },
}

/// A texture ready for upload, every mip level tightly packed.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedTexture {
    /// Index of the source in the scene's texture list.
    pub index: usize,
    /// The texture name.
    pub name: String,
    /// Size of mip level 0.
    pub extent: Extent2D,
    /// Pixel format.
    pub format: TextureFormat,
    /// Pixel rows of each mip level, level 0 first.
    pub mips: Vec<Vec<u8>>,
}

/// Builds the full mip chain of an 8-bit RGBA image with a 2x2 box filter.
///
/// Other formats, and images already at 1x1, yield level 0 alone.
pub fn generate_mips(extent: Extent2D, format: TextureFormat, level0: &[u8]) -> Vec<Vec<u8>> {
    let mut mips = vec![level0.to_vec()];
    if !format.is_rgba8_family() {
        return mips;
    }
    for level in 1..extent.full_mip_count() {
        let source_extent = extent.mip(level - 1);
        let target_extent = extent.mip(level);
        let source = &mips[mips.len() - 1];
        let next = downsample_rgba8(source, source_extent, target_extent);
        mips.push(next);
    }
    mips
}

fn downsample_rgba8(source: &[u8], from: Extent2D, to: Extent2D) -> Vec<u8> {
    let texel = |x: u32, y: u32, channel: usize| -> u32 {
        let x = x.min(from.width - 1);
        let y = y.min(from.height - 1);
        u32::from(source[((y * from.width + x) * 4) as usize + channel])
    };
    let mut out = Vec::with_capacity((to.width * to.height * 4) as usize);
    for y in 0..to.height {
        for x in 0..to.width {
            let (sx, sy) = (x * 2, y * 2);
            for channel in 0..4 {
                let sum = texel(sx, sy, channel)
                    + texel(sx + 1, sy, channel)
                    + texel(sx, sy + 1, channel)
                    + texel(sx + 1, sy + 1, channel);
                out.push(((sum + 2) / 4) as u8);
            }
        }
    }
    out
}

fn prepare_one(index: usize, source: &TextureSource) -> PreparedTexture {
    let mips = if source.generate_mips {
        generate_mips(source.extent, source.format, &source.pixels)
    } else {
        vec![source.pixels.to_vec()]
    };
    PreparedTexture {
        index,
        name: source.name.clone(),
        extent: source.extent,
        format: source.format,
        mips,
    }
}

fn check_size(source: &TextureSource) -> Result<(), TexturePrepError> {
    let expected = source.extent.width as usize
        * source.extent.height as usize
        * source.format.bytes_per_pixel() as usize;
    if source.pixels.len() != expected {
        return Err(TexturePrepError::SizeMismatch {
            name: source.name.clone(),
            expected,
            actual: source.pixels.len(),
        });
    }
    Ok(())
}

/// Decodes and mip-maps scene textures in parallel.
///
/// Jobs are handed out through a channel, so a large texture only holds up
/// the worker processing it. Results come back in source order.
#[derive(Debug, Clone)]
pub struct TexturePrepLane {
    threads: usize,
}

impl TexturePrepLane {
    /// Creates a lane running `threads` workers, at least one.
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
        }
    }

    /// The number of workers.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Prepares every texture of `sources`.
    pub fn prepare(
        &self,
        sources: &[TextureSource],
    ) -> Result<Vec<PreparedTexture>, TexturePrepError> {
        sources.iter().try_for_each(check_size)?;
        if sources.is_empty() {
            return Ok(Vec::new());
        }

        let (job_tx, job_rx): (Sender<usize>, Receiver<usize>) = unbounded();
        let (done_tx, done_rx) = unbounded::<PreparedTexture>();
        for index in 0..sources.len() {
            if job_tx.send(index).is_err() {
                break;
            }
        }
        drop(job_tx);

        let workers = self.threads.min(sources.len());
        thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    let jobs = job_rx.clone();
                    let done = done_tx.clone();
                    scope.spawn(move || {
                        for index in jobs.iter() {
                            if done.send(prepare_one(index, &sources[index])).is_err() {
                                break;
                            }
                        }
                    })
                })
                .collect();
            for handle in handles {
                if handle.join().is_err() {
                    log::error!("TexturePrepLane: a worker panicked");
                }
            }
        });
        drop(done_tx);

        let mut slots: Vec<Option<PreparedTexture>> = sources.iter().map(|_| None).collect();
        for texture in done_rx.try_iter() {
            let index = texture.index;
            slots[index] = Some(texture);
        }
        log::debug!(
            "TexturePrepLane: {} textures prepared on {workers} workers",
            sources.len()
        );
        slots
            .into_iter()
            .zip(sources)
            .map(|(slot, source)| {
                slot.ok_or_else(|| TexturePrepError::WorkerLost {
                    name: source.name.clone(),
                })
            })
            .collect()
    }
}
