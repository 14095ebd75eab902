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

//! Screenshot sinks.

use anyhow::{bail, Context};
use cadence_core::renderer::{CapturedImage, ScreenshotSink, TextureFormat};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

/// Writes captures as binary PPM files named `<prefix>_<frame>.ppm`.
#[derive(Debug, Clone)]
pub struct PpmScreenshotSink {
    directory: PathBuf,
    prefix: String,
}

impl PpmScreenshotSink {
    pub fn new(directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            prefix: prefix.into(),
        }
    }

    /// The file a capture of `frame_number` is written to.
    pub fn path_for(&self, frame_number: u64) -> PathBuf {
        self.directory
            .join(format!("{}_{frame_number:05}.ppm", self.prefix))
    }
}

/// Converts one pixel to 8-bit RGB, or `None` for formats PPM cannot hold.
fn to_rgb8(format: TextureFormat, pixel: &[u8]) -> Option<[u8; 3]> {
    Some(match format {
        TextureFormat::Rgba8Unorm | TextureFormat::Rgba8UnormSrgb => [pixel[0], pixel[1], pixel[2]],
        TextureFormat::Bgra8UnormSrgb => [pixel[2], pixel[1], pixel[0]],
        TextureFormat::Rgb10a2Unorm => {
            let packed = u32::from_le_bytes([pixel[0], pixel[1], pixel[2], pixel[3]]);
            let channel = |shift: u32| (((packed >> shift) & 0x3ff) >> 2) as u8;
            [channel(0), channel(10), channel(20)]
        }
        _ => return None,
    })
}

impl ScreenshotSink for PpmScreenshotSink {
    fn write(&mut self, image: CapturedImage) -> anyhow::Result<()> {
        let bytes_per_pixel = image.format.bytes_per_pixel() as usize;
        if to_rgb8(image.format, &[0; 8]).is_none() {
            bail!("screenshots of {:?} surfaces are not supported", image.format);
        }
        let path = self.path_for(image.frame_number);
        let file = File::create(&path)
            .with_context(|| format!("creating screenshot '{}'", path.display()))?;
        let mut out = BufWriter::new(file);
        write!(out, "P6\n{} {}\n255\n", image.extent.width, image.extent.height)?;

        for row in image
            .pixels
            .chunks(image.bytes_per_row as usize)
            .take(image.extent.height as usize)
        {
            let tight = &row[..image.extent.width as usize * bytes_per_pixel];
            for pixel in tight.chunks_exact(bytes_per_pixel) {
                if let Some(rgb) = to_rgb8(image.format, pixel) {
                    out.write_all(&rgb)?;
                }
            }
        }
        out.flush()?;
        log::info!("PpmScreenshotSink: wrote '{}'", path.display());
        Ok(())
    }
}

/// Keeps captures in memory. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryScreenshotSink {
    images: Arc<Mutex<Vec<CapturedImage>>>,
}

impl MemoryScreenshotSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every capture written so far.
    pub fn images(&self) -> Vec<CapturedImage> {
        self.images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ScreenshotSink for MemoryScreenshotSink {
    fn write(&mut self, image: CapturedImage) -> anyhow::Result<()> {
        self.images
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(image);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::renderer::Extent2D;

    fn image(format: TextureFormat, pixel: [u8; 4]) -> CapturedImage {
        let mut pixels = vec![0u8; 256 * 2];
        for row in 0..2 {
            for column in 0..2 {
                let start = row * 256 + column * 4;
                pixels[start..start + 4].copy_from_slice(&pixel);
            }
        }
        CapturedImage {
            frame_number: 3,
            extent: Extent2D::new(2, 2),
            format,
            bytes_per_row: 256,
            pixels,
        }
    }

    #[test]
    fn test_ppm_drops_row_padding_and_swizzles_bgra() {
        let directory = std::env::temp_dir().join(format!("cadence-ppm-{}", std::process::id()));
        std::fs::create_dir_all(&directory).unwrap();
        let mut sink = PpmScreenshotSink::new(&directory, "shot");
        sink.write(image(TextureFormat::Bgra8UnormSrgb, [1, 2, 3, 255]))
            .unwrap();

        let bytes = std::fs::read(sink.path_for(3)).unwrap();
        let header = b"P6\n2 2\n255\n";
        assert_eq!(&bytes[..header.len()], header);
        assert_eq!(&bytes[header.len()..], &[3, 2, 1].repeat(4)[..]);
        std::fs::remove_dir_all(&directory).unwrap();
    }

    #[test]
    fn test_float_captures_are_rejected() {
        let mut sink = PpmScreenshotSink::new(std::env::temp_dir(), "float");
        let mut capture = image(TextureFormat::Rgba16Float, [0; 4]);
        capture.pixels = vec![0; 256 * 2];
        assert!(sink.write(capture).is_err());
    }

    #[test]
    fn test_memory_sink_shares_storage_between_clones() {
        let sink = MemoryScreenshotSink::new();
        let mut writer = sink.clone();
        writer.write(image(TextureFormat::Rgba8Unorm, [9; 4])).unwrap();
        assert_eq!(sink.images().len(), 1);
    }
}
