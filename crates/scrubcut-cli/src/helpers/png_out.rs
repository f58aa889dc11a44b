// crates/scrubcut-cli/src/helpers/png_out.rs
//
// PNG export of decoded frames.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{ensure, Context, Result};

use scrubcut_core::media_types::Frame;

/// Write a packed RGBA frame to `path` as an 8-bit RGBA PNG.
pub fn write_rgba_png(path: &Path, frame: &Frame) -> Result<()> {
    let expected = frame.width as usize * frame.height as usize * 4;
    ensure!(
        frame.data.len() == expected,
        "frame buffer is {} bytes, expected {expected} for {}x{}",
        frame.data.len(), frame.width, frame.height,
    );

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let w    = &mut BufWriter::new(file);
    let mut encoder = png::Encoder::new(w, frame.width, frame.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&frame.data)?;
    log::debug!("[png] saved {}", path.display());
    Ok(())
}
