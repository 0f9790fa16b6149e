//! Image fixtures.

#![allow(dead_code)]

use image::{DynamicImage, Rgba, RgbaImage};
use phasesim::SelectedFile;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// A small, valid PNG.
pub fn png_bytes() -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([200, 40, 40, 255])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .expect("encode png");
    buf
}

/// In-memory PNG selection.
pub fn png_file(name: &str) -> SelectedFile {
    SelectedFile::from_bytes(name, "image/png", png_bytes())
}

/// Write a PNG into `dir` and return its path.
pub fn png_on_disk(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, png_bytes()).expect("write png");
    path
}

/// Data URI the transcoder produces for [`png_bytes`].
pub fn png_data_uri() -> String {
    use base64::Engine as _;
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png_bytes())
    )
}
