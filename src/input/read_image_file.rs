// 该文件是 NSFW Lens 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView, ImageBuffer, ImageReader, RgbImage, RgbaImage};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, classifier::NsfwError, input::PixelSource, task::ScanInput,
};

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "webp"];

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("Invalid path encoding: {0}")]
  PathEncodingError(#[from] std::string::FromUtf8Error),
}

impl ImageFileInputError {
  pub fn into_nsfw(self, path: &Path) -> NsfwError {
    NsfwError::ImageRead {
      path: path.to_path_buf(),
      reason: self.to_string(),
    }
  }
}

impl PixelSource for RgbImage {
  fn width(&self) -> u32 {
    ImageBuffer::width(self)
  }

  fn height(&self) -> u32 {
    ImageBuffer::height(self)
  }

  fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
    self.get_pixel(x, y).0
  }
}

impl PixelSource for RgbaImage {
  fn width(&self) -> u32 {
    ImageBuffer::width(self)
  }

  fn height(&self) -> u32 {
    ImageBuffer::height(self)
  }

  fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
    let [r, g, b, _] = self.get_pixel(x, y).0;
    [r, g, b]
  }
}

impl PixelSource for DynamicImage {
  fn width(&self) -> u32 {
    GenericImageView::dimensions(self).0
  }

  fn height(&self) -> u32 {
    GenericImageView::dimensions(self).1
  }

  fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
    let [r, g, b, _] = GenericImageView::get_pixel(self, x, y).0;
    [r, g, b]
  }
}

/// 解码图像文件为 RGB8
pub fn decode_rgb(path: &Path) -> Result<RgbImage, ImageFileInputError> {
  debug!("解码图像文件: {}", path.display());
  let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
  Ok(image.to_rgb8())
}

pub struct ImageFileInput {
  path: PathBuf,
  image: RgbImage,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemaMismatch);
    }

    let path = url_file_path(url)?;
    let image = decode_rgb(&path)?;

    Ok(ImageFileInput { path, image })
  }
}

/// URL 路径部分按百分号编码解码后的本地路径
fn url_file_path(url: &Url) -> Result<PathBuf, ImageFileInputError> {
  let path = urlencoding::decode(url.path())?;
  Ok(PathBuf::from(path.into_owned()))
}

impl ImageFileInput {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, ImageFileInputError> {
    let path = path.as_ref().to_path_buf();
    let image = decode_rgb(&path)?;
    Ok(ImageFileInput { path, image })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  pub fn into_image(self) -> RgbImage {
    self.image
  }
}

fn is_image_file(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| {
      IMAGE_EXTENSIONS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(ext))
    })
    .unwrap_or(false)
}

/// 列出目录下的图像文件（不递归），按路径排序，迭代时才解码
pub fn directory_inputs(
  dir: impl AsRef<Path>,
) -> Result<impl Iterator<Item = ScanInput<RgbImage>>, ImageFileInputError> {
  let mut paths = Vec::new();
  for entry in std::fs::read_dir(dir.as_ref())? {
    let path = entry?.path();
    if path.is_file() && is_image_file(&path) {
      paths.push(path);
    }
  }
  paths.sort();
  debug!(
    "目录 {} 中找到 {} 个图像文件",
    dir.as_ref().display(),
    paths.len()
  );

  Ok(paths.into_iter().map(|path| {
    let image = decode_rgb(&path).map_err(|e| e.into_nsfw(&path));
    ScanInput::new(path.display().to_string(), image)
  }))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("nsfw-lens-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
  }

  #[test]
  fn rgba_ignores_alpha() {
    let image = RgbaImage::from_pixel(2, 2, image::Rgba([200, 150, 50, 0]));
    assert_eq!(PixelSource::rgb(&image, 1, 1), [200, 150, 50]);
    assert_eq!(PixelSource::width(&image), 2);
  }

  #[test]
  fn dynamic_image_reports_dimensions() {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(3, 5, image::Rgb([1, 2, 3])));
    assert_eq!(PixelSource::width(&image), 3);
    assert_eq!(PixelSource::height(&image), 5);
    assert_eq!(PixelSource::rgb(&image, 2, 4), [1, 2, 3]);
  }

  #[test]
  fn extension_filter_is_case_insensitive() {
    assert!(is_image_file(Path::new("a/b/photo.JPG")));
    assert!(is_image_file(Path::new("x.webp")));
    assert!(!is_image_file(Path::new("notes.txt")));
    assert!(!is_image_file(Path::new("no_extension")));
  }

  #[test]
  fn directory_inputs_decode_lazily_and_report_broken_files() {
    let dir = scratch_dir("dir-inputs");
    RgbImage::from_pixel(4, 4, image::Rgb([10, 20, 30]))
      .save(dir.join("a.png"))
      .unwrap();
    std::fs::write(dir.join("b.jpg"), b"not a jpeg").unwrap();
    std::fs::write(dir.join("c.txt"), b"ignored").unwrap();

    let inputs = directory_inputs(&dir).unwrap().collect::<Vec<_>>();
    assert_eq!(inputs.len(), 2);
    assert!(inputs[0].label.ends_with("a.png"));
    assert!(inputs[0].image.is_ok());
    assert!(matches!(inputs[1].image, Err(NsfwError::ImageRead { .. })));

    std::fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  fn from_url_rejects_other_schemes() {
    let url = Url::parse("file:///tmp/x.png").unwrap();
    assert!(matches!(
      ImageFileInput::from_url(&url),
      Err(ImageFileInputError::SchemaMismatch)
    ));
  }

  #[test]
  fn url_path_is_percent_decoded() {
    let url = Url::parse("image:///tmp/my%20images/a%2Bb.png").unwrap();
    assert_eq!(
      url_file_path(&url).unwrap(),
      PathBuf::from("/tmp/my images/a+b.png")
    );
  }

  #[test]
  fn from_url_opens_path_with_spaces() {
    let dir = scratch_dir("my images");
    RgbImage::from_pixel(2, 3, image::Rgb([9, 8, 7]))
      .save(dir.join("a.png"))
      .unwrap();
    let url = Url::from_file_path(dir.join("a.png")).unwrap();
    let url = Url::parse(&format!("image://{}", url.path())).unwrap();

    let input = ImageFileInput::from_url(&url).unwrap();
    assert_eq!(input.path(), dir.join("a.png"));
    assert_eq!(PixelSource::height(&input.into_image()), 3);

    std::fs::remove_dir_all(&dir).unwrap();
  }
}
