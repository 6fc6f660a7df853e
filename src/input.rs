// 该文件是 NSFW Lens 项目的一部分。
// src/input.rs - 图像输入
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

use thiserror::Error;

/// 可按坐标读取 RGB 像素的图像，透明通道忽略
pub trait PixelSource {
  fn width(&self) -> u32;
  fn height(&self) -> u32;

  /// 读取 (x, y) 处的 [R, G, B]，调用方保证坐标在范围内
  fn rgb(&self, x: u32, y: u32) -> [u8; 3];

  /// 从 (x, y) 开始按行读取 `width * height` 个像素
  fn read_region(&self, x: u32, y: u32, width: u32, height: u32) -> Vec<[u8; 3]> {
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for row in y..y + height {
      for col in x..x + width {
        pixels.push(self.rgb(col, row));
      }
    }
    pixels
  }
}

#[derive(Error, Debug)]
pub enum RgbBufferError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

/// 紧密排列的 RGB 原始帧，例如摄像头回调给出的数据
#[derive(Debug, Clone)]
pub struct RgbBuffer {
  width: u32,
  height: u32,
  data: Box<[u8]>,
}

impl RgbBuffer {
  pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, RgbBufferError> {
    let expected = 3 * width as usize * height as usize;
    if data.len() != expected {
      return Err(RgbBufferError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      width,
      height,
      data: data.into_boxed_slice(),
    })
  }

  /// 所有像素均为同一颜色
  pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
    let data = rgb
      .iter()
      .copied()
      .cycle()
      .take(3 * width as usize * height as usize)
      .collect::<Vec<_>>();
    Self {
      width,
      height,
      data: data.into_boxed_slice(),
    }
  }

  /// 由坐标函数生成每个像素
  pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> [u8; 3]) -> Self {
    let mut data = Vec::with_capacity(3 * width as usize * height as usize);
    for y in 0..height {
      for x in 0..width {
        data.extend_from_slice(&f(x, y));
      }
    }
    Self {
      width,
      height,
      data: data.into_boxed_slice(),
    }
  }
}

impl PixelSource for RgbBuffer {
  fn width(&self) -> u32 {
    self.width
  }

  fn height(&self) -> u32 {
    self.height
  }

  fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
    let index = 3 * (y as usize * self.width as usize + x as usize);
    [self.data[index], self.data[index + 1], self.data[index + 2]]
  }
}

#[cfg(feature = "read_image_file")]
mod read_image_file;

#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError, directory_inputs};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rgb_buffer_checks_length() {
    assert!(RgbBuffer::new(2, 2, vec![0; 12]).is_ok());
    assert!(matches!(
      RgbBuffer::new(2, 2, vec![0; 11]),
      Err(RgbBufferError::LengthMismatch {
        expected: 12,
        actual: 11
      })
    ));
  }

  #[test]
  fn read_region_is_row_major() {
    let buffer = RgbBuffer::from_fn(4, 3, |x, y| [x as u8, y as u8, 0]);
    let region = buffer.read_region(1, 1, 2, 2);
    assert_eq!(region, vec![[1, 1, 0], [2, 1, 0], [1, 2, 0], [2, 2, 0]]);
  }
}
