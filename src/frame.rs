// 该文件是 NSFW Lens 项目的一部分。
// src/frame.rs - NHWC 浮点张量定义
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

/// 网络输入宽度
pub const INPUT_WIDTH: u32 = 224;
/// 网络输入高度
pub const INPUT_HEIGHT: u32 = 224;

pub const BGR_CHANNELS: usize = 3;

/// 每通道均值，按 B、G、R 顺序
pub const BGR_MEANS: [f32; BGR_CHANNELS] = [104.0, 117.0, 123.0];

#[derive(Error, Debug, PartialEq, Eq)]
#[error("张量长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
pub struct TensorShapeError {
  pub expected: usize,
  pub actual: usize,
}

/// 批大小为 1、通道在后的 BGR 浮点张量
#[derive(Debug, Clone, PartialEq)]
pub struct NhwcTensor<const W: u32, const H: u32> {
  data: Box<[f32]>,
}

/// 模型实际使用的输入张量
pub type NsfwTensor = NhwcTensor<INPUT_WIDTH, INPUT_HEIGHT>;

impl<const W: u32, const H: u32> NhwcTensor<W, H> {
  pub const LEN: usize = BGR_CHANNELS * W as usize * H as usize;
  pub const BYTE_LEN: usize = Self::LEN * std::mem::size_of::<f32>();

  pub fn height(&self) -> usize {
    H as usize
  }

  pub fn width(&self) -> usize {
    W as usize
  }

  pub fn channels(&self) -> usize {
    BGR_CHANNELS
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  /// 第 (x, y) 个像素的 [B, G, R] 三个值
  pub fn pixel(&self, x: usize, y: usize) -> [f32; BGR_CHANNELS] {
    let base = (y * W as usize + x) * BGR_CHANNELS;
    [self.data[base], self.data[base + 1], self.data[base + 2]]
  }

  /// 按小端字节序展开，长度为 `W * H * 3 * 4`
  pub fn to_le_bytes(&self) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(Self::BYTE_LEN);
    for value in self.data.iter() {
      bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
  }
}

impl<const W: u32, const H: u32> TryFrom<Vec<f32>> for NhwcTensor<W, H> {
  type Error = TensorShapeError;

  fn try_from(data: Vec<f32>) -> Result<Self, Self::Error> {
    if data.len() != Self::LEN {
      return Err(TensorShapeError {
        expected: Self::LEN,
        actual: data.len(),
      });
    }

    Ok(Self {
      data: data.into_boxed_slice(),
    })
  }
}

impl<const W: u32, const H: u32> Default for NhwcTensor<W, H> {
  fn default() -> Self {
    let data = vec![0f32; Self::LEN].into_boxed_slice();
    Self { data }
  }
}

impl<const W: u32, const H: u32> AsMut<[f32]> for NhwcTensor<W, H> {
  fn as_mut(&mut self) -> &mut [f32] {
    &mut self.data
  }
}

impl<const W: u32, const H: u32> AsRef<[f32]> for NhwcTensor<W, H> {
  fn as_ref(&self) -> &[f32] {
    &self.data
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn model_tensor_has_fixed_size() {
    let tensor = NsfwTensor::default();
    assert_eq!(tensor.len(), 224 * 224 * 3);
    assert_eq!(NsfwTensor::BYTE_LEN, 224 * 224 * 3 * 4);
    assert_eq!(tensor.to_le_bytes().len(), NsfwTensor::BYTE_LEN);
  }

  #[test]
  fn rejects_wrong_length() {
    let err = NhwcTensor::<2, 2>::try_from(vec![0.0; 11]).unwrap_err();
    assert_eq!(
      err,
      TensorShapeError {
        expected: 12,
        actual: 11
      }
    );
  }

  #[test]
  fn bytes_are_little_endian() {
    let mut data = vec![0.0; 3];
    data[0] = -54.0;
    data[1] = 33.0;
    data[2] = 77.0;
    let tensor = NhwcTensor::<1, 1>::try_from(data).unwrap();
    let bytes = tensor.to_le_bytes();
    assert_eq!(&bytes[0..4], &(-54.0f32).to_le_bytes());
    assert_eq!(&bytes[8..12], &[0x00, 0x00, 0x9a, 0x42]);
    assert_eq!(tensor.pixel(0, 0), [-54.0, 33.0, 77.0]);
  }
}
