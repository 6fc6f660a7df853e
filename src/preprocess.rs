// 该文件是 NSFW Lens 项目的一部分。
// src/preprocess.rs - 图像到张量的预处理
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

use std::time::{Duration, Instant};

use tracing::debug;

use crate::{
  classifier::NsfwError,
  frame::{BGR_CHANNELS, BGR_MEANS, INPUT_HEIGHT, INPUT_WIDTH, NsfwTensor},
  input::PixelSource,
};

/// 小于 224 的边的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UndersizedPolicy {
  /// 最近邻拉伸到 224，足够长的边仍然居中裁剪
  #[default]
  Stretch,
  /// 直接返回 `InvalidImage`
  Reject,
}

#[derive(Debug)]
pub struct Preprocessed {
  pub tensor: NsfwTensor,
  pub duration: Duration,
}

/// 居中裁剪的起点 (x, y)，整数除法向零截断，小于 0 时取 0
pub fn crop_origin(width: u32, height: u32) -> (u32, u32) {
  (
    width.saturating_sub(INPUT_WIDTH) / 2,
    height.saturating_sub(INPUT_HEIGHT) / 2,
  )
}

/// 一条轴上 224 个目标坐标对应的源坐标
fn axis_indices(len: u32, target: u32) -> Vec<u32> {
  if len >= target {
    let origin = (len - target) / 2;
    (origin..origin + target).collect()
  } else {
    (0..target)
      .map(|t| (t as u64 * len as u64 / target as u64) as u32)
      .collect()
  }
}

#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
  policy: UndersizedPolicy,
}

impl Preprocessor {
  pub fn with_policy(mut self, policy: UndersizedPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn policy(&self) -> UndersizedPolicy {
    self.policy
  }

  /// 将图像转换为模型输入张量。图像的所有权被接管，提取像素后立即释放。
  pub fn run<I: PixelSource>(&self, image: I) -> Result<Preprocessed, NsfwError> {
    let start = Instant::now();

    let pixels = self.extract(image)?;
    let tensor = build_tensor(pixels)?;

    let duration = start.elapsed();
    debug!("张量构建完成，耗时: {:.2?}", duration);

    Ok(Preprocessed { tensor, duration })
  }

  /// 按行取出 224x224 个像素。返回时原图已释放，只剩像素数组。
  pub fn extract<I: PixelSource>(&self, image: I) -> Result<Vec<[u8; 3]>, NsfwError> {
    let (width, height) = (image.width(), image.height());

    if width == 0 || height == 0 {
      return Err(NsfwError::InvalidImage(format!(
        "图像面积为零: {}x{}",
        width, height
      )));
    }

    let undersized = width < INPUT_WIDTH || height < INPUT_HEIGHT;
    if undersized && self.policy == UndersizedPolicy::Reject {
      return Err(NsfwError::InvalidImage(format!(
        "图像尺寸 {}x{} 小于 {}x{}",
        width, height, INPUT_WIDTH, INPUT_HEIGHT
      )));
    }

    let pixels = if undersized {
      debug!(
        "图像尺寸 {}x{} 不足 {}x{}, 拉伸短边",
        width, height, INPUT_WIDTH, INPUT_HEIGHT
      );
      let xs = axis_indices(width, INPUT_WIDTH);
      let ys = axis_indices(height, INPUT_HEIGHT);
      let mut pixels = Vec::with_capacity(xs.len() * ys.len());
      for &y in &ys {
        for &x in &xs {
          pixels.push(image.rgb(x, y));
        }
      }
      pixels
    } else {
      let (x, y) = crop_origin(width, height);
      debug!("图像尺寸 {}x{}, 裁剪起点 ({}, {})", width, height, x, y);
      image.read_region(x, y, INPUT_WIDTH, INPUT_HEIGHT)
    };

    drop(image);
    Ok(pixels)
  }
}

/// 每个像素依次写入 B、G、R 减去均值后的值
fn build_tensor(pixels: Vec<[u8; 3]>) -> Result<NsfwTensor, NsfwError> {
  let mut data = Vec::with_capacity(NsfwTensor::LEN);
  for [r, g, b] in pixels {
    data.push(b as f32 - BGR_MEANS[0]);
    data.push(g as f32 - BGR_MEANS[1]);
    data.push(r as f32 - BGR_MEANS[2]);
  }
  debug_assert_eq!(data.len() % BGR_CHANNELS, 0);

  NsfwTensor::try_from(data)
    .map_err(|e| NsfwError::InvalidImage(format!("像素提取不完整: {}", e)))
}
