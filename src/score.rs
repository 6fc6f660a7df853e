// 该文件是 NSFW Lens 项目的一部分。
// src/score.rs - 推理分数后处理
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

use std::{fmt, time::Duration};

use tracing::warn;

/// 分数保留的小数位数
pub const SCORE_DECIMALS: usize = 3;

/// 模型原始输出，下标 0 为安全类，下标 1 为不安全类
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawScores(pub [f32; 2]);

impl RawScores {
  pub fn safe(&self) -> f32 {
    self.0[0]
  }

  pub fn not_safe(&self) -> f32 {
    self.0[1]
  }
}

impl From<[f32; 2]> for RawScores {
  fn from(value: [f32; 2]) -> Self {
    RawScores(value)
  }
}

/// 一次分类的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreResult {
  pub not_safe: f32,
  pub safe: f32,
  /// 构建张量耗时
  pub load_duration: Duration,
  /// 推理耗时
  pub scan_duration: Duration,
}

impl ScoreResult {
  pub fn from_raw(raw: RawScores, load_duration: Duration, scan_duration: Duration) -> Self {
    ScoreResult {
      not_safe: rounded(raw.not_safe()),
      safe: rounded(raw.safe()),
      load_duration,
      scan_duration,
    }
  }

  pub fn load_ms(&self) -> u128 {
    self.load_duration.as_millis()
  }

  pub fn scan_ms(&self) -> u128 {
    self.scan_duration.as_millis()
  }
}

impl fmt::Display for ScoreResult {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "nsfw: {:.3}, sfw: {:.3}, load: {} ms, scan: {} ms",
      self.not_safe,
      self.safe,
      self.load_ms(),
      self.scan_ms()
    )
  }
}

/// 按十进制四舍五入（五入远离零）保留 `decimals` 位小数，小数点固定为 `.`。
///
/// 以 `f32` 的最短往返十进制表示为准，不受二进制误差影响，
/// 例如 `0.0005` 得到 `"0.001"`，`0.4995` 得到 `"0.500"`。
pub fn round_half_up(value: f32, decimals: usize) -> String {
  if !value.is_finite() {
    warn!("分数不是有限值: {}", value);
    return value.to_string();
  }

  let text = value.abs().to_string();
  let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), ""));

  let mut digits = int_part.bytes().map(|b| b - b'0').collect::<Vec<u8>>();
  let int_len = digits.len();
  let mut frac = frac_part.bytes().map(|b| b - b'0');
  for _ in 0..decimals {
    digits.push(frac.next().unwrap_or(0));
  }

  if frac.next().is_some_and(|d| d >= 5) {
    let mut carry = true;
    for digit in digits.iter_mut().rev() {
      if *digit == 9 {
        *digit = 0;
      } else {
        *digit += 1;
        carry = false;
        break;
      }
    }
    if carry {
      digits.insert(0, 1);
    }
  }

  let split = digits.len() - decimals;
  debug_assert!(split >= int_len);
  let mut out = String::with_capacity(digits.len() + 2);
  if value.is_sign_negative() && digits.iter().any(|d| *d != 0) {
    out.push('-');
  }
  out.extend(digits[..split].iter().map(|d| char::from(b'0' + d)));
  if decimals > 0 {
    out.push('.');
    out.extend(digits[split..].iter().map(|d| char::from(b'0' + d)));
  }
  out
}

/// 保留三位小数后的分数值
pub fn rounded(value: f32) -> f32 {
  round_half_up(value, SCORE_DECIMALS)
    .parse()
    .unwrap_or(value)
}
