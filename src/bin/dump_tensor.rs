// 该文件是 NSFW Lens 项目的一部分。
// src/bin/dump_tensor.rs - 导出预处理后的输入张量
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use url::Url;

use nsfw_lens::{
  FromUrl,
  frame::NsfwTensor,
  input::{ImageFileInput, PixelSource},
  preprocess::{Preprocessor, UndersizedPolicy, crop_origin},
};
use tracing::info;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Policy {
  Stretch,
  Reject,
}

impl From<Policy> for UndersizedPolicy {
  fn from(policy: Policy) -> Self {
    match policy {
      Policy::Stretch => UndersizedPolicy::Stretch,
      Policy::Reject => UndersizedPolicy::Reject,
    }
  }
}

/// 将图像转换为模型输入张量并按小端字节序写入文件
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入图像，例如 image:///path/to/photo.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 张量输出文件
  #[arg(long, value_name = "OUTPUT")]
  pub output: PathBuf,
  /// 小于 224x224 的图像的处理方式
  #[arg(long, value_enum, default_value = "stretch")]
  policy: Policy,
  /// 输出 DEBUG 日志
  #[arg(long)]
  pub verbose: bool,
}

fn main() -> Result<()> {
  let args = Args::parse();

  if args.verbose {
    nsfw_lens::utils::enable_verbose_logging();
  } else {
    tracing_subscriber::fmt::init();
  }

  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output.display());

  let input = ImageFileInput::from_url(&args.input)
    .with_context(|| format!("无法读取图像: {}", args.input))?;
  let image = input.into_image();
  let (width, height) = (PixelSource::width(&image), PixelSource::height(&image));
  let origin = crop_origin(width, height);

  let preprocessed = Preprocessor::default()
    .with_policy(args.policy.into())
    .run(image)?;
  info!("张量构建完成，耗时: {:.2?}", preprocessed.duration);

  std::fs::write(&args.output, preprocessed.tensor.to_le_bytes())
    .with_context(|| format!("无法写入张量文件: {}", args.output.display()))?;

  let summary = serde_json::json!({
    "input": args.input.as_str(),
    "output": args.output.display().to_string(),
    "width": width,
    "height": height,
    "origin": [origin.0, origin.1],
    "elements": NsfwTensor::LEN,
    "bytes": NsfwTensor::BYTE_LEN,
    "byte_order": "little-endian",
    "load_ms": preprocessed.duration.as_millis() as u64,
  });
  println!("{}", serde_json::to_string_pretty(&summary)?);

  Ok(())
}
