// 该文件是 NSFW Lens 项目的一部分。
// src/model.rs - 推理引擎边界
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

use std::path::PathBuf;

use thiserror::Error;
use url::Url;

use crate::{FromUrl, frame::NsfwTensor, score::RawScores};

/// 默认打包的模型资源名
pub const DEFAULT_MODEL_NAME: &str = "nsfw.tflite";

/// 已加载的推理引擎实例。同一实例同一时刻只会被一个线程调用。
pub trait Model: Send {
  type Error: std::error::Error + Send + Sync + 'static;

  fn infer(&mut self, input: &NsfwTensor) -> Result<RawScores, Self::Error>;
}

/// 从模型文件内容创建推理引擎
pub trait ModelLoader {
  type Model: Model;
  type Error: std::error::Error + Send + Sync + 'static;

  fn load(&self, model: &[u8], options: &EngineOptions) -> Result<Self::Model, Self::Error>;
}

/// 硬件加速配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Acceleration {
  pub enabled: bool,
  /// 允许以 fp16 计算 fp32 算子
  pub allow_fp16: bool,
  /// 允许直接输出到硬件缓冲区
  pub allow_buffer_handle_output: bool,
}

impl Acceleration {
  pub fn on() -> Self {
    Acceleration {
      enabled: true,
      allow_fp16: true,
      allow_buffer_handle_output: true,
    }
  }

  pub fn off() -> Self {
    Acceleration::default()
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
  pub threads: usize,
  pub acceleration: Acceleration,
}

impl EngineOptions {
  pub const DEFAULT_THREADS: usize = 4;

  pub fn new(use_acceleration: bool, threads: usize) -> Self {
    EngineOptions {
      threads: threads.max(1),
      acceleration: if use_acceleration {
        Acceleration::on()
      } else {
        Acceleration::off()
      },
    }
  }

  pub fn threads(mut self, threads: usize) -> Self {
    self.threads = threads.max(1);
    self
  }

  pub fn acceleration(mut self, acceleration: Acceleration) -> Self {
    self.acceleration = acceleration;
    self
  }
}

impl Default for EngineOptions {
  fn default() -> Self {
    EngineOptions::new(true, Self::DEFAULT_THREADS)
  }
}

/// 模型来源
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModelSource {
  /// 资源目录下的 `nsfw.tflite`
  #[default]
  Bundled,
  /// 显式给出的模型文件路径
  Path(PathBuf),
}

#[derive(Error, Debug)]
pub enum ModelSourceError {
  #[error("不支持的模型 URI 方案: {0}")]
  SchemeMismatch(String),
  #[error("模型路径为空")]
  EmptyPath,
  #[error("无法转换为本地文件路径: {0}")]
  NotAFilePath(String),
  #[error("未知的打包模型资源: {0}，只支持 {name}", name = DEFAULT_MODEL_NAME)]
  UnknownAsset(String),
}

const MODEL_FILE_SCHEME: &str = "file";
const MODEL_ASSET_SCHEME: &str = "asset";

impl FromUrl for ModelSource {
  type Error = ModelSourceError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      MODEL_ASSET_SCHEME => {
        // `asset:` 与 `asset:nsfw.tflite` 都指向默认资源
        let name = url.path().trim_start_matches('/');
        if name.is_empty() || name == DEFAULT_MODEL_NAME {
          Ok(ModelSource::Bundled)
        } else {
          Err(ModelSourceError::UnknownAsset(name.to_string()))
        }
      }
      MODEL_FILE_SCHEME => {
        if url.path().is_empty() || url.path() == "/" {
          return Err(ModelSourceError::EmptyPath);
        }
        let path = url
          .to_file_path()
          .map_err(|_| ModelSourceError::NotAFilePath(url.to_string()))?;
        Ok(ModelSource::Path(path))
      }
      other => Err(ModelSourceError::SchemeMismatch(other.to_string())),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_options_enable_acceleration_with_four_threads() {
    let options = EngineOptions::default();
    assert_eq!(options.threads, 4);
    assert!(options.acceleration.enabled);
    assert!(options.acceleration.allow_fp16);
  }

  #[test]
  fn cpu_options_have_no_fp16() {
    let options = EngineOptions::new(false, 0);
    assert_eq!(options.threads, 1);
    assert_eq!(options.acceleration, Acceleration::off());
  }

  #[test]
  fn model_source_from_url() {
    let url = Url::parse("file:///opt/models/nsfw.tflite").unwrap();
    assert_eq!(
      ModelSource::from_url(&url).unwrap(),
      ModelSource::Path(PathBuf::from("/opt/models/nsfw.tflite"))
    );

    let url = Url::parse("asset:nsfw.tflite").unwrap();
    assert_eq!(ModelSource::from_url(&url).unwrap(), ModelSource::Bundled);

    let url = Url::parse("asset:///nsfw.tflite").unwrap();
    assert_eq!(ModelSource::from_url(&url).unwrap(), ModelSource::Bundled);

    let url = Url::parse("asset:").unwrap();
    assert_eq!(ModelSource::from_url(&url).unwrap(), ModelSource::Bundled);

    let url = Url::parse("http://example.com/nsfw.tflite").unwrap();
    assert!(matches!(
      ModelSource::from_url(&url),
      Err(ModelSourceError::SchemeMismatch(_))
    ));
  }

  #[test]
  fn file_url_path_is_percent_decoded() {
    let url = Url::parse("file:///tmp/my%20models/nsfw.tflite").unwrap();
    assert_eq!(
      ModelSource::from_url(&url).unwrap(),
      ModelSource::Path(PathBuf::from("/tmp/my models/nsfw.tflite"))
    );
  }

  #[test]
  fn other_asset_names_are_rejected() {
    let url = Url::parse("asset:other.tflite").unwrap();
    assert!(matches!(
      ModelSource::from_url(&url),
      Err(ModelSourceError::UnknownAsset(name)) if name == "other.tflite"
    ));
  }
}
