// 该文件是 NSFW Lens 项目的一部分。
// src/classifier.rs - 分类器与引擎生命周期
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

use std::{
  any::Any,
  panic::{self, AssertUnwindSafe},
  path::{Path, PathBuf},
  sync::{Arc, Mutex, OnceLock, PoisonError, mpsc},
  thread::{self, JoinHandle},
  time::Instant,
};

use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
  dispatch::MainHandle,
  input::PixelSource,
  model::{DEFAULT_MODEL_NAME, EngineOptions, Model, ModelLoader, ModelSource},
  preprocess::Preprocessor,
  score::ScoreResult,
};

#[derive(Error, Debug)]
pub enum NsfwError {
  #[error("默认模型资源不存在: {0}")]
  ModelNotFound(PathBuf),
  #[error("模型加载错误: {path}: {reason}")]
  ModelLoadError { path: PathBuf, reason: String },
  #[error("分类器尚未初始化")]
  NotInitialized,
  #[error("图像无效: {0}")]
  InvalidImage(String),
  #[error("推理错误: {0}")]
  Inference(String),
  #[error("推理引擎在之前的调用中崩溃")]
  EnginePoisoned,
  #[error("图像读取错误: {path}: {reason}")]
  ImageRead { path: PathBuf, reason: String },
}

/// 资源目录的默认位置
pub const DEFAULT_ASSET_DIR: &str = "assets";

struct Engine<M> {
  model: Mutex<M>,
  options: EngineOptions,
  path: PathBuf,
}

/// 持有唯一推理引擎的分类器句柄，应用启动时创建一次，按引用共享给所有调用方
pub struct Classifier<L: ModelLoader> {
  loader: L,
  asset_dir: PathBuf,
  preprocessor: Preprocessor,
  engine: OnceLock<Engine<L::Model>>,
  init_lock: Mutex<()>,
}

pub struct ClassifierBuilder<L> {
  loader: L,
  asset_dir: PathBuf,
  preprocessor: Preprocessor,
}

impl<L: ModelLoader> ClassifierBuilder<L> {
  pub fn asset_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.asset_dir = dir.into();
    self
  }

  pub fn preprocessor(mut self, preprocessor: Preprocessor) -> Self {
    self.preprocessor = preprocessor;
    self
  }

  pub fn build(self) -> Classifier<L> {
    Classifier {
      loader: self.loader,
      asset_dir: self.asset_dir,
      preprocessor: self.preprocessor,
      engine: OnceLock::new(),
      init_lock: Mutex::new(()),
    }
  }
}

impl<L: ModelLoader> Classifier<L> {
  pub fn builder(loader: L) -> ClassifierBuilder<L> {
    ClassifierBuilder {
      loader,
      asset_dir: PathBuf::from(DEFAULT_ASSET_DIR),
      preprocessor: Preprocessor::default(),
    }
  }

  pub fn new(loader: L) -> Self {
    Self::builder(loader).build()
  }

  pub fn is_initialized(&self) -> bool {
    self.engine.get().is_some()
  }

  /// 初始化时使用的引擎配置
  pub fn options(&self) -> Option<EngineOptions> {
    self.engine.get().map(|engine| engine.options)
  }

  /// 已加载模型的路径
  pub fn model_path(&self) -> Option<&Path> {
    self.engine.get().map(|engine| engine.path.as_path())
  }

  /// 加载模型并创建推理引擎。已初始化时直接返回，不会重复加载。
  /// 失败时分类器保持未初始化状态，可以换一个模型来源重试。
  pub fn initialize(&self, source: ModelSource, options: EngineOptions) -> Result<(), NsfwError> {
    let _guard = self.init_lock.lock().unwrap_or_else(PoisonError::into_inner);

    if let Some(engine) = self.engine.get() {
      debug!(
        "分类器已使用 {} 初始化，跳过本次初始化",
        engine.path.display()
      );
      return Ok(());
    }

    let (path, bundled) = match source {
      ModelSource::Bundled => {
        debug!(
          "未指定模型路径，尝试读取资源目录下的 '{}'",
          DEFAULT_MODEL_NAME
        );
        (self.asset_dir.join(DEFAULT_MODEL_NAME), true)
      }
      ModelSource::Path(path) => (path, false),
    };

    info!("加载模型文件: {}", path.display());
    let model_data = match std::fs::read(&path) {
      Ok(data) => data,
      Err(e) if bundled && e.kind() == std::io::ErrorKind::NotFound => {
        error!("资源目录中没有找到模型: {}", path.display());
        return Err(NsfwError::ModelNotFound(path));
      }
      Err(e) => {
        error!("无法读取模型文件 {}: {}", path.display(), e);
        return Err(NsfwError::ModelLoadError {
          path,
          reason: e.to_string(),
        });
      }
    };
    debug!(
      "模型文件大小: {:.2} MB",
      model_data.len() as f64 / (1024.0 * 1024.0)
    );

    let model = self.loader.load(&model_data, &options).map_err(|e| {
      error!("模型无效 {}: {}", path.display(), e);
      NsfwError::ModelLoadError {
        path: path.clone(),
        reason: e.to_string(),
      }
    })?;

    info!(
      "分类器初始化完成，线程数: {}, 硬件加速: {}",
      options.threads,
      if options.acceleration.enabled {
        "已开启"
      } else {
        "未开启"
      }
    );

    // 持有 init_lock，不会与其它初始化竞争
    let _ = self.engine.set(Engine {
      model: Mutex::new(model),
      options,
      path,
    });

    Ok(())
  }

  /// 同步分类。预处理可并行，推理在引擎锁内串行执行。
  pub fn classify<I: PixelSource>(&self, image: I) -> Result<ScoreResult, NsfwError> {
    let engine = self.engine.get().ok_or(NsfwError::NotInitialized)?;

    let preprocessed = self.preprocessor.run(image)?;

    let (raw, scan_duration) = {
      let mut model = engine.model.lock().map_err(|_| NsfwError::EnginePoisoned)?;
      let now = Instant::now();
      let raw = model
        .infer(&preprocessed.tensor)
        .map_err(|e| NsfwError::Inference(e.to_string()))?;
      (raw, now.elapsed())
    };
    drop(preprocessed.tensor);

    let result = ScoreResult::from_raw(raw, preprocessed.duration, scan_duration);
    debug!("分类完成: {:?} -> {}", raw, result);
    Ok(result)
  }

  /// 与 `classify` 相同，但推理引擎崩溃时返回 `Inference` 错误而不是继续展开。
  /// 引擎锁随之中毒，之后的调用得到 `EnginePoisoned`。
  fn classify_catching<I: PixelSource>(&self, image: I) -> Result<ScoreResult, NsfwError> {
    panic::catch_unwind(AssertUnwindSafe(|| self.classify(image))).unwrap_or_else(|payload| {
      let reason = panic_message(payload.as_ref());
      error!("推理过程崩溃: {}", reason);
      Err(NsfwError::Inference(format!("推理过程崩溃: {}", reason)))
    })
  }

  /// 解码图像文件后分类
  #[cfg(feature = "read_image_file")]
  pub fn classify_file(&self, path: impl AsRef<Path>) -> Result<ScoreResult, NsfwError> {
    let path = path.as_ref();
    if !self.is_initialized() {
      return Err(NsfwError::NotInitialized);
    }
    let image = crate::input::ImageFileInput::open(path)
      .map_err(|e| e.into_nsfw(path))?
      .into_image();
    self.classify(image)
  }
}

impl<L> Classifier<L>
where
  L: ModelLoader + Send + Sync + 'static,
{
  /// 在工作线程上分类，结果（包括错误）通过 `main` 投递给 `on_result`。
  /// 一旦派发无法取消。
  pub fn classify_async<I, F>(
    self: &Arc<Self>,
    image: I,
    main: &MainHandle,
    on_result: F,
  ) -> JoinHandle<()>
  where
    I: PixelSource + Send + 'static,
    F: FnOnce(Result<ScoreResult, NsfwError>) + Send + 'static,
  {
    let classifier = Arc::clone(self);
    let main = main.clone();
    thread::spawn(move || {
      let result = classifier.classify_catching(image);
      main.post(move || on_result(result));
    })
  }

  /// 在工作线程上分类，结果通过通道返回
  pub fn classify_channel<I>(self: &Arc<Self>, image: I) -> mpsc::Receiver<Result<ScoreResult, NsfwError>>
  where
    I: PixelSource + Send + 'static,
  {
    let (tx, rx) = mpsc::channel();
    let classifier = Arc::clone(self);
    thread::spawn(move || {
      let _ = tx.send(classifier.classify_catching(image));
    });
    rx
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    message.to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "未知错误".to_string()
  }
}
