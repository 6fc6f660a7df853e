// 该文件是 NSFW Lens 项目的一部分。
// src/task.rs - 批量扫描任务
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

use tracing::{info, warn};

use crate::{
  classifier::{Classifier, NsfwError},
  input::PixelSource,
  model::ModelLoader,
  score::ScoreResult,
};

pub trait Task<I, C>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, classifier: C) -> Result<Self::Output, Self::Error>;
}

/// 待扫描的一张图像，解码失败时携带错误
pub struct ScanInput<P> {
  pub label: String,
  pub image: Result<P, NsfwError>,
}

impl<P> ScanInput<P> {
  pub fn new(label: impl Into<String>, image: Result<P, NsfwError>) -> Self {
    ScanInput {
      label: label.into(),
      image,
    }
  }

  pub fn ok(label: impl Into<String>, image: P) -> Self {
    Self::new(label, Ok(image))
  }
}

#[derive(Debug)]
pub struct ScanEntry {
  pub label: String,
  pub outcome: Result<ScoreResult, NsfwError>,
}

#[derive(Debug, Default)]
pub struct ScanReport {
  pub entries: Vec<ScanEntry>,
  pub elapsed: Duration,
}

impl ScanReport {
  pub fn succeeded(&self) -> impl Iterator<Item = (&str, &ScoreResult)> {
    self
      .entries
      .iter()
      .filter_map(|entry| entry.outcome.as_ref().ok().map(|r| (entry.label.as_str(), r)))
  }

  pub fn failed(&self) -> impl Iterator<Item = (&str, &NsfwError)> {
    self
      .entries
      .iter()
      .filter_map(|entry| entry.outcome.as_ref().err().map(|e| (entry.label.as_str(), e)))
  }

  pub fn success_count(&self) -> usize {
    self.succeeded().count()
  }

  pub fn failure_count(&self) -> usize {
    self.failed().count()
  }
}

/// 逐张扫描一批图像。单张失败只记录并跳过，不会中断整批。
#[derive(Default, Debug)]
pub struct BatchScanTask {
  limit: Option<usize>,
}

impl BatchScanTask {
  pub fn with_limit(mut self, limit: Option<usize>) -> Self {
    self.limit = limit;
    self
  }
}

impl<'a, P, I, L> Task<I, &'a Classifier<L>> for BatchScanTask
where
  P: PixelSource,
  I: Iterator<Item = ScanInput<P>>,
  L: ModelLoader,
{
  type Output = ScanReport;
  type Error = NsfwError;

  fn run_task(self, input: I, classifier: &'a Classifier<L>) -> Result<Self::Output, Self::Error> {
    if !classifier.is_initialized() {
      return Err(NsfwError::NotInitialized);
    }

    info!("开始批量扫描...");
    let start = Instant::now();
    let mut report = ScanReport::default();

    for (index, item) in input.enumerate() {
      if self.limit.map(|n| index >= n).unwrap_or(false) {
        info!("达到指定数量 {}, 停止扫描", index);
        break;
      }

      let outcome = item.image.and_then(|image| classifier.classify(image));
      match &outcome {
        Ok(result) => info!("({}) {}: {}", index, item.label, result),
        Err(e) => warn!("({}) {} 扫描失败，跳过: {}", index, item.label, e),
      }
      report.entries.push(ScanEntry {
        label: item.label,
        outcome,
      });
    }

    report.elapsed = start.elapsed();
    info!(
      "批量扫描完成: 成功 {}, 失败 {}, 耗时: {:.2?}",
      report.success_count(),
      report.failure_count(),
      report.elapsed
    );
    Ok(report)
  }
}
