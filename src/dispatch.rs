// 该文件是 NSFW Lens 项目的一部分。
// src/dispatch.rs - 主线程回调队列
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
  sync::mpsc::{self, Receiver, RecvTimeoutError, Sender},
  time::Duration,
};

use tracing::warn;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// 回调的执行上下文。拥有者线程（通常是 UI 线程）调用 `pump` 执行回调。
pub struct MainContext {
  tx: Sender<Job>,
  rx: Receiver<Job>,
}

/// 可跨线程投递回调的句柄
#[derive(Clone)]
pub struct MainHandle {
  tx: Sender<Job>,
}

impl MainHandle {
  pub fn post(&self, job: impl FnOnce() + Send + 'static) {
    if self.tx.send(Box::new(job)).is_err() {
      warn!("主线程上下文已释放，丢弃回调");
    }
  }
}

impl Default for MainContext {
  fn default() -> Self {
    Self::new()
  }
}

impl MainContext {
  pub fn new() -> Self {
    let (tx, rx) = mpsc::channel();
    MainContext { tx, rx }
  }

  pub fn handle(&self) -> MainHandle {
    MainHandle {
      tx: self.tx.clone(),
    }
  }

  /// 执行所有已排队的回调，返回执行数量
  pub fn pump(&self) -> usize {
    let mut count = 0;
    while let Ok(job) = self.rx.try_recv() {
      job();
      count += 1;
    }
    count
  }

  /// 至多等待 `timeout` 直到有回调到达，然后执行所有已排队的回调
  pub fn pump_wait(&self, timeout: Duration) -> usize {
    match self.rx.recv_timeout(timeout) {
      Ok(job) => {
        job();
        1 + self.pump()
      }
      Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
    }
  }
}

#[cfg(test)]
mod tests {
  use std::{
    sync::{Arc, Mutex},
    thread,
  };

  use super::*;

  #[test]
  fn jobs_run_on_pumping_thread() {
    let main = MainContext::new();
    let seen = Arc::new(Mutex::new(None));
    let handle = main.handle();
    let slot = seen.clone();
    thread::spawn(move || {
      handle.post(move || {
        *slot.lock().unwrap() = Some(thread::current().id());
      });
    })
    .join()
    .unwrap();

    assert_eq!(main.pump(), 1);
    assert_eq!(*seen.lock().unwrap(), Some(thread::current().id()));
  }

  #[test]
  fn pump_wait_times_out_when_idle() {
    let main = MainContext::new();
    assert_eq!(main.pump_wait(Duration::from_millis(10)), 0);
  }

  #[test]
  fn posting_after_drop_is_harmless() {
    let main = MainContext::new();
    let handle = main.handle();
    drop(main);
    handle.post(|| panic!("should not run"));
  }
}
