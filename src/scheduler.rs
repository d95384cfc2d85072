// 该文件是 Sibian （四边） 项目的一部分。
// src/scheduler.rs - 推理节拍调度
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
  cell::Cell,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  time::Duration,
};

use tracing::debug;

/// 节拍被跳过的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
  Stopped,
  /// 上一次调用仍在执行，本次节拍直接丢弃
  Busy,
  /// 距上一次调用不足最小间隔
  TooEarly,
}

/// 单线程协作式调度器。
///
/// 每个显示刷新节拍调用一次 [`InferenceScheduler::try_begin`]；同一时刻至多一次调用在执行，
/// 执行期间到来的节拍被丢弃而不是排队。运行标志可由外部（例如 Ctrl-C 处理器）清除。
#[derive(Debug)]
pub struct InferenceScheduler {
  min_interval: Duration,
  last_tick: Cell<Option<Duration>>,
  busy: Cell<bool>,
  running: Arc<AtomicBool>,
}

/// 执行中的调用，释放时清除忙标志
#[derive(Debug)]
pub struct TickGuard<'a> {
  busy: &'a Cell<bool>,
}

impl Drop for TickGuard<'_> {
  fn drop(&mut self) {
    self.busy.set(false);
  }
}

#[derive(Debug)]
pub enum TickDecision<'a> {
  Run(TickGuard<'a>),
  Skipped(SkipReason),
}

impl InferenceScheduler {
  pub fn new(max_fps: u32) -> Self {
    let min_interval = Duration::from_secs(1) / max_fps.max(1);
    Self {
      min_interval,
      last_tick: Cell::new(None),
      busy: Cell::new(false),
      running: Arc::new(AtomicBool::new(false)),
    }
  }

  pub fn min_interval(&self) -> Duration {
    self.min_interval
  }

  /// 开始运行
  pub fn init(&self) {
    self.reset();
    self.running.store(true, Ordering::SeqCst);
    debug!("调度器启动, 最小间隔 {:.2?}", self.min_interval);
  }

  /// 清除忙标志与上次节拍时间，不改变运行状态
  pub fn reset(&self) {
    self.busy.set(false);
    self.last_tick.set(None);
  }

  pub fn stop(&self) {
    self.running.store(false, Ordering::SeqCst);
    debug!("调度器停止");
  }

  pub fn is_running(&self) -> bool {
    self.running.load(Ordering::SeqCst)
  }

  pub fn is_busy(&self) -> bool {
    self.busy.get()
  }

  /// 外部取消句柄，清除后所有节拍都成为空操作
  pub fn cancel_handle(&self) -> Arc<AtomicBool> {
    Arc::clone(&self.running)
  }

  /// `now` 为单调时钟上的节拍时间
  pub fn try_begin(&self, now: Duration) -> TickDecision<'_> {
    if !self.is_running() {
      return TickDecision::Skipped(SkipReason::Stopped);
    }
    if self.busy.get() {
      return TickDecision::Skipped(SkipReason::Busy);
    }
    if let Some(last) = self.last_tick.get()
      && now.saturating_sub(last) < self.min_interval
    {
      return TickDecision::Skipped(SkipReason::TooEarly);
    }

    self.last_tick.set(Some(now));
    self.busy.set(true);
    TickDecision::Run(TickGuard { busy: &self.busy })
  }
}
