// 该文件是 Sibian （四边） 项目的一部分。
// src/task.rs - 任务运行方式
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
  sync::atomic::Ordering,
  thread,
  time::{Duration, Instant},
};
use tracing::{debug, error, info, warn};

use crate::{
  input::RecordedFrame,
  output::Render,
  pipeline::Pipeline,
  scheduler::{InferenceScheduler, SkipReason, TickDecision},
};

/// 显示刷新节拍间隔
const DISPLAY_TICK: Duration = Duration::from_millis(16);
/// 状态文本刷新间隔
const STATUS_INTERVAL: Duration = Duration::from_millis(200);

pub trait Task<I, O>: Sized {
  type Error;
  fn run_task(self, input: I, pipeline: &Pipeline, output: O) -> Result<(), Self::Error>;
}

pub fn format_status(cycle: Duration, inference: Duration) -> String {
  format!(
    "cycle {:.1}ms / inference {:.1}ms",
    cycle.as_secs_f64() * 1000.0,
    inference.as_secs_f64() * 1000.0
  )
}

pub struct OneShotTask;

impl<
  IE: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Result<RecordedFrame, IE>>,
  O: Render<Error = RE>,
> Task<I, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, pipeline: &Pipeline, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))??;
    let (ctx, outputs) = frame.into_parts();
    info!("输入帧获取成功，开始后处理...");
    let now = Instant::now();
    let outcome = pipeline.process(outputs, ctx.source, ctx.display)?;
    let elapsed = now.elapsed();
    info!("后处理完成，耗时: {:.2?}", elapsed);
    output.render_result(&ctx, &outcome)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

pub struct RepeatShotTask {
  repeat: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { repeat: 1000 }
  }
}

impl RepeatShotTask {
  const WARM_UP: usize = 2;

  pub fn with_repeat(mut self, repeat: usize) -> Self {
    self.repeat = repeat.max(1);
    self
  }
}

impl<
  IE: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Result<RecordedFrame, IE>>,
  O: Render<Error = RE>,
> Task<I, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, pipeline: &Pipeline, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))??;
    let (ctx, outputs) = frame.into_parts();
    info!("输入帧获取成功，开始后处理...");
    let mut times = Vec::with_capacity(self.repeat);
    for i in 0..self.repeat {
      // 每次调用都独占一份输出张量
      let outputs = outputs.clone();
      let now = Instant::now();
      let outcome = pipeline.process(outputs, ctx.source, ctx.display)?;
      let elapsed = now.elapsed();
      debug!("({})后处理完成，耗时: {:.2?}", i, elapsed);
      output.render_result(&ctx, &outcome)?;
      times.push(elapsed);
    }

    let measured = if times.len() > Self::WARM_UP {
      &times[Self::WARM_UP..]
    } else {
      &times[..]
    };
    warn!(
      "平均后处理时间: {:.2?}",
      measured.iter().sum::<Duration>() / measured.len() as u32
    );

    Ok(())
  }
}

#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }
}

impl<
  IE: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Result<RecordedFrame, IE>>,
  O: Render<Error = RE>,
> Task<I, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, pipeline: &Pipeline, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let scheduler = InferenceScheduler::new(pipeline.config().max_fps);
    scheduler.init();

    let cancel = scheduler.cancel_handle();
    if let Err(err) = ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      cancel.store(false, Ordering::SeqCst);
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    }) {
      warn!("无法设置中断处理: {}", err);
    }

    let start = Instant::now();
    let mut processed = 0usize;
    let mut last_status: Option<Duration> = None;

    loop {
      let now = start.elapsed();
      let guard = match scheduler.try_begin(now) {
        TickDecision::Run(guard) => guard,
        TickDecision::Skipped(SkipReason::Stopped) => {
          warn!("中断信号接收，退出任务循环");
          break;
        }
        TickDecision::Skipped(reason) => {
          debug!("跳过节拍: {:?}", reason);
          thread::sleep(DISPLAY_TICK);
          continue;
        }
      };

      let Some(frame) = input.next() else {
        info!("输入结束");
        break;
      };
      let (ctx, outputs) = frame?.into_parts();
      debug!("处理第 {} 帧", ctx.index);

      let cycle_start = Instant::now();
      let inference = match pipeline.process(outputs, ctx.source, ctx.display) {
        Ok(outcome) => {
          let inference = cycle_start.elapsed();
          output.render_result(&ctx, &outcome)?;
          inference
        }
        Err(err) => {
          // 单帧失败不终止循环，清空显示
          error!("第 {} 帧处理失败: {}", ctx.index, err);
          let inference = cycle_start.elapsed();
          output.render_error(&ctx, &err)?;
          inference
        }
      };
      let cycle = cycle_start.elapsed();
      drop(guard);
      processed += 1;

      if last_status.is_none_or(|last| now.saturating_sub(last) >= STATUS_INTERVAL) {
        output.show_status(&format_status(cycle, inference))?;
        last_status = Some(now);
      }

      if self.frame_number.is_some_and(|n| processed >= n) {
        info!("达到指定帧数 {}, 退出任务循环", processed);
        break;
      }
    }

    scheduler.stop();
    info!("任务完成，共处理 {} 帧", processed);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_text_format() {
    let status = format_status(Duration::from_micros(12_340), Duration::from_micros(8_760));
    assert_eq!(status, "cycle 12.3ms / inference 8.8ms");
  }
}
