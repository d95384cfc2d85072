// 该文件是 Sibian （四边） 项目的一部分。
// src/output/log_output.rs - 日志输出
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

use std::convert::Infallible;

use tracing::{error, info, warn};

use crate::{
  input::FrameContext,
  output::Render,
  pipeline::{FrameOutcome, PipelineError},
};

/// `log://`：结果只写入日志
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOutput;

impl LogOutput {
  pub const SCHEME: &'static str = "log";
}

impl Render for LogOutput {
  type Error = Infallible;

  fn render_result(&self, ctx: &FrameContext, outcome: &FrameOutcome) -> Result<(), Self::Error> {
    match outcome {
      FrameOutcome::Empty(reason) => {
        info!("第 {} 帧: 无结果 ({})", ctx.index, reason.as_str());
      }
      FrameOutcome::Detected(detection) => match &detection.quad {
        Ok(quad) => info!(
          "第 {} 帧: 分数 {:.3}, 四边形 TL ({:.1}, {:.1}) TR ({:.1}, {:.1}) BR ({:.1}, {:.1}) BL ({:.1}, {:.1})",
          ctx.index,
          detection.candidate.score,
          quad.top_left.x,
          quad.top_left.y,
          quad.top_right.x,
          quad.top_right.y,
          quad.bottom_right.x,
          quad.bottom_right.y,
          quad.bottom_left.x,
          quad.bottom_left.y
        ),
        Err(failure) => warn!(
          "第 {} 帧: 分数 {:.3}, 掩码前景 {} 像素, 无四边形: {}",
          ctx.index,
          detection.candidate.score,
          detection.mask.foreground_count(),
          failure
        ),
      },
    }
    Ok(())
  }

  fn render_error(&self, ctx: &FrameContext, err: &PipelineError) -> Result<(), Self::Error> {
    error!("第 {} 帧处理失败: {}", ctx.index, err);
    Ok(())
  }

  fn show_status(&self, status: &str) -> Result<(), Self::Error> {
    info!("{}", status);
    Ok(())
  }
}
