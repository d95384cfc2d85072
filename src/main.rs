// 该文件是 Sibian （四边） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use args::{Args, Mode};
use sibian::{
  FromUrl,
  input::InputWrapper,
  output::OutputWrapper,
  pipeline::Pipeline,
  task::{ContinuousTask, OneShotTask, RepeatShotTask, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);
  info!("运行方式: {:?}", args.mode);

  let config = args.pipeline_config()?;
  info!(
    "置信度阈值: {}, 掩码阈值: {}, 最大帧率: {}, 模型输入: {}x{}",
    config.confidence_threshold,
    config.mask_threshold,
    config.max_fps,
    config.model_width,
    config.model_height
  );

  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?.with_overlay(config.overlay);
  let pipeline = Pipeline::new(config)?;

  match args.mode {
    Mode::Oneshot => OneShotTask.run_task(input, &pipeline, output)?,
    Mode::Continuous => ContinuousTask::default()
      .with_frame_number(args.frame_number)
      .run_task(input, &pipeline, output)?,
    Mode::Repeatshot => RepeatShotTask::default().run_task(input, &pipeline, output)?,
  }

  Ok(())
}
