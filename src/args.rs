// 该文件是 Sibian （四边） 项目的一部分。
// src/args.rs - 项目参数配置
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

use clap::{Parser, ValueEnum};
use sibian::config::{ConfigError, PipelineConfig};
use url::Url;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
  /// 只处理第一帧
  Oneshot,
  /// 按节拍连续处理
  Continuous,
  /// 重复处理第一帧并统计耗时
  Repeatshot,
}

/// Sibian 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 输入来源
  /// 支持格式:
  /// - 推理记录: record:///path/to/dir 或 record:///path/to/frame.json
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 输出路径
  /// 支持格式:
  /// - 叠加图像: image:///path/to/overlay.png
  /// - JSON Lines: json:///path/to/result.jsonl
  /// - 日志: log://
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 流水线配置文件 (JSON)
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, value_name = "THRESHOLD")]
  pub confidence: Option<f32>,

  /// 掩码概率阈值 (0.0 - 1.0)
  #[arg(long, value_name = "THRESHOLD")]
  pub mask_threshold: Option<f32>,

  /// 最大推理帧率
  #[arg(long, value_name = "FPS")]
  pub max_fps: Option<u32>,

  /// 模型输入宽度
  #[arg(long, value_name = "PIXELS", requires = "model_height")]
  pub model_width: Option<u32>,

  /// 模型输入高度
  #[arg(long, value_name = "PIXELS", requires = "model_width")]
  pub model_height: Option<u32>,

  /// 最大处理帧数（仅连续模式）
  #[arg(long, value_name = "COUNT")]
  pub frame_number: Option<usize>,

  /// 运行方式
  #[arg(long, value_enum, default_value_t = Mode::Continuous)]
  pub mode: Mode,
}

impl Args {
  /// 配置文件加命令行覆盖
  pub fn pipeline_config(&self) -> Result<PipelineConfig, ConfigError> {
    let mut config = match &self.config {
      Some(path) => PipelineConfig::from_json_file(path)?,
      None => PipelineConfig::default(),
    };
    if let Some(threshold) = self.confidence {
      config = config.with_confidence_threshold(threshold);
    }
    if let Some(threshold) = self.mask_threshold {
      config = config.with_mask_threshold(threshold);
    }
    if let Some(max_fps) = self.max_fps {
      config = config.with_max_fps(max_fps);
    }
    if let (Some(width), Some(height)) = (self.model_width, self.model_height) {
      config = config.with_model_size(width, height);
    }
    config.validate()?;
    Ok(config)
  }
}
