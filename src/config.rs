// 该文件是 Sibian （四边） 项目的一部分。
// src/config.rs - 流水线配置
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

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::frame::Dimensions;

const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.6;
const DEFAULT_MASK_THRESHOLD: f32 = 0.9;
const DEFAULT_MAX_FPS: u32 = 10;
const DEFAULT_MODEL_WIDTH: u32 = 384;
const DEFAULT_MODEL_HEIGHT: u32 = 384;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("置信度阈值必须位于 (0, 1] 区间, 实际为 {0}")]
  InvalidConfidence(f32),
  #[error("掩码阈值必须位于 (0, 1) 区间, 实际为 {0}")]
  InvalidMaskThreshold(f32),
  #[error("叠加层透明度必须位于 [0, 1] 区间, 实际为 {0}")]
  InvalidAlpha(f32),
  #[error("模型输入尺寸无效: {0}x{1}")]
  InvalidModelSize(u32, u32),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("配置文件解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
}

/// 掩码叠加层颜色
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverlayColor {
  pub r: u8,
  pub g: u8,
  pub b: u8,
  /// 不透明度 [0, 1]
  pub alpha: f32,
}

impl Default for OverlayColor {
  fn default() -> Self {
    Self {
      r: 255,
      g: 0,
      b: 0,
      alpha: 0.45,
    }
  }
}

impl OverlayColor {
  /// 前景像素的 RGBA 值
  pub fn rgba(&self) -> [u8; 4] {
    let alpha = (self.alpha * 255.0).round().clamp(0.0, 255.0) as u8;
    [self.r, self.g, self.b, alpha]
  }
}

/// 流水线配置，构造后不可修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
  /// 检测置信度阈值
  pub confidence_threshold: f32,
  /// 掩码概率阈值
  pub mask_threshold: f32,
  /// 最大推理帧率
  pub max_fps: u32,
  pub model_width: u32,
  pub model_height: u32,
  pub overlay: OverlayColor,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      mask_threshold: DEFAULT_MASK_THRESHOLD,
      max_fps: DEFAULT_MAX_FPS,
      model_width: DEFAULT_MODEL_WIDTH,
      model_height: DEFAULT_MODEL_HEIGHT,
      overlay: OverlayColor::default(),
    }
  }
}

impl PipelineConfig {
  pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    debug!("读取配置文件: {}", path.display());
    let text = std::fs::read_to_string(path)?;
    let config: PipelineConfig = serde_json::from_str(&text)?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if !(self.confidence_threshold > 0.0 && self.confidence_threshold <= 1.0) {
      return Err(ConfigError::InvalidConfidence(self.confidence_threshold));
    }
    // 阈值为 0 或 1 时对数几率无意义
    if !(self.mask_threshold > 0.0 && self.mask_threshold < 1.0) {
      return Err(ConfigError::InvalidMaskThreshold(self.mask_threshold));
    }
    if !(0.0..=1.0).contains(&self.overlay.alpha) {
      return Err(ConfigError::InvalidAlpha(self.overlay.alpha));
    }
    if self.model_width == 0 || self.model_height == 0 {
      return Err(ConfigError::InvalidModelSize(
        self.model_width,
        self.model_height,
      ));
    }
    Ok(())
  }

  pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn with_mask_threshold(mut self, threshold: f32) -> Self {
    self.mask_threshold = threshold;
    self
  }

  pub fn with_max_fps(mut self, max_fps: u32) -> Self {
    self.max_fps = max_fps;
    self
  }

  pub fn with_model_size(mut self, width: u32, height: u32) -> Self {
    self.model_width = width;
    self.model_height = height;
    self
  }

  pub fn with_overlay(mut self, overlay: OverlayColor) -> Self {
    self.overlay = overlay;
    self
  }

  pub fn model_dimensions(&self) -> Dimensions {
    Dimensions::new(self.model_width, self.model_height)
  }
}
