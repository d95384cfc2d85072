// 该文件是 Sibian （四边） 项目的一部分。
// src/output.rs - 输出定义
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

use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  config::OverlayColor,
  input::FrameContext,
  pipeline::{FrameOutcome, PipelineError},
};

/// 显示端：接收每帧结果与状态文本
pub trait Render: Sized {
  type Error;

  fn render_result(&self, ctx: &FrameContext, outcome: &FrameOutcome) -> Result<(), Self::Error>;

  /// 处理失败的帧，显示内容必须被清空
  fn render_error(&self, ctx: &FrameContext, error: &PipelineError) -> Result<(), Self::Error>;

  fn show_status(&self, status: &str) -> Result<(), Self::Error> {
    debug!("状态: {}", status);
    Ok(())
  }
}

#[cfg(feature = "save_image_file")]
pub mod draw;

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

mod json_record;
pub use self::json_record::{JsonRecordError, JsonRecordOutput};

mod log_output;
pub use self::log_output::LogOutput;

#[derive(Error, Debug)]
pub enum OutputError {
  #[cfg(feature = "save_image_file")]
  #[error("保存图像文件错误: {0}")]
  SaveImageFileError(#[from] SaveImageFileError),
  #[error("JSON 记录输出错误: {0}")]
  JsonRecordError(#[from] JsonRecordError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum OutputWrapper {
  #[cfg(feature = "save_image_file")]
  SaveImageFileOutput(SaveImageFileOutput),
  JsonRecordOutput(JsonRecordOutput),
  LogOutput(LogOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      #[cfg(feature = "save_image_file")]
      SaveImageFileOutput::SCHEME => {
        let output = SaveImageFileOutput::from_url(url)?;
        Ok(OutputWrapper::SaveImageFileOutput(output))
      }
      JsonRecordOutput::SCHEME => {
        let output = JsonRecordOutput::from_url(url)?;
        Ok(OutputWrapper::JsonRecordOutput(output))
      }
      LogOutput::SCHEME => Ok(OutputWrapper::LogOutput(LogOutput)),
      other => Err(OutputError::SchemeMismatch(other.to_string())),
    }
  }
}

impl OutputWrapper {
  /// 掩码叠加颜色，只对图像输出有效
  #[cfg_attr(not(feature = "save_image_file"), allow(unused_variables))]
  pub fn with_overlay(self, overlay: OverlayColor) -> Self {
    match self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => {
        OutputWrapper::SaveImageFileOutput(output.with_overlay(overlay))
      }
      other => other,
    }
  }
}

impl Render for OutputWrapper {
  type Error = OutputError;

  fn render_result(&self, ctx: &FrameContext, outcome: &FrameOutcome) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output
        .render_result(ctx, outcome)
        .map_err(OutputError::from),
      OutputWrapper::JsonRecordOutput(output) => output
        .render_result(ctx, outcome)
        .map_err(OutputError::from),
      OutputWrapper::LogOutput(output) => output.render_result(ctx, outcome).map_err(|e| match e {}),
    }
  }

  fn render_error(&self, ctx: &FrameContext, error: &PipelineError) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => output
        .render_error(ctx, error)
        .map_err(OutputError::from),
      OutputWrapper::JsonRecordOutput(output) => output
        .render_error(ctx, error)
        .map_err(OutputError::from),
      OutputWrapper::LogOutput(output) => output.render_error(ctx, error).map_err(|e| match e {}),
    }
  }

  fn show_status(&self, status: &str) -> Result<(), Self::Error> {
    match self {
      #[cfg(feature = "save_image_file")]
      OutputWrapper::SaveImageFileOutput(output) => {
        output.show_status(status).map_err(OutputError::from)
      }
      OutputWrapper::JsonRecordOutput(output) => {
        output.show_status(status).map_err(OutputError::from)
      }
      OutputWrapper::LogOutput(output) => output.show_status(status).map_err(|e| match e {}),
    }
  }
}
