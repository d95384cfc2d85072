// 该文件是 Sibian （四边） 项目的一部分。
// src/input.rs - 推理结果输入
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

use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Dimensions, model::InferenceOutputs};

mod record;
pub use self::record::{FrameRecord, RecordInput, RecordInputError, TensorRecord};

/// 一帧推理结果以外的上下文
#[derive(Debug, Clone, PartialEq)]
pub struct FrameContext {
  pub index: usize,
  /// 推理所用视频帧尺寸
  pub source: Dimensions,
  pub display: Dimensions,
  /// 原始帧图像，用于渲染背景
  pub image: Option<PathBuf>,
}

/// 一帧输入：上下文与推理输出
#[derive(Debug, Clone)]
pub struct RecordedFrame {
  pub context: FrameContext,
  pub outputs: InferenceOutputs,
}

impl RecordedFrame {
  pub fn into_parts(self) -> (FrameContext, InferenceOutputs) {
    (self.context, self.outputs)
  }
}

#[derive(Error, Debug)]
pub enum InputError {
  #[error("推理记录输入错误: {0}")]
  RecordInputError(#[from] RecordInputError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum InputWrapper {
  Record(RecordInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      RecordInput::SCHEME => Ok(InputWrapper::Record(RecordInput::from_url(url)?)),
      other => Err(InputError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Iterator for InputWrapper {
  type Item = Result<RecordedFrame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapper::Record(input) => input.next().map(|r| r.map_err(InputError::from)),
    }
  }
}
