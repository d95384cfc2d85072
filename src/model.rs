// 该文件是 Sibian （四边） 项目的一部分。
// src/model.rs - 模型输出解码
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

pub mod heuristics;

mod classify;
mod detect;
mod mask;
mod tensor;

pub use self::classify::{ClassifiedOutputs, classify_outputs};
pub use self::detect::{CandidateBox, DecodeParams, DetectionView, decode_best, decode_variant};
pub use self::mask::{BinaryMask, MaskParams, PrototypeView, decode_mask, mask_logit_threshold};
pub use self::tensor::{InferenceOutputs, RawTensor, TensorError};

#[derive(Error, Debug)]
pub enum DecodeError {
  #[error("张量 {name} 维度数错误: 期望 {expected}, 实际 {actual}")]
  RankMismatch {
    name: &'static str,
    expected: usize,
    actual: usize,
  },
  #[error("张量 {name} 的批大小必须为 1, 实际为 {actual}")]
  BatchMismatch { name: &'static str, actual: usize },
  #[error("张量 {name} 存在长度为 0 的维度: {shape:?}")]
  EmptyDimension {
    name: &'static str,
    shape: Vec<usize>,
  },
  #[error("输出 {0} 形状符合检测/原型张量但批大小不为 1: {1:?}")]
  MalformedOutput(String, Vec<usize>),
}
