// 该文件是 Sibian （四边） 项目的一部分。
// src/model/detect.rs - 检测张量解码
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

use tracing::debug;

use super::{
  DecodeError, RawTensor,
  heuristics::{CoordEncoding, ObjectnessChannel, ScoreEncoding, TensorLayout},
};
use crate::frame::{ModelSpace, Point2D};

/// 候选框，坐标位于模型输入像素空间
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateBox {
  pub x1: f32,
  pub y1: f32,
  pub x2: f32,
  pub y2: f32,
  pub score: f32,
  pub mask_coefficients: Box<[f32]>,
}

impl CandidateBox {
  pub fn top_left(&self) -> Point2D<ModelSpace> {
    Point2D::new(self.x1, self.y1)
  }

  pub fn bottom_right(&self) -> Point2D<ModelSpace> {
    Point2D::new(self.x2, self.y2)
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeParams {
  pub confidence_threshold: f32,
  pub model_width: f32,
  pub model_height: f32,
}

/// 检测张量 `[1, A, B]` 的按 (框, 通道) 访问视图，布局只判定一次
#[derive(Debug, Clone, Copy)]
pub struct DetectionView<'a> {
  data: &'a [f32],
  layout: TensorLayout,
  num_boxes: usize,
  num_channels: usize,
}

impl<'a> DetectionView<'a> {
  pub fn new(tensor: &'a RawTensor) -> Result<Self, DecodeError> {
    let &[batch, dim_a, dim_b] = tensor.shape() else {
      return Err(DecodeError::RankMismatch {
        name: "detection",
        expected: 3,
        actual: tensor.rank(),
      });
    };
    if batch != 1 {
      return Err(DecodeError::BatchMismatch {
        name: "detection",
        actual: batch,
      });
    }

    let layout = TensorLayout::resolve(dim_a, dim_b);
    let (num_channels, num_boxes) = match layout {
      TensorLayout::ChannelMajor => (dim_a, dim_b),
      TensorLayout::BoxMajor => (dim_b, dim_a),
    };
    debug!(
      "检测张量布局: {:?}, 框数 {}, 通道数 {}",
      layout, num_boxes, num_channels
    );

    Ok(Self {
      data: tensor.data(),
      layout,
      num_boxes,
      num_channels,
    })
  }

  pub fn layout(&self) -> TensorLayout {
    self.layout
  }

  pub fn num_boxes(&self) -> usize {
    self.num_boxes
  }

  pub fn num_channels(&self) -> usize {
    self.num_channels
  }

  /// 越界时返回 None
  pub fn get(&self, box_index: usize, channel_index: usize) -> Option<f32> {
    if box_index >= self.num_boxes || channel_index >= self.num_channels {
      return None;
    }
    let index = match self.layout {
      TensorLayout::ChannelMajor => channel_index * self.num_boxes + box_index,
      TensorLayout::BoxMajor => box_index * self.num_channels + channel_index,
    };
    self.data.get(index).copied()
  }

  fn value(&self, box_index: usize, channel_index: usize) -> f32 {
    self.get(box_index, channel_index).unwrap_or(0.0)
  }
}

/// 按给定目标度变体解码全部框，返回通过阈值的候选框（保持出现顺序）
pub fn decode_variant(
  view: &DetectionView<'_>,
  mask_channels: usize,
  variant: ObjectnessChannel,
  params: &DecodeParams,
) -> Vec<CandidateBox> {
  let Some(class_count) = variant.class_count(view.num_channels(), mask_channels) else {
    return Vec::new();
  };
  let class_base = variant.class_base();
  let coef_base = class_base + class_count;

  let mut boxes = Vec::new();
  for i in 0..view.num_boxes() {
    let raw = [
      view.value(i, 0),
      view.value(i, 1),
      view.value(i, 2),
      view.value(i, 3),
    ];
    let [cx, cy, w, h] =
      CoordEncoding::classify(raw).to_pixels(raw, params.model_width, params.model_height);

    let objectness = match variant {
      ObjectnessChannel::Present => ScoreEncoding::probability(view.value(i, 4)),
      ObjectnessChannel::Absent => 1.0,
    };

    let best_class = (0..class_count)
      .map(|c| view.value(i, class_base + c))
      .fold(f32::MIN, f32::max);
    let score = objectness * ScoreEncoding::probability(best_class);

    // NaN 分数同样丢弃
    if !(score >= params.confidence_threshold) {
      continue;
    }

    let mask_coefficients = (0..mask_channels)
      .map(|k| view.value(i, coef_base + k))
      .collect();

    boxes.push(CandidateBox {
      x1: cx - w / 2.0,
      y1: cy - h / 2.0,
      x2: cx + w / 2.0,
      y2: cy + h / 2.0,
      score,
      mask_coefficients,
    });
  }
  boxes
}

/// 解码检测张量并返回最高分的单个候选框。
///
/// 有/无目标度两种变体都会解码，取存活框更多的一种（相同时取无目标度变体）。
/// 没有任何框通过阈值时返回 `Ok(None)`。
pub fn decode_best(
  tensor: &RawTensor,
  mask_channels: usize,
  params: &DecodeParams,
) -> Result<Option<CandidateBox>, DecodeError> {
  let view = DetectionView::new(tensor)?;

  let without_objectness = decode_variant(&view, mask_channels, ObjectnessChannel::Absent, params);
  let with_objectness = decode_variant(&view, mask_channels, ObjectnessChannel::Present, params);
  debug!(
    "候选框数: 无目标度 {}, 有目标度 {}",
    without_objectness.len(),
    with_objectness.len()
  );

  let mut candidates = if with_objectness.len() > without_objectness.len() {
    with_objectness
  } else {
    without_objectness
  };

  // 稳定排序，同分时保留先出现的框
  candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
  Ok(candidates.into_iter().next())
}
