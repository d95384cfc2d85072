// 该文件是 Sibian （四边） 项目的一部分。
// src/model/heuristics.rs - 输出格式判定表
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

//! 不同导出流程产生的检测张量格式不一，解码前需在运行时判定四项格式：
//!
//! | 判定项       | 条件                          | 结果                       |
//! |--------------|-------------------------------|----------------------------|
//! | 轴布局       | `A <= B`（形状 `[1, A, B]`）  | 通道优先，否则框优先       |
//! | 坐标归一化   | cx, cy, w, h 均在 `[0, 1.5]`  | 归一化，否则像素坐标       |
//! | 目标度编码   | 原始值在 `[0, 1]`             | 概率，否则 logit           |
//! | 类别分数编码 | 最大类别值在 `[0, 1]`         | 概率，否则 logit           |
//!
//! 此外是否存在独立的目标度通道无法由形状判定，由解码器对两种情况都解码后
//! 按存活框数选择。

/// 归一化坐标的上限，留出超出 1 的余量
pub const NORMALIZED_COORD_LIMIT: f32 = 1.5;

pub fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}

/// 检测张量的轴布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
  /// `[1, C, N]`，下标 `c * N + b`
  ChannelMajor,
  /// `[1, N, C]`，下标 `b * C + c`
  BoxMajor,
}

impl TensorLayout {
  pub fn resolve(dim_a: usize, dim_b: usize) -> Self {
    if dim_a <= dim_b {
      TensorLayout::ChannelMajor
    } else {
      TensorLayout::BoxMajor
    }
  }
}

/// 框参数的坐标编码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordEncoding {
  Normalized,
  Pixel,
}

impl CoordEncoding {
  pub fn classify(params: [f32; 4]) -> Self {
    if params
      .iter()
      .all(|v| (0.0..=NORMALIZED_COORD_LIMIT).contains(v))
    {
      CoordEncoding::Normalized
    } else {
      CoordEncoding::Pixel
    }
  }

  /// 转为模型输入像素坐标 (cx, cy, w, h)
  pub fn to_pixels(self, params: [f32; 4], model_width: f32, model_height: f32) -> [f32; 4] {
    match self {
      CoordEncoding::Normalized => [
        params[0] * model_width,
        params[1] * model_height,
        params[2] * model_width,
        params[3] * model_height,
      ],
      CoordEncoding::Pixel => params,
    }
  }
}

/// 分数编码：已经是概率，或是需要 sigmoid 的 logit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreEncoding {
  Probability,
  Logit,
}

impl ScoreEncoding {
  pub fn classify(raw: f32) -> Self {
    if (0.0..=1.0).contains(&raw) {
      ScoreEncoding::Probability
    } else {
      ScoreEncoding::Logit
    }
  }

  pub fn probability(raw: f32) -> f32 {
    match Self::classify(raw) {
      ScoreEncoding::Probability => raw,
      ScoreEncoding::Logit => sigmoid(raw),
    }
  }
}

/// 通道布局变体：是否在通道 4 上带有独立的目标度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectnessChannel {
  Present,
  Absent,
}

impl ObjectnessChannel {
  pub fn class_base(self) -> usize {
    match self {
      ObjectnessChannel::Present => 5,
      ObjectnessChannel::Absent => 4,
    }
  }

  /// 类别数 = 总通道 - 框(4) - [目标度] - 掩码系数；不为正时返回 None
  pub fn class_count(self, num_channels: usize, mask_channels: usize) -> Option<usize> {
    num_channels
      .checked_sub(self.class_base() + mask_channels)
      .filter(|count| *count > 0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn layout_follows_smaller_axis() {
    assert_eq!(TensorLayout::resolve(40, 1200), TensorLayout::ChannelMajor);
    assert_eq!(TensorLayout::resolve(1200, 40), TensorLayout::BoxMajor);
    assert_eq!(TensorLayout::resolve(64, 64), TensorLayout::ChannelMajor);
  }

  #[test]
  fn coord_encoding_boundaries() {
    assert_eq!(
      CoordEncoding::classify([0.5, 0.5, 1.5, 0.0]),
      CoordEncoding::Normalized
    );
    assert_eq!(
      CoordEncoding::classify([0.5, 0.5, 1.51, 0.2]),
      CoordEncoding::Pixel
    );
    assert_eq!(
      CoordEncoding::classify([-0.01, 0.5, 0.2, 0.2]),
      CoordEncoding::Pixel
    );
    let pixels = CoordEncoding::Normalized.to_pixels([0.5, 0.25, 0.1, 0.2], 384.0, 640.0);
    for (got, want) in pixels.iter().zip([192.0, 160.0, 38.4, 128.0]) {
      assert!((got - want).abs() < 1e-4, "{got} != {want}");
    }
    let raw = [12.0, 30.0, 4.0, 8.0];
    assert_eq!(CoordEncoding::Pixel.to_pixels(raw, 384.0, 640.0), raw);
  }

  #[test]
  fn score_encoding_squashes_only_logits() {
    assert_eq!(ScoreEncoding::probability(0.7), 0.7);
    assert_eq!(ScoreEncoding::probability(0.0), 0.0);
    assert_eq!(ScoreEncoding::probability(1.0), 1.0);
    assert_eq!(ScoreEncoding::classify(3.0), ScoreEncoding::Logit);
    assert!((ScoreEncoding::probability(3.0) - 0.952_574_1).abs() < 1e-6);
    assert!(ScoreEncoding::probability(-4.0) < 0.02);
  }

  #[test]
  fn class_count_per_variant() {
    assert_eq!(ObjectnessChannel::Absent.class_count(40, 32), Some(4));
    assert_eq!(ObjectnessChannel::Present.class_count(40, 32), Some(3));
    assert_eq!(ObjectnessChannel::Present.class_count(37, 32), None);
    assert_eq!(ObjectnessChannel::Absent.class_count(10, 32), None);
  }
}
