// 该文件是 Sibian （四边） 项目的一部分。
// src/model/mask.rs - 原型掩码重建
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

use super::{CandidateBox, DecodeError, RawTensor};
use crate::{
  config::OverlayColor,
  frame::{ModelRoi, Roi},
};

/// ROI 大小的二值掩码，取值 0 或 1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
  width: usize,
  height: usize,
  data: Box<[u8]>,
}

impl BinaryMask {
  pub fn new(width: usize, height: usize) -> Self {
    Self {
      width,
      height,
      data: vec![0u8; width * height].into_boxed_slice(),
    }
  }

  pub fn from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> bool) -> Self {
    let data = (0..height)
      .flat_map(|y| (0..width).map(move |x| (x, y)))
      .map(|(x, y)| f(x, y) as u8)
      .collect();
    Self {
      width,
      height,
      data,
    }
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn height(&self) -> usize {
    self.height
  }

  /// 越界读取视为背景
  pub fn get(&self, x: usize, y: usize) -> u8 {
    if x >= self.width || y >= self.height {
      return 0;
    }
    self.data[y * self.width + x]
  }

  pub fn as_slice(&self) -> &[u8] {
    &self.data
  }

  pub fn foreground_count(&self) -> usize {
    self.data.iter().filter(|v| **v != 0).count()
  }

  /// 生成 RGBA 叠加层，背景完全透明
  pub fn to_rgba(&self, color: &OverlayColor) -> Vec<u8> {
    let foreground = color.rgba();
    self
      .data
      .iter()
      .flat_map(|v| if *v != 0 { foreground } else { [0; 4] })
      .collect()
  }
}

/// 原型张量 `[1, M, H, W]` 的视图
#[derive(Debug, Clone, Copy)]
pub struct PrototypeView<'a> {
  data: &'a [f32],
  channels: usize,
  height: usize,
  width: usize,
}

impl<'a> PrototypeView<'a> {
  pub fn new(tensor: &'a RawTensor) -> Result<Self, DecodeError> {
    let &[batch, channels, height, width] = tensor.shape() else {
      return Err(DecodeError::RankMismatch {
        name: "prototype",
        expected: 4,
        actual: tensor.rank(),
      });
    };
    if batch != 1 {
      return Err(DecodeError::BatchMismatch {
        name: "prototype",
        actual: batch,
      });
    }
    if channels == 0 || height == 0 || width == 0 {
      return Err(DecodeError::EmptyDimension {
        name: "prototype",
        shape: tensor.shape().to_vec(),
      });
    }
    Ok(Self {
      data: tensor.data(),
      channels,
      height,
      width,
    })
  }

  pub fn channels(&self) -> usize {
    self.channels
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  fn planes(&self) -> std::slice::ChunksExact<'a, f32> {
    self.data.chunks_exact(self.height * self.width)
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskParams {
  /// 掩码概率阈值
  pub threshold: f32,
  pub model_width: f32,
  pub model_height: f32,
}

/// 概率阈值换算为 logit 阈值，省去逐像素 sigmoid
pub fn mask_logit_threshold(probability: f32) -> f32 {
  (probability / (1.0 - probability)).ln()
}

/// 一维双线性采样的下标与权重
#[derive(Debug, Clone, Copy)]
struct Tap {
  i0: usize,
  i1: usize,
  w0: f32,
  w1: f32,
}

impl Tap {
  fn new(coord: f32, len: usize) -> Self {
    let floor = coord.floor();
    let last = len - 1;
    let i0 = (floor.max(0.0) as usize).min(last);
    let i1 = (i0 + 1).min(last);
    let fraction = coord - floor;
    Self {
      i0,
      i1,
      w0: 1.0 - fraction,
      w1: fraction,
    }
  }
}

/// 在 ROI 内由原型与掩码系数重建二值掩码。
///
/// ROI 每个像素中心先映射到模型输入空间，再映射到原型网格，
/// 对每个原型通道做双线性插值后按系数加权求和得到 logit。
/// 复杂度 O(roi_w * roi_h * M)。
pub fn decode_mask(
  candidate: &CandidateBox,
  prototypes: &PrototypeView<'_>,
  roi: &Roi,
  model_roi: &ModelRoi,
  params: &MaskParams,
) -> BinaryMask {
  let roi_width = roi.width();
  let roi_height = roi.height();
  let logit_threshold = mask_logit_threshold(params.threshold);

  let model_to_proto_x = prototypes.width as f32 / params.model_width;
  let model_to_proto_y = prototypes.height as f32 / params.model_height;
  let roi_to_model_x = model_roi.width() as f32 / roi_width as f32;
  let roi_to_model_y = model_roi.height() as f32 / roi_height as f32;

  debug!(
    "重建掩码: ROI {}x{}, 原型 {}x{}x{}, logit 阈值 {:.3}",
    roi_width,
    roi_height,
    prototypes.channels,
    prototypes.height,
    prototypes.width,
    logit_threshold
  );

  let columns: Vec<Tap> = (0..roi_width)
    .map(|x| {
      let model_x = model_roi.x0 as f32 + (x as f32 + 0.5) * roi_to_model_x;
      Tap::new(model_x * model_to_proto_x, prototypes.width)
    })
    .collect();

  let mut data = vec![0u8; roi_width * roi_height];
  for (y, row) in data.chunks_exact_mut(roi_width).enumerate() {
    let model_y = model_roi.y0 as f32 + (y as f32 + 0.5) * roi_to_model_y;
    let ty = Tap::new(model_y * model_to_proto_y, prototypes.height);
    let row0 = ty.i0 * prototypes.width;
    let row1 = ty.i1 * prototypes.width;

    for (cell, tx) in row.iter_mut().zip(&columns) {
      let w00 = tx.w0 * ty.w0;
      let w10 = tx.w1 * ty.w0;
      let w01 = tx.w0 * ty.w1;
      let w11 = tx.w1 * ty.w1;
      let i00 = row0 + tx.i0;
      let i10 = row0 + tx.i1;
      let i01 = row1 + tx.i0;
      let i11 = row1 + tx.i1;

      let logit: f32 = candidate
        .mask_coefficients
        .iter()
        .zip(prototypes.planes())
        .map(|(coefficient, plane)| {
          coefficient * (plane[i00] * w00 + plane[i10] * w10 + plane[i01] * w01 + plane[i11] * w11)
        })
        .sum();

      *cell = (logit >= logit_threshold) as u8;
    }
  }

  BinaryMask {
    width: roi_width,
    height: roi_height,
    data: data.into_boxed_slice(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const PARAMS: MaskParams = MaskParams {
    threshold: 0.9,
    model_width: 384.0,
    model_height: 384.0,
  };

  fn candidate(coefficients: Vec<f32>) -> CandidateBox {
    CandidateBox {
      x1: 100.0,
      y1: 100.0,
      x2: 200.0,
      y2: 180.0,
      score: 0.9,
      mask_coefficients: coefficients.into_boxed_slice(),
    }
  }

  /// 通道 0 在原型网格左半边为 1，其余通道为 0
  fn left_half_prototypes() -> RawTensor {
    let (channels, side) = (8, 96);
    let mut data = vec![0.0; channels * side * side];
    for y in 0..side {
      for x in 0..side / 2 {
        data[y * side + x] = 1.0;
      }
    }
    RawTensor::new(vec![1, channels, side, side], data).unwrap()
  }

  #[test]
  fn logit_threshold_matches_probability() {
    assert!((mask_logit_threshold(0.9) - 9.0f32.ln()).abs() < 1e-6);
    assert!(mask_logit_threshold(0.5).abs() < 1e-6);
  }

  #[test]
  fn reconstructs_half_plane() {
    let tensor = left_half_prototypes();
    let view = PrototypeView::new(&tensor).unwrap();
    let mut coefficients = vec![0.0; 8];
    coefficients[0] = 10.0;
    let roi = Roi { x0: 100, y0: 100, x1: 299, y1: 179 };
    let model_roi = ModelRoi { x0: 100, y0: 100, x1: 300, y1: 180 };

    let mask = decode_mask(&candidate(coefficients), &view, &roi, &model_roi, &PARAMS);
    assert_eq!((mask.width(), mask.height()), (200, 80));
    // 原型左半边对应模型输入 x < 192
    assert_eq!(mask.get(0, 40), 1);
    assert_eq!(mask.get(85, 40), 1);
    assert_eq!(mask.get(95, 40), 0);
    assert_eq!(mask.get(199, 79), 0);
  }

  #[test]
  fn decoding_is_bit_identical() {
    let side = 32;
    let data: Vec<f32> = (0..8 * side * side)
      .map(|i| ((i as f32) * 0.37).sin() * 3.0)
      .collect();
    let tensor = RawTensor::new(vec![1, 8, side, side], data).unwrap();
    let view = PrototypeView::new(&tensor).unwrap();
    let coefficients: Vec<f32> = (0..8).map(|k| (k as f32 - 3.5) * 0.4).collect();
    let roi = Roi { x0: 10, y0: 20, x1: 150, y1: 90 };
    let model_roi = ModelRoi { x0: 10, y0: 20, x1: 151, y1: 91 };

    let first = decode_mask(&candidate(coefficients.clone()), &view, &roi, &model_roi, &PARAMS);
    let second = decode_mask(&candidate(coefficients), &view, &roi, &model_roi, &PARAMS);
    assert_eq!(first, second);
  }

  #[test]
  fn zero_coefficients_give_empty_mask() {
    let tensor = left_half_prototypes();
    let view = PrototypeView::new(&tensor).unwrap();
    let roi = Roi { x0: 0, y0: 0, x1: 383, y1: 383 };
    let model_roi = ModelRoi { x0: 0, y0: 0, x1: 384, y1: 384 };
    let mask = decode_mask(&candidate(vec![0.0; 8]), &view, &roi, &model_roi, &PARAMS);
    assert_eq!(mask.foreground_count(), 0);
  }

  #[test]
  fn sampling_at_the_far_edge_stays_in_bounds() {
    let tensor = left_half_prototypes();
    let view = PrototypeView::new(&tensor).unwrap();
    // ROI 可以包含 x = 宽度 的那一列
    let roi = Roi { x0: 380, y0: 380, x1: 384, y1: 384 };
    let model_roi = ModelRoi { x0: 380, y0: 380, x1: 384, y1: 384 };
    let mask = decode_mask(&candidate(vec![1.0; 8]), &view, &roi, &model_roi, &PARAMS);
    assert_eq!((mask.width(), mask.height()), (5, 5));
  }

  #[test]
  fn overlay_is_transparent_on_background() {
    let mask = BinaryMask::from_fn(2, 1, |x, _| x == 1);
    let rgba = mask.to_rgba(&OverlayColor::default());
    assert_eq!(rgba, vec![0, 0, 0, 0, 255, 0, 0, 115]);
  }

  #[test]
  fn prototype_shape_is_validated() {
    let tensor = RawTensor::new(vec![1, 8, 16], vec![0.0; 128]).unwrap();
    assert!(matches!(
      PrototypeView::new(&tensor),
      Err(DecodeError::RankMismatch { expected: 4, .. })
    ));
  }
}
