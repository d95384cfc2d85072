// 该文件是 Sibian （四边） 项目的一部分。
// src/model/classify.rs - 按形状识别检测张量与原型掩码张量
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

use tracing::{debug, error};

use super::{DecodeError, InferenceOutputs, RawTensor};

const MIN_DETECTION_BOXES: usize = 1000;
const MIN_DETECTION_CHANNELS: usize = 8;
const MIN_PROTOTYPE_CHANNELS: usize = 8;
const MIN_PROTOTYPE_SIDE: usize = 16;

/// 分类结果，任一角色缺失时该帧无结果
#[derive(Debug, Default)]
pub struct ClassifiedOutputs {
  pub detection: Option<RawTensor>,
  pub prototype: Option<RawTensor>,
}

/// 检测张量 [1, A, B]：返回框数 N = max(A, B)
fn detection_extent(dims: &[usize]) -> Option<usize> {
  let [_, a, b] = dims else {
    return None;
  };
  let boxes = (*a).max(*b);
  let channels = (*a).min(*b);
  (boxes >= MIN_DETECTION_BOXES && channels >= MIN_DETECTION_CHANNELS).then_some(boxes)
}

/// 原型张量 [1, M, H, W]：返回 H * W
fn prototype_area(dims: &[usize]) -> Option<usize> {
  let [_, channels, height, width] = dims else {
    return None;
  };
  (*channels >= MIN_PROTOTYPE_CHANNELS
    && *height >= MIN_PROTOTYPE_SIDE
    && *width >= MIN_PROTOTYPE_SIDE)
    .then_some(height * width)
}

/// 仅根据形状挑选检测张量与原型张量，不依赖输出名称。
///
/// 未被选中的张量在此处直接释放。批大小不为 1 但其余维度符合任一角色的输出
/// 视为协作方违约，返回错误。
pub fn classify_outputs(outputs: InferenceOutputs) -> Result<ClassifiedOutputs, DecodeError> {
  let mut detection: Option<(usize, RawTensor)> = None;
  let mut prototype: Option<(usize, RawTensor)> = None;

  for (name, tensor) in outputs {
    let shape = tensor.shape();
    let batch = shape[0];

    if let Some(boxes) = detection_extent(shape) {
      if batch != 1 {
        error!("检测候选输出 {} 批大小为 {}", name, batch);
        return Err(DecodeError::MalformedOutput(name, shape.to_vec()));
      }
      if detection.as_ref().is_none_or(|(best, _)| boxes > *best) {
        debug!("检测张量候选: {} {:?}", name, shape);
        detection = Some((boxes, tensor));
      }
      continue;
    }

    if let Some(area) = prototype_area(shape) {
      if batch != 1 {
        error!("原型候选输出 {} 批大小为 {}", name, batch);
        return Err(DecodeError::MalformedOutput(name, shape.to_vec()));
      }
      if prototype.as_ref().is_none_or(|(best, _)| area > *best) {
        debug!("原型张量候选: {} {:?}", name, shape);
        prototype = Some((area, tensor));
      }
      continue;
    }

    debug!("忽略输出 {} {:?}", name, shape);
  }

  Ok(ClassifiedOutputs {
    detection: detection.map(|(_, tensor)| tensor),
    prototype: prototype.map(|(_, tensor)| tensor),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn zeros(shape: &[usize]) -> RawTensor {
    RawTensor::new(shape.to_vec(), vec![0.0; shape.iter().product()]).unwrap()
  }

  #[test]
  fn picks_roles_regardless_of_order_and_axis() {
    let outputs = InferenceOutputs::new()
      .with("output1", zeros(&[1, 32, 16, 16]))
      .with("scores", zeros(&[1, 10]))
      .with("output0", zeros(&[1, 1200, 40]));
    let classified = classify_outputs(outputs).unwrap();
    assert_eq!(classified.detection.unwrap().shape(), &[1, 1200, 40]);
    assert_eq!(classified.prototype.unwrap().shape(), &[1, 32, 16, 16]);
  }

  #[test]
  fn keeps_largest_candidates() {
    let outputs = InferenceOutputs::new()
      .with("a", zeros(&[1, 40, 1000]))
      .with("b", zeros(&[1, 40, 2100]))
      .with("c", zeros(&[1, 32, 16, 16]))
      .with("d", zeros(&[1, 32, 24, 24]));
    let classified = classify_outputs(outputs).unwrap();
    assert_eq!(classified.detection.unwrap().shape(), &[1, 40, 2100]);
    assert_eq!(classified.prototype.unwrap().shape(), &[1, 32, 24, 24]);
  }

  #[test]
  fn unqualified_roles_stay_unset() {
    let outputs = InferenceOutputs::new()
      .with("few_boxes", zeros(&[1, 40, 999]))
      .with("few_channels", zeros(&[1, 4, 2000]))
      .with("small_proto", zeros(&[1, 32, 8, 8]));
    let classified = classify_outputs(outputs).unwrap();
    assert!(classified.detection.is_none());
    assert!(classified.prototype.is_none());
  }

  #[test]
  fn batched_candidate_is_malformed() {
    let outputs = InferenceOutputs::new().with("output0", zeros(&[2, 40, 1200]));
    assert!(matches!(
      classify_outputs(outputs),
      Err(DecodeError::MalformedOutput(name, _)) if name == "output0"
    ));
  }
}
