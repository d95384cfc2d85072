// 该文件是 Sibian （四边） 项目的一部分。
// tests/pipeline.rs - 单帧流水线端到端测试
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

use sibian::{
  config::PipelineConfig,
  frame::Dimensions,
  model::{DecodeError, InferenceOutputs, RawTensor},
  pipeline::{EmptyReason, FrameOutcome, Pipeline, PipelineError, QuadFailure},
};

const CHANNELS: usize = 40;
const BOXES: usize = 1200;
const MASK_CHANNELS: usize = 32;
const PROTO_SIDE: usize = 96;
const BOX_INDEX: usize = 17;

/// 通道优先 `[1, 40, 1200]`，一个归一化框 (0.5, 0.5, 0.2, 0.2)，
/// 无目标度变体下类别 0 分数 0.9，掩码系数 0 为 10
fn detection_tensor(batch: usize) -> RawTensor {
  let mut data = vec![0.0; batch * CHANNELS * BOXES];
  let mut set = |c: usize, v: f32| data[c * BOXES + BOX_INDEX] = v;
  set(0, 0.5);
  set(1, 0.5);
  set(2, 0.2);
  set(3, 0.2);
  set(4, 0.9);
  set(8, 10.0);
  RawTensor::new(vec![batch, CHANNELS, BOXES], data).unwrap()
}

/// 原型通道 0 在网格 `inside` 范围内为 1，其余为 -1
fn prototype_tensor(inside: std::ops::RangeInclusive<usize>) -> RawTensor {
  let plane = PROTO_SIDE * PROTO_SIDE;
  let mut data = vec![0.0; MASK_CHANNELS * plane];
  for y in 0..PROTO_SIDE {
    for x in 0..PROTO_SIDE {
      data[y * PROTO_SIDE + x] = if inside.contains(&x) && inside.contains(&y) {
        1.0
      } else {
        -1.0
      };
    }
  }
  RawTensor::new(vec![1, MASK_CHANNELS, PROTO_SIDE, PROTO_SIDE], data).unwrap()
}

fn outputs(inside: std::ops::RangeInclusive<usize>) -> InferenceOutputs {
  InferenceOutputs::new()
    .with("output0", detection_tensor(1))
    .with("output1", prototype_tensor(inside))
}

fn square(side: u32) -> Dimensions {
  Dimensions::new(side, side)
}

fn assert_near(actual: f32, expected: f32, tolerance: f32) {
  assert!(
    (actual - expected).abs() <= tolerance,
    "{} 与期望值 {} 相差超过 {}",
    actual,
    expected,
    tolerance
  );
}

#[test]
fn single_box_yields_mask_and_quad() {
  let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
  let outcome = pipeline
    .process(outputs(42..=54), square(384), square(384))
    .unwrap();

  let detection = outcome.detection().expect("应当检测到目标");
  let candidate = &detection.candidate;
  assert_near(candidate.x1, 153.6, 1e-3);
  assert_near(candidate.y1, 153.6, 1e-3);
  assert_near(candidate.x2, 230.4, 1e-3);
  assert_near(candidate.y2, 230.4, 1e-3);
  assert_near(candidate.score, 0.9, 1e-6);

  assert_eq!((detection.roi.x0, detection.roi.y0), (153, 153));
  assert_eq!((detection.mask.width(), detection.mask.height()), (78, 78));
  assert!(detection.mask.foreground_count() > 0);
  // 掩码不触及 ROI 边缘
  assert_eq!(detection.mask.get(0, 0), 0);
  assert_eq!(detection.mask.get(77, 77), 0);

  // 原型网格 42..=54 对应模型输入约 166..=217
  let quad = outcome.quad().expect("应当得到四边形");
  assert_near(quad.top_left.x, 166.5, 3.0);
  assert_near(quad.top_left.y, 166.5, 3.0);
  assert_near(quad.bottom_right.x, 217.0, 3.0);
  assert_near(quad.bottom_right.y, 217.0, 3.0);
  assert!(quad.top_right.x > quad.top_left.x + 40.0);
  assert!(quad.bottom_left.y > quad.top_left.y + 40.0);

  let tl = quad.top_left.x + quad.top_left.y;
  for corner in quad.corners() {
    assert!(tl <= corner.x + corner.y);
  }
}

#[test]
fn quad_follows_display_scale() {
  let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
  let small = pipeline
    .process(outputs(42..=54), square(384), square(384))
    .unwrap();
  let large = pipeline
    .process(outputs(42..=54), square(384), square(768))
    .unwrap();

  let (small, large) = (small.quad().unwrap(), large.quad().unwrap());
  for (a, b) in small.corners().iter().zip(large.corners()) {
    assert_near(b.x, a.x * 2.0, 1e-3);
    assert_near(b.y, a.y * 2.0, 1e-3);
  }
}

#[test]
fn raising_confidence_threshold_empties_the_result() {
  let config = PipelineConfig::default().with_confidence_threshold(0.95);
  let pipeline = Pipeline::new(config).unwrap();
  let outcome = pipeline
    .process(outputs(42..=54), square(384), square(384))
    .unwrap();
  assert!(matches!(
    outcome,
    FrameOutcome::Empty(EmptyReason::NoCandidate)
  ));
  assert!(outcome.quad().is_none());
}

#[test]
fn full_roi_mask_has_no_boundary() {
  // 原型覆盖整个 ROI 时边界像素全部落在外圈
  let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
  let outcome = pipeline
    .process(outputs(0..=95), square(384), square(384))
    .unwrap();
  let detection = outcome.detection().unwrap();
  assert_eq!(detection.mask.foreground_count(), 78 * 78);
  assert_eq!(detection.quad, Err(QuadFailure::TooFewHullPoints(0)));
}

#[test]
fn processing_is_idempotent() {
  let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
  let first = pipeline
    .process(outputs(40..=60), Dimensions::new(640, 480), square(384))
    .unwrap();
  let second = pipeline
    .process(outputs(40..=60), Dimensions::new(640, 480), square(384))
    .unwrap();

  let (a, b) = (first.detection().unwrap(), second.detection().unwrap());
  assert_eq!(a.roi, b.roi);
  assert_eq!(a.mask, b.mask);
  assert_eq!(a.quad, b.quad);
}

#[test]
fn missing_prototype_is_an_empty_result() {
  let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
  let outputs = InferenceOutputs::new().with("output0", detection_tensor(1));
  let outcome = pipeline
    .process(outputs, square(384), square(384))
    .unwrap();
  assert!(matches!(
    outcome,
    FrameOutcome::Empty(EmptyReason::NoPrototypeTensor)
  ));
}

#[test]
fn batched_detection_is_malformed() {
  let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
  let outputs = InferenceOutputs::new()
    .with("output0", detection_tensor(2))
    .with("output1", prototype_tensor(42..=54));
  let result = pipeline.process(outputs, square(384), square(384));
  assert!(matches!(
    result,
    Err(PipelineError::DecodeError(DecodeError::MalformedOutput(..)))
  ));
}
