// 该文件是 Sibian （四边） 项目的一部分。
// src/pipeline.rs - 单帧后处理流水线
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
use tracing::{debug, info};

use crate::{
  config::{ConfigError, PipelineConfig},
  frame::{
    Dimensions, DisplayRect, DisplaySpace, FrameGeometry, GeometryError, Quad, Roi, RoiSpace,
  },
  model::{
    BinaryMask, CandidateBox, DecodeError, DecodeParams, InferenceOutputs, MaskParams,
    PrototypeView, classify_outputs, decode_best, decode_mask,
  },
  shape::{Simplification, boundary_points, convex_hull, order_corners, simplify_to_quad},
};

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("模型输出解码错误: {0}")]
  DecodeError(#[from] DecodeError),
  #[error("帧几何错误: {0}")]
  GeometryError(#[from] GeometryError),
}

/// 空结果的原因，属于正常情况
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
  NoDetectionTensor,
  NoPrototypeTensor,
  NoCandidate,
}

impl EmptyReason {
  pub fn as_str(&self) -> &'static str {
    match self {
      EmptyReason::NoDetectionTensor => "no_detection_tensor",
      EmptyReason::NoPrototypeTensor => "no_prototype_tensor",
      EmptyReason::NoCandidate => "no_candidate",
    }
  }
}

/// 检测成功但无法得到四边形的原因
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuadFailure {
  #[error("凸包点数不足: {0}")]
  TooFewHullPoints(usize),
  #[error("迭代 {iterations} 次未收敛到 4 个点 (最后 {last_len} 个)")]
  NotConverged { iterations: usize, last_len: usize },
}

/// 单个目标的完整结果
#[derive(Debug, Clone)]
pub struct Detection {
  pub candidate: CandidateBox,
  /// 推理帧中的 ROI
  pub roi: Roi,
  pub mask: BinaryMask,
  /// 掩码在显示空间中的位置
  pub mask_rect: DisplayRect,
  pub quad: Result<Quad<DisplaySpace>, QuadFailure>,
}

#[derive(Debug, Clone)]
pub enum FrameOutcome {
  Empty(EmptyReason),
  Detected(Box<Detection>),
}

impl FrameOutcome {
  pub fn detection(&self) -> Option<&Detection> {
    match self {
      FrameOutcome::Detected(detection) => Some(detection),
      FrameOutcome::Empty(_) => None,
    }
  }

  pub fn quad(&self) -> Option<&Quad<DisplaySpace>> {
    self.detection().and_then(|d| d.quad.as_ref().ok())
  }
}

pub struct Pipeline {
  config: PipelineConfig,
}

impl Pipeline {
  pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
    config.validate()?;
    Ok(Self { config })
  }

  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }

  /// 处理一帧的推理输出。
  ///
  /// 输出张量在此被消费，检测与掩码解码完成后立即释放。
  pub fn process(
    &self,
    outputs: InferenceOutputs,
    source: Dimensions,
    display: Dimensions,
  ) -> Result<FrameOutcome, PipelineError> {
    let geometry = FrameGeometry::new(self.config.model_dimensions(), source, display)?;
    let model_width = self.config.model_width as f32;
    let model_height = self.config.model_height as f32;

    let classified = classify_outputs(outputs)?;
    let Some(detection_tensor) = classified.detection else {
      debug!("未找到检测张量");
      return Ok(FrameOutcome::Empty(EmptyReason::NoDetectionTensor));
    };
    let Some(prototype_tensor) = classified.prototype else {
      debug!("未找到原型张量");
      return Ok(FrameOutcome::Empty(EmptyReason::NoPrototypeTensor));
    };

    let prototypes = PrototypeView::new(&prototype_tensor)?;
    let decode_params = DecodeParams {
      confidence_threshold: self.config.confidence_threshold,
      model_width,
      model_height,
    };
    let best = decode_best(&detection_tensor, prototypes.channels(), &decode_params)?;
    drop(detection_tensor);

    let Some(candidate) = best else {
      debug!("没有超过置信度阈值的检测框");
      return Ok(FrameOutcome::Empty(EmptyReason::NoCandidate));
    };
    debug!(
      "最佳检测框: ({:.1}, {:.1}) - ({:.1}, {:.1}), 分数 {:.3}",
      candidate.x1, candidate.y1, candidate.x2, candidate.y2, candidate.score
    );

    let roi = geometry.roi_for_box(candidate.top_left(), candidate.bottom_right());
    let model_roi = geometry.model_roi(&roi);
    debug!("ROI: {:?}, 模型空间 ROI: {:?}", roi, model_roi);

    let mask_params = MaskParams {
      threshold: self.config.mask_threshold,
      model_width,
      model_height,
    };
    let mask = decode_mask(&candidate, &prototypes, &roi, &model_roi, &mask_params);
    drop(prototype_tensor);

    let quad = extract_quad(&mask).map(|quad| {
      quad.map(|p| geometry.frame_to_display(roi.to_frame(p)))
    });
    if let Err(failure) = &quad {
      info!("未能得到四边形: {}", failure);
    }

    Ok(FrameOutcome::Detected(Box::new(Detection {
      mask_rect: geometry.display_rect(&roi),
      candidate,
      roi,
      mask,
      quad,
    })))
  }
}

/// 掩码 → 边界 → 凸包 → 四边形（ROI 局部坐标）
pub fn extract_quad(mask: &BinaryMask) -> Result<Quad<RoiSpace>, QuadFailure> {
  let boundary = boundary_points(mask);
  let hull = convex_hull(&boundary);
  debug!("边界点 {} 个, 凸包点 {} 个", boundary.len(), hull.len());
  if hull.len() < 4 {
    return Err(QuadFailure::TooFewHullPoints(hull.len()));
  }

  match simplify_to_quad(&hull) {
    Simplification::Converged { corners, .. } => Ok(order_corners(corners)),
    Simplification::NotConverged {
      iterations,
      last_len,
    } => Err(QuadFailure::NotConverged {
      iterations,
      last_len,
    }),
  }
}
