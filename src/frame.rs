// 该文件是 Sibian （四边） 项目的一部分。
// src/frame.rs - 坐标空间与帧几何映射
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

//! 坐标空间标记与帧几何。
//!
//! 所有坐标都带有空间标记类型，跨空间转换只能经由 [`FrameGeometry`]
//! 与 [`Roi`] 完成：
//!
//! | 空间            | 含义                                    |
//! |-----------------|-----------------------------------------|
//! | [`ModelSpace`]  | 模型输入（letterbox 后的正方形）像素    |
//! | [`FrameSpace`]  | 推理帧像素（保持视频宽高比，高 = 模型高）|
//! | [`RoiSpace`]    | ROI 内的掩码像素                        |
//! | [`VideoSpace`]  | 源视频像素                              |
//! | [`DisplaySpace`]| 显示表面像素                            |

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelSpace;
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameSpace;
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoiSpace;
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoSpace;
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplaySpace;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2D<S> {
  pub x: f32,
  pub y: f32,
  space: PhantomData<S>,
}

impl<S> Point2D<S> {
  pub const fn new(x: f32, y: f32) -> Self {
    Self {
      x,
      y,
      space: PhantomData,
    }
  }

  pub fn distance(&self, other: &Self) -> f32 {
    (other.x - self.x).hypot(other.y - self.y)
  }
}

/// 四边形，顺序为 左上 → 右上 → 右下 → 左下
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad<S> {
  pub top_left: Point2D<S>,
  pub top_right: Point2D<S>,
  pub bottom_right: Point2D<S>,
  pub bottom_left: Point2D<S>,
}

impl<S> Quad<S> {
  pub fn corners(&self) -> [Point2D<S>; 4]
  where
    S: Copy,
  {
    [
      self.top_left,
      self.top_right,
      self.bottom_right,
      self.bottom_left,
    ]
  }

  pub(crate) fn map<T>(self, f: impl Fn(Point2D<S>) -> Point2D<T>) -> Quad<T> {
    Quad {
      top_left: f(self.top_left),
      top_right: f(self.top_right),
      bottom_right: f(self.bottom_right),
      bottom_left: f(self.bottom_left),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
  pub width: u32,
  pub height: u32,
}

impl Dimensions {
  pub const fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }
}

#[derive(Error, Debug)]
pub enum GeometryError {
  #[error("源视频尺寸无效: {0}x{1}")]
  InvalidSource(u32, u32),
  #[error("显示尺寸无效: {0}x{1}")]
  InvalidDisplay(u32, u32),
  #[error("模型输入尺寸无效: {0}x{1}")]
  InvalidModel(u32, u32),
}

/// 推理帧中的整数 ROI，右下角为闭区间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
  pub x0: u32,
  pub y0: u32,
  pub x1: u32,
  pub y1: u32,
}

impl Roi {
  pub fn width(&self) -> usize {
    (self.x1 - self.x0) as usize + 1
  }

  pub fn height(&self) -> usize {
    (self.y1 - self.y0) as usize + 1
  }

  /// ROI 局部坐标 → 推理帧坐标
  pub fn to_frame(&self, p: Point2D<RoiSpace>) -> Point2D<FrameSpace> {
    Point2D::new(self.x0 as f32 + p.x, self.y0 as f32 + p.y)
  }
}

/// ROI 在模型输入空间中的整数范围，右边界为开区间
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelRoi {
  pub x0: u32,
  pub y0: u32,
  pub x1: u32,
  pub y1: u32,
}

impl ModelRoi {
  pub fn width(&self) -> usize {
    self.x1.saturating_sub(self.x0) as usize
  }

  pub fn height(&self) -> usize {
    self.y1.saturating_sub(self.y0) as usize
  }
}

/// 显示空间中的矩形
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRect {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

/// 单帧内固定的仿射映射参数
#[derive(Debug, Clone, PartialEq)]
pub struct FrameGeometry {
  model: Dimensions,
  inference_width: u32,
  letterbox_scale: f32,
  letterbox_width: u32,
  letterbox_height: u32,
  offset_x: i32,
  offset_y: i32,
  frame_to_video: (f32, f32),
  canvas_scale: (f32, f32),
}

impl FrameGeometry {
  pub fn new(
    model: Dimensions,
    source: Dimensions,
    display: Dimensions,
  ) -> Result<Self, GeometryError> {
    if model.width == 0 || model.height == 0 {
      return Err(GeometryError::InvalidModel(model.width, model.height));
    }
    if source.width == 0 || source.height == 0 {
      return Err(GeometryError::InvalidSource(source.width, source.height));
    }
    if display.width == 0 || display.height == 0 {
      return Err(GeometryError::InvalidDisplay(display.width, display.height));
    }

    let model_w = model.width as f32;
    let model_h = model.height as f32;
    let source_w = source.width as f32;
    let source_h = source.height as f32;

    // 推理帧保持视频宽高比，高度与模型输入一致
    let inference_width = ((source_w / source_h) * model_h).round().max(1.0) as u32;
    // 宽帧时比例会四舍五入为 0，至少取 1 以保证映射可逆
    let letterbox_scale = (model_w / inference_width as f32).round().max(1.0);
    let letterbox_width = (inference_width as f32 * letterbox_scale).round() as u32;
    let letterbox_height = (model_h * letterbox_scale).round() as u32;
    let offset_x = ((model_w - letterbox_width as f32) / 2.0).floor() as i32;
    let offset_y = ((model_h - letterbox_height as f32) / 2.0).floor() as i32;

    Ok(Self {
      model,
      inference_width,
      letterbox_scale,
      letterbox_width,
      letterbox_height,
      offset_x,
      offset_y,
      frame_to_video: (
        source_w / inference_width as f32,
        source_h / model_h,
      ),
      canvas_scale: (
        display.width as f32 / source_w,
        display.height as f32 / source_h,
      ),
    })
  }

  pub fn model(&self) -> Dimensions {
    self.model
  }

  /// 推理帧尺寸
  pub fn inference_frame(&self) -> Dimensions {
    Dimensions::new(self.inference_width, self.model.height)
  }

  pub fn letterbox_scale(&self) -> f32 {
    self.letterbox_scale
  }

  /// letterbox 后图像在模型输入中的尺寸
  pub fn letterbox_size(&self) -> Dimensions {
    Dimensions::new(self.letterbox_width, self.letterbox_height)
  }

  pub fn letterbox_offset(&self) -> (i32, i32) {
    (self.offset_x, self.offset_y)
  }

  pub fn model_to_frame(&self, p: Point2D<ModelSpace>) -> Point2D<FrameSpace> {
    Point2D::new(
      (p.x - self.offset_x as f32) / self.letterbox_scale,
      (p.y - self.offset_y as f32) / self.letterbox_scale,
    )
  }

  pub fn frame_to_model(&self, p: Point2D<FrameSpace>) -> Point2D<ModelSpace> {
    Point2D::new(
      self.offset_x as f32 + p.x * self.letterbox_scale,
      self.offset_y as f32 + p.y * self.letterbox_scale,
    )
  }

  pub fn frame_to_video(&self, p: Point2D<FrameSpace>) -> Point2D<VideoSpace> {
    Point2D::new(p.x * self.frame_to_video.0, p.y * self.frame_to_video.1)
  }

  pub fn video_to_display(&self, p: Point2D<VideoSpace>) -> Point2D<DisplaySpace> {
    Point2D::new(p.x * self.canvas_scale.0, p.y * self.canvas_scale.1)
  }

  pub fn frame_to_display(&self, p: Point2D<FrameSpace>) -> Point2D<DisplaySpace> {
    self.video_to_display(self.frame_to_video(p))
  }

  /// 由模型空间中的检测框推出推理帧 ROI
  pub fn roi_for_box(&self, top_left: Point2D<ModelSpace>, bottom_right: Point2D<ModelSpace>) -> Roi {
    let frame_w = self.inference_width as f32;
    let frame_h = self.model.height as f32;
    let a = self.model_to_frame(top_left);
    let b = self.model_to_frame(bottom_right);

    let fx1 = a.x.clamp(0.0, frame_w);
    let fy1 = a.y.clamp(0.0, frame_h);
    let fx2 = b.x.clamp(0.0, frame_w);
    let fy2 = b.y.clamp(0.0, frame_h);

    let x0 = fx1.floor() as u32;
    let y0 = fy1.floor() as u32;
    let x1 = (fx2.floor() as u32).min(self.inference_width).max(x0);
    let y1 = (fy2.floor() as u32).min(self.model.height).max(y0);

    Roi { x0, y0, x1, y1 }
  }

  /// ROI 反映射回模型输入空间，并裁剪到模型输入范围内
  pub fn model_roi(&self, roi: &Roi) -> ModelRoi {
    let model_w = self.model.width as f32;
    let model_h = self.model.height as f32;
    let origin = self.frame_to_model(Point2D::new(roi.x0 as f32, roi.y0 as f32));
    let width = roi.width() as f32 * self.letterbox_scale;
    let height = roi.height() as f32 * self.letterbox_scale;

    ModelRoi {
      x0: origin.x.floor().clamp(0.0, model_w) as u32,
      y0: origin.y.floor().clamp(0.0, model_h) as u32,
      x1: (origin.x + width).ceil().clamp(0.0, model_w) as u32,
      y1: (origin.y + height).ceil().clamp(0.0, model_h) as u32,
    }
  }

  /// ROI 在显示空间中覆盖的矩形
  pub fn display_rect(&self, roi: &Roi) -> DisplayRect {
    let origin = self.frame_to_display(Point2D::new(roi.x0 as f32, roi.y0 as f32));
    let far = self.frame_to_display(Point2D::new(
      (roi.x0 as usize + roi.width()) as f32,
      (roi.y0 as usize + roi.height()) as f32,
    ));
    DisplayRect {
      x: origin.x,
      y: origin.y,
      width: far.x - origin.x,
      height: far.y - origin.y,
    }
  }
}
