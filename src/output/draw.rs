// 该文件是 Sibian （四边） 项目的一部分。
// src/output/draw.rs - 掩码与四边形可视化
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

use image::{
  Rgba, RgbaImage,
  imageops::{self, FilterType},
};
use imageproc::drawing::draw_line_segment_mut;

use crate::{
  config::OverlayColor,
  frame::{DisplaySpace, Quad},
  pipeline::{Detection, FrameOutcome},
};

const QUAD_COLOR: [u8; 4] = [0, 255, 0, 255]; // 绿色
const QUAD_LINE_WIDTH: u32 = 4;

pub struct Draw {
  overlay: OverlayColor,
  quad_color: Rgba<u8>,
  quad_line_width: u32,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      overlay: OverlayColor::default(),
      quad_color: Rgba(QUAD_COLOR),
      quad_line_width: QUAD_LINE_WIDTH,
    }
  }
}

impl Draw {
  pub fn with_overlay(mut self, overlay: OverlayColor) -> Self {
    self.overlay = overlay;
    self
  }

  pub fn overlay(&self) -> &OverlayColor {
    &self.overlay
  }

  /// 在显示画布上绘制一帧结果，空结果不绘制任何内容
  pub fn draw_outcome(&self, canvas: &mut RgbaImage, outcome: &FrameOutcome) {
    let Some(detection) = outcome.detection() else {
      return;
    };
    self.draw_mask(canvas, detection);
    if let Ok(quad) = &detection.quad {
      self.draw_quad(canvas, quad);
    }
  }

  /// 掩码按最近邻缩放到其显示矩形后叠加
  fn draw_mask(&self, canvas: &mut RgbaImage, detection: &Detection) {
    let mask = &detection.mask;
    let Some(layer) = RgbaImage::from_raw(
      mask.width() as u32,
      mask.height() as u32,
      mask.to_rgba(&self.overlay),
    ) else {
      return;
    };

    let rect = &detection.mask_rect;
    let width = rect.width.round().max(1.0) as u32;
    let height = rect.height.round().max(1.0) as u32;
    let layer = if (width, height) == layer.dimensions() {
      layer
    } else {
      imageops::resize(&layer, width, height, FilterType::Nearest)
    };
    imageops::overlay(
      canvas,
      &layer,
      rect.x.round() as i64,
      rect.y.round() as i64,
    );
  }

  /// 沿法线方向平移多条线段得到线宽
  fn draw_quad(&self, canvas: &mut RgbaImage, quad: &Quad<DisplaySpace>) {
    let corners = quad.corners();
    let half = (self.quad_line_width as f32 - 1.0) / 2.0;

    for i in 0..4 {
      let (a, b) = (&corners[i], &corners[(i + 1) % 4]);
      let (dx, dy) = (b.x - a.x, b.y - a.y);
      let len = dx.hypot(dy);
      let (nx, ny) = if len > f32::EPSILON {
        (-dy / len, dx / len)
      } else {
        (0.0, 0.0)
      };

      for k in 0..self.quad_line_width {
        let offset = k as f32 - half;
        draw_line_segment_mut(
          canvas,
          (a.x + nx * offset, a.y + ny * offset),
          (b.x + nx * offset, b.y + ny * offset),
          self.quad_color,
        );
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    frame::{DisplayRect, Point2D, Roi},
    model::{BinaryMask, CandidateBox},
    pipeline::{EmptyReason, QuadFailure},
  };

  fn detection(quad: bool) -> FrameOutcome {
    let p = |x: f32, y: f32| Point2D::<DisplaySpace>::new(x, y);
    FrameOutcome::Detected(Box::new(Detection {
      candidate: CandidateBox {
        x1: 10.0,
        y1: 10.0,
        x2: 30.0,
        y2: 30.0,
        score: 0.9,
        mask_coefficients: vec![0.0; 8].into_boxed_slice(),
      },
      roi: Roi { x0: 10, y0: 10, x1: 19, y1: 19 },
      mask: BinaryMask::from_fn(10, 10, |x, _| x < 5),
      mask_rect: DisplayRect {
        x: 10.0,
        y: 10.0,
        width: 20.0,
        height: 20.0,
      },
      quad: if quad {
        Ok(Quad {
          top_left: p(10.0, 10.0),
          top_right: p(29.0, 10.0),
          bottom_right: p(29.0, 29.0),
          bottom_left: p(10.0, 29.0),
        })
      } else {
        Err(QuadFailure::TooFewHullPoints(2))
      },
    }))
  }

  #[test]
  fn empty_outcome_leaves_canvas_clear() {
    let mut canvas = RgbaImage::new(40, 40);
    Draw::default().draw_outcome(&mut canvas, &FrameOutcome::Empty(EmptyReason::NoCandidate));
    assert!(canvas.pixels().all(|p| p.0 == [0, 0, 0, 0]));
  }

  #[test]
  fn mask_is_scaled_into_display_rect() {
    let mut canvas = RgbaImage::new(40, 40);
    Draw::default().draw_outcome(&mut canvas, &detection(false));
    // 掩码左半边对应显示 x ∈ [10, 20)
    assert_ne!(canvas.get_pixel(15, 20).0[3], 0);
    assert_eq!(canvas.get_pixel(25, 20).0, [0, 0, 0, 0]);
    assert_eq!(canvas.get_pixel(5, 5).0, [0, 0, 0, 0]);
  }

  #[test]
  fn quad_is_stroked_in_green() {
    let mut canvas = RgbaImage::new(40, 40);
    Draw::default().draw_outcome(&mut canvas, &detection(true));
    assert_eq!(canvas.get_pixel(20, 10).0, QUAD_COLOR);
    assert_eq!(canvas.get_pixel(29, 20).0, QUAD_COLOR);
  }
}
