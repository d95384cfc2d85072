// 该文件是 Sibian （四边） 项目的一部分。
// src/shape/hull.rs - 边界像素与凸包
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

use crate::{
  frame::{Point2D, RoiSpace},
  model::BinaryMask,
};

/// 提取掩码边界像素：前景像素的 8 邻域中存在背景即为边界。
///
/// 最外一圈像素不参与判定。结果按 (x, y) 升序排列。
pub fn boundary_points(mask: &BinaryMask) -> Vec<Point2D<RoiSpace>> {
  let (width, height) = (mask.width(), mask.height());
  let data = mask.as_slice();
  let mut points = Vec::new();

  for y in 1..height.saturating_sub(1) {
    let row = y * width;
    for x in 1..width.saturating_sub(1) {
      let idx = row + x;
      if data[idx] == 0 {
        continue;
      }
      let all = data[idx - 1]
        & data[idx + 1]
        & data[idx - width]
        & data[idx + width]
        & data[idx - width - 1]
        & data[idx - width + 1]
        & data[idx + width - 1]
        & data[idx + width + 1];
      if all == 0 {
        points.push(Point2D::new(x as f32, y as f32));
      }
    }
  }

  points.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
  points
}

fn cross<S>(o: &Point2D<S>, a: &Point2D<S>, b: &Point2D<S>) -> f32 {
  (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// 向链中追加点，先弹出所有不构成严格左转的尾部点
fn push_chain<S: Copy>(chain: &mut Vec<Point2D<S>>, p: Point2D<S>) {
  while let [.., o, a] = chain.as_slice() {
    if cross(o, a, &p) > 0.0 {
      break;
    }
    chain.pop();
  }
  chain.push(p);
}

/// Andrew 单调链凸包，输入需已按 (x, y) 排序。共线点被剔除。
pub fn convex_hull<S: Copy>(points: &[Point2D<S>]) -> Vec<Point2D<S>> {
  let mut lower = Vec::with_capacity(points.len());
  for p in points {
    push_chain(&mut lower, *p);
  }
  let mut upper = Vec::with_capacity(points.len());
  for p in points.iter().rev() {
    push_chain(&mut upper, *p);
  }

  // 两条链的末点分别是对方的起点
  lower.pop();
  upper.pop();
  lower.extend(upper);
  lower
}
