// 该文件是 Sibian （四边） 项目的一部分。
// src/shape/quad.rs - 凸包简化为四边形
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

use crate::frame::{Point2D, Quad};

pub const MAX_SIMPLIFY_ITERATIONS: usize = 35;

// epsilon 初值为周长的 1%
const INITIAL_EPSILON_RATIO: f32 = 0.01;
const EPSILON_GROW: f32 = 1.25;
const EPSILON_SHRINK: f32 = 0.8;
const DEGENERATE_CHORD: f32 = 1e-9;

/// epsilon 搜索的结果
#[derive(Debug, Clone, PartialEq)]
pub enum Simplification<S> {
  /// 恰好得到 4 个点，保持凸包上的顺序
  Converged {
    corners: [Point2D<S>; 4],
    iterations: usize,
    epsilon: f32,
  },
  /// 迭代预算内未得到 4 个点，`last_len` 为最后一次简化的点数
  NotConverged { iterations: usize, last_len: usize },
}

/// 折线总长，闭合环需自行重复首点
pub fn ring_perimeter<S>(ring: &[Point2D<S>]) -> f32 {
  ring.windows(2).map(|w| w[0].distance(&w[1])).sum()
}

/// 点到线段 ab 的距离，ab 退化为点时取点距
fn segment_distance<S>(p: &Point2D<S>, a: &Point2D<S>, b: &Point2D<S>) -> f32 {
  let (vx, vy) = (b.x - a.x, b.y - a.y);
  let vv = vx * vx + vy * vy;
  if vv <= DEGENERATE_CHORD {
    return p.distance(a);
  }
  let t = (((p.x - a.x) * vx + (p.y - a.y) * vy) / vv).clamp(0.0, 1.0);
  (p.x - (a.x + t * vx)).hypot(p.y - (a.y + t * vy))
}

/// 迭代式 Douglas–Peucker，保留首尾点
pub fn douglas_peucker<S: Copy>(points: &[Point2D<S>], epsilon: f32) -> Vec<Point2D<S>> {
  let n = points.len();
  if n < 3 {
    return points.to_vec();
  }

  let mut keep = vec![false; n];
  keep[0] = true;
  keep[n - 1] = true;
  let mut stack = vec![(0usize, n - 1)];

  while let Some((start, end)) = stack.pop() {
    let (a, b) = (&points[start], &points[end]);
    let farthest = (start + 1..end)
      .map(|i| (i, segment_distance(&points[i], a, b)))
      .fold(None, |best: Option<(usize, f32)>, (i, dist)| match best {
        Some((_, best_dist)) if dist <= best_dist => best,
        _ => Some((i, dist)),
      });

    if let Some((index, dist)) = farthest
      && dist > epsilon
    {
      keep[index] = true;
      stack.push((start, index));
      stack.push((index, end));
    }
  }

  points
    .iter()
    .zip(keep)
    .filter_map(|(p, kept)| kept.then_some(*p))
    .collect()
}

/// 自动调节 epsilon，直到凸包简化为恰好 4 个点。
///
/// 每次迭代点数过多则 epsilon × 1.25，过少则 × 0.8，最多迭代 35 次。
pub fn simplify_to_quad<S: Copy>(hull: &[Point2D<S>]) -> Simplification<S> {
  if hull.len() < 4 {
    return Simplification::NotConverged {
      iterations: 0,
      last_len: hull.len(),
    };
  }

  let mut ring = hull.to_vec();
  ring.push(hull[0]);
  let perimeter = ring_perimeter(&ring).max(1.0);
  let mut epsilon = perimeter * INITIAL_EPSILON_RATIO;
  let mut last_len = 0;

  for iteration in 1..=MAX_SIMPLIFY_ITERATIONS {
    let mut simplified = douglas_peucker(&ring, epsilon);
    // 去掉重复的闭合点
    simplified.pop();
    last_len = simplified.len();

    if last_len > 4 {
      epsilon *= EPSILON_GROW;
    } else if last_len < 4 {
      epsilon *= EPSILON_SHRINK;
    } else if let Ok(corners) = <[Point2D<S>; 4]>::try_from(simplified) {
      debug!(
        "四边形简化收敛: 迭代 {} 次, epsilon {:.3}, 周长 {:.1}",
        iteration, epsilon, perimeter
      );
      return Simplification::Converged {
        corners,
        iterations: iteration,
        epsilon,
      };
    }
  }

  debug!(
    "四边形简化未收敛: 最后点数 {}, epsilon {:.3}",
    last_len, epsilon
  );
  Simplification::NotConverged {
    iterations: MAX_SIMPLIFY_ITERATIONS,
    last_len,
  }
}

/// 按绕质心的角度排序后，以 x + y 最小者为左上角依次分配四个角
pub fn order_corners<S: Copy>(points: [Point2D<S>; 4]) -> Quad<S> {
  let cx = points.iter().map(|p| p.x).sum::<f32>() / 4.0;
  let cy = points.iter().map(|p| p.y).sum::<f32>() / 4.0;
  let angle = |p: &Point2D<S>| (p.y - cy).atan2(p.x - cx);

  let mut sorted = points;
  sorted.sort_by(|p, q| angle(p).total_cmp(&angle(q)));

  let mut top_left = 0;
  for (i, p) in sorted.iter().enumerate() {
    let best = &sorted[top_left];
    if p.x + p.y < best.x + best.y {
      top_left = i;
    }
  }

  Quad {
    top_left: sorted[top_left],
    top_right: sorted[(top_left + 1) % 4],
    bottom_right: sorted[(top_left + 2) % 4],
    bottom_left: sorted[(top_left + 3) % 4],
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    frame::RoiSpace,
    model::BinaryMask,
    shape::{boundary_points, convex_hull},
  };

  fn pt(x: f32, y: f32) -> Point2D<RoiSpace> {
    Point2D::new(x, y)
  }

  fn hull_of(mask: &BinaryMask) -> Vec<Point2D<RoiSpace>> {
    convex_hull(&boundary_points(mask))
  }

  fn assert_top_left_minimal(quad: &Quad<RoiSpace>) {
    let tl = quad.top_left.x + quad.top_left.y;
    for p in quad.corners() {
      assert!(tl <= p.x + p.y);
    }
  }

  #[test]
  fn perimeter_of_closed_square() {
    let ring = [pt(0.0, 0.0), pt(3.0, 0.0), pt(3.0, 3.0), pt(0.0, 3.0), pt(0.0, 0.0)];
    assert_eq!(ring_perimeter(&ring), 12.0);
  }

  #[test]
  fn douglas_peucker_drops_small_deviations() {
    let line = [pt(0.0, 0.0), pt(1.0, 0.1), pt(2.0, -0.1), pt(3.0, 0.05), pt(4.0, 0.0)];
    let simplified = douglas_peucker(&line, 0.5);
    assert_eq!(simplified, vec![pt(0.0, 0.0), pt(4.0, 0.0)]);

    let bent = [pt(0.0, 0.0), pt(2.0, 3.0), pt(4.0, 0.0)];
    assert_eq!(douglas_peucker(&bent, 0.5).len(), 3);
  }

  #[test]
  fn rectangle_hull_is_returned_unchanged() {
    let mask = BinaryMask::from_fn(20, 16, |x, y| (5..=14).contains(&x) && (4..=11).contains(&y));
    let hull = hull_of(&mask);
    assert_eq!(hull.len(), 4);

    let Simplification::Converged {
      corners, iterations, ..
    } = simplify_to_quad(&hull)
    else {
      panic!("矩形凸包应当收敛");
    };
    assert_eq!(iterations, 1);
    assert_eq!(corners.to_vec(), hull);

    let quad = order_corners(corners);
    assert_eq!(quad.top_left, pt(5.0, 4.0));
    assert_eq!(quad.top_right, pt(14.0, 4.0));
    assert_eq!(quad.bottom_right, pt(14.0, 11.0));
    assert_eq!(quad.bottom_left, pt(5.0, 11.0));
  }

  #[test]
  fn diamond_converges_within_budget() {
    let mask = BinaryMask::from_fn(50, 50, |x, y| {
      (x as i32 - 25).abs() + (y as i32 - 25).abs() <= 20
    });
    let hull = hull_of(&mask);
    let Simplification::Converged {
      corners, iterations, ..
    } = simplify_to_quad(&hull)
    else {
      panic!("菱形凸包应当收敛");
    };
    assert!(iterations < MAX_SIMPLIFY_ITERATIONS);

    let quad = order_corners(corners);
    assert_top_left_minimal(&quad);
    assert_eq!(quad.top_left, pt(25.0, 5.0));
    assert_eq!(quad.top_right, pt(45.0, 25.0));
    assert_eq!(quad.bottom_right, pt(25.0, 45.0));
    assert_eq!(quad.bottom_left, pt(5.0, 25.0));
  }

  #[test]
  fn circle_terminates_within_budget() {
    let mask = BinaryMask::from_fn(64, 64, |x, y| {
      let (dx, dy) = (x as f32 - 32.0, y as f32 - 32.0);
      dx * dx + dy * dy <= 25.0 * 25.0
    });
    let hull = hull_of(&mask);
    assert!(hull.len() > 4);

    match simplify_to_quad(&hull) {
      Simplification::Converged {
        corners, iterations, ..
      } => {
        assert!(iterations <= MAX_SIMPLIFY_ITERATIONS);
        assert_top_left_minimal(&order_corners(corners));
      }
      Simplification::NotConverged { iterations, .. } => {
        assert_eq!(iterations, MAX_SIMPLIFY_ITERATIONS);
      }
    }
  }

  #[test]
  fn too_few_points_do_not_iterate() {
    let hull = [pt(0.0, 0.0), pt(4.0, 0.0), pt(2.0, 3.0)];
    assert_eq!(
      simplify_to_quad(&hull),
      Simplification::NotConverged {
        iterations: 0,
        last_len: 3
      }
    );
  }

  #[test]
  fn corner_order_is_independent_of_input_rotation() {
    let corners = [pt(10.0, 2.0), pt(12.0, 14.0), pt(1.0, 12.0), pt(0.0, 1.0)];
    let expected = order_corners(corners);
    assert_eq!(expected.top_left, pt(0.0, 1.0));
    assert_eq!(expected.top_right, pt(10.0, 2.0));
    assert_eq!(expected.bottom_right, pt(12.0, 14.0));
    assert_eq!(expected.bottom_left, pt(1.0, 12.0));

    for shift in 1..4 {
      let mut rotated = corners;
      rotated.rotate_left(shift);
      assert_eq!(order_corners(rotated), expected);
      assert_top_left_minimal(&order_corners(rotated));
    }
  }
}
