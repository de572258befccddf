// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/postprocess/overlap.rs - 跨类别重叠过滤
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

use crate::geometry::{ClassBoxMap, ClassId};

/// 以主类别为准过滤其他类别的重叠框。
///
/// 非主类别的框只要与任一主类别框的 min-IoU（交集 / 较小面积）超过阈值即被丢弃，
/// 主类别的框不受影响。只有一个类别或没有主类别时原样返回。
/// 全部被丢弃的非主类别不会出现在结果中。
pub fn resolve(mut map: ClassBoxMap, main_label: ClassId, iou_threshold: f32) -> ClassBoxMap {
  if map.len() <= 1 || !map.contains_key(&main_label) {
    debug!("跳过跨类别过滤: {} 个类别, 主类别 {}", map.len(), main_label);
    return map;
  }

  let main_boxes = map.remove(&main_label).unwrap_or_default();
  let main_bboxes: Vec<_> = main_boxes.iter().map(|b| b.as_bbox()).collect();

  let mut resolved = ClassBoxMap::new();
  for (class_id, boxes) in map {
    let before = boxes.len();
    let kept: Vec<_> = boxes
      .into_iter()
      .filter(|b| {
        let other = b.as_bbox();
        !main_bboxes.iter().any(|m| m.min_iou(&other) > iou_threshold)
      })
      .collect();

    debug!("类别 {}: 跨类别过滤 {} -> {}", class_id, before, kept.len());
    if !kept.is_empty() {
      resolved.insert(class_id, kept);
    }
  }
  resolved.insert(main_label, main_boxes);

  resolved
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::geometry::PixelBox;

  fn map(entries: Vec<(u32, Vec<[i32; 4]>)>) -> ClassBoxMap {
    entries
      .into_iter()
      .map(|(c, boxes)| (ClassId(c), boxes.into_iter().map(PixelBox::from).collect()))
      .collect()
  }

  #[test]
  fn nested_box_is_dropped_and_disjoint_kept() {
    let input = map(vec![
      (0, vec![[0, 0, 100, 100]]),
      (1, vec![[10, 10, 50, 50], [200, 200, 250, 250]]),
    ]);
    let out = resolve(input, ClassId(0), 0.6);
    assert_eq!(out, map(vec![(0, vec![[0, 0, 100, 100]]), (1, vec![[200, 200, 250, 250]])]));
  }

  #[test]
  fn main_boxes_are_never_dropped() {
    let input = map(vec![
      (0, vec![[10, 10, 50, 50]]),
      (1, vec![[0, 0, 100, 100]]),
    ]);
    // 大的非主类别框包含小的主类别框，min-IoU 同样为 1.0，非主类别框被丢弃
    let out = resolve(input, ClassId(0), 0.6);
    assert_eq!(out, map(vec![(0, vec![[10, 10, 50, 50]])]));
  }

  #[test]
  fn threshold_is_strict() {
    // 交集 60x100 = 6000, 较小面积 10000 -> 0.6
    let input = map(vec![
      (0, vec![[0, 0, 100, 100]]),
      (2, vec![[40, 0, 140, 100]]),
    ]);
    let out = resolve(input.clone(), ClassId(0), 0.6);
    assert_eq!(out, input);
    let out = resolve(input, ClassId(0), 0.59);
    assert_eq!(out, map(vec![(0, vec![[0, 0, 100, 100]])]));
  }

  #[test]
  fn single_class_passes_through() {
    let input = map(vec![(1, vec![[0, 0, 10, 10], [0, 0, 10, 10]])]);
    assert_eq!(resolve(input.clone(), ClassId(0), 0.6), input);

    let only_main = map(vec![(0, vec![[0, 0, 10, 10], [1, 1, 9, 9]])]);
    assert_eq!(resolve(only_main.clone(), ClassId(0), 0.6), only_main);
  }

  #[test]
  fn missing_main_label_passes_through() {
    let input = map(vec![
      (1, vec![[0, 0, 100, 100]]),
      (2, vec![[10, 10, 50, 50]]),
    ]);
    assert_eq!(resolve(input.clone(), ClassId(0), 0.6), input);
  }

  #[test]
  fn empty_main_class_drops_nothing() {
    let input = map(vec![(0, vec![]), (1, vec![[10, 10, 50, 50]])]);
    assert_eq!(resolve(input.clone(), ClassId(0), 0.6), input);
  }
}
