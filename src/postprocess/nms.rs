// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/postprocess/nms.rs - 置信度过滤与非极大值抑制
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

use crate::{
  config::DetectConfig,
  geometry::{CoordSpace, Detection, ModelSpace},
  model::RawDetection,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NmsConfig {
  pub conf_thres: f32,
  pub iou_thres: f32,
  pub multi_label: bool,
  pub agnostic: bool,
  pub max_det: usize,
}

impl From<&DetectConfig> for NmsConfig {
  fn from(config: &DetectConfig) -> Self {
    Self {
      conf_thres: config.conf_thres,
      iou_thres: config.iou_thres,
      multi_label: config.multi_label,
      agnostic: config.agnostic,
      max_det: config.max_det,
    }
  }
}

/// 置信度过滤后执行 NMS。
///
/// `multi_label` 为真时，每个 (框, 类别) 组合都是独立候选；否则每个框只取最高分类别。
/// 置信度不大于 `conf_thres` 的候选在任何几何比较之前被丢弃。
pub fn suppress(raw: &[RawDetection], config: &NmsConfig) -> Vec<Detection<ModelSpace>> {
  let mut candidates = Vec::with_capacity(raw.len());
  for det in raw {
    if config.multi_label {
      candidates.extend(
        det
          .scores
          .iter()
          .filter(|s| s.confidence > config.conf_thres)
          .map(|s| Detection {
            bbox: det.bbox,
            confidence: s.confidence,
            class_id: s.class_id,
          }),
      );
    } else if let Some(best) = det.best()
      && best.confidence > config.conf_thres
    {
      candidates.push(Detection {
        bbox: det.bbox,
        confidence: best.confidence,
        class_id: best.class_id,
      });
    }
  }

  let total = candidates.len();
  let kept = non_max_suppression(candidates, config.iou_thres, config.agnostic, config.max_det);
  debug!(
    "NMS: 原始 {} 个框, 候选 {} 个, 保留 {} 个",
    raw.len(),
    total,
    kept.len()
  );
  kept
}

/// 贪心 NMS，输出按置信度降序，置信度相同时保持输入顺序
pub fn non_max_suppression<S: CoordSpace>(
  mut candidates: Vec<Detection<S>>,
  iou_thres: f32,
  agnostic: bool,
  max_det: usize,
) -> Vec<Detection<S>> {
  // 稳定排序
  candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

  let mut suppressed = vec![false; candidates.len()];
  let mut kept = Vec::new();

  for i in 0..candidates.len() {
    if suppressed[i] {
      continue;
    }
    if kept.len() >= max_det {
      break;
    }

    let best = candidates[i];
    kept.push(best);

    for (j, other) in candidates.iter().enumerate().skip(i + 1) {
      if suppressed[j] || (!agnostic && other.class_id != best.class_id) {
        continue;
      }
      if best.bbox.iou(&other.bbox) > iou_thres {
        suppressed[j] = true;
      }
    }
  }

  kept
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    geometry::{BBox, ClassId},
    model::ClassScore,
  };

  fn raw(b: [f32; 4], conf: f32, class: u32) -> RawDetection {
    RawDetection::new(BBox::from_array(b), conf, ClassId(class))
  }

  fn config() -> NmsConfig {
    NmsConfig::from(&DetectConfig::default())
  }

  #[test]
  fn duplicate_box_is_suppressed() {
    let dets = vec![
      raw([105.0, 105.0, 305.0, 305.0], 0.5, 0),
      raw([100.0, 100.0, 300.0, 300.0], 0.9, 0),
    ];
    let out = suppress(&dets, &config());
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].confidence, 0.9);
    assert_eq!(out[0].bbox.to_array(), [100.0, 100.0, 300.0, 300.0]);
  }

  #[test]
  fn class_aware_unless_agnostic() {
    let dets = vec![
      raw([0.0, 0.0, 100.0, 100.0], 0.9, 0),
      raw([2.0, 2.0, 100.0, 100.0], 0.8, 1),
    ];
    assert_eq!(suppress(&dets, &config()).len(), 2);

    let agnostic = NmsConfig {
      agnostic: true,
      ..config()
    };
    let out = suppress(&dets, &agnostic);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].class_id, ClassId(0));
  }

  #[test]
  fn confidence_floor_is_strict() {
    let dets = vec![
      raw([0.0, 0.0, 10.0, 10.0], 0.25, 0),
      raw([50.0, 50.0, 60.0, 60.0], 0.2500001, 0),
      raw([80.0, 80.0, 90.0, 90.0], f32::NAN, 0),
    ];
    for thres in [0.0f32, 0.1, 0.25, 0.3, 0.9] {
      let cfg = NmsConfig {
        conf_thres: thres,
        ..config()
      };
      let out = suppress(&dets, &cfg);
      assert!(out.iter().all(|d| d.confidence > thres), "thres {thres}");
    }
    let cfg = NmsConfig {
      conf_thres: 0.25,
      ..config()
    };
    assert_eq!(suppress(&dets, &cfg).len(), 1);
  }

  #[test]
  fn multi_label_expands_class_pairs() {
    let det = RawDetection::with_scores(
      BBox::new(0.0, 0.0, 10.0, 10.0),
      vec![
        ClassScore {
          class_id: ClassId(0),
          confidence: 0.6,
        },
        ClassScore {
          class_id: ClassId(1),
          confidence: 0.4,
        },
        ClassScore {
          class_id: ClassId(2),
          confidence: 0.0005,
        },
      ],
    );

    let out = suppress(std::slice::from_ref(&det), &config());
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].class_id, ClassId(0));
    assert_eq!(out[1].class_id, ClassId(1));

    let single = NmsConfig {
      multi_label: false,
      ..config()
    };
    let out = suppress(&[det], &single);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].class_id, ClassId(0));
  }

  #[test]
  fn output_is_sorted_and_ties_keep_input_order() {
    let dets = vec![
      raw([0.0, 0.0, 10.0, 10.0], 0.5, 0),
      raw([20.0, 0.0, 30.0, 10.0], 0.7, 0),
      raw([40.0, 0.0, 50.0, 10.0], 0.5, 1),
      raw([60.0, 0.0, 70.0, 10.0], 0.5, 0),
    ];
    let out = suppress(&dets, &config());
    let xs: Vec<f32> = out.iter().map(|d| d.bbox.x1).collect();
    assert_eq!(xs, vec![20.0, 0.0, 40.0, 60.0]);
  }

  #[test]
  fn suppression_is_idempotent() {
    let mut dets = Vec::new();
    for i in 0..40u32 {
      let off = (i % 7) as f32 * 9.0 + (i / 7) as f32 * 3.0;
      dets.push(raw(
        [off, off * 0.5, off + 40.0, off * 0.5 + 30.0],
        0.05 + (i as f32 * 0.37) % 0.9,
        i % 3,
      ));
    }
    let once = suppress(&dets, &config());
    let again_input: Vec<RawDetection> = once.iter().copied().map(RawDetection::from).collect();
    let twice = suppress(&again_input, &config());
    assert_eq!(once, twice);
  }

  #[test]
  fn max_det_caps_output() {
    let dets: Vec<_> = (0..10)
      .map(|i| raw([i as f32 * 20.0, 0.0, i as f32 * 20.0 + 10.0, 10.0], 0.5, 0))
      .collect();
    let cfg = NmsConfig {
      max_det: 4,
      ..config()
    };
    assert_eq!(suppress(&dets, &cfg).len(), 4);
  }

  #[test]
  fn empty_input_yields_empty_output() {
    assert!(suppress(&[], &config()).is_empty());
  }
}
