// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/model.rs - 检测器接口
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
  frame::NchwTensor,
  geometry::{BBox, ClassId, Detection, ModelSpace},
};

/// 检测器后端。
///
/// 输入为 `[N, 3, H', W']` 的归一化张量，按批次顺序返回每张图的原始检测，
/// 框坐标位于模型输入像素空间。多个 worker 共享同一实例时需实现 `Sync`。
pub trait Detector {
  type Error: std::error::Error + Send + Sync + 'static;

  fn infer(&self, input: &NchwTensor) -> Result<Vec<Vec<RawDetection>>, Self::Error>;
}

impl<D: Detector + ?Sized> Detector for &D {
  type Error = D::Error;

  fn infer(&self, input: &NchwTensor) -> Result<Vec<Vec<RawDetection>>, Self::Error> {
    (**self).infer(input)
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassScore {
  pub class_id: ClassId,
  pub confidence: f32,
}

/// 检测器输出的一个框，可以携带多个类别得分
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
  pub bbox: BBox<ModelSpace>,
  pub scores: Vec<ClassScore>,
}

impl RawDetection {
  pub fn new(bbox: BBox<ModelSpace>, confidence: f32, class_id: ClassId) -> Self {
    Self {
      bbox,
      scores: vec![ClassScore {
        class_id,
        confidence,
      }],
    }
  }

  pub fn with_scores(bbox: BBox<ModelSpace>, scores: Vec<ClassScore>) -> Self {
    Self { bbox, scores }
  }

  /// 得分最高的类别，并列时取靠前者
  pub fn best(&self) -> Option<ClassScore> {
    self.scores.iter().copied().fold(None, |best, s| match best {
      Some(b) if b.confidence >= s.confidence => Some(b),
      _ => Some(s),
    })
  }
}

impl From<Detection<ModelSpace>> for RawDetection {
  fn from(det: Detection<ModelSpace>) -> Self {
    RawDetection::new(det.bbox, det.confidence, det.class_id)
  }
}

#[cfg(feature = "model_replay")]
mod replay;
#[cfg(feature = "model_replay")]
pub use self::replay::{ReplayDetector, ReplayDetectorBuilder, ReplayDetectorError};

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn best_prefers_first_on_ties() {
    let det = RawDetection::with_scores(
      BBox::new(0.0, 0.0, 1.0, 1.0),
      vec![
        ClassScore {
          class_id: ClassId(3),
          confidence: 0.4,
        },
        ClassScore {
          class_id: ClassId(1),
          confidence: 0.7,
        },
        ClassScore {
          class_id: ClassId(2),
          confidence: 0.7,
        },
      ],
    );
    assert_eq!(det.best().map(|s| s.class_id), Some(ClassId(1)));
    assert_eq!(
      RawDetection::with_scores(BBox::new(0.0, 0.0, 1.0, 1.0), vec![]).best(),
      None
    );
  }
}
