// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/postprocess/size.rs - 按尺寸过滤退化框
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

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::{ClassBoxMap, PixelBox};

const DEFAULT_MIN_SIDE: f32 = 2.0;
const DEFAULT_MIN_AREA: f32 = 16.0;
const DEFAULT_MAX_ASPECT: f32 = 50.0;

/// 尺寸过滤阈值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeFilter {
  /// 宽和高的最小值（像素）
  pub min_side: f32,
  /// 最小面积（平方像素）
  pub min_area: f32,
  /// 长边与短边之比的上限
  pub max_aspect: f32,
}

impl Default for SizeFilter {
  fn default() -> Self {
    Self {
      min_side: DEFAULT_MIN_SIDE,
      min_area: DEFAULT_MIN_AREA,
      max_aspect: DEFAULT_MAX_ASPECT,
    }
  }
}

impl SizeFilter {
  /// 不过滤任何非空框
  pub fn disabled() -> Self {
    Self {
      min_side: 0.0,
      min_area: 0.0,
      max_aspect: f32::INFINITY,
    }
  }

  pub fn min_side(mut self, min_side: f32) -> Self {
    self.min_side = min_side;
    self
  }

  pub fn min_area(mut self, min_area: f32) -> Self {
    self.min_area = min_area;
    self
  }

  pub fn max_aspect(mut self, max_aspect: f32) -> Self {
    self.max_aspect = max_aspect;
    self
  }

  pub fn accepts(&self, b: &PixelBox) -> bool {
    let (w, h) = (b.width() as f32, b.height() as f32);
    let short = w.min(h);
    if short <= 0.0 || short < self.min_side || w * h < self.min_area {
      return false;
    }
    w.max(h) / short <= self.max_aspect
  }

  /// 返回 (保留, 丢弃)，两者都保持输入顺序
  pub fn filter_by_size(&self, boxes: Vec<PixelBox>) -> (Vec<PixelBox>, Vec<PixelBox>) {
    boxes.into_iter().partition(|b| self.accepts(b))
  }

  /// 对每个类别分别过滤，类别键始终保留，全部被丢弃时对应空列表
  pub fn filter_map(&self, map: ClassBoxMap) -> ClassBoxMap {
    map
      .into_iter()
      .map(|(class_id, boxes)| {
        let (kept, dropped) = self.filter_by_size(boxes);
        if !dropped.is_empty() {
          debug!("类别 {}: 尺寸过滤丢弃 {} 个框", class_id, dropped.len());
        }
        (class_id, kept)
      })
      .collect()
  }
}
