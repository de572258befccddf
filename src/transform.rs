// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/transform.rs - 原图与模型输入之间的坐标映射
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

use crate::geometry::{BBox, ModelSpace, OriginalSpace};

/// 单张图像的前向变换：预缩放（原图 -> resized）后接 letterbox（缩放 + 填充）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LetterboxTransform {
  /// 原图 (height, width)
  pub orig_shape: (u32, u32),
  /// 预缩放后 (height, width)
  pub resized_shape: (u32, u32),
  /// letterbox 缩放比例
  pub ratio: f32,
  /// letterbox 填充 (pad_x, pad_y)
  pub pad: (f32, f32),
}

impl LetterboxTransform {
  /// 原图到模型输入的每轴总增益 (gain_x, gain_y)
  pub fn gain(&self) -> (f32, f32) {
    let (h0, w0) = self.orig_shape;
    let (h, w) = self.resized_shape;
    (
      w as f32 / w0 as f32 * self.ratio,
      h as f32 / h0 as f32 * self.ratio,
    )
  }

  /// 模型输入空间 -> 原图空间，结果裁剪到 [0, W-1] x [0, H-1]
  pub fn to_original(&self, bbox: &BBox<ModelSpace>) -> BBox<OriginalSpace> {
    let (gx, gy) = self.gain();
    let (px, py) = self.pad;
    let (h0, w0) = self.orig_shape;
    let max_x = w0.saturating_sub(1) as f32;
    let max_y = h0.saturating_sub(1) as f32;

    BBox::new(
      ((bbox.x1 - px) / gx).clamp(0.0, max_x),
      ((bbox.y1 - py) / gy).clamp(0.0, max_y),
      ((bbox.x2 - px) / gx).clamp(0.0, max_x),
      ((bbox.y2 - py) / gy).clamp(0.0, max_y),
    )
  }

  /// 原图空间 -> 模型输入空间
  pub fn to_model(&self, bbox: &BBox<OriginalSpace>) -> BBox<ModelSpace> {
    let (gx, gy) = self.gain();
    let (px, py) = self.pad;

    BBox::new(
      bbox.x1 * gx + px,
      bbox.y1 * gy + py,
      bbox.x2 * gx + px,
      bbox.y2 * gy + py,
    )
  }
}

/// 单次映射的便捷形式，`orig_shape` 与 `resized_shape` 均为 (height, width)
pub fn to_original(
  bbox: &BBox<ModelSpace>,
  ratio: f32,
  pad: (f32, f32),
  orig_shape: (u32, u32),
  resized_shape: (u32, u32),
) -> BBox<OriginalSpace> {
  LetterboxTransform {
    orig_shape,
    resized_shape,
    ratio,
    pad,
  }
  .to_original(bbox)
}
