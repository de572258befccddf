// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/preprocess/canvas.rs - letterbox 画布尺寸计算
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

/// 画布尺寸，两边均为 stride 的整数倍
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasShape {
  pub height: u32,
  pub width: u32,
}

/// 根据原图宽高比计算对齐到 stride 的画布尺寸。
///
/// 长边比例为 1，短边比例为宽高比，各自乘以 `img_size / stride` 后加上 `pad`
/// 向上取整，再乘回 `stride`。调用方需保证 `height` 和 `width` 非零。
pub fn compute_canvas(height: u32, width: u32, img_size: u32, stride: u32, pad: f32) -> CanvasShape {
  let ar = height as f64 / width as f64;
  let (rh, rw) = if ar < 1.0 {
    (ar, 1.0)
  } else if ar > 1.0 {
    (1.0, 1.0 / ar)
  } else {
    (1.0, 1.0)
  };

  let side = |r: f64| {
    let cells = (r * img_size as f64 / stride as f64 + pad as f64).ceil();
    cells as u32 * stride
  };

  CanvasShape {
    height: side(rh),
    width: side(rw),
  }
}
