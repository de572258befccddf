// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/preprocess/letterbox.rs - 预缩放与 letterbox 填充
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

use std::borrow::Cow;

use image::{Rgb, RgbImage, imageops};
use tracing::debug;

use super::CanvasShape;

/// 填充区域的中性灰
pub const LETTERBOX_FILL: [u8; 3] = [114, 114, 114];

/// letterbox 结果
#[derive(Debug, Clone)]
pub struct Letterboxed {
  /// 与画布尺寸完全一致的图像
  pub image: RgbImage,
  /// 统一缩放比例
  pub ratio: f32,
  /// 每侧的填充量 (pad_x, pad_y)，即剩余空间的一半
  pub pad: (f32, f32),
}

// 缩小用区域平均，放大用双线性
fn resize(image: &RgbImage, width: u32, height: u32) -> RgbImage {
  if width == image.width() && height == image.height() {
    return image.clone();
  }
  if width <= image.width() && height <= image.height() {
    imageops::thumbnail(image, width, height)
  } else {
    imageops::resize(image, width, height, imageops::FilterType::Triangle)
  }
}

/// 长边超过 `img_size` 时先按比例缩小到长边等于 `img_size`，否则原样返回
pub fn load_img(image: &RgbImage, img_size: u32) -> Cow<'_, RgbImage> {
  let (w0, h0) = image.dimensions();
  let longest = w0.max(h0);
  if longest <= img_size {
    return Cow::Borrowed(image);
  }

  // 整数运算截断，保证长边恰好为 img_size
  let scaled = |side: u32| ((side as u64 * img_size as u64 / longest as u64) as u32).max(1);
  let width = scaled(w0);
  let height = scaled(h0);
  debug!("预缩放: {}x{} -> {}x{}", w0, h0, width, height);
  Cow::Owned(resize(image, width, height))
}

/// 等比缩放并居中填充到 `canvas`
pub fn letterbox(image: &RgbImage, canvas: CanvasShape, allow_upscale: bool) -> Letterboxed {
  let (w, h) = image.dimensions();

  let mut r = (canvas.height as f64 / h as f64).min(canvas.width as f64 / w as f64);
  if !allow_upscale {
    r = r.min(1.0);
  }

  let new_w = ((w as f64 * r).round() as u32).clamp(1, canvas.width);
  let new_h = ((h as f64 * r).round() as u32).clamp(1, canvas.height);

  let dw = (canvas.width - new_w) as f64 / 2.0;
  let dh = (canvas.height - new_h) as f64 / 2.0;

  // 奇数剩余量时左/上取下整，右/下取上整
  let left = (dw - 0.1).round() as i64;
  let top = (dh - 0.1).round() as i64;

  let resized = resize(image, new_w, new_h);
  let mut padded = RgbImage::from_pixel(canvas.width, canvas.height, Rgb(LETTERBOX_FILL));
  imageops::replace(&mut padded, &resized, left, top);

  debug!(
    "letterbox: {}x{} -> {}x{}, 比例 {:.4}, 填充 ({:.1}, {:.1})",
    w, h, canvas.width, canvas.height, r, dw, dh
  );

  Letterboxed {
    image: padded,
    ratio: r as f32,
    pad: (dw as f32, dh as f32),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::preprocess::compute_canvas;

  fn solid(width: u32, height: u32, value: u8) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([value, value, value]))
  }

  #[test]
  fn small_image_is_not_pre_resized() {
    let image = solid(320, 200, 10);
    assert!(matches!(load_img(&image, 640), Cow::Borrowed(_)));
  }

  #[test]
  fn large_image_is_pre_resized_to_img_size() {
    let image = solid(1280, 720, 10);
    let resized = load_img(&image, 640);
    assert_eq!(resized.dimensions(), (640, 360));

    let odd = solid(1001, 333, 10);
    // 333 * 640 / 1001 = 212.9 -> 截断为 212
    assert_eq!(load_img(&odd, 640).dimensions(), (640, 212));
  }

  #[test]
  fn letterbox_centers_without_upscaling() {
    let image = solid(640, 360, 200);
    let canvas = compute_canvas(720, 1280, 640, 32, 0.5);
    let out = letterbox(&image, canvas, false);

    assert_eq!(out.image.dimensions(), (672, 384));
    assert_eq!(out.ratio, 1.0);
    assert_eq!(out.pad, (16.0, 12.0));

    assert_eq!(out.image.get_pixel(15, 100), &Rgb(LETTERBOX_FILL));
    assert_eq!(out.image.get_pixel(16, 12), &Rgb([200, 200, 200]));
    assert_eq!(out.image.get_pixel(655, 371), &Rgb([200, 200, 200]));
    assert_eq!(out.image.get_pixel(656, 371), &Rgb(LETTERBOX_FILL));
    assert_eq!(out.image.get_pixel(100, 372), &Rgb(LETTERBOX_FILL));
  }

  #[test]
  fn odd_padding_puts_extra_pixel_after_content() {
    let image = solid(101, 50, 200);
    let canvas = CanvasShape {
      height: 64,
      width: 128,
    };
    let out = letterbox(&image, canvas, false);

    // dw = 27 / 2 = 13.5 -> 左 13，右 14
    assert_eq!(out.pad.0, 13.5);
    assert_eq!(out.image.get_pixel(12, 30), &Rgb(LETTERBOX_FILL));
    assert_eq!(out.image.get_pixel(13, 30), &Rgb([200, 200, 200]));
    assert_eq!(out.image.get_pixel(113, 30), &Rgb([200, 200, 200]));
    assert_eq!(out.image.get_pixel(114, 30), &Rgb(LETTERBOX_FILL));
  }

  #[test]
  fn upscale_only_when_allowed() {
    let image = solid(100, 50, 200);
    let canvas = CanvasShape {
      height: 128,
      width: 128,
    };

    let kept = letterbox(&image, canvas, false);
    assert_eq!(kept.ratio, 1.0);

    let grown = letterbox(&image, canvas, true);
    assert!((grown.ratio - 1.28).abs() < 1e-6);
    assert_eq!(grown.pad, (0.0, 32.0));
    assert_eq!(grown.image.dimensions(), (128, 128));
  }

  #[test]
  fn shrinks_into_smaller_canvas() {
    let image = solid(400, 200, 200);
    let canvas = CanvasShape {
      height: 96,
      width: 160,
    };
    let out = letterbox(&image, canvas, false);
    assert!((out.ratio - 0.4).abs() < 1e-6);
    assert_eq!(out.pad, (0.0, 8.0));
    assert_eq!(out.image.dimensions(), (160, 96));
  }
}
