// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};
use tracing::debug;

use crate::{
  geometry::{ClassBoxMap, ClassId, PixelBox},
  postprocess::SizeFilter,
};

const PALETTE_SIZE: usize = 80;
const BOX_THICKNESS: u32 = 2;

/// 按类别着色绘制边框，绘制前再做一次尺寸过滤
#[derive(Debug, Clone)]
pub struct Draw {
  palette: Vec<Rgb<u8>>,
  thickness: u32,
  size_filter: SizeFilter,
}

impl Default for Draw {
  fn default() -> Self {
    let palette = (0..PALETTE_SIZE)
      .map(|i| hsv_to_rgb((i as f32 / PALETTE_SIZE as f32) * 360.0, 0.8, 0.9))
      .collect();

    Self {
      palette,
      thickness: BOX_THICKNESS,
      size_filter: SizeFilter::default(),
    }
  }
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = if h < 60.0 {
    (c, x, 0.0)
  } else if h < 120.0 {
    (x, c, 0.0)
  } else if h < 180.0 {
    (0.0, c, x)
  } else if h < 240.0 {
    (0.0, x, c)
  } else if h < 300.0 {
    (x, 0.0, c)
  } else {
    (c, 0.0, x)
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}

impl Draw {
  pub fn with_size_filter(mut self, size_filter: SizeFilter) -> Self {
    self.size_filter = size_filter;
    self
  }

  pub fn with_thickness(mut self, thickness: u32) -> Self {
    self.thickness = thickness.max(1);
    self
  }

  pub fn color_of(&self, class_id: ClassId) -> Rgb<u8> {
    self.palette[class_id.0 as usize % self.palette.len()]
  }

  fn draw_box(&self, image: &mut RgbImage, b: &PixelBox, color: Rgb<u8>) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    let x_min = b.x_min.clamp(0, w - 1);
    let y_min = b.y_min.clamp(0, h - 1);
    let x_max = b.x_max.clamp(0, w - 1);
    let y_max = b.y_max.clamp(0, h - 1);

    for t in 0..self.thickness as i32 {
      let (x0, y0, x1, y1) = (x_min + t, y_min + t, x_max - t, y_max - t);
      if x0 > x1 || y0 > y1 {
        break;
      }
      let rect = Rect::at(x0, y0).of_size((x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32);
      draw_hollow_rect_mut(image, rect, color);
    }
  }

  /// 在图像上绘制检测框，返回实际绘制的框数
  pub fn draw_boxes(&self, image: &mut RgbImage, result: &ClassBoxMap) -> usize {
    if image.width() == 0 || image.height() == 0 {
      return 0;
    }

    let mut drawn = 0;
    for (class_id, boxes) in result {
      let color = self.color_of(*class_id);
      for b in boxes.iter().filter(|b| self.size_filter.accepts(b)) {
        self.draw_box(image, b, color);
        drawn += 1;
      }
    }
    debug!("绘制 {} 个检测框", drawn);
    drawn
  }

  pub fn draw_detection(&self, image: &RgbImage, result: &ClassBoxMap) -> RgbImage {
    let mut canvas = image.clone();
    self.draw_boxes(&mut canvas, result);
    canvas
  }
}
