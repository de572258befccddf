// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/frame.rs - NCHW 输入张量定义
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

use image::RgbImage;
use thiserror::Error;

const RGB_CHANNELS: usize = 3;

#[derive(Error, Debug, PartialEq)]
pub enum TensorError {
  #[error("批次为空")]
  EmptyBatch,
  #[error("批次内尺寸不一致: 期望 {expected:?}, 实际 {actual:?}")]
  ShapeMismatch {
    expected: (u32, u32),
    actual: (u32, u32),
  },
}

/// `[N, 3, H, W]` 的 f32 张量，RGB 通道，取值归一化到 [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct NchwTensor {
  batch: usize,
  height: usize,
  width: usize,
  data: Box<[f32]>,
}

impl NchwTensor {
  pub fn zeros(batch: usize, height: usize, width: usize) -> Self {
    let size = batch * RGB_CHANNELS * height * width;
    Self {
      batch,
      height,
      width,
      data: vec![0.0; size].into_boxed_slice(),
    }
  }

  pub fn from_image(image: &RgbImage) -> Self {
    let (width, height) = image.dimensions();
    let mut tensor = Self::zeros(1, height as usize, width as usize);
    tensor.fill_plane(0, image);
    tensor
  }

  /// 所有图像尺寸必须一致
  pub fn from_images(images: &[RgbImage]) -> Result<Self, TensorError> {
    let first = images.first().ok_or(TensorError::EmptyBatch)?;
    let expected = first.dimensions();
    if let Some(other) = images.iter().find(|i| i.dimensions() != expected) {
      return Err(TensorError::ShapeMismatch {
        expected,
        actual: other.dimensions(),
      });
    }

    let mut tensor = Self::zeros(images.len(), expected.1 as usize, expected.0 as usize);
    for (n, image) in images.iter().enumerate() {
      tensor.fill_plane(n, image);
    }
    Ok(tensor)
  }

  // HWC u8 -> CHW f32 / 255
  fn fill_plane(&mut self, n: usize, image: &RgbImage) {
    let (height, width) = (self.height, self.width);
    let plane = height * width;
    let offset = n * RGB_CHANNELS * plane;
    let slice = &mut self.data[offset..offset + RGB_CHANNELS * plane];

    for (x, y, pixel) in image.enumerate_pixels() {
      let idx = (y as usize) * width + (x as usize);
      for c in 0..RGB_CHANNELS {
        slice[c * plane + idx] = pixel[c] as f32 / 255.0;
      }
    }
  }

  pub fn batch(&self) -> usize {
    self.batch
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn shape(&self) -> [usize; 4] {
    [self.batch, RGB_CHANNELS, self.height, self.width]
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }
}

impl AsRef<[f32]> for NchwTensor {
  fn as_ref(&self) -> &[f32] {
    &self.data
  }
}
