// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/pipeline.rs - 单张图像检测流程
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
use tracing::{debug, info};

use crate::{
  config::{ConfigError, DetectConfig},
  frame::NchwTensor,
  geometry::{ClassBoxMap, PixelBox, count_boxes},
  model::{Detector, RawDetection},
  postprocess::{NmsConfig, resolve, suppress},
  preprocess::{compute_canvas, letterbox, load_img},
  transform::LetterboxTransform,
};

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("图像无效: {0}")]
  InvalidImage(String),
  #[error("配置无效: {0}")]
  InvalidConfig(#[from] ConfigError),
  #[error("推理失败: {0}")]
  Inference(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl PipelineError {
  fn inference<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
    PipelineError::Inference(Box::new(err))
  }
}

impl From<image::ImageError> for PipelineError {
  fn from(err: image::ImageError) -> Self {
    PipelineError::InvalidImage(err.to_string())
  }
}

/// 输出前置信度保留的小数位数
const EMIT_CONF_DECIMALS: i32 = 4;

fn round_confidence(confidence: f32) -> f32 {
  let scale = 10f32.powi(EMIT_CONF_DECIMALS);
  (confidence * scale).round() / scale
}

/// 送入检测器的张量及其逆变换
#[derive(Debug, Clone)]
pub struct Prepared {
  pub tensor: NchwTensor,
  pub transform: LetterboxTransform,
}

/// 检测流程：预缩放 -> letterbox -> 推理 -> NMS -> 坐标还原 -> 按类别分组 -> 跨类别过滤 -> 尺寸过滤。
///
/// `process_image` 只读取 `self`，检测器实现 `Sync` 时可以在多个线程中同时调用。
pub struct Pipeline<D> {
  detector: D,
  config: DetectConfig,
}

impl<D: Detector> Pipeline<D> {
  pub fn new(detector: D, config: DetectConfig) -> Self {
    Self { detector, config }
  }

  pub fn config(&self) -> &DetectConfig {
    &self.config
  }

  pub fn detector(&self) -> &D {
    &self.detector
  }

  pub fn prepare(&self, image: &RgbImage) -> Result<Prepared, PipelineError> {
    let (w0, h0) = image.dimensions();
    if w0 == 0 || h0 == 0 {
      return Err(PipelineError::InvalidImage(format!("尺寸为 {}x{}", w0, h0)));
    }
    self.config.validate()?;

    let resized = load_img(image, self.config.img_size);
    let canvas = compute_canvas(
      h0,
      w0,
      self.config.img_size,
      self.config.stride,
      self.config.pad,
    );
    if canvas.width == 0 || canvas.height == 0 {
      return Err(PipelineError::InvalidImage(format!(
        "{}x{} 的画布尺寸为 {}x{}",
        w0, h0, canvas.width, canvas.height
      )));
    }
    let boxed = letterbox(&resized, canvas, self.config.allow_upscale);

    Ok(Prepared {
      tensor: NchwTensor::from_image(&boxed.image),
      transform: LetterboxTransform {
        orig_shape: (h0, w0),
        resized_shape: (resized.height(), resized.width()),
        ratio: boxed.ratio,
        pad: boxed.pad,
      },
    })
  }

  /// 原始检测 -> 最终的类别框映射
  pub fn postprocess(&self, raw: &[RawDetection], transform: &LetterboxTransform) -> ClassBoxMap {
    let config = &self.config;
    let kept = suppress(raw, &NmsConfig::from(config));

    let mut grouped = ClassBoxMap::new();
    for det in kept {
      // 先保留四位小数再与输出阈值比较
      if round_confidence(det.confidence) <= config.emit_conf_thres {
        continue;
      }
      let bbox = transform.to_original(&det.bbox);
      grouped
        .entry(det.class_id)
        .or_default()
        .push(PixelBox::from(bbox));
    }
    debug!("分组后共 {} 个类别, {} 个框", grouped.len(), count_boxes(&grouped));

    let resolved = resolve(grouped, config.main_label, config.overlap_iou_thres);
    config.size_filter.filter_map(resolved)
  }

  pub fn process_image(&self, image: &RgbImage) -> Result<ClassBoxMap, PipelineError> {
    let now = std::time::Instant::now();
    let prepared = self.prepare(image)?;
    debug!(
      "输入张量形状: {:?}, 变换: {:?}",
      prepared.tensor.shape(),
      prepared.transform
    );

    let raw = self
      .detector
      .infer(&prepared.tensor)
      .map_err(PipelineError::inference)?
      .into_iter()
      .next()
      .unwrap_or_default();

    let result = self.postprocess(&raw, &prepared.transform);
    info!(
      "检测完成: {} 个类别, {} 个框, 耗时 {:.2?}",
      result.len(),
      count_boxes(&result),
      now.elapsed()
    );
    Ok(result)
  }

  /// 解码编码后的图像数据再检测，解码失败视为无效图像
  pub fn process_bytes(&self, bytes: &[u8]) -> Result<ClassBoxMap, PipelineError> {
    let image = image::load_from_memory(bytes)?.to_rgb8();
    self.process_image(&image)
  }
}
