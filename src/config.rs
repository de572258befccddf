// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/config.rs - 检测流程配置
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
use thiserror::Error;

use crate::{geometry::ClassId, postprocess::SizeFilter};

pub const DEFAULT_IMG_SIZE: u32 = 640;
pub const DEFAULT_STRIDE: u32 = 32;
pub const DEFAULT_CANVAS_PAD: f32 = 0.5;
pub const DEFAULT_CONF_THRES: f32 = 0.001;
pub const DEFAULT_EMIT_CONF_THRES: f32 = 0.2;
pub const DEFAULT_IOU_THRES: f32 = 0.6;
pub const DEFAULT_OVERLAP_IOU_THRES: f32 = 0.6;
pub const DEFAULT_MAX_DET: usize = 300;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
  #[error("img_size 必须大于 0")]
  ZeroImgSize,
  #[error("stride 必须大于 0")]
  ZeroStride,
  #[error("pad 必须是非负有限值: {0}")]
  InvalidPad(f32),
}

/// 检测流程配置，启动时构建一次，之后只读
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectConfig {
  /// 目标输入边长
  pub img_size: u32,
  /// 检测器下采样步长，画布边长必须是其整数倍
  pub stride: u32,
  /// 画布尺寸的额外填充系数
  pub pad: f32,
  /// 是否允许 letterbox 放大图像
  pub allow_upscale: bool,
  /// NMS 前的置信度下限
  pub conf_thres: f32,
  /// 最终输出的置信度下限
  pub emit_conf_thres: f32,
  /// NMS IoU 阈值
  pub iou_thres: f32,
  /// 跨类别重叠阈值（交集 / 较小面积）
  pub overlap_iou_thres: f32,
  /// 主类别
  pub main_label: ClassId,
  /// 一个框是否可以同时输出多个类别
  pub multi_label: bool,
  /// NMS 是否跨类别
  pub agnostic: bool,
  /// NMS 后最多保留的检测数
  pub max_det: usize,
  pub size_filter: SizeFilter,
}

impl Default for DetectConfig {
  fn default() -> Self {
    Self {
      img_size: DEFAULT_IMG_SIZE,
      stride: DEFAULT_STRIDE,
      pad: DEFAULT_CANVAS_PAD,
      allow_upscale: false,
      conf_thres: DEFAULT_CONF_THRES,
      emit_conf_thres: DEFAULT_EMIT_CONF_THRES,
      iou_thres: DEFAULT_IOU_THRES,
      overlap_iou_thres: DEFAULT_OVERLAP_IOU_THRES,
      main_label: ClassId(0),
      multi_label: true,
      agnostic: false,
      max_det: DEFAULT_MAX_DET,
      size_filter: SizeFilter::default(),
    }
  }
}

impl DetectConfig {
  /// 检查画布相关参数，非法时 letterbox 无法构造有效画布
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.img_size == 0 {
      return Err(ConfigError::ZeroImgSize);
    }
    if self.stride == 0 {
      return Err(ConfigError::ZeroStride);
    }
    if !self.pad.is_finite() || self.pad < 0.0 {
      return Err(ConfigError::InvalidPad(self.pad));
    }
    Ok(())
  }

  pub fn img_size(mut self, img_size: u32) -> Self {
    self.img_size = img_size;
    self
  }

  pub fn stride(mut self, stride: u32) -> Self {
    self.stride = stride;
    self
  }

  pub fn pad(mut self, pad: f32) -> Self {
    self.pad = pad;
    self
  }

  pub fn allow_upscale(mut self, allow_upscale: bool) -> Self {
    self.allow_upscale = allow_upscale;
    self
  }

  pub fn conf_thres(mut self, conf_thres: f32) -> Self {
    self.conf_thres = conf_thres;
    self
  }

  pub fn emit_conf_thres(mut self, emit_conf_thres: f32) -> Self {
    self.emit_conf_thres = emit_conf_thres;
    self
  }

  pub fn iou_thres(mut self, iou_thres: f32) -> Self {
    self.iou_thres = iou_thres;
    self
  }

  pub fn overlap_iou_thres(mut self, overlap_iou_thres: f32) -> Self {
    self.overlap_iou_thres = overlap_iou_thres;
    self
  }

  pub fn main_label(mut self, main_label: ClassId) -> Self {
    self.main_label = main_label;
    self
  }

  pub fn multi_label(mut self, multi_label: bool) -> Self {
    self.multi_label = multi_label;
    self
  }

  pub fn agnostic(mut self, agnostic: bool) -> Self {
    self.agnostic = agnostic;
    self
  }

  pub fn max_det(mut self, max_det: usize) -> Self {
    self.max_det = max_det;
    self
  }

  pub fn size_filter(mut self, size_filter: SizeFilter) -> Self {
    self.size_filter = size_filter;
    self
  }
}
