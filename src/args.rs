// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/args.rs - 命令行检测参数
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

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use tracing::info;

use crate::{config::DetectConfig, geometry::ClassId};

/// 各二进制共用的检测参数，命令行参数覆盖配置文件中的值
#[derive(Args, Debug, Clone, Default)]
pub struct DetectArgs {
  /// JSON 格式的检测配置文件
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,

  /// 目标输入边长
  #[arg(long, value_name = "PIXELS")]
  pub img_size: Option<u32>,

  /// NMS 前的置信度阈值 (0.0 - 1.0)
  #[arg(long, value_name = "THRESHOLD")]
  pub conf_thres: Option<f32>,

  /// 最终输出的置信度阈值 (0.0 - 1.0)
  #[arg(long, value_name = "THRESHOLD")]
  pub emit_conf_thres: Option<f32>,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, value_name = "THRESHOLD")]
  pub iou_thres: Option<f32>,

  /// 跨类别重叠阈值 (0.0 - 1.0)
  #[arg(long, value_name = "THRESHOLD")]
  pub overlap_iou_thres: Option<f32>,

  /// 主类别编号
  #[arg(long, value_name = "CLASS")]
  pub main_label: Option<ClassId>,

  /// 允许 letterbox 放大小图
  #[arg(long)]
  pub allow_upscale: bool,

  /// NMS 跨类别抑制
  #[arg(long)]
  pub agnostic: bool,
}

impl DetectArgs {
  pub fn into_config(self) -> anyhow::Result<DetectConfig> {
    let mut config = match &self.config {
      Some(path) => {
        info!("读取配置文件: {}", path.display());
        let text = std::fs::read_to_string(path)
          .with_context(|| format!("无法读取配置文件 {}", path.display()))?;
        serde_json::from_str::<DetectConfig>(&text)
          .with_context(|| format!("配置文件格式错误 {}", path.display()))?
      }
      None => DetectConfig::default(),
    };

    if let Some(v) = self.img_size {
      config = config.img_size(v);
    }
    if let Some(v) = self.conf_thres {
      config = config.conf_thres(v);
    }
    if let Some(v) = self.emit_conf_thres {
      config = config.emit_conf_thres(v);
    }
    if let Some(v) = self.iou_thres {
      config = config.iou_thres(v);
    }
    if let Some(v) = self.overlap_iou_thres {
      config = config.overlap_iou_thres(v);
    }
    if let Some(v) = self.main_label {
      config = config.main_label(v);
    }
    if self.allow_upscale {
      config = config.allow_upscale(true);
    }
    if self.agnostic {
      config = config.agnostic(true);
    }

    config.validate()?;
    Ok(config)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::Parser;

  #[derive(Parser)]
  struct Cli {
    #[command(flatten)]
    detect: DetectArgs,
  }

  #[test]
  fn flags_override_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("detect.json");
    std::fs::write(&path, r#"{"img_size": 1280, "iou_thres": 0.5}"#).unwrap();

    let cli = Cli::parse_from([
      "test",
      "--config",
      path.to_str().unwrap(),
      "--iou-thres",
      "0.7",
      "--main-label",
      "3",
      "--agnostic",
    ]);
    let config = cli.detect.into_config().unwrap();
    assert_eq!(config.img_size, 1280);
    assert_eq!(config.iou_thres, 0.7);
    assert_eq!(config.main_label, ClassId(3));
    assert!(config.agnostic);
    assert!(!config.allow_upscale);
  }

  #[test]
  fn missing_config_file_is_an_error() {
    let args = DetectArgs {
      config: Some(PathBuf::from("/nonexistent/kuangxuan.json")),
      ..Default::default()
    };
    assert!(args.into_config().is_err());
  }

  #[test]
  fn zero_img_size_is_rejected() {
    let args = DetectArgs {
      img_size: Some(0),
      ..Default::default()
    };
    assert!(args.into_config().is_err());
  }
}
