// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/bin/check_labels.rs - 标注检查
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

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use kuangxuan::{
  dataset::{map_from_labels, read_labels},
  input::FolderInput,
  output::draw::Draw,
  postprocess::SizeFilter,
};

/// 把 darknet 标注画回图像上，用于人工检查。
///
/// 数据集目录结构为 `<root>/images/<split>/*.jpg` 与 `<root>/labels/<split>/*.txt`。
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 数据集根目录
  #[arg(long, value_name = "DIR")]
  pub dataset: PathBuf,
  /// 数据集划分
  #[arg(long, default_value = "train", value_name = "SPLIT")]
  pub split: String,
  /// 结果输出目录
  #[arg(long, value_name = "DIR")]
  pub output: PathBuf,
  /// 最多检查的图像数
  #[arg(long, value_name = "COUNT")]
  pub limit: Option<usize>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let images = args.dataset.join("images").join(&args.split);
  let labels = args.dataset.join("labels").join(&args.split);
  info!("图像目录: {}", images.display());
  info!("标签目录: {}", labels.display());

  std::fs::create_dir_all(&args.output)
    .with_context(|| format!("无法创建输出目录 {}", args.output.display()))?;

  // 标注框原样绘制
  let draw = Draw::default().with_size_filter(SizeFilter::disabled());
  let (mut checked, mut missing) = (0usize, 0usize);

  for frame in FolderInput::open(&images, false, args.limit)? {
    let frame = match frame {
      Ok(frame) => frame,
      Err(e) => {
        warn!("跳过无法读取的图像: {}", e);
        continue;
      }
    };

    let label_path = labels.join(format!("{}.txt", frame.name));
    if !label_path.is_file() {
      warn!("缺少标签文件: {}", label_path.display());
      missing += 1;
      continue;
    }

    let (w, h) = frame.image.dimensions();
    let parsed = read_labels(&label_path)
      .with_context(|| format!("标签文件格式错误 {}", label_path.display()))?;
    let boxes = map_from_labels(&parsed, w, h);

    let out_path = args.output.join(format!("{}.png", frame.name));
    draw.draw_detection(&frame.image, &boxes).save(&out_path)?;
    info!("{}: {} 个标注框", frame.name, parsed.len());
    checked += 1;
  }

  info!("检查完成: {} 张图像, {} 张缺少标签", checked, missing);
  Ok(())
}
