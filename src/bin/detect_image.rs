// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/bin/detect_image.rs - 单张图像检测
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

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use kuangxuan::{
  FromUrl,
  args::DetectArgs,
  geometry::count_boxes,
  input::InputWrapper,
  model::ReplayDetectorBuilder,
  output::OutputWrapper,
  pipeline::Pipeline,
  task::{OneShotTask, Task},
};

/// 对单张图像运行检测，输出类别 -> 像素框映射
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测器，例如 replay:///path/to/records.json
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源，例如 image:///path/to/a.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，支持 image://、json://、folder://
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  #[command(flatten)]
  pub detect: DetectArgs,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("检测器: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let config = args.detect.into_config()?;
  let detector = ReplayDetectorBuilder::from_url(&args.model)?.build()?;
  let pipeline = Pipeline::new(detector, config);
  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;

  let result = OneShotTask.run_task(input, &pipeline, output)?;
  info!("共 {} 个类别, {} 个框", result.len(), count_boxes(&result));
  println!("{}", serde_json::to_string(&result)?);

  Ok(())
}
