// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/task.rs - 检测任务
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

use std::{
  fmt::Display,
  sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, AtomicUsize, Ordering},
    mpsc,
  },
  thread,
  time::{Duration, Instant},
};

use anyhow::Context;
use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::{
  geometry::{ClassBoxMap, count_boxes},
  input::Frame,
  model::Detector,
  output::Render,
  pipeline::Pipeline,
};

pub trait Task<I, P, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, pipeline: P, output: O) -> Result<Self::Output, Self::Error>;
}

/// 只处理输入中的第一帧
pub struct OneShotTask;

impl<'p, D, E, I, O> Task<I, &'p Pipeline<D>, O> for OneShotTask
where
  D: Detector,
  E: std::error::Error + Send + Sync + 'static,
  I: Iterator<Item = Result<Frame, E>>,
  O: Render<Frame, ClassBoxMap>,
  O::Error: std::error::Error + Send + Sync + 'static,
{
  type Output = ClassBoxMap;
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, pipeline: &'p Pipeline<D>, output: O) -> anyhow::Result<ClassBoxMap> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))??;
    info!("输入帧 {} 获取成功，开始检测...", frame.name);
    let now = Instant::now();
    let result = pipeline.process_image(&frame.image)?;
    info!("检测完成，耗时: {:.2?}", now.elapsed());
    output.render_result(&frame, &result)?;
    output.finish()?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(result)
  }
}

#[derive(Debug, Clone)]
pub struct BatchSummary {
  /// 成功检测并输出的帧数
  pub processed: usize,
  /// 读取、检测或输出失败的帧数
  pub failed: usize,
  /// 所有成功帧中的检测框总数
  pub detections: usize,
  pub started_at: DateTime<Local>,
  pub elapsed: Duration,
}

/// 多线程批量检测。
///
/// 输入在调用线程中读取，通过有界通道分发给工作线程；
/// 单帧失败只记录并计数，不会中止整个批次。
#[derive(Debug, Clone)]
pub struct BatchTask {
  workers: usize,
  interrupt: bool,
}

impl Default for BatchTask {
  fn default() -> Self {
    Self {
      workers: thread::available_parallelism().map_or(1, |n| n.get()),
      interrupt: false,
    }
  }
}

impl BatchTask {
  pub fn with_workers(mut self, workers: usize) -> Self {
    self.workers = workers.max(1);
    self
  }

  /// 收到 Ctrl-C 后停止提交新帧，已提交的帧仍会处理完
  pub fn with_interrupt(mut self, interrupt: bool) -> Self {
    self.interrupt = interrupt;
    self
  }

  pub fn workers(&self) -> usize {
    self.workers
  }
}

#[derive(Default)]
struct Counters {
  processed: AtomicUsize,
  failed: AtomicUsize,
  detections: AtomicUsize,
}

fn handle_frame<D, O>(pipeline: &Pipeline<D>, output: &O, frame: &Frame, counters: &Counters)
where
  D: Detector,
  O: Render<Frame, ClassBoxMap>,
  O::Error: Display,
{
  let result = match pipeline.process_image(&frame.image) {
    Ok(result) => result,
    Err(e) => {
      warn!("检测 {} 失败: {}", frame.name, e);
      counters.failed.fetch_add(1, Ordering::Relaxed);
      return;
    }
  };

  match output.render_result(frame, &result) {
    Ok(()) => {
      counters.processed.fetch_add(1, Ordering::Relaxed);
      counters
        .detections
        .fetch_add(count_boxes(&result), Ordering::Relaxed);
    }
    Err(e) => {
      warn!("输出 {} 失败: {}", frame.name, e);
      counters.failed.fetch_add(1, Ordering::Relaxed);
    }
  }
}

impl<'p, D, E, I, O> Task<I, &'p Pipeline<D>, O> for BatchTask
where
  D: Detector + Sync,
  E: Display,
  I: Iterator<Item = Result<Frame, E>>,
  O: Render<Frame, ClassBoxMap> + Sync,
  O::Error: Display,
{
  type Output = BatchSummary;
  type Error = anyhow::Error;

  fn run_task(self, input: I, pipeline: &'p Pipeline<D>, output: O) -> anyhow::Result<BatchSummary> {
    let started_at = Local::now();
    let now = Instant::now();
    info!("开始批量任务, {} 个工作线程", self.workers);

    let stop = Arc::new(AtomicBool::new(false));
    if self.interrupt {
      let stop = stop.clone();
      ctrlc::set_handler(move || {
        warn!("收到中断信号，停止提交新任务...");
        stop.store(true, Ordering::SeqCst);
      })
      .context("无法设置 Ctrl-C 处理函数")?;
    }

    let counters = Counters::default();
    let (tx, rx) = mpsc::sync_channel::<Frame>(self.workers * 2);
    let rx = Mutex::new(rx);

    thread::scope(|s| {
      for worker in 0..self.workers {
        let (rx, counters, output) = (&rx, &counters, &output);
        s.spawn(move || {
          loop {
            let frame = rx.lock().unwrap_or_else(PoisonError::into_inner).recv();
            let Ok(frame) = frame else {
              break;
            };
            handle_frame(pipeline, output, &frame, counters);
          }
          info!("工作线程 {} 退出", worker);
        });
      }

      for item in input {
        if stop.load(Ordering::SeqCst) {
          warn!("中断信号接收，不再读取输入");
          break;
        }
        match item {
          Ok(frame) => {
            if tx.send(frame).is_err() {
              break;
            }
          }
          Err(e) => {
            warn!("读取输入失败: {}", e);
            counters.failed.fetch_add(1, Ordering::Relaxed);
          }
        }
      }
      drop(tx);
    });

    output
      .finish()
      .map_err(|e| anyhow::anyhow!("结束输出失败: {}", e))?;

    let summary = BatchSummary {
      processed: counters.processed.into_inner(),
      failed: counters.failed.into_inner(),
      detections: counters.detections.into_inner(),
      started_at,
      elapsed: now.elapsed(),
    };
    info!(
      "批量任务完成: 成功 {} 帧, 失败 {} 帧, 共 {} 个框, 耗时 {:.2?}",
      summary.processed, summary.failed, summary.detections, summary.elapsed
    );
    Ok(summary)
  }
}
