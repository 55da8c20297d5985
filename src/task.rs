// 该文件是 Shanan （山南西风） 项目的一部分。
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
  collections::VecDeque,
  fmt::Display,
  thread,
  time::{Duration, Instant},
};

use tracing::{info, warn};

use crate::{
  detector::{ArmorDetector, DetectionHandle, Outcome},
  frame::Frame,
  model::{ArmorObject, Model},
  output::{Render, into_callback},
};

pub trait Task<I, M: Model, O>: Sized {
  type Error;
  fn run_task(self, input: I, detector: ArmorDetector<M>, output: O) -> Result<(), Self::Error>;
}

/// 当前时间的纳秒时间戳
pub fn timestamp_ns() -> i64 {
  chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

fn report(index: usize, outcome: &Outcome, elapsed: Duration) {
  match outcome {
    Outcome::Delivered { detections } => {
      info!("({})检测完成, {} 个目标, 耗时: {:.2?}", index, detections, elapsed)
    }
    Outcome::NoCallback => warn!("({})检测完成但没有回调, 耗时: {:.2?}", index, elapsed),
    Outcome::EmptyFrame => warn!("({})输入帧为空", index),
  }
}

pub struct OneShotTask;

impl<I, M, O> Task<I, M, O> for OneShotTask
where
  I: Iterator<Item = Frame>,
  M: Model,
  O: Render<Frame, [ArmorObject]> + Send + Sync + 'static,
  O::Error: Display,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, detector: ArmorDetector<M>, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功 {}x{}，开始推理...", frame.width(), frame.height());
    detector.set_callback(into_callback(output));

    let now = Instant::now();
    let outcome = detector.submit(frame, timestamp_ns()).wait_outcome()?;
    report(0, &outcome, now.elapsed());

    Ok(())
  }
}

pub struct RepeatShotTask {
  repeat: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { repeat: 1000 }
  }
}

impl RepeatShotTask {
  pub fn with_repeat(mut self, repeat: usize) -> Self {
    self.repeat = repeat;
    self
  }
}

impl<I, M, O> Task<I, M, O> for RepeatShotTask
where
  I: Iterator<Item = Frame>,
  M: Model,
  O: Render<Frame, [ArmorObject]> + Send + Sync + 'static,
  O::Error: Display,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, detector: ArmorDetector<M>, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    detector.set_callback(into_callback(output));

    let mut times = Vec::with_capacity(self.repeat);
    for i in 0..self.repeat {
      let now = Instant::now();
      let outcome = detector
        .submit(frame.clone(), timestamp_ns())
        .wait_outcome()?;
      let elapsed = now.elapsed();
      report(i, &outcome, elapsed);
      times.push(elapsed);
    }

    // 前两次为预热
    if times.len() > 2 {
      warn!(
        "平均检测时间: {:.2?}",
        times.iter().skip(2).sum::<Duration>() / (times.len() - 2) as u32
      );
    }

    Ok(())
  }
}

#[derive(Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  in_flight: usize,
  handle_interrupt: bool,
}

impl Default for ContinuousTask {
  fn default() -> Self {
    Self {
      frame_number: None,
      in_flight: 1,
      handle_interrupt: true,
    }
  }
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 同时在途的帧数，至少为 1
  pub fn with_in_flight(mut self, in_flight: usize) -> Self {
    self.in_flight = in_flight.max(1);
    self
  }

  /// 是否安装 Ctrl-C 处理器，每个进程只能安装一次
  pub fn with_interrupt(mut self, handle_interrupt: bool) -> Self {
    self.handle_interrupt = handle_interrupt;
    self
  }
}

struct Pending {
  index: usize,
  submitted: Instant,
  handle: DetectionHandle,
}

impl Pending {
  fn finish(self) -> anyhow::Result<Outcome> {
    let outcome = self.handle.wait_outcome()?;
    report(self.index, &outcome, self.submitted.elapsed());
    Ok(outcome)
  }
}

impl<I, M, O> Task<I, M, O> for ContinuousTask
where
  I: Iterator<Item = Frame>,
  M: Model,
  O: Render<Frame, [ArmorObject]> + Send + Sync + 'static,
  O::Error: Display,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, detector: ArmorDetector<M>, output: O) -> Result<(), Self::Error> {
    info!("开始任务... 在途帧数上限 {}", self.in_flight);
    detector.set_callback(into_callback(output));

    let (tx, rx) = crossbeam_channel::bounded(1);
    if self.handle_interrupt {
      ctrlc::set_handler(move || {
        info!("收到中断信号，准备退出...");
        let _ = tx.try_send(());
        thread::spawn(|| {
          thread::sleep(Duration::from_secs(30));
          warn!("强制退出程序");
          std::process::exit(1);
        });
      })?;
    }

    let mut pending: VecDeque<Pending> = VecDeque::with_capacity(self.in_flight);
    let mut frame_index = 0;
    for frame in input {
      frame_index += 1;

      while pending.len() >= self.in_flight {
        if let Some(oldest) = pending.pop_front() {
          oldest.finish()?;
        }
      }

      info!("提交第 {} 帧图像", frame_index);
      pending.push_back(Pending {
        index: frame_index,
        submitted: Instant::now(),
        handle: detector.submit(frame, timestamp_ns()),
      });

      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    for remaining in pending {
      remaining.finish()?;
    }

    info!("任务完成，共 {} 帧", frame_index);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{detector::DetectorConfig, model::ReplayModel};
  use image::RgbImage;
  use ndarray::Array3;
  use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  };

  struct Counting(Arc<AtomicUsize>);

  impl Render<Frame, [ArmorObject]> for Counting {
    type Error = std::io::Error;

    fn render_result(&self, _frame: &Frame, _result: &[ArmorObject]) -> Result<(), Self::Error> {
      self.0.fetch_add(1, Ordering::SeqCst);
      Ok(())
    }
  }

  fn detector() -> ArmorDetector<ReplayModel> {
    let config = DetectorConfig {
      input_width: 32,
      input_height: 32,
      workers: 2,
      ..DetectorConfig::default()
    };
    ArmorDetector::new(ReplayModel::new(Array3::zeros((1, 0, 21))), config).unwrap()
  }

  fn frames(n: usize) -> impl Iterator<Item = Frame> {
    (0..n).map(|_| Frame::from(RgbImage::new(40, 30)))
  }

  #[test]
  fn one_shot_renders_first_frame() {
    let calls = Arc::new(AtomicUsize::new(0));
    OneShotTask
      .run_task(frames(3), detector(), Counting(calls.clone()))
      .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn one_shot_without_input_fails() {
    let calls = Arc::new(AtomicUsize::new(0));
    assert!(
      OneShotTask
        .run_task(frames(0), detector(), Counting(calls))
        .is_err()
    );
  }

  #[test]
  fn repeat_shot_renders_every_run() {
    let calls = Arc::new(AtomicUsize::new(0));
    RepeatShotTask::default()
      .with_repeat(5)
      .run_task(frames(1), detector(), Counting(calls.clone()))
      .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 5);
  }

  #[test]
  fn continuous_drains_and_honours_frame_limit() {
    let calls = Arc::new(AtomicUsize::new(0));
    ContinuousTask::default()
      .with_interrupt(false)
      .with_in_flight(2)
      .run_task(frames(6), detector(), Counting(calls.clone()))
      .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 6);

    let calls = Arc::new(AtomicUsize::new(0));
    ContinuousTask::default()
      .with_interrupt(false)
      .with_frame_number(Some(3))
      .run_task(frames(6), detector(), Counting(calls.clone()))
      .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }
}
