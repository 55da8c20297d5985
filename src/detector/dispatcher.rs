// 该文件是 Shanan （山南西风） 项目的一部分。
// src/detector/dispatcher.rs - 异步推理派发
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
  cell::RefCell,
  sync::{Arc, Mutex, PoisonError, RwLock},
  time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError, bounded};
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, error, info, warn};

use crate::{
  detector::{BlobConfig, DetectionFilter, DetectorConfig, DetectorError, ProposalDecoder, build_blob},
  frame::Frame,
  letterbox::{Letterbox, Letterboxed},
  model::{ArmorObject, Model},
};

/// 检测结果回调：(检测结果, 纳秒时间戳, 原始帧)
pub type DetectorCallback = Arc<dyn Fn(&[ArmorObject], i64, &Frame) + Send + Sync>;

/// 一次提交的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  /// 回调已调用
  Delivered { detections: usize },
  /// 流水线完整执行，但提交时没有注册回调
  NoCallback,
  /// 空帧，没有调用模型
  EmptyFrame,
}

impl Outcome {
  pub fn delivered(&self) -> bool {
    matches!(self, Outcome::Delivered { .. })
  }
}

/// 提交后返回的句柄，结果只能取走一次。
///
/// 句柄可以移交给其他线程，但只应在一个线程中轮询或等待（`!Sync`）。
pub struct DetectionHandle {
  rx: Receiver<Result<Outcome, DetectorError>>,
  slot: RefCell<Option<Result<Outcome, DetectorError>>>,
}

impl DetectionHandle {
  fn ready(result: Result<Outcome, DetectorError>) -> Self {
    Self {
      rx: crossbeam_channel::never(),
      slot: RefCell::new(Some(result)),
    }
  }

  fn store(&self, result: Result<Outcome, DetectorError>) {
    *self.slot.borrow_mut() = Some(result);
  }

  fn poll(&self) -> bool {
    if self.slot.borrow().is_some() {
      return true;
    }
    match self.rx.try_recv() {
      Ok(result) => self.store(result),
      Err(TryRecvError::Empty) => return false,
      Err(TryRecvError::Disconnected) => self.store(Err(DetectorError::WorkerLost)),
    }
    true
  }

  pub fn is_finished(&self) -> bool {
    self.poll()
  }

  /// 最多等待 `timeout`，返回任务是否已经结束
  pub fn wait_timeout(&self, timeout: Duration) -> bool {
    if self.poll() {
      return true;
    }
    match self.rx.recv_timeout(timeout) {
      Ok(result) => self.store(result),
      Err(RecvTimeoutError::Timeout) => return false,
      Err(RecvTimeoutError::Disconnected) => self.store(Err(DetectorError::WorkerLost)),
    }
    true
  }

  pub fn wait_outcome(self) -> Result<Outcome, DetectorError> {
    if let Some(result) = self.slot.into_inner() {
      return result;
    }
    self
      .rx
      .recv()
      .unwrap_or(Err(DetectorError::WorkerLost))
  }

  /// 回调被调用时为 `true`，空帧或没有回调时为 `false`
  pub fn wait(self) -> Result<bool, DetectorError> {
    self.wait_outcome().map(|outcome| outcome.delivered())
  }
}

/// 单帧流水线中与线程无关的部分
#[derive(Debug, Clone, Copy)]
struct Pipeline {
  blob: BlobConfig,
  decoder: ProposalDecoder,
  filter: DetectionFilter,
}

impl Pipeline {
  fn run<M: Model>(
    &self,
    model: &M,
    gate: Option<&Mutex<()>>,
    boxed: &Letterboxed,
  ) -> Result<Vec<ArmorObject>, DetectorError> {
    let input = build_blob(&boxed.image, boxed.order, &self.blob);

    let output = {
      let _guard = gate.map(|g| g.lock().unwrap_or_else(PoisonError::into_inner));
      let start = Instant::now();
      let output = model
        .infer(&input)
        .map_err(|e| DetectorError::Inference(Box::new(e)))?;
      debug!("推理耗时: {:?}", start.elapsed());
      output
    };

    let proposals = self.decoder.decode(&output, &boxed.transform)?;
    let keep = self.filter.filter(&proposals.boxes, &proposals.scores);
    Ok(proposals.select(&keep))
  }
}

/// 装甲板检测器。
///
/// 每次 `submit` 在调用线程上完成缩放填充，其余步骤作为独立任务在线程池中执行，
/// 不同帧的完成顺序没有保证。
pub struct ArmorDetector<M: Model> {
  model: Arc<M>,
  gate: Option<Arc<Mutex<()>>>,
  callback: RwLock<Option<DetectorCallback>>,
  pool: ThreadPool,
  config: DetectorConfig,
  letterbox: Letterbox,
  pipeline: Pipeline,
}

impl<M: Model> ArmorDetector<M> {
  pub fn new(model: M, config: DetectorConfig) -> Result<Self, DetectorError> {
    Self::with_shared_model(Arc::new(model), config)
  }

  pub fn with_shared_model(model: Arc<M>, config: DetectorConfig) -> Result<Self, DetectorError> {
    config.validate()?;

    let pool = ThreadPoolBuilder::new()
      .num_threads(config.workers)
      .thread_name(|i| format!("armor-infer-{}", i))
      .panic_handler(|_| error!("推理任务异常退出"))
      .build()?;

    info!(
      "创建检测器: 输入 {}x{}, conf={}, nms={}, top_k={}, 线程数 {}",
      config.input_width,
      config.input_height,
      config.conf_threshold,
      config.nms_threshold,
      config.top_k,
      pool.current_num_threads()
    );

    let letterbox =
      Letterbox::new(config.input_width, config.input_height).with_pad_value(config.pad_value);
    let pipeline = Pipeline {
      blob: config.blob,
      decoder: ProposalDecoder::new(config.layout(), config.conf_threshold),
      filter: DetectionFilter::new(config.conf_threshold, config.nms_threshold, config.top_k),
    };
    let gate = config
      .serialize_inference
      .then(|| Arc::new(Mutex::new(())));

    Ok(Self {
      model,
      gate,
      callback: RwLock::new(None),
      pool,
      config,
      letterbox,
      pipeline,
    })
  }

  pub fn config(&self) -> &DetectorConfig {
    &self.config
  }

  pub fn model(&self) -> &Arc<M> {
    &self.model
  }

  /// 替换回调，已经提交的帧仍使用提交时的回调
  pub fn set_callback<F>(&self, callback: F)
  where
    F: Fn(&[ArmorObject], i64, &Frame) + Send + Sync + 'static,
  {
    let callback: DetectorCallback = Arc::new(callback);
    *self
      .callback
      .write()
      .unwrap_or_else(PoisonError::into_inner) = Some(callback);
  }

  pub fn clear_callback(&self) {
    *self
      .callback
      .write()
      .unwrap_or_else(PoisonError::into_inner) = None;
  }

  fn callback_snapshot(&self) -> Option<DetectorCallback> {
    self
      .callback
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  /// 在当前线程同步执行完整流水线，不调用回调
  pub fn detect(&self, frame: &Frame) -> Result<Vec<ArmorObject>, DetectorError> {
    if frame.is_empty() {
      warn!("输入帧为空，跳过检测");
      return Ok(Vec::new());
    }
    let boxed = self.letterbox.apply(frame);
    self
      .pipeline
      .run(self.model.as_ref(), self.gate.as_deref(), &boxed)
  }

  /// 提交一帧，立即返回句柄
  pub fn submit(&self, frame: Frame, timestamp_ns: i64) -> DetectionHandle {
    if frame.is_empty() {
      warn!("输入帧为空，跳过检测: ts={}", timestamp_ns);
      return DetectionHandle::ready(Ok(Outcome::EmptyFrame));
    }

    let boxed = self.letterbox.apply(&frame);
    let callback = self.callback_snapshot();
    let model = Arc::clone(&self.model);
    let gate = self.gate.clone();
    let pipeline = self.pipeline;

    let (tx, rx) = bounded(1);
    self.pool.spawn(move || {
      let result = pipeline
        .run(model.as_ref(), gate.as_deref(), &boxed)
        .map(|objects| match callback {
          Some(callback) => {
            debug!("交付 {} 个检测结果: ts={}", objects.len(), timestamp_ns);
            callback(&objects, timestamp_ns, &frame);
            Outcome::Delivered {
              detections: objects.len(),
            }
          }
          None => {
            warn!("没有注册回调，丢弃 {} 个检测结果", objects.len());
            Outcome::NoCallback
          }
        });

      if let Err(e) = &result {
        error!("检测任务失败: ts={}, {}", timestamp_ns, e);
      }
      // 调用方可能已经丢弃句柄
      let _ = tx.send(result);
    });

    DetectionHandle {
      rx,
      slot: RefCell::new(None),
    }
  }
}
