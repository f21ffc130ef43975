//! # 批量执行器
//!
//! 基于 rayon 的并行执行，进度条显示，失败收集后统一汇报。

use crate::utils::progress;

use rayon::prelude::*;
use std::path::PathBuf;

/// 单个文件的处理结果
#[derive(Debug, Clone)]
pub enum ProcessResult<T> {
    Success(PathBuf, T),
    Skipped(PathBuf),
    /// (文件, 错误信息)
    Failed(PathBuf, String),
}

/// 批量结果；成功项按输入顺序保存
#[derive(Debug)]
pub struct BatchResult<T> {
    pub successes: Vec<(PathBuf, T)>,
    pub skipped: usize,
    pub failures: Vec<(PathBuf, String)>,
}

impl<T> Default for BatchResult<T> {
    fn default() -> Self {
        BatchResult {
            successes: Vec::new(),
            skipped: 0,
            failures: Vec::new(),
        }
    }
}

impl<T> BatchResult<T> {
    pub fn merge(&mut self, result: ProcessResult<T>) {
        match result {
            ProcessResult::Success(path, value) => self.successes.push((path, value)),
            ProcessResult::Skipped(_) => self.skipped += 1,
            ProcessResult::Failed(path, err) => self.failures.push((path, err)),
        }
    }

    pub fn total(&self) -> usize {
        self.successes.len() + self.skipped + self.failures.len()
    }
}

pub struct BatchRunner {
    jobs: usize,
}

impl BatchRunner {
    /// `jobs = 0` 表示使用全部 CPU
    pub fn new(jobs: usize) -> Self {
        let jobs = if jobs == 0 { num_cpus::get() } else { jobs };
        Self { jobs }
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    pub fn run<T, F>(&self, files: Vec<PathBuf>, processor: F) -> BatchResult<T>
    where
        T: Send,
        F: Fn(&PathBuf) -> ProcessResult<T> + Sync + Send,
    {
        let pb = progress::create_progress_bar(files.len() as u64, "Fitting");

        let work = || -> Vec<ProcessResult<T>> {
            files
                .par_iter()
                .map(|file| {
                    let result = processor(file);
                    pb.inc(1);
                    result
                })
                .collect()
        };

        let results = match rayon::ThreadPoolBuilder::new().num_threads(self.jobs).build() {
            Ok(pool) => pool.install(work),
            Err(e) => {
                tracing::warn!("Could not build a {}-thread pool ({}), using the global pool", self.jobs, e);
                work()
            }
        };

        pb.finish_and_clear();

        let mut batch = BatchResult::default();
        for result in results {
            batch.merge(result);
        }
        batch
    }
}
