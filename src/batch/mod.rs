//! # 批量拟合
//!
//! 对一个目录下的多个谱文件依次做独立的 1D 精修。每个文件使用自己的
//! 物相副本，文件之间不共享状态，因此可以并行。
//!
//! ## 依赖关系
//! - 被 `commands/fit_batch.rs` 使用
//! - 使用 `walkdir` + `glob` 收集文件
//! - 使用 `rayon` 并行、`indicatif` 显示进度

pub mod collector;
pub mod runner;

pub use collector::FileCollector;
pub use runner::{BatchResult, BatchRunner, ProcessResult};
