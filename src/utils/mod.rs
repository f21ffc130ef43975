//! # 工具函数模块
//!
//! 终端输出样式与进度条。
//!
//! ## 依赖关系
//! - 被 `commands/`、`batch/`、`main.rs` 使用

pub mod output;
pub mod progress;
