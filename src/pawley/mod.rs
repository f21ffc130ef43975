//! # Pawley 精修引擎
//!
//! - `PawleyPattern1D`: 单谱模型，每个衍射一个独立积分强度
//! - `PawleyPattern2D`: 多散射角模型，可选全局标度与波长屏蔽
//!
//! 两者共用 `model.rs` 中的拟合驱动：只把自由参数交给最小二乘求解器，
//! 结果写回模型与共享物相。
//!
//! ## 依赖关系
//! - 使用 `phase.rs`、`profile/`、`background.rs`、`solver/`
//! - 被 `commands/`、`batch/`、`report/` 使用

mod model;
mod pattern1d;
mod pattern2d;

pub use model::{integrate, rwp, Reflection};
pub use pattern1d::PawleyPattern1D;
pub use pattern2d::PawleyPattern2D;
