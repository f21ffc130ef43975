//! # pawley - 中子粉末衍射 Pawley 精修
//!
//! 把每个允许衍射的积分强度作为独立参数，对测量谱做有界非线性最小二乘拟合，
//! 可同时精修晶格参数。支持单谱（1D）和多散射角（2D）两种模型。
//!
//! ## 依赖关系
//! ```text
//! lib.rs
//!   ├── crystal/     (晶胞、空间群、消光规则、晶格约束)
//!   ├── phase.rs     (物相：晶格 + 空间群 + HKL 列表)
//!   ├── profile/     (分辨率模型与峰形)
//!   ├── background.rs
//!   ├── solver/      (有界 Levenberg-Marquardt)
//!   ├── pawley/      (1D / 2D 精修模型)
//!   │     └── models/ (测量谱、参数向量)
//!   ├── parsers/     (CIF、XY、2D CSV)
//!   ├── config/      (TOML 配置)
//!   ├── report/      (表格、导出、绘图)
//!   ├── batch/       (批量拟合)
//!   ├── diagnostics.rs / error.rs
//!   └── logging.rs
//! ```

pub mod background;
pub mod batch;
pub mod cli;
pub mod commands;
pub mod config;
pub mod crystal;
pub mod diagnostics;
pub mod error;
pub mod logging;
pub mod models;
pub mod parsers;
pub mod pawley;
pub mod phase;
pub mod profile;
pub mod report;
pub mod solver;
pub mod utils;

pub use background::Background;
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use error::{PawleyError, Result};
pub use models::{Pattern1D, Pattern2D, Spectrum};
pub use pawley::{PawleyPattern1D, PawleyPattern2D};
pub use phase::{Phase, PhaseRef};
pub use profile::{GaussianProfile, PVProfile, PeakProfile, ResolutionModel};
pub use solver::{FitResult, FitStatus, LeastSquaresSolver, LevenbergMarquardt};
