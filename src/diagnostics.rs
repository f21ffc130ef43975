//! # 诊断信息收集
//!
//! 交互式精修中可恢复的情况（丢弃禁止衍射、参数迁移失败、未收敛）
//! 不返回错误，而是返回一个 `Diagnostics` 值，同时通过 `tracing`
//! 记录一次日志。调用方可以直接断言诊断内容，无需捕获日志输出。
//!
//! ## 依赖关系
//! - 被 `phase.rs`、`pawley/` 使用
//! - 使用 `tracing` 记录日志

use std::fmt;

/// 诊断级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// 诊断类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// HKL 列表中存在被空间群禁止的衍射
    ForbiddenReflections,
    /// 显式 HKL 列表中的重复项
    DuplicateReflections,
    /// 相数或 HKL 数不一致
    ConfigurationMismatch,
    /// 求解器达到评估次数上限而未收敛
    ConvergenceWarning,
}

/// 单条诊断
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}

/// 诊断集合，每次 `push` 都会记录一条日志
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加一条诊断并记录日志
    pub fn push(&mut self, severity: Severity, kind: DiagnosticKind, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Info => tracing::info!("{}", message),
            Severity::Warning => tracing::warn!("{}", message),
            Severity::Error => tracing::error!("{}", message),
        }
        self.items.push(Diagnostic {
            severity,
            kind,
            message,
        });
    }

    pub fn warn(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        self.push(Severity::Warning, kind, message);
    }

    pub fn error(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        self.push(Severity::Error, kind, message);
    }

    /// 合并另一组诊断（不会重复记录日志）
    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// 指定级别的诊断数量
    pub fn count(&self, severity: Severity) -> usize {
        self.items.iter().filter(|d| d.severity == severity).count()
    }

    pub fn has_errors(&self) -> bool {
        self.count(Severity::Error) > 0
    }
}
