//! # 美化输出工具
//!
//! 面向用户的终端消息：`[OK]`、`[WARN]`、`[ERR]`、`[*]` 前缀。
//! 诊断日志走 `tracing`，这里只负责命令结果的展示。
//!
//! ## 依赖关系
//! - 被 `commands/`、`main.rs` 使用
//! - 使用 `colored` crate

use crate::diagnostics::{Diagnostics, Severity};

use colored::Colorize;

/// 打印成功消息
pub fn print_success(msg: &str) {
    println!("{} {}", "[OK]".green().bold(), msg);
}

/// 打印错误消息
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERR]".red().bold(), msg);
}

/// 打印警告消息
pub fn print_warning(msg: &str) {
    println!("{} {}", "[WARN]".yellow().bold(), msg);
}

/// 打印信息消息
pub fn print_info(msg: &str) {
    println!("{} {}", "[*]".blue().bold(), msg);
}

/// 打印完成消息
pub fn print_done(msg: &str) {
    println!("{} {}", "[DONE]".green().bold(), msg);
}

/// 打印标题栏
pub fn print_header(title: &str) {
    let line = "─".repeat(60);
    println!("\n{}", line.dimmed());
    println!("  {}", title.bold());
    println!("{}\n", line.dimmed());
}

/// 打印分隔线
pub fn print_separator() {
    println!("{}", "─".repeat(60).dimmed());
}

/// 打印键值对
pub fn print_kv(key: &str, value: &str) {
    println!("  {:<20} {}", format!("{}:", key).dimmed(), value);
}

/// 按严重程度打印诊断
pub fn print_diagnostics(diagnostics: &Diagnostics) {
    for d in diagnostics.iter() {
        match d.severity {
            Severity::Info => print_info(&d.message),
            Severity::Warning => print_warning(&d.message),
            Severity::Error => print_error(&d.message),
        }
    }
}
