//! # 日志初始化
//!
//! 库代码只通过 `tracing` 宏输出；可执行程序在启动时安装订阅者：
//! stderr 紧凑格式，可选再写一份到日志文件（不带颜色）。
//!
//! | 参数     | 级别  |
//! |----------|-------|
//! | 默认     | WARN  |
//! | `-v`     | INFO  |
//! | `-vv`    | DEBUG |
//! | `-vvv`   | TRACE |
//! | `-q`     | 关闭  |
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `tracing-subscriber`

use crate::error::{PawleyError, Result};

use std::fs::File;
use std::path::Path;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*};

pub fn level_filter(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::OFF;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact();

    let subscriber = tracing_subscriber::registry()
        .with(level_filter(verbosity, quiet))
        .with(stderr_layer);

    match log_file {
        Some(path) => {
            let file = File::create(path).map_err(|e| PawleyError::FileWriteError {
                path: path.display().to_string(),
                source: e,
            })?;
            let file_layer = fmt::layer()
                .with_writer(file)
                .with_ansi(false)
                .with_target(true);
            subscriber.with(file_layer).try_init()
        }
        None => subscriber.try_init(),
    }
    .map_err(|e| PawleyError::Other(format!("Failed to install logger: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_level_filter() {
        assert_eq!(level_filter(0, false), LevelFilter::WARN);
        assert_eq!(level_filter(2, false), LevelFilter::DEBUG);
        assert_eq!(level_filter(7, false), LevelFilter::TRACE);
        assert_eq!(level_filter(3, true), LevelFilter::OFF);
    }

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_diagnostics_are_logged_once() {
        use crate::diagnostics::{DiagnosticKind, Diagnostics};

        let capture = Capture::default();
        let writer = capture.clone();
        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_writer(move || writer.clone())
                .with_ansi(false),
        );

        tracing::subscriber::with_default(subscriber, || {
            let mut diags = Diagnostics::new();
            diags.warn(DiagnosticKind::ConvergenceWarning, "stopped early");
        });

        let text = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert_eq!(text.matches("stopped early").count(), 1);
        assert!(text.contains("WARN"));
    }

    #[test]
    fn test_invalid_log_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = setup_logging(0, true, Some(dir.path()));
        assert!(matches!(result, Err(PawleyError::FileWriteError { .. })));
    }
}
