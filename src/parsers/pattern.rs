//! # 测量谱读取
//!
//! ## XY 格式（单谱）
//! ```text
//! # d_spacing  intensity  [error]
//! 1.2000   10.5   0.3
//! 1.2010   11.2   0.3
//! ```
//! 空白分隔，`#` 开头的行为注释；第三列可选，作为误差。
//!
//! ## 2D CSV 格式（多谱）
//! ```text
//! d_spacing,60.0,90.0,120.0
//! 1.2000,10.5,8.1,7.7
//! ```
//! 表头第一列为 d 间距，其余列名为各谱的散射角 2θ（度）。
//!
//! ## 依赖关系
//! - 被 `commands/`、`batch/` 使用
//! - 使用 `csv` 读取 2D 数据

use crate::error::{PawleyError, Result};
use crate::models::{Pattern1D, Pattern2D, Spectrum};

use std::fs;
use std::path::Path;

fn read_file(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(PawleyError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    fs::read_to_string(path).map_err(|e| PawleyError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })
}

fn file_stem(path: &Path) -> &str {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("pattern")
}

fn with_path(e: PawleyError, path: &Path) -> PawleyError {
    match e {
        PawleyError::ParseError { format, reason, .. } => PawleyError::ParseError {
            format,
            path: path.display().to_string(),
            reason,
        },
        other => other,
    }
}

fn parse_error(format: &str, reason: String) -> PawleyError {
    PawleyError::ParseError {
        format: format.to_string(),
        path: String::new(),
        reason,
    }
}

// ─────────────────────────────────────────────────────────────
// XY
// ─────────────────────────────────────────────────────────────

/// 读取 XY 文件，谱名取文件名
pub fn parse_xy_file(path: &Path) -> Result<Pattern1D> {
    let content = read_file(path)?;
    parse_xy_content(&content, file_stem(path)).map_err(|e| with_path(e, path))
}

pub fn parse_xy_content(content: &str, default_name: &str) -> Result<Pattern1D> {
    let mut x = Vec::new();
    let mut y = Vec::new();
    let mut e = Vec::new();
    let mut ncols = None;

    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let values: Vec<f64> = line
            .split_whitespace()
            .map(|tok| tok.parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|err| parse_error("XY", format!("line {}: {}", lineno + 1, err)))?;

        if values.len() < 2 {
            return Err(parse_error(
                "XY",
                format!("line {}: expected at least 2 columns", lineno + 1),
            ));
        }
        let n = values.len().min(3);
        match ncols {
            None => ncols = Some(n),
            Some(c) if c != n => {
                return Err(parse_error(
                    "XY",
                    format!("line {}: expected {} columns, found {}", lineno + 1, c, n),
                ))
            }
            _ => {}
        }

        x.push(values[0]);
        y.push(values[1]);
        if n == 3 {
            e.push(values[2]);
        }
    }

    if x.is_empty() {
        return Err(parse_error("XY", "no data points".to_string()));
    }

    let mut spectrum = Spectrum::new(x, y)?;
    if ncols == Some(3) {
        spectrum = spectrum.with_errors(e)?;
    }
    Ok(Pattern1D::new(default_name, spectrum))
}

// ─────────────────────────────────────────────────────────────
// 2D CSV
// ─────────────────────────────────────────────────────────────

/// 读取 2D CSV 文件
pub fn parse_csv2d_file(path: &Path) -> Result<Pattern2D> {
    let content = read_file(path)?;
    parse_csv2d_content(&content, file_stem(path)).map_err(|e| with_path(e, path))
}

pub fn parse_csv2d_content(content: &str, default_name: &str) -> Result<Pattern2D> {
    let mut reader = csv::ReaderBuilder::new()
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();
    if headers.len() < 2 {
        return Err(parse_error(
            "CSV",
            "header must be d_spacing followed by at least one 2θ column".to_string(),
        ));
    }
    let two_theta: Vec<f64> = headers
        .iter()
        .skip(1)
        .map(|h| {
            h.parse::<f64>()
                .map_err(|_| parse_error("CSV", format!("column header '{}' is not a 2θ value", h)))
        })
        .collect::<Result<_>>()?;

    let mut x = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); two_theta.len()];
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let values: Vec<f64> = record
            .iter()
            .map(|v| v.parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|err| parse_error("CSV", format!("row {}: {}", row + 2, err)))?;
        if values.len() != headers.len() {
            return Err(parse_error(
                "CSV",
                format!("row {}: expected {} values, found {}", row + 2, headers.len(), values.len()),
            ));
        }
        x.push(values[0]);
        for (col, v) in columns.iter_mut().zip(&values[1..]) {
            col.push(*v);
        }
    }

    if x.is_empty() {
        return Err(parse_error("CSV", "no data rows".to_string()));
    }

    let spectra = columns
        .into_iter()
        .map(|y| Spectrum::new(x.clone(), y))
        .collect::<Result<Vec<_>>>()?;
    Pattern2D::new(default_name, spectra, two_theta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_xy_two_columns() {
        let content = "# d I\n1.0 2.0\n\n1.5   3.0\n2.0\t4.0\n";
        let p = parse_xy_content(content, "sample").unwrap();
        assert_eq!(p.name, "sample");
        assert_eq!(p.x(), &[1.0, 1.5, 2.0]);
        assert_eq!(p.y(), &[2.0, 3.0, 4.0]);
        assert!(p.spectrum.e.is_none());
    }

    #[test]
    fn test_parse_xy_with_errors() {
        let p = parse_xy_content("1.0 2.0 0.1\n2.0 3.0 0.2\n", "s").unwrap();
        assert_eq!(p.spectrum.e, Some(vec![0.1, 0.2]));
    }

    #[test]
    fn test_parse_xy_rejects_bad_lines() {
        assert!(parse_xy_content("1.0\n", "s").is_err());
        assert!(parse_xy_content("1.0 abc\n", "s").is_err());
        assert!(parse_xy_content("1.0 2.0\n1.0 2.0 0.1\n", "s").is_err());
        assert!(parse_xy_content("# only comments\n", "s").is_err());
    }

    #[test]
    fn test_parse_xy_file_uses_stem_and_path() {
        let mut file = tempfile::Builder::new().suffix(".xy").tempfile().unwrap();
        writeln!(file, "1.0 5.0").unwrap();
        writeln!(file, "2.0 6.0").unwrap();
        let p = parse_xy_file(file.path()).unwrap();
        let stem = file.path().file_stem().unwrap().to_str().unwrap();
        assert_eq!(p.name, stem);

        let mut bad = NamedTempFile::new().unwrap();
        writeln!(bad, "x y").unwrap();
        match parse_xy_file(bad.path()) {
            Err(PawleyError::ParseError { path, .. }) => {
                assert_eq!(path, bad.path().display().to_string())
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_missing_file() {
        let result = parse_xy_file(Path::new("/nonexistent/pattern.xy"));
        assert!(matches!(result, Err(PawleyError::FileNotFound { .. })));
    }

    #[test]
    fn test_parse_csv2d() {
        let content = "d_spacing,60,90,120\n1.0,1,2,3\n1.1,4,5,6\n";
        let p = parse_csv2d_content(content, "banks").unwrap();
        assert_eq!(p.nspec(), 3);
        assert_eq!(p.two_theta(), &[60.0, 90.0, 120.0]);
        assert_eq!(p.spectrum(1).unwrap().y, vec![2.0, 5.0]);
        assert_eq!(p.spectrum(2).unwrap().x, vec![1.0, 1.1]);
    }

    #[test]
    fn test_parse_csv2d_errors() {
        assert!(parse_csv2d_content("d_spacing\n1.0\n", "s").is_err());
        assert!(parse_csv2d_content("d_spacing,abc\n1.0,2.0\n", "s").is_err());
        assert!(parse_csv2d_content("d_spacing,60\n", "s").is_err());
        // 2θ 超出 (0, 180)
        assert!(parse_csv2d_content("d_spacing,200\n1.0,2.0\n", "s").is_err());
    }
}
