//! # 结果导出
//!
//! ## 支持格式
//! - CSV: 拟合曲线（d, observed, calculated, difference）或衍射强度表
//! - XY: 计算谱（d, calculated），可被 `parse_xy_file` 读回
//!
//! ## 依赖关系
//! - 使用 `csv` 库写入 CSV 文件

use crate::error::{PawleyError, Result};
use crate::pawley::Reflection;
use crate::report::FitCurve;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

fn write_error(path: &Path) -> impl Fn(std::io::Error) -> PawleyError + '_ {
    move |e| PawleyError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    }
}

/// 导出拟合曲线为 CSV
pub fn curve_to_csv(curve: &FitCurve, output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;
    wtr.write_record(["d_spacing", "observed", "calculated", "difference"])?;

    for i in 0..curve.len() {
        wtr.write_record(&[
            format!("{:.6}", curve.x[i]),
            format!("{:.6e}", curve.observed[i]),
            format!("{:.6e}", curve.calculated[i]),
            format!("{:.6e}", curve.difference[i]),
        ])?;
    }

    wtr.flush().map_err(write_error(output_path))?;
    Ok(())
}

/// 导出衍射强度为 CSV，按 d 从大到小
pub fn reflections_to_csv(reflections: &[Reflection], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;
    wtr.write_record(["phase", "h", "k", "l", "d_spacing", "intensity"])?;

    let mut sorted = reflections.to_vec();
    sorted.sort_by(|a, b| b.d.total_cmp(&a.d));

    for r in &sorted {
        wtr.write_record(&[
            r.phase_name.clone(),
            r.hkl[0].to_string(),
            r.hkl[1].to_string(),
            r.hkl[2].to_string(),
            format!("{:.6}", r.d),
            format!("{:.6e}", r.intensity),
        ])?;
    }

    wtr.flush().map_err(write_error(output_path))?;
    Ok(())
}

/// 导出计算谱为 XY
pub fn curve_to_xy(curve: &FitCurve, output_path: &Path) -> Result<()> {
    let file = File::create(output_path).map_err(write_error(output_path))?;
    let mut out = BufWriter::new(file);
    let err = write_error(output_path);

    writeln!(out, "# Pawley fit: {}", curve.name).map_err(&err)?;
    writeln!(out, "# Columns: d-spacing (Angstrom), calculated intensity").map_err(&err)?;
    for (x, y) in curve.x.iter().zip(&curve.calculated) {
        writeln!(out, "{:.6}\t{:.6e}", x, y).map_err(&err)?;
    }
    out.flush().map_err(&err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::pattern::parse_xy_file;

    fn curve() -> FitCurve {
        FitCurve {
            name: "demo".to_string(),
            x: vec![1.0, 1.5, 2.0],
            observed: vec![1.0, 2.0, 1.0],
            calculated: vec![0.5, 2.5, 1.0],
            difference: vec![0.5, -0.5, 0.0],
        }
    }

    #[test]
    fn test_curve_to_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fit.csv");
        curve_to_csv(&curve(), &path).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(&headers[3], "difference");
        let rows: Vec<_> = rdr.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1][3].parse::<f64>().unwrap(), -0.5);
    }

    #[test]
    fn test_reflections_sorted_by_d() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hkl.csv");
        let refl = |hkl, d| Reflection {
            phase: 0,
            phase_name: "Si".to_string(),
            hkl,
            d,
            intensity: 1.0,
        };
        reflections_to_csv(&[refl([2, 2, 0], 1.92), refl([1, 1, 1], 3.13)], &path).unwrap();

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let first = rdr.records().next().unwrap().unwrap();
        assert_eq!(&first[1], "1");
    }

    #[test]
    fn test_xy_can_be_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calc.xy");
        curve_to_xy(&curve(), &path).unwrap();
        let p = parse_xy_file(&path).unwrap();
        assert_eq!(p.x(), &[1.0, 1.5, 2.0]);
        assert!((p.y()[1] - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_unwritable_path() {
        let result = curve_to_xy(&curve(), Path::new("/nonexistent/dir/out.xy"));
        assert!(matches!(result, Err(PawleyError::FileWriteError { .. })));
    }
}
