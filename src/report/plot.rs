//! # 拟合结果绘图
//!
//! 使用 `plotters` 生成 Pawley 拟合图：
//! - 观测值（散点）、计算值（曲线）
//! - 差值曲线平移到观测谱下方
//! - 各衍射位置的竖线标记
//!
//! 支持 PNG 和 SVG 输出。

use crate::error::{PawleyError, Result};
use crate::pawley::Reflection;
use crate::report::FitCurve;

use plotters::prelude::*;
use std::path::Path;

/// 图像参数
#[derive(Debug, Clone)]
pub struct PlotOptions {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub use_svg: bool,
}

impl Default for PlotOptions {
    fn default() -> Self {
        PlotOptions {
            title: "Pawley fit".to_string(),
            width: 1200,
            height: 800,
            use_svg: false,
        }
    }
}

fn plot_err<E: std::fmt::Debug>(e: E) -> PawleyError {
    PawleyError::PlotError(format!("{:?}", e))
}

/// 绘制拟合图
pub fn plot_fit(
    curve: &FitCurve,
    reflections: &[Reflection],
    output_path: &Path,
    options: &PlotOptions,
) -> Result<()> {
    if curve.is_empty() {
        return Err(PawleyError::PlotError("Nothing to plot".to_string()));
    }

    let size = (options.width, options.height);
    if options.use_svg {
        let root = SVGBackend::new(output_path, size).into_drawing_area();
        draw_fit_chart(&root, curve, reflections, &options.title)?;
        root.present().map_err(plot_err)?;
    } else {
        let root = BitMapBackend::new(output_path, size).into_drawing_area();
        draw_fit_chart(&root, curve, reflections, &options.title)?;
        root.present().map_err(plot_err)?;
    }
    Ok(())
}

/// y 轴范围：上方容纳观测与计算值，下方放差值曲线和衍射标记
fn y_layout(curve: &FitCurve) -> (f64, f64, f64) {
    let top = curve
        .observed
        .iter()
        .chain(&curve.calculated)
        .copied()
        .fold(0.0, f64::max);
    let top = if top > 0.0 { top } else { 1.0 };
    let diff_span = curve
        .difference
        .iter()
        .fold(0.0_f64, |acc, d| acc.max(d.abs()));
    let diff_offset = -(diff_span + 0.1 * top);
    let bottom = diff_offset - diff_span - 0.05 * top;
    (bottom, 1.08 * top, diff_offset)
}

fn draw_fit_chart<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    curve: &FitCurve,
    reflections: &[Reflection],
    title: &str,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE).map_err(plot_err)?;

    let (x_min, x_max) = curve
        .x
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
    let (y_min, y_max, diff_offset) = y_layout(curve);

    let mut chart = ChartBuilder::on(root)
        .caption(title, ("sans-serif", 28).into_font())
        .margin(30)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .x_desc("d-spacing (Å)")
        .y_desc("Intensity")
        .x_label_style(("sans-serif", 16))
        .y_label_style(("sans-serif", 16))
        .axis_desc_style(("sans-serif", 18))
        .draw()
        .map_err(plot_err)?;

    let obs_color = RGBColor(30, 30, 30);
    let calc_color = RGBColor(204, 51, 0);
    let diff_color = RGBColor(0, 102, 204);
    let tick_color = RGBColor(0, 153, 76);

    chart
        .draw_series(
            curve
                .x
                .iter()
                .zip(&curve.observed)
                .map(|(x, y)| Circle::new((*x, *y), 2, obs_color.filled())),
        )
        .map_err(plot_err)?
        .label("observed")
        .legend(move |(x, y)| Circle::new((x + 10, y), 3, obs_color.filled()));

    chart
        .draw_series(LineSeries::new(
            curve.x.iter().zip(&curve.calculated).map(|(x, y)| (*x, *y)),
            calc_color.stroke_width(2),
        ))
        .map_err(plot_err)?
        .label("calculated")
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], calc_color));

    chart
        .draw_series(LineSeries::new(
            curve
                .x
                .iter()
                .zip(&curve.difference)
                .map(|(x, d)| (*x, d + diff_offset)),
            diff_color.stroke_width(1),
        ))
        .map_err(plot_err)?
        .label("obs - calc")
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], diff_color));

    // 衍射位置标记放在差值曲线与观测谱之间
    let tick_height = 0.03 * (y_max - y_min);
    let tick_base = 0.5 * diff_offset;
    chart
        .draw_series(
            reflections
                .iter()
                .filter(|r| r.d >= x_min && r.d <= x_max)
                .map(|r| {
                    PathElement::new(
                        vec![(r.d, tick_base - tick_height / 2.0), (r.d, tick_base + tick_height / 2.0)],
                        tick_color.stroke_width(1),
                    )
                }),
        )
        .map_err(plot_err)?;

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(plot_err)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_y_layout_puts_difference_below_zero() {
        let curve = FitCurve {
            name: "c".to_string(),
            x: vec![1.0, 2.0],
            observed: vec![10.0, 4.0],
            calculated: vec![9.0, 4.0],
            difference: vec![1.0, 0.0],
        };
        let (bottom, top, offset) = y_layout(&curve);
        assert!(top > 10.0);
        assert!(offset + 1.0 < 0.0);
        assert!(bottom < offset - 1.0);
    }

    #[test]
    fn test_svg_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fit.svg");
        let x: Vec<f64> = (0..50).map(|i| 1.0 + i as f64 * 0.02).collect();
        let observed: Vec<f64> = x.iter().map(|v| (-(v - 1.5) * (v - 1.5) * 50.0).exp()).collect();
        let curve = FitCurve {
            name: "svg".to_string(),
            calculated: observed.clone(),
            difference: vec![0.0; x.len()],
            x,
            observed,
        };
        let options = PlotOptions {
            use_svg: true,
            ..PlotOptions::default()
        };
        plot_fit(&curve, &[], &path, &options).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("<svg"));
    }
}
