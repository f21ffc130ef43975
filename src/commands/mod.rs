//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑，以及共用的物相加载、拟合流程和结果导出。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `config/`, `parsers/`, `pawley/`, `report/`, `utils/`
//! - 子模块: hkls, fit, fit2d, fit_batch

pub mod fit;
pub mod fit2d;
pub mod fit_batch;
pub mod hkls;

use crate::cli::common::{OutputArgs, PhaseArgs};
use crate::cli::Commands;
use crate::config::FitConfig;
use crate::error::{PawleyError, Result};
use crate::models::Pattern1D;
use crate::pawley::{PawleyPattern1D, Reflection};
use crate::phase::{Phase, PhaseRef};
use crate::report::{export, plot, FitCurve};
use crate::utils::{output, progress};

use std::fs;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Hkls(args) => hkls::execute(args),
        Commands::Fit(args) => fit::execute(args),
        Commands::Fit2d(args) => fit2d::execute(args),
        Commands::FitBatch(args) => fit_batch::execute(args),
    }
}

/// 按命令行参数加载物相（CIF 在前，晶格参数在后）
pub(crate) fn load_phases(args: &PhaseArgs) -> Result<Vec<Phase>> {
    let mut phases = args
        .cif
        .iter()
        .map(|path| Phase::from_cif(path))
        .collect::<Result<Vec<_>>>()?;

    if let Some(lattice) = &args.lattice {
        let symbol = args.spacegroup.as_deref().ok_or_else(|| {
            PawleyError::InvalidArgument("--lattice requires --spacegroup".to_string())
        })?;
        let phase = match lattice.as_slice() {
            [a] => Phase::from_alatt([*a; 3], symbol)?,
            [a, b, c] => Phase::from_alatt([*a, *b, *c], symbol)?,
            [a, b, c, al, be, ga] => {
                let name = symbol.replace(' ', "");
                Phase::from_lattice(&name, [*a, *b, *c], [*al, *be, *ga], symbol)?
            }
            other => {
                return Err(PawleyError::InvalidArgument(format!(
                    "--lattice expects 1, 3 or 6 values, got {}",
                    other.len()
                )))
            }
        };
        phases.push(phase);
    }

    if phases.is_empty() {
        return Err(PawleyError::InvalidArgument(
            "No phases given; use --cif or --lattice/--spacegroup".to_string(),
        ));
    }
    Ok(phases)
}

/// 在 d 窗口内生成各物相的 HKL 并包装为共享引用
pub(crate) fn prepare_phases(
    phases: Vec<Phase>,
    d_limits: (f64, f64),
) -> Result<Vec<PhaseRef>> {
    phases
        .into_iter()
        .map(|mut phase| {
            phase.set_hkls_from_dspac_limits(d_limits.0, d_limits.1)?;
            tracing::info!(
                "Phase '{}': {} reflections in d = [{:.4}, {:.4}]",
                phase.name(),
                phase.nhkls(),
                d_limits.0,
                d_limits.1
            );
            Ok(PhaseRef::new(phase))
        })
        .collect()
}

/// 单谱拟合流程：生成 HKL → 建模 → 估计初值 → 拟合
pub(crate) fn fit_pattern(
    pattern: Pattern1D,
    phases: Vec<Phase>,
    config: &FitConfig,
) -> Result<PawleyPattern1D> {
    let d_limits = config.d_limits(pattern.spectrum.x_range());
    let phases = prepare_phases(phases, d_limits)?;
    let background = config.build_background(pattern.x())?;

    let mut model = PawleyPattern1D::new(pattern, phases, config.peak_profile()?, background);
    model.set_lattice_free(config.refine_lattice);
    if config.estimate {
        model.estimate_initial_params()?;
    }
    model.fit(config.max_nfev)?;
    Ok(model)
}

/// 带 spinner 的单谱拟合
pub(crate) fn fit_pattern_interactive(
    pattern: Pattern1D,
    phases: Vec<Phase>,
    config: &FitConfig,
) -> Result<PawleyPattern1D> {
    let spinner = progress::create_spinner(&format!("Fitting '{}'", pattern.name));
    let result = fit_pattern(pattern, phases, config);
    spinner.finish_and_clear();
    result
}

/// 打印晶格与强度表
pub(crate) fn print_tables(phases: &[PhaseRef], reflections: &[Reflection]) {
    output::print_separator();
    println!("{}", crate::report::lattice_table(phases));
    println!("{}", crate::report::reflection_table(reflections));
}

/// 按输出选项导出曲线、强度表和图
pub(crate) fn export_results(
    curves: &[FitCurve],
    reflections: &[Reflection],
    args: &OutputArgs,
) -> Result<()> {
    if !(args.csv || args.xy || args.plot) {
        return Ok(());
    }
    fs::create_dir_all(&args.output_dir).map_err(|e| PawleyError::FileWriteError {
        path: args.output_dir.display().to_string(),
        source: e,
    })?;

    if let Some(first) = curves.first() {
        let path = args.output_dir.join(format!("{}_reflections.csv", first.name));
        export::reflections_to_csv(reflections, &path)?;
        output::print_success(&format!("Reflections -> {}", path.display()));
    }

    for curve in curves {
        if args.csv {
            let path = args.output_dir.join(format!("{}_fit.csv", curve.name));
            export::curve_to_csv(curve, &path)?;
            output::print_success(&format!("Curves -> {}", path.display()));
        }
        if args.xy {
            let path = args.output_dir.join(format!("{}_calc.xy", curve.name));
            export::curve_to_xy(curve, &path)?;
            output::print_success(&format!("Calculated pattern -> {}", path.display()));
        }
        if args.plot {
            let ext = if args.svg { "svg" } else { "png" };
            let path = args.output_dir.join(format!("{}_fit.{}", curve.name, ext));
            let options = plot::PlotOptions {
                title: format!("Pawley fit: {}", curve.name),
                use_svg: args.svg,
                ..plot::PlotOptions::default()
            };
            plot::plot_fit(curve, reflections, &path, &options)?;
            output::print_success(&format!("Plot -> {}", path.display()));
        }
    }
    Ok(())
}
