//! # fit-batch 子命令实现
//!
//! 对目录中的每个谱文件做独立的 1D 精修（每个文件一份物相副本），
//! 并行执行，最后写出汇总 CSV。

use crate::batch::{BatchRunner, FileCollector, ProcessResult};
use crate::cli::fit::FitBatchArgs;
use crate::commands::{fit_pattern, load_phases};
use crate::config::FitConfig;
use crate::error::{PawleyError, Result};
use crate::parsers;
use crate::pawley::PawleyPattern1D;
use crate::utils::output;

use serde::Serialize;
use std::path::Path;

/// 汇总表中的一行
#[derive(Debug, Clone, Serialize)]
pub struct FitSummary {
    pub file: String,
    pub status: String,
    pub nfev: usize,
    pub cost: f64,
    pub rwp: f64,
    /// 各物相晶格参数，如 `Si:a=5.430940`
    pub lattice: String,
}

impl FitSummary {
    fn from_model(path: &Path, model: &PawleyPattern1D) -> Result<Self> {
        let result = model
            .history()
            .last()
            .ok_or_else(|| PawleyError::Other("model has no fit history".to_string()))?;
        let lattice = model
            .phases()
            .iter()
            .map(|p| {
                let phase = p.read();
                let values = phase
                    .get_param_names()
                    .iter()
                    .zip(phase.get_params())
                    .map(|(n, v)| format!("{}={:.6}", n, v))
                    .collect::<Vec<_>>()
                    .join(" ");
                format!("{}:{}", phase.name(), values)
            })
            .collect::<Vec<_>>()
            .join("; ");

        Ok(FitSummary {
            file: path.display().to_string(),
            status: result.status.to_string(),
            nfev: result.nfev,
            cost: result.cost,
            rwp: model.rwp(&model.get_params())?,
            lattice,
        })
    }
}

fn fit_file(path: &Path, config: &FitConfig, args: &FitBatchArgs) -> Result<FitSummary> {
    let pattern = parsers::parse_pattern_file(path)?;
    let phases = load_phases(&args.phases)?;
    let model = fit_pattern(pattern, phases, config)?;
    FitSummary::from_model(path, &model)
}

pub fn write_summary(rows: &[FitSummary], path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush().map_err(|e| PawleyError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(())
}

pub fn execute(args: FitBatchArgs) -> Result<()> {
    output::print_header("Pawley Refinement (batch)");

    let config = FitConfig::load(args.options.config.as_deref(), &args.options.overrides())?;
    // 提前校验物相参数，避免每个文件重复报同一个错误
    load_phases(&args.phases)?;

    let files = FileCollector::new(args.input.clone())
        .with_pattern(&args.pattern)?
        .recursive(args.recursive)
        .collect();
    if files.is_empty() {
        return Err(PawleyError::NoFilesFound {
            pattern: format!("{}/{}", args.input.display(), args.pattern),
        });
    }

    let runner = BatchRunner::new(args.jobs);
    output::print_info(&format!("Fitting {} file(s) with {} job(s)", files.len(), runner.jobs()));

    let batch = runner.run(files, |path| match fit_file(path, &config, &args) {
        Ok(summary) => ProcessResult::Success(path.clone(), summary),
        Err(e) => ProcessResult::Failed(path.clone(), e.to_string()),
    });

    for (path, err) in &batch.failures {
        output::print_error(&format!("{}: {}", path.display(), err));
    }

    let rows: Vec<FitSummary> = batch.successes.into_iter().map(|(_, s)| s).collect();
    let not_converged = rows.iter().filter(|r| r.status != "converged").count();
    if not_converged > 0 {
        output::print_warning(&format!("{} fit(s) did not converge", not_converged));
    }

    write_summary(&rows, &args.summary)?;
    output::print_done(&format!(
        "Fitted {} file(s), {} failed; summary -> {}",
        rows.len(),
        batch.failures.len(),
        args.summary.display()
    ));
    Ok(())
}
