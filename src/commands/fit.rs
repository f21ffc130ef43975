//! # fit 子命令实现
//!
//! 单谱 Pawley 精修：读取谱和物相 → 拟合 → 打印晶格与强度表 → 按需导出。

use crate::cli::fit::FitArgs;
use crate::commands::{export_results, fit_pattern_interactive, load_phases, print_tables};
use crate::config::FitConfig;
use crate::error::Result;
use crate::parsers;
use crate::report::FitCurve;
use crate::utils::output;

pub fn execute(args: FitArgs) -> Result<()> {
    output::print_header("Pawley Refinement (1D)");

    let config = FitConfig::load(args.options.config.as_deref(), &args.options.overrides())?;
    let pattern = parsers::parse_pattern_file(&args.input)?;
    let phases = load_phases(&args.phases)?;

    output::print_kv("Pattern", &format!("{} ({} points)", pattern.name, pattern.len()));
    output::print_kv("Profile", &config.profile);
    output::print_kv("Refine lattice", &config.refine_lattice.to_string());

    let model = fit_pattern_interactive(pattern, phases, &config)?;

    let last = model.history().last().cloned();
    if let Some(result) = &last {
        output::print_diagnostics(&result.diagnostics);
        let params = model.get_params();
        let msg = format!("{}, Rwp = {:.4}", result, model.rwp(&params)?);
        if result.success() {
            output::print_success(&msg);
        } else {
            output::print_warning(&msg);
        }
    }

    let reflections = model.reflections()?;
    print_tables(model.phases(), &reflections);

    let curve = FitCurve::from_pawley1d(&model)?;
    export_results(&[curve], &reflections, &args.output)?;

    output::print_done("1D refinement finished");
    Ok(())
}
