//! # fit2d 子命令实现
//!
//! 多散射角精修。可先对聚焦后的单谱做 1D 精修，再把强度与峰形参数迁移到
//! 2D 模型作为初值（两者共享同一组物相，1D 精修的晶格会直接带入 2D）。

use crate::cli::fit::Fit2dArgs;
use crate::commands::{export_results, load_phases, prepare_phases, print_tables};
use crate::config::FitConfig;
use crate::error::Result;
use crate::parsers::pattern::parse_csv2d_file;
use crate::pawley::{PawleyPattern1D, PawleyPattern2D};
use crate::report::FitCurve;
use crate::utils::{output, progress};

pub fn execute(args: Fit2dArgs) -> Result<()> {
    output::print_header("Pawley Refinement (2D)");

    let mut overrides = args.options.overrides();
    overrides.global_scale = args.per_spectrum.then_some(false);
    overrides.lambda_max = args.lambda_max;
    let config = FitConfig::load(args.options.config.as_deref(), &overrides)?;

    let pattern = parse_csv2d_file(&args.input)?;
    output::print_kv(
        "Pattern",
        &format!("{} ({} spectra, {} points)", pattern.name, pattern.nspec(), pattern.npoints()),
    );
    output::print_kv("Global scale", &config.global_scale.to_string());
    if let Some(l) = config.lambda_max {
        output::print_kv("lambda_max", &format!("{:.4} Å", l));
    }

    let d_limits = config.d_limits(pattern.x_range());
    let phases = prepare_phases(load_phases(&args.phases)?, d_limits)?;
    let profile = config.peak_profile()?;
    let all_x: Vec<f64> = pattern.spectra().iter().flat_map(|s| s.x.iter().copied()).collect();
    let background = config.build_background(&all_x)?;

    let mut model = PawleyPattern2D::new(
        pattern.clone(),
        phases.clone(),
        profile,
        config.global_scale,
        background,
        config.lambda_max,
    );
    model.set_lattice_free(config.refine_lattice);

    if args.seed_1d {
        let focused = pattern.focus()?;
        let bg_1d = config.build_background(focused.x())?;
        let mut seed = PawleyPattern1D::new(focused, phases, profile, bg_1d);
        seed.set_lattice_free(config.refine_lattice);
        if config.estimate {
            seed.estimate_initial_params()?;
        }
        let spinner = progress::create_spinner("Fitting focused pattern");
        let seeded = seed.fit(config.max_nfev);
        spinner.finish_and_clear();
        output::print_info(&format!("Seed fit: {}", seeded?));

        let diagnostics = model.set_params_from_pawley1d(&seed);
        output::print_diagnostics(&diagnostics);
    } else if config.estimate {
        model.estimate_initial_params()?;
    }

    let spinner = progress::create_spinner("Fitting 2D pattern");
    let fitted = model.fit(config.max_nfev);
    spinner.finish_and_clear();
    let result = fitted?;

    output::print_diagnostics(&result.diagnostics);
    let msg = format!(
        "{}, scale = {:.6e}, Rwp = {:.4}",
        result,
        model.scale(),
        model.rwp(&model.get_params())?
    );
    if result.success() {
        output::print_success(&msg);
    } else {
        output::print_warning(&msg);
    }

    let reflections = model.reflections()?;
    print_tables(model.phases(), &reflections);

    let curves = FitCurve::from_pawley2d(&model)?;
    export_results(&curves, &reflections, &args.output)?;

    output::print_done("2D refinement finished");
    Ok(())
}
