//! # hkls 子命令实现
//!
//! 列出各物相在 d 窗口内允许的衍射（已去除系统消光与对称等价）。

use crate::cli::hkls::HklsArgs;
use crate::commands::{load_phases, prepare_phases};
use crate::error::Result;
use crate::pawley::Reflection;
use crate::report::{export, reflection_table};
use crate::utils::output;

pub fn execute(args: HklsArgs) -> Result<()> {
    output::print_header("Allowed Reflections");

    let phases = prepare_phases(load_phases(&args.phases)?, (args.d_min, args.d_max))?;

    let mut reflections = Vec::new();
    for (p, phase) in phases.iter().enumerate() {
        let phase = phase.read();
        output::print_kv(
            phase.name(),
            &format!(
                "{} ({}), {} reflections",
                phase.spacegroup().hm_symbol(),
                phase.crystal_system(),
                phase.nhkls()
            ),
        );
        for (hkl, d) in phase.hkls().iter().zip(phase.dspacings()) {
            reflections.push(Reflection {
                phase: p,
                phase_name: phase.name().to_string(),
                hkl: *hkl,
                d,
                intensity: phase.spacegroup().multiplicity(*hkl) as f64,
            });
        }
    }

    println!("{}", reflection_table(&reflections));
    output::print_info("Intensity column shows the reflection multiplicity");

    if let Some(path) = &args.csv {
        export::reflections_to_csv(&reflections, path)?;
        output::print_success(&format!("Reflections -> {}", path.display()));
    }
    Ok(())
}
