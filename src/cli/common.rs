//! 各拟合子命令共用的参数组

use crate::config::ConfigOverrides;

use clap::{Args, ValueEnum};
use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────
// 物相
// ─────────────────────────────────────────────────────────────

/// 物相来源：若干 CIF 文件，或一组晶格参数 + 空间群
#[derive(Args, Debug, Clone, Default)]
pub struct PhaseArgs {
    /// CIF file(s) describing the phases (repeatable)
    #[arg(long = "cif", value_name = "FILE")]
    pub cif: Vec<PathBuf>,

    /// Lattice parameters: a | a,b,c | a,b,c,alpha,beta,gamma
    #[arg(long, value_delimiter = ',', num_args = 1..=6, allow_negative_numbers = true)]
    pub lattice: Option<Vec<f64>>,

    /// Hermann-Mauguin space-group symbol for --lattice (e.g. "Fd-3m", "P 63/m m c")
    #[arg(long, requires = "lattice")]
    pub spacegroup: Option<String>,
}

// ─────────────────────────────────────────────────────────────
// 拟合设置
// ─────────────────────────────────────────────────────────────

/// 峰形
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ProfileKind {
    /// Gaussian
    Gaussian,
    /// Pseudo-Voigt
    Pv,
}

impl std::fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProfileKind::Gaussian => write!(f, "gaussian"),
            ProfileKind::Pv => write!(f, "pv"),
        }
    }
}

/// 背底
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum BackgroundArg {
    None,
    Flat,
    Polynomial,
    Chebyshev,
}

impl std::fmt::Display for BackgroundArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackgroundArg::None => write!(f, "none"),
            BackgroundArg::Flat => write!(f, "flat"),
            BackgroundArg::Polynomial => write!(f, "polynomial"),
            BackgroundArg::Chebyshev => write!(f, "chebyshev"),
        }
    }
}

/// 拟合选项；未给出的项取配置文件中的值
#[derive(Args, Debug, Clone, Default)]
pub struct FitOptionArgs {
    /// TOML fit configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Maximum number of residual evaluations
    #[arg(long)]
    pub max_nfev: Option<usize>,

    /// Refine lattice parameters as well as intensities
    #[arg(long)]
    pub refine_lattice: bool,

    /// Lower d-spacing limit for reflection generation (Å)
    #[arg(long)]
    pub d_min: Option<f64>,

    /// Upper d-spacing limit for reflection generation (Å)
    #[arg(long)]
    pub d_max: Option<f64>,

    /// Peak profile
    #[arg(long, value_enum)]
    pub profile: Option<ProfileKind>,

    /// Background function
    #[arg(long, value_enum)]
    pub background: Option<BackgroundArg>,

    /// Background order (polynomial / chebyshev)
    #[arg(long)]
    pub bg_order: Option<usize>,

    /// Skip the initial intensity estimate
    #[arg(long)]
    pub no_estimate: bool,
}

impl FitOptionArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            max_nfev: self.max_nfev,
            refine_lattice: self.refine_lattice.then_some(true),
            d_min: self.d_min,
            d_max: self.d_max,
            profile: self.profile.map(|p| p.to_string()),
            background: self.background.map(|b| b.to_string()),
            bg_order: self.bg_order,
            no_estimate: self.no_estimate,
            ..ConfigOverrides::default()
        }
    }
}

// ─────────────────────────────────────────────────────────────
// 输出
// ─────────────────────────────────────────────────────────────

#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Directory for exported results
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Write observed/calculated/difference curves as CSV
    #[arg(long)]
    pub csv: bool,

    /// Write the calculated pattern as XY
    #[arg(long)]
    pub xy: bool,

    /// Plot the fit (PNG unless --svg)
    #[arg(long)]
    pub plot: bool,

    /// Plot as SVG instead of PNG
    #[arg(long, requires = "plot")]
    pub svg: bool,
}
