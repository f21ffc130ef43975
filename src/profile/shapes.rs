//! 面积归一化的峰形函数

use std::f64::consts::{LN_2, PI};

/// FWHM = 2·sqrt(2·ln2)·sigma
pub fn fwhm_from_sigma(sigma: f64) -> f64 {
    2.0 * (2.0 * LN_2).sqrt() * sigma
}

pub fn sigma_from_fwhm(fwhm: f64) -> f64 {
    fwhm / (2.0 * (2.0 * LN_2).sqrt())
}

pub fn gaussian(x: f64, centre: f64, area: f64, sigma: f64) -> f64 {
    if sigma <= 0.0 {
        return 0.0;
    }
    let z = (x - centre) / sigma;
    area / (sigma * (2.0 * PI).sqrt()) * (-0.5 * z * z).exp()
}

pub fn lorentzian(x: f64, centre: f64, area: f64, fwhm: f64) -> f64 {
    if fwhm <= 0.0 {
        return 0.0;
    }
    let gamma = 0.5 * fwhm;
    let dx = x - centre;
    area / PI * gamma / (dx * dx + gamma * gamma)
}

/// (1-η)·G + η·L，两者共享 FWHM
pub fn pseudo_voigt(x: f64, centre: f64, area: f64, fwhm: f64, eta: f64) -> f64 {
    let g = gaussian(x, centre, area, sigma_from_fwhm(fwhm));
    if eta <= 0.0 {
        return g;
    }
    (1.0 - eta) * g + eta * lorentzian(x, centre, area, fwhm)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn integrate(f: impl Fn(f64) -> f64, lo: f64, hi: f64, n: usize) -> f64 {
        let step = (hi - lo) / n as f64;
        (0..=n)
            .map(|i| {
                let w = if i == 0 || i == n { 0.5 } else { 1.0 };
                w * f(lo + i as f64 * step)
            })
            .sum::<f64>()
            * step
    }

    #[test]
    fn test_gaussian_area() {
        let area = integrate(|x| gaussian(x, 2.0, 3.5, 0.01), 1.8, 2.2, 20_000);
        assert!((area - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_pseudo_voigt_mixes() {
        let fwhm = 0.02;
        let peak_g = pseudo_voigt(1.0, 1.0, 1.0, fwhm, 0.0);
        let peak_l = pseudo_voigt(1.0, 1.0, 1.0, fwhm, 1.0);
        assert!((peak_g - gaussian(1.0, 1.0, 1.0, sigma_from_fwhm(fwhm))).abs() < 1e-12);
        assert!((peak_l - lorentzian(1.0, 1.0, 1.0, fwhm)).abs() < 1e-12);

        let half = pseudo_voigt(1.0, 1.0, 1.0, fwhm, 0.5);
        assert!((half - 0.5 * (peak_g + peak_l)).abs() < 1e-9);
    }

    #[test]
    fn test_fwhm_round_trip() {
        let sigma = 0.00158;
        assert!((sigma_from_fwhm(fwhm_from_sigma(sigma)) - sigma).abs() < 1e-15);
        // 半高处的值为峰值的一半
        let fwhm = fwhm_from_sigma(sigma);
        let peak = gaussian(0.0, 0.0, 1.0, sigma);
        assert!((gaussian(fwhm / 2.0, 0.0, 1.0, sigma) / peak - 0.5).abs() < 1e-12);
    }
}
