//! 弦の振動の解析解（フーリエ正弦級数）。
//!
//! 初期変位 x(1 - x)、初速度 0、両端固定の条件に対する解は
//! 奇数次の項だけを含む級数 Σ 8/(nπ)³ · cos(nπct) · sin(nπx) になります。

use std::f64::consts::PI;

use crate::config::{DEFAULT_HARMONICS, WAVE_SPEED};

/// 解析解の値と偏微分。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AnalyticalJet {
    pub u: f64,
    pub u_x: f64,
    pub u_t: f64,
    pub u_xx: f64,
    pub u_tt: f64,
}

/// 打ち切りフーリエ級数による解析解。
#[derive(Debug, Clone, Copy)]
pub struct AnalyticalSolution {
    pub wave_speed: f64,
    /// 級数に含める最大次数。奇数次 n ≤ harmonics の項が使われます。
    pub harmonics: usize,
}

impl Default for AnalyticalSolution {
    fn default() -> Self {
        Self {
            wave_speed: WAVE_SPEED,
            harmonics: DEFAULT_HARMONICS,
        }
    }
}

impl AnalyticalSolution {
    pub fn new(wave_speed: f64, harmonics: usize) -> Self {
        Self {
            wave_speed,
            harmonics,
        }
    }

    pub fn value(&self, x: f64, t: f64) -> f64 {
        self.jet(x, t).u
    }

    /// 値と1階・2階偏微分を項ごとに解析的に求めます。
    pub fn jet(&self, x: f64, t: f64) -> AnalyticalJet {
        let mut jet = AnalyticalJet::default();
        for n in (1..=self.harmonics).step_by(2) {
            let k = n as f64 * PI;
            let omega = k * self.wave_speed;
            let amplitude = 8.0 / k.powi(3);
            let (sin_x, cos_x) = (k * x).sin_cos();
            let (sin_t, cos_t) = (omega * t).sin_cos();

            jet.u += amplitude * cos_t * sin_x;
            jet.u_x += amplitude * k * cos_t * cos_x;
            jet.u_t -= amplitude * omega * sin_t * sin_x;
            jet.u_xx -= amplitude * k * k * cos_t * sin_x;
            jet.u_tt -= amplitude * omega * omega * cos_t * sin_x;
        }
        jet
    }
}

/// 波速 1 の解析解を `nmax` 次まで評価します。
pub fn true_u(x: f64, t: f64, nmax: usize) -> f64 {
    AnalyticalSolution::new(1.0, nmax).value(x, t)
}
