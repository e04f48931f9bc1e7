//! 計算領域とコロケーション点の生成。
//!
//! 乱数は使わず、与えられた領域と格子間隔から常に同じ格子を生成します。

use crate::error::PinnError;
use burn::prelude::Backend;
use burn::tensor::{Tensor, TensorData};

/// 格子間隔が軸の長さを割り切るかを判定する際の相対許容誤差。
const SPACING_TOLERANCE: f64 = 1e-9;
/// 1軸あたりの区間数の上限。
const MAX_AXIS_STEPS: f64 = 1_000.0;

/// 空間・時間の矩形領域 [x_min, x_max] × [t_min, t_max]。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Domain {
    pub x_min: f64,
    pub x_max: f64,
    pub t_min: f64,
    pub t_max: f64,
}

impl Domain {
    pub fn new(x_min: f64, x_max: f64, t_min: f64, t_max: f64) -> Result<Self, PinnError> {
        check_range("x", x_min, x_max)?;
        check_range("t", t_min, t_max)?;
        Ok(Self {
            x_min,
            x_max,
            t_min,
            t_max,
        })
    }

    /// 閉矩形に含まれるかどうか。
    pub fn contains(&self, point: &Point) -> bool {
        (self.x_min..=self.x_max).contains(&point.x) && (self.t_min..=self.t_max).contains(&point.t)
    }
}

fn check_range(axis: &'static str, min: f64, max: f64) -> Result<(), PinnError> {
    if min.is_finite() && max.is_finite() && min < max {
        Ok(())
    } else {
        Err(PinnError::InvalidDomain { axis, min, max })
    }
}

/// コロケーション点 (x, t)。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub t: f64,
}

/// 領域上の等間隔格子。
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    domain: Domain,
    xs: Vec<f64>,
    ts: Vec<f64>,
}

impl Grid {
    /// 間隔 `spacing` の格子を生成します。
    ///
    /// 両端点は正確に含まれます。`spacing` が各軸の長さを割り切らない場合はエラーです。
    pub fn new(domain: Domain, spacing: f64) -> Result<Self, PinnError> {
        if !(spacing.is_finite() && spacing > 0.0) {
            return Err(PinnError::InvalidSpacing(spacing));
        }
        let xs = axis_nodes("x", domain.x_min, domain.x_max, spacing)?;
        let ts = axis_nodes("t", domain.t_min, domain.t_max, spacing)?;
        Ok(Self { domain, xs, ts })
    }

    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    pub fn ts(&self) -> &[f64] {
        &self.ts
    }

    /// 格子上の全点。x を外側、t を内側のループとして並べます。
    pub fn points(&self) -> Vec<Point> {
        self.xs
            .iter()
            .flat_map(|&x| self.ts.iter().map(move |&t| Point { x, t }))
            .collect()
    }

    /// `predicate` を満たす格子点だけを返します。
    pub fn select(&self, predicate: impl Fn(&Domain, &Point) -> bool) -> Vec<Point> {
        self.points()
            .into_iter()
            .filter(|p| predicate(&self.domain, p))
            .collect()
    }
}

fn axis_nodes(axis: &'static str, min: f64, max: f64, spacing: f64) -> Result<Vec<f64>, PinnError> {
    let length = max - min;
    let steps = (length / spacing).round();
    if steps > MAX_AXIS_STEPS {
        return Err(PinnError::InvalidSpacing(spacing));
    }
    if steps < 1.0 || (steps * spacing - length).abs() > SPACING_TOLERANCE * length {
        return Err(PinnError::IncommensurateSpacing {
            axis,
            spacing,
            length,
        });
    }
    let n = steps as usize;
    let mut nodes: Vec<f64> = (0..n)
        .map(|i| min + length * i as f64 / n as f64)
        .collect();
    nodes.push(max);
    Ok(nodes)
}

/// 点列を [n, 2] のテンソル（列は x, t の順）に変換します。
pub fn points_tensor<B: Backend>(points: &[Point], device: &B::Device) -> Tensor<B, 2> {
    let coords = points.iter().flat_map(|p| [p.x, p.t]).collect::<Vec<f64>>();
    Tensor::from_data(TensorData::new(coords, [points.len(), 2]), device)
}
