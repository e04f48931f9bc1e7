//! 波動方程式の物理損失。
//!
//! PDE残差と境界・初期条件の誤差をそれぞれ二乗平均し、重みを付けずに合計します。

use crate::domain::{Domain, Grid, Point, points_tensor};
use crate::error::PinnError;
use crate::model::{Jet, Model};
use burn::nn::loss::{MseLoss, Reduction};
use burn::prelude::Backend;
use burn::tensor::{ElementConversion, Tensor, TensorData};

/// 波動方程式の残差 u_tt - c²·u_xx を計算します。
pub fn wave_residual<B: Backend>(u_tt: Tensor<B, 2>, u_xx: Tensor<B, 2>, wave_speed: f64) -> Tensor<B, 2> {
    u_tt - u_xx.mul_scalar(wave_speed * wave_speed)
}

/// 条件がネットワークのどの量を拘束するか。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionKind {
    /// u そのもの
    Value,
    /// ∂u/∂t
    TimeDerivative,
}

/// 条件を課す場所。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// x = x_min と x = x_max の両端
    SpatialBoundary,
    /// t = t_min
    Initial,
}

impl Location {
    pub fn contains(&self, domain: &Domain, point: &Point) -> bool {
        match self {
            Location::SpatialBoundary => point.x == domain.x_min || point.x == domain.x_max,
            Location::Initial => point.t == domain.t_min,
        }
    }
}

/// 境界条件・初期条件の1つ。`target(x, t)` が拘束値です。
#[derive(Debug, Clone, Copy)]
pub struct Condition {
    pub name: &'static str,
    pub kind: ConditionKind,
    pub location: Location,
    pub target: fn(f64, f64) -> f64,
}

impl Condition {
    fn select<B: Backend>(&self, jet: &Jet<B>) -> Tensor<B, 2> {
        match self.kind {
            ConditionKind::Value => jet.u.clone(),
            ConditionKind::TimeDerivative => jet.u_t.clone(),
        }
    }
}

/// 両端固定・初期変位 x(1 - x)・初速度 0 の条件。
pub fn string_conditions() -> Vec<Condition> {
    vec![
        Condition {
            name: "boundary",
            kind: ConditionKind::Value,
            location: Location::SpatialBoundary,
            target: |_, _| 0.0,
        },
        Condition {
            name: "initial_value",
            kind: ConditionKind::Value,
            location: Location::Initial,
            target: |x, _| x * (1.0 - x),
        },
        Condition {
            name: "initial_velocity",
            kind: ConditionKind::TimeDerivative,
            location: Location::Initial,
            target: |_, _| 0.0,
        },
    ]
}

/// 条件と、それを評価する点・目標値のテンソル。
#[derive(Debug, Clone)]
struct ConditionSet<B: Backend> {
    condition: Condition,
    coords: Tensor<B, 2>,
    targets: Tensor<B, 2>,
}

/// 格子上に離散化された物理損失。
///
/// 点集合は構築時に一度だけテンソル化され、学習中は同じものを使い続けます。
#[derive(Debug, Clone)]
pub struct Discretization<B: Backend> {
    wave_speed: f64,
    interior: Tensor<B, 2>,
    conditions: Vec<ConditionSet<B>>,
}

/// 項ごとの損失。`terms` は残差項の後に条件の順で並びます。
#[derive(Debug, Clone)]
pub struct LossBreakdown<B: Backend> {
    pub terms: Vec<(&'static str, Tensor<B, 1>)>,
    pub total: Tensor<B, 1>,
}

impl<B: Backend> LossBreakdown<B> {
    /// 各項の値を取り出します。
    pub fn values(&self) -> Vec<(&'static str, f64)> {
        self.terms
            .iter()
            .map(|(name, term)| (*name, term.clone().into_scalar().elem::<f64>()))
            .collect()
    }
}

impl<B: Backend> Discretization<B> {
    pub fn new(
        grid: &Grid,
        wave_speed: f64,
        conditions: &[Condition],
        device: &B::Device,
    ) -> Result<Self, PinnError> {
        if !(wave_speed.is_finite() && wave_speed > 0.0) {
            return Err(PinnError::InvalidWaveSpeed(wave_speed));
        }
        let interior = points_tensor::<B>(&grid.points(), device);
        let conditions = conditions
            .iter()
            .map(|condition| {
                let points = grid.select(|domain, point| condition.location.contains(domain, point));
                if points.is_empty() {
                    return Err(PinnError::EmptyCondition(condition.name));
                }
                let targets = points
                    .iter()
                    .map(|p| (condition.target)(p.x, p.t))
                    .collect::<Vec<f64>>();
                Ok(ConditionSet {
                    condition: *condition,
                    coords: points_tensor::<B>(&points, device),
                    targets: Tensor::from_data(TensorData::new(targets, [points.len(), 1]), device),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            wave_speed,
            interior,
            conditions,
        })
    }

    /// 残差項の二乗平均。
    pub fn residual_loss(&self, model: &Model<B>) -> Tensor<B, 1> {
        let jet = model.forward_jet(self.interior.clone());
        let residual = wave_residual(jet.u_tt, jet.u_xx, self.wave_speed);
        let zeros = Tensor::zeros_like(&residual);
        MseLoss::new().forward(residual, zeros, Reduction::Mean)
    }

    /// 全項を計算します。
    pub fn loss(&self, model: &Model<B>) -> LossBreakdown<B> {
        let residual = self.residual_loss(model);
        let mut total = residual.clone();
        let mut terms = vec![("residual", residual)];
        for set in &self.conditions {
            let jet = model.forward_jet(set.coords.clone());
            let predicted = set.condition.select(&jet);
            let term = MseLoss::new().forward(predicted, set.targets.clone(), Reduction::Mean);
            total = total + term.clone();
            terms.push((set.condition.name, term));
        }
        LossBreakdown { terms, total }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tensor_values;
    use burn::backend::NdArray;

    type B = NdArray<f64>;

    fn grid(spacing: f64) -> Grid {
        Grid::new(Domain::new(0.0, 1.0, 0.0, 1.0).unwrap(), spacing).unwrap()
    }

    fn forward_values(model: &Model<B>, points: &[Point]) -> Vec<f64> {
        tensor_values(model.forward(points_tensor::<B>(points, &Default::default()))).unwrap()
    }

    fn mean_square(values: impl Iterator<Item = f64>) -> f64 {
        let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v * v, c + 1));
        sum / count as f64
    }

    #[test]
    fn test_locations() {
        let domain = Domain::new(0.0, 1.0, 0.0, 1.0).unwrap();
        let edge = Point { x: 1.0, t: 0.4 };
        let initial = Point { x: 0.4, t: 0.0 };
        assert!(Location::SpatialBoundary.contains(&domain, &edge));
        assert!(!Location::SpatialBoundary.contains(&domain, &initial));
        assert!(Location::Initial.contains(&domain, &initial));
        assert!(!Location::Initial.contains(&domain, &edge));
    }

    #[test]
    fn test_untrained_loss_is_positive() {
        let device = Default::default();
        let model = Model::<B>::new(&[2, 100, 100, 100, 100, 1], &device).unwrap();
        let disc = Discretization::<B>::new(&grid(0.1), 1.0, &string_conditions(), &device).unwrap();
        let breakdown = disc.loss(&model);

        let values = breakdown.values();
        let names: Vec<&str> = values.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, ["residual", "boundary", "initial_value", "initial_velocity"]);
        assert!(values.iter().all(|(_, v)| v.is_finite() && *v >= 0.0));

        let total = breakdown.total.into_scalar().elem::<f64>();
        let sum: f64 = values.iter().map(|(_, v)| v).sum();
        assert!(total > 0.0);
        assert!((total - sum).abs() < 1e-12 * total.max(1.0));
    }

    #[test]
    fn test_initial_value_term_matches_manual_mean() {
        let device = Default::default();
        let model = Model::<B>::new(&[2, 8, 1], &device).unwrap();
        let grid = grid(0.25);
        let disc = Discretization::<B>::new(&grid, 1.0, &string_conditions(), &device).unwrap();
        let values = disc.loss(&model).values();

        let points = grid.select(|d, p| Location::Initial.contains(d, p));
        let predicted = model.forward(points_tensor::<B>(&points, &device));
        let predicted = predicted.into_data().to_vec::<f64>().unwrap();
        let expected = points
            .iter()
            .zip(predicted)
            .map(|(p, u)| (u - p.x * (1.0 - p.x)).powi(2))
            .sum::<f64>()
            / points.len() as f64;
        assert!((values[2].1 - expected).abs() < 1e-12);
    }

    #[test]
    fn test_boundary_term_matches_manual_mean() {
        let device = Default::default();
        let model = Model::<B>::new(&[2, 8, 1], &device).unwrap();
        let grid = grid(0.25);
        let disc = Discretization::<B>::new(&grid, 1.0, &string_conditions(), &device).unwrap();
        let values = disc.loss(&model).values();

        // x = 0 と x = 1 の両端を合わせて一つの平均
        let points: Vec<Point> = [0.0, 1.0]
            .iter()
            .flat_map(|&x| grid.ts().iter().map(move |&t| Point { x, t }))
            .collect();
        assert_eq!(points.len(), 10);
        let expected = mean_square(forward_values(&model, &points).into_iter());
        assert_eq!(values[1].0, "boundary");
        assert!((values[1].1 - expected).abs() < 1e-12 * expected.max(1.0));
    }

    #[test]
    fn test_initial_velocity_term_matches_finite_difference() {
        let device = Default::default();
        let model = Model::<B>::new(&[2, 8, 1], &device).unwrap();
        let grid = grid(0.25);
        let disc = Discretization::<B>::new(&grid, 1.0, &string_conditions(), &device).unwrap();
        let values = disc.loss(&model).values();

        // t = 0 での中心差分 (u(x, h) - u(x, -h)) / 2h
        let h = 1e-5;
        let shifted = |dt: f64| -> Vec<f64> {
            let points: Vec<Point> = grid.xs().iter().map(|&x| Point { x, t: dt }).collect();
            forward_values(&model, &points)
        };
        let (plus, minus) = (shifted(h), shifted(-h));
        let expected = mean_square(plus.iter().zip(&minus).map(|(p, m)| (p - m) / (2.0 * h)));
        assert_eq!(values[3].0, "initial_velocity");
        assert!(expected > 0.0);
        assert!(
            (values[3].1 - expected).abs() < 1e-6 * expected,
            "{} vs {}",
            values[3].1,
            expected
        );
    }

    #[test]
    fn test_residual_term_matches_manual_mean() {
        let device = Default::default();
        let model = Model::<B>::new(&[2, 8, 1], &device).unwrap();
        let grid = grid(0.25);
        let wave_speed = 2.0;
        let disc = Discretization::<B>::new(&grid, wave_speed, &string_conditions(), &device).unwrap();
        let residual = disc.residual_loss(&model).into_scalar().elem::<f64>();

        let points = grid.points();
        assert_eq!(points.len(), 25);
        let jet = model.forward_jet(points_tensor::<B>(&points, &device));
        let u_tt = tensor_values(jet.u_tt).unwrap();
        let u_xx = tensor_values(jet.u_xx).unwrap();
        let expected = mean_square(u_tt.iter().zip(&u_xx).map(|(tt, xx)| tt - 4.0 * xx));
        assert!(expected > 0.0);
        assert!((residual - expected).abs() < 1e-12 * expected.max(1.0));
        assert!((disc.loss(&model).values()[0].1 - residual).abs() < 1e-12 * residual.max(1.0));
    }

    #[test]
    fn test_invalid_wave_speed() {
        let device = Default::default();
        assert!(matches!(
            Discretization::<B>::new(&grid(0.1), 0.0, &string_conditions(), &device),
            Err(PinnError::InvalidWaveSpeed(_))
        ));
    }
}
