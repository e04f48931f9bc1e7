//! 実験の既定値と、コマンドライン引数から組み立てる実験設定。

use crate::cli::TrainArgs;
use crate::domain::Domain;
use crate::error::PinnError;
use crate::training::PhaseConfig;
use burn::tensor::backend::Backend;
use tracing::info;

// --- 計算領域 ---
pub const X_MIN: f64 = 0.0;
pub const X_MAX: f64 = 1.0;
pub const T_MIN: f64 = 0.0;
pub const T_MAX: f64 = 1.0;
/// コロケーション格子の間隔
pub const GRID_SPACING: f64 = 0.1;

// --- 物理定数 ---
/// 波速 c
pub const WAVE_SPEED: f64 = 1.0;
/// 解析解の級数に含める最大次数
pub const DEFAULT_HARMONICS: usize = 20;

// --- ネットワーク ---
pub const LAYER_WIDTHS: [usize; 6] = [2, 100, 100, 100, 100, 1];

// --- 学習スケジュール ---
pub const PHASE1_LEARNING_RATE: f64 = 0.01;
pub const PHASE1_ITERATIONS: usize = 50_000;
pub const PHASE2_LEARNING_RATE: f64 = 0.001;
pub const PHASE2_ITERATIONS: usize = 50_000;

// --- 出力ファイル ---
/// モデルを保存するファイル名
pub const MODEL_FILENAME: &str = "wave_pinn_model.mpk";
pub const LOSS_GRAPH_FILENAME: &str = "loss_graph.png";
pub const ANIMATION_FILENAME: &str = "wave_comparison.gif";

/// 粗い学習 (0.01) の後に細かい学習 (0.001) を行う既定のスケジュール。
pub fn standard_phases() -> Vec<PhaseConfig> {
    vec![
        PhaseConfig::new("phase1", PHASE1_LEARNING_RATE, PHASE1_ITERATIONS),
        PhaseConfig::new("phase2", PHASE2_LEARNING_RATE, PHASE2_ITERATIONS),
    ]
}

/// 評価格子の最小サイズを確認します。
pub fn check_sampling(frames: usize, resolution: usize) -> Result<(), PinnError> {
    if frames >= 1 && resolution >= 2 {
        Ok(())
    } else {
        Err(PinnError::InvalidSampling { frames, resolution })
    }
}

/// 検証済みの実験設定。
#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    pub domain: Domain,
    pub spacing: f64,
    pub wave_speed: f64,
    pub widths: Vec<usize>,
    pub phases: Vec<PhaseConfig>,
    /// 乱数シード。`None` の場合は実行時に生成します。
    pub seed: Option<u64>,
    pub log_every: usize,
    pub harmonics: usize,
    /// アニメーションのフレーム数（時間方向のサンプル数）
    pub frames: usize,
    /// 1フレームあたりの x 方向のサンプル数
    pub resolution: usize,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            domain: Domain {
                x_min: X_MIN,
                x_max: X_MAX,
                t_min: T_MIN,
                t_max: T_MAX,
            },
            spacing: GRID_SPACING,
            wave_speed: WAVE_SPEED,
            widths: LAYER_WIDTHS.to_vec(),
            phases: standard_phases(),
            seed: None,
            log_every: 1,
            harmonics: DEFAULT_HARMONICS,
            frames: 50,
            resolution: 101,
        }
    }
}

impl ExperimentConfig {
    /// `train` の引数から設定を組み立てて検証します。
    pub fn from_train_args(args: &TrainArgs) -> Result<Self, PinnError> {
        let config = Self {
            spacing: args.spacing,
            wave_speed: args.wave_speed,
            phases: vec![
                PhaseConfig::new("phase1", args.phase1_lr, args.phase1_iterations),
                PhaseConfig::new("phase2", args.phase2_lr, args.phase2_iterations),
            ],
            seed: args.seed,
            log_every: args.log_every,
            frames: args.frames,
            resolution: args.resolution,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// 学習を始める前に検出できる設定エラーをすべて確認します。
    pub fn validate(&self) -> Result<(), PinnError> {
        Domain::new(
            self.domain.x_min,
            self.domain.x_max,
            self.domain.t_min,
            self.domain.t_max,
        )?;
        if !(self.spacing.is_finite() && self.spacing > 0.0) {
            return Err(PinnError::InvalidSpacing(self.spacing));
        }
        if !(self.wave_speed.is_finite() && self.wave_speed > 0.0) {
            return Err(PinnError::InvalidWaveSpeed(self.wave_speed));
        }
        let widths_ok = self.widths.len() >= 3
            && self.widths.first() == Some(&2)
            && self.widths.last() == Some(&1)
            && self.widths.iter().all(|&w| w > 0);
        if !widths_ok {
            return Err(PinnError::InvalidWidths(self.widths.clone()));
        }
        for phase in &self.phases {
            if !(phase.learning_rate.is_finite() && phase.learning_rate > 0.0) || phase.iterations == 0 {
                return Err(PinnError::InvalidPhase {
                    name: phase.name.clone(),
                });
            }
        }
        check_sampling(self.frames, self.resolution)
    }

    /// バックエンドの乱数シードを設定し、使用したシードを返します。
    pub fn seed_backend<B: Backend>(&self) -> u64 {
        let seed = self.seed.unwrap_or_else(rand::random::<u64>);
        B::seed(seed);
        info!("乱数シード: {}", seed);
        seed
    }
}
