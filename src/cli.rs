use crate::config::{
    ANIMATION_FILENAME, DEFAULT_HARMONICS, GRID_SPACING, MODEL_FILENAME, PHASE1_ITERATIONS,
    PHASE1_LEARNING_RATE, PHASE2_ITERATIONS, PHASE2_LEARNING_RATE, WAVE_SPEED,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// clapでコマンドラインの構造を定義します。
#[derive(Parser, Debug)]
#[command(author, version, about = "A Physics-Informed Neural Network (PINN) for the 1-D wave equation with Burn", long_about = None)]
pub struct Cli {
    /// 省略時は既定の設定で `train` を実行します
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// 実行するサブコマンドを定義します（train または infer）。
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 2段階の学習を行い、モデルをファイルに保存します
    Train(TrainArgs),
    /// 保存されたモデルを解析解と比較し、アニメーションを出力します
    Infer(InferArgs),
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// コロケーション格子の間隔
    #[arg(long, default_value_t = GRID_SPACING)]
    pub spacing: f64,

    /// 波速 c
    #[arg(long, default_value_t = WAVE_SPEED)]
    pub wave_speed: f64,

    #[arg(long, default_value_t = PHASE1_LEARNING_RATE)]
    pub phase1_lr: f64,

    #[arg(long, default_value_t = PHASE1_ITERATIONS)]
    pub phase1_iterations: usize,

    #[arg(long, default_value_t = PHASE2_LEARNING_RATE)]
    pub phase2_lr: f64,

    #[arg(long, default_value_t = PHASE2_ITERATIONS)]
    pub phase2_iterations: usize,

    /// 乱数シード（省略時はランダム）
    #[arg(long)]
    pub seed: Option<u64>,

    /// 損失をログに出す間隔（反復数）
    #[arg(long, default_value_t = 1)]
    pub log_every: usize,

    /// モデルの保存先
    #[arg(long, default_value = MODEL_FILENAME)]
    pub model: PathBuf,

    /// 学習後に解析解との比較アニメーションを出力します
    #[arg(long)]
    pub animate: bool,

    #[arg(long, default_value = ANIMATION_FILENAME)]
    pub gif: PathBuf,

    /// アニメーションのフレーム数
    #[arg(long, default_value_t = 50)]
    pub frames: usize,

    /// 1フレームあたりの x 方向のサンプル数
    #[arg(long, default_value_t = 101)]
    pub resolution: usize,
}

impl Default for TrainArgs {
    fn default() -> Self {
        Self {
            spacing: GRID_SPACING,
            wave_speed: WAVE_SPEED,
            phase1_lr: PHASE1_LEARNING_RATE,
            phase1_iterations: PHASE1_ITERATIONS,
            phase2_lr: PHASE2_LEARNING_RATE,
            phase2_iterations: PHASE2_ITERATIONS,
            seed: None,
            log_every: 1,
            model: PathBuf::from(MODEL_FILENAME),
            animate: false,
            gif: PathBuf::from(ANIMATION_FILENAME),
            frames: 50,
            resolution: 101,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct InferArgs {
    /// 読み込むモデル
    #[arg(long, default_value = MODEL_FILENAME)]
    pub model: PathBuf,

    #[arg(long, default_value = ANIMATION_FILENAME)]
    pub gif: PathBuf,

    /// 波速 c（学習時と同じ値を指定してください）
    #[arg(long, default_value_t = WAVE_SPEED)]
    pub wave_speed: f64,

    /// 解析解の級数に含める最大次数
    #[arg(long, default_value_t = DEFAULT_HARMONICS)]
    pub harmonics: usize,

    #[arg(long, default_value_t = 50)]
    pub frames: usize,

    #[arg(long, default_value_t = 101)]
    pub resolution: usize,
}
