//! ライブラリ全体で使用するエラー型。

use thiserror::Error;

/// 設定の検証と学習中に発生するエラー。
#[derive(Debug, Error)]
pub enum PinnError {
    /// 領域の下限が上限以上、または有限でない。
    #[error("invalid {axis} range: [{min}, {max}]")]
    InvalidDomain {
        axis: &'static str,
        min: f64,
        max: f64,
    },

    #[error("grid spacing must be positive and finite; got {0}")]
    InvalidSpacing(f64),

    /// 格子間隔が軸の長さを割り切らない（端点を正確に含められない）。
    #[error("grid spacing {spacing} does not divide the {axis} range of length {length}")]
    IncommensurateSpacing {
        axis: &'static str,
        spacing: f64,
        length: f64,
    },

    #[error("layer widths must start at 2, end at 1 and have a hidden layer; got {0:?}")]
    InvalidWidths(Vec<usize>),

    #[error("wave speed must be positive and finite; got {0}")]
    InvalidWaveSpeed(f64),

    #[error("phase '{name}' needs a positive learning rate and iteration count")]
    InvalidPhase { name: String },

    /// 評価格子が小さすぎる（フレーム 1 以上、x 方向 2 点以上が必要）。
    #[error("evaluation needs at least 1 frame and 2 samples per frame; got {frames} frames of {resolution}")]
    InvalidSampling { frames: usize, resolution: usize },

    #[error("condition '{0}' selects no collocation points")]
    EmptyCondition(&'static str),

    /// 損失が NaN / Inf になった。フェーズはここで打ち切られる。
    #[error("loss became non-finite ({loss}) at iteration {iteration} of phase '{phase}'")]
    NonFiniteLoss {
        phase: String,
        iteration: usize,
        loss: f64,
    },

    #[error("tensor data conversion failed: {0}")]
    Data(String),
}
