//! # 物理情報ニューラルネットワーク (PINN) ライブラリ
//!
//! `burn` フレームワークを使用して、物理情報ニューラルネットワーク（PINN）を構築し、
//! 1次元の波動方程式 u_tt = c²·u_xx を解くための主要なコンポーネントを提供します。
//!
//! 学習は学習率 0.01 と 0.001 の2段階で行い、結果はフーリエ級数による解析解と比較します。

use burn::backend::{Autodiff, NdArray};

pub mod analytical;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod inference;
pub mod model;
pub mod pinn;
pub mod training;

pub use error::PinnError;

/// 学習に使用するバックエンド（倍精度、CPU）
pub type TrainingBackend = Autodiff<NdArray<f64>>;
/// 推論に使用するバックエンド
pub type InferenceBackend = NdArray<f64>;
