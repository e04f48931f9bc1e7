//! # 物理情報ニューラルネットワーク (PINN) サンプルプログラム
//!
//! `burn` フレームワークを使用して、1次元の波動方程式を PINN で解くサンプルです。
//!
//! ## 使い方
//!
//! ### 学習（引数なしでも既定の設定で学習します）
//! ```bash
//! cargo run --release -- train --animate
//! ```
//!
//! ### 推論
//! ```bash
//! cargo run --release -- infer
//! ```
//!
//! ログの詳細度は `RUST_LOG` で変更できます。

use clap::Parser;
use tracing_subscriber::EnvFilter;
use wave_pinn::cli::{Cli, Commands, TrainArgs};
use wave_pinn::{inference, training};

/// プログラムのエントリーポイント。
///
/// コマンドライン引数を解析し、`train`または`infer`の処理に振り分けます。
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Train(args)) => training::run(&args),
        Some(Commands::Infer(args)) => inference::run(&args),
        None => training::run(&TrainArgs::default()),
    }
}
