use crate::cli::TrainArgs;
use crate::config::{ExperimentConfig, LOSS_GRAPH_FILENAME};
use crate::domain::Grid;
use crate::inference;
use crate::model::Model;
use crate::pinn::{Discretization, string_conditions};
use crate::{InferenceBackend, TrainingBackend};
use anyhow::{Context, anyhow};
use burn::module::{AutodiffModule, Module};
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::ElementConversion;
use burn::tensor::backend::{AutodiffBackend, Backend};
use plotters::prelude::*;
use std::time::Instant;
use tracing::info;

/// 学習フェーズ1つ分の設定。
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseConfig {
    pub name: String,
    pub learning_rate: f64,
    pub iterations: usize,
}

impl PhaseConfig {
    pub fn new(name: impl Into<String>, learning_rate: f64, iterations: usize) -> Self {
        Self {
            name: name.into(),
            learning_rate,
            iterations,
        }
    }
}

/// 学習の進捗を受け取るオブザーバ。
///
/// コールバックは学習状態を変更できず、失敗も返せません。
pub trait TrainingObserver<B: Backend> {
    fn on_phase_start(&mut self, _phase: &PhaseConfig, _model: &Model<B>) {}

    /// オプティマイザの更新前に評価した損失を受け取ります。`iteration` は1から始まります。
    fn on_iteration(&mut self, phase: &PhaseConfig, iteration: usize, loss: f64);

    fn on_phase_end(&mut self, _phase: &PhaseConfig, _model: &Model<B>) {}
}

/// `every` 反復ごとに損失をログへ出力します。
#[derive(Debug, Clone)]
pub struct LossLogger {
    every: usize,
}

impl LossLogger {
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
        }
    }
}

impl<B: Backend> TrainingObserver<B> for LossLogger {
    fn on_phase_start(&mut self, phase: &PhaseConfig, _model: &Model<B>) {
        info!(
            "フェーズ '{}' を開始します (学習率: {}, 反復回数: {})",
            phase.name, phase.learning_rate, phase.iterations
        );
    }

    fn on_iteration(&mut self, _phase: &PhaseConfig, iteration: usize, loss: f64) {
        if iteration % self.every == 0 {
            info!("Epoch {}: Current loss is {}", iteration, loss);
        }
    }
}

/// 1フェーズの学習結果。
#[derive(Debug)]
pub struct PhaseOutcome<B: Backend> {
    pub model: Model<B>,
    /// 最後の更新を適用した後のパラメータでの損失。
    pub final_loss: f64,
    /// 各反復の損失（更新前）。
    pub history: Vec<f64>,
}

/// 1フェーズ分の学習を実行します。
///
/// Adamのモーメントはこのフェーズ内でのみ保持され、返るのはパラメータだけです。
/// 損失が有限でなくなった時点でエラーを返して中断します。
/// 最終損失は全反復の後に返すパラメータで評価し直した値です。
pub fn run_phase<B: AutodiffBackend>(
    mut model: Model<B>,
    discretization: &Discretization<B>,
    phase: &PhaseConfig,
    observer: &mut impl TrainingObserver<B>,
) -> Result<PhaseOutcome<B>, crate::PinnError> {
    if !(phase.learning_rate.is_finite() && phase.learning_rate > 0.0) || phase.iterations == 0 {
        return Err(crate::PinnError::InvalidPhase {
            name: phase.name.clone(),
        });
    }

    let mut optim = AdamConfig::new().with_epsilon(1e-8).init();
    let mut history = Vec::with_capacity(phase.iterations);
    observer.on_phase_start(phase, &model);

    for iteration in 1..=phase.iterations {
        let total_loss = discretization.loss(&model).total;
        let loss_value = total_loss.clone().into_scalar().elem::<f64>();
        if !loss_value.is_finite() {
            return Err(crate::PinnError::NonFiniteLoss {
                phase: phase.name.clone(),
                iteration,
                loss: loss_value,
            });
        }
        history.push(loss_value);
        observer.on_iteration(phase, iteration, loss_value);

        let grads = total_loss.backward();
        let grads = GradientsParams::from_grads(grads, &model);
        model = optim.step(phase.learning_rate, model, grads);
    }

    let final_loss = discretization.loss(&model).total.into_scalar().elem::<f64>();
    if !final_loss.is_finite() {
        return Err(crate::PinnError::NonFiniteLoss {
            phase: phase.name.clone(),
            iteration: phase.iterations + 1,
            loss: final_loss,
        });
    }
    observer.on_phase_end(phase, &model);
    Ok(PhaseOutcome {
        model,
        final_loss,
        history,
    })
}

/// フェーズを順に実行します。各フェーズは前のフェーズの最終パラメータから始まります。
pub fn run_phases<B: AutodiffBackend>(
    model: Model<B>,
    discretization: &Discretization<B>,
    phases: &[PhaseConfig],
    observer: &mut impl TrainingObserver<B>,
) -> Result<(Model<B>, Vec<PhaseOutcome<B>>), crate::PinnError> {
    let mut model = model;
    let mut outcomes: Vec<PhaseOutcome<B>> = Vec::with_capacity(phases.len());
    for phase in phases {
        let outcome = run_phase(model, discretization, phase, observer)?;
        model = outcome.model.clone();
        outcomes.push(outcome);
    }
    Ok((model, outcomes))
}

/// `train`サブコマンドを実行します。
pub fn run(args: &TrainArgs) -> anyhow::Result<()> {
    let config = ExperimentConfig::from_train_args(args)?;
    let device = Default::default();
    config.seed_backend::<TrainingBackend>();

    let grid = Grid::new(config.domain, config.spacing)?;
    let discretization =
        Discretization::<TrainingBackend>::new(&grid, config.wave_speed, &string_conditions(), &device)?;
    let model = Model::<TrainingBackend>::new(&config.widths, &device)?;
    info!(
        "学習を開始します (波動方程式) - バックエンド: NdArray<f64> (CPU), 格子点数: {}, 層: {:?}",
        grid.points().len(),
        config.widths
    );

    let training_start = Instant::now();
    let mut logger = LossLogger::new(config.log_every);
    let (model, outcomes) = run_phases(model, &discretization, &config.phases, &mut logger)?;
    info!("学習が完了しました。学習時間: {:.2?}", training_start.elapsed());
    for (name, value) in discretization.loss(&model).values() {
        info!("  {name}: {value:.6e}");
    }

    let histories: Vec<(&str, &[f64])> = outcomes
        .iter()
        .zip(&config.phases)
        .map(|(outcome, phase)| (phase.name.as_str(), outcome.history.as_slice()))
        .collect();
    plot_loss_history(&histories)
        .map_err(|e| anyhow!("損失グラフの描画に失敗しました: {e}"))?;
    info!("損失グラフを '{}' に保存しました。", LOSS_GRAPH_FILENAME);

    model
        .clone()
        .save_file(&args.model, &NamedMpkFileRecorder::<FullPrecisionSettings>::new())
        .with_context(|| format!("モデルの保存に失敗しました: {}", args.model.display()))?;
    info!("モデルを '{}' に保存しました。", args.model.display());

    if args.animate {
        let model: Model<InferenceBackend> = model.valid();
        inference::animate(&model, &config, &args.gif)?;
    }

    Ok(())
}

/// 学習過程の損失をグラフとしてPNGファイルに出力します。フェーズごとに色を変えます。
fn plot_loss_history(histories: &[(&str, &[f64])]) -> Result<(), Box<dyn std::error::Error>> {
    let root = BitMapBackend::new(LOSS_GRAPH_FILENAME, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let log_losses: Vec<f64> = histories
        .iter()
        .flat_map(|(_, hist)| hist.iter().map(|v| v.max(f64::MIN_POSITIVE).log10()))
        .collect();
    let n_total = log_losses.len().max(1);
    let max_log_loss = log_losses.iter().copied().fold(f64::MIN, f64::max).max(0.0) + 0.5;
    let min_log_loss = log_losses.iter().copied().fold(f64::MAX, f64::min).min(-1.0) - 0.5;
    let mut chart = ChartBuilder::on(&root)
        .caption("Loss History", ("sans-serif", 40).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0..n_total, min_log_loss..max_log_loss)?;
    chart
        .configure_mesh()
        .y_desc("Loss (log10 scale)")
        .x_desc("Iterations")
        .draw()?;

    let colors = [RED, BLUE, GREEN, MAGENTA];
    let mut offset = 0;
    for (i, (name, hist)) in histories.iter().enumerate() {
        let color = colors[i % colors.len()];
        let start = offset;
        chart
            .draw_series(LineSeries::new(
                hist.iter()
                    .enumerate()
                    .map(|(j, &val)| (start + j, val.max(f64::MIN_POSITIVE).log10())),
                &color,
            ))?
            .label(*name)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        offset += hist.len();
    }
    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}
