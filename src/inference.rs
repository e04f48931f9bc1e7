use crate::InferenceBackend;
use crate::analytical::AnalyticalSolution;
use crate::cli::InferArgs;
use crate::config::{ExperimentConfig, check_sampling};
use crate::domain::{Domain, Point, points_tensor};
use crate::error::PinnError;
use crate::model::{Model, tensor_values};
use anyhow::{Context, anyhow, bail};
use burn::module::Module;
use burn::prelude::Backend;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use plotters::prelude::*;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// 1フレームの表示時間（ミリ秒）
const FRAME_DELAY_MS: u32 = 100;

/// 学習済みモデルと解析解を時空間格子上で比較した結果。
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub xs: Vec<f64>,
    pub ts: Vec<f64>,
    /// `predicted[i][j]` は時刻 `ts[i]`、位置 `xs[j]` での予測値
    pub predicted: Vec<Vec<f64>>,
    pub analytical: Vec<Vec<f64>>,
}

impl Evaluation {
    pub fn max_abs_error(&self) -> f64 {
        self.errors().fold(0.0, f64::max)
    }

    pub fn rms_error(&self) -> f64 {
        let (sum, count) = self.errors().fold((0.0, 0usize), |(s, c), e| (s + e * e, c + 1));
        if count == 0 { 0.0 } else { (sum / count as f64).sqrt() }
    }

    fn errors(&self) -> impl Iterator<Item = f64> + '_ {
        self.predicted
            .iter()
            .flatten()
            .zip(self.analytical.iter().flatten())
            .map(|(p, a)| (p - a).abs())
    }
}

fn linspace(min: f64, max: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![min],
        _ => (0..n)
            .map(|i| min + (max - min) * i as f64 / (n - 1) as f64)
            .collect(),
    }
}

/// `frames` 個の時刻それぞれで `resolution` 個の x についてモデルと解析解を評価します。
///
/// `frames` が 0、または `resolution` が 2 未満の場合はエラーです。
pub fn evaluate<B: Backend>(
    model: &Model<B>,
    solution: &AnalyticalSolution,
    domain: &Domain,
    frames: usize,
    resolution: usize,
    device: &B::Device,
) -> Result<Evaluation, PinnError> {
    check_sampling(frames, resolution)?;
    let xs = linspace(domain.x_min, domain.x_max, resolution);
    let ts = linspace(domain.t_min, domain.t_max, frames);
    let points = ts
        .iter()
        .flat_map(|&t| xs.iter().map(move |&x| Point { x, t }))
        .collect::<Vec<Point>>();

    let flat = tensor_values(model.forward(points_tensor::<B>(&points, device)))?;
    let predicted = flat.chunks(xs.len()).map(<[f64]>::to_vec).collect();
    let analytical = ts
        .iter()
        .map(|&t| xs.iter().map(|&x| solution.value(x, t)).collect())
        .collect();
    Ok(Evaluation {
        xs,
        ts,
        predicted,
        analytical,
    })
}

/// 各時刻の予測と解析解を重ねたフレームをGIFアニメーションとして書き出します。
pub fn render_animation(evaluation: &Evaluation, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let root = BitMapBackend::gif(path, (800, 600), FRAME_DELAY_MS)?.into_drawing_area();
    let x_min = evaluation.xs.first().copied().unwrap_or(0.0);
    let x_max = evaluation.xs.last().copied().unwrap_or(1.0);
    let y_bound = evaluation
        .predicted
        .iter()
        .chain(&evaluation.analytical)
        .flatten()
        .fold(0.3_f64, |acc, v| acc.max(v.abs() * 1.1));

    for (i, &t) in evaluation.ts.iter().enumerate() {
        root.fill(&WHITE)?;
        let mut chart = ChartBuilder::on(&root)
            .caption(format!("t = {:.3}", t), ("sans-serif", 40).into_font())
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(x_min..x_max, -y_bound..y_bound)?;
        chart.configure_mesh().x_desc("x").y_desc("u(x, t)").draw()?;
        chart
            .draw_series(LineSeries::new(
                evaluation.xs.iter().copied().zip(evaluation.predicted[i].iter().copied()),
                &RED,
            ))?
            .label("PINN")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));
        chart
            .draw_series(LineSeries::new(
                evaluation.xs.iter().copied().zip(evaluation.analytical[i].iter().copied()),
                &BLUE,
            ))?
            .label("Analytical")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));
        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
        root.present()?;
    }
    Ok(())
}

/// 評価して誤差をログに出し、アニメーションを書き出します。
pub fn animate(
    model: &Model<InferenceBackend>,
    config: &ExperimentConfig,
    path: &Path,
) -> anyhow::Result<Evaluation> {
    let device = Default::default();
    let solution = AnalyticalSolution::new(config.wave_speed, config.harmonics);
    let evaluation = evaluate(
        model,
        &solution,
        &config.domain,
        config.frames,
        config.resolution,
        &device,
    )?;
    info!(
        "解析解との誤差: 最大 {:.3e}, RMS {:.3e} ({}x{} 点)",
        evaluation.max_abs_error(),
        evaluation.rms_error(),
        evaluation.ts.len(),
        evaluation.xs.len()
    );
    render_animation(&evaluation, path)
        .map_err(|e| anyhow!("アニメーションの描画に失敗しました: {e}"))?;
    info!("アニメーションを '{}' に保存しました。", path.display());
    Ok(evaluation)
}

/// `infer`サブコマンドを実行します。
pub fn run(args: &InferArgs) -> anyhow::Result<()> {
    let device = Default::default();
    let config = ExperimentConfig {
        wave_speed: args.wave_speed,
        harmonics: args.harmonics,
        frames: args.frames,
        resolution: args.resolution,
        ..ExperimentConfig::default()
    };
    config.validate()?;

    if !args.model.exists() {
        bail!(
            "モデルファイル '{}' が見つかりません。最初に 'train' コマンドでモデルを学習・保存してください。",
            args.model.display()
        );
    }

    info!("推論を実行します - バックエンド: NdArray<f64> (CPU)");
    let inference_start = Instant::now();

    info!("保存済みモデルを '{}' からロード中...", args.model.display());
    let model = Model::<InferenceBackend>::new(&config.widths, &device)?
        .load_file(
            &args.model,
            &NamedMpkFileRecorder::<FullPrecisionSettings>::new(),
            &device,
        )
        .with_context(|| format!("モデルの読み込みに失敗しました: {}", args.model.display()))?;

    animate(&model, &config, &args.gif)?;
    info!("推論時間: {:.2?}", inference_start.elapsed());

    Ok(())
}
