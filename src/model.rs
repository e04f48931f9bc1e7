use crate::error::PinnError;
use burn::module::{Module, Param};
use burn::nn::{Initializer, Linear, LinearConfig};
use burn::prelude::Backend;
use burn::tensor::Tensor;

/// PINNの本体となるニューラルネットワークモデル。
///
/// 座標(x, t)を入力とし、その点における変位uを予測する多層パーセプトロン（MLP）です。
/// 隠れ層の活性化関数はシグモイド、出力層は恒等写像です。
#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    hidden: Vec<Linear<B>>,
    output: Linear<B>,
}

/// ネットワーク出力とその入力に関する偏微分。各テンソルの形状は [n, 1] です。
#[derive(Debug, Clone)]
pub struct Jet<B: Backend> {
    pub u: Tensor<B, 2>,
    pub u_x: Tensor<B, 2>,
    pub u_t: Tensor<B, 2>,
    pub u_xx: Tensor<B, 2>,
    pub u_tt: Tensor<B, 2>,
}

impl<B: Backend> Model<B> {
    /// 層の幅 `widths`（例: `[2, 100, 100, 100, 100, 1]`）からモデルを初期化します。
    ///
    /// 重みは Glorot 一様分布、バイアスはゼロで初期化します。
    pub fn new(widths: &[usize], device: &B::Device) -> Result<Self, PinnError> {
        let valid = widths.len() >= 3
            && widths.first() == Some(&2)
            && widths.last() == Some(&1)
            && widths.iter().all(|&w| w > 0);
        if !valid {
            return Err(PinnError::InvalidWidths(widths.to_vec()));
        }

        let mut layers = widths
            .windows(2)
            .map(|pair| glorot_linear(pair[0], pair[1], device))
            .collect::<Vec<_>>();
        let output = layers.pop().ok_or_else(|| PinnError::InvalidWidths(widths.to_vec()))?;
        Ok(Self {
            hidden: layers,
            output,
        })
    }

    /// モデルの順伝播を実行します。入力は [n, 2]（列は x, t）、出力は [n, 1] です。
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut x = input;
        for linear in &self.hidden {
            x = linear.forward(x);
            x = sigmoid(x);
        }
        self.output.forward(x)
    }

    /// 出力と、x・t に関する1階・2階偏微分を同時に計算します。
    ///
    /// 各層で接ベクトルを前進モードで伝播させるため、結果はすべて通常のテンソル演算の
    /// 組み合わせです。自動微分バックエンド上ではパラメータに関する勾配がそのまま流れます。
    pub fn forward_jet(&self, input: Tensor<B, 2>) -> Jet<B> {
        let [n, _] = input.dims();
        let device = input.device();
        let ones = Tensor::<B, 2>::ones([n, 1], &device);
        let zeros = Tensor::<B, 2>::zeros([n, 1], &device);

        let mut a = input;
        let mut a_x = Tensor::cat(vec![ones.clone(), zeros.clone()], 1);
        let mut a_t = Tensor::cat(vec![zeros.clone(), ones], 1);
        let mut a_xx = Tensor::<B, 2>::zeros([n, 2], &device);
        let mut a_tt = Tensor::<B, 2>::zeros([n, 2], &device);

        for linear in &self.hidden {
            let weight = linear.weight.val();
            let z = linear.forward(a);
            let z_x = a_x.matmul(weight.clone());
            let z_t = a_t.matmul(weight.clone());
            let z_xx = a_xx.matmul(weight.clone());
            let z_tt = a_tt.matmul(weight);

            // σ' = σ(1 - σ), σ'' = σ'(1 - 2σ)
            let s = sigmoid(z);
            let ds = s.clone() * s.clone().neg().add_scalar(1.0);
            let d2s = ds.clone() * s.clone().mul_scalar(-2.0).add_scalar(1.0);

            a_xx = d2s.clone() * z_x.clone().powf_scalar(2.0) + ds.clone() * z_xx;
            a_tt = d2s * z_t.clone().powf_scalar(2.0) + ds.clone() * z_tt;
            a_x = ds.clone() * z_x;
            a_t = ds * z_t;
            a = s;
        }

        let weight = self.output.weight.val();
        Jet {
            u: self.output.forward(a),
            u_x: a_x.matmul(weight.clone()),
            u_t: a_t.matmul(weight.clone()),
            u_xx: a_xx.matmul(weight.clone()),
            u_tt: a_tt.matmul(weight),
        }
    }

    /// 全パラメータの値を層順（重み、バイアス）に平坦化して返します。
    pub fn parameter_values(&self) -> Result<Vec<f64>, PinnError> {
        let mut values = Vec::new();
        for linear in self.hidden.iter().chain(std::iter::once(&self.output)) {
            values.extend(tensor_values(linear.weight.val())?);
            if let Some(bias) = &linear.bias {
                values.extend(tensor_values(bias.val())?);
            }
        }
        Ok(values)
    }
}

/// シグモイド関数 σ(z) = (1 + tanh(z/2)) / 2。
///
/// `burn::nn::Sigmoid` は内部で f32 に変換するため、倍精度を保つよう tanh で書きます。
pub fn sigmoid<B: Backend, const D: usize>(z: Tensor<B, D>) -> Tensor<B, D> {
    z.mul_scalar(0.5).tanh().add_scalar(1.0).mul_scalar(0.5)
}

fn glorot_linear<B: Backend>(d_input: usize, d_output: usize, device: &B::Device) -> Linear<B> {
    let mut linear = LinearConfig::new(d_input, d_output)
        .with_initializer(Initializer::XavierUniform { gain: 1.0 })
        .init(device);
    linear.bias = Some(Param::from_tensor(Tensor::zeros([d_output], device)));
    linear
}

/// テンソルの値を f64 のベクタとして取り出します。
pub fn tensor_values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f64>, PinnError> {
    tensor
        .into_data()
        .convert::<f64>()
        .to_vec::<f64>()
        .map_err(|e| PinnError::Data(format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type B = NdArray<f64>;

    fn coords(values: &[f64]) -> Tensor<B, 2> {
        let device = Default::default();
        Tensor::from_data(TensorData::new(values.to_vec(), [values.len() / 2, 2]), &device)
    }

    #[test]
    fn test_sigmoid_keeps_double_precision() {
        let device = Default::default();
        let z = Tensor::<B, 1>::from_data(TensorData::new(vec![0.1, 0.1 + 1e-9, -40.0, 40.0], [4]), &device);
        let s = tensor_values(sigmoid(z)).unwrap();
        let exact = |z: f64| 1.0 / (1.0 + (-z).exp());

        assert!((s[0] - exact(0.1)).abs() < 1e-15, "σ(0.1) = {}", s[0]);
        // 1e-9 の差が f32 で丸められずに残る
        let slope = (s[1] - s[0]) / 1e-9;
        assert!((slope - exact(0.1) * (1.0 - exact(0.1))).abs() < 1e-5, "slope = {slope}");
        assert!((0.0..1e-15).contains(&s[2]));
        assert!((s[3] - 1.0).abs() < 1e-15);
    }

    #[test]
    fn test_rejects_invalid_widths() {
        let device = Default::default();
        for widths in [vec![2, 1], vec![3, 10, 1], vec![2, 10, 2], vec![2, 0, 1]] {
            assert!(matches!(
                Model::<B>::new(&widths, &device),
                Err(PinnError::InvalidWidths(_))
            ));
        }
    }

    #[test]
    fn test_widths_and_zero_biases() {
        let device = Default::default();
        let widths = [2, 100, 100, 100, 100, 1];
        let model = Model::<B>::new(&widths, &device).unwrap();
        assert_eq!(model.hidden.len(), 4);
        let layer_dims: Vec<[usize; 2]> = model
            .hidden
            .iter()
            .chain(std::iter::once(&model.output))
            .map(|linear| linear.weight.val().dims())
            .collect();
        assert_eq!(layer_dims, [[2, 100], [100, 100], [100, 100], [100, 100], [100, 1]]);

        let n_params: usize = widths.windows(2).map(|w| w[0] * w[1] + w[1]).sum();
        assert_eq!(model.parameter_values().unwrap().len(), n_params);

        for linear in model.hidden.iter().chain(std::iter::once(&model.output)) {
            let bias = tensor_values(linear.bias.as_ref().unwrap().val()).unwrap();
            assert!(bias.iter().all(|&b| b == 0.0));
            // Glorot 一様分布の範囲内
            let [fan_in, fan_out] = linear.weight.val().dims();
            let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
            let weights = tensor_values(linear.weight.val()).unwrap();
            assert!(weights.iter().all(|w| w.abs() <= limit * (1.0 + 1e-6)));
        }
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model = Model::<B>::new(&[2, 16, 16, 1], &device).unwrap();
        let output = model.forward(coords(&[0.0, 0.0, 0.5, 0.5, 1.0, 1.0]));
        assert_eq!(output.dims(), [3, 1]);
    }

    #[test]
    fn test_jet_matches_finite_differences() {
        let device = Default::default();
        let model = Model::<B>::new(&[2, 20, 20, 1], &device).unwrap();
        let (x, t, h) = (0.3, 0.7, 1e-4);

        let jet = model.forward_jet(coords(&[x, t]));
        let u = |x: f64, t: f64| tensor_values(model.forward(coords(&[x, t]))).unwrap()[0];
        let value = |tensor: Tensor<B, 2>| tensor_values(tensor).unwrap()[0];

        let u0 = u(x, t);
        let fd_x = (u(x + h, t) - u(x - h, t)) / (2.0 * h);
        let fd_t = (u(x, t + h) - u(x, t - h)) / (2.0 * h);
        let fd_xx = (u(x + h, t) - 2.0 * u0 + u(x - h, t)) / (h * h);
        let fd_tt = (u(x, t + h) - 2.0 * u0 + u(x, t - h)) / (h * h);

        assert!((value(jet.u) - u0).abs() < 1e-12);
        assert!((value(jet.u_x) - fd_x).abs() < 1e-6);
        assert!((value(jet.u_t) - fd_t).abs() < 1e-6);
        assert!((value(jet.u_xx) - fd_xx).abs() < 1e-4);
        assert!((value(jet.u_tt) - fd_tt).abs() < 1e-4);
    }
}
