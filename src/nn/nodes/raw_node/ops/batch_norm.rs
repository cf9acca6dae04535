/*
 * @Description  : 批归一化节点（按最后一维即通道归一化）
 *
 * 父节点：[x, gamma, beta]，gamma/beta形状为[C]。
 * 训练与推理一律使用当前批次的统计量（有偏方差），不维护滑动均值。
 */

use crate::nn::GraphError;
use crate::nn::nodes::NodeHandle;
use crate::nn::nodes::raw_node::TraitNode;
use crate::tensor::Tensor;

pub(in crate::nn) const BATCH_NORM_EPSILON: f32 = 1e-5;

pub(in crate::nn) struct BatchNorm {
    shape: Vec<usize>,
    channels: usize,
    epsilon: f32,
}

impl BatchNorm {
    pub(in crate::nn) fn new(parents: &[&NodeHandle], epsilon: f32) -> Result<Self, GraphError> {
        if parents.len() != 3 {
            return Err(GraphError::InvalidOperation(
                "BatchNorm节点需要3个父节点：[x, gamma, beta]".to_string(),
            ));
        }
        let shape = parents[0].value_expected_shape();
        let channels = *shape.last().ok_or_else(|| {
            GraphError::InvalidOperation("BatchNorm的输入不能是0维".to_string())
        })?;
        for (i, name) in [(1, "gamma"), (2, "beta")] {
            let got = parents[i].value_expected_shape();
            if got != [channels].as_slice() {
                return Err(GraphError::ShapeMismatch {
                    expected: vec![channels],
                    got: got.to_vec(),
                    message: format!("BatchNorm的{name}须与输入通道数一致"),
                });
            }
        }
        Ok(Self {
            shape: shape.to_vec(),
            channels,
            epsilon,
        })
    }

    /// 各通道的均值与1/sqrt(var+eps)
    fn statistics(&self, x: &[f32]) -> (Vec<f32>, Vec<f32>) {
        let c = self.channels;
        let n = (x.len() / c) as f64;
        let mut sum = vec![0.0f64; c];
        for row in x.chunks(c) {
            for (s, &v) in sum.iter_mut().zip(row) {
                *s += f64::from(v);
            }
        }
        let mean: Vec<f64> = sum.iter().map(|s| s / n).collect();

        let mut sq = vec![0.0f64; c];
        for row in x.chunks(c) {
            for ((s, &v), m) in sq.iter_mut().zip(row).zip(&mean) {
                let d = f64::from(v) - m;
                *s += d * d;
            }
        }
        let inv_std = sq
            .iter()
            .map(|s| (1.0 / (s / n + f64::from(self.epsilon)).sqrt()) as f32)
            .collect();
        (mean.into_iter().map(|m| m as f32).collect(), inv_std)
    }
}

impl TraitNode for BatchNorm {
    fn type_name(&self) -> &'static str {
        "BatchNorm"
    }

    fn value_expected_shape(&self) -> &[usize] {
        &self.shape
    }

    fn calc_value_by_parents(&mut self, parents: &[&Tensor]) -> Result<Tensor, GraphError> {
        let x = parents[0].as_slice();
        let gamma = parents[1].as_slice();
        let beta = parents[2].as_slice();
        let (mean, inv_std) = self.statistics(x);

        let mut out = Vec::with_capacity(x.len());
        for row in x.chunks(self.channels) {
            for (ch, &v) in row.iter().enumerate() {
                out.push(gamma[ch] * (v - mean[ch]) * inv_std[ch] + beta[ch]);
            }
        }
        Ok(Tensor::from_vec(out, &self.shape))
    }

    fn calc_grad_to_parent(
        &self,
        parent_index: usize,
        parents: &[&Tensor],
        _value: &Tensor,
        upstream_grad: &Tensor,
    ) -> Result<Tensor, GraphError> {
        let c = self.channels;
        let x = parents[0].as_slice();
        let dy = upstream_grad.as_slice();
        let (mean, inv_std) = self.statistics(x);
        let xhat = |i: usize| (x[i] - mean[i % c]) * inv_std[i % c];

        // Σdy 与 Σdy·x̂（逐通道）
        let mut sum_dy = vec![0.0f64; c];
        let mut sum_dy_xhat = vec![0.0f64; c];
        for (i, &g) in dy.iter().enumerate() {
            sum_dy[i % c] += f64::from(g);
            sum_dy_xhat[i % c] += f64::from(g * xhat(i));
        }

        match parent_index {
            0 => {
                // dx = γ·inv_std/N · (N·dy − Σdy − x̂·Σ(dy·x̂))
                let gamma = parents[1].as_slice();
                let n = (x.len() / c) as f64;
                let grad = dy
                    .iter()
                    .enumerate()
                    .map(|(i, &g)| {
                        let ch = i % c;
                        let inner = n * f64::from(g)
                            - sum_dy[ch]
                            - f64::from(xhat(i)) * sum_dy_xhat[ch];
                        (f64::from(gamma[ch] * inv_std[ch]) / n * inner) as f32
                    })
                    .collect();
                Ok(Tensor::from_vec(grad, &self.shape))
            }
            1 => Ok(Tensor::from_vec(
                sum_dy_xhat.into_iter().map(|v| v as f32).collect(),
                &[c],
            )),
            2 => Ok(Tensor::from_vec(
                sum_dy.into_iter().map(|v| v as f32).collect(),
                &[c],
            )),
            _ => Err(GraphError::InvalidOperation(format!(
                "BatchNorm只有3个父节点，无效的父节点下标{parent_index}"
            ))),
        }
    }
}
