use super::{LOSS_SHAPE, check_pair};
use crate::nn::GraphError;
use crate::nn::nodes::NodeHandle;
use crate::nn::nodes::raw_node::{TraitNode, stable_sigmoid};
use crate::tensor::Tensor;

/// Sigmoid交叉熵损失节点（逐元素二分类/多标签，均值归约）
///
/// ## 公式
/// 数值稳定形式：`l(x, z) = max(x, 0) - x·z + ln(1 + e^(-|x|))`，`L = mean(l)`
///
/// ## 梯度
/// - `∂L/∂x = (σ(x) - z) / N`
/// - `∂L/∂z = -x / N`
///
/// ## 输入
/// - 父节点 0: logits（任意实数）
/// - 父节点 1: labels（0/1，或one-hot）
///
/// ## 输出
/// - 标量损失值 [1, 1]，恒非负
pub(in crate::nn) struct SigmoidCrossEntropy {
    shape: Vec<usize>,
    numel: usize,
}

impl SigmoidCrossEntropy {
    pub(in crate::nn) fn new(parents: &[&NodeHandle]) -> Result<Self, GraphError> {
        let numel = check_pair(parents, "SigmoidCrossEntropy")?;
        Ok(Self {
            shape: LOSS_SHAPE.to_vec(),
            numel,
        })
    }
}

impl TraitNode for SigmoidCrossEntropy {
    fn type_name(&self) -> &'static str {
        "SigmoidCrossEntropy"
    }

    fn value_expected_shape(&self) -> &[usize] {
        &self.shape
    }

    fn calc_value_by_parents(&mut self, parents: &[&Tensor]) -> Result<Tensor, GraphError> {
        let sum: f64 = parents[0]
            .as_slice()
            .iter()
            .zip(parents[1].as_slice())
            .map(|(&x, &z)| {
                let x = f64::from(x);
                x.max(0.0) - x * f64::from(z) + (-x.abs()).exp().ln_1p()
            })
            .sum();
        Ok(Tensor::new(&[(sum / self.numel as f64) as f32], &self.shape))
    }

    fn calc_grad_to_parent(
        &self,
        parent_index: usize,
        parents: &[&Tensor],
        _value: &Tensor,
        upstream_grad: &Tensor,
    ) -> Result<Tensor, GraphError> {
        let upstream = upstream_grad.get_data_number().ok_or_else(|| {
            GraphError::ComputationError("SigmoidCrossEntropy的上游梯度应为标量".to_string())
        })?;
        let scale = upstream / self.numel as f32;
        match parent_index {
            0 => Ok(parents[0].zip_map(parents[1], |x, z| {
                (stable_sigmoid(x) - z) * scale
            })),
            1 => Ok(parents[0] * -scale),
            _ => Err(GraphError::InvalidOperation(format!(
                "SigmoidCrossEntropy只有2个父节点，无效的父节点下标{parent_index}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::nodes::NodeId;
    use crate::nn::nodes::raw_node::Input;
    use approx::assert_abs_diff_eq;

    fn handle(shape: &[usize]) -> NodeHandle {
        NodeHandle::new(NodeId(0), "x", Input::new(shape).unwrap())
    }

    #[test]
    fn test_sce_at_zero_logit_is_ln2() {
        let (x, z) = (handle(&[1, 2]), handle(&[1, 2]));
        let mut node = SigmoidCrossEntropy::new(&[&x, &z]).unwrap();
        let loss = node
            .calc_value_by_parents(&[&Tensor::zeros(&[1, 2]), &Tensor::new(&[1.0, 0.0], &[1, 2])])
            .unwrap();
        assert_abs_diff_eq!(loss.get_data_number().unwrap(), std::f32::consts::LN_2, epsilon = 1e-6);
    }

    #[test]
    fn test_sce_is_stable_for_large_logits() {
        let (x, z) = (handle(&[3]), handle(&[3]));
        let mut node = SigmoidCrossEntropy::new(&[&x, &z]).unwrap();
        let logits = Tensor::new(&[500.0, -500.0, 30.0], &[3]);
        let labels = Tensor::new(&[1.0, 0.0, 1.0], &[3]);
        let loss = node.calc_value_by_parents(&[&logits, &labels]).unwrap();
        let v = loss.get_data_number().unwrap();
        assert!(v.is_finite() && v >= 0.0 && v < 1e-6);
    }

    #[test]
    fn test_sce_grad() {
        let (x, z) = (handle(&[4]), handle(&[4]));
        let node = SigmoidCrossEntropy::new(&[&x, &z]).unwrap();
        let logits = Tensor::new(&[0.0, 0.0, 2.0, -2.0], &[4]);
        let labels = Tensor::new(&[1.0, 0.0, 1.0, 1.0], &[4]);
        let grad = node
            .calc_grad_to_parent(0, &[&logits, &labels], &Tensor::zeros(&[1, 1]), &Tensor::ones(&[1, 1]))
            .unwrap();
        let s = |x: f32| 1.0 / (1.0 + (-x).exp());
        let expected = [s(0.0) - 1.0, s(0.0), s(2.0) - 1.0, s(-2.0) - 1.0];
        for (g, e) in grad.as_slice().iter().zip(expected) {
            assert_abs_diff_eq!(*g, e / 4.0, epsilon = 1e-6);
        }
    }
}
