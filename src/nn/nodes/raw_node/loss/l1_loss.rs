use super::{LOSS_SHAPE, check_pair};
use crate::nn::GraphError;
use crate::nn::nodes::NodeHandle;
use crate::nn::nodes::raw_node::TraitNode;
use crate::tensor::Tensor;

/// L1（平均绝对误差）损失节点：生成骨架与目标骨架的逐像素距离
///
/// ## 公式
/// `L1 = mean(|input - target|)`
///
/// ## 梯度
/// - `∂L/∂input = sign(input - target) / N`（差为0处取0）
/// - `∂L/∂target = -sign(input - target) / N`
///
/// ## 输出
/// - 标量损失值 [1, 1]
pub(in crate::nn) struct L1Loss {
    shape: Vec<usize>,
    numel: usize,
}

impl L1Loss {
    pub(in crate::nn) fn new(parents: &[&NodeHandle]) -> Result<Self, GraphError> {
        let numel = check_pair(parents, "L1Loss")?;
        Ok(Self {
            shape: LOSS_SHAPE.to_vec(),
            numel,
        })
    }
}

impl TraitNode for L1Loss {
    fn type_name(&self) -> &'static str {
        "L1Loss"
    }

    fn value_expected_shape(&self) -> &[usize] {
        &self.shape
    }

    fn calc_value_by_parents(&mut self, parents: &[&Tensor]) -> Result<Tensor, GraphError> {
        let sum: f64 = parents[0]
            .as_slice()
            .iter()
            .zip(parents[1].as_slice())
            .map(|(&o, &t)| f64::from((o - t).abs()))
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
            GraphError::ComputationError("L1Loss的上游梯度应为标量".to_string())
        })?;
        let sign = match parent_index {
            0 => 1.0,
            1 => -1.0,
            _ => {
                return Err(GraphError::InvalidOperation(format!(
                    "L1Loss只有2个父节点，无效的父节点下标{parent_index}"
                )));
            }
        };
        let scale = sign * upstream / self.numel as f32;
        Ok(parents[0].zip_map(parents[1], |o, t| {
            if o > t {
                scale
            } else if o < t {
                -scale
            } else {
                0.0
            }
        }))
    }
}
