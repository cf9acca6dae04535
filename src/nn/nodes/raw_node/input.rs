/*
 * Input 节点：每步由外部喂入的数据（图像、标签、常量目标）。
 * 输入节点不参与梯度更新，反向传播不会往这里传梯度。
 */

use super::{TraitNode, leaf_cannot_compute};
use crate::nn::GraphError;
use crate::tensor::Tensor;

pub(in crate::nn) struct Input {
    shape: Vec<usize>,
}

impl Input {
    pub(in crate::nn) fn new(shape: &[usize]) -> Result<Self, GraphError> {
        if shape.is_empty() || shape.contains(&0) {
            return Err(GraphError::InvalidOperation(format!(
                "输入节点的形状不能为空或含0，得到{shape:?}"
            )));
        }
        Ok(Self {
            shape: shape.to_vec(),
        })
    }
}

impl TraitNode for Input {
    fn type_name(&self) -> &'static str {
        "Input"
    }

    fn value_expected_shape(&self) -> &[usize] {
        &self.shape
    }

    fn calc_value_by_parents(&mut self, _parents: &[&Tensor]) -> Result<Tensor, GraphError> {
        Err(leaf_cannot_compute(self.type_name()))
    }

    fn calc_grad_to_parent(
        &self,
        _parent_index: usize,
        _parents: &[&Tensor],
        _value: &Tensor,
        _upstream_grad: &Tensor,
    ) -> Result<Tensor, GraphError> {
        Err(GraphError::InvalidOperation(
            "Input节点没有父节点，不应对其求父节点梯度".to_string(),
        ))
    }
}
