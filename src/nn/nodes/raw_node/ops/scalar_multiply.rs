use crate::nn::GraphError;
use crate::nn::nodes::NodeHandle;
use crate::nn::nodes::raw_node::TraitNode;
use crate::tensor::Tensor;

/// 乘以一个固定标量（损失权重）
pub(in crate::nn) struct ScalarMultiply {
    shape: Vec<usize>,
    scalar: f32,
}

impl ScalarMultiply {
    pub(in crate::nn) fn new(parents: &[&NodeHandle], scalar: f32) -> Result<Self, GraphError> {
        if parents.len() != 1 {
            return Err(GraphError::InvalidOperation(
                "ScalarMultiply节点只需要1个父节点".to_string(),
            ));
        }
        Ok(Self {
            shape: parents[0].value_expected_shape().to_vec(),
            scalar,
        })
    }
}

impl TraitNode for ScalarMultiply {
    fn type_name(&self) -> &'static str {
        "ScalarMultiply"
    }

    fn value_expected_shape(&self) -> &[usize] {
        &self.shape
    }

    fn calc_value_by_parents(&mut self, parents: &[&Tensor]) -> Result<Tensor, GraphError> {
        Ok(parents[0] * self.scalar)
    }

    fn calc_grad_to_parent(
        &self,
        _parent_index: usize,
        _parents: &[&Tensor],
        _value: &Tensor,
        upstream_grad: &Tensor,
    ) -> Result<Tensor, GraphError> {
        Ok(upstream_grad * self.scalar)
    }
}
