use crate::nn::GraphError;
use crate::nn::nodes::NodeHandle;
use crate::nn::nodes::raw_node::TraitNode;
use crate::tensor::Tensor;

/// Tanh激活函数节点（生成器的输出层）
///
/// forward: tanh(x)
/// backward: d(tanh)/dx = 1 - tanh²(x)，直接复用本节点的值
pub(in crate::nn) struct Tanh {
    shape: Vec<usize>,
}

impl Tanh {
    pub(in crate::nn) fn new(parents: &[&NodeHandle]) -> Result<Self, GraphError> {
        if parents.len() != 1 {
            return Err(GraphError::InvalidOperation(
                "Tanh节点只需要1个父节点".to_string(),
            ));
        }
        Ok(Self {
            shape: parents[0].value_expected_shape().to_vec(),
        })
    }
}

impl TraitNode for Tanh {
    fn type_name(&self) -> &'static str {
        "Tanh"
    }

    fn value_expected_shape(&self) -> &[usize] {
        &self.shape
    }

    fn calc_value_by_parents(&mut self, parents: &[&Tensor]) -> Result<Tensor, GraphError> {
        Ok(parents[0].map(f32::tanh))
    }

    fn calc_grad_to_parent(
        &self,
        _parent_index: usize,
        _parents: &[&Tensor],
        value: &Tensor,
        upstream_grad: &Tensor,
    ) -> Result<Tensor, GraphError> {
        Ok(upstream_grad.zip_map(value, |g, y| g * (1.0 - y * y)))
    }
}
