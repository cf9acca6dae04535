use crate::nn::GraphError;
use crate::nn::nodes::NodeHandle;
use crate::nn::nodes::raw_node::TraitNode;
use crate::tensor::Tensor;

/// 数值稳定的sigmoid：x为很大的负数时不会溢出
pub(in crate::nn) fn stable_sigmoid(x: f32) -> f32 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Sigmoid激活函数节点（判别器的真伪输出）
///
/// forward: σ(x) = 1 / (1 + e^(-x))
/// backward: dσ/dx = σ(x)·(1 - σ(x))
pub(in crate::nn) struct Sigmoid {
    shape: Vec<usize>,
}

impl Sigmoid {
    pub(in crate::nn) fn new(parents: &[&NodeHandle]) -> Result<Self, GraphError> {
        if parents.len() != 1 {
            return Err(GraphError::InvalidOperation(
                "Sigmoid节点只需要1个父节点".to_string(),
            ));
        }
        Ok(Self {
            shape: parents[0].value_expected_shape().to_vec(),
        })
    }
}

impl TraitNode for Sigmoid {
    fn type_name(&self) -> &'static str {
        "Sigmoid"
    }

    fn value_expected_shape(&self) -> &[usize] {
        &self.shape
    }

    fn calc_value_by_parents(&mut self, parents: &[&Tensor]) -> Result<Tensor, GraphError> {
        Ok(parents[0].map(stable_sigmoid))
    }

    fn calc_grad_to_parent(
        &self,
        _parent_index: usize,
        _parents: &[&Tensor],
        value: &Tensor,
        upstream_grad: &Tensor,
    ) -> Result<Tensor, GraphError> {
        Ok(upstream_grad.zip_map(value, |g, s| g * s * (1.0 - s)))
    }
}
