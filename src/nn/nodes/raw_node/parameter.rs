use super::{TraitNode, leaf_cannot_compute};
use crate::nn::GraphError;
use crate::tensor::Tensor;

/// 可训练参数节点。参数按名称前缀分组（如`generator/...`、`discriminator/...`），
/// 优化器据此决定各自负责更新哪些参数。
pub(in crate::nn) struct Parameter {
    shape: Vec<usize>,
}

impl Parameter {
    pub(in crate::nn) fn new(shape: &[usize]) -> Result<Self, GraphError> {
        // 1D: BN的gamma/beta、偏置；2D: 全连接权重；4D: 卷积核
        if shape.is_empty() || shape.len() > 4 || shape.contains(&0) {
            return Err(GraphError::DimensionMismatch {
                expected: 4,
                got: shape.len(),
                message: format!("参数张量须为1-4维且各维非0，得到{shape:?}"),
            });
        }
        Ok(Self {
            shape: shape.to_vec(),
        })
    }
}

impl TraitNode for Parameter {
    fn type_name(&self) -> &'static str {
        "Parameter"
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
            "Parameter节点没有父节点，不应对其求父节点梯度".to_string(),
        ))
    }
}
