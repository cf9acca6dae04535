use crate::nn::GraphError;
use crate::nn::nodes::NodeHandle;
use crate::nn::nodes::raw_node::TraitNode;
use crate::tensor::Tensor;

/// 沿最后一维加偏置：x[..., C] + b[C]
pub(in crate::nn) struct BiasAdd {
    shape: Vec<usize>,
    channels: usize,
}

impl BiasAdd {
    pub(in crate::nn) fn new(parents: &[&NodeHandle]) -> Result<Self, GraphError> {
        if parents.len() != 2 {
            return Err(GraphError::InvalidOperation(
                "BiasAdd节点需要2个父节点：[x, bias]".to_string(),
            ));
        }
        let shape = parents[0].value_expected_shape();
        let bias_shape = parents[1].value_expected_shape();
        let channels = shape.last().copied().unwrap_or(0);
        if bias_shape != [channels].as_slice() {
            return Err(GraphError::ShapeMismatch {
                expected: vec![channels],
                got: bias_shape.to_vec(),
                message: "偏置长度须与输入最后一维一致".to_string(),
            });
        }
        Ok(Self {
            shape: shape.to_vec(),
            channels,
        })
    }
}

impl TraitNode for BiasAdd {
    fn type_name(&self) -> &'static str {
        "BiasAdd"
    }

    fn value_expected_shape(&self) -> &[usize] {
        &self.shape
    }

    fn calc_value_by_parents(&mut self, parents: &[&Tensor]) -> Result<Tensor, GraphError> {
        // [C]可直接按广播规则与[..., C]相加
        Ok(parents[0] + parents[1])
    }

    fn calc_grad_to_parent(
        &self,
        parent_index: usize,
        _parents: &[&Tensor],
        _value: &Tensor,
        upstream_grad: &Tensor,
    ) -> Result<Tensor, GraphError> {
        match parent_index {
            0 => Ok(upstream_grad.clone()),
            1 => {
                let mut grad = vec![0.0f32; self.channels];
                for row in upstream_grad.as_slice().chunks(self.channels) {
                    for (g, &v) in grad.iter_mut().zip(row) {
                        *g += v;
                    }
                }
                Ok(Tensor::from_vec(grad, &[self.channels]))
            }
            _ => Err(GraphError::InvalidOperation(format!(
                "BiasAdd只有2个父节点，无效的父节点下标{parent_index}"
            ))),
        }
    }
}
