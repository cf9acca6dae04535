use crate::nn::GraphError;
use crate::nn::nodes::NodeHandle;
use crate::nn::nodes::raw_node::TraitNode;
use crate::tensor::Tensor;

/// 改变形状（元素总数不变），如把[B, 1, 1, C]的瓶颈特征展平为[B, C]
pub(in crate::nn) struct Reshape {
    shape: Vec<usize>,
}

impl Reshape {
    pub(in crate::nn) fn new(parents: &[&NodeHandle], target_shape: &[usize]) -> Result<Self, GraphError> {
        if parents.len() != 1 {
            return Err(GraphError::InvalidOperation(
                "Reshape节点只需要1个父节点".to_string(),
            ));
        }
        let from = parents[0].value_expected_shape();
        if from.iter().product::<usize>() != target_shape.iter().product::<usize>() {
            return Err(GraphError::ShapeMismatch {
                expected: from.to_vec(),
                got: target_shape.to_vec(),
                message: "Reshape前后元素总数须一致".to_string(),
            });
        }
        Ok(Self {
            shape: target_shape.to_vec(),
        })
    }
}

impl TraitNode for Reshape {
    fn type_name(&self) -> &'static str {
        "Reshape"
    }

    fn value_expected_shape(&self) -> &[usize] {
        &self.shape
    }

    fn calc_value_by_parents(&mut self, parents: &[&Tensor]) -> Result<Tensor, GraphError> {
        Ok(parents[0].reshape(&self.shape)?)
    }

    fn calc_grad_to_parent(
        &self,
        _parent_index: usize,
        parents: &[&Tensor],
        _value: &Tensor,
        upstream_grad: &Tensor,
    ) -> Result<Tensor, GraphError> {
        Ok(upstream_grad.reshape(parents[0].shape())?)
    }
}
