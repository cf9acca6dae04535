use crate::nn::GraphError;
use crate::nn::nodes::NodeHandle;
use crate::nn::nodes::raw_node::TraitNode;
use crate::tensor::Tensor;

/// 多个同形张量逐元素相加（损失加权求和用）
pub(in crate::nn) struct Add {
    shape: Vec<usize>,
    parent_count: usize,
}

impl Add {
    pub(in crate::nn) fn new(parents: &[&NodeHandle]) -> Result<Self, GraphError> {
        // 1. 至少2个父节点
        if parents.len() < 2 {
            return Err(GraphError::InvalidOperation(
                "Add节点至少需要2个父节点".to_string(),
            ));
        }
        // 2. 所有父节点形状须一致
        let shape = parents[0].value_expected_shape();
        for parent in &parents[1..] {
            if parent.value_expected_shape() != shape {
                return Err(GraphError::ShapeMismatch {
                    expected: shape.to_vec(),
                    got: parent.value_expected_shape().to_vec(),
                    message: format!("Add的父节点{parent}形状与第一个父节点不一致"),
                });
            }
        }
        Ok(Self {
            shape: shape.to_vec(),
            parent_count: parents.len(),
        })
    }
}

impl TraitNode for Add {
    fn type_name(&self) -> &'static str {
        "Add"
    }

    fn value_expected_shape(&self) -> &[usize] {
        &self.shape
    }

    fn calc_value_by_parents(&mut self, parents: &[&Tensor]) -> Result<Tensor, GraphError> {
        let mut sum = parents[0].clone();
        for p in &parents[1..] {
            sum += *p;
        }
        Ok(sum)
    }

    fn calc_grad_to_parent(
        &self,
        parent_index: usize,
        _parents: &[&Tensor],
        _value: &Tensor,
        upstream_grad: &Tensor,
    ) -> Result<Tensor, GraphError> {
        if parent_index >= self.parent_count {
            return Err(GraphError::InvalidOperation(format!(
                "Add只有{}个父节点，无效的父节点下标{parent_index}",
                self.parent_count
            )));
        }
        Ok(upstream_grad.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::handle;
    use super::*;

    #[test]
    fn test_add_three_parents() {
        let (a, b, c) = (handle(&[2]), handle(&[2]), handle(&[2]));
        let mut node = Add::new(&[&a, &b, &c]).unwrap();
        let out = node
            .calc_value_by_parents(&[
                &Tensor::new(&[1., 2.], &[2]),
                &Tensor::new(&[10., 20.], &[2]),
                &Tensor::new(&[100., 200.], &[2]),
            ])
            .unwrap();
        assert_eq!(out.to_vec(), vec![111., 222.]);
    }

    #[test]
    fn test_add_shape_mismatch() {
        let (a, b) = (handle(&[2]), handle(&[3]));
        assert!(Add::new(&[&a, &b]).is_err());
        assert!(Add::new(&[&a]).is_err());
    }
}
