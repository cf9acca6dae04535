use crate::nn::GraphError;
use crate::nn::nodes::NodeHandle;
use crate::nn::nodes::raw_node::TraitNode;
use crate::tensor::Tensor;

/// 沿最后一维（通道）拼接：U-Net的跳连、判别器输入、类别嵌入都用它
pub(in crate::nn) struct Concat {
    shape: Vec<usize>,
    /// 各父节点在最后一维上的[起, 止)
    ranges: Vec<(usize, usize)>,
}

impl Concat {
    pub(in crate::nn) fn new(parents: &[&NodeHandle]) -> Result<Self, GraphError> {
        let first = parents.first().ok_or_else(|| {
            GraphError::InvalidOperation("Concat节点至少需要1个父节点".to_string())
        })?;
        let leading = first.value_expected_shape();
        let rank = leading.len();
        if rank == 0 {
            return Err(GraphError::InvalidOperation(
                "Concat的父节点不能是0维".to_string(),
            ));
        }

        let mut ranges = Vec::with_capacity(parents.len());
        let mut offset = 0;
        for parent in parents {
            let shape = parent.value_expected_shape();
            if shape.len() != rank || shape[..rank - 1] != leading[..rank - 1] {
                return Err(GraphError::ShapeMismatch {
                    expected: leading.to_vec(),
                    got: shape.to_vec(),
                    message: format!("Concat要求除最后一维外形状一致，{parent}不满足"),
                });
            }
            ranges.push((offset, offset + shape[rank - 1]));
            offset += shape[rank - 1];
        }

        let mut shape = leading.to_vec();
        shape[rank - 1] = offset;
        Ok(Self { shape, ranges })
    }
}

impl TraitNode for Concat {
    fn type_name(&self) -> &'static str {
        "Concat"
    }

    fn value_expected_shape(&self) -> &[usize] {
        &self.shape
    }

    fn calc_value_by_parents(&mut self, parents: &[&Tensor]) -> Result<Tensor, GraphError> {
        Ok(Tensor::concat_last_axis(parents)?)
    }

    fn calc_grad_to_parent(
        &self,
        parent_index: usize,
        _parents: &[&Tensor],
        _value: &Tensor,
        upstream_grad: &Tensor,
    ) -> Result<Tensor, GraphError> {
        let &(start, end) = self.ranges.get(parent_index).ok_or_else(|| {
            GraphError::InvalidOperation(format!(
                "Concat只有{}个父节点，无效的父节点下标{parent_index}",
                self.ranges.len()
            ))
        })?;
        Ok(upstream_grad.slice_last_axis(start, end)?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::handle;
    use super::*;

    #[test]
    fn test_concat_and_split_grad() {
        let (a, b) = (handle(&[2, 1]), handle(&[2, 2]));
        let mut node = Concat::new(&[&a, &b]).unwrap();
        assert_eq!(node.value_expected_shape(), &[2, 3]);

        let ta = Tensor::new(&[1., 2.], &[2, 1]);
        let tb = Tensor::new(&[3., 4., 5., 6.], &[2, 2]);
        let out = node.calc_value_by_parents(&[&ta, &tb]).unwrap();
        assert_eq!(out.to_vec(), vec![1., 3., 4., 2., 5., 6.]);

        assert_eq!(node.calc_grad_to_parent(0, &[&ta, &tb], &out, &out).unwrap(), ta);
        assert_eq!(node.calc_grad_to_parent(1, &[&ta, &tb], &out, &out).unwrap(), tb);
    }

    #[test]
    fn test_concat_leading_mismatch() {
        let (a, b) = (handle(&[2, 4, 4, 3]), handle(&[2, 4, 2, 3]));
        assert!(Concat::new(&[&a, &b]).is_err());
    }
}
