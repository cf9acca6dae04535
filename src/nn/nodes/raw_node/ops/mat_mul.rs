use super::im2col::as_matrix;
use crate::nn::GraphError;
use crate::nn::nodes::NodeHandle;
use crate::nn::nodes::raw_node::TraitNode;
use crate::tensor::Tensor;

/// 矩阵乘：[B, K] · [K, M] -> [B, M]（分类头的全连接）
pub(in crate::nn) struct MatMul {
    shape: Vec<usize>,
    /// (B, K, M)
    dims: (usize, usize, usize),
}

impl MatMul {
    pub(in crate::nn) fn new(parents: &[&NodeHandle]) -> Result<Self, GraphError> {
        if parents.len() != 2 {
            return Err(GraphError::InvalidOperation(
                "MatMul节点需要2个父节点".to_string(),
            ));
        }
        let a = parents[0].value_expected_shape();
        let b = parents[1].value_expected_shape();
        if a.len() != 2 || b.len() != 2 || a[1] != b[0] {
            return Err(GraphError::ShapeMismatch {
                expected: vec![a.first().copied().unwrap_or(0), b.first().copied().unwrap_or(0)],
                got: b.to_vec(),
                message: format!("MatMul要求[B, K]·[K, M]，得到{a:?}·{b:?}"),
            });
        }
        Ok(Self {
            shape: vec![a[0], b[1]],
            dims: (a[0], a[1], b[1]),
        })
    }
}

impl TraitNode for MatMul {
    fn type_name(&self) -> &'static str {
        "MatMul"
    }

    fn value_expected_shape(&self) -> &[usize] {
        &self.shape
    }

    fn calc_value_by_parents(&mut self, parents: &[&Tensor]) -> Result<Tensor, GraphError> {
        let (b, k, m) = self.dims;
        let x = as_matrix(parents[0].as_slice(), b, k)?;
        let w = as_matrix(parents[1].as_slice(), k, m)?;
        Ok(Tensor::from_vec(x.dot(&w).into_raw_vec(), &self.shape))
    }

    fn calc_grad_to_parent(
        &self,
        parent_index: usize,
        parents: &[&Tensor],
        _value: &Tensor,
        upstream_grad: &Tensor,
    ) -> Result<Tensor, GraphError> {
        let (b, k, m) = self.dims;
        let dy = as_matrix(upstream_grad.as_slice(), b, m)?;
        let grad = match parent_index {
            // dX = dY · Wᵀ
            0 => dy.dot(&as_matrix(parents[1].as_slice(), k, m)?.t()),
            // dW = Xᵀ · dY
            1 => as_matrix(parents[0].as_slice(), b, k)?.t().dot(&dy),
            _ => {
                return Err(GraphError::InvalidOperation(format!(
                    "MatMul只有2个父节点，无效的父节点下标{parent_index}"
                )));
            }
        };
        Ok(Tensor::from_vec(
            grad.as_standard_layout().into_owned().into_raw_vec(),
            parents[parent_index].shape(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::{check_grad, handle};
    use super::*;

    #[test]
    fn test_mat_mul_forward() {
        let (a, b) = (handle(&[1, 2]), handle(&[2, 3]));
        let mut node = MatMul::new(&[&a, &b]).unwrap();
        let out = node
            .calc_value_by_parents(&[
                &Tensor::new(&[1., 2.], &[1, 2]),
                &Tensor::new(&[1., 2., 3., 4., 5., 6.], &[2, 3]),
            ])
            .unwrap();
        assert_eq!(out.shape(), &[1, 3]);
        assert_eq!(out.to_vec(), vec![9., 12., 15.]);
    }

    #[test]
    fn test_mat_mul_grads_and_shape_check() {
        let (a, b) = (handle(&[3, 4]), handle(&[4, 2]));
        check_grad(MatMul::new(&[&a, &b]).unwrap(), &[&[3, 4], &[4, 2]], 1e-2);
        let c = handle(&[3, 2]);
        assert!(MatMul::new(&[&a, &c]).is_err());
    }
}
