use crate::nn::GraphError;
use crate::nn::nodes::NodeHandle;
use crate::nn::nodes::raw_node::TraitNode;
use crate::tensor::Tensor;

/// Leaky ReLU 激活函数节点
///
/// forward: f(x) = x if x > 0, else negative_slope * x
/// backward: d(f)/dx = 1 if x > 0, else negative_slope
///
/// 当 negative_slope = 0 时，等价于标准 ReLU（解码器用）；判别器与编码器用0.2
pub(in crate::nn) struct LeakyReLU {
    shape: Vec<usize>,
    negative_slope: f32,
}

impl LeakyReLU {
    pub(in crate::nn) fn new(parents: &[&NodeHandle], negative_slope: f32) -> Result<Self, GraphError> {
        // 1. 必要的验证
        // 1.1 父节点数量验证
        if parents.len() != 1 {
            return Err(GraphError::InvalidOperation(
                "LeakyReLU节点只需要1个父节点".to_string(),
            ));
        }

        // 1.2 negative_slope 验证（通常应该是非负小数）
        if !(0.0..1.0).contains(&negative_slope) {
            return Err(GraphError::InvalidOperation(format!(
                "LeakyReLU的negative_slope应在[0, 1)内，但得到: {negative_slope}"
            )));
        }

        // 2. 返回
        Ok(Self {
            shape: parents[0].value_expected_shape().to_vec(),
            negative_slope,
        })
    }
}

impl TraitNode for LeakyReLU {
    fn type_name(&self) -> &'static str {
        if self.negative_slope == 0.0 {
            "ReLU"
        } else {
            "LeakyReLU"
        }
    }

    fn value_expected_shape(&self) -> &[usize] {
        &self.shape
    }

    fn calc_value_by_parents(&mut self, parents: &[&Tensor]) -> Result<Tensor, GraphError> {
        let slope = self.negative_slope;
        Ok(parents[0].where_with_f32(|x| x > 0.0, |x| x, |x| slope * x))
    }

    fn calc_grad_to_parent(
        &self,
        _parent_index: usize,
        parents: &[&Tensor],
        _value: &Tensor,
        upstream_grad: &Tensor,
    ) -> Result<Tensor, GraphError> {
        // 逐元素：雅可比是对角阵，直接与上游梯度逐元素相乘
        let slope = self.negative_slope;
        Ok(upstream_grad.zip_map(parents[0], |g, x| if x > 0.0 { g } else { slope * g }))
    }
}
