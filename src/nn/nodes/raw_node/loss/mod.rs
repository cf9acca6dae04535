mod l1_loss;
mod sigmoid_cross_entropy;

pub(in crate::nn) use l1_loss::L1Loss;
pub(in crate::nn) use sigmoid_cross_entropy::SigmoidCrossEntropy;

use crate::nn::GraphError;
use crate::nn::nodes::NodeHandle;

/// 损失节点的输出形状固定为 [1, 1]（标量损失）
pub(in crate::nn) const LOSS_SHAPE: [usize; 2] = [1, 1];

/// 损失节点共用的父节点校验：[预测, 目标] 且形状一致，返回元素总数
fn check_pair(parents: &[&NodeHandle], loss_name: &str) -> Result<usize, GraphError> {
    if parents.len() != 2 {
        return Err(GraphError::InvalidOperation(format!(
            "{loss_name}节点需要2个父节点（预测和目标）"
        )));
    }
    let input_shape = parents[0].value_expected_shape();
    let target_shape = parents[1].value_expected_shape();
    if input_shape != target_shape {
        return Err(GraphError::ShapeMismatch {
            expected: input_shape.to_vec(),
            got: target_shape.to_vec(),
            message: format!("{loss_name}的预测与目标形状必须一致"),
        });
    }
    Ok(input_shape.iter().product())
}
