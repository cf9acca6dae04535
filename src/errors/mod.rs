use thiserror::Error;
mod ops;
pub use self::ops::*;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TensorError {
    // 数字比较用
    #[error("{value_name}须{operator}{threshold}")]
    ValueMustSatisfyComparison {
        value_name: String,
        operator: ComparisonOperator,
        threshold: usize,
    },
    // 张量二元运算
    #[error(
        "形状不一致，故无法{operator}：第一个张量的形状为{tensor1_shape:?}，第二个张量的形状为{tensor2_shape:?}"
    )]
    OperatorError {
        operator: Operator,
        tensor1_shape: Vec<usize>,
        tensor2_shape: Vec<usize>,
    },

    #[error("张量列表为空")]
    EmptyList,
    #[error("无法将形状{from:?}的张量重塑为{to:?}")]
    ReshapeError { from: Vec<usize>, to: Vec<usize> },
    #[error("拼接失败：除最后一维外形状须一致，但得到{0:?}")]
    ConcatShapeMismatch(Vec<Vec<usize>>),
    #[error("切片范围[{start}, {end})超出了最后一维的长度{len}")]
    SliceOutOfRange { start: usize, end: usize, len: usize },
}
