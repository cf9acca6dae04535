use super::Tensor;
use crate::errors::TensorError;
use ndarray::{Axis, Slice, concatenate};

impl Tensor {
    /// 重塑形状（元素总数须一致）
    pub fn reshape(&self, shape: &[usize]) -> Result<Self, TensorError> {
        let new_total_elements: usize = shape.iter().product();
        if self.size() != new_total_elements {
            return Err(TensorError::ReshapeError {
                from: self.shape().to_vec(),
                to: shape.to_vec(),
            });
        }
        let data = self
            .data
            .as_standard_layout()
            .into_owned()
            .into_shape(shape)
            .map_err(|_| TensorError::ReshapeError {
                from: self.shape().to_vec(),
                to: shape.to_vec(),
            })?;
        Ok(Self::from_array(data))
    }

    /// 沿最后一维（通道）拼接。除最后一维外，各张量的形状须完全一致，
    /// 不做任何广播，宽度不一致的标签向量在这里直接报错。
    pub fn concat_last_axis(tensors: &[&Self]) -> Result<Self, TensorError> {
        let first = tensors.first().ok_or(TensorError::EmptyList)?;
        let rank = first.dimension();
        let leading = &first.shape()[..rank.saturating_sub(1)];
        let compatible = rank > 0
            && tensors
                .iter()
                .all(|t| t.dimension() == rank && &t.shape()[..rank - 1] == leading);
        if !compatible {
            return Err(TensorError::ConcatShapeMismatch(
                tensors.iter().map(|t| t.shape().to_vec()).collect(),
            ));
        }

        let views: Vec<_> = tensors.iter().map(|t| t.data.view()).collect();
        let data = concatenate(Axis(rank - 1), &views).map_err(|_| {
            TensorError::ConcatShapeMismatch(tensors.iter().map(|t| t.shape().to_vec()).collect())
        })?;
        // concatenate的结果已是标准布局
        Ok(Self::from_array(data))
    }

    /// 取最后一维上[start, end)的部分（拷贝为标准布局）
    pub fn slice_last_axis(&self, start: usize, end: usize) -> Result<Self, TensorError> {
        let rank = self.dimension();
        let len = self.shape().last().copied().unwrap_or(0);
        if rank == 0 || start > end || end > len {
            return Err(TensorError::SliceOutOfRange { start, end, len });
        }
        let view = self
            .data
            .slice_axis(Axis(rank - 1), Slice::from(start..end));
        Ok(Self::from_array(view.as_standard_layout().into_owned()))
    }
}
