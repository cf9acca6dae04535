/*
 * @Description  : 2D 卷积节点（NHWC，im2col + 矩阵乘）
 *
 * 父节点：
 * - parents[0]: 输入 [batch, H, W, C_in]
 * - parents[1]: 卷积核 [kH, kW, C_in, C_out]（HWIO）
 *
 * 不带偏置：编码器、判别器中紧随其后的批归一化会吸收偏置项，
 * 需要偏置的地方（判别器最后一层）另接BiasAdd节点。
 * 使用 Rayon 在 batch 维度并行。
 */

use super::im2col::{ConvGeometry, Padding, as_matrix, col2im, im2col};
use crate::nn::GraphError;
use crate::nn::nodes::NodeHandle;
use crate::nn::nodes::raw_node::TraitNode;
use crate::tensor::Tensor;
use ndarray::Array2;
use rayon::prelude::*;

pub(in crate::nn) struct Conv2d {
    shape: Vec<usize>,
    geometry: ConvGeometry,
    out_channels: usize,
}

impl Conv2d {
    pub(in crate::nn) fn new(
        parents: &[&NodeHandle],
        stride: usize,
        padding: Padding,
    ) -> Result<Self, GraphError> {
        // 1. 验证父节点数量
        if parents.len() != 2 {
            return Err(GraphError::InvalidOperation(
                "Conv2d节点需要2个父节点：[输入, 卷积核]".to_string(),
            ));
        }
        let input_shape = parents[0].value_expected_shape();
        let kernel_shape = parents[1].value_expected_shape();

        // 2. 验证形状
        if input_shape.len() != 4 {
            return Err(GraphError::DimensionMismatch {
                expected: 4,
                got: input_shape.len(),
                message: format!("Conv2d输入必须是4D [batch, H, W, C_in]，得到{input_shape:?}"),
            });
        }
        if kernel_shape.len() != 4 {
            return Err(GraphError::DimensionMismatch {
                expected: 4,
                got: kernel_shape.len(),
                message: format!("卷积核必须是4D [kH, kW, C_in, C_out]，得到{kernel_shape:?}"),
            });
        }
        let (batch, in_h, in_w, in_c) = (
            input_shape[0],
            input_shape[1],
            input_shape[2],
            input_shape[3],
        );
        if kernel_shape[2] != in_c {
            return Err(GraphError::ShapeMismatch {
                expected: vec![in_c],
                got: vec![kernel_shape[2]],
                message: format!(
                    "输入通道数{in_c}与卷积核输入通道数{}不匹配",
                    kernel_shape[2]
                ),
            });
        }

        // 3. 计算输出尺寸
        let geometry = ConvGeometry::from_input(
            in_h,
            in_w,
            in_c,
            (kernel_shape[0], kernel_shape[1]),
            stride,
            padding,
        )?;
        let out_channels = kernel_shape[3];

        Ok(Self {
            shape: vec![batch, geometry.out_h, geometry.out_w, out_channels],
            geometry,
            out_channels,
        })
    }

    fn sample_lens(&self) -> (usize, usize) {
        let g = &self.geometry;
        (g.in_h * g.in_w * g.channels, g.out_h * g.out_w * self.out_channels)
    }
}

impl TraitNode for Conv2d {
    fn type_name(&self) -> &'static str {
        "Conv2d"
    }

    fn value_expected_shape(&self) -> &[usize] {
        &self.shape
    }

    fn calc_value_by_parents(&mut self, parents: &[&Tensor]) -> Result<Tensor, GraphError> {
        let geo = self.geometry;
        let (in_len, _) = self.sample_lens();
        let kernel = as_matrix(parents[1].as_slice(), geo.patch_len(), self.out_channels)?;
        let input = parents[0].as_slice();

        // 每个样本：[out_h*out_w, patch] · [patch, C_out]，结果按行优先恰为[out_h, out_w, C_out]
        let samples = input
            .par_chunks(in_len)
            .map(|image| -> Result<_, GraphError> {
                Ok(im2col(image, &geo)?.dot(&kernel).into_raw_vec())
            })
            .collect::<Result<Vec<_>, GraphError>>()?;

        Ok(Tensor::from_vec(samples.concat(), &self.shape))
    }

    fn calc_grad_to_parent(
        &self,
        parent_index: usize,
        parents: &[&Tensor],
        _value: &Tensor,
        upstream_grad: &Tensor,
    ) -> Result<Tensor, GraphError> {
        let geo = self.geometry;
        let (in_len, out_len) = self.sample_lens();
        let rows = geo.out_h * geo.out_w;
        let kernel = as_matrix(parents[1].as_slice(), geo.patch_len(), self.out_channels)?;
        let input = parents[0].as_slice();
        let upstream = upstream_grad.as_slice();

        match parent_index {
            // dX = col2im(dY · Kᵀ)
            0 => {
                let samples = upstream
                    .par_chunks(out_len)
                    .map(|dy| -> Result<_, GraphError> {
                        let dy = as_matrix(dy, rows, self.out_channels)?;
                        Ok(col2im(dy.dot(&kernel.t()).view(), &geo))
                    })
                    .collect::<Result<Vec<_>, GraphError>>()?;
                Ok(Tensor::from_vec(samples.concat(), parents[0].shape()))
            }
            // dK = Σ_b colsᵀ · dY
            1 => {
                let grad = input
                    .par_chunks(in_len)
                    .zip(upstream.par_chunks(out_len))
                    .map(|(image, dy)| -> Result<_, GraphError> {
                        let dy = as_matrix(dy, rows, self.out_channels)?;
                        Ok(im2col(image, &geo)?.t().dot(&dy))
                    })
                    .try_reduce(
                        || Array2::zeros((geo.patch_len(), self.out_channels)),
                        |a, b| Ok(a + b),
                    )?;
                Ok(Tensor::from_vec(
                    grad.as_standard_layout().into_owned().into_raw_vec(),
                    parents[1].shape(),
                ))
            }
            _ => Err(GraphError::InvalidOperation(format!(
                "Conv2d只有2个父节点，无效的父节点下标{parent_index}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::{check_grad, handle};
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_conv2d_forward_matches_direct_sum() {
        // 1x3x3x1 输入，2x2x1x1 全1核，stride 1，无填充：每个输出是2x2窗口之和
        let x = handle(&[1, 3, 3, 1]);
        let k = handle(&[2, 2, 1, 1]);
        let mut node = Conv2d::new(&[&x, &k], 1, Padding::default()).unwrap();
        assert_eq!(node.value_expected_shape(), &[1, 2, 2, 1]);

        let input = Tensor::new(&[1., 2., 3., 4., 5., 6., 7., 8., 9.], &[1, 3, 3, 1]);
        let kernel = Tensor::ones(&[2, 2, 1, 1]);
        let out = node.calc_value_by_parents(&[&input, &kernel]).unwrap();
        assert_eq!(out.to_vec(), vec![12., 16., 24., 28.]);
    }

    #[test]
    fn test_conv2d_same_padding_halves_size() {
        let x = handle(&[2, 8, 8, 3]);
        let k = handle(&[4, 4, 3, 5]);
        let node = Conv2d::new(&[&x, &k], 2, Padding::same(8, 8, (4, 4), 2)).unwrap();
        assert_eq!(node.value_expected_shape(), &[2, 4, 4, 5]);
    }

    #[test]
    fn test_conv2d_channel_mismatch() {
        let x = handle(&[1, 8, 8, 3]);
        let k = handle(&[4, 4, 2, 5]);
        assert!(matches!(
            Conv2d::new(&[&x, &k], 2, Padding::uniform(1)),
            Err(GraphError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_conv2d_grads_match_numeric() {
        let x = handle(&[2, 5, 5, 2]);
        let k = handle(&[3, 3, 2, 3]);
        let node = Conv2d::new(&[&x, &k], 2, Padding::uniform(1)).unwrap();
        check_grad(node, &[&[2, 5, 5, 2], &[3, 3, 2, 3]], 1e-2);
    }

    #[test]
    fn test_conv2d_output_is_finite_for_batch() {
        let x = handle(&[3, 4, 4, 1]);
        let k = handle(&[4, 4, 1, 2]);
        let mut node = Conv2d::new(&[&x, &k], 2, Padding::same(4, 4, (4, 4), 2)).unwrap();
        let input = Tensor::ones(&[3, 4, 4, 1]);
        let kernel = Tensor::ones(&[4, 4, 1, 2]);
        let out = node.calc_value_by_parents(&[&input, &kernel]).unwrap();
        assert_eq!(out.shape(), &[3, 2, 2, 2]);
        // 左上角输出覆盖3x3的有效区域（其余落在填充上）
        assert_abs_diff_eq!(out.as_slice()[0], 9.0);
    }
}
