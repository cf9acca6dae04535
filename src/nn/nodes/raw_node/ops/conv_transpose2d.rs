/*
 * @Description  : 2D 转置卷积（反卷积）节点，NHWC
 *
 * 父节点：
 * - parents[0]: 输入 [batch, H, W, C_in]
 * - parents[1]: 卷积核 [kH, kW, C_out, C_in]（与TF的conv2d_transpose一致）
 *
 * 反卷积是“以输出为输入”的正向卷积的伴随：
 * - 前向：Y = col2im(X · Kᵀ)，K按行优先看作[kH*kW*C_out, C_in]
 * - 反向：G = im2col(dY)；dX = G · K，dK = Σ_b Gᵀ · X
 */

use super::im2col::{ConvGeometry, Padding, as_matrix, col2im, im2col};
use crate::nn::GraphError;
use crate::nn::nodes::NodeHandle;
use crate::nn::nodes::raw_node::TraitNode;
use crate::tensor::Tensor;
use ndarray::Array2;
use rayon::prelude::*;

pub(in crate::nn) struct ConvTranspose2d {
    shape: Vec<usize>,
    /// 对应正向卷积的几何：`in_*`为本节点的输出尺寸，`out_*`为本节点的输入尺寸
    geometry: ConvGeometry,
    in_channels: usize,
}

impl ConvTranspose2d {
    /// `padding`按“正向卷积”理解，即从本节点输出裁掉的边
    pub(in crate::nn) fn new(
        parents: &[&NodeHandle],
        stride: usize,
        padding: Padding,
    ) -> Result<Self, GraphError> {
        if parents.len() != 2 {
            return Err(GraphError::InvalidOperation(
                "ConvTranspose2d节点需要2个父节点：[输入, 卷积核]".to_string(),
            ));
        }
        let input_shape = parents[0].value_expected_shape();
        let kernel_shape = parents[1].value_expected_shape();
        if input_shape.len() != 4 || kernel_shape.len() != 4 {
            return Err(GraphError::DimensionMismatch {
                expected: 4,
                got: input_shape.len().min(kernel_shape.len()),
                message: format!(
                    "反卷积的输入须为[batch, H, W, C_in]、卷积核须为[kH, kW, C_out, C_in]，得到{input_shape:?}与{kernel_shape:?}"
                ),
            });
        }
        let in_channels = input_shape[3];
        if kernel_shape[3] != in_channels {
            return Err(GraphError::ShapeMismatch {
                expected: vec![in_channels],
                got: vec![kernel_shape[3]],
                message: format!(
                    "输入通道数{in_channels}与反卷积核输入通道数{}不匹配",
                    kernel_shape[3]
                ),
            });
        }

        let out_channels = kernel_shape[2];
        let geometry = ConvGeometry::from_output(
            input_shape[1],
            input_shape[2],
            out_channels,
            (kernel_shape[0], kernel_shape[1]),
            stride,
            padding,
        )?;

        Ok(Self {
            shape: vec![input_shape[0], geometry.in_h, geometry.in_w, out_channels],
            geometry,
            in_channels,
        })
    }

    fn sample_lens(&self) -> (usize, usize) {
        let g = &self.geometry;
        (g.out_h * g.out_w * self.in_channels, g.in_h * g.in_w * g.channels)
    }
}

impl TraitNode for ConvTranspose2d {
    fn type_name(&self) -> &'static str {
        "ConvTranspose2d"
    }

    fn value_expected_shape(&self) -> &[usize] {
        &self.shape
    }

    fn calc_value_by_parents(&mut self, parents: &[&Tensor]) -> Result<Tensor, GraphError> {
        let geo = self.geometry;
        let (in_len, _) = self.sample_lens();
        let rows = geo.out_h * geo.out_w;
        let kernel = as_matrix(parents[1].as_slice(), geo.patch_len(), self.in_channels)?;

        let samples = parents[0]
            .as_slice()
            .par_chunks(in_len)
            .map(|x| -> Result<_, GraphError> {
                let x = as_matrix(x, rows, self.in_channels)?;
                Ok(col2im(x.dot(&kernel.t()).view(), &geo))
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
        let kernel = as_matrix(parents[1].as_slice(), geo.patch_len(), self.in_channels)?;
        let upstream = upstream_grad.as_slice();

        match parent_index {
            0 => {
                let samples = upstream
                    .par_chunks(out_len)
                    .map(|dy| -> Result<_, GraphError> {
                        Ok(im2col(dy, &geo)?.dot(&kernel).into_raw_vec())
                    })
                    .collect::<Result<Vec<_>, GraphError>>()?;
                Ok(Tensor::from_vec(samples.concat(), parents[0].shape()))
            }
            1 => {
                let grad = upstream
                    .par_chunks(out_len)
                    .zip(parents[0].as_slice().par_chunks(in_len))
                    .map(|(dy, x)| -> Result<_, GraphError> {
                        let x = as_matrix(x, rows, self.in_channels)?;
                        Ok(im2col(dy, &geo)?.t().dot(&x))
                    })
                    .try_reduce(
                        || Array2::zeros((geo.patch_len(), self.in_channels)),
                        |a, b| Ok(a + b),
                    )?;
                Ok(Tensor::from_vec(
                    grad.as_standard_layout().into_owned().into_raw_vec(),
                    parents[1].shape(),
                ))
            }
            _ => Err(GraphError::InvalidOperation(format!(
                "ConvTranspose2d只有2个父节点，无效的父节点下标{parent_index}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::{check_grad, handle};
    use super::*;

    #[test]
    fn test_deconv_doubles_size() {
        let x = handle(&[2, 4, 4, 6]);
        let k = handle(&[4, 4, 3, 6]);
        let node = ConvTranspose2d::new(&[&x, &k], 2, Padding::same(8, 8, (4, 4), 2)).unwrap();
        assert_eq!(node.value_expected_shape(), &[2, 8, 8, 3]);

        // 瓶颈1x1 -> 2x2
        let x = handle(&[1, 1, 1, 4]);
        let k = handle(&[4, 4, 2, 4]);
        let node = ConvTranspose2d::new(&[&x, &k], 2, Padding::same(2, 2, (4, 4), 2)).unwrap();
        assert_eq!(node.value_expected_shape(), &[1, 2, 2, 2]);
    }

    #[test]
    fn test_deconv_scatters_single_pixel() {
        // 单像素输入、stride 1、无填充：输出就是核本身乘以该像素值
        let x = handle(&[1, 1, 1, 1]);
        let k = handle(&[2, 2, 1, 1]);
        let mut node = ConvTranspose2d::new(&[&x, &k], 1, Padding::default()).unwrap();
        let input = Tensor::new(&[2.0], &[1, 1, 1, 1]);
        let kernel = Tensor::new(&[1., 2., 3., 4.], &[2, 2, 1, 1]);
        let out = node.calc_value_by_parents(&[&input, &kernel]).unwrap();
        assert_eq!(out.shape(), &[1, 2, 2, 1]);
        assert_eq!(out.to_vec(), vec![2., 4., 6., 8.]);
    }

    #[test]
    fn test_deconv_channel_mismatch() {
        let x = handle(&[1, 2, 2, 3]);
        let k = handle(&[4, 4, 2, 5]);
        assert!(ConvTranspose2d::new(&[&x, &k], 2, Padding::uniform(1)).is_err());
    }

    #[test]
    fn test_deconv_grads_match_numeric() {
        let x = handle(&[2, 3, 3, 2]);
        let k = handle(&[4, 4, 3, 2]);
        let node = ConvTranspose2d::new(&[&x, &k], 2, Padding::uniform(1)).unwrap();
        assert_eq!(node.value_expected_shape(), &[2, 6, 6, 3]);
        check_grad(node, &[&[2, 3, 3, 2], &[4, 4, 3, 2]], 1e-2);
    }
}
