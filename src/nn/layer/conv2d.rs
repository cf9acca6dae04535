/*
 * @Description  : Conv2d (2D 卷积) 层
 *
 * 输入/输出形状（NHWC）：
 * - 输入：[batch_size, H, W, in_channels]
 * - 输出：[batch_size, H', W', out_channels]
 *
 * 计算：output = conv2d(x, K) (+ b)
 */

use super::{PaddingMode, WEIGHT_INIT};
use crate::nn::{Graph, GraphError, Init, Module, Padding, Var, VarMatrixOps};

/// Conv2d (2D 卷积) 层
///
/// # 使用示例
/// ```ignore
/// let conv = Conv2d::new(&graph, 3, 64, 4, 2, PaddingMode::Same, false, "generator/encoder_1/conv")?;
/// let h = conv.forward(&x)?;
/// ```
pub struct Conv2d {
    /// 卷积核参数 [kH, kW, in_channels, out_channels]
    kernel: Var,
    /// 偏置参数 [out_channels]（可选）
    bias: Option<Var>,
    kernel_size: usize,
    stride: usize,
    padding: PaddingMode,
}

impl Conv2d {
    /// 创建新的 Conv2d 层，卷积核按N(0, 0.02)初始化，偏置为零
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        graph: &Graph,
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: PaddingMode,
        use_bias: bool,
        name: &str,
    ) -> Result<Self, GraphError> {
        let kernel = graph.parameter(
            &[kernel_size, kernel_size, in_channels, out_channels],
            WEIGHT_INIT,
            &format!("{name}/kernel"),
        )?;
        let bias = if use_bias {
            Some(graph.parameter(&[out_channels], Init::Zeros, &format!("{name}/bias"))?)
        } else {
            None
        };

        Ok(Self {
            kernel,
            bias,
            kernel_size,
            stride,
            padding,
        })
    }

    pub fn forward(&self, x: &Var) -> Result<Var, GraphError> {
        let padding = match self.padding {
            PaddingMode::Explicit(p) => p,
            PaddingMode::Same => {
                let shape = x.value_expected_shape()?;
                if shape.len() != 4 {
                    return Err(GraphError::DimensionMismatch {
                        expected: 4,
                        got: shape.len(),
                        message: "Conv2d 输入必须是 [batch, H, W, C]".to_string(),
                    });
                }
                let k = (self.kernel_size, self.kernel_size);
                Padding::same(shape[1], shape[2], k, self.stride)
            }
        };

        let out = x.conv2d(&self.kernel, self.stride, padding)?;
        match &self.bias {
            Some(bias) => out.bias_add(bias),
            None => Ok(out),
        }
    }

    pub const fn kernel(&self) -> &Var {
        &self.kernel
    }
}

impl Module for Conv2d {
    fn parameters(&self) -> Vec<Var> {
        let mut params = vec![self.kernel.clone()];
        params.extend(self.bias.clone());
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conv2d_layer_shapes_and_params() {
        let graph = Graph::new_with_seed(1);
        let x = graph.input_shape(&[2, 16, 16, 3], Some("x")).unwrap();
        let conv = Conv2d::new(&graph, 3, 8, 4, 2, PaddingMode::Same, false, "enc").unwrap();
        let y = conv.forward(&x).unwrap();
        assert_eq!(y.value_expected_shape().unwrap(), vec![2, 8, 8, 8]);
        assert_eq!(conv.num_params(), 1);
        assert_eq!(conv.kernel().name().unwrap(), "enc/kernel");

        let with_bias = Conv2d::new(
            &graph,
            8,
            1,
            4,
            1,
            PaddingMode::Explicit(Padding::uniform(1)),
            true,
            "last",
        )
        .unwrap();
        let z = with_bias.forward(&y).unwrap();
        assert_eq!(z.value_expected_shape().unwrap(), vec![2, 7, 7, 1]);
        assert_eq!(with_bias.num_params(), 2);
    }

    #[test]
    fn test_conv2d_kernel_init_std() {
        let graph = Graph::new_with_seed(2);
        let conv = Conv2d::new(&graph, 16, 32, 4, 2, PaddingMode::Same, false, "c").unwrap();
        let k = conv.kernel().value().unwrap().unwrap();
        let mean = k.mean();
        let std = (k.map(|v| (v - mean) * (v - mean)).mean()).sqrt();
        assert!(mean.abs() < 0.002, "mean={mean}");
        assert!((std - 0.02).abs() < 0.002, "std={std}");
    }
}
