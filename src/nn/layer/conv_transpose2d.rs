/*
 * @Description  : ConvTranspose2d (2D 转置卷积) 层，解码器上采样用
 *
 * 输入/输出形状（NHWC）：
 * - 输入：[batch_size, H, W, in_channels]
 * - 输出：[batch_size, H * stride, W * stride, out_channels]（SAME 填充时）
 */

use super::{PaddingMode, WEIGHT_INIT};
use crate::nn::{Graph, GraphError, Module, Padding, Var, VarMatrixOps};

pub struct ConvTranspose2d {
    /// 卷积核参数 [kH, kW, out_channels, in_channels]
    kernel: Var,
    kernel_size: usize,
    stride: usize,
    padding: PaddingMode,
}

impl ConvTranspose2d {
    /// 创建新的 ConvTranspose2d 层（无偏置），卷积核按N(0, 0.02)初始化
    pub fn new(
        graph: &Graph,
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: PaddingMode,
        name: &str,
    ) -> Result<Self, GraphError> {
        let kernel = graph.parameter(
            &[kernel_size, kernel_size, out_channels, in_channels],
            WEIGHT_INIT,
            &format!("{name}/kernel"),
        )?;
        Ok(Self {
            kernel,
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
                        message: "ConvTranspose2d 输入必须是 [batch, H, W, C]".to_string(),
                    });
                }
                // 按“输出 = 输入 * 步长”反推正向卷积的SAME填充
                let k = (self.kernel_size, self.kernel_size);
                Padding::same(shape[1] * self.stride, shape[2] * self.stride, k, self.stride)
            }
        };
        x.conv_transpose2d(&self.kernel, self.stride, padding)
    }
}

impl Module for ConvTranspose2d {
    fn parameters(&self) -> Vec<Var> {
        vec![self.kernel.clone()]
    }
}
