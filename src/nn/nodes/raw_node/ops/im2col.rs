/*
 * @Description  : 卷积/反卷积共用的im2col、col2im与填充计算（NHWC布局）
 *
 * 约定：`ConvGeometry`总是描述“正向卷积”的几何关系：`in_*`为较大的一侧（卷积输入），
 * `out_*`为较小的一侧（卷积输出）。反卷积正好是同一几何关系的伴随运算。
 *
 * im2col 后的列矩阵形状为[out_h * out_w, kernel_h * kernel_w * channels]，
 * 列下标 = (ki * kernel_w + kj) * channels + c，恰好与HWIO卷积核按行优先展平后的行下标一致。
 */

use crate::nn::GraphError;
use ndarray::{Array2, ArrayView2};

/// 四边填充量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Padding {
    pub top: usize,
    pub bottom: usize,
    pub left: usize,
    pub right: usize,
}

impl Padding {
    /// 四边等量填充
    pub const fn uniform(pad: usize) -> Self {
        Self {
            top: pad,
            bottom: pad,
            left: pad,
            right: pad,
        }
    }

    /// TF "SAME" 规则下的填充（见[`same_padding`]）
    pub fn same(height: usize, width: usize, kernel: (usize, usize), stride: usize) -> Self {
        let (top, bottom) = same_padding(height, kernel.0, stride);
        let (left, right) = same_padding(width, kernel.1, stride);
        Self {
            top,
            bottom,
            left,
            right,
        }
    }
}

/// TF "SAME" 填充：输出长度为`ceil(size / stride)`，
/// 总填充`max((out - 1) * stride + kernel - size, 0)`，多出的一格补在末尾。
pub fn same_padding(size: usize, kernel: usize, stride: usize) -> (usize, usize) {
    let out = size.div_ceil(stride);
    let total = ((out - 1) * stride + kernel).saturating_sub(size);
    (total / 2, total - total / 2)
}

/// 正向卷积的几何关系
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(in crate::nn) struct ConvGeometry {
    pub in_h: usize,
    pub in_w: usize,
    pub channels: usize,
    pub kernel_h: usize,
    pub kernel_w: usize,
    pub stride: usize,
    pub padding: Padding,
    pub out_h: usize,
    pub out_w: usize,
}

impl ConvGeometry {
    /// 由输入尺寸推出输出尺寸
    pub(in crate::nn) fn from_input(
        in_h: usize,
        in_w: usize,
        channels: usize,
        kernel: (usize, usize),
        stride: usize,
        padding: Padding,
    ) -> Result<Self, GraphError> {
        let padded_h = in_h + padding.top + padding.bottom;
        let padded_w = in_w + padding.left + padding.right;
        if stride == 0 || padded_h < kernel.0 || padded_w < kernel.1 {
            return Err(GraphError::InvalidOperation(format!(
                "卷积尺寸无效：输入{in_h}x{in_w}，核{kernel:?}，步长{stride}，填充{padding:?}"
            )));
        }
        Ok(Self {
            in_h,
            in_w,
            channels,
            kernel_h: kernel.0,
            kernel_w: kernel.1,
            stride,
            padding,
            out_h: (padded_h - kernel.0) / stride + 1,
            out_w: (padded_w - kernel.1) / stride + 1,
        })
    }

    /// 由卷积输出尺寸反推输入尺寸（反卷积用）：`in = (out - 1) * stride + kernel - pad`
    pub(in crate::nn) fn from_output(
        out_h: usize,
        out_w: usize,
        channels: usize,
        kernel: (usize, usize),
        stride: usize,
        padding: Padding,
    ) -> Result<Self, GraphError> {
        let invalid = || {
            GraphError::InvalidOperation(format!(
                "反卷积尺寸无效：输入{out_h}x{out_w}，核{kernel:?}，步长{stride}，填充{padding:?}"
            ))
        };
        if stride == 0 || out_h == 0 || out_w == 0 {
            return Err(invalid());
        }
        let full_h = (out_h - 1) * stride + kernel.0;
        let full_w = (out_w - 1) * stride + kernel.1;
        let pad_h = padding.top + padding.bottom;
        let pad_w = padding.left + padding.right;
        if full_h <= pad_h || full_w <= pad_w {
            return Err(invalid());
        }
        Ok(Self {
            in_h: full_h - pad_h,
            in_w: full_w - pad_w,
            channels,
            kernel_h: kernel.0,
            kernel_w: kernel.1,
            stride,
            padding,
            out_h,
            out_w,
        })
    }

    pub(in crate::nn) const fn patch_len(&self) -> usize {
        self.kernel_h * self.kernel_w * self.channels
    }

    /// 输出位置(oh, ow)在核偏移(ki, kj)处对应的输入坐标；落在填充区则为None
    #[inline]
    fn input_coord(&self, oh: usize, ow: usize, ki: usize, kj: usize) -> Option<(usize, usize)> {
        let h = (oh * self.stride + ki).checked_sub(self.padding.top)?;
        let w = (ow * self.stride + kj).checked_sub(self.padding.left)?;
        (h < self.in_h && w < self.in_w).then_some((h, w))
    }
}

/// 把一段行优先的连续数据看作[rows, cols]矩阵
pub(in crate::nn) fn as_matrix(data: &[f32], rows: usize, cols: usize) -> Result<ArrayView2<'_, f32>, GraphError> {
    ArrayView2::from_shape((rows, cols), data).map_err(|e| {
        GraphError::ComputationError(format!(
            "无法将长度{}的数据视为{rows}x{cols}矩阵：{e}",
            data.len()
        ))
    })
}

/// 单个样本的im2col：`image`为行优先的[in_h, in_w, channels]
pub(in crate::nn) fn im2col(image: &[f32], geo: &ConvGeometry) -> Result<Array2<f32>, GraphError> {
    let c = geo.channels;
    let patch_len = geo.patch_len();
    let mut cols = vec![0.0f32; geo.out_h * geo.out_w * patch_len];

    for oh in 0..geo.out_h {
        for ow in 0..geo.out_w {
            let row_start = (oh * geo.out_w + ow) * patch_len;
            for ki in 0..geo.kernel_h {
                for kj in 0..geo.kernel_w {
                    if let Some((h, w)) = geo.input_coord(oh, ow, ki, kj) {
                        let src = (h * geo.in_w + w) * c;
                        let dst = row_start + (ki * geo.kernel_w + kj) * c;
                        cols[dst..dst + c].copy_from_slice(&image[src..src + c]);
                    }
                }
            }
        }
    }

    Array2::from_shape_vec((geo.out_h * geo.out_w, patch_len), cols)
        .map_err(|e| GraphError::ComputationError(format!("im2col失败：{e}")))
}

/// 单个样本的col2im：把列矩阵按卷积几何累加回行优先的[in_h, in_w, channels]
pub(in crate::nn) fn col2im(cols: ArrayView2<f32>, geo: &ConvGeometry) -> Vec<f32> {
    let c = geo.channels;
    let mut image = vec![0.0f32; geo.in_h * geo.in_w * c];

    for oh in 0..geo.out_h {
        for ow in 0..geo.out_w {
            let row = cols.row(oh * geo.out_w + ow);
            for ki in 0..geo.kernel_h {
                for kj in 0..geo.kernel_w {
                    if let Some((h, w)) = geo.input_coord(oh, ow, ki, kj) {
                        let dst = (h * geo.in_w + w) * c;
                        let src = (ki * geo.kernel_w + kj) * c;
                        for ch in 0..c {
                            image[dst + ch] += row[src + ch];
                        }
                    }
                }
            }
        }
    }

    image
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_padding_matches_tf_rule() {
        // 偶数长度、k=4、s=2：两侧各填1
        assert_eq!(same_padding(256, 4, 2), (1, 1));
        assert_eq!(same_padding(2, 4, 2), (1, 1));
        // 长度1：输出仍为1，总填充3，末尾多1
        assert_eq!(same_padding(1, 4, 2), (1, 2));
        // 反卷积由2n反推n时同样是两侧各1
        assert_eq!(same_padding(512, 4, 2), (1, 1));
    }

    #[test]
    fn test_geometry_halving_and_patchgan_sizes() {
        let g = ConvGeometry::from_input(256, 256, 3, (4, 4), 2, Padding::same(256, 256, (4, 4), 2))
            .unwrap();
        assert_eq!((g.out_h, g.out_w), (128, 128));

        // PatchGAN：32 -> 31 -> 30（stride 1，四周各填1）
        let g = ConvGeometry::from_input(32, 32, 8, (4, 4), 1, Padding::uniform(1)).unwrap();
        assert_eq!((g.out_h, g.out_w), (31, 31));
        let g = ConvGeometry::from_input(31, 31, 8, (4, 4), 1, Padding::uniform(1)).unwrap();
        assert_eq!((g.out_h, g.out_w), (30, 30));
    }

    #[test]
    fn test_geometry_from_output_inverts_from_input() {
        let g = ConvGeometry::from_output(64, 64, 5, (4, 4), 2, Padding::uniform(1)).unwrap();
        assert_eq!((g.in_h, g.in_w), (128, 128));
        let back = ConvGeometry::from_input(128, 128, 5, (4, 4), 2, Padding::uniform(1)).unwrap();
        assert_eq!(back, g);
    }

    #[test]
    fn test_col2im_is_adjoint_of_im2col() {
        // <im2col(x), y> == <x, col2im(y)>
        let geo = ConvGeometry::from_input(5, 4, 2, (3, 2), 2, Padding::uniform(1)).unwrap();
        let x: Vec<f32> = (0..geo.in_h * geo.in_w * 2).map(|i| (i as f32 * 0.37).sin()).collect();
        let cols = im2col(&x, &geo).unwrap();
        let y = Array2::from_shape_fn(cols.raw_dim(), |(i, j)| ((i * 7 + j) as f32 * 0.11).cos());

        let lhs: f32 = cols.iter().zip(y.iter()).map(|(a, b)| a * b).sum();
        let back = col2im(y.view(), &geo);
        let rhs: f32 = x.iter().zip(back.iter()).map(|(a, b)| a * b).sum();
        approx::assert_abs_diff_eq!(lhs, rhs, epsilon = 1e-4);
    }
}
