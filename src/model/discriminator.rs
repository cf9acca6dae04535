/*
 * @Description  : PatchGAN 判别器 + 风格/字符两个分类头
 *
 * layer_1: [B, 256, 256, 2C] → [B, 128, 128, ndf]
 * layer_2: → [B, 64, 64, 2ndf]
 * layer_3: → [B, 32, 32, 4ndf]
 * layer_4: → [B, 31, 31, 8ndf]（步长1）
 * layer_5: → [B, 30, 30, 1]，sigmoid
 * layer_fc_s / layer_fc_c: 展平的 30x30 图 → 风格 / 字符 logits
 *
 * 参数在 `new` 中一次性创建；对真、假两组输入各调用一次 `forward` 即共享同一组参数。
 */

use super::{IMAGE_SIZE, KERNEL_SIZE, LEAKY_SLOPE};
use crate::config::{ClassCounts, ModelConfig};
use crate::nn::{
    BatchNorm, Conv2d, Graph, GraphError, Linear, Module, Padding, PaddingMode, Var,
    VarActivationOps, VarShapeOps,
};

/// layer_2..layer_4 的层数
const N_LAYERS: usize = 3;
const DISCRIMINATOR_PADDING: Padding = Padding::uniform(1);

/// 判别器一次调用的三路输出
pub struct DiscriminatorOutput {
    /// [B, 30, 30, 1]，取值 [0, 1]
    pub patch: Var,
    /// [B, S]
    pub styl_logits: Var,
    /// [B, Ch]
    pub char_logits: Var,
}

struct DiscriminatorStage {
    conv: Conv2d,
    norm: Option<BatchNorm>,
}

pub struct Discriminator {
    stages: Vec<DiscriminatorStage>,
    last: Conv2d,
    fc_styl: Linear,
    fc_char: Linear,
    patch_size: usize,
}

/// 各卷积级（含 layer_5）的步长
fn strides() -> impl Iterator<Item = usize> {
    std::iter::once(2)
        .chain((0..N_LAYERS).map(|i| if i == N_LAYERS - 1 { 1 } else { 2 }))
        .chain(std::iter::once(1))
}

/// 输入边长为 `image_size` 时输出 patch 图的边长（256 → 30）
pub fn patch_size(image_size: usize) -> Result<usize, GraphError> {
    let pad = DISCRIMINATOR_PADDING.top + DISCRIMINATOR_PADDING.bottom;
    strides().try_fold(image_size, |size, stride| {
        (size + pad)
            .checked_sub(KERNEL_SIZE)
            .map(|valid| valid / stride + 1)
            .ok_or_else(|| {
                GraphError::InvalidOperation(format!(
                    "判别器输入边长{image_size}过小，无法容纳{KERNEL_SIZE}x{KERNEL_SIZE}卷积核"
                ))
            })
    })
}

impl Discriminator {
    /// `in_channels` 为单张图像的通道数，判别器实际输入是两张图按通道拼接
    pub fn new(
        graph: &Graph,
        in_channels: usize,
        counts: &ClassCounts,
        config: &ModelConfig,
    ) -> Result<Self, GraphError> {
        let ndf = config.ndf;
        let padding = PaddingMode::Explicit(DISCRIMINATOR_PADDING);
        let mut stride_iter = strides();
        let mut next_stride = || {
            stride_iter.next().ok_or_else(|| {
                GraphError::InvalidOperation("判别器层数与步长表不一致".to_string())
            })
        };

        let mut stages = Vec::with_capacity(N_LAYERS + 1);
        stages.push(DiscriminatorStage {
            conv: Conv2d::new(
                graph,
                in_channels * 2,
                ndf,
                KERNEL_SIZE,
                next_stride()?,
                padding,
                false,
                "discriminator/layer_1/conv",
            )?,
            norm: None,
        });

        let mut channels = ndf;
        for i in 0..N_LAYERS {
            let scope = format!("discriminator/layer_{}", stages.len() + 1);
            let out = ndf * (1usize << (i + 1)).min(8);
            let conv = Conv2d::new(
                graph,
                channels,
                out,
                KERNEL_SIZE,
                next_stride()?,
                padding,
                false,
                &format!("{scope}/conv"),
            )?;
            let norm = BatchNorm::new(graph, out, &format!("{scope}/batchnorm"))?;
            stages.push(DiscriminatorStage {
                conv,
                norm: Some(norm),
            });
            channels = out;
        }

        let last = Conv2d::new(
            graph,
            channels,
            1,
            KERNEL_SIZE,
            next_stride()?,
            padding,
            true,
            &format!("discriminator/layer_{}/conv", stages.len() + 1),
        )?;

        let patch_size = patch_size(IMAGE_SIZE)?;
        let flat = patch_size * patch_size;
        let fc_styl = Linear::new(graph, flat, counts.styles, "discriminator/layer_fc_s/dense")?;
        let fc_char = Linear::new(graph, flat, counts.characters, "discriminator/layer_fc_c/dense")?;

        Ok(Self {
            stages,
            last,
            fc_styl,
            fc_char,
            patch_size,
        })
    }

    /// 判别 (inputs, targets) 这一对图像
    pub fn forward(&self, inputs: &Var, targets: &Var) -> Result<DiscriminatorOutput, GraphError> {
        let batch = *inputs
            .value_expected_shape()?
            .first()
            .ok_or_else(|| GraphError::InvalidOperation("判别器输入不能是0维".to_string()))?;

        let mut x = inputs.concat(&[targets])?;
        for stage in &self.stages {
            let convolved = stage.conv.forward(&x)?;
            let normalized = match &stage.norm {
                Some(norm) => norm.forward(&convolved)?,
                None => convolved,
            };
            x = normalized.leaky_relu(LEAKY_SLOPE)?;
        }
        let patch = self.last.forward(&x)?.sigmoid()?;

        let flat = patch.reshape(&[batch, self.patch_size * self.patch_size])?;
        let styl_logits = self.fc_styl.forward(&flat)?;
        let char_logits = self.fc_char.forward(&flat)?;

        Ok(DiscriminatorOutput {
            patch,
            styl_logits,
            char_logits,
        })
    }

    pub const fn patch_size(&self) -> usize {
        self.patch_size
    }
}

impl Module for Discriminator {
    fn parameters(&self) -> Vec<Var> {
        let mut params = Vec::new();
        for stage in &self.stages {
            params.extend(stage.conv.parameters());
            if let Some(norm) = &stage.norm {
                params.extend(norm.parameters());
            }
        }
        params.extend(self.last.parameters());
        params.extend(self.fc_styl.parameters());
        params.extend(self.fc_char.parameters());
        params
    }
}
