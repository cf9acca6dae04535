/*
 * @Description  : 字体到骨架（F2S）条件GAN：U-Net生成器 + PatchGAN判别器
 */

mod discriminator;
mod f2s;
mod generator;

pub use discriminator::{Discriminator, DiscriminatorOutput, patch_size};
pub use f2s::{
    F2sBatch, F2sModel, GradAndVar, GradsAndVars, LossSummary, ModelOutput, create_model,
};
pub use generator::Generator;

/// 图像边长：编码器7次减半后恰为 1x1
pub const IMAGE_SIZE: usize = 256;
/// 7 次减半要求边长能被 2^7 整除
pub const SIZE_DIVISOR: usize = 128;
/// 所有卷积/反卷积的核大小
pub const KERNEL_SIZE: usize = 4;
/// LeakyReLU 负半轴斜率
pub const LEAKY_SLOPE: f32 = 0.2;
