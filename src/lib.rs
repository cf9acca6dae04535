//! # F2S GAN
//!
//! 用纯rust实现的字体到骨架（font-to-skeleton）条件GAN：
//! - `tensor`：基于`ndarray`的f32张量；
//! - `nn`：动态计算图（`Graph`/`Var`）、卷积/反卷积/批归一化等节点与层、Adam优化器、滑动平均；
//! - `config`：超参数与风格/字符类别数；
//! - `model`：U-Net生成器、带风格/字符分类头的PatchGAN判别器，以及两阶段更新的训练步。
//!
//! 所有图像张量均为NHWC布局：`[batch, height, width, channels]`。

pub mod config;
pub mod errors;
pub mod model;
pub mod nn;
pub mod tensor;
pub mod utils;
