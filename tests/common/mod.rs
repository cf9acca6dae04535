/*
 * @Description  : 集成测试共用的小模型与数据
 */

#![allow(dead_code)]

use f2s_gan::config::{ClassCounts, ModelConfig};
use f2s_gan::model::F2sBatch;
use f2s_gan::tensor::Tensor;
use rand::SeedableRng;
use rand::rngs::StdRng;

pub const STYLES: usize = 3;
pub const CHARACTERS: usize = 5;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 通道数很小的配置，256x256 的尺寸不变
pub fn tiny_config() -> ModelConfig {
    ModelConfig {
        ngf: 2,
        ndf: 2,
        seed: 7,
        ..ModelConfig::default()
    }
}

pub fn counts() -> ClassCounts {
    ClassCounts {
        styles: STYLES,
        characters: CHARACTERS,
    }
}

/// 第 i 个样本的风格/字符都是 i % 类别数
fn one_hot(batch: usize, classes: usize) -> Tensor {
    let mut data = vec![0.0; batch * classes];
    for i in 0..batch {
        data[i * classes + i % classes] = 1.0;
    }
    Tensor::from_vec(data, &[batch, classes])
}

/// 随机图像，取值 [-1, 1]
pub fn random_batch(batch: usize, seed: u64) -> F2sBatch {
    let mut rng = StdRng::seed_from_u64(seed);
    F2sBatch {
        trg_font: Tensor::uniform_with_rng(-1.0, 1.0, &[batch, 256, 256, 1], &mut rng),
        trg_skeleton: Tensor::uniform_with_rng(-1.0, 1.0, &[batch, 256, 256, 1], &mut rng),
        style_labels: one_hot(batch, STYLES),
        char_labels: one_hot(batch, CHARACTERS),
    }
}

/// 全零图像、类别0的单样本批次
pub fn zero_batch(counts: &ClassCounts) -> F2sBatch {
    F2sBatch {
        trg_font: Tensor::zeros(&[1, 256, 256, 1]),
        trg_skeleton: Tensor::zeros(&[1, 256, 256, 1]),
        style_labels: one_hot(1, counts.styles),
        char_labels: one_hot(1, counts.characters),
    }
}
