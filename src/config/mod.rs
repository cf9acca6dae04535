/*
 * @Description  : 模型配置与类别数
 *
 * `ModelConfig` 对应训练脚本的超参数；`ClassCounts` 是风格/字符的类别数，
 * 在进程启动时从字体目录和标签清单各算一次，之后作为不可变记录传给模型构建。
 * 训练与推理必须使用同一份 `ClassCounts`，否则标签张量宽度对不上。
 */

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读写配置失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("解析配置失败: {0}")]
    Json(#[from] serde_json::Error),
    #[error("配置无效: {0}")]
    Invalid(String),
}

/// 模型超参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// 生成器基础通道数
    pub ngf: usize,
    /// 判别器基础通道数
    pub ndf: usize,
    /// Adam 学习率
    pub lr: f32,
    /// Adam 一阶矩衰减
    pub beta1: f32,
    pub gan_weight: f32,
    pub l1_weight: f32,
    pub classification_penalty: f32,
    /// 参数初始化与Dropout的随机种子
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            ngf: 64,
            ndf: 64,
            lr: 0.0002,
            beta1: 0.5,
            gan_weight: 1.0,
            l1_weight: 100.0,
            classification_penalty: 1.0,
            seed: 42,
        }
    }
}

impl ModelConfig {
    /// 从 JSON 文件读取，缺省字段取默认值，读完即校验
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ngf == 0 || self.ndf == 0 {
            return Err(ConfigError::Invalid(format!(
                "ngf/ndf 必须大于0，但得到 ngf={}，ndf={}",
                self.ngf, self.ndf
            )));
        }
        if !(self.lr.is_finite() && self.lr > 0.0) {
            return Err(ConfigError::Invalid(format!("lr 必须是正数，但得到 {}", self.lr)));
        }
        if !(0.0..1.0).contains(&self.beta1) {
            return Err(ConfigError::Invalid(format!(
                "beta1 必须在[0, 1)内，但得到 {}",
                self.beta1
            )));
        }
        for (name, weight) in [
            ("gan_weight", self.gan_weight),
            ("l1_weight", self.l1_weight),
            ("classification_penalty", self.classification_penalty),
        ] {
            if !(weight.is_finite() && weight >= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} 必须是非负数，但得到 {weight}"
                )));
            }
        }
        Ok(())
    }
}

/// 风格类别数与字符类别数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    pub styles: usize,
    pub characters: usize,
}

impl ClassCounts {
    pub fn new(styles: usize, characters: usize) -> Result<Self, ConfigError> {
        if styles == 0 || characters == 0 {
            return Err(ConfigError::Invalid(format!(
                "类别数必须大于0，但得到 styles={styles}，characters={characters}"
            )));
        }
        Ok(Self { styles, characters })
    }

    /// 风格数 = `font_dir` 下（不递归）`*.ttf` 文件的个数；
    /// 字符数 = UTF-8 标签清单的行数
    pub fn discover<P: AsRef<Path>, Q: AsRef<Path>>(
        font_dir: P,
        label_file: Q,
    ) -> Result<Self, ConfigError> {
        let styles = count_fonts(font_dir.as_ref())?;
        let characters = fs::read_to_string(label_file.as_ref())?.lines().count();
        log::info!("发现{styles}种字体风格、{characters}个字符类别");
        Self::new(styles, characters)
    }
}

/// 以`.`开头的隐藏文件不计入，扩展名区分大小写
fn count_fonts(font_dir: &Path) -> Result<usize, ConfigError> {
    let mut count = 0;
    for entry in fs::read_dir(font_dir)? {
        let entry = entry?;
        // 跟随符号链接
        if !entry.path().is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with('.') && name.ends_with(".ttf") {
            count += 1;
        }
    }
    Ok(count)
}
