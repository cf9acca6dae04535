/*
 * @Description  : 标量的指数滑动平均（只用于日志上报，不参与梯度计算）
 *
 * shadow = decay * shadow + (1 - decay) * raw；某个名字第一次出现时 shadow 直接取 raw。
 */

use std::collections::HashMap;

pub const DEFAULT_EMA_DECAY: f32 = 0.99;

#[derive(Debug, Clone)]
pub struct ExponentialMovingAverage {
    decay: f32,
    shadow: HashMap<String, f32>,
}

impl ExponentialMovingAverage {
    /// `decay` 须在 [0, 1) 内，超出时回退到默认值 0.99
    pub fn new(decay: f32) -> Self {
        let decay = if (0.0..1.0).contains(&decay) {
            decay
        } else {
            log::warn!("EMA衰减系数{decay}不在[0, 1)内，改用{DEFAULT_EMA_DECAY}");
            DEFAULT_EMA_DECAY
        };
        Self {
            decay,
            shadow: HashMap::new(),
        }
    }

    pub const fn decay(&self) -> f32 {
        self.decay
    }

    /// 用一组原始值更新对应的滑动平均
    pub fn apply(&mut self, values: &[(&str, f32)]) {
        for &(name, raw) in values {
            let decay = self.decay;
            self.shadow
                .entry(name.to_string())
                .and_modify(|s| *s = decay * *s + (1.0 - decay) * raw)
                .or_insert(raw);
        }
    }

    pub fn average(&self, name: &str) -> Option<f32> {
        self.shadow.get(name).copied()
    }
}

impl Default for ExponentialMovingAverage {
    fn default() -> Self {
        Self::new(DEFAULT_EMA_DECAY)
    }
}
