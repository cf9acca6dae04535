/*
 * @Description  : F2S 模型组装、损失与两阶段更新
 *
 * 一次 `train()` 依次执行：
 * 1. 判别器损失前向 + 反向（只到判别器参数）+ Adam 更新；
 * 2. 在更新后的判别器上重新计算生成器损失，反向（只到生成器参数）+ Adam 更新；
 * 3. 用本步的原始损失更新滑动平均；
 * 4. global_step 加一。
 */

use super::{Discriminator, Generator, IMAGE_SIZE, SIZE_DIVISOR};
use crate::config::{ClassCounts, ModelConfig};
use crate::nn::{
    Adam, ExponentialMovingAverage, Graph, GraphError, Module, Optimizer, Var, VarLossOps,
};
use crate::tensor::Tensor;

const DISC_REAL_LOSS: &str = "disc_real_loss";
const DISC_FAKE_LOSS: &str = "disc_fake_loss";
const DISC_STYL_LOSS: &str = "disc_loss_real_styl";
const DISC_CHAR_LOSS: &str = "disc_loss_real_char";
const GEN_GAN_LOSS: &str = "gen_loss_gan";
const GEN_L1_LOSS: &str = "gen_loss_l1";

/// 一批训练数据
#[derive(Debug, Clone)]
pub struct F2sBatch {
    /// 源字体图像 [B, 256, 256, C]
    pub trg_font: Tensor,
    /// 目标骨架图像 [B, 256, 256, C]
    pub trg_skeleton: Tensor,
    /// 风格标签 [B, S]
    pub style_labels: Tensor,
    /// 字符标签 [B, Ch]
    pub char_labels: Tensor,
}

impl F2sBatch {
    /// 检查形状，标签宽度必须与类别数一致
    pub fn validate(&self, counts: &ClassCounts) -> Result<(), GraphError> {
        let font = self.trg_font.shape();
        let skeleton = self.trg_skeleton.shape();
        if font.len() != 4 {
            return Err(GraphError::DimensionMismatch {
                expected: 4,
                got: font.len(),
                message: "源图像必须是 [batch, height, width, channels]".to_string(),
            });
        }
        if font != skeleton {
            return Err(GraphError::ShapeMismatch {
                expected: font.to_vec(),
                got: skeleton.to_vec(),
                message: "目标图像须与源图像形状一致".to_string(),
            });
        }
        let (batch, height, width) = (font[0], font[1], font[2]);
        if height % SIZE_DIVISOR != 0 || width % SIZE_DIVISOR != 0 {
            return Err(GraphError::InvalidOperation(format!(
                "图像边长须能被{SIZE_DIVISOR}整除，但得到 {height}x{width}"
            )));
        }
        if height != IMAGE_SIZE || width != IMAGE_SIZE {
            return Err(GraphError::InvalidOperation(format!(
                "图像须为 {IMAGE_SIZE}x{IMAGE_SIZE}，编码器才能恰好缩到 1x1，但得到 {height}x{width}"
            )));
        }

        for (labels, width, what) in [
            (&self.style_labels, counts.styles, "风格"),
            (&self.char_labels, counts.characters, "字符"),
        ] {
            let expected = [batch, width];
            if labels.shape() != expected.as_slice() {
                return Err(GraphError::ShapeMismatch {
                    expected: expected.to_vec(),
                    got: labels.shape().to_vec(),
                    message: format!("{what}标签须为 [batch, {what}类别数]"),
                });
            }
        }
        Ok(())
    }
}

/// 六个可上报的标量损失
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LossSummary {
    pub disc_real_loss: f32,
    pub disc_fake_loss: f32,
    pub disc_loss_real_styl: f32,
    pub disc_loss_real_char: f32,
    pub gen_loss_gan: f32,
    pub gen_loss_l1: f32,
}

impl LossSummary {
    fn named(&self) -> [(&'static str, f32); 6] {
        [
            (DISC_REAL_LOSS, self.disc_real_loss),
            (DISC_FAKE_LOSS, self.disc_fake_loss),
            (DISC_STYL_LOSS, self.disc_loss_real_styl),
            (DISC_CHAR_LOSS, self.disc_loss_real_char),
            (GEN_GAN_LOSS, self.gen_loss_gan),
            (GEN_L1_LOSS, self.gen_loss_l1),
        ]
    }

    /// 任一项尚未初始化时返回 None
    fn from_ema(ema: &ExponentialMovingAverage) -> Option<Self> {
        Some(Self {
            disc_real_loss: ema.average(DISC_REAL_LOSS)?,
            disc_fake_loss: ema.average(DISC_FAKE_LOSS)?,
            disc_loss_real_styl: ema.average(DISC_STYL_LOSS)?,
            disc_loss_real_char: ema.average(DISC_CHAR_LOSS)?,
            gen_loss_gan: ema.average(GEN_GAN_LOSS)?,
            gen_loss_l1: ema.average(GEN_L1_LOSS)?,
        })
    }

    pub fn is_all_finite(&self) -> bool {
        self.named().iter().all(|(_, v)| v.is_finite())
    }
}

/// 单个参数在更新前的梯度与取值
#[derive(Debug, Clone)]
pub struct GradAndVar {
    pub name: String,
    pub grad: Tensor,
    pub value: Tensor,
}

/// 一组参数的梯度快照（用于梯度范数诊断）
#[derive(Debug, Clone, Default)]
pub struct GradsAndVars(Vec<GradAndVar>);

impl GradsAndVars {
    /// 读取参数当前的梯度与值；没有梯度的参数不收录
    fn capture(params: &[Var]) -> Result<Self, GraphError> {
        let mut pairs = Vec::with_capacity(params.len());
        for param in params {
            let Some(grad) = param.grad()? else {
                continue;
            };
            let value = param.value()?.ok_or_else(|| {
                GraphError::ComputationError(format!("参数{:?}没有值", param.node_id()))
            })?;
            pairs.push(GradAndVar {
                name: param.name()?,
                grad,
                value,
            });
        }
        Ok(Self(pairs))
    }

    /// 所有梯度拼在一起的 L2 范数
    pub fn global_norm(&self) -> f32 {
        self.0
            .iter()
            .map(|pair| {
                let n = pair.grad.norm_l2();
                n * n
            })
            .sum::<f32>()
            .sqrt()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GradAndVar> {
        self.0.iter()
    }
}

/// 模型对外的只读记录
#[derive(Debug, Clone)]
pub struct ModelOutput {
    /// 生成器输出 [B, 256, 256, C]，取值 [-1, 1]
    pub f2s_outputs: Tensor,
    /// 判别器对真实对的 patch 图 [B, 30, 30, 1]
    pub f2s_predict_real: Tensor,
    /// 判别器对生成对的 patch 图 [B, 30, 30, 1]
    pub f2s_predict_fake: Tensor,
    /// 滑动平均后的损失（尚未训练时等于当前损失）
    pub losses: LossSummary,
    /// 最近一步的原始损失（尚未训练时为当前批次的前向结果）
    pub raw_losses: LossSummary,
    pub discrim_grads_and_vars: GradsAndVars,
    pub gen_grads_and_vars: GradsAndVars,
    pub global_step: u64,
}

/// 图中的损失节点
struct Losses {
    disc_real: Var,
    disc_fake: Var,
    disc_styl: Var,
    disc_char: Var,
    discrim: Var,
    gen_gan: Var,
    gen_l1: Var,
    gen_total: Var,
}

/// 判别器阶段的原始损失
struct DiscriminatorStep {
    real: f32,
    fake: f32,
    styl: f32,
    chr: f32,
}

/// F2S 条件GAN
pub struct F2sModel {
    graph: Graph,
    config: ModelConfig,
    counts: ClassCounts,
    generator: Generator,
    discriminator: Discriminator,
    trg_font: Var,
    trg_skeleton: Var,
    style_labels: Var,
    char_labels: Var,
    f2s_outputs: Var,
    f2s_predict_real: Var,
    f2s_predict_fake: Var,
    losses: Losses,
    discrim_optimizer: Adam,
    gen_optimizer: Adam,
    ema: ExponentialMovingAverage,
    global_step: u64,
    last_raw_losses: Option<LossSummary>,
    discrim_grads_and_vars: GradsAndVars,
    gen_grads_and_vars: GradsAndVars,
}

/// 构建模型并喂入第一批数据
pub fn create_model(
    trg_font: &Tensor,
    trg_skeleton: &Tensor,
    style_labels: &Tensor,
    char_labels: &Tensor,
    config: &ModelConfig,
    counts: &ClassCounts,
) -> Result<F2sModel, GraphError> {
    F2sModel::new(
        &F2sBatch {
            trg_font: trg_font.clone(),
            trg_skeleton: trg_skeleton.clone(),
            style_labels: style_labels.clone(),
            char_labels: char_labels.clone(),
        },
        config,
        counts,
    )
}

impl F2sModel {
    pub fn new(
        batch: &F2sBatch,
        config: &ModelConfig,
        counts: &ClassCounts,
    ) -> Result<Self, GraphError> {
        config
            .validate()
            .map_err(|e| GraphError::InvalidOperation(e.to_string()))?;
        batch.validate(counts)?;

        let graph = Graph::new_with_seed(config.seed);
        let image_shape = batch.trg_font.shape();
        let channels = image_shape[3];

        let trg_font = graph.input_named(&batch.trg_font, "f2s/trg_font")?;
        let trg_skeleton = graph.input_named(&batch.trg_skeleton, "f2s/trg_skeleton")?;
        let style_labels = graph.input_named(&batch.style_labels, "f2s/style_labels")?;
        let char_labels = graph.input_named(&batch.char_labels, "f2s/char_labels")?;

        // 输出通道数取自目标图像
        let out_channels = batch.trg_skeleton.shape()[3];
        let generator = Generator::new(&graph, channels, out_channels, counts, config)?;
        let discriminator = Discriminator::new(&graph, channels, counts, config)?;

        let f2s_outputs = generator.forward(&trg_font, &style_labels, &char_labels)?;
        let real = discriminator.forward(&trg_font, &trg_skeleton)?;
        // 生成对的分类 logits 不参与任何损失
        let fake = discriminator.forward(&trg_font, &f2s_outputs)?;

        let patch_shape = real.patch.value_expected_shape()?;
        let ones = graph.input_named(&Tensor::ones(&patch_shape), "f2s/ones_like_patch")?;
        let zeros = graph.input_named(&Tensor::zeros(&patch_shape), "f2s/zeros_like_patch")?;

        // 与原模型一致：交叉熵作用在已经过 sigmoid 的 patch 图上
        let disc_real = real.patch.sigmoid_cross_entropy(&ones)?;
        let disc_fake = fake.patch.sigmoid_cross_entropy(&zeros)?;
        let disc_styl = real.styl_logits.sigmoid_cross_entropy(&style_labels)?;
        let disc_char = real.char_logits.sigmoid_cross_entropy(&char_labels)?;
        let discrim = disc_real.try_add(&disc_fake)?.try_add(
            &disc_styl
                .try_add(&disc_char)?
                .scale(config.classification_penalty)?,
        )?;

        let gen_gan = fake.patch.sigmoid_cross_entropy(&ones)?;
        let gen_l1 = f2s_outputs.l1_loss(&trg_skeleton)?;
        let gen_total = gen_gan
            .scale(config.gan_weight)?
            .try_add(&gen_l1.scale(config.l1_weight)?)?;

        let discrim_optimizer = Adam::new(
            &graph,
            &graph.parameters_with_prefix("discriminator"),
            config.lr,
            config.beta1,
        )?;
        let gen_optimizer = Adam::new(
            &graph,
            &graph.parameters_with_prefix("generator"),
            config.lr,
            config.beta1,
        )?;

        log::info!(
            "F2S模型构建完成：生成器{}个参数张量，判别器{}个参数张量，{}，图中共{}个节点",
            generator.num_params(),
            discriminator.num_params(),
            graph.describe(&["generator", "discriminator"]),
            graph.nodes_count()
        );
        log::debug!("生成器参数：\n{}", graph.inner().summary_string("generator"));
        log::debug!("判别器参数：\n{}", graph.inner().summary_string("discriminator"));

        Ok(Self {
            graph,
            config: config.clone(),
            counts: *counts,
            generator,
            discriminator,
            trg_font,
            trg_skeleton,
            style_labels,
            char_labels,
            f2s_outputs,
            f2s_predict_real: real.patch,
            f2s_predict_fake: fake.patch,
            losses: Losses {
                disc_real,
                disc_fake,
                disc_styl,
                disc_char,
                discrim,
                gen_gan,
                gen_l1,
                gen_total,
            },
            discrim_optimizer,
            gen_optimizer,
            ema: ExponentialMovingAverage::default(),
            global_step: 0,
            last_raw_losses: None,
            discrim_grads_and_vars: GradsAndVars::default(),
            gen_grads_and_vars: GradsAndVars::default(),
        })
    }

    /// 喂入下一批数据，形状须与构建时一致
    pub fn feed(&mut self, batch: &F2sBatch) -> Result<(), GraphError> {
        batch.validate(&self.counts)?;
        self.trg_font.set_value(&batch.trg_font)?;
        self.trg_skeleton.set_value(&batch.trg_skeleton)?;
        self.style_labels.set_value(&batch.style_labels)?;
        self.char_labels.set_value(&batch.char_labels)?;
        Ok(())
    }

    /// 判别器阶段：前向 + 反向到判别器参数 + Adam 更新
    fn discriminator_step(&mut self) -> Result<DiscriminatorStep, GraphError> {
        self.discrim_optimizer.zero_grad()?;
        self.graph
            .backward_for(&self.losses.discrim, self.discrim_optimizer.params())?;
        let step = DiscriminatorStep {
            real: self.losses.disc_real.item()?,
            fake: self.losses.disc_fake.item()?,
            styl: self.losses.disc_styl.item()?,
            chr: self.losses.disc_char.item()?,
        };
        self.discrim_grads_and_vars = GradsAndVars::capture(self.discrim_optimizer.params())?;
        self.discrim_optimizer.step()?;
        Ok(step)
    }

    /// 判别器更新，返回 (real, fake, styl, char) 四项原始损失
    pub fn update_discriminator(&mut self) -> Result<(f32, f32, f32, f32), GraphError> {
        let step = self.discriminator_step()?;
        Ok((step.real, step.fake, step.styl, step.chr))
    }

    /// 生成器更新，必须在判别器更新之后调用：生成器梯度按更新后的判别器计算。
    /// 返回 (gan, l1) 两项原始损失
    pub fn update_generator(&mut self) -> Result<(f32, f32), GraphError> {
        self.gen_optimizer.zero_grad()?;
        self.graph
            .backward_for(&self.losses.gen_total, self.gen_optimizer.params())?;
        let gan = self.losses.gen_gan.item()?;
        let l1 = self.losses.gen_l1.item()?;
        self.gen_grads_and_vars = GradsAndVars::capture(self.gen_optimizer.params())?;
        self.gen_optimizer.step()?;
        Ok((gan, l1))
    }

    /// 一次完整的训练步
    pub fn train(&mut self) -> Result<ModelOutput, GraphError> {
        let disc = self.discriminator_step()?;
        let (gen_gan, gen_l1) = self.update_generator()?;
        let raw = LossSummary {
            disc_real_loss: disc.real,
            disc_fake_loss: disc.fake,
            disc_loss_real_styl: disc.styl,
            disc_loss_real_char: disc.chr,
            gen_loss_gan: gen_gan,
            gen_loss_l1: gen_l1,
        };
        if !raw.is_all_finite() {
            log::warn!("第{}步出现非有限损失: {raw:?}", self.global_step + 1);
        }
        self.ema.apply(&raw.named());
        self.last_raw_losses = Some(raw);
        self.global_step += 1;
        log::debug!(
            "step {}: D(real={:.4}, fake={:.4}, styl={:.4}, char={:.4}) G(gan={:.4}, l1={:.4})",
            self.global_step,
            raw.disc_real_loss,
            raw.disc_fake_loss,
            raw.disc_loss_real_styl,
            raw.disc_loss_real_char,
            raw.gen_loss_gan,
            raw.gen_loss_l1
        );
        self.outputs()
    }

    /// 只做前向，返回当前参数下的六项原始损失
    pub fn evaluate_losses(&self) -> Result<LossSummary, GraphError> {
        Ok(LossSummary {
            disc_real_loss: self.losses.disc_real.item()?,
            disc_fake_loss: self.losses.disc_fake.item()?,
            disc_loss_real_styl: self.losses.disc_styl.item()?,
            disc_loss_real_char: self.losses.disc_char.item()?,
            gen_loss_gan: self.losses.gen_gan.item()?,
            gen_loss_l1: self.losses.gen_l1.item()?,
        })
    }

    /// 不训练，按当前参数返回模型输出记录
    pub fn outputs(&self) -> Result<ModelOutput, GraphError> {
        let raw_losses = match self.last_raw_losses {
            Some(raw) => raw,
            None => self.evaluate_losses()?,
        };
        Ok(ModelOutput {
            f2s_outputs: self.f2s_outputs.eval_value()?,
            f2s_predict_real: self.f2s_predict_real.eval_value()?,
            f2s_predict_fake: self.f2s_predict_fake.eval_value()?,
            losses: LossSummary::from_ema(&self.ema).unwrap_or(raw_losses),
            raw_losses,
            discrim_grads_and_vars: self.discrim_grads_and_vars.clone(),
            gen_grads_and_vars: self.gen_grads_and_vars.clone(),
            global_step: self.global_step,
        })
    }

    pub const fn global_step(&self) -> u64 {
        self.global_step
    }

    /// 训练模式下生成器的 Dropout 生效
    pub fn set_training(&self, training: bool) {
        if training {
            self.graph.train();
        } else {
            self.graph.eval();
        }
    }

    pub const fn graph(&self) -> &Graph {
        &self.graph
    }

    pub const fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub const fn class_counts(&self) -> &ClassCounts {
        &self.counts
    }

    pub const fn generator(&self) -> &Generator {
        &self.generator
    }

    pub const fn discriminator(&self) -> &Discriminator {
        &self.discriminator
    }

    /// 生成器输出节点
    pub const fn f2s_outputs(&self) -> &Var {
        &self.f2s_outputs
    }

    pub const fn f2s_predict_fake(&self) -> &Var {
        &self.f2s_predict_fake
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(size: usize, counts: &ClassCounts) -> F2sBatch {
        F2sBatch {
            trg_font: Tensor::zeros(&[1, size, size, 1]),
            trg_skeleton: Tensor::zeros(&[1, size, size, 1]),
            style_labels: Tensor::zeros(&[1, counts.styles]),
            char_labels: Tensor::zeros(&[1, counts.characters]),
        }
    }

    #[test]
    fn test_batch_validation() {
        let counts = ClassCounts::new(2, 3).unwrap();
        assert!(batch(256, &counts).validate(&counts).is_ok());
        assert!(batch(128, &counts).validate(&counts).is_err());
        assert!(batch(200, &counts).validate(&counts).is_err());

        let mut wrong_label = batch(256, &counts);
        wrong_label.style_labels = Tensor::zeros(&[1, 4]);
        assert!(matches!(
            wrong_label.validate(&counts),
            Err(GraphError::ShapeMismatch { .. })
        ));

        let mut wrong_batch = batch(256, &counts);
        wrong_batch.char_labels = Tensor::zeros(&[2, 3]);
        assert!(wrong_batch.validate(&counts).is_err());

        let mut mismatched = batch(256, &counts);
        mismatched.trg_skeleton = Tensor::zeros(&[1, 256, 256, 3]);
        assert!(mismatched.validate(&counts).is_err());
    }

    #[test]
    fn test_global_norm() {
        let grads = GradsAndVars(vec![
            GradAndVar {
                name: "a".to_string(),
                grad: Tensor::new(&[3.0], &[1]),
                value: Tensor::zeros(&[1]),
            },
            GradAndVar {
                name: "b".to_string(),
                grad: Tensor::new(&[4.0], &[1]),
                value: Tensor::zeros(&[1]),
            },
        ]);
        assert!((grads.global_norm() - 5.0).abs() < 1e-6);
        assert_eq!(grads.len(), 2);
        assert!(GradsAndVars::default().is_empty());
    }

    #[test]
    fn test_loss_summary_from_ema_needs_all_terms() {
        let mut ema = ExponentialMovingAverage::default();
        ema.apply(&[(DISC_REAL_LOSS, 1.0)]);
        assert!(LossSummary::from_ema(&ema).is_none());
        let raw = LossSummary {
            disc_real_loss: 1.0,
            disc_fake_loss: 2.0,
            disc_loss_real_styl: 3.0,
            disc_loss_real_char: 4.0,
            gen_loss_gan: 5.0,
            gen_loss_l1: 6.0,
        };
        ema.apply(&raw.named());
        assert_eq!(LossSummary::from_ema(&ema).unwrap().gen_loss_l1, 6.0);
    }
}
