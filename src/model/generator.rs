/*
 * @Description  : U-Net 生成器
 *
 * encoder_1..encoder_8 每级空间尺寸减半（256 → 1），
 * 风格/字符标签在 1x1 瓶颈处按通道拼接，
 * decoder_8..decoder_2 每级尺寸加倍并与对称的编码器输出跳连，
 * decoder_1 输出目标通道数并经 tanh 限定在 [-1, 1]。
 */

use super::{KERNEL_SIZE, LEAKY_SLOPE};
use crate::config::{ClassCounts, ModelConfig};
use crate::nn::{
    BatchNorm, Conv2d, ConvTranspose2d, Graph, GraphError, Module, PaddingMode, Var,
    VarActivationOps, VarShapeOps,
};

/// 前三个解码级的 Dropout 保留概率
const DECODER_KEEP_PROB: f32 = 0.5;

/// 编码级：[lrelu →] conv [→ batchnorm]，第一级只有卷积
struct EncoderStage {
    conv: Conv2d,
    norm: Option<BatchNorm>,
}

impl EncoderStage {
    fn forward(&self, x: &Var) -> Result<Var, GraphError> {
        match &self.norm {
            None => self.conv.forward(x),
            Some(norm) => norm.forward(&self.conv.forward(&x.leaky_relu(LEAKY_SLOPE)?)?),
        }
    }
}

/// 解码级：relu → deconv → batchnorm [→ dropout]
struct DecoderStage {
    deconv: ConvTranspose2d,
    norm: BatchNorm,
    keep_prob: Option<f32>,
}

impl DecoderStage {
    fn forward(&self, x: &Var) -> Result<Var, GraphError> {
        let output = self.norm.forward(&self.deconv.forward(&x.relu()?)?)?;
        match self.keep_prob {
            Some(keep_prob) => output.dropout(keep_prob),
            None => Ok(output),
        }
    }
}

pub struct Generator {
    encoders: Vec<EncoderStage>,
    decoders: Vec<DecoderStage>,
    last: ConvTranspose2d,
    counts: ClassCounts,
}

impl Generator {
    pub fn new(
        graph: &Graph,
        in_channels: usize,
        out_channels: usize,
        counts: &ClassCounts,
        config: &ModelConfig,
    ) -> Result<Self, GraphError> {
        let ngf = config.ngf;
        let encoder_channels = [ngf, ngf * 2, ngf * 4, ngf * 8, ngf * 8, ngf * 8, ngf * 8, ngf * 8];

        let mut encoders = Vec::with_capacity(encoder_channels.len());
        let mut channels = in_channels;
        for (i, &out) in encoder_channels.iter().enumerate() {
            let scope = format!("generator/encoder_{}", i + 1);
            let conv = Conv2d::new(
                graph,
                channels,
                out,
                KERNEL_SIZE,
                2,
                PaddingMode::Same,
                false,
                &format!("{scope}/conv"),
            )?;
            let norm = if i == 0 {
                None
            } else {
                Some(BatchNorm::new(graph, out, &format!("{scope}/batchnorm"))?)
            };
            encoders.push(EncoderStage { conv, norm });
            channels = out;
        }

        // 瓶颈处拼上两组标签
        channels += counts.styles + counts.characters;

        let decoder_specs = [
            (ngf * 8, Some(DECODER_KEEP_PROB)),
            (ngf * 8, Some(DECODER_KEEP_PROB)),
            (ngf * 8, Some(DECODER_KEEP_PROB)),
            (ngf * 8, None),
            (ngf * 4, None),
            (ngf * 2, None),
            (ngf, None),
        ];
        let num_encoders = encoder_channels.len();
        let mut decoders = Vec::with_capacity(decoder_specs.len());
        for (i, &(out, keep_prob)) in decoder_specs.iter().enumerate() {
            let skip_layer = num_encoders - i - 1;
            if i > 0 {
                channels += encoder_channels[skip_layer];
            }
            let scope = format!("generator/decoder_{}", skip_layer + 1);
            let deconv = ConvTranspose2d::new(
                graph,
                channels,
                out,
                KERNEL_SIZE,
                2,
                PaddingMode::Same,
                &format!("{scope}/deconv"),
            )?;
            let norm = BatchNorm::new(graph, out, &format!("{scope}/batchnorm"))?;
            decoders.push(DecoderStage {
                deconv,
                norm,
                keep_prob,
            });
            channels = out;
        }

        let last = ConvTranspose2d::new(
            graph,
            channels + encoder_channels[0],
            out_channels,
            KERNEL_SIZE,
            2,
            PaddingMode::Same,
            "generator/decoder_1/deconv",
        )?;

        Ok(Self {
            encoders,
            decoders,
            last,
            counts: *counts,
        })
    }

    /// image: [B, 256, 256, C]；styl: [B, S]；chr: [B, Ch] → [B, 256, 256, out_channels]
    pub fn forward(&self, image: &Var, styl: &Var, chr: &Var) -> Result<Var, GraphError> {
        let batch = *image
            .value_expected_shape()?
            .first()
            .ok_or_else(|| GraphError::InvalidOperation("生成器输入不能是0维".to_string()))?;

        let mut layers: Vec<Var> = Vec::with_capacity(self.encoders.len() + self.decoders.len());
        for stage in &self.encoders {
            let output = match layers.last() {
                Some(previous) => stage.forward(previous)?,
                None => stage.forward(image)?,
            };
            layers.push(output);
        }

        let styl = styl.reshape(&[batch, 1, 1, self.counts.styles])?;
        let chr = chr.reshape(&[batch, 1, 1, self.counts.characters])?;
        let num_encoders = layers.len();
        let bottleneck = layers[num_encoders - 1].concat(&[&styl, &chr])?;
        layers[num_encoders - 1] = bottleneck;

        for (i, stage) in self.decoders.iter().enumerate() {
            let previous = &layers[layers.len() - 1];
            let input = if i == 0 {
                previous.clone()
            } else {
                previous.concat(&[&layers[num_encoders - i - 1]])?
            };
            let output = stage.forward(&input)?;
            layers.push(output);
        }

        let input = layers[layers.len() - 1].concat(&[&layers[0]])?;
        self.last.forward(&input.relu()?)?.tanh()
    }
}

impl Module for Generator {
    fn parameters(&self) -> Vec<Var> {
        let mut params = Vec::new();
        for stage in &self.encoders {
            params.extend(stage.conv.parameters());
            if let Some(norm) = &stage.norm {
                params.extend(norm.parameters());
            }
        }
        for stage in &self.decoders {
            params.extend(stage.deconv.parameters());
            params.extend(stage.norm.parameters());
        }
        params.extend(self.last.parameters());
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Tensor;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn tiny() -> (Graph, Generator, ClassCounts) {
        let graph = Graph::new_with_seed(11);
        let counts = ClassCounts::new(3, 5).unwrap();
        let config = ModelConfig {
            ngf: 2,
            ..ModelConfig::default()
        };
        let generator = Generator::new(&graph, 1, 1, &counts, &config).unwrap();
        (graph, generator, counts)
    }

    #[test]
    fn test_generator_parameter_layout() {
        let (graph, generator, _) = tiny();
        // 8个编码卷积 + 7个编码BN(2) + 7个解码(deconv + BN(2)) + 最后的deconv
        assert_eq!(generator.num_params(), 8 + 14 + 21 + 1);
        assert_eq!(graph.parameters_with_prefix("generator").len(), generator.num_params());

        let names: Vec<String> = generator.parameters().iter().map(|p| p.name().unwrap()).collect();
        assert_eq!(names[0], "generator/encoder_1/conv/kernel");
        assert!(names.contains(&"generator/decoder_8/deconv/kernel".to_string()));
        assert_eq!(names.last().unwrap(), "generator/decoder_1/deconv/kernel");

        // decoder_8 的输入 = 8ngf + 风格数 + 字符数
        let d8 = graph
            .parameters_with_prefix("generator/decoder_8/deconv")
            .remove(0);
        assert_eq!(d8.value_expected_shape().unwrap(), vec![4, 4, 16, 16 + 3 + 5]);
        // decoder_1 的输入 = ngf（decoder_2输出）+ ngf（encoder_1输出）
        let d1 = graph
            .parameters_with_prefix("generator/decoder_1/deconv")
            .remove(0);
        assert_eq!(d1.value_expected_shape().unwrap(), vec![4, 4, 1, 4]);
    }

    #[test]
    fn test_generator_output_shape_and_range() {
        let (graph, generator, counts) = tiny();
        let mut rng = StdRng::seed_from_u64(1);
        let image = Tensor::uniform_with_rng(-1.0, 1.0, &[2, 256, 256, 1], &mut rng);
        let image = graph.input(&image).unwrap();
        let styl = graph
            .input(&Tensor::new(&[1., 0., 0., 0., 0., 1.], &[2, counts.styles]))
            .unwrap();
        let chr = graph.input(&Tensor::zeros(&[2, counts.characters])).unwrap();

        let out = generator.forward(&image, &styl, &chr).unwrap();
        assert_eq!(out.value_expected_shape().unwrap(), vec![2, 256, 256, 1]);
        let value = out.eval_value().unwrap();
        assert!(value.is_all_finite());
        assert!(value.min() >= -1.0 && value.max() <= 1.0);
    }

    #[test]
    fn test_generator_rejects_wrong_label_width() {
        let (graph, generator, counts) = tiny();
        let image = graph.input_shape(&[1, 256, 256, 1], None).unwrap();
        let styl = graph.input_shape(&[1, counts.styles + 1], None).unwrap();
        let chr = graph.input_shape(&[1, counts.characters], None).unwrap();
        assert!(generator.forward(&image, &styl, &chr).is_err());
    }

    #[test]
    fn test_generator_rejects_non_256_input() {
        // 128x128 第7级就到 1x1，解码时尺寸对不上跳连
        let (graph, generator, counts) = tiny();
        let image = graph.input_shape(&[1, 128, 128, 1], None).unwrap();
        let styl = graph.input_shape(&[1, counts.styles], None).unwrap();
        let chr = graph.input_shape(&[1, counts.characters], None).unwrap();
        assert!(generator.forward(&image, &styl, &chr).is_err());
    }
}
