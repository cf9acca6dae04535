/*
 * @Description  : F2S 训练步测试：更新顺序、global_step、端到端
 */

mod common;

use common::{counts, init_logger, random_batch, tiny_config, zero_batch};
use f2s_gan::config::ModelConfig;
use f2s_gan::model::{F2sModel, GradsAndVars};
use f2s_gan::nn::{GraphError, Var};
use f2s_gan::tensor::Tensor;

fn snapshot(params: &[Var]) -> Result<Vec<Tensor>, GraphError> {
    params
        .iter()
        .map(|p| {
            p.value()?
                .ok_or_else(|| GraphError::ComputationError("参数没有值".to_string()))
        })
        .collect()
}

/// 生成器梯度按更新后的判别器计算
#[test]
fn test_generator_sees_updated_discriminator() -> Result<(), GraphError> {
    init_logger();
    let mut model = F2sModel::new(&random_batch(1, 10), &tiny_config(), &counts())?;
    let graph = model.graph().clone();
    let disc_params = graph.parameters_with_prefix("discriminator");
    let gen_params = graph.parameters_with_prefix("generator");
    let disc_before = snapshot(&disc_params)?;
    let gen_before = snapshot(&gen_params)?;
    let fake_before = model.f2s_predict_fake().eval_value()?;

    model.update_discriminator()?;
    let disc_after = snapshot(&disc_params)?;
    assert_ne!(disc_before, disc_after);
    // 判别器更新不动生成器参数
    assert_eq!(gen_before, snapshot(&gen_params)?);

    // 此时的生成器 GAN 损失已经用的是新判别器
    let fake_mid = model.f2s_predict_fake().eval_value()?;
    assert_ne!(fake_before, fake_mid);
    let gan_mid = model.evaluate_losses()?.gen_loss_gan;

    let (gan, l1) = model.update_generator()?;
    assert_eq!(gan, gan_mid);
    assert!(l1 >= 0.0);
    // 生成器更新不动判别器参数
    assert_eq!(disc_after, snapshot(&disc_params)?);
    assert_ne!(gen_before, snapshot(&gen_params)?);
    Ok(())
}

#[test]
fn test_global_step_counts_train_calls() -> Result<(), GraphError> {
    init_logger();
    let mut model = F2sModel::new(&random_batch(2, 11), &tiny_config(), &counts())?;
    assert_eq!(model.global_step(), 0);
    let steps = 3;
    let mut last = None;
    for i in 0..steps {
        model.feed(&random_batch(2, 100 + i))?;
        last = Some(model.train()?);
    }
    assert_eq!(model.global_step(), steps);
    let output = last.ok_or_else(|| GraphError::ComputationError("没有输出".to_string()))?;
    assert_eq!(output.global_step, steps);
    assert!(output.losses.is_all_finite());
    assert!(!output.gen_grads_and_vars.is_empty());
    assert!(output.discrim_grads_and_vars.global_norm().is_finite());
    // 只读取输出不会推进步数
    model.outputs()?;
    assert_eq!(model.global_step(), steps);
    Ok(())
}

#[test]
fn test_ema_smooths_reported_losses() -> Result<(), GraphError> {
    init_logger();
    let mut model = F2sModel::new(&random_batch(1, 12), &tiny_config(), &counts())?;
    let first = model.train()?;
    // 第一次更新时滑动平均直接取原始值
    assert_eq!(first.losses, first.raw_losses);

    let second = model.train()?;
    let expected = 0.99 * first.raw_losses.gen_loss_l1 + 0.01 * second.raw_losses.gen_loss_l1;
    assert!((second.losses.gen_loss_l1 - expected).abs() < 1e-5);
    Ok(())
}

/// eval 模式下 Dropout 关闭，同一批数据的输出可复现；训练模式下不可复现
#[test]
fn test_dropout_only_in_train_mode() -> Result<(), GraphError> {
    init_logger();
    let batch = random_batch(1, 13);
    let mut model = F2sModel::new(&batch, &tiny_config(), &counts())?;

    model.set_training(false);
    let a = model.f2s_outputs().eval_value()?;
    model.feed(&batch)?;
    let b = model.f2s_outputs().eval_value()?;
    assert_eq!(a, b);

    model.set_training(true);
    let c = model.f2s_outputs().eval_value()?;
    model.feed(&batch)?;
    let d = model.f2s_outputs().eval_value()?;
    assert_ne!(c, d);
    Ok(())
}

/// 参数全部有限；梯度不可忽略的参数都被更新了
fn check_step_effect(
    before: &[Tensor],
    after: &[Tensor],
    names: &[String],
    grads: &[&GradsAndVars],
) {
    for ((b, a), name) in before.iter().zip(after).zip(names) {
        assert!(a.is_all_finite(), "{name} 出现非有限值");
        assert!(a.norm_l2().is_finite());
        let significant = grads
            .iter()
            .flat_map(|g| g.iter())
            .any(|pair| &pair.name == name && pair.grad.norm_l2() > 1e-6);
        if significant {
            assert_ne!(a, b, "{name} 有梯度却没有更新");
        }
    }
}

/// 全零源图像时编码器卷积核第一步的梯度恰为0（输入全零），
/// 所以这里只要求“有梯度的参数都动了”，再加上两组参数整体都有变化
fn end_to_end(config: &ModelConfig) -> Result<(), GraphError> {
    init_logger();
    let counts = counts();
    let mut model = F2sModel::new(&zero_batch(&counts), config, &counts)?;
    let graph = model.graph().clone();
    let params = graph.parameters_with_prefix("");
    let names: Vec<String> = params.iter().map(Var::name).collect::<Result<_, _>>()?;
    let before = snapshot(&params)?;
    assert!(model.evaluate_losses()?.is_all_finite());

    let output = model.train()?;
    assert!(output.raw_losses.is_all_finite());
    assert!(output.losses.is_all_finite());
    assert!(output.f2s_outputs.is_all_finite());
    assert_eq!(output.global_step, 1);

    let after = snapshot(&params)?;
    check_step_effect(
        &before,
        &after,
        &names,
        &[&output.discrim_grads_and_vars, &output.gen_grads_and_vars],
    );

    for prefix in ["generator", "discriminator"] {
        let changed = names
            .iter()
            .zip(before.iter().zip(&after))
            .any(|(name, (b, a))| name.starts_with(prefix) && a != b);
        assert!(changed, "{prefix} 的参数没有任何变化");
    }
    Ok(())
}

/// 全零输入、类别0、一步训练（小通道数）
#[test]
fn test_end_to_end_zero_batch_tiny() -> Result<(), GraphError> {
    end_to_end(&tiny_config())
}

/// 同一场景使用默认配置（ngf = ndf = 64），CPU 上较慢
#[test]
#[ignore]
fn test_end_to_end_zero_batch_default_config() -> Result<(), GraphError> {
    end_to_end(&ModelConfig::default())
}
