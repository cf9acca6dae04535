mod shape;

use crate::tensor::Tensor;
use approx::assert_abs_diff_eq;
use rand::SeedableRng;
use rand::rngs::StdRng;

#[test]
fn test_new_and_properties() {
    let t = Tensor::new(&[1., 2., 3., 4., 5., 6.], &[1, 2, 3]);
    assert_eq!(t.shape(), &[1, 2, 3]);
    assert_eq!(t.dimension(), 3);
    assert_eq!(t.size(), 6);
    assert!(!t.is_scalar());
    assert_eq!(t.get_data_number(), None);

    let s = Tensor::new(&[7.], &[1, 1]);
    assert!(s.is_scalar());
    assert_eq!(s.get_data_number(), Some(7.));
}

#[test]
#[should_panic(expected = "数据长度3与形状[2, 2]不符")]
fn test_new_with_wrong_length() {
    let _ = Tensor::new(&[1., 2., 3.], &[2, 2]);
}

#[test]
fn test_normal_with_rng_is_reproducible_and_centered() {
    let mut rng_1 = StdRng::seed_from_u64(7);
    let mut rng_2 = StdRng::seed_from_u64(7);
    let a = Tensor::normal_with_rng(1.0, 0.02, &[64, 64], &mut rng_1);
    let b = Tensor::normal_with_rng(1.0, 0.02, &[64, 64], &mut rng_2);
    assert_eq!(a, b);
    assert_abs_diff_eq!(a.mean(), 1.0, epsilon = 0.005);

    let var = a.map(|x| (x - 1.0) * (x - 1.0)).mean();
    assert_abs_diff_eq!(var.sqrt(), 0.02, epsilon = 0.002);
}

#[test]
fn test_uniform_with_rng_range() {
    let mut rng = StdRng::seed_from_u64(3);
    let t = Tensor::uniform_with_rng(-0.5, 0.5, &[1000], &mut rng);
    assert!(t.min() >= -0.5);
    assert!(t.max() < 0.5);
}

#[test]
fn test_reductions() {
    let t = Tensor::new(&[-3., 4., 0., 0.], &[2, 2]);
    assert_abs_diff_eq!(t.sum(), 1.0);
    assert_abs_diff_eq!(t.mean(), 0.25);
    assert_abs_diff_eq!(t.norm_l2(), 5.0);
    assert_abs_diff_eq!(t.abs().sum(), 7.0);
    assert_eq!(t.min(), -3.);
    assert_eq!(t.max(), 4.);
    assert!(t.is_all_finite());
    assert!(!Tensor::new(&[1., f32::NAN], &[2]).is_all_finite());
}

#[test]
fn test_where_with_f32_keeps_nan() {
    let t = Tensor::new(&[-1.0, f32::NAN, 2.0], &[3]);
    let r = t.where_with_f32(|x| x > 0.0, |x| x, |x| 0.2 * x);
    let v = r.to_vec();
    assert_abs_diff_eq!(v[0], -0.2);
    assert!(v[1].is_nan());
    assert_abs_diff_eq!(v[2], 2.0);
}
