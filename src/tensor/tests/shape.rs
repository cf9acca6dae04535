use crate::errors::TensorError;
use crate::tensor::Tensor;

#[test]
fn test_reshape() {
    let t = Tensor::new(&[1., 2., 3., 4.], &[2, 2]);
    let r = t.reshape(&[1, 1, 1, 4]).unwrap();
    assert_eq!(r.shape(), &[1, 1, 1, 4]);
    assert_eq!(r.to_vec(), t.to_vec());

    assert_eq!(
        t.reshape(&[3]),
        Err(TensorError::ReshapeError {
            from: vec![2, 2],
            to: vec![3]
        })
    );
}

#[test]
fn test_concat_last_axis() {
    // [1, 1, 2, 1] 与 [1, 1, 2, 2] 沿通道拼接 => [1, 1, 2, 3]
    let a = Tensor::new(&[1., 2.], &[1, 1, 2, 1]);
    let b = Tensor::new(&[10., 11., 20., 21.], &[1, 1, 2, 2]);
    let c = Tensor::concat_last_axis(&[&a, &b]).unwrap();
    assert_eq!(c.shape(), &[1, 1, 2, 3]);
    assert_eq!(c.to_vec(), vec![1., 10., 11., 2., 20., 21.]);
}

#[test]
fn test_concat_last_axis_rejects_mismatched_leading_dims() {
    let a = Tensor::zeros(&[1, 2, 2, 1]);
    let b = Tensor::zeros(&[1, 1, 1, 3]);
    assert_eq!(
        Tensor::concat_last_axis(&[&a, &b]),
        Err(TensorError::ConcatShapeMismatch(vec![
            vec![1, 2, 2, 1],
            vec![1, 1, 1, 3]
        ]))
    );
    assert_eq!(Tensor::concat_last_axis(&[]), Err(TensorError::EmptyList));
}

#[test]
fn test_slice_last_axis() {
    let t = Tensor::new(&[1., 2., 3., 4., 5., 6.], &[2, 3]);
    let s = t.slice_last_axis(1, 3).unwrap();
    assert_eq!(s.shape(), &[2, 2]);
    assert_eq!(s.to_vec(), vec![2., 3., 5., 6.]);
    assert_eq!(
        t.slice_last_axis(2, 4),
        Err(TensorError::SliceOutOfRange {
            start: 2,
            end: 4,
            len: 3
        })
    );
}
