use opgraph::prelude::*;

use crate::strategy::{scalar_strategy, tensor_strategy};

use proptest::{prop_assert_eq, proptest};
use std::collections::HashSet;
use std::sync::Arc;

// 300 floats of each width, 300 ints of each width, every u8 and both bools.
fn distinct_scalars() -> Vec<Scalar> {
    let mut values = Vec::new();
    for i in 0..300i64 {
        let x = i as f64 * 0.5;
        values.push(Scalar::F64(x));
        values.push(Scalar::F32(x as f32));
        values.push(Scalar::I64(i - 150));
        values.push(Scalar::I32(i as i32 - 150));
    }
    values.extend((0..=255u8).map(Scalar::U8));
    values.extend([Scalar::Bool(false), Scalar::Bool(true)]);
    values
}

#[test]
fn distinct_constants_do_not_collide() {
    let values = distinct_scalars();
    assert!(values.len() >= 1000);

    let hashes: HashSet<u32> = values
        .iter()
        .map(|v| ConstantScalar::new(*v).hashcode())
        .collect();
    assert_eq!(hashes.len(), values.len());
}

#[test]
fn hashcode_is_stable() {
    // FNV-1a over "const ", the dtype tag, "of " and the little-endian bits of 3.0
    assert_eq!(ConstantScalar::new(3.0f64).hashcode(), 0x524032e7);
}

#[test]
fn float_hashes_are_bitwise() {
    assert_ne!(
        ConstantScalar::new(0.0f64).hashcode(),
        ConstantScalar::new(-0.0f64).hashcode()
    );
    assert_eq!(
        ConstantScalar::new(f64::NAN).hashcode(),
        ConstantScalar::new(f64::NAN).hashcode()
    );
}

#[test]
fn same_bits_different_dtype() {
    assert_ne!(
        ConstantScalar::new(1i32).hashcode(),
        ConstantScalar::new(1.0f32).hashcode()
    );
    assert_ne!(
        ConstantScalar::new(0u8).hashcode(),
        ConstantScalar::new(false).hashcode()
    );
}

#[test]
fn tensor_hashes_cover_shape_and_contents() {
    let data = vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0];
    let a = ConstantTensor::new(Tensor::from_vec([2, 3], data.clone()).unwrap());
    let b = ConstantTensor::new(Tensor::from_vec([2, 3], data.clone()).unwrap());
    let c = ConstantTensor::new(Tensor::from_vec([3, 2], data.clone()).unwrap());
    let mut other = data;
    other[5] = 7.0;
    let d = ConstantTensor::new(Tensor::from_vec([2, 3], other).unwrap());

    // Separate allocations, identical bits.
    assert_eq!(a.hashcode(), b.hashcode());
    assert_ne!(a.hashcode(), c.hashcode());
    assert_ne!(a.hashcode(), d.hashcode());
}

#[test]
fn op_kinds_and_parameters_are_distinguished() {
    let ops: Vec<Arc<dyn Op>> = vec![
        Arc::new(Add),
        Arc::new(Neg),
        Arc::new(Incr),
        Arc::new(StopGradient),
        Arc::new(Sum::new(1)),
        Arc::new(Sum::new(2)),
        Arc::new(Broadcast::new([2])),
        Arc::new(Broadcast::new([2, 1])),
    ];
    let hashes: HashSet<u32> = ops.iter().map(|op| op.hashcode()).collect();
    assert_eq!(hashes.len(), ops.len());
}

proptest! {
    #[test]
    fn equal_scalars_hash_equal(s in scalar_strategy()) {
        let copy = s;
        prop_assert_eq!(ConstantScalar::new(s).hashcode(), ConstantScalar::new(copy).hashcode());
    }

    #[test]
    fn deep_copies_hash_equal(t in tensor_strategy()) {
        let a = ConstantTensor::new(t.clone());
        let b = ConstantTensor::new(t.deep_clone());
        prop_assert_eq!(a.hashcode(), b.hashcode());
    }
}
