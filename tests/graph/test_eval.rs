use opgraph::prelude::*;

use std::sync::Arc;
use std::thread;

#[test]
fn evaluate_binds_every_dependency() {
    let mut g = ExprGraph::new();
    let a = g.constant(3.0f64).unwrap();
    let b = g.constant(4.0f64).unwrap();
    let c = g.apply(Add, &[a, b]).unwrap();
    let d = g.apply(Neg, &[c]).unwrap();

    assert_eq!(evaluate(&mut g, d), Ok(Value::from(-7.0f64)));
    assert_eq!(g.node(c).unwrap().value(), Some(&Value::from(7.0f64)));
    assert_eq!(g.node(a).unwrap().value(), Some(&Value::from(3.0f64)));
}

#[test]
fn evaluated_tensor_constants_alias_the_literal() {
    let t = Tensor::from_vec([3], vec![1u8, 2, 3]).unwrap();
    let mut g = ExprGraph::new();
    let x = g.constant(t.clone()).unwrap();
    let v = evaluate(&mut g, x).unwrap();
    assert!(v.shares_storage(&Value::Tensor(t)));
}

#[test]
fn overwriting_ops_leave_constants_untouched() {
    let mut g = ExprGraph::new();
    let literal = Tensor::from_vec([2], vec![1.0f64, 2.0]).unwrap();
    let x = g.constant(literal.clone()).unwrap();
    let y = g
        .constant(Tensor::from_vec([2], vec![10.0f64, 20.0]).unwrap())
        .unwrap();
    let n = g.apply(Neg, &[x]).unwrap();
    let hash = g.node(x).unwrap().op().hashcode();

    let incr = g.apply(Incr, &[x, y]).unwrap();
    let out = evaluate(&mut g, incr).unwrap();
    assert_eq!(
        out.as_tensor().unwrap().to_vec::<f64>(),
        Some(vec![11.0, 22.0])
    );

    // The literal, the bound value of its node and its hash are unchanged.
    assert_eq!(literal.to_vec::<f64>(), Some(vec![1.0, 2.0]));
    let bound = g.node(x).unwrap().value().unwrap().clone();
    assert_eq!(bound, Value::Tensor(literal.clone()));
    assert!(!out.shares_storage(&bound));
    assert_eq!(g.node(x).unwrap().op().hashcode(), hash);

    // Other readers of the constant still see the original literal.
    let negated = evaluate(&mut g, n).unwrap();
    assert_eq!(
        negated.as_tensor().unwrap().to_vec::<f64>(),
        Some(vec![-1.0, -2.0])
    );

    // Re-adding the literal finds the same, unmodified node.
    let x2 = g.constant(literal).unwrap();
    assert_eq!(x2, x);
    assert_eq!(
        evaluate(&mut g, x2).unwrap().as_tensor().unwrap().to_vec::<f64>(),
        Some(vec![1.0, 2.0])
    );
}

#[test]
fn failed_overwrite_leaves_inputs_untouched() {
    let mut g = ExprGraph::new();
    let literal = Tensor::from_vec([2], vec![1i32, i32::MAX]).unwrap();
    let x = g.constant(literal.clone()).unwrap();
    let y = g
        .constant(Tensor::from_vec([2], vec![5i32, 1]).unwrap())
        .unwrap();
    let incr = g.apply(Incr, &[x, y]).unwrap();

    assert!(matches!(
        evaluate(&mut g, incr),
        Err(OpError::Computation { .. })
    ));
    assert_eq!(literal.to_vec::<i32>(), Some(vec![1, i32::MAX]));
    assert!(g.node(incr).unwrap().value().is_none());
}

#[test]
fn zero_dimensional_tensors_keep_their_type() {
    let mut g = ExprGraph::new();
    let t = Tensor::from_vec(Shape::scalar(), vec![2.0f64]).unwrap();
    let x = g.constant(t).unwrap();
    let n = g.apply(Neg, &[x]).unwrap();
    let s = g.apply(Sum::new(0), &[n]).unwrap();
    let b = g.apply(Broadcast::new(Shape::scalar()), &[s]).unwrap();
    let a = g.apply(Add, &[b, x]).unwrap();

    for id in [n, s, b, a] {
        let v = evaluate(&mut g, id).unwrap();
        assert_eq!(&v.type_of(), g.node(id).unwrap().type_of());
        assert!(v.shape().is_scalar());
    }
    assert_eq!(
        evaluate(&mut g, a).unwrap().as_tensor().unwrap().get(0),
        Some(Scalar::F64(0.0))
    );
}

#[test]
fn evaluate_surfaces_computation_errors() {
    let mut g = ExprGraph::new();
    let a = g.constant(i64::MAX).unwrap();
    let b = g.constant(1i64).unwrap();
    let c = g.apply(Add, &[a, b]).unwrap();
    assert!(matches!(
        evaluate(&mut g, c),
        Err(OpError::Computation { .. })
    ));
}

#[test]
fn do_diff_propagates_the_output_gradient() {
    let mut g = ExprGraph::new();
    let a = g.constant(3.0f64).unwrap();
    let b = g.constant(4.0f64).unwrap();
    let c = g.apply(Add, &[a, b]).unwrap();

    g.bind_grad(c, Value::from(2.0f64)).unwrap();
    do_diff(&mut g, c).unwrap();
    assert_eq!(g.node(a).unwrap().grad(), Some(&Value::from(2.0f64)));
    assert_eq!(g.node(b).unwrap().grad(), Some(&Value::from(2.0f64)));
}

#[test]
fn do_diff_needs_a_bound_gradient() {
    let mut g = ExprGraph::new();
    let a = g.constant(3.0f64).unwrap();
    let c = g.apply(Add, &[a, a]).unwrap();
    assert_eq!(do_diff(&mut g, c), Err(OpError::GradientAbsent(c)));
}

#[test]
fn do_diff_needs_an_ad_op() {
    let mut g = ExprGraph::new();
    let a = g.constant(3.0f64).unwrap();
    let n = g.apply(Neg, &[a]).unwrap();
    g.bind_grad(n, Value::from(1.0f64)).unwrap();
    assert!(matches!(
        do_diff(&mut g, n),
        Err(OpError::NonDifferentiable { .. })
    ));
}

#[test]
fn backprop_accumulates_over_fan_out() {
    let mut g = ExprGraph::new();
    let a = g.constant(3.0f64).unwrap();
    let b = g.constant(4.0f64).unwrap();
    let ab = g.apply(Add, &[a, b]).unwrap();
    let c = g.apply(Add, &[ab, a]).unwrap();

    assert_eq!(backprop(&mut g, c), Ok(Value::from(10.0f64)));
    assert_eq!(g.node(a).unwrap().grad(), Some(&Value::from(2.0f64)));
    assert_eq!(g.node(b).unwrap().grad(), Some(&Value::from(1.0f64)));
}

#[test]
fn backprop_needs_a_scalar_cost() {
    let mut g = ExprGraph::new();
    let x = g.constant(Tensor::zeros(Dtype::Float32, [2])).unwrap();
    let y = g.apply(Add, &[x, x]).unwrap();
    assert!(matches!(
        backprop(&mut g, y),
        Err(OpError::ShapeMismatch { .. })
    ));
}

// Ops are immutable after construction, so queries may run on any thread.
#[test]
fn ops_are_shared_across_threads() {
    let ops: Vec<Arc<dyn Op>> = vec![
        Arc::new(Add),
        Arc::new(Sum::new(2)),
        constant(Tensor::from_vec([2], vec![1.0f64, 2.0]).unwrap()),
    ];
    let expected: Vec<u32> = ops.iter().map(|op| op.hashcode()).collect();

    thread::scope(|s| {
        let handles: Vec<_> = ops
            .iter()
            .map(|op| s.spawn(move || (op.hashcode(), op.type_of(), op.diff_wrt(1))))
            .collect();
        for (handle, (op, hash)) in handles.into_iter().zip(ops.iter().zip(&expected)) {
            let (h, ty, _) = handle.join().unwrap();
            assert_eq!(h, *hash);
            assert_eq!(ty, op.type_of());
        }
    });
}
