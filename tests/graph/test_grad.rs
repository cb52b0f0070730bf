use opgraph::prelude::*;

use core::fmt;
use core::hash::Hasher;

fn scalar_at(g: &mut ExprGraph, id: NodeId) -> Scalar {
    evaluate(g, id).unwrap().as_scalar().unwrap()
}

fn f64s_at(g: &mut ExprGraph, id: NodeId) -> Vec<f64> {
    let v = evaluate(g, id).unwrap();
    v.as_tensor().unwrap().to_vec::<f64>().unwrap()
}

#[test]
fn gradient_of_negation() {
    let mut g = ExprGraph::new();
    let a = g.constant(2.0f64).unwrap();
    let cost = g.apply(Neg, &[a]).unwrap();

    let da = grad(&mut g, cost, &[a]).unwrap();
    assert_eq!(scalar_at(&mut g, da[0]), Scalar::F64(-1.0));
}

#[test]
fn seed_matches_the_cost_dtype() {
    let mut g = ExprGraph::new();
    let a = g.constant(2.0f32).unwrap();
    let cost = g.apply(Neg, &[a]).unwrap();

    let da = grad(&mut g, cost, &[a]).unwrap();
    assert_eq!(scalar_at(&mut g, da[0]), Scalar::F32(-1.0));
}

#[test]
fn fan_in_contributions_are_summed() {
    let mut g = ExprGraph::new();
    let a = g.constant(2.0f64).unwrap();
    let twice = g.apply(Add, &[a, a]).unwrap();
    let da = grad(&mut g, twice, &[a]).unwrap();
    assert_eq!(scalar_at(&mut g, da[0]), Scalar::F64(2.0));

    // d(-a + a)/da = 0
    let n = g.apply(Neg, &[a]).unwrap();
    let zero = g.apply(Add, &[n, a]).unwrap();
    let da = grad(&mut g, zero, &[a]).unwrap();
    assert_eq!(scalar_at(&mut g, da[0]), Scalar::F64(0.0));
}

#[test]
fn gradient_of_a_sum_is_a_broadcast() {
    let mut g = ExprGraph::new();
    let x = g
        .constant(Tensor::from_vec([2, 3], vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap())
        .unwrap();
    let cost = g.apply(Sum::new(2), &[x]).unwrap();

    let dx = grad(&mut g, cost, &[x]).unwrap();
    assert_eq!(g.node(dx[0]).unwrap().shape(), &Shape::from([2, 3]));
    assert_eq!(f64s_at(&mut g, dx[0]), vec![1.0; 6]);

    let n = g.apply(Neg, &[x]).unwrap();
    let cost = g.apply(Sum::new(2), &[n]).unwrap();
    let dx = grad(&mut g, cost, &[x]).unwrap();
    assert_eq!(f64s_at(&mut g, dx[0]), vec![-1.0; 6]);
}

#[test]
fn gradient_through_a_broadcast_is_a_sum() {
    let mut g = ExprGraph::new();
    let s = g.constant(0.5f64).unwrap();
    let b = g.apply(Broadcast::new([4]), &[s]).unwrap();
    let cost = g.apply(Sum::new(1), &[b]).unwrap();

    let ds = grad(&mut g, cost, &[s, b]).unwrap();
    assert_eq!(scalar_at(&mut g, ds[0]), Scalar::F64(4.0));
    assert_eq!(f64s_at(&mut g, ds[1]), vec![1.0; 4]);
}

#[test]
fn stop_gradient_blocks_flow() {
    let mut g = ExprGraph::new();
    let a = g.constant(2.0f64).unwrap();
    let stopped = g.apply(StopGradient, &[a]).unwrap();
    let cost = g.apply(Neg, &[stopped]).unwrap();

    assert!(matches!(
        grad(&mut g, cost, &[a]),
        Err(OpError::NonDifferentiable { .. })
    ));
    let ds = grad(&mut g, cost, &[stopped]).unwrap();
    assert_eq!(scalar_at(&mut g, ds[0]), Scalar::F64(-1.0));
}

#[test]
fn cost_must_be_scalar() {
    let mut g = ExprGraph::new();
    let x = g.constant(Tensor::zeros(Dtype::Float64, [3])).unwrap();
    let y = g.apply(Neg, &[x]).unwrap();
    assert!(matches!(
        grad(&mut g, y, &[x]),
        Err(OpError::ShapeMismatch { .. })
    ));
}

#[test]
fn unrelated_nodes_have_no_gradient() {
    let mut g = ExprGraph::new();
    let a = g.constant(2.0f64).unwrap();
    let b = g.constant(3.0f64).unwrap();
    let cost = g.apply(Neg, &[a]).unwrap();
    assert_eq!(
        grad(&mut g, cost, &[b]),
        Err(OpError::NonDifferentiable {
            op: "const 3".to_string()
        })
    );
}

// Claims both inputs are differentiable but returns a single gradient.
#[derive(Debug)]
struct Lopsided;

impl fmt::Display for Lopsided {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lopsided")
    }
}

impl Op for Lopsided {
    fn type_of(&self) -> Type {
        let a = Type::var('a');
        Type::function(vec![a.clone(), a.clone()], a)
    }

    fn infer_shape(&self, _hint: &Type, inputs: &[&Node]) -> Result<Shape> {
        Ok(inputs[0].shape().clone())
    }

    fn diff_wrt(&self, inputs: usize) -> Vec<bool> {
        vec![true; inputs]
    }

    fn sym_diff(
        &self,
        _g: &mut ExprGraph,
        _inputs: &[NodeId],
        _output: NodeId,
        grad: NodeId,
    ) -> Result<Vec<NodeId>> {
        Ok(vec![grad])
    }

    fn do_op(&self, inputs: &[Value]) -> Result<Value> {
        Ok(inputs[0].clone())
    }

    fn returns_ptr(&self) -> bool {
        true
    }

    fn calls_extern(&self) -> bool {
        false
    }

    fn overwrite_input(&self) -> Option<usize> {
        None
    }

    fn write_hash(&self, h: &mut dyn Hasher) {
        h.write(b"lopsided");
    }
}

#[test]
fn gradient_count_is_checked() {
    let mut g = ExprGraph::new();
    let a = g.constant(1.5f64).unwrap();
    let b = g.constant(2.5f64).unwrap();
    let cost = g.apply(Lopsided, &[a, b]).unwrap();
    assert!(matches!(
        grad(&mut g, cost, &[a, b]),
        Err(OpError::Computation { .. })
    ));
}
