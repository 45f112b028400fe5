use approx::assert_abs_diff_eq;
use ndarray::{Array2, Array3, Axis, array};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{AttentionWeights, ComputeAttention, DenseNeighborhood, SegmentSoftmax};
use crate::assert_err;
use crate::errors::GatError;
use crate::graph::Graph;
use crate::nn::ForwardContext;

fn random_projected(n: usize, heads: usize, head_dim: usize, seed: u64) -> Array3<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array3::from_shape_fn((n, heads, head_dim), |_| rng.gen_range(-1.0..1.0))
}

fn ring_with_chords() -> Graph {
    Graph::new(5, vec![(0, 1), (1, 2), (2, 3), (3, 4), (4, 0), (0, 2), (0, 2), (3, 1)]).unwrap()
}

// ==================== SegmentSoftmax ====================

#[test]
fn test_segment_weights_sum_to_one_per_destination_and_head() {
    let mut rng = StdRng::seed_from_u64(7);
    let attention = SegmentSoftmax::new(3, 4, 0.2, &mut rng);
    let graph = ring_with_chords().add_self_loops().unwrap();
    let x = random_projected(5, 3, 4, 11);

    let propagated = attention.propagate(&x, &graph, 0.0, &mut ForwardContext::eval()).unwrap();
    assert_eq!(propagated.aggregated.shape(), &[5, 3, 4]);

    let AttentionWeights::PerEdge { edges, weights } = propagated.weights else {
        panic!("SegmentSoftmax应返回逐边权重");
    };
    assert_eq!(edges, graph.edges());
    assert_eq!(weights.shape(), &[graph.num_edges(), 3]);
    for node in 0..5 {
        for h in 0..3 {
            let total: f32 = graph.incoming(node).iter().map(|&e| weights[[e, h]]).sum();
            assert_abs_diff_eq!(total, 1.0, epsilon = 1e-5);
        }
    }
    assert!(weights.iter().all(|&w| w >= 0.0));
}

#[test]
fn test_segment_matches_hand_computation() {
    let mut rng = StdRng::seed_from_u64(0);
    let mut attention = SegmentSoftmax::new(1, 1, 0.2, &mut rng);
    attention
        .set_attention_vectors(array![[1.0]], array![[2.0]])
        .unwrap();
    let graph = Graph::new(2, vec![(0, 1)]).unwrap().add_self_loops().unwrap();
    let x = array![[[1.0f32]], [[3.0]]];

    let propagated = attention.propagate(&x, &graph, 0.0, &mut ForwardContext::eval()).unwrap();

    // 节点1的入边：0->1 得分 1*3 + 2*1 = 5；自环 1->1 得分 1*3 + 2*3 = 9
    let w_from_0 = 1.0 / (1.0 + 4f32.exp());
    let w_self = 1.0 - w_from_0;
    assert_abs_diff_eq!(propagated.aggregated[[0, 0, 0]], 1.0, epsilon = 1e-6);
    assert_abs_diff_eq!(
        propagated.aggregated[[1, 0, 0]],
        w_from_0 * 1.0 + w_self * 3.0,
        epsilon = 1e-5
    );
}

#[test]
fn test_segment_uses_negative_slope() {
    let mut rng = StdRng::seed_from_u64(0);
    let mut attention = SegmentSoftmax::new(1, 1, 0.5, &mut rng);
    attention
        .set_attention_vectors(array![[0.0]], array![[1.0]])
        .unwrap();
    // 节点1的两条入边得分分别为 LeakyReLU(-2) = -1 和 LeakyReLU(0) = 0
    let graph = Graph::new(2, vec![(0, 1)]).unwrap().add_self_loops().unwrap();
    let x = array![[[-2.0f32]], [[0.0]]];

    let propagated = attention.propagate(&x, &graph, 0.0, &mut ForwardContext::eval()).unwrap();
    let AttentionWeights::PerEdge { weights, .. } = propagated.weights else {
        panic!("SegmentSoftmax应返回逐边权重");
    };
    let expected = 1.0 / (1.0 + 1f32.exp());
    assert_abs_diff_eq!(weights[[0, 0]], expected, epsilon = 1e-6);
}

#[test]
fn test_segment_attention_vectors_use_tensor_fans() {
    let mut rng = StdRng::seed_from_u64(3);
    let attention = SegmentSoftmax::new(8, 8, 0.2, &mut rng);
    // fan_in = 8 × 8，fan_out = 8
    let bound = (6.0f32 / 72.0).sqrt();
    for att in [attention.att_src(), attention.att_dst()] {
        assert_eq!(att.shape(), &[8, 8]);
        assert!(att.iter().all(|v| v.abs() <= bound));
        assert!(att.iter().any(|v| v.abs() > bound / 2.0));
    }
}

#[test]
fn test_segment_rejects_mismatched_features() {
    let mut rng = StdRng::seed_from_u64(0);
    let attention = SegmentSoftmax::new(2, 3, 0.2, &mut rng);
    let graph = Graph::empty(4).add_self_loops().unwrap();
    let x = random_projected(4, 2, 5, 1);
    assert_err!(
        attention.propagate(&x, &graph, 0.0, &mut ForwardContext::eval()),
        GatError::ShapeMismatch([4, 2, 3], [4, 2, 5], "投影后的节点特征与注意力参数不一致")
    );
}

#[test]
fn test_segment_attention_vectors_shape_is_fixed() {
    let mut rng = StdRng::seed_from_u64(0);
    let mut attention = SegmentSoftmax::new(2, 3, 0.2, &mut rng);
    assert_err!(
        attention.set_attention_vectors(Array2::zeros((2, 3)), Array2::zeros((3, 2))),
        GatError::ShapeMismatch { .. }
    );
    assert_eq!(attention.att_src().shape(), &[2, 3]);
}

// ==================== DenseNeighborhood ====================

#[test]
fn test_dense_rows_sum_to_one() {
    let attention = DenseNeighborhood::new(4);
    let graph = ring_with_chords().add_self_loops().unwrap();
    let x = random_projected(5, 2, 4, 3);

    let propagated = attention.propagate(&x, &graph, 0.0, &mut ForwardContext::eval()).unwrap();
    let AttentionWeights::PerNeighborhood(neighborhoods) = propagated.weights else {
        panic!("DenseNeighborhood应返回逐邻域权重");
    };
    assert_eq!(neighborhoods.len(), 5);
    for nb in &neighborhoods {
        let k = graph.in_degree(nb.node);
        assert_eq!(nb.sources.len(), k);
        assert_eq!(nb.weights.shape(), &[2, k, k]);
        for row_sum in nb.weights.sum_axis(Axis(2)).iter() {
            assert_abs_diff_eq!(*row_sum, 1.0, epsilon = 1e-5);
        }
    }
    // 节点2的入边依次为 1->2、0->2、0->2、自环
    assert_eq!(neighborhoods[2].sources, vec![1, 0, 0, 2]);
}

#[test]
fn test_dense_isolated_node_returns_own_features() {
    let attention = DenseNeighborhood::new(3);
    let graph = Graph::empty(2).add_self_loops().unwrap();
    let x = random_projected(2, 2, 3, 5);

    let propagated = attention.propagate(&x, &graph, 0.0, &mut ForwardContext::eval()).unwrap();
    for (got, want) in propagated.aggregated.iter().zip(x.iter()) {
        assert_abs_diff_eq!(*got, *want, epsilon = 1e-6);
    }
}

#[test]
fn test_dense_matches_hand_computation() {
    let attention = DenseNeighborhood::new(2);
    let graph = Graph::new(3, vec![(0, 2)]).unwrap().add_self_loops().unwrap();
    let x = array![[[1.0f32, 0.0]], [[5.0, 5.0]], [[0.0, 1.0]]];

    let propagated = attention.propagate(&x, &graph, 0.0, &mut ForwardContext::eval()).unwrap();

    // 两个正交的单位向量：每行 softmax 后为[a, b]与[b, a]，对槽位取平均后各分量都是(a + b) / 2 = 0.5
    assert_abs_diff_eq!(propagated.aggregated[[2, 0, 0]], 0.5, epsilon = 1e-6);
    assert_abs_diff_eq!(propagated.aggregated[[2, 0, 1]], 0.5, epsilon = 1e-6);
}

#[test]
fn test_strategies_are_not_equivalent() {
    let mut rng = StdRng::seed_from_u64(21);
    let segment = SegmentSoftmax::new(2, 4, 0.2, &mut rng);
    let dense = DenseNeighborhood::new(4);
    let graph = ring_with_chords().add_self_loops().unwrap();
    let x = random_projected(5, 2, 4, 8);

    let a = segment.propagate(&x, &graph, 0.0, &mut ForwardContext::eval()).unwrap();
    let b = dense.propagate(&x, &graph, 0.0, &mut ForwardContext::eval()).unwrap();
    let max_diff = a
        .aggregated
        .iter()
        .zip(b.aggregated.iter())
        .map(|(p, q)| (p - q).abs())
        .fold(0.0f32, f32::max);
    assert!(max_diff > 1e-3);
}

// ==================== dropout ====================

#[test]
fn test_training_dropout_is_reproducible_with_seed() {
    let mut init_rng = StdRng::seed_from_u64(2);
    let segment = SegmentSoftmax::new(2, 3, 0.2, &mut init_rng);
    let graph = ring_with_chords().add_self_loops().unwrap();
    let x = random_projected(5, 2, 3, 4);

    let run = |seed: u64| {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut ctx = ForwardContext::train(&mut rng);
        segment.propagate(&x, &graph, 0.5, &mut ctx).unwrap()
    };
    let first = run(99);
    let second = run(99);
    assert_eq!(first.aggregated, second.aggregated);

    // 返回的是 dropout 之前的权重，仍然归一化
    let AttentionWeights::PerEdge { weights, .. } = first.weights else {
        panic!("SegmentSoftmax应返回逐边权重");
    };
    for node in 0..5 {
        let total: f32 = graph.incoming(node).iter().map(|&e| weights[[e, 0]]).sum();
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-5);
    }

    let eval = segment.propagate(&x, &graph, 0.5, &mut ForwardContext::eval()).unwrap();
    assert_ne!(first.aggregated, eval.aggregated);
}

#[test]
fn test_dense_dropout_is_identity_in_eval_mode() {
    let dense = DenseNeighborhood::new(3);
    let graph = ring_with_chords().add_self_loops().unwrap();
    let x = random_projected(5, 1, 3, 4);

    let with_dropout = dense.propagate(&x, &graph, 0.9, &mut ForwardContext::eval()).unwrap();
    let without = dense.propagate(&x, &graph, 0.0, &mut ForwardContext::eval()).unwrap();
    assert_eq!(with_dropout.aggregated, without.aggregated);
}

#[test]
fn test_dense_head_dim_one_rows_sum_to_one() {
    let attention = DenseNeighborhood::new(1);
    let graph = Graph::new(2, vec![(0, 1)]).unwrap().add_self_loops().unwrap();
    let x = array![[[1.0f32]], [[3.0]]];

    let propagated = attention.propagate(&x, &graph, 0.0, &mut ForwardContext::eval()).unwrap();
    let AttentionWeights::PerNeighborhood(neighborhoods) = propagated.weights else {
        panic!("DenseNeighborhood应返回逐邻域权重");
    };
    // 节点1的邻居槽位：[0, 1]，得分矩阵为[[1, 3], [3, 9]]
    let node1 = &neighborhoods[1];
    assert_eq!(node1.sources, vec![0, 1]);
    for row_sum in node1.weights.sum_axis(Axis(2)).iter() {
        assert_abs_diff_eq!(*row_sum, 1.0, epsilon = 1e-5);
    }

    let a = 1.0 / (1.0 + 2f32.exp());
    let b = 1.0 / (1.0 + 6f32.exp());
    let expected = ((a + 3.0 * (1.0 - a)) + (b + 3.0 * (1.0 - b))) / 2.0;
    assert_abs_diff_eq!(propagated.aggregated[[1, 0, 0]], expected, epsilon = 1e-5);
    assert_abs_diff_eq!(propagated.aggregated[[0, 0, 0]], 1.0, epsilon = 1e-6);
}

#[test]
fn test_dense_training_dropout_is_reproducible_with_seed() {
    let dense = DenseNeighborhood::new(3);
    let graph = ring_with_chords().add_self_loops().unwrap();
    let x = random_projected(5, 2, 3, 4);

    let run = |seed: u64| {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut ctx = ForwardContext::train(&mut rng);
        dense.propagate(&x, &graph, 0.5, &mut ctx).unwrap()
    };
    let first = run(5);
    let second = run(5);
    assert_eq!(first.aggregated, second.aggregated);

    let eval = dense.propagate(&x, &graph, 0.5, &mut ForwardContext::eval()).unwrap();
    assert_ne!(first.aggregated, eval.aggregated);

    // 返回的是 dropout 之前的权重
    assert_eq!(first.weights, eval.weights);
}
