use approx::assert_abs_diff_eq;
use ndarray::array;
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::random_features;
use crate::assert_err;
use crate::errors::GatError;
use crate::graph::Graph;
use crate::nn::{ForwardContext, GcnConv, GcnNetwork};

#[test]
fn test_gcn_conv_uses_symmetric_normalization() {
    let mut rng = StdRng::seed_from_u64(0);
    let mut conv = GcnConv::new(1, 1, false, "gc", &mut rng).unwrap();
    conv.set_weights(array![[1.0]]).unwrap();

    // 0 -> 1：增广后 deg(0) = 1，deg(1) = 2
    let graph = Graph::new(2, vec![(0, 1)]).unwrap().add_self_loops().unwrap();
    let out = conv.forward_augmented(&array![[2.0f32], [4.0]], &graph).unwrap();
    assert_abs_diff_eq!(out[[0, 0]], 2.0, epsilon = 1e-6);
    assert_abs_diff_eq!(out[[1, 0]], 2.0 / 2f32.sqrt() + 4.0 * 0.5, epsilon = 1e-5);
}

#[test]
fn test_gcn_conv_parameter_bounds() {
    let mut rng = StdRng::seed_from_u64(0);
    let conv = GcnConv::new(8, 4, true, "gc", &mut rng).unwrap();
    assert_eq!(conv.in_dim(), 8);
    assert_eq!(conv.out_dim(), 4);
    assert!(conv.bias().unwrap().iter().all(|b| b.abs() <= 0.5));
    assert_err!(GcnConv::new(0, 4, true, "gc", &mut rng), GatError::ConfigurationError(_));
}

#[test]
fn test_gcn_network_outputs_log_probabilities() {
    let mut rng = StdRng::seed_from_u64(4);
    let network = GcnNetwork::new(5, 8, 3, 0.5, &mut rng).unwrap();
    let graph = Graph::new(4, vec![(0, 1), (1, 0), (2, 3)]).unwrap();
    let x = random_features(4, 5, 3);

    let out = network.forward(&x, &graph, &mut ForwardContext::eval()).unwrap();
    assert_eq!(out.shape(), &[4, 3]);
    for row in out.rows() {
        let total: f32 = row.iter().map(|v| v.exp()).sum();
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-5);
    }

    let mut dropout_rng = StdRng::seed_from_u64(1);
    let trained = network
        .forward(&x, &graph, &mut ForwardContext::train(&mut dropout_rng))
        .unwrap();
    assert!(trained.iter().all(|v| v.is_finite()));
}

#[test]
fn test_gcn_network_rejects_invalid_dropout() {
    let mut rng = StdRng::seed_from_u64(4);
    assert_err!(
        GcnNetwork::new(5, 8, 3, 1.5, &mut rng),
        GatError::ConfigurationError(msg) if msg.contains("dropout")
    );
}
