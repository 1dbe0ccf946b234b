use super::*;
use rand::SeedableRng;

fn tiny_config() -> NetConfig {
    NetConfig {
        input_dim: 4,
        hidden_dims: vec![3],
        n_classes: 3,
        dropout: 0.0,
    }
}

fn sample_batch() -> Matrix {
    Matrix::from_vec(
        2,
        4,
        vec![1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0],
    )
    .expect("valid shape")
}

#[test]
fn test_predict_proba_rows_sum_to_one() {
    let net = InteractionNet::new(&tiny_config(), Some(42)).expect("valid config");
    let probs = net.predict_proba(&sample_batch()).expect("matching width");
    assert_eq!(probs.shape(), (2, 3));
    for i in 0..2 {
        let sum: f32 = probs.row(i).iter().sum();
        assert!((sum - 1.0).abs() < 1e-5, "row {i} sums to {sum}");
        assert!(probs.row(i).iter().all(|&p| p >= 0.0));
    }
}

#[test]
fn test_softmax_stable_for_large_logits() {
    let mut m = Matrix::from_vec(1, 3, vec![1000.0, 1001.0, 999.0]).expect("valid shape");
    softmax_rows(&mut m);
    let row = m.row(0);
    assert!(row.iter().all(|p| p.is_finite()));
    assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    assert!(row[1] > row[0] && row[0] > row[2]);
}

#[test]
fn test_flat_round_trip() {
    let net = InteractionNet::new(&tiny_config(), Some(7)).expect("valid config");
    let flat = net.to_flat();
    let rebuilt =
        InteractionNet::from_flat(&net.dims(), net.dropout(), &flat).expect("valid buffer");
    assert_eq!(rebuilt, net);
}

#[test]
fn test_from_flat_rejects_wrong_length() {
    let err = InteractionNet::from_flat(&[4, 3, 3], 0.0, &[0.0; 5]).expect_err("too short");
    assert!(matches!(err, FarmacoError::DimensionMismatch { .. }));
    assert!(InteractionNet::from_flat(&[4], 0.0, &[]).is_err());
}

#[test]
fn test_invalid_config_rejected() {
    let mut config = tiny_config();
    config.dropout = 1.0;
    assert!(InteractionNet::new(&config, None).is_err());

    let mut config = tiny_config();
    config.input_dim = 0;
    assert!(InteractionNet::new(&config, None).is_err());

    let mut config = tiny_config();
    config.hidden_dims = vec![0];
    assert!(InteractionNet::new(&config, None).is_err());
}

#[test]
fn test_forward_train_matches_inference_without_dropout() {
    let net = InteractionNet::new(&tiny_config(), Some(3)).expect("valid config");
    let x = sample_batch();
    let mut rng = rand::rngs::StdRng::seed_from_u64(0);
    let cache = net.forward_train(&x, &mut rng).expect("matching width");

    let mut probs_from_cache = cache.logits().clone();
    softmax_rows(&mut probs_from_cache);
    let probs = net.predict_proba(&x).expect("matching width");
    assert_eq!(probs_from_cache, probs);
}

#[test]
fn test_dropout_zeroes_activations() {
    let config = NetConfig {
        input_dim: 4,
        hidden_dims: vec![64],
        n_classes: 3,
        dropout: 0.5,
    };
    let net = InteractionNet::new(&config, Some(5)).expect("valid config");
    let x = Matrix::from_vec(1, 4, vec![1.0, 1.0, 1.0, 1.0]).expect("valid shape");
    let mut rng = rand::rngs::StdRng::seed_from_u64(11);
    let a = net.forward_train(&x, &mut rng).expect("ok");
    let mut rng = rand::rngs::StdRng::seed_from_u64(12);
    let b = net.forward_train(&x, &mut rng).expect("ok");
    // Different dropout draws must change the logits.
    assert_ne!(a.logits(), b.logits());
}

#[test]
fn test_backward_gradients_match_finite_differences() {
    let mut net = InteractionNet::new(&tiny_config(), Some(42)).expect("valid config");
    let x = sample_batch();
    let targets = [2usize, 0];
    let weights = [1.0f32, 1.0, 1.0];

    let loss_of = |net: &InteractionNet| -> f32 {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0);
        let cache = net.forward_train(&x, &mut rng).expect("ok");
        let (loss, _) = net.backward(&cache, &targets, &weights).expect("ok");
        loss
    };

    let mut rng = rand::rngs::StdRng::seed_from_u64(0);
    let cache = net.forward_train(&x, &mut rng).expect("ok");
    let (_, grads) = net.backward(&cache, &targets, &weights).expect("ok");
    let analytic: Vec<f32> = grads
        .iter()
        .flat_map(|g| {
            g.weights
                .as_slice()
                .iter()
                .chain(g.bias.iter())
                .copied()
                .collect::<Vec<f32>>()
        })
        .collect();

    let eps = 1e-3f32;
    let n_params = net.to_flat().len();
    assert_eq!(analytic.len(), n_params);
    for idx in 0..n_params {
        let numeric = {
            let bump = |net: &mut InteractionNet, delta: f32| {
                let mut flat_idx = 0;
                for buf in net.params_mut() {
                    if idx < flat_idx + buf.len() {
                        buf[idx - flat_idx] += delta;
                        return;
                    }
                    flat_idx += buf.len();
                }
            };
            bump(&mut net, eps);
            let plus = loss_of(&net);
            bump(&mut net, -2.0 * eps);
            let minus = loss_of(&net);
            bump(&mut net, eps);
            (plus - minus) / (2.0 * eps)
        };
        let diff = (analytic[idx] - numeric).abs();
        assert!(
            diff < 1e-2,
            "param {idx}: analytic {} vs numeric {numeric}",
            analytic[idx]
        );
    }
}

#[test]
fn test_class_weights_scale_loss() {
    let net = InteractionNet::new(&tiny_config(), Some(9)).expect("valid config");
    let x = sample_batch();
    let targets = [2usize, 2];
    let mut rng = rand::rngs::StdRng::seed_from_u64(0);
    let cache = net.forward_train(&x, &mut rng).expect("ok");

    let (uniform, _) = net.backward(&cache, &targets, &[1.0, 1.0, 1.0]).expect("ok");
    let (upweighted, _) = net
        .backward(&cache, &targets, &[1.0, 1.0, 4.0])
        .expect("ok");
    // Both rows share the target class, so the weighted mean is unchanged.
    assert!((uniform - upweighted).abs() < 1e-5);
}

#[test]
fn test_backward_rejects_bad_targets() {
    let net = InteractionNet::new(&tiny_config(), Some(1)).expect("valid config");
    let x = sample_batch();
    let mut rng = rand::rngs::StdRng::seed_from_u64(0);
    let cache = net.forward_train(&x, &mut rng).expect("ok");

    assert!(net.backward(&cache, &[0], &[1.0, 1.0, 1.0]).is_err());
    assert!(net.backward(&cache, &[0, 9], &[1.0, 1.0, 1.0]).is_err());
    assert!(net.backward(&cache, &[0, 1], &[1.0]).is_err());
}

#[test]
fn test_gradient_step_reduces_loss() {
    let mut net = InteractionNet::new(&tiny_config(), Some(13)).expect("valid config");
    let x = sample_batch();
    let targets = [1usize, 0];
    let weights = [1.0f32, 1.0, 1.0];

    let loss_of = |net: &InteractionNet| {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0);
        let cache = net.forward_train(&x, &mut rng).expect("ok");
        net.backward(&cache, &targets, &weights).expect("ok").0
    };

    let before = loss_of(&net);
    for _ in 0..20 {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0);
        let cache = net.forward_train(&x, &mut rng).expect("ok");
        let (_, grads) = net.backward(&cache, &targets, &weights).expect("ok");
        let mut params = net.params_mut();
        for (buf, grad) in params.iter_mut().zip(grads.iter().flat_map(|g| {
            [g.weights.as_slice(), g.bias.as_slice()]
        })) {
            for (p, g) in buf.iter_mut().zip(grad) {
                *p -= 0.1 * g;
            }
        }
    }
    let after = loss_of(&net);
    assert!(after < before, "loss went {before} -> {after}");
}
