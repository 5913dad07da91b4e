use std::collections::HashMap;

use candle_core::{DType, Device, Tensor};
use tokenizers::models::wordlevel::WordLevel;
use tokenizers::Tokenizer;

use bookrec_embed::{encode_batch, mean_pool_normalized, PAD_ID};

#[test]
fn pooling_ignores_masked_tokens() {
    let dev = Device::Cpu;
    // one sequence, two tokens of width 4; the second token is padding
    let h = Tensor::from_slice(&[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], (1, 2, 4), &dev).unwrap();
    let mask = Tensor::from_slice(&[1u32, 0], (1, 2), &dev).unwrap();
    let v: Vec<Vec<f32>> = mean_pool_normalized(&h, &mask).unwrap().to_vec2().unwrap();
    let norm = 30f32.sqrt();
    for (a, b) in v[0].iter().zip([1.0 / norm, 2.0 / norm, 3.0 / norm, 4.0 / norm]) {
        assert!((a - b).abs() < 1e-5, "a={a} b={b}");
    }
}

#[test]
fn pooling_a_fully_masked_row_gives_zeros() {
    let dev = Device::Cpu;
    let h = Tensor::ones((2, 3, 2), DType::F32, &dev).unwrap();
    let mask = Tensor::from_slice(&[1u32, 1, 1, 0, 0, 0], (2, 3), &dev).unwrap();
    let v: Vec<Vec<f32>> = mean_pool_normalized(&h, &mask).unwrap().to_vec2().unwrap();
    assert!((v[0][0] - 0.5f32.sqrt()).abs() < 1e-5);
    assert_eq!(v[1], vec![0.0, 0.0]);
}

#[test]
fn pooling_rejects_mismatched_shapes() {
    let dev = Device::Cpu;
    let rank_two = Tensor::from_slice(&[1.0f32, 2.0], (1, 2), &dev).unwrap();
    let mask = Tensor::from_slice(&[1u32], (1, 1), &dev).unwrap();
    assert!(mean_pool_normalized(&rank_two, &mask).is_err());

    let h = Tensor::ones((1, 3, 2), DType::F32, &dev).unwrap();
    assert!(mean_pool_normalized(&h, &mask).is_err());
}

#[test]
fn batch_encoding_pads_to_longest_row() {
    let vocab: HashMap<String, u32> = [("<unk>", 0u32), ("<pad>", 1), ("whale", 5)].into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    let model = WordLevel::builder().vocab(vocab).unk_token("<unk>".to_string()).build().unwrap();
    let tokenizer = Tokenizer::new(model);

    let texts = vec!["whale".to_string(), String::new()];
    let (ids, mask) = encode_batch(&tokenizer, &texts, 8, &Device::Cpu).unwrap();
    assert_eq!(ids.dims(), &[2, 1]);
    assert_eq!(ids.to_vec2::<u32>().unwrap(), vec![vec![5], vec![PAD_ID]]);
    assert_eq!(mask.to_vec2::<u32>().unwrap(), vec![vec![1], vec![0]]);
}
