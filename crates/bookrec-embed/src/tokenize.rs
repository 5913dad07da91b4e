use anyhow::{anyhow, Result};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

/// Padding token id of the XLM-RoBERTa vocabulary.
pub const PAD_ID: u32 = 1;

/// Encode `texts` into `[batch, len]` id and attention-mask tensors. `len` is
/// the longest encoding in the batch, capped at `max_len`; shorter rows are
/// padded with [`PAD_ID`] and a zero mask.
pub fn encode_batch(tokenizer: &Tokenizer, texts: &[String], max_len: usize, device: &Device) -> Result<(Tensor, Tensor)> {
    let encodings = tokenizer.encode_batch(texts.to_vec(), true).map_err(|e| anyhow!("tokenization failed: {}", e))?;
    let len = encodings.iter().map(|e| e.get_ids().len().min(max_len)).max().unwrap_or(0).max(1);

    let mut ids = Vec::with_capacity(encodings.len() * len);
    let mut mask = Vec::with_capacity(encodings.len() * len);
    for enc in &encodings {
        let n = enc.get_ids().len().min(len);
        ids.extend_from_slice(&enc.get_ids()[..n]);
        mask.extend_from_slice(&enc.get_attention_mask()[..n]);
        ids.extend(std::iter::repeat(PAD_ID).take(len - n));
        mask.extend(std::iter::repeat(0u32).take(len - n));
    }
    let shape = (encodings.len(), len);
    Ok((Tensor::from_vec(ids, shape, device)?, Tensor::from_vec(mask, shape, device)?))
}
