use anyhow::{ensure, Result};
use candle_core::Tensor;

/// Mean of each sequence's unmasked token states, scaled to unit length.
///
/// `hidden` is `[batch, tokens, width]` and `mask` is `[batch, tokens]` with 1
/// for real tokens. A row whose mask is all zero pools to the zero vector.
pub fn mean_pool_normalized(hidden: &Tensor, mask: &Tensor) -> Result<Tensor> {
    let (batch, tokens, width) = hidden.dims3()?;
    let (mask_batch, mask_tokens) = mask.dims2()?;
    ensure!(
        (mask_batch, mask_tokens) == (batch, tokens),
        "mask is [{mask_batch}, {mask_tokens}] but hidden states are [{batch}, {tokens}, {width}]"
    );

    let weights = mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?;
    let summed = hidden.broadcast_mul(&weights.unsqueeze(2)?)?.sum(1)?;
    let counts = weights.sum_keepdim(1)?.maximum(1.0)?;
    let mean = summed.broadcast_div(&counts)?;
    let norms = mean.sqr()?.sum_keepdim(1)?.sqrt()?.maximum(1e-12)?;
    Ok(mean.broadcast_div(&norms)?)
}
