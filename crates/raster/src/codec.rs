//! Encoding of raster window samples for the `raster-window` cache.
//!
//! Values are stored as raw native-endian `f32` bytes.

use bytes::Bytes;

/// Encode samples as bytes.
pub fn encode_samples(samples: &[f32]) -> Bytes {
    Bytes::copy_from_slice(bytemuck::cast_slice(samples))
}

/// Decode cached bytes, returning `None` unless they hold exactly
/// `expected` samples.
pub fn decode_samples(bytes: &[u8], expected: usize) -> Option<Vec<f32>> {
    if bytes.len() != expected * std::mem::size_of::<f32>() {
        return None;
    }
    let mut samples = vec![0.0f32; expected];
    bytemuck::cast_slice_mut::<f32, u8>(&mut samples).copy_from_slice(bytes);
    Some(samples)
}
