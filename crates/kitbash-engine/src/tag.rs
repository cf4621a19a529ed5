//! Deterministic image tags.

use kitbash_common::constants::TAG_HASH_LENGTH;
use kitbash_common::error::Result;
use kitbash_common::types::ImageReference;
use sha2::{Digest, Sha256};

/// Tag for an activation of `extensions` on `base_image`.
///
/// `<prefix>_<sanitized base>_<hash>`, where the hash covers the base
/// image and the extension names in activation order.
///
/// # Errors
///
/// Returns an error if `base_image` is not a valid image reference.
pub fn image_tag(prefix: &str, base_image: &str, extensions: &[&str]) -> Result<String> {
    let reference = ImageReference::parse(base_image)?;
    let mut hasher = Sha256::new();
    hasher.update(base_image.as_bytes());
    for name in extensions {
        hasher.update([0]);
        hasher.update(name.as_bytes());
    }
    let digest: String = hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .take(TAG_HASH_LENGTH.div_ceil(2))
        .collect();
    Ok(format!(
        "{prefix}_{}_{}",
        reference.sanitized(),
        &digest[..TAG_HASH_LENGTH]
    ))
}
