//! Identifier normalization.
//!
//! Every named entity in a spec (spec names, layer ids, asset keys) is an
//! identifier restricted to `[a-z0-9_]+`. [`normalize`] is the strict entry
//! point used by all constructors; [`sanitize_key`] is the lenient variant
//! used when minting asset keys from arbitrary SVG `id` attributes.

use crate::error::{WxError, WxResult};

/// Normalize a free-form name into the identifier alphabet.
///
/// Trims, lowercases, and maps hyphens to underscores. Anything that does
/// not then fully match `[a-z0-9_]+` is rejected.
pub fn normalize(raw: &str) -> WxResult<String> {
    let normalized: String = raw
        .trim()
        .to_ascii_lowercase()
        .replace('-', "_");
    if normalized.is_empty() || !normalized.bytes().all(is_ident_byte) {
        return Err(WxError::InvalidIdentifier(raw.to_string()));
    }
    Ok(normalized)
}

/// Derive an asset key from an optional raw source, falling back to a
/// positional `layer_<index>` key.
///
/// Unlike [`normalize`], invalid characters are squashed to underscores
/// instead of rejected, so arbitrary SVG element ids always yield a key.
pub fn sanitize_key(raw: Option<&str>, index: usize) -> String {
    if let Some(raw) = raw {
        let lowered = raw.trim().to_ascii_lowercase().replace('-', "_");
        let mut cleaned = String::with_capacity(lowered.len());
        let mut last_was_gap = false;
        for b in lowered.bytes() {
            if is_ident_byte(b) {
                cleaned.push(b as char);
                last_was_gap = false;
            } else if !last_was_gap {
                cleaned.push('_');
                last_was_gap = true;
            }
        }
        let cleaned = cleaned.trim_matches('_');
        if !cleaned.is_empty() {
            return cleaned.to_string();
        }
    }
    format!("layer_{index}")
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_lowercases_and_maps_hyphens() {
        assert_eq!(normalize("  Clear-Day ").unwrap(), "clear_day");
        assert_eq!(normalize("sun_2").unwrap(), "sun_2");
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["Clear-Day", "  rain  ", "a-b-c", "x_1"] {
            let once = normalize(raw).unwrap();
            assert_eq!(normalize(&once).unwrap(), once);
        }
    }

    #[test]
    fn normalize_rejects_invalid_results() {
        assert!(normalize("").is_err());
        assert!(normalize("   ").is_err());
        assert!(normalize("sun cloud").is_err());
        assert!(normalize("näbel").is_err());
    }

    #[test]
    fn sanitize_squashes_invalid_runs() {
        assert_eq!(sanitize_key(Some("Sun Ray #2"), 0), "sun_ray_2");
        assert_eq!(sanitize_key(Some("--"), 3), "layer_3");
        assert_eq!(sanitize_key(None, 7), "layer_7");
    }
}
