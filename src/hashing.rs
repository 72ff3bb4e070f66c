//! Canonical request hashing for idempotency-key fingerprinting.
//!
//! The canonical form sorts object keys, renders `product_id` as a
//! lowercase hex UUID string, renders quantities as JSON integers, and
//! contains no incidental whitespace, so two semantically identical
//! requests always hash to the same value regardless of field order or
//! client JSON serialization quirks.

use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Serialize)]
struct CanonicalItem {
    product_id: String,
    quantity: i32,
}

#[derive(Serialize)]
struct CanonicalRequest {
    user_email: String,
    items: Vec<CanonicalItem>,
}

/// One line of a create-order request, as needed to compute its fingerprint.
pub struct HashableLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// `SHA-256(canonical_json({user_email, items}))`, hex-lowercase.
///
/// Items are sorted by `(product_id, original index)` before rendering, so
/// two requests differing only in item order produce the same hash, while
/// duplicate product ids remain distinguishable by their original position.
pub fn request_hash(user_email: &str, lines: &[HashableLine]) -> String {
    let mut indexed: Vec<(usize, &HashableLine)> = lines.iter().enumerate().collect();
    indexed.sort_by(|a, b| a.1.product_id.cmp(&b.1.product_id).then(a.0.cmp(&b.0)));

    let canonical = CanonicalRequest {
        user_email: user_email.to_string(),
        items: indexed
            .into_iter()
            .map(|(_, line)| CanonicalItem {
                product_id: line.product_id.to_string(),
                quantity: line.quantity,
            })
            .collect(),
    };

    // serde_json's map serialization for structs preserves declaration
    // order, which is already sorted (user_email, items); no whitespace is
    // emitted by `to_vec`/`to_string` without pretty-printing.
    let json = serde_json::to_vec(&canonical).expect("canonical request is always serializable");

    let mut hasher = Sha256::new();
    hasher.update(&json);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uuid(n: u8) -> Uuid {
        Uuid::from_bytes([n; 16])
    }

    #[test]
    fn same_items_different_order_same_hash() {
        let a = request_hash(
            "a@example.com",
            &[
                HashableLine {
                    product_id: uuid(1),
                    quantity: 2,
                },
                HashableLine {
                    product_id: uuid(2),
                    quantity: 3,
                },
            ],
        );
        let b = request_hash(
            "a@example.com",
            &[
                HashableLine {
                    product_id: uuid(2),
                    quantity: 3,
                },
                HashableLine {
                    product_id: uuid(1),
                    quantity: 2,
                },
            ],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn different_quantity_different_hash() {
        let a = request_hash(
            "a@example.com",
            &[HashableLine {
                product_id: uuid(1),
                quantity: 1,
            }],
        );
        let b = request_hash(
            "a@example.com",
            &[HashableLine {
                product_id: uuid(1),
                quantity: 2,
            }],
        );
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_64_char_lowercase_hex() {
        let h = request_hash(
            "a@example.com",
            &[HashableLine {
                product_id: uuid(1),
                quantity: 1,
            }],
        );
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
    }
}
