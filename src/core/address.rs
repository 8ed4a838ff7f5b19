// Address rendering
//
// Human-facing addresses are "AUR" + Base58(pubkey hash). The ledger never
// parses them back; script_pubkey carries address bytes verbatim.

use crate::constants::ADDRESS_PREFIX;
use crate::core::hash160;

const BASE58_ALPHABET: &[u8; 58] =
    b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Base58 encode (Bitcoin alphabet, leading zero bytes become '1's)
pub fn base58_encode(input: &[u8]) -> String {
    let zeros = input.iter().take_while(|b| **b == 0).count();

    let mut digits = vec![0u8; input.len() * 138 / 100 + 1];
    for &byte in &input[zeros..] {
        let mut carry = byte as u32;
        for digit in digits.iter_mut().rev() {
            carry += 256 * (*digit as u32);
            *digit = (carry % 58) as u8;
            carry /= 58;
        }
    }

    let mut result = String::with_capacity(zeros + digits.len());
    for _ in 0..zeros {
        result.push('1');
    }
    for &digit in digits.iter().skip_while(|d| **d == 0) {
        result.push(BASE58_ALPHABET[digit as usize] as char);
    }
    result
}

/// Render an address from a 20-byte pubkey hash
pub fn from_pubkey_hash(pubkey_hash: &[u8]) -> String {
    format!("{}{}", ADDRESS_PREFIX, base58_encode(pubkey_hash))
}

/// Render an address from a raw public key
pub fn from_pubkey(pubkey: &[u8]) -> String {
    from_pubkey_hash(&hash160(pubkey))
}
