//! MAC address normalization and OUI extraction
//!
//! Inventory sources report MACs in several shapes (`aa:bb:cc:dd:ee:ff`,
//! `AA-BB-CC-DD-EE-FF`, `aabb.ccdd.eeff`, bare hex). Everything is folded into
//! the canonical uppercase colon-separated form before comparison.

/// Number of octets in an OUI prefix
pub const OUI_OCTETS: usize = 3;

/// Number of octets in a full MAC address
pub const MAC_OCTETS: usize = 6;

fn parse_hex_pairs(digits: &str) -> Option<Vec<u8>> {
    if digits.is_empty()
        || digits.len() % 2 != 0
        || !digits.bytes().all(|b| b.is_ascii_hexdigit())
    {
        return None;
    }
    digits
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|p| u8::from_str_radix(p, 16).ok())
        })
        .collect()
}

/// Parse the octets of a MAC in any of the accepted shapes.
///
/// `:` and `-` separated groups may drop the leading zero (`0:9:18`), so each
/// group is one or two hex digits. Dotted and bare forms must carry an even
/// number of digits.
fn parse_octets(raw: &str) -> Option<Vec<u8>> {
    let raw = raw.trim();
    if raw.contains([':', '-']) {
        return raw
            .split([':', '-'])
            .map(|group| match group.len() {
                1 | 2 if group.chars().all(|c| c.is_ascii_hexdigit()) => {
                    u8::from_str_radix(group, 16).ok()
                }
                _ => None,
            })
            .collect();
    }
    if raw.contains('.') {
        if raw.split('.').any(|group| group.len() != 4) {
            return None;
        }
        return parse_hex_pairs(&raw.replace('.', ""));
    }
    parse_hex_pairs(raw)
}

fn join_octets(octets: &[u8]) -> String {
    octets
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

/// Normalize a MAC address into uppercase colon-separated octets.
///
/// Requires exactly six octets. Malformed input yields `None`.
pub fn normalize_mac(raw: &str) -> Option<String> {
    let octets = parse_octets(raw)?;
    (octets.len() == MAC_OCTETS).then(|| join_octets(&octets))
}

/// Extract the OUI (first three octets) as `AA:BB:CC`.
///
/// Accepts a bare OUI as well as a full address.
pub fn oui_prefix(raw: &str) -> Option<String> {
    let octets = parse_octets(raw)?;
    if octets.len() < OUI_OCTETS || octets.len() > MAC_OCTETS {
        return None;
    }
    Some(join_octets(&octets[..OUI_OCTETS]))
}
