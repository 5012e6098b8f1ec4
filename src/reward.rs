use rand::Rng;

const ADDRESS_HEX_DIGITS: usize = 40;

/// Generates a reward address: `0x` followed by 40 random lowercase hex digits.
///
/// Not derived from any key; uniqueness relies on the 160-bit space.
pub fn generate_reward_address() -> String {
    let mut rng = rand::thread_rng();
    let mut address = String::with_capacity(2 + ADDRESS_HEX_DIGITS);
    address.push_str("0x");
    for _ in 0..ADDRESS_HEX_DIGITS {
        let digit = rng.gen_range(0..16u32);
        // 0..16 is always a valid radix-16 digit
        address.push(char::from_digit(digit, 16).unwrap_or('0'));
    }
    address
}

/// Returns true if `s` has the shape produced by [`generate_reward_address`].
pub fn is_reward_address(s: &str) -> bool {
    match s.strip_prefix("0x") {
        Some(hex) => {
            hex.len() == ADDRESS_HEX_DIGITS
                && hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
        }
        None => false,
    }
}
