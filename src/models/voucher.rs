use chrono::Utc;
use rand::Rng;

const BASE36: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap()
}

/// Номер талона: "VT" + миллисекунды в base36 + 5 случайных символов.
/// Уникальность практическая, по базе не проверяется.
pub fn generate_voucher_number() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let mut rng = rand::thread_rng();
    let suffix: String = (0..5)
        .map(|_| BASE36[rng.gen_range(0..36)] as char)
        .collect();
    format!("VT{}{}", to_base36(millis), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base36_encodes_known_values() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "Z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(36 * 36 + 1), "101");
    }

    #[test]
    fn number_has_prefix_and_charset() {
        let n = generate_voucher_number();
        assert!(n.starts_with("VT"));
        assert!(n.len() > 7);
        assert!(n.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(n, n.to_uppercase());
    }

    #[test]
    fn consecutive_numbers_differ() {
        let a = generate_voucher_number();
        let b = generate_voucher_number();
        assert_ne!(a, b);
    }
}
