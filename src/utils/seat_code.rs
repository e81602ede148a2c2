use rand::Rng;

pub const SEAT_CODE_LEN: usize = 14;

const MIN_CODE: u64 = 10_000_000_000_000;
const MAX_CODE: u64 = 100_000_000_000_000;

/// Random 14-digit numeric code without a leading zero.
pub fn generate_seat_code<R: Rng>(rng: &mut R) -> String {
    rng.gen_range(MIN_CODE..MAX_CODE).to_string()
}

pub fn is_valid_seat_code(code: &str) -> bool {
    code.len() == SEAT_CODE_LEN && code.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_codes_are_fourteen_digits() {
        let mut rng = rand::thread_rng();
        for _ in 0..200 {
            let code = generate_seat_code(&mut rng);
            assert!(is_valid_seat_code(&code), "bad code {}", code);
            assert!(!code.starts_with('0'));
        }
    }

    #[test]
    fn test_code_validation() {
        assert!(is_valid_seat_code("12345678901234"));
        assert!(!is_valid_seat_code("1234567890123"));
        assert!(!is_valid_seat_code("123456789012345"));
        assert!(!is_valid_seat_code("1234567890123a"));
    }
}
