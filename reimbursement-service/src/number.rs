use rand::RngCore;

pub const NUMBER_PREFIX: &str = "RI";
pub const NUMBER_DIGITS: usize = 9;

const NUMBER_SPACE: u64 = 1_000_000_000;

/// `RI` followed by nine digits drawn from the supplied source.
pub fn generate_number<R: RngCore + ?Sized>(rng: &mut R) -> String {
    format!("{NUMBER_PREFIX}{:0width$}", rng.next_u64() % NUMBER_SPACE, width = NUMBER_DIGITS)
}

pub fn is_valid_number(candidate: &str) -> bool {
    match candidate.strip_prefix(NUMBER_PREFIX) {
        Some(digits) => digits.len() == NUMBER_DIGITS && digits.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}
