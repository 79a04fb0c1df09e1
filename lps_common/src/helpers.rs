/// Checks an order number against the Luhn checksum. Empty strings and strings containing anything other than ASCII
/// digits are never valid.
pub fn is_valid_luhn(number: &str) -> bool {
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let sum = number.bytes().rev().enumerate().fold(0u32, |acc, (i, b)| {
        let mut digit = u32::from(b - b'0');
        if i % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        acc + digit
    });
    sum % 10 == 0
}
