//! Phone number helpers.

/// Strip whitespace, dashes and parentheses so that differently formatted
/// numbers compare equal.
#[must_use]
pub fn normalize_phone(phone: &str) -> String {
    phone
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '(' | ')'))
        .collect()
}

/// Partially mask a phone number for display.
///
/// Keeps the first three characters and the last one and replaces the rest
/// with `*`. A ten-digit local number therefore shows as `024******7`.
/// Numbers shorter than four characters are returned unchanged.
#[must_use]
pub fn mask_phone(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    let len = chars.len();
    if len < 4 {
        return phone.to_string();
    }

    let mut masked = String::with_capacity(phone.len());
    masked.extend(&chars[..3]);
    masked.extend(std::iter::repeat_n('*', len - 4));
    masked.push(chars[len - 1]);
    masked
}
