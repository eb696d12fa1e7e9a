//! Small string helpers shared by the network adapters.

/// Every byte in `0x20..=0x7E`. SSIDs and broker identities must pass this
/// before they reach a C driver.
pub(super) fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

/// Copy `s` into a fixed-capacity string, cutting at the last char
/// boundary that fits.
pub(super) fn truncated<const N: usize>(s: &str) -> heapless::String<N> {
    let mut end = s.len().min(N);
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = heapless::String::new();
    let _ = out.push_str(&s[..end]);
    out
}
