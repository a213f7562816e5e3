/// Template used when no output name was configured.
pub const DEFAULT_TEMPLATE: &str = "stream_##.dat";

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Expands an output name template for `id`.
///
/// Every `#` is replaced by one lowercase hex digit of `id`, filling from
/// the rightmost `#` with the least significant digit. Digits that do not
/// fit are dropped.
///
/// ```
/// use psdemux::format::ps::naming::stream_file_name;
///
/// assert_eq!(stream_file_name("stream_##.dat", 0xE0), "stream_e0.dat");
/// assert_eq!(stream_file_name("sub_####.sup", 0xBD20), "sub_bd20.sup");
/// ```
pub fn stream_file_name(template: &str, id: u32) -> String {
    let mut id = id;
    let mut name: Vec<char> = template.chars().collect();

    for c in name.iter_mut().rev() {
        if *c == '#' {
            *c = char::from(HEX_DIGITS[(id % 16) as usize]);
            id /= 16;
        }
    }

    name.into_iter().collect()
}
