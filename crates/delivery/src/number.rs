/// Width delivery numbers are zero-padded to.
pub const NUMBER_WIDTH: usize = 9;

/// Render a warehouse counter value as a delivery number.
///
/// `1` becomes `000000001`; values wider than nine digits are kept as is.
pub fn format_number(counter: u64) -> String {
    format!("{counter:0width$}", width = NUMBER_WIDTH)
}
