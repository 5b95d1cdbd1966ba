//! Bit-field extraction helpers.
//!
//! Buffers are little-endian: byte 0 holds the lowest bits of the value.

/// Shift a little-endian buffer right by `bits`, in place.
///
/// Whole bytes move first, then the residual 1-7 bits, with the vacated high
/// bits of each byte filled from the byte above it. Bytes shifted in past the
/// end of the buffer are zero.
pub fn shift_buffer_right(buffer: &mut [u8], bits: u64)
{
    let length = buffer.len();
    let bytes = usize::try_from(bits / 8).unwrap_or(usize::MAX);
    let residual = bits % 8;

    if bytes >= length {
        buffer.fill(0);
        return;
    }

    if bytes > 0 {
        buffer.copy_within(bytes.., 0);
        buffer[length - bytes..].fill(0);
    }

    if residual > 0 {
        for index in 0..length {
            let next = buffer.get(index + 1).copied().unwrap_or(0);
            buffer[index] = (buffer[index] >> residual) | (next << (8 - residual));
        }
    }
}

/// Zero every bit at position `bit_size` and above.
///
/// A `bit_size` of 0 means the member spans its whole type and leaves the
/// buffer untouched.
pub fn mask_buffer(buffer: &mut [u8], bit_size: u64)
{
    if bit_size == 0 {
        return;
    }

    let whole = usize::try_from(bit_size / 8).unwrap_or(usize::MAX);
    let residual = bit_size % 8;
    if whole >= buffer.len() {
        return;
    }

    let mut first_clear = whole;
    if residual > 0 {
        buffer[whole] &= (1u8 << residual) - 1;
        first_clear += 1;
    }
    if first_clear < buffer.len() {
        buffer[first_clear..].fill(0);
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_shift_whole_bytes()
    {
        let mut buffer = [0x11, 0x22, 0x33, 0x44];
        shift_buffer_right(&mut buffer, 16);
        assert_eq!(buffer, [0x33, 0x44, 0, 0]);
    }

    #[test]
    fn test_shift_residual_bits_borrow_from_next_byte()
    {
        let mut buffer = [0b1101_0110, 0x7f];
        shift_buffer_right(&mut buffer, 3);
        assert_eq!(buffer, [0b1111_1010, 0b0000_1111]);
    }

    #[test]
    fn test_shift_past_end_clears()
    {
        let mut buffer = [0xff; 2];
        shift_buffer_right(&mut buffer, 16);
        assert_eq!(buffer, [0, 0]);
    }

    #[test]
    fn test_mask_clears_high_bits()
    {
        let mut buffer = [0xff, 0xff, 0xff];
        mask_buffer(&mut buffer, 5);
        assert_eq!(buffer, [0x1f, 0, 0]);

        let mut buffer = [0xff, 0xff, 0xff];
        mask_buffer(&mut buffer, 12);
        assert_eq!(buffer, [0xff, 0x0f, 0]);
    }

    #[test]
    fn test_mask_zero_keeps_everything()
    {
        let mut buffer = [0xab, 0xcd];
        mask_buffer(&mut buffer, 0);
        assert_eq!(buffer, [0xab, 0xcd]);
    }

    #[test]
    fn test_extracted_field_has_no_high_bits()
    {
        for bit_size in 1..32 {
            let mut buffer = [0xff; 4];
            shift_buffer_right(&mut buffer, 3);
            mask_buffer(&mut buffer, bit_size);
            let value = u32::from_le_bytes(buffer);
            assert_eq!(value >> bit_size, 0, "bit_size {bit_size}");
        }
    }
}
