// packet.rs - Sequence-numbered datagram codec
//
// Wire format: ASCII "<decimal sequence>:" followed by filler bytes, padded to
// exactly the configured packet size.

/// Separator between the sequence number and the filler.
pub const SEQUENCE_DELIMITER: u8 = b':';
/// Byte used to pad packets up to their configured size.
pub const FILLER_BYTE: u8 = b'X';
/// Length of the longest possible prefix (`u64::MAX` plus delimiter).
pub const MAX_PREFIX_LEN: usize = 21;
/// Largest payload a single IPv4 UDP datagram can carry.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Errors produced while encoding or decoding a packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// The requested size cannot hold the sequence prefix.
    TooSmall { size: usize, required: usize },
    /// No delimiter was found in the datagram.
    MissingDelimiter,
    /// The prefix is empty, not decimal, or overflows a `u64`.
    InvalidSequence,
}

impl std::fmt::Display for PacketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PacketError::TooSmall { size, required } => write!(
                f,
                "packet size {} too small for sequence prefix of {} bytes",
                size, required
            ),
            PacketError::MissingDelimiter => write!(f, "missing sequence delimiter"),
            PacketError::InvalidSequence => write!(f, "invalid sequence number"),
        }
    }
}

impl std::error::Error for PacketError {}

/// Number of bytes the textual prefix of `sequence` occupies, delimiter included.
pub fn prefix_len(sequence: u64) -> usize {
    let mut digits = 1;
    let mut rest = sequence / 10;
    while rest > 0 {
        digits += 1;
        rest /= 10;
    }
    digits + 1
}

/// Encodes `sequence` into a new packet of exactly `size` bytes.
pub fn encode(sequence: u64, size: usize) -> Result<Vec<u8>, PacketError> {
    let mut buf = Vec::with_capacity(size);
    encode_into(&mut buf, sequence, size)?;
    Ok(buf)
}

/// Encodes `sequence` into `buf`, replacing its contents. Reuses the
/// allocation across calls, which keeps the sender loop allocation-free.
pub fn encode_into(buf: &mut Vec<u8>, sequence: u64, size: usize) -> Result<(), PacketError> {
    let required = prefix_len(sequence);
    if size < required {
        return Err(PacketError::TooSmall { size, required });
    }

    let mut digits = [0u8; MAX_PREFIX_LEN - 1];
    let mut start = digits.len();
    let mut rest = sequence;
    loop {
        start -= 1;
        digits[start] = b'0' + (rest % 10) as u8;
        rest /= 10;
        if rest == 0 {
            break;
        }
    }

    buf.clear();
    buf.extend_from_slice(&digits[start..]);
    buf.push(SEQUENCE_DELIMITER);
    buf.resize(size, FILLER_BYTE);
    Ok(())
}

/// Parses the sequence number from the front of a datagram.
pub fn decode(data: &[u8]) -> Result<u64, PacketError> {
    let end = data
        .iter()
        .position(|&b| b == SEQUENCE_DELIMITER)
        .ok_or(PacketError::MissingDelimiter)?;
    let prefix = &data[..end];

    if prefix.is_empty() || prefix.len() > MAX_PREFIX_LEN - 1 {
        return Err(PacketError::InvalidSequence);
    }

    let mut sequence: u64 = 0;
    for &b in prefix {
        if !b.is_ascii_digit() {
            return Err(PacketError::InvalidSequence);
        }
        sequence = sequence
            .checked_mul(10)
            .and_then(|s| s.checked_add(u64::from(b - b'0')))
            .ok_or(PacketError::InvalidSequence)?;
    }

    Ok(sequence)
}
