use encoding_rs::{GBK, SHIFT_JIS};

use super::bitstream::BitStream;
use super::error::{QrError, QrResult};
use super::metadata::{ECLevel, Version};

// Mode
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Mode {
    Numeric = 0b0001,
    Alphanumeric = 0b0010,
    Byte = 0b0100,
    Kanji = 0b1000,
    Hanzi = 0b1101,
}

impl Mode {
    #[inline]
    fn numeric_digit(char: u8) -> u16 {
        debug_assert!(Mode::Numeric.contains(char), "Invalid numeric data: {char}");
        (char - b'0') as u16
    }

    #[inline]
    fn alphanumeric_digit(char: u8) -> u16 {
        match char {
            b'0'..=b'9' => (char - b'0') as u16,
            b'A'..=b'Z' => (char - b'A' + 10) as u16,
            b' ' => 36,
            b'$' => 37,
            b'%' => 38,
            b'*' => 39,
            b'+' => 40,
            b'-' => 41,
            b'.' => 42,
            b'/' => 43,
            b':' => 44,
            _ => unreachable!("Invalid alphanumeric {char}"),
        }
    }

    pub fn contains(&self, byte: u8) -> bool {
        match self {
            Self::Numeric => byte.is_ascii_digit(),
            Self::Alphanumeric => {
                matches!(byte, b'0'..=b'9' | b'A'..=b'Z' | b' ' | b'$' | b'%' | b'*' | b'+' | b'-' | b'.' | b'/' | b':')
            }
            _ => true,
        }
    }

    /// Exact payload bit count for `len` characters in this mode.
    pub fn encoded_len(&self, len: usize) -> usize {
        match *self {
            Self::Numeric => (len * 10 + 2) / 3,
            Self::Alphanumeric => (len * 11 + 1) / 2,
            Self::Byte => len * 8,
            Self::Kanji | Self::Hanzi => len * 13,
        }
    }

    /// Mode indicator value and width for a symbol of the given version.
    /// Micro symbols narrow the indicator and support fewer modes.
    pub fn indicator(&self, ver: Version) -> QrResult<(u8, usize)> {
        match ver {
            Version::Normal(_) => Ok((*self as u8, 4)),
            Version::Micro(v) => {
                if !ver.supports_mode(*self) {
                    return Err(QrError::InvalidMode);
                }
                let value = match self {
                    Self::Numeric => 0b00,
                    Self::Alphanumeric => 0b01,
                    Self::Byte => 0b10,
                    Self::Kanji => 0b11,
                    Self::Hanzi => return Err(QrError::InvalidMode),
                };
                Ok((value, v - 1))
            }
        }
    }
}

#[cfg(test)]
mod mode_tests {

    use super::Mode::*;
    use crate::common::metadata::Version;

    #[test]
    fn test_contains() {
        assert!(Numeric.contains(b'0'));
        assert!(Numeric.contains(b'9'));
        assert!(!Numeric.contains(b'A'));
        assert!(Alphanumeric.contains(b'0'));
        assert!(Alphanumeric.contains(b'Z'));
        assert!(Alphanumeric.contains(b':'));
        assert!(!Alphanumeric.contains(b'@'));
        assert!(!Alphanumeric.contains(b'a'));
        assert!(Byte.contains(b'@'));
    }

    #[test]
    fn test_encoded_len() {
        assert_eq!(Numeric.encoded_len(3), 10);
        assert_eq!(Numeric.encoded_len(2), 7);
        assert_eq!(Numeric.encoded_len(1), 4);
        assert_eq!(Numeric.encoded_len(8), 27);
        assert_eq!(Alphanumeric.encoded_len(2), 11);
        assert_eq!(Alphanumeric.encoded_len(1), 6);
        assert_eq!(Byte.encoded_len(3), 24);
        assert_eq!(Kanji.encoded_len(2), 26);
        assert_eq!(Hanzi.encoded_len(2), 26);
    }

    #[test]
    fn test_indicator() {
        assert_eq!(Numeric.indicator(Version::Normal(1)).unwrap(), (0b0001, 4));
        assert_eq!(Hanzi.indicator(Version::Normal(40)).unwrap(), (0b1101, 4));
        assert_eq!(Numeric.indicator(Version::Micro(1)).unwrap(), (0b00, 0));
        assert_eq!(Alphanumeric.indicator(Version::Micro(2)).unwrap(), (0b01, 1));
        assert_eq!(Kanji.indicator(Version::Micro(4)).unwrap(), (0b11, 3));
        assert!(Byte.indicator(Version::Micro(2)).is_err());
        assert!(Hanzi.indicator(Version::Micro(4)).is_err());
    }
}

// Character set
//------------------------------------------------------------------------------

/// Byte interpretation of textual content, with its ECI assignment number.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum CharacterSet {
    Latin1,
    ShiftJis,
    Utf8,
    Gb2312,
}

impl CharacterSet {
    pub fn eci_number(self) -> u8 {
        match self {
            Self::Latin1 => 3,
            Self::ShiftJis => 20,
            Self::Utf8 => 26,
            Self::Gb2312 => 29,
        }
    }

    pub fn from_name(name: &str) -> QrResult<Self> {
        let name = name.to_ascii_lowercase().replace('_', "-");
        match name.as_str() {
            "iso-8859-1" | "iso8859-1" | "latin-1" | "latin1" => Ok(Self::Latin1),
            "shift-jis" | "shiftjis" | "sjis" => Ok(Self::ShiftJis),
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "gb2312" | "gb-2312" | "gbk" => Ok(Self::Gb2312),
            _ => Err(QrError::InvalidEncoding),
        }
    }

    /// Converts `content` into this character set, or `None` when some
    /// character has no representation.
    pub fn encode(self, content: &str) -> Option<Vec<u8>> {
        match self {
            Self::Latin1 => {
                content.chars().map(|c| u8::try_from(u32::from(c)).ok()).collect()
            }
            Self::Utf8 => Some(content.as_bytes().to_vec()),
            Self::ShiftJis => {
                let (bytes, _, had_errors) = SHIFT_JIS.encode(content);
                (!had_errors).then(|| bytes.into_owned())
            }
            // GB 2312 is a subset of GBK; pair range checks narrow it further
            Self::Gb2312 => {
                let (bytes, _, had_errors) = GBK.encode(content);
                (!had_errors).then(|| bytes.into_owned())
            }
        }
    }
}

#[cfg(test)]
mod character_set_tests {
    use super::CharacterSet;
    use crate::common::error::QrError;

    #[test]
    fn test_from_name() {
        assert_eq!(CharacterSet::from_name("ISO-8859-1").unwrap(), CharacterSet::Latin1);
        assert_eq!(CharacterSet::from_name("Shift_JIS").unwrap(), CharacterSet::ShiftJis);
        assert_eq!(CharacterSet::from_name("utf-8").unwrap(), CharacterSet::Utf8);
        assert_eq!(CharacterSet::from_name("GB2312").unwrap(), CharacterSet::Gb2312);
        assert_eq!(CharacterSet::from_name("koi8-r"), Err(QrError::InvalidEncoding));
    }

    #[test]
    fn test_encode() {
        assert_eq!(CharacterSet::Latin1.encode("héllo").unwrap(), b"h\xe9llo");
        assert_eq!(CharacterSet::Latin1.encode("héllo✓"), None);
        assert_eq!(CharacterSet::ShiftJis.encode("点茗").unwrap(), b"\x93\x5f\xe4\xaa");
        assert_eq!(CharacterSet::Gb2312.encode("中文").unwrap(), b"\xd6\xd0\xce\xc4");
        assert_eq!(CharacterSet::Utf8.encode("✓").unwrap(), "✓".as_bytes());
    }
}

// Segment
//------------------------------------------------------------------------------

/// One run of content in a single mode. Holds only the payload bits; mode
/// indicator and character count are added during serialisation since their
/// widths depend on the chosen version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    mode: Mode,
    char_count: usize,
    bits: BitStream,
    charset: Option<CharacterSet>,
}

impl Segment {
    /// Encodes `content` in the requested mode.
    ///
    /// For byte mode the character set is resolved by trying, in order, the
    /// caller-supplied set, ISO 8859-1, Shift JIS and UTF-8; the first that
    /// succeeds is recorded on the segment.
    pub fn make(content: &str, mode: Mode, charset: Option<CharacterSet>) -> QrResult<Self> {
        let seg = match mode {
            Mode::Numeric => Self::make_numeric(content)?,
            Mode::Alphanumeric => Self::make_alphanumeric(content)?,
            Mode::Byte => Self::make_byte(content, charset)?,
            Mode::Kanji => Self::make_kanji(content)?,
            Mode::Hanzi => Self::make_hanzi(content)?,
        };
        debug_assert!(
            seg.bits.len() == seg.mode.encoded_len(seg.char_count),
            "Segment bit length {} doesn't match per-mode bit count {}",
            seg.bits.len(),
            seg.mode.encoded_len(seg.char_count)
        );
        Ok(seg)
    }

    /// Picks the densest mode that can hold `content`: numeric, then
    /// alphanumeric, then kanji, falling back to byte.
    pub fn auto(content: &str, charset: Option<CharacterSet>) -> QrResult<Self> {
        let bytes = content.as_bytes();
        if bytes.iter().all(|b| Mode::Numeric.contains(*b)) {
            Self::make(content, Mode::Numeric, charset)
        } else if bytes.iter().all(|b| Mode::Alphanumeric.contains(*b)) {
            Self::make(content, Mode::Alphanumeric, charset)
        } else if let Ok(seg) = Self::make(content, Mode::Kanji, charset) {
            Ok(seg)
        } else {
            Self::make(content, Mode::Byte, charset)
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn char_count(&self) -> usize {
        self.char_count
    }

    pub fn bits(&self) -> &BitStream {
        &self.bits
    }

    pub fn charset(&self) -> Option<CharacterSet> {
        self.charset
    }

    /// Whether serialisation must announce the character set with an ECI
    /// header. Only non-default byte encodings qualify.
    pub(crate) fn needs_eci(&self) -> bool {
        self.mode == Mode::Byte && !matches!(self.charset, Some(CharacterSet::Latin1) | None)
    }

    fn make_numeric(content: &str) -> QrResult<Self> {
        let data = content.as_bytes();
        if !data.iter().all(|b| Mode::Numeric.contains(*b)) {
            return Err(QrError::InvalidMode);
        }
        let mut bits = BitStream::growable();
        for chunk in data.chunks(3) {
            let len = chunk.len() * 3 + 1;
            let value = chunk.iter().fold(0_u16, |n, b| n * 10 + Mode::numeric_digit(*b));
            bits.push_bits(value, len);
        }
        Ok(Self { mode: Mode::Numeric, char_count: data.len(), bits, charset: None })
    }

    fn make_alphanumeric(content: &str) -> QrResult<Self> {
        let data = content.as_bytes();
        if !data.iter().all(|b| Mode::Alphanumeric.contains(*b)) {
            return Err(QrError::InvalidMode);
        }
        let mut bits = BitStream::growable();
        for chunk in data.chunks(2) {
            let len = chunk.len() * 5 + 1;
            let value = chunk.iter().fold(0_u16, |n, b| n * 45 + Mode::alphanumeric_digit(*b));
            bits.push_bits(value, len);
        }
        Ok(Self { mode: Mode::Alphanumeric, char_count: data.len(), bits, charset: None })
    }

    fn make_byte(content: &str, charset: Option<CharacterSet>) -> QrResult<Self> {
        let fallback =
            [CharacterSet::Latin1, CharacterSet::ShiftJis, CharacterSet::Utf8];
        let (data, resolved) = charset
            .into_iter()
            .chain(fallback)
            .find_map(|cs| cs.encode(content).map(|data| (data, cs)))
            .ok_or(QrError::InvalidContent)?;
        let mut bits = BitStream::growable();
        for b in &data {
            bits.push_bits(*b, 8);
        }
        Ok(Self { mode: Mode::Byte, char_count: data.len(), bits, charset: Some(resolved) })
    }

    fn make_kanji(content: &str) -> QrResult<Self> {
        let data = CharacterSet::ShiftJis.encode(content).ok_or(QrError::InvalidContent)?;
        let mut bits = BitStream::growable();
        let char_count = Self::push_double_byte(&data, &mut bits, |code| match code {
            0x8140..=0x9FFC => Some(code - 0x8140),
            0xE040..=0xEBBF => Some(code - 0xC140),
            _ => None,
        }, 0xC0)?;
        Ok(Self { mode: Mode::Kanji, char_count, bits, charset: None })
    }

    fn make_hanzi(content: &str) -> QrResult<Self> {
        let data = CharacterSet::Gb2312.encode(content).ok_or(QrError::InvalidContent)?;
        let mut bits = BitStream::growable();
        let char_count = Self::push_double_byte(&data, &mut bits, |code| match code {
            0xA1A1..=0xAAFE => Some(code - 0xA1A1),
            0xB0A1..=0xFAFE => Some(code - 0xA6A1),
            _ => None,
        }, 0x60)?;
        Ok(Self { mode: Mode::Hanzi, char_count, bits, charset: Some(CharacterSet::Gb2312) })
    }

    // Maps aligned double-byte codes through `rebase` and emits
    // `(d >> 8) * stride + (d & 0xFF)` in 13 bits per pair.
    fn push_double_byte(
        data: &[u8],
        bits: &mut BitStream,
        rebase: impl Fn(u16) -> Option<u16>,
        stride: u16,
    ) -> QrResult<usize> {
        if data.len() & 1 == 1 {
            return Err(QrError::InvalidMode);
        }
        for pair in data.chunks_exact(2) {
            let code = u16::from(pair[0]) << 8 | u16::from(pair[1]);
            let d = rebase(code).ok_or(QrError::InvalidMode)?;
            bits.push_bits((d >> 8) * stride + (d & 0xFF), 13);
        }
        Ok(data.len() / 2)
    }
}

// Segment list
//------------------------------------------------------------------------------

/// Segment list that folds consecutive segments with matching mode and
/// character set into one.
#[derive(Debug, Clone, Default)]
pub(crate) struct Segments(Vec<Segment>);

impl Segments {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, seg: Segment) {
        match self.0.last_mut() {
            Some(last) if last.mode == seg.mode && last.charset == seg.charset => {
                last.bits.append(&seg.bits);
                last.char_count += seg.char_count;
            }
            _ => self.0.push(seg),
        }
    }

    pub fn as_slice(&self) -> &[Segment] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Segment> {
        self.0
    }
}


// Writer for encoded data
//------------------------------------------------------------------------------

pub(crate) mod writer {
    use super::{BitStream, QrError, QrResult, Segment, Version};

    pub fn push_segment(seg: &Segment, ver: Version, eci: bool, out: &mut BitStream) -> QrResult<()> {
        if eci && seg.needs_eci() {
            push_eci_header(seg, out)?;
        }
        push_header(seg, ver, out)?;
        out.append(seg.bits());
        Ok(())
    }

    fn push_eci_header(seg: &Segment, out: &mut BitStream) -> QrResult<()> {
        let charset = seg.charset().ok_or(QrError::InvalidEncoding)?;
        out.push_bits(0b0111u8, 4);
        out.push_bits(charset.eci_number(), 8);
        Ok(())
    }

    fn push_header(seg: &Segment, ver: Version, out: &mut BitStream) -> QrResult<()> {
        let (value, ind_len) = seg.mode().indicator(ver)?;
        out.push_bits(value, ind_len);
        let cnt_bits = ver.char_cnt_bits(seg.mode());
        debug_assert!(
            seg.char_count() < (1 << cnt_bits),
            "Char count exceeds bit length: Char count {}, Char count bits {cnt_bits}",
            seg.char_count()
        );
        out.push_bits(seg.char_count() as u16, cnt_bits);
        Ok(())
    }

    pub fn push_terminator(ver: Version, out: &mut BitStream) {
        let remaining = out.capacity() - out.len();
        let term_len = ver.terminator_bits().min(remaining);
        out.push_bits(0u16, term_len);
    }

    pub fn pad_remaining_capacity(out: &mut BitStream) {
        let offset = out.len() & 7;
        if offset > 0 {
            let pad = (8 - offset).min(out.capacity() - out.len());
            out.push_bits(0u8, pad);
        }

        let mut pads = PADDING_CODEWORDS.iter().copied().cycle();
        while out.capacity() - out.len() >= 8 {
            out.push_bits(pads.next().unwrap_or_default(), 8);
        }

        // M1 and M3 close on a 4-bit zero codeword rather than a full byte
        let tail = out.capacity() - out.len();
        if tail > 0 {
            out.push_bits(0u8, tail);
        }
    }

    static PADDING_CODEWORDS: [u8; 2] = [0b1110_1100, 0b0001_0001];
}

// Serialiser
//------------------------------------------------------------------------------

/// Total bits the segments occupy in a symbol of the given version: ECI
/// headers, mode indicators, character counts and payloads. The terminator is
/// excluded since it may truncate to nothing.
///
/// Fails with `InvalidMode` when a segment's mode (or an ECI header) is not
/// representable in this version.
pub(crate) fn required_bits(segments: &[Segment], ver: Version, eci: bool) -> QrResult<usize> {
    let mut total = 0;
    for seg in segments {
        let (_, ind_len) = seg.mode().indicator(ver)?;
        if eci && seg.needs_eci() {
            if ver.is_micro() {
                return Err(QrError::InvalidMode);
            }
            total += 12;
        }
        total += ind_len + ver.char_cnt_bits(seg.mode()) + seg.bits().len();
    }
    Ok(total)
}

/// Serialises the segments into the data codeword stream: headers and
/// payloads, terminator, zero padding to a codeword boundary and alternating
/// pad codewords up to the version's data capacity.
pub(crate) fn serialize_segments(
    segments: &[Segment],
    ver: Version,
    ecl: ECLevel,
    eci: bool,
) -> QrResult<BitStream> {
    let capacity = ver.data_bit_capacity(ecl);
    if required_bits(segments, ver, eci)? > capacity {
        return Err(QrError::DataOverflow);
    }

    let mut out = BitStream::new(capacity);
    for seg in segments {
        writer::push_segment(seg, ver, eci, &mut out)?;
    }
    writer::push_terminator(ver, &mut out);
    writer::pad_remaining_capacity(&mut out);

    debug_assert!(out.len() == capacity, "Serialised stream doesn't fill data capacity");

    Ok(out)
}
