use std::fmt::Display;
use std::ops::Deref;

use super::codec::Mode;
use super::error::{QrError, QrResult};
use super::mask::MaskPattern;

// Version
//------------------------------------------------------------------------------

/// Symbol version: `Micro(1..=4)` for M1-M4 or `Normal(1..=40)`.
///
/// Capacity tables are shared between the two kinds; micro versions index the
/// rows past the forty regular ones.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Version {
    Micro(usize),
    Normal(usize),
}

impl Deref for Version {
    type Target = usize;
    fn deref(&self) -> &Self::Target {
        match self {
            Self::Micro(v) => v,
            Self::Normal(v) => v,
        }
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Micro(v) => write!(f, "M{v}"),
            Self::Normal(v) => write!(f, "{v}"),
        }
    }
}

impl Version {
    pub fn is_micro(self) -> bool {
        matches!(self, Self::Micro(_))
    }

    pub(crate) fn validate(self) -> QrResult<()> {
        match self {
            Self::Micro(1..=4) | Self::Normal(1..=40) => Ok(()),
            _ => Err(QrError::InvalidVersion),
        }
    }

    fn table_index(self) -> usize {
        debug_assert!(self.validate().is_ok(), "Invalid version");
        match self {
            Self::Micro(v) => 39 + v,
            Self::Normal(v) => v - 1,
        }
    }

    pub const fn width(self) -> usize {
        match self {
            Self::Micro(v) => v * 2 + 9,
            Self::Normal(v) => v * 4 + 17,
        }
    }

    pub fn alignment_pattern(self) -> &'static [i16] {
        match self {
            Self::Micro(_) => &[],
            Self::Normal(v) => ALIGNMENT_PATTERN_POSITIONS[v - 1],
        }
    }

    /// Width of the mode indicator field.
    pub fn mode_bits(self) -> usize {
        match self {
            Version::Micro(v) => v - 1,
            Version::Normal(_) => 4,
        }
    }

    /// Width of the character count field for `mode`.
    pub fn char_cnt_bits(self, mode: Mode) -> usize {
        debug_assert!(self.validate().is_ok(), "Invalid version");

        match self {
            Version::Micro(v) => match mode {
                Mode::Numeric => v + 2,
                Mode::Alphanumeric | Mode::Byte => v + 1,
                Mode::Kanji | Mode::Hanzi => v,
            },
            Version::Normal(1..=9) => match mode {
                Mode::Numeric => 10,
                Mode::Alphanumeric => 9,
                Mode::Byte | Mode::Kanji | Mode::Hanzi => 8,
            },
            Version::Normal(10..=26) => match mode {
                Mode::Numeric => 12,
                Mode::Alphanumeric => 11,
                Mode::Byte => 16,
                Mode::Kanji | Mode::Hanzi => 10,
            },
            Version::Normal(_) => match mode {
                Mode::Numeric => 14,
                Mode::Alphanumeric => 13,
                Mode::Byte => 16,
                Mode::Kanji | Mode::Hanzi => 12,
            },
        }
    }

    /// Terminator length in bits; truncated when less capacity remains.
    pub fn terminator_bits(self) -> usize {
        match self {
            Version::Micro(v) => 2 * v + 1,
            Version::Normal(_) => 4,
        }
    }

    /// Whether `mode` may appear at all in a symbol of this version.
    pub fn supports_mode(self, mode: Mode) -> bool {
        match self {
            Version::Micro(1) => matches!(mode, Mode::Numeric),
            Version::Micro(2) => matches!(mode, Mode::Numeric | Mode::Alphanumeric),
            Version::Micro(_) => {
                matches!(mode, Mode::Numeric | Mode::Alphanumeric | Mode::Byte | Mode::Kanji)
            }
            Version::Normal(_) => true,
        }
    }

    /// Whether `ecl` is a valid error level for this version.
    pub fn permits_level(self, ecl: ECLevel) -> bool {
        match self {
            Version::Micro(1) => ecl == ECLevel::L,
            Version::Micro(2) | Version::Micro(3) => matches!(ecl, ECLevel::L | ECLevel::M),
            Version::Micro(4) => matches!(ecl, ECLevel::L | ECLevel::M | ECLevel::Q),
            Version::Micro(_) => false,
            Version::Normal(_) => true,
        }
    }

    pub fn data_bit_capacity(self, ecl: ECLevel) -> usize {
        VERSION_DATA_BIT_CAPACITY[self.table_index()][ecl as usize]
    }

    pub fn data_codewords_per_block(self, ecl: ECLevel) -> (usize, usize, usize, usize) {
        DATA_CODEWORDS_PER_BLOCK[self.table_index()][ecl as usize]
    }

    pub fn ecc_per_block(self, ecl: ECLevel) -> usize {
        ECC_PER_BLOCK[self.table_index()][ecl as usize]
    }

    /// Bits of the interleaved codeword stream written into the symbol,
    /// excluding remainder bits.
    pub fn payload_bit_len(self, ecl: ECLevel) -> usize {
        let (_, b1c, _, b2c) = self.data_codewords_per_block(ecl);
        self.data_bit_capacity(ecl) + self.ecc_per_block(ecl) * (b1c + b2c) * 8
    }

    pub fn remainder_bits(self) -> usize {
        match self {
            Version::Micro(_) | Version::Normal(1) => 0,
            Version::Normal(2..=6) => 7,
            Version::Normal(7..=13) => 0,
            Version::Normal(14..=20) => 3,
            Version::Normal(21..=27) => 4,
            Version::Normal(28..=34) => 3,
            Version::Normal(35..=40) => 0,
            _ => unreachable!("Invalid version"),
        }
    }

    pub fn info(self) -> u32 {
        debug_assert!(matches!(self, Version::Normal(7..=40)), "Invalid version");
        match self {
            Version::Normal(v) => VERSION_INFOS[v - 7],
            _ => unreachable!(),
        }
    }
}

// Error correction level
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Copy, Clone, PartialOrd, Ord)]
pub enum ECLevel {
    L = 0,
    M = 1,
    Q = 2,
    H = 3,
}

impl From<u8> for ECLevel {
    fn from(value: u8) -> Self {
        match value {
            0 => ECLevel::L,
            1 => ECLevel::M,
            2 => ECLevel::Q,
            3 => ECLevel::H,
            _ => panic!("Invalid u8 for ec level: {value}"),
        }
    }
}

// Format information
//------------------------------------------------------------------------------

/// 15-bit BCH format word for the chosen level and mask, pre-masked against
/// the all-zero pattern.
pub fn format_info(ver: Version, ecl: ECLevel, mask: MaskPattern) -> QrResult<u32> {
    match ver {
        Version::Normal(_) => {
            if *mask > 7 {
                return Err(QrError::InvalidMask);
            }
            let index = ((ecl as usize) ^ 1) << 3 | (*mask as usize);
            Ok(FORMAT_INFOS_QR[index])
        }
        Version::Micro(v) => {
            if *mask > 3 {
                return Err(QrError::InvalidMask);
            }
            let symbol_number = match (v, ecl) {
                (1, ECLevel::L) => 0,
                (2, ECLevel::L) => 1,
                (2, ECLevel::M) => 2,
                (3, ECLevel::L) => 3,
                (3, ECLevel::M) => 4,
                (4, ECLevel::L) => 5,
                (4, ECLevel::M) => 6,
                (4, ECLevel::Q) => 7,
                _ => return Err(QrError::InvalidErrorLevel),
            };
            Ok(FORMAT_INFOS_MICRO_QR[symbol_number << 2 | (*mask as usize)])
        }
    }
}

#[cfg(test)]
mod metadata_tests {
    use super::{format_info, ECLevel, Mode, Version};
    use crate::common::mask::MaskPattern;

    #[test]
    fn test_width() {
        assert_eq!(Version::Micro(1).width(), 11);
        assert_eq!(Version::Micro(4).width(), 17);
        assert_eq!(Version::Normal(1).width(), 21);
        assert_eq!(Version::Normal(7).width(), 45);
        assert_eq!(Version::Normal(40).width(), 177);
    }

    #[test]
    fn test_char_cnt_bits() {
        assert_eq!(Version::Normal(1).char_cnt_bits(Mode::Numeric), 10);
        assert_eq!(Version::Normal(9).char_cnt_bits(Mode::Numeric), 10);
        assert_eq!(Version::Normal(10).char_cnt_bits(Mode::Numeric), 12);
        assert_eq!(Version::Normal(26).char_cnt_bits(Mode::Numeric), 12);
        assert_eq!(Version::Normal(27).char_cnt_bits(Mode::Numeric), 14);
        assert_eq!(Version::Normal(40).char_cnt_bits(Mode::Numeric), 14);
        assert_eq!(Version::Normal(1).char_cnt_bits(Mode::Alphanumeric), 9);
        assert_eq!(Version::Normal(10).char_cnt_bits(Mode::Alphanumeric), 11);
        assert_eq!(Version::Normal(27).char_cnt_bits(Mode::Alphanumeric), 13);
        assert_eq!(Version::Normal(1).char_cnt_bits(Mode::Byte), 8);
        assert_eq!(Version::Normal(10).char_cnt_bits(Mode::Byte), 16);
        assert_eq!(Version::Normal(1).char_cnt_bits(Mode::Kanji), 8);
        assert_eq!(Version::Normal(27).char_cnt_bits(Mode::Kanji), 12);
        assert_eq!(Version::Micro(1).char_cnt_bits(Mode::Numeric), 3);
        assert_eq!(Version::Micro(2).char_cnt_bits(Mode::Alphanumeric), 3);
        assert_eq!(Version::Micro(3).char_cnt_bits(Mode::Byte), 4);
        assert_eq!(Version::Micro(4).char_cnt_bits(Mode::Kanji), 4);
    }

    #[test]
    fn test_mode_and_terminator_bits() {
        assert_eq!(Version::Micro(1).mode_bits(), 0);
        assert_eq!(Version::Micro(4).mode_bits(), 3);
        assert_eq!(Version::Normal(17).mode_bits(), 4);
        assert_eq!(Version::Micro(1).terminator_bits(), 3);
        assert_eq!(Version::Micro(4).terminator_bits(), 9);
        assert_eq!(Version::Normal(2).terminator_bits(), 4);
    }

    #[test]
    fn test_micro_restrictions() {
        assert!(Version::Micro(1).supports_mode(Mode::Numeric));
        assert!(!Version::Micro(1).supports_mode(Mode::Alphanumeric));
        assert!(Version::Micro(2).supports_mode(Mode::Alphanumeric));
        assert!(!Version::Micro(2).supports_mode(Mode::Byte));
        assert!(Version::Micro(3).supports_mode(Mode::Kanji));
        assert!(!Version::Micro(4).supports_mode(Mode::Hanzi));
        assert!(Version::Normal(1).supports_mode(Mode::Hanzi));
        assert!(!Version::Micro(2).permits_level(ECLevel::Q));
        assert!(!Version::Micro(4).permits_level(ECLevel::H));
        assert!(Version::Micro(4).permits_level(ECLevel::Q));
        assert!(Version::Normal(1).permits_level(ECLevel::H));
    }

    #[test]
    fn test_payload_bit_len() {
        // v1: 26 codewords, M3-L: 11 data + 6 ec codewords with a half byte
        assert_eq!(Version::Normal(1).payload_bit_len(ECLevel::L), 208);
        assert_eq!(Version::Micro(1).payload_bit_len(ECLevel::L), 36);
        assert_eq!(Version::Micro(3).payload_bit_len(ECLevel::L), 132);
        assert_eq!(Version::Micro(4).payload_bit_len(ECLevel::L), 192);
    }

    #[test]
    fn test_remainder_bits() {
        assert_eq!(Version::Normal(1).remainder_bits(), 0);
        assert_eq!(Version::Normal(2).remainder_bits(), 7);
        assert_eq!(Version::Normal(6).remainder_bits(), 7);
        assert_eq!(Version::Normal(7).remainder_bits(), 0);
        assert_eq!(Version::Normal(14).remainder_bits(), 3);
        assert_eq!(Version::Normal(21).remainder_bits(), 4);
        assert_eq!(Version::Normal(28).remainder_bits(), 3);
        assert_eq!(Version::Normal(35).remainder_bits(), 0);
        assert_eq!(Version::Micro(4).remainder_bits(), 0);
    }

    #[test]
    fn test_format_info() {
        let info = format_info(Version::Normal(1), ECLevel::L, MaskPattern::new(0)).unwrap();
        assert_eq!(info, 0x77C4);
        let info = format_info(Version::Normal(1), ECLevel::M, MaskPattern::new(0)).unwrap();
        assert_eq!(info, 0x5412);
        let info = format_info(Version::Micro(2), ECLevel::L, MaskPattern::new(1)).unwrap();
        assert_eq!(info, 0x5099);
        let info = format_info(Version::Micro(1), ECLevel::L, MaskPattern::new(0)).unwrap();
        assert_eq!(info, 0x4445);
        assert!(format_info(Version::Micro(3), ECLevel::Q, MaskPattern::new(0)).is_err());
        assert!(format_info(Version::Micro(4), ECLevel::L, MaskPattern::new(4)).is_err());
    }

    #[test]
    fn test_version_info() {
        assert_eq!(Version::Normal(7).info(), 0x07C94);
        assert_eq!(Version::Normal(40).info(), 0x28C69);
    }

    #[test]
    fn test_version_name() {
        assert_eq!(Version::Micro(2).to_string(), "M2");
        assert_eq!(Version::Normal(34).to_string(), "34");
    }
}

// Global constants
//------------------------------------------------------------------------------

static ALIGNMENT_PATTERN_POSITIONS: [&[i16]; 40] = [
    &[],
    &[6, 18],
    &[6, 22],
    &[6, 26],
    &[6, 30],
    &[6, 34],
    &[6, 22, 38],
    &[6, 24, 42],
    &[6, 26, 46],
    &[6, 28, 50],
    &[6, 30, 54],
    &[6, 32, 58],
    &[6, 34, 62],
    &[6, 26, 46, 66],
    &[6, 26, 48, 70],
    &[6, 26, 50, 74],
    &[6, 30, 54, 78],
    &[6, 30, 56, 82],
    &[6, 30, 58, 86],
    &[6, 34, 62, 90],
    &[6, 28, 50, 72, 94],
    &[6, 26, 50, 74, 98],
    &[6, 30, 54, 78, 102],
    &[6, 28, 54, 80, 106],
    &[6, 32, 58, 84, 110],
    &[6, 30, 58, 86, 114],
    &[6, 34, 62, 90, 118],
    &[6, 26, 50, 74, 98, 122],
    &[6, 30, 54, 78, 102, 126],
    &[6, 26, 52, 78, 104, 130],
    &[6, 30, 56, 82, 108, 134],
    &[6, 34, 60, 86, 112, 138],
    &[6, 30, 58, 86, 114, 142],
    &[6, 34, 62, 90, 118, 146],
    &[6, 30, 54, 78, 102, 126, 150],
    &[6, 24, 50, 76, 102, 128, 154],
    &[6, 28, 54, 80, 106, 132, 158],
    &[6, 32, 58, 84, 110, 136, 162],
    &[6, 26, 54, 82, 110, 138, 166],
    &[6, 30, 58, 86, 114, 142, 170],
];

// Data bit capacity per error level per version
static VERSION_DATA_BIT_CAPACITY: [[usize; 4]; 44] = [
    [152, 128, 104, 72],
    [272, 224, 176, 128],
    [440, 352, 272, 208],
    [640, 512, 384, 288],
    [864, 688, 496, 368],
    [1088, 864, 608, 480],
    [1248, 992, 704, 528],
    [1552, 1232, 880, 688],
    [1856, 1456, 1056, 800],
    [2192, 1728, 1232, 976],
    [2592, 2032, 1440, 1120],
    [2960, 2320, 1648, 1264],
    [3424, 2672, 1952, 1440],
    [3688, 2920, 2088, 1576],
    [4184, 3320, 2360, 1784],
    [4712, 3624, 2600, 2024],
    [5176, 4056, 2936, 2264],
    [5768, 4504, 3176, 2504],
    [6360, 5016, 3560, 2728],
    [6888, 5352, 3880, 3080],
    [7456, 5712, 4096, 3248],
    [8048, 6256, 4544, 3536],
    [8752, 6880, 4912, 3712],
    [9392, 7312, 5312, 4112],
    [10208, 8000, 5744, 4304],
    [10960, 8496, 6032, 4768],
    [11744, 9024, 6464, 5024],
    [12248, 9544, 6968, 5288],
    [13048, 10136, 7288, 5608],
    [13880, 10984, 7880, 5960],
    [14744, 11640, 8264, 6344],
    [15640, 12328, 8920, 6760],
    [16568, 13048, 9368, 7208],
    [17528, 13800, 9848, 7688],
    [18448, 14496, 10288, 7888],
    [19472, 15312, 10832, 8432],
    [20528, 15936, 11408, 8768],
    [21616, 16816, 12016, 9136],
    [22496, 17728, 12656, 9776],
    [23648, 18672, 13328, 10208],
    // Micro versions
    [20, 0, 0, 0],
    [40, 32, 0, 0],
    [84, 68, 0, 0],
    [128, 112, 80, 0],
];

static ECC_PER_BLOCK: [[usize; 4]; 44] = [
    // Normal versions
    [7, 10, 13, 17],
    [10, 16, 22, 28],
    [15, 26, 18, 22],
    [20, 18, 26, 16],
    [26, 24, 18, 22],
    [18, 16, 24, 28],
    [20, 18, 18, 26],
    [24, 22, 22, 26],
    [30, 22, 20, 24],
    [18, 26, 24, 28],
    [20, 30, 28, 24],
    [24, 22, 26, 28],
    [26, 22, 24, 22],
    [30, 24, 20, 24],
    [22, 24, 30, 24],
    [24, 28, 24, 30],
    [28, 28, 28, 28],
    [30, 26, 28, 28],
    [28, 26, 26, 26],
    [28, 26, 30, 28],
    [28, 26, 28, 30],
    [28, 28, 30, 24],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [26, 28, 30, 30],
    [28, 28, 28, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    [30, 28, 30, 30],
    // Micro versions
    [2, 0, 0, 0],
    [5, 6, 0, 0],
    [6, 8, 0, 0],
    [8, 10, 14, 0],
];

static DATA_CODEWORDS_PER_BLOCK: [[(usize, usize, usize, usize); 4]; 44] = [
    // Normal versions
    [(19, 1, 0, 0), (16, 1, 0, 0), (13, 1, 0, 0), (9, 1, 0, 0)],
    [(34, 1, 0, 0), (28, 1, 0, 0), (22, 1, 0, 0), (16, 1, 0, 0)],
    [(55, 1, 0, 0), (44, 1, 0, 0), (17, 2, 0, 0), (13, 2, 0, 0)],
    [(80, 1, 0, 0), (32, 2, 0, 0), (24, 2, 0, 0), (9, 4, 0, 0)],
    [(108, 1, 0, 0), (43, 2, 0, 0), (15, 2, 16, 2), (11, 2, 12, 2)],
    [(68, 2, 0, 0), (27, 4, 0, 0), (19, 4, 0, 0), (15, 4, 0, 0)],
    [(78, 2, 0, 0), (31, 4, 0, 0), (14, 2, 15, 4), (13, 4, 14, 1)],
    [(97, 2, 0, 0), (38, 2, 39, 2), (18, 4, 19, 2), (14, 4, 15, 2)],
    [(116, 2, 0, 0), (36, 3, 37, 2), (16, 4, 17, 4), (12, 4, 13, 4)],
    [(68, 2, 69, 2), (43, 4, 44, 1), (19, 6, 20, 2), (15, 6, 16, 2)],
    [(81, 4, 0, 0), (50, 1, 51, 4), (22, 4, 23, 4), (12, 3, 13, 8)],
    [(92, 2, 93, 2), (36, 6, 37, 2), (20, 4, 21, 6), (14, 7, 15, 4)],
    [(107, 4, 0, 0), (37, 8, 38, 1), (20, 8, 21, 4), (11, 12, 12, 4)],
    [(115, 3, 116, 1), (40, 4, 41, 5), (16, 11, 17, 5), (12, 11, 13, 5)],
    [(87, 5, 88, 1), (41, 5, 42, 5), (24, 5, 25, 7), (12, 11, 13, 7)],
    [(98, 5, 99, 1), (45, 7, 46, 3), (19, 15, 20, 2), (15, 3, 16, 13)],
    [(107, 1, 108, 5), (46, 10, 47, 1), (22, 1, 23, 15), (14, 2, 15, 17)],
    [(120, 5, 121, 1), (43, 9, 44, 4), (22, 17, 23, 1), (14, 2, 15, 19)],
    [(113, 3, 114, 4), (44, 3, 45, 11), (21, 17, 22, 4), (13, 9, 14, 16)],
    [(107, 3, 108, 5), (41, 3, 42, 13), (24, 15, 25, 5), (15, 15, 16, 10)],
    [(116, 4, 117, 4), (42, 17, 0, 0), (22, 17, 23, 6), (16, 19, 17, 6)],
    [(111, 2, 112, 7), (46, 17, 0, 0), (24, 7, 25, 16), (13, 34, 0, 0)],
    [(121, 4, 122, 5), (47, 4, 48, 14), (24, 11, 25, 14), (15, 16, 16, 14)],
    [(117, 6, 118, 4), (45, 6, 46, 14), (24, 11, 25, 16), (16, 30, 17, 2)],
    [(106, 8, 107, 4), (47, 8, 48, 13), (24, 7, 25, 22), (15, 22, 16, 13)],
    [(114, 10, 115, 2), (46, 19, 47, 4), (22, 28, 23, 6), (16, 33, 17, 4)],
    [(122, 8, 123, 4), (45, 22, 46, 3), (23, 8, 24, 26), (15, 12, 16, 28)],
    [(117, 3, 118, 10), (45, 3, 46, 23), (24, 4, 25, 31), (15, 11, 16, 31)],
    [(116, 7, 117, 7), (45, 21, 46, 7), (23, 1, 24, 37), (15, 19, 16, 26)],
    [(115, 5, 116, 10), (47, 19, 48, 10), (24, 15, 25, 25), (15, 23, 16, 25)],
    [(115, 13, 116, 3), (46, 2, 47, 29), (24, 42, 25, 1), (15, 23, 16, 28)],
    [(115, 17, 0, 0), (46, 10, 47, 23), (24, 10, 25, 35), (15, 19, 16, 35)],
    [(115, 17, 116, 1), (46, 14, 47, 21), (24, 29, 25, 19), (15, 11, 16, 46)],
    [(115, 13, 116, 6), (46, 14, 47, 23), (24, 44, 25, 7), (16, 59, 17, 1)],
    [(121, 12, 122, 7), (47, 12, 48, 26), (24, 39, 25, 14), (15, 22, 16, 41)],
    [(121, 6, 122, 14), (47, 6, 48, 34), (24, 46, 25, 10), (15, 2, 16, 64)],
    [(122, 17, 123, 4), (46, 29, 47, 14), (24, 49, 25, 10), (15, 24, 16, 46)],
    [(122, 4, 123, 18), (46, 13, 47, 32), (24, 48, 25, 14), (15, 42, 16, 32)],
    [(117, 20, 118, 4), (47, 40, 48, 7), (24, 43, 25, 22), (15, 10, 16, 67)],
    [(118, 19, 119, 6), (47, 18, 48, 31), (24, 34, 25, 34), (15, 20, 16, 61)],
    // Micro versions
    [(3, 1, 0, 0), (0, 0, 0, 0), (0, 0, 0, 0), (0, 0, 0, 0)],
    [(5, 1, 0, 0), (4, 1, 0, 0), (0, 0, 0, 0), (0, 0, 0, 0)],
    [(11, 1, 0, 0), (9, 1, 0, 0), (0, 0, 0, 0), (0, 0, 0, 0)],
    [(16, 1, 0, 0), (14, 1, 0, 0), (10, 1, 0, 0), (0, 0, 0, 0)],
];

pub static FORMAT_INFO_BIT_LEN: usize = 15;

pub static FORMAT_INFOS_QR: [u32; 32] = [
    0x5412, 0x5125, 0x5e7c, 0x5b4b, 0x45f9, 0x40ce, 0x4f97, 0x4aa0, 0x77c4, 0x72f3, 0x7daa, 0x789d,
    0x662f, 0x6318, 0x6c41, 0x6976, 0x1689, 0x13be, 0x1ce7, 0x19d0, 0x0762, 0x0255, 0x0d0c, 0x083b,
    0x355f, 0x3068, 0x3f31, 0x3a06, 0x24b4, 0x2183, 0x2eda, 0x2bed,
];

pub static FORMAT_INFOS_MICRO_QR: [u32; 32] = [
    0x4445, 0x4172, 0x4e2b, 0x4b1c, 0x55ae, 0x5099, 0x5fc0, 0x5af7, 0x6793, 0x62a4, 0x6dfd, 0x68ca,
    0x7678, 0x734f, 0x7c16, 0x7921, 0x06de, 0x03e9, 0x0cb0, 0x0987, 0x1735, 0x1202, 0x1d5b, 0x186c,
    0x2508, 0x203f, 0x2f66, 0x2a51, 0x34e3, 0x31d4, 0x3e8d, 0x3bba,
];

// Coordinates as (row, col); negative values wrap from the far edge. Most
// significant bit first.
pub static FORMAT_INFO_COORDS_QR_MAIN: [(i16, i16); 15] = [
    (8, 0),
    (8, 1),
    (8, 2),
    (8, 3),
    (8, 4),
    (8, 5),
    (8, 7),
    (8, 8),
    (7, 8),
    (5, 8),
    (4, 8),
    (3, 8),
    (2, 8),
    (1, 8),
    (0, 8),
];

pub static FORMAT_INFO_COORDS_QR_SIDE: [(i16, i16); 15] = [
    (-1, 8),
    (-2, 8),
    (-3, 8),
    (-4, 8),
    (-5, 8),
    (-6, 8),
    (-7, 8),
    (8, -8),
    (8, -7),
    (8, -6),
    (8, -5),
    (8, -4),
    (8, -3),
    (8, -2),
    (8, -1),
];

pub static FORMAT_INFO_COORDS_MICRO_QR: [(i16, i16); 15] = [
    (8, 1),
    (8, 2),
    (8, 3),
    (8, 4),
    (8, 5),
    (8, 6),
    (8, 7),
    (8, 8),
    (7, 8),
    (6, 8),
    (5, 8),
    (4, 8),
    (3, 8),
    (2, 8),
    (1, 8),
];

pub static VERSION_INFO_BIT_LEN: usize = 18;

pub static VERSION_INFOS: [u32; 34] = [
    0x07c94, 0x085bc, 0x09a99, 0x0a4d3, 0x0bbf6, 0x0c762, 0x0d847, 0x0e60d, 0x0f928, 0x10b78,
    0x1145d, 0x12a17, 0x13532, 0x149a6, 0x15683, 0x168c9, 0x177ec, 0x18ec4, 0x191e1, 0x1afab,
    0x1b08e, 0x1cc1a, 0x1d33f, 0x1ed75, 0x1f250, 0x209d5, 0x216f0, 0x228ba, 0x2379f, 0x24b0b,
    0x2542e, 0x26a64, 0x27541, 0x28c69,
];

pub static VERSION_INFO_COORDS_BL: [(i16, i16); 18] = [
    (-9, 5),
    (-10, 5),
    (-11, 5),
    (-9, 4),
    (-10, 4),
    (-11, 4),
    (-9, 3),
    (-10, 3),
    (-11, 3),
    (-9, 2),
    (-10, 2),
    (-11, 2),
    (-9, 1),
    (-10, 1),
    (-11, 1),
    (-9, 0),
    (-10, 0),
    (-11, 0),
];

pub static VERSION_INFO_COORDS_TR: [(i16, i16); 18] = [
    (5, -9),
    (5, -10),
    (5, -11),
    (4, -9),
    (4, -10),
    (4, -11),
    (3, -9),
    (3, -10),
    (3, -11),
    (2, -9),
    (2, -10),
    (2, -11),
    (1, -9),
    (1, -10),
    (1, -11),
    (0, -9),
    (0, -10),
    (0, -11),
];
