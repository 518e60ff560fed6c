use super::metadata::Version;

// Iterator over the encoding region of a symbol
//------------------------------------------------------------------------------

/// Walks the data-placement order: two-column strips from the bottom-right
/// corner moving leftward, zig-zagging up then down, hopping over the
/// vertical timing column (column 6 for regular symbols, column 0 for micro).
pub struct EncRegionIter {
    r: i16,
    c: i16,
    width: i16,
    vert_timing_col: i16,
}

impl EncRegionIter {
    pub const fn new(version: Version) -> Self {
        let w = version.width() as i16;
        let vert_timing_col = match version {
            Version::Micro(_) => 0,
            Version::Normal(_) => 6,
        };
        Self { r: w - 1, c: w - 1, width: w, vert_timing_col }
    }
}

impl Iterator for EncRegionIter {
    type Item = (i16, i16);
    fn next(&mut self) -> Option<Self::Item> {
        if self.c < 0 {
            return None;
        }
        let res = (self.r, self.c);

        // Columns left of the timing column shift by one so strip parity
        // stays aligned across the hop
        let adjusted_col = if self.c <= self.vert_timing_col { self.c + 1 } else { self.c };
        let col_type = (self.width - adjusted_col) % 4;
        match col_type {
            2 if self.r > 0 => {
                self.r -= 1;
                self.c += 1;
            }
            0 if self.r < self.width - 1 => {
                self.r += 1;
                self.c += 1;
            }
            0 | 2 if self.c == self.vert_timing_col + 1 => {
                self.c -= 2;
            }
            _ => {
                self.c -= 1;
            }
        }
        Some(res)
    }
}

#[cfg(test)]
mod iter_tests {
    use super::EncRegionIter;
    use crate::common::metadata::Version;

    #[test]
    fn test_starts_bottom_right_and_zigzags_up() {
        let mut coords = EncRegionIter::new(Version::Normal(1));
        assert_eq!(coords.next(), Some((20, 20)));
        assert_eq!(coords.next(), Some((20, 19)));
        assert_eq!(coords.next(), Some((19, 20)));
        assert_eq!(coords.next(), Some((19, 19)));
        assert_eq!(coords.next(), Some((18, 20)));
    }

    #[test]
    fn test_skips_vertical_timing_column() {
        let coords = EncRegionIter::new(Version::Normal(1));
        assert!(coords.into_iter().all(|(_, c)| c != 6));
        let coords = EncRegionIter::new(Version::Micro(2));
        assert!(coords.into_iter().all(|(_, c)| c != 0));
    }

    #[test]
    fn test_visits_every_non_timing_module_once() {
        for ver in [Version::Normal(1), Version::Normal(7), Version::Micro(1), Version::Micro(4)] {
            let w = ver.width() as i16;
            let mut seen = vec![false; (w * w) as usize];
            let mut count = 0;
            for (r, c) in EncRegionIter::new(ver) {
                let idx = (r * w + c) as usize;
                assert!(!seen[idx], "Coordinate visited twice: ({r}, {c})");
                seen[idx] = true;
                count += 1;
            }
            assert_eq!(count, (w * (w - 1)) as usize);
        }
    }
}
