use crate::common::{
    bitstream::BitStream,
    error::{QrError, QrResult},
    iter::EncRegionIter,
    mask::MaskPattern,
    metadata::{
        format_info, ECLevel, Version, FORMAT_INFO_BIT_LEN, FORMAT_INFO_COORDS_MICRO_QR,
        FORMAT_INFO_COORDS_QR_MAIN, FORMAT_INFO_COORDS_QR_SIDE, VERSION_INFO_BIT_LEN,
        VERSION_INFO_COORDS_BL, VERSION_INFO_COORDS_TR,
    },
};

// Module
//------------------------------------------------------------------------------

/// One cell of the working matrix. `Empty` is the construction sentinel; the
/// remaining variants record which region claimed the cell and whether it is
/// dark.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Module {
    Empty,
    Func(bool),
    Format(bool),
    Version(bool),
    Data(bool),
}

impl Module {
    pub fn is_dark(self) -> bool {
        match self {
            Module::Empty => false,
            Module::Func(dark) | Module::Format(dark) | Module::Version(dark)
            | Module::Data(dark) => dark,
        }
    }
}

// Canvas
//------------------------------------------------------------------------------

/// Working matrix of a symbol under construction.
#[derive(Debug, Clone)]
pub struct Canvas {
    grid: Vec<Module>,
    w: usize,
    ver: Version,
    ecl: ECLevel,
    mask: Option<MaskPattern>,
}

impl Canvas {
    pub fn new(ver: Version, ecl: ECLevel) -> Self {
        debug_assert!(ver.validate().is_ok(), "Invalid version");

        let w = ver.width();
        Self { grid: vec![Module::Empty; w * w], w, ver, ecl, mask: None }
    }

    pub fn version(&self) -> Version {
        self.ver
    }

    pub fn width(&self) -> usize {
        self.w
    }

    pub fn ec_level(&self) -> ECLevel {
        self.ecl
    }

    pub fn mask(&self) -> Option<MaskPattern> {
        self.mask
    }

    pub fn count_dark_modules(&self) -> usize {
        self.grid.iter().filter(|m| m.is_dark()).count()
    }

    pub fn is_dark(&self, r: i16, c: i16) -> bool {
        self.get(r, c).is_dark()
    }

    // Negative coordinates wrap from the far edge
    fn coord_to_index(&self, r: i16, c: i16) -> usize {
        let w = self.w as i16;
        debug_assert!(-w <= r && r < w, "Row out of bounds: {r}");
        debug_assert!(-w <= c && c < w, "Column out of bounds: {c}");

        let r = if r < 0 { r + w } else { r };
        let c = if c < 0 { c + w } else { c };
        (r * w + c) as _
    }

    pub fn get(&self, r: i16, c: i16) -> Module {
        self.grid[self.coord_to_index(r, c)]
    }

    pub fn set(&mut self, r: i16, c: i16, module: Module) {
        let index = self.coord_to_index(r, c);
        self.grid[index] = module;
    }

    #[cfg(test)]
    pub fn to_debug_str(&self) -> String {
        let w = self.w as i16;
        let mut res = String::with_capacity((w * (w + 1)) as usize);
        res.push('\n');
        for i in 0..w {
            for j in 0..w {
                let c = match self.get(i, j) {
                    Module::Empty => '.',
                    Module::Func(true) => 'f',
                    Module::Func(false) => 'F',
                    Module::Version(true) => 'v',
                    Module::Version(false) => 'V',
                    Module::Format(true) => 'm',
                    Module::Format(false) => 'M',
                    Module::Data(true) => 'd',
                    Module::Data(false) => 'D',
                };
                res.push(c);
            }
            res.push('\n');
        }
        res
    }
}

#[cfg(test)]
mod canvas_util_tests {
    use super::{Canvas, Module};
    use crate::common::metadata::{ECLevel, Version};

    #[test]
    fn test_index_wrap() {
        let mut canvas = Canvas::new(Version::Normal(1), ECLevel::L);
        let w = canvas.w as i16;
        canvas.set(-1, -1, Module::Func(true));
        assert_eq!(canvas.get(w - 1, w - 1), Module::Func(true));
        canvas.set(0, 0, Module::Func(true));
        assert_eq!(canvas.get(-w, -w), Module::Func(true));
    }

    #[test]
    #[should_panic]
    fn test_row_out_of_bound() {
        let canvas = Canvas::new(Version::Normal(1), ECLevel::L);
        let w = canvas.w as i16;
        canvas.get(w, 0);
    }

    #[test]
    #[should_panic]
    fn test_col_index_overwrap() {
        let canvas = Canvas::new(Version::Normal(1), ECLevel::L);
        let w = canvas.w as i16;
        canvas.get(0, -(w + 1));
    }
}

// Finder pattern
//------------------------------------------------------------------------------

impl Canvas {
    fn draw_finder_patterns(&mut self) {
        self.draw_finder_pattern_at(3, 3);
        if !self.ver.is_micro() {
            self.draw_finder_pattern_at(3, -4);
            self.draw_finder_pattern_at(-4, 3);
        }
    }

    // 7x7 finder with its one-module light separator; the separator side
    // facing the symbol edge is folded outside and clipped by the sign trick
    fn draw_finder_pattern_at(&mut self, r: i16, c: i16) {
        let (dr_top, dr_bottom) = if r > 0 { (-3, 4) } else { (-4, 3) };
        let (dc_left, dc_right) = if c > 0 { (-3, 4) } else { (-4, 3) };
        for i in dr_top..=dr_bottom {
            for j in dc_left..=dc_right {
                self.set(
                    r + i,
                    c + j,
                    match (i, j) {
                        (4 | -4, _) | (_, 4 | -4) => Module::Func(false),
                        (3 | -3, _) | (_, 3 | -3) => Module::Func(true),
                        (2 | -2, _) | (_, 2 | -2) => Module::Func(false),
                        _ => Module::Func(true),
                    },
                );
            }
        }
    }
}

// Timing pattern
//------------------------------------------------------------------------------

impl Canvas {
    fn draw_timing_patterns(&mut self) {
        let w = self.w as i16;
        let (offset, last) = match self.ver {
            Version::Micro(_) => (0, w - 1),
            Version::Normal(_) => (6, w - 9),
        };
        self.draw_alternating_line(offset, 8, offset, last);
        self.draw_alternating_line(8, offset, last, offset);
    }

    fn draw_alternating_line(&mut self, r1: i16, c1: i16, r2: i16, c2: i16) {
        debug_assert!(r1 == r2 || c1 == c2, "Line is neither vertical nor horizontal");

        if r1 == r2 {
            for j in c1..=c2 {
                self.set(r1, j, Module::Func(j & 1 == 0));
            }
        } else {
            for i in r1..=r2 {
                self.set(i, c1, Module::Func(i & 1 == 0));
            }
        }
    }
}

// Alignment pattern
//------------------------------------------------------------------------------

impl Canvas {
    fn draw_alignment_patterns(&mut self) {
        let positions = self.ver.alignment_pattern();
        for &r in positions {
            for &c in positions {
                self.draw_alignment_pattern_at(r, c);
            }
        }
    }

    fn draw_alignment_pattern_at(&mut self, r: i16, c: i16) {
        let w = self.w as i16;
        if (r == 6 && (c == 6 || c - w == -7)) || (r - w == -7 && c == 6) {
            return;
        }
        for i in -2..=2 {
            for j in -2..=2 {
                self.set(
                    r + i,
                    c + j,
                    match (i, j) {
                        (-2 | 2, _) | (_, -2 | 2) | (0, 0) => Module::Func(true),
                        _ => Module::Func(false),
                    },
                )
            }
        }
    }
}

// All function patterns
//------------------------------------------------------------------------------

impl Canvas {
    pub fn draw_all_function_patterns(&mut self) {
        self.draw_finder_patterns();
        self.draw_timing_patterns();
        self.draw_alignment_patterns();
    }
}

// Format & version info
//------------------------------------------------------------------------------

impl Canvas {
    fn reserve_format_area(&mut self) {
        self.draw_format_info((1 << FORMAT_INFO_BIT_LEN) - 1);
    }

    fn draw_format_info(&mut self, format_info: u32) {
        let (off, on) = (Module::Format(false), Module::Format(true));
        match self.ver {
            Version::Micro(_) => {
                self.draw_number(
                    format_info,
                    FORMAT_INFO_BIT_LEN,
                    off,
                    on,
                    &FORMAT_INFO_COORDS_MICRO_QR,
                );
            }
            Version::Normal(_) => {
                self.draw_number(format_info, FORMAT_INFO_BIT_LEN, off, on, &FORMAT_INFO_COORDS_QR_MAIN);
                self.draw_number(format_info, FORMAT_INFO_BIT_LEN, off, on, &FORMAT_INFO_COORDS_QR_SIDE);
                // Dark module
                self.set(-8, 8, Module::Format(true));
            }
        }
    }

    fn draw_version_info(&mut self) {
        match self.ver {
            Version::Micro(_) | Version::Normal(1..=6) => {}
            Version::Normal(7..=40) => {
                let ver_info = self.ver.info();
                let (off, on) = (Module::Version(false), Module::Version(true));
                self.draw_number(ver_info, VERSION_INFO_BIT_LEN, off, on, &VERSION_INFO_COORDS_BL);
                self.draw_number(ver_info, VERSION_INFO_BIT_LEN, off, on, &VERSION_INFO_COORDS_TR);
            }
            _ => unreachable!("Invalid version"),
        }
    }

    fn draw_number(
        &mut self,
        number: u32,
        bit_len: usize,
        off_module: Module,
        on_module: Module,
        coords: &[(i16, i16)],
    ) {
        let mut mask = 1 << (bit_len - 1);
        for (r, c) in coords {
            let module = if number & mask == 0 { off_module } else { on_module };
            self.set(*r, *c, module);
            mask >>= 1;
        }
    }
}

// Encoding region
//------------------------------------------------------------------------------

impl Canvas {
    /// Reserves the info areas, then walks the placement order writing one
    /// payload bit into every unreserved module. Left-over cells are the
    /// remainder bits, which stay light.
    pub fn draw_encoding_region(&mut self, payload: BitStream) {
        self.reserve_format_area();
        self.draw_version_info();

        let mut coords = EncRegionIter::new(self.ver);
        for bit in payload {
            for (r, c) in coords.by_ref() {
                if matches!(self.get(r, c), Module::Empty) {
                    self.set(r, c, Module::Data(bit));
                    break;
                }
            }
        }
        self.fill_remainder_bits(coords);

        debug_assert!(
            !self.grid.contains(&Module::Empty),
            "Unset module left after drawing encoding region"
        );
    }

    fn fill_remainder_bits(&mut self, coords: impl Iterator<Item = (i16, i16)>) {
        let mut filled = 0;
        for (r, c) in coords {
            if matches!(self.get(r, c), Module::Empty) {
                self.set(r, c, Module::Data(false));
                filled += 1;
            }
        }
        debug_assert!(
            filled == self.ver.remainder_bits(),
            "Left-over cells don't match the remainder bit count: {filled}"
        );
    }

    /// XORs the mask into the data modules and writes the matching format
    /// information word.
    pub fn apply_mask(&mut self, pattern: MaskPattern) -> QrResult<()> {
        pattern.validate(self.ver)?;
        let format_info = format_info(self.ver, self.ecl, pattern)?;

        self.mask = Some(pattern);
        let mask_fn = pattern.function(self.ver);
        let w = self.w as i16;
        for r in 0..w {
            for c in 0..w {
                if mask_fn(r, c) {
                    if let Module::Data(dark) = self.get(r, c) {
                        self.set(r, c, Module::Data(!dark));
                    }
                }
            }
        }
        self.draw_format_info(format_info);
        Ok(())
    }

    pub(crate) fn into_modules(self) -> QrResult<(Vec<bool>, MaskPattern)> {
        let mask = self.mask.ok_or(QrError::InvalidMask)?;
        debug_assert!(!self.grid.contains(&Module::Empty), "Unset module in finished symbol");
        Ok((self.grid.into_iter().map(Module::is_dark).collect(), mask))
    }
}

#[cfg(test)]
mod function_pattern_tests {
    use super::Canvas;
    use crate::common::metadata::{ECLevel, Version};

    #[test]
    fn test_finder_pattern_qr() {
        let mut canvas = Canvas::new(Version::Normal(1), ECLevel::L);
        canvas.draw_finder_patterns();
        assert_eq!(
            canvas.to_debug_str(),
            "\n\
             fffffffF.....Ffffffff\n\
             fFFFFFfF.....FfFFFFFf\n\
             fFfffFfF.....FfFfffFf\n\
             fFfffFfF.....FfFfffFf\n\
             fFfffFfF.....FfFfffFf\n\
             fFFFFFfF.....FfFFFFFf\n\
             fffffffF.....Ffffffff\n\
             FFFFFFFF.....FFFFFFFF\n\
             .....................\n\
             .....................\n\
             .....................\n\
             .....................\n\
             .....................\n\
             FFFFFFFF.............\n\
             fffffffF.............\n\
             fFFFFFfF.............\n\
             fFfffFfF.............\n\
             fFfffFfF.............\n\
             fFfffFfF.............\n\
             fFFFFFfF.............\n\
             fffffffF.............\n"
        );
    }

    #[test]
    fn test_timing_pattern_qr() {
        let mut canvas = Canvas::new(Version::Normal(1), ECLevel::L);
        canvas.draw_timing_patterns();
        assert_eq!(
            canvas.to_debug_str(),
            "\n\
             .....................\n\
             .....................\n\
             .....................\n\
             .....................\n\
             .....................\n\
             .....................\n\
             ........fFfFf........\n\
             .....................\n\
             ......f..............\n\
             ......F..............\n\
             ......f..............\n\
             ......F..............\n\
             ......f..............\n\
             .....................\n\
             .....................\n\
             .....................\n\
             .....................\n\
             .....................\n\
             .....................\n\
             .....................\n\
             .....................\n"
        );
    }

    #[test]
    fn test_all_function_patterns_v3() {
        let mut canvas = Canvas::new(Version::Normal(3), ECLevel::L);
        canvas.draw_all_function_patterns();
        assert_eq!(
            canvas.to_debug_str(),
            "\n\
             fffffffF.............Ffffffff\n\
             fFFFFFfF.............FfFFFFFf\n\
             fFfffFfF.............FfFfffFf\n\
             fFfffFfF.............FfFfffFf\n\
             fFfffFfF.............FfFfffFf\n\
             fFFFFFfF.............FfFFFFFf\n\
             fffffffFfFfFfFfFfFfFfFfffffff\n\
             FFFFFFFF.............FFFFFFFF\n\
             ......f......................\n\
             ......F......................\n\
             ......f......................\n\
             ......F......................\n\
             ......f......................\n\
             ......F......................\n\
             ......f......................\n\
             ......F......................\n\
             ......f......................\n\
             ......F......................\n\
             ......f......................\n\
             ......F......................\n\
             ......f.............fffff....\n\
             FFFFFFFF............fFFFf....\n\
             fffffffF............fFfFf....\n\
             fFFFFFfF............fFFFf....\n\
             fFfffFfF............fffff....\n\
             fFfffFfF.....................\n\
             fFfffFfF.....................\n\
             fFFFFFfF.....................\n\
             fffffffF.....................\n"
        );
    }

    #[test]
    fn test_alignment_pattern_v7() {
        let mut canvas = Canvas::new(Version::Normal(7), ECLevel::L);
        canvas.draw_finder_patterns();
        canvas.draw_alignment_patterns();
        assert_eq!(
            canvas.to_debug_str(),
            "\n\
             fffffffF.............................Ffffffff\n\
             fFFFFFfF.............................FfFFFFFf\n\
             fFfffFfF.............................FfFfffFf\n\
             fFfffFfF.............................FfFfffFf\n\
             fFfffFfF............fffff............FfFfffFf\n\
             fFFFFFfF............fFFFf............FfFFFFFf\n\
             fffffffF............fFfFf............Ffffffff\n\
             FFFFFFFF............fFFFf............FFFFFFFF\n\
             ....................fffff....................\n\
             .............................................\n\
             .............................................\n\
             .............................................\n\
             .............................................\n\
             .............................................\n\
             .............................................\n\
             .............................................\n\
             .............................................\n\
             .............................................\n\
             .............................................\n\
             .............................................\n\
             ....fffff...........fffff...........fffff....\n\
             ....fFFFf...........fFFFf...........fFFFf....\n\
             ....fFfFf...........fFfFf...........fFfFf....\n\
             ....fFFFf...........fFFFf...........fFFFf....\n\
             ....fffff...........fffff...........fffff....\n\
             .............................................\n\
             .............................................\n\
             .............................................\n\
             .............................................\n\
             .............................................\n\
             .............................................\n\
             .............................................\n\
             .............................................\n\
             .............................................\n\
             .............................................\n\
             .............................................\n\
             ....................fffff...........fffff....\n\
             FFFFFFFF............fFFFf...........fFFFf....\n\
             fffffffF............fFfFf...........fFfFf....\n\
             fFFFFFfF............fFFFf...........fFFFf....\n\
             fFfffFfF............fffff...........fffff....\n\
             fFfffFfF.....................................\n\
             fFfffFfF.....................................\n\
             fFFFFFfF.....................................\n\
             fffffffF.....................................\n"
        );
    }

    #[test]
    fn test_micro_function_patterns_m1() {
        let mut canvas = Canvas::new(Version::Micro(1), ECLevel::L);
        canvas.draw_all_function_patterns();
        assert_eq!(
            canvas.to_debug_str(),
            "\n\
             fffffffFfFf\n\
             fFFFFFfF...\n\
             fFfffFfF...\n\
             fFfffFfF...\n\
             fFfffFfF...\n\
             fFFFFFfF...\n\
             fffffffF...\n\
             FFFFFFFF...\n\
             f..........\n\
             F..........\n\
             f..........\n"
        );
    }

    #[test]
    fn test_micro_function_patterns_m2() {
        let mut canvas = Canvas::new(Version::Micro(2), ECLevel::L);
        canvas.draw_all_function_patterns();
        assert_eq!(
            canvas.to_debug_str(),
            "\n\
             fffffffFfFfFf\n\
             fFFFFFfF.....\n\
             fFfffFfF.....\n\
             fFfffFfF.....\n\
             fFfffFfF.....\n\
             fFFFFFfF.....\n\
             fffffffF.....\n\
             FFFFFFFF.....\n\
             f............\n\
             F............\n\
             f............\n\
             F............\n\
             f............\n"
        );
    }
}
