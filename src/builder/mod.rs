mod canvas;

pub use canvas::Canvas;

use crate::common::{
    bitstream::BitStream,
    codec::{required_bits, serialize_segments, CharacterSet, Mode, Segment, Segments},
    ec::Block,
    error::{QrError, QrResult},
    mask::{apply_best_mask, MaskPattern},
    metadata::{ECLevel, Version},
};

// Micro preference
//------------------------------------------------------------------------------

/// Whether version selection may, must or must not pick a Micro QR symbol.
#[derive(Debug, PartialEq, Eq, Copy, Clone, Default)]
pub enum MicroMode {
    #[default]
    Either,
    Require,
    Forbid,
}

// Symbol
//------------------------------------------------------------------------------

/// A finished symbol: the module matrix plus the choices that produced it.
#[derive(Debug, Clone)]
pub struct Symbol {
    matrix: Vec<bool>,
    width: usize,
    version: Version,
    ec_level: ECLevel,
    mask: MaskPattern,
    segments: Vec<Segment>,
}

impl Symbol {
    /// Module count along one side.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn ec_level(&self) -> ECLevel {
        self.ec_level
    }

    pub fn mask(&self) -> MaskPattern {
        self.mask
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_micro(&self) -> bool {
        self.version.is_micro()
    }

    /// `"1"`..`"40"` or `"M1"`..`"M4"`.
    pub fn name(&self) -> String {
        self.version.to_string()
    }

    /// Row-major module view; `true` is dark.
    pub fn modules(&self) -> &[bool] {
        &self.matrix
    }

    pub fn get(&self, r: usize, c: usize) -> bool {
        debug_assert!(r < self.width && c < self.width, "Module out of bounds: ({r}, {c})");
        self.matrix[r * self.width + c]
    }
}

// Builder
//------------------------------------------------------------------------------

/// The options record of the encoder. Unset fields are chosen automatically:
/// smallest fitting version, auto-detected mode, best-scoring mask, L error
/// level boosted as far as the chosen version allows.
pub struct QrBuilder<'a> {
    content: &'a str,
    ver: Option<Version>,
    ecl: Option<ECLevel>,
    mode: Option<Mode>,
    mask: Option<MaskPattern>,
    charset: Option<CharacterSet>,
    eci: bool,
    micro: MicroMode,
    boost_ecl: bool,
}

impl<'a> QrBuilder<'a> {
    pub fn new(content: &'a str) -> Self {
        Self {
            content,
            ver: None,
            ecl: None,
            mode: None,
            mask: None,
            charset: None,
            eci: false,
            micro: MicroMode::default(),
            boost_ecl: true,
        }
    }

    pub fn version(&mut self, ver: Version) -> &mut Self {
        self.ver = Some(ver);
        self
    }

    pub fn ec_level(&mut self, ecl: ECLevel) -> &mut Self {
        self.ecl = Some(ecl);
        self
    }

    pub fn mode(&mut self, mode: Mode) -> &mut Self {
        self.mode = Some(mode);
        self
    }

    pub fn mask(&mut self, mask: MaskPattern) -> &mut Self {
        self.mask = Some(mask);
        self
    }

    pub fn charset(&mut self, charset: CharacterSet) -> &mut Self {
        self.charset = Some(charset);
        self
    }

    /// Emit an ECI header when the byte segment settles on a non-default
    /// character set.
    pub fn eci(&mut self, eci: bool) -> &mut Self {
        self.eci = eci;
        self
    }

    pub fn micro(&mut self, micro: MicroMode) -> &mut Self {
        self.micro = micro;
        self
    }

    /// Raise the error level as far as the chosen version still fits.
    /// Defaults to true.
    pub fn boost_error(&mut self, boost: bool) -> &mut Self {
        self.boost_ecl = boost;
        self
    }
}

impl QrBuilder<'_> {
    pub fn build(&self) -> QrResult<Symbol> {
        if self.content.is_empty() {
            return Err(QrError::InvalidInput);
        }
        if let Some(ver) = self.ver {
            ver.validate()?;
        }

        let mut segments = Segments::new();
        let seg = match self.mode {
            Some(mode) => Segment::make(self.content, mode, self.charset)?,
            None => Segment::auto(self.content, self.charset)?,
        };
        segments.push(seg);

        let (ver, ecl) = self.select_version_and_level(segments.as_slice())?;

        let mut canvas = prepare_canvas(segments.as_slice(), ver, ecl, self.eci)?;
        match self.mask {
            Some(mask) => canvas.apply_mask(mask)?,
            None => {
                apply_best_mask(&mut canvas)?;
            }
        };

        let (matrix, mask) = canvas.into_modules()?;
        Ok(Symbol {
            matrix,
            width: ver.width(),
            version: ver,
            ec_level: ecl,
            mask,
            segments: segments.into_vec(),
        })
    }

    fn select_version_and_level(&self, segments: &[Segment]) -> QrResult<(Version, ECLevel)> {
        // M1 symbols only detect errors; their capacity sits in the L column
        let base_ecl = self.ecl.unwrap_or(ECLevel::L);

        let ver = match self.ver {
            Some(ver) => {
                self.check_candidate(ver, segments, base_ecl)?;
                ver
            }
            None => self.find_smallest_version(segments, base_ecl)?,
        };

        let mut ecl = base_ecl;
        if self.boost_ecl && !matches!(ver, Version::Micro(1)) {
            let required = required_bits(segments, ver, self.eci)?;
            for next in (ecl as u8 + 1)..=ECLevel::H as u8 {
                let next = ECLevel::from(next);
                if ver.permits_level(next) && required <= ver.data_bit_capacity(next) {
                    ecl = next;
                }
            }
        }

        Ok((ver, ecl))
    }

    fn find_smallest_version(&self, segments: &[Segment], ecl: ECLevel) -> QrResult<Version> {
        let micro_candidates = (1..=4).map(Version::Micro);
        let normal_candidates = (1..=40).map(Version::Normal);
        let candidates: Box<dyn Iterator<Item = Version>> = match self.micro {
            MicroMode::Require => Box::new(micro_candidates),
            MicroMode::Forbid => Box::new(normal_candidates),
            MicroMode::Either => Box::new(micro_candidates.chain(normal_candidates)),
        };

        let mut failure = None;
        let mut capacity_failed = false;
        for ver in candidates {
            match self.check_candidate(ver, segments, ecl) {
                Ok(()) => return Ok(ver),
                Err(QrError::DataOverflow) => capacity_failed = true,
                Err(e) => failure = failure.or(Some(e)),
            }
        }

        if capacity_failed {
            Err(QrError::DataOverflow)
        } else {
            Err(failure.unwrap_or(QrError::DataOverflow))
        }
    }

    fn check_candidate(&self, ver: Version, segments: &[Segment], ecl: ECLevel) -> QrResult<()> {
        match self.micro {
            MicroMode::Require if !ver.is_micro() => return Err(QrError::InvalidVersion),
            MicroMode::Forbid if ver.is_micro() => return Err(QrError::InvalidVersion),
            _ => {}
        }
        if ver.is_micro() {
            // An explicit level contradicts M1's detection-only correction
            if matches!(ver, Version::Micro(1)) && self.ecl.is_some() {
                return Err(QrError::InvalidErrorLevel);
            }
            if let Some(mask) = self.mask {
                mask.validate(ver)?;
            }
        }
        if !ver.permits_level(ecl) {
            return Err(QrError::InvalidErrorLevel);
        }

        let required = required_bits(segments, ver, self.eci)?;
        if required > ver.data_bit_capacity(ecl) {
            return Err(QrError::DataOverflow);
        }
        Ok(())
    }
}

// Error correction & interleaving
//------------------------------------------------------------------------------

/// Serialises the segments and lays the interleaved codeword stream onto a
/// fresh canvas, up to (but excluding) mask selection.
pub(crate) fn prepare_canvas(
    segments: &[Segment],
    ver: Version,
    ecl: ECLevel,
    eci: bool,
) -> QrResult<Canvas> {
    let data = serialize_segments(segments, ver, ecl, eci)?;
    let blocks = blockify(data.data(), ver, ecl)?;

    let mut payload = BitStream::new(ver.payload_bit_len(ecl));
    interleave_into(&blocks, ver, &mut payload);

    let mut canvas = Canvas::new(ver, ecl);
    canvas.draw_all_function_patterns();
    canvas.draw_encoding_region(payload);
    Ok(canvas)
}

/// Splits the data codewords into the version's RS blocks; each block
/// computes its own error codewords.
pub(crate) fn blockify(data: &[u8], ver: Version, ecl: ECLevel) -> QrResult<Vec<Block>> {
    // b1s = block1 size, b1c = block1 count
    let (b1s, b1c, b2s, b2c) = ver.data_codewords_per_block(ecl);
    let ec_len = ver.ecc_per_block(ecl);

    let b1_total = b1s * b1c;
    let total = b1_total + b2s * b2c;
    debug_assert!(
        total == data.len(),
        "Data len doesn't match total size of blocks: Data len {}, Total block size {total}",
        data.len(),
    );

    let mut blocks = Vec::with_capacity(b1c + b2c);
    for chunk in data[..b1_total].chunks(b1s) {
        blocks.push(Block::new(chunk, b1s + ec_len)?);
    }
    if b2s > 0 {
        for chunk in data[b1_total..].chunks(b2s) {
            blocks.push(Block::new(chunk, b2s + ec_len)?);
        }
    }
    Ok(blocks)
}

/// Emits data codewords column-wise across blocks, then error codewords the
/// same way. M1 and M3 carry a single block whose final data codeword is only
/// the high nibble of its byte.
pub(crate) fn interleave_into(blocks: &[Block], ver: Version, out: &mut BitStream) {
    match ver {
        Version::Micro(1) | Version::Micro(3) => {
            debug_assert!(blocks.len() == 1, "Micro symbols carry a single block");
            let block = &blocks[0];
            let data = block.data();
            for b in &data[..data.len() - 1] {
                out.push_bits(*b, 8);
            }
            out.push_bits(data[data.len() - 1] >> 4, 4);
            for b in block.ecc() {
                out.push_bits(*b, 8);
            }
        }
        _ => {
            let max_len = blocks.iter().map(Block::data_len).max().unwrap_or(0);
            for i in 0..max_len {
                for block in blocks {
                    if let Some(b) = block.data().get(i) {
                        out.push_bits(*b, 8);
                    }
                }
            }
            let ec_len = blocks.first().map(Block::ec_len).unwrap_or(0);
            for i in 0..ec_len {
                for block in blocks {
                    if let Some(b) = block.ecc().get(i) {
                        out.push_bits(*b, 8);
                    }
                }
            }
        }
    }
}
