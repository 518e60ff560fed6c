use std::ops::Deref;

use super::error::{QrError, QrResult};
use super::metadata::Version;
use crate::builder::Canvas;

// Mask pattern
//------------------------------------------------------------------------------

/// Data mask index: 0..=7 for regular symbols, 0..=3 for micro. The four
/// micro patterns borrow the regular predicates 1, 4, 6 and 7.
#[derive(Debug, PartialEq, Eq, Copy, Clone, PartialOrd, Ord)]
pub struct MaskPattern(u8);

impl MaskPattern {
    pub fn new(pattern: u8) -> Self {
        debug_assert!(pattern < 8, "Invalid masking pattern");
        Self(pattern)
    }
}

impl Deref for MaskPattern {
    type Target = u8;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

mod mask_functions {
    pub fn checkerboard(r: i16, c: i16) -> bool {
        (r + c) & 1 == 0
    }

    pub fn horizontal_lines(r: i16, _: i16) -> bool {
        r & 1 == 0
    }

    pub fn vertical_lines(_: i16, c: i16) -> bool {
        c % 3 == 0
    }

    pub fn diagonal_lines(r: i16, c: i16) -> bool {
        (r + c) % 3 == 0
    }

    pub fn large_checkerboard(r: i16, c: i16) -> bool {
        ((r >> 1) + (c / 3)) & 1 == 0
    }

    pub fn fields(r: i16, c: i16) -> bool {
        ((r * c) & 1) + ((r * c) % 3) == 0
    }

    pub fn diamonds(r: i16, c: i16) -> bool {
        (((r * c) & 1) + ((r * c) % 3)) & 1 == 0
    }

    pub fn meadow(r: i16, c: i16) -> bool {
        (((r + c) & 1) + ((r * c) % 3)) & 1 == 0
    }
}

static MICRO_MASK_EQUIVALENTS: [u8; 4] = [1, 4, 6, 7];

impl MaskPattern {
    pub(crate) fn validate(self, ver: Version) -> QrResult<()> {
        let limit = if ver.is_micro() { 4 } else { 8 };
        if self.0 < limit {
            Ok(())
        } else {
            Err(QrError::InvalidMask)
        }
    }

    /// Predicate over (row, col); true means the module is toggled.
    pub fn function(self, ver: Version) -> fn(i16, i16) -> bool {
        let index = match ver {
            Version::Micro(_) => MICRO_MASK_EQUIVALENTS[self.0 as usize],
            Version::Normal(_) => self.0,
        };

        match index {
            0b000 => mask_functions::checkerboard,
            0b001 => mask_functions::horizontal_lines,
            0b010 => mask_functions::vertical_lines,
            0b011 => mask_functions::diagonal_lines,
            0b100 => mask_functions::large_checkerboard,
            0b101 => mask_functions::fields,
            0b110 => mask_functions::diamonds,
            0b111 => mask_functions::meadow,
            _ => unreachable!("Invalid pattern"),
        }
    }
}

// Mask selection
//------------------------------------------------------------------------------

/// Tries every permitted mask, scores the outcome and applies the winner.
/// Regular symbols minimise the penalty sum; micro symbols maximise the dark
/// edge score. Ties fall to the lowest index.
pub(crate) fn apply_best_mask(canvas: &mut Canvas) -> QrResult<MaskPattern> {
    let micro = canvas.version().is_micro();
    let count = if micro { 4 } else { 8 };

    let mut best: Option<(MaskPattern, u32)> = None;
    for m in 0..count {
        let pattern = MaskPattern::new(m);
        let mut trial = canvas.clone();
        trial.apply_mask(pattern)?;
        let score =
            if micro { compute_edge_score(&trial) } else { compute_total_penalty(&trial) };
        let better = match best {
            None => true,
            Some((_, s)) if micro => score > s,
            Some((_, s)) => score < s,
        };
        if better {
            best = Some((pattern, score));
        }
    }

    let (pattern, _) = best.ok_or(QrError::InvalidMask)?;
    canvas.apply_mask(pattern)?;
    Ok(pattern)
}

pub(crate) fn compute_total_penalty(qr: &Canvas) -> u32 {
    compute_adjacent_penalty(qr)
        + compute_block_penalty(qr)
        + compute_finder_pattern_penalty(qr, true)
        + compute_finder_pattern_penalty(qr, false)
        + compute_balance_penalty(qr)
}

// Runs of five or more equal modules in a row or column score length - 2
fn compute_adjacent_penalty(qr: &Canvas) -> u32 {
    let w = qr.width() as i16;
    let mut pen = 0;
    for i in 0..w {
        pen += line_run_penalty((0..w).map(|j| qr.is_dark(i, j)));
        pen += line_run_penalty((0..w).map(|j| qr.is_dark(j, i)));
    }
    pen
}

fn line_run_penalty(line: impl Iterator<Item = bool>) -> u32 {
    let mut pen = 0;
    let mut last = None;
    let mut run = 0_u32;
    for module in line {
        if last == Some(module) {
            run += 1;
        } else {
            if run >= 5 {
                pen += run - 2;
            }
            last = Some(module);
            run = 1;
        }
    }
    if run >= 5 {
        pen += run - 2;
    }
    pen
}

// Every 2x2 block of equal modules scores 3
fn compute_block_penalty(qr: &Canvas) -> u32 {
    let w = qr.width() as i16;
    let mut pen = 0;
    for r in 0..w - 1 {
        for c in 0..w - 1 {
            let m = qr.is_dark(r, c);
            if m == qr.is_dark(r + 1, c) && m == qr.is_dark(r, c + 1) && m == qr.is_dark(r + 1, c + 1)
            {
                pen += 3;
            }
        }
    }
    pen
}

// A 1:1:3:1:1 finder-like run with four light modules on either side scores 40
fn compute_finder_pattern_penalty(qr: &Canvas, horizontal: bool) -> u32 {
    static PATTERN: [bool; 7] = [true, false, true, true, true, false, true];
    let w = qr.width() as i16;
    let at = |i: i16, j: i16| if horizontal { qr.is_dark(i, j) } else { qr.is_dark(j, i) };

    let mut pen = 0;
    for i in 0..w {
        for j in 0..=w - 7 {
            if (0..7).any(|k| at(i, j + k) != PATTERN[k as usize]) {
                continue;
            }
            let light_before = j >= 4 && (j - 4..j).all(|x| !at(i, x));
            let light_after = j + 11 <= w && (j + 7..j + 11).all(|x| !at(i, x));
            if light_before || light_after {
                pen += 40;
            }
        }
    }
    pen
}

// Deviation of the dark-module share from 50%, in steps of 5%
fn compute_balance_penalty(qr: &Canvas) -> u32 {
    let dark = qr.count_dark_modules();
    let total = qr.width() * qr.width();
    let deviation = (2 * dark).abs_diff(total);
    (10 * (deviation * 10 / total)) as u32
}

// Dark-module counts along the right and lower edges; higher is better
pub(crate) fn compute_edge_score(qr: &Canvas) -> u32 {
    let w = qr.width() as i16;
    let s1 = (1..w).filter(|&r| qr.is_dark(r, w - 1)).count() as u32;
    let s2 = (1..w).filter(|&c| qr.is_dark(w - 1, c)).count() as u32;
    s1.min(s2) * 16 + s1.max(s2)
}
