//! QR and Micro QR symbol encoder.
//!
//! Turns textual content into the module matrix of a QR symbol: mode
//! analysis and segment formation, version and capacity selection, codeword
//! serialisation with Reed-Solomon error correction over GF(2^8), matrix
//! layout and data mask selection. Covers regular versions 1-40 and the four
//! Micro QR variants M1-M4. Rendering the matrix to pixels or vector art is
//! left to the caller.
//!
//! ```
//! use qrforge::{ECLevel, MicroMode, QrBuilder, Version};
//!
//! let symbol = QrBuilder::new("HELLO WORLD")
//!     .ec_level(ECLevel::Q)
//!     .micro(MicroMode::Forbid)
//!     .build()
//!     .unwrap();
//! assert_eq!(symbol.version(), Version::Normal(1));
//! assert_eq!(symbol.width(), 21);
//! ```

pub mod builder;
pub(crate) mod common;

pub use builder::{MicroMode, QrBuilder, Symbol};
pub use common::bitstream::BitStream;
pub use common::codec::{CharacterSet, Mode, Segment};
pub use common::error::{QrError, QrResult};
pub use common::mask::MaskPattern;
pub use common::metadata::{ECLevel, Version};

/// Encodes `content` with every option left to its default: auto-detected
/// mode, smallest fitting version of either symbol kind, boosted L error
/// level and the best-scoring mask.
pub fn encode(content: &str) -> QrResult<Symbol> {
    QrBuilder::new(content).build()
}
