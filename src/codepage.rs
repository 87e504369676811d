// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{Error, Result};

/// Text-encoding code page applied when decoding non-UTF filename input.
///
/// The engine itself stores and validates the identifier; transcoding is
/// performed by the adapter that feeds the OS open call.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[allow(missing_docs)]
pub enum CodePage {
    Ascii,
    Windows874,
    Windows932,
    Windows936,
    Windows949,
    Windows950,
    Windows1250,
    Windows1251,
    /// The default on-disk interpretation of legacy narrow filenames.
    #[default]
    Windows1252,
    Windows1253,
    Windows1254,
    Windows1255,
    Windows1256,
    Windows1257,
    Windows1258,
    Iso8859_1,
    Iso8859_2,
    Iso8859_3,
    Iso8859_4,
    Iso8859_5,
    Iso8859_6,
    Iso8859_7,
    Iso8859_8,
    Iso8859_9,
    Iso8859_10,
    Iso8859_11,
    Iso8859_13,
    Iso8859_14,
    Iso8859_15,
    Iso8859_16,
    Koi8R,
    Koi8U,
}

impl CodePage {
    /// The Windows code page identifier for this encoding.
    #[must_use]
    pub fn id(self) -> u32 {
        match self {
            Self::Ascii => 20_127,
            Self::Windows874 => 874,
            Self::Windows932 => 932,
            Self::Windows936 => 936,
            Self::Windows949 => 949,
            Self::Windows950 => 950,
            Self::Windows1250 => 1_250,
            Self::Windows1251 => 1_251,
            Self::Windows1252 => 1_252,
            Self::Windows1253 => 1_253,
            Self::Windows1254 => 1_254,
            Self::Windows1255 => 1_255,
            Self::Windows1256 => 1_256,
            Self::Windows1257 => 1_257,
            Self::Windows1258 => 1_258,
            Self::Iso8859_1 => 28_591,
            Self::Iso8859_2 => 28_592,
            Self::Iso8859_3 => 28_593,
            Self::Iso8859_4 => 28_594,
            Self::Iso8859_5 => 28_595,
            Self::Iso8859_6 => 28_596,
            Self::Iso8859_7 => 28_597,
            Self::Iso8859_8 => 28_598,
            Self::Iso8859_9 => 28_599,
            Self::Iso8859_10 => 28_600,
            Self::Iso8859_11 => 28_601,
            Self::Iso8859_13 => 28_603,
            Self::Iso8859_14 => 28_604,
            Self::Iso8859_15 => 28_605,
            Self::Iso8859_16 => 28_606,
            Self::Koi8R => 20_866,
            Self::Koi8U => 21_866,
        }
    }
}

impl TryFrom<u32> for CodePage {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            20_127 => Ok(Self::Ascii),
            874 => Ok(Self::Windows874),
            932 => Ok(Self::Windows932),
            936 => Ok(Self::Windows936),
            949 => Ok(Self::Windows949),
            950 => Ok(Self::Windows950),
            1_250 => Ok(Self::Windows1250),
            1_251 => Ok(Self::Windows1251),
            1_252 => Ok(Self::Windows1252),
            1_253 => Ok(Self::Windows1253),
            1_254 => Ok(Self::Windows1254),
            1_255 => Ok(Self::Windows1255),
            1_256 => Ok(Self::Windows1256),
            1_257 => Ok(Self::Windows1257),
            1_258 => Ok(Self::Windows1258),
            28_591 => Ok(Self::Iso8859_1),
            28_592 => Ok(Self::Iso8859_2),
            28_593 => Ok(Self::Iso8859_3),
            28_594 => Ok(Self::Iso8859_4),
            28_595 => Ok(Self::Iso8859_5),
            28_596 => Ok(Self::Iso8859_6),
            28_597 => Ok(Self::Iso8859_7),
            28_598 => Ok(Self::Iso8859_8),
            28_599 => Ok(Self::Iso8859_9),
            28_600 => Ok(Self::Iso8859_10),
            28_601 => Ok(Self::Iso8859_11),
            28_603 => Ok(Self::Iso8859_13),
            28_604 => Ok(Self::Iso8859_14),
            28_605 => Ok(Self::Iso8859_15),
            28_606 => Ok(Self::Iso8859_16),
            20_866 => Ok(Self::Koi8R),
            21_866 => Ok(Self::Koi8U),
            _ => Err(Error::invalid_argument("unknown code page identifier")),
        }
    }
}

impl std::fmt::Display for CodePage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ascii => write!(f, "ascii"),
            Self::Koi8R => write!(f, "koi8-r"),
            Self::Koi8U => write!(f, "koi8-u"),
            cp if cp.id() >= 28_591 => write!(f, "iso-8859-{}", cp.id() - 28_590),
            cp => write!(f, "windows-{}", cp.id()),
        }
    }
}
