// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::vfs::{OsVfs, Vfs};
use crate::{Error, Result};

/// A recognised segment naming scheme.
///
/// A scheme is a pure function from segment index to filename, anchored at
/// the first segment's name, so that a later read-open of the same first
/// segment reproduces the same set of names.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum Scheme {
    /// Single-file image, no successors.
    Single { name: String },

    /// `<base>.raw`, continued as `<base>.raw.001`, `<base>.raw.002`, ...
    DotRaw { base: String },

    /// `<base>.raw.NNN`, continued with the next decimal, same width.
    RawNumeric {
        base: String,
        width: usize,
        value: u64,
    },

    /// `<base>.NNN`, continued with the next decimal, same width.
    Numeric {
        base: String,
        width: usize,
        value: u64,
    },

    /// `<base>.N.raw`, width grows when needed.
    NumericDotRaw {
        base: String,
        width: usize,
        value: u64,
    },

    /// `<base>aa`-style trailing alphabetic run, incremented like
    /// spreadsheet columns (`az` -> `ba`, `zz` -> `aaa`).
    Alpha { base: String, run: String },
}

impl Scheme {
    /// The naming scheme used when synthesising segment names on write.
    ///
    /// With a per-segment cap the `.NNN` scheme is used (`out.001`, ...);
    /// without one the basename itself is the only segment.
    pub(crate) fn for_write(basename: &str, capped: bool) -> Self {
        if capped {
            Self::Numeric {
                base: basename.to_string(),
                width: 3,
                value: 1,
            }
        } else {
            Self::Single {
                name: basename.to_string(),
            }
        }
    }

    /// The filename of segment `index` (0-based), or `None` when the
    /// scheme has no name for it (single-file images end at index 0).
    pub(crate) fn segment_name(&self, index: usize) -> Option<String> {
        match self {
            Self::Single { name } => (index == 0).then(|| name.clone()),
            Self::DotRaw { base } => {
                if index == 0 {
                    Some(format!("{base}.raw"))
                } else {
                    Some(format!("{base}.raw.{index:03}"))
                }
            }
            Self::RawNumeric { base, width, value } => {
                let width = *width;
                let value = value.checked_add(index as u64)?;
                Some(format!("{base}.raw.{value:0width$}"))
            }
            Self::Numeric { base, width, value } => {
                let width = *width;
                let value = value.checked_add(index as u64)?;
                Some(format!("{base}.{value:0width$}"))
            }
            Self::NumericDotRaw { base, width, value } => {
                let width = *width;
                let value = value.checked_add(index as u64)?;
                Some(format!("{base}.{value:0width$}.raw"))
            }
            Self::Alpha { base, run } => {
                let mut run = run.clone();
                for _ in 0..index {
                    run = next_alpha_run(&run);
                }
                Some(format!("{base}{run}"))
            }
        }
    }

    /// The basename the scheme suffix was stripped from. Used to derive
    /// sidecar filenames.
    pub(crate) fn base(&self) -> &str {
        match self {
            Self::Single { name } => name,
            Self::DotRaw { base }
            | Self::RawNumeric { base, .. }
            | Self::Numeric { base, .. }
            | Self::NumericDotRaw { base, .. }
            | Self::Alpha { base, .. } => base,
        }
    }
}

/// Splits a trailing `.<digits>` suffix off `name`.
fn split_trailing_number(name: &str) -> Option<(&str, &str)> {
    let dot = name.rfind('.')?;
    let digits = &name[dot + 1..];

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some((&name[..dot], digits))
}

/// Splits a trailing all-`a` (or all-`A`) run of length >= 2 off `name`.
fn split_trailing_alpha_run(name: &str) -> Option<(&str, &str)> {
    let run_start = name
        .bytes()
        .rposition(|b| b != b'a')
        .map_or(0, |pos| pos + 1);

    let run_start = if name.len() - run_start >= 2 {
        run_start
    } else {
        // retry uppercase
        let upper_start = name
            .bytes()
            .rposition(|b| b != b'A')
            .map_or(0, |pos| pos + 1);

        if name.len() - upper_start >= 2 {
            upper_start
        } else {
            return None;
        }
    };

    Some((&name[..run_start], &name[run_start..]))
}

/// Increments a same-case alphabetic run like a spreadsheet column:
/// `aa` -> `ab`, `az` -> `ba`, `zz` -> `aaa`.
fn next_alpha_run(run: &str) -> String {
    let (floor, ceil) = if run.bytes().next().is_some_and(|b| b.is_ascii_uppercase()) {
        (b'A', b'Z')
    } else {
        (b'a', b'z')
    };

    let mut bytes = run.as_bytes().to_vec();

    for b in bytes.iter_mut().rev() {
        if *b < ceil {
            *b += 1;
            return String::from_utf8_lossy(&bytes).into_owned();
        }
        *b = floor;
    }

    // full carry: one more letter
    bytes.insert(0, floor);
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Candidate schemes for a first segment name, most specific first.
pub(crate) fn candidates(first: &str) -> Vec<Scheme> {
    let mut out = Vec::new();

    if let Some(stem) = first.strip_suffix(".raw") {
        if let Some((base, digits)) = split_trailing_number(stem) {
            if let Ok(value) = digits.parse::<u64>() {
                out.push(Scheme::NumericDotRaw {
                    base: base.to_string(),
                    width: digits.len(),
                    value,
                });
            }
        }

        out.push(Scheme::DotRaw {
            base: stem.to_string(),
        });
    } else if let Some((base, digits)) = split_trailing_number(first) {
        if let Ok(value) = digits.parse::<u64>() {
            // `<base>.raw.NNN` and `<base>.NNN` generate identical
            // successor names; the more specific interpretation is kept.
            if let Some(raw_base) = base.strip_suffix(".raw") {
                out.push(Scheme::RawNumeric {
                    base: raw_base.to_string(),
                    width: digits.len(),
                    value,
                });
            } else {
                out.push(Scheme::Numeric {
                    base: base.to_string(),
                    width: digits.len(),
                    value,
                });
            }
        }
    } else if let Some((base, run)) = split_trailing_alpha_run(first) {
        out.push(Scheme::Alpha {
            base: base.to_string(),
            run: run.to_string(),
        });
    }

    out
}

/// The scheme a segment list anchored at `first` is following, resolved by
/// probing the filesystem, plus single-file fallback.
pub(crate) fn detect(vfs: &dyn Vfs, first: &str) -> Result<Scheme> {
    let mut live: Option<Scheme> = None;
    let mut live_successor: Option<String> = None;

    for scheme in candidates(first) {
        let Some(next) = scheme.segment_name(1) else {
            continue;
        };

        if !vfs.exists(&next) {
            continue;
        }

        match &live_successor {
            // two schemes probing positive with different successors
            Some(existing) if *existing != next => {
                return Err(Error::ambiguous(first).during("glob"));
            }
            Some(_) => {}
            None => {
                live_successor = Some(next);
                live = Some(scheme);
            }
        }
    }

    Ok(live.unwrap_or_else(|| Scheme::Single {
        name: first.to_string(),
    }))
}

/// Enumerates the ordered segment filenames of the image whose first
/// segment is `first`, using the given capability.
///
/// Fails with `NotFound` when `first` does not exist and `Ambiguous` when
/// two naming schemes match and disagree on the successor name.
pub fn glob_with(vfs: &dyn Vfs, first: &str) -> Result<Vec<String>> {
    if first.is_empty() {
        return Err(Error::invalid_argument("empty filename").during("glob"));
    }

    if !vfs.exists(first) {
        return Err(Error::not_found(first).during("glob"));
    }

    let scheme = detect(vfs, first)?;
    log::debug!("Globbing {first:?} via {scheme:?}");

    let mut names = vec![first.to_string()];

    for index in 1.. {
        let Some(name) = scheme.segment_name(index) else {
            break;
        };

        if !vfs.exists(&name) {
            break;
        }

        names.push(name);
    }

    Ok(names)
}

/// Enumerates the ordered segment filenames of an on-disk image.
///
/// See [`glob_with`].
pub fn glob(first: &str) -> Result<Vec<String>> {
    glob_with(&OsVfs, first)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use test_log::test;

    /// Write-path name of segment `index` for a capped image.
    fn segment_filename(basename: &str, index: usize) -> String {
        Scheme::for_write(basename, true)
            .segment_name(index)
            .unwrap()
    }

    fn touch(dir: &std::path::Path, name: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, b"x").unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn glob_single_file() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let first = touch(dir.path(), "evidence");

        assert_eq!(vec![first.clone()], glob(&first)?);
        Ok(())
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn glob_missing_first_segment() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let missing = dir.path().join("nope.raw");

        let err = glob(missing.to_str().unwrap()).unwrap_err();
        assert!(matches!(err.kind(), crate::ErrorKind::NotFound(_)));
        Ok(())
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn glob_dot_raw_scheme() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let first = touch(dir.path(), "sample.raw");
        let second = touch(dir.path(), "sample.raw.001");
        let third = touch(dir.path(), "sample.raw.002");

        assert_eq!(vec![first.clone(), second, third], glob(&first)?);
        Ok(())
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn glob_raw_numeric_scheme() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let first = touch(dir.path(), "img.raw.000");
        let second = touch(dir.path(), "img.raw.001");
        // gap: img.raw.003 is not part of the chain
        touch(dir.path(), "img.raw.003");

        assert_eq!(vec![first.clone(), second], glob(&first)?);
        Ok(())
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn glob_numeric_scheme() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let first = touch(dir.path(), "out.001");
        let second = touch(dir.path(), "out.002");
        let third = touch(dir.path(), "out.003");

        assert_eq!(vec![first.clone(), second, third], glob(&first)?);
        Ok(())
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn glob_numeric_dot_raw_scheme() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let first = touch(dir.path(), "disk.0.raw");
        let second = touch(dir.path(), "disk.1.raw");
        let third = touch(dir.path(), "disk.2.raw");

        assert_eq!(vec![first.clone(), second, third], glob(&first)?);
        Ok(())
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn glob_alpha_schemes() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;

        let first = touch(dir.path(), "imgaa");
        let second = touch(dir.path(), "imgab");
        let third = touch(dir.path(), "imgac");
        assert_eq!(vec![first.clone(), second, third], glob(&first)?);

        let first = touch(dir.path(), "diskAA");
        let second = touch(dir.path(), "diskAB");
        assert_eq!(vec![first.clone(), second], glob(&first)?);

        Ok(())
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn glob_ambiguous_naming() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let first = touch(dir.path(), "disk.0.raw");
        // both interpretations have a live successor
        touch(dir.path(), "disk.1.raw");
        touch(dir.path(), "disk.0.raw.001");

        let err = glob(&first).unwrap_err();
        assert!(matches!(err.kind(), crate::ErrorKind::Ambiguous(_)));
        Ok(())
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn glob_write_read_round_trip() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let basename = dir.path().join("image");
        let basename = basename.to_str().unwrap();

        for count in [1, 2, 7] {
            let names: Vec<String> = (0..count).map(|i| segment_filename(basename, i)).collect();

            for name in &names {
                std::fs::write(name, b"x").unwrap();
            }

            assert_eq!(names, glob(&names[0])?);

            for name in &names {
                std::fs::remove_file(name).unwrap();
            }
        }

        Ok(())
    }

    #[test]
    fn write_filenames_are_three_digit_padded() {
        assert_eq!("out.001", segment_filename("out", 0));
        assert_eq!("out.010", segment_filename("out", 9));
        assert_eq!("out.999", segment_filename("out", 998));
        assert_eq!("out.1000", segment_filename("out", 999));
    }

    #[test]
    fn numeric_width_widens_only_on_overflow() {
        let scheme = Scheme::Numeric {
            base: "part".to_string(),
            width: 3,
            value: 998,
        };

        assert_eq!(Some("part.998".to_string()), scheme.segment_name(0));
        assert_eq!(Some("part.999".to_string()), scheme.segment_name(1));
        assert_eq!(Some("part.1000".to_string()), scheme.segment_name(2));
    }

    #[test]
    fn alpha_run_increments_like_spreadsheet_columns() {
        assert_eq!("ab", next_alpha_run("aa"));
        assert_eq!("ba", next_alpha_run("az"));
        assert_eq!("ca", next_alpha_run("bz"));
        assert_eq!("aaa", next_alpha_run("zz"));
        assert_eq!("aab", next_alpha_run("aaa"));
        assert_eq!("AB", next_alpha_run("AA"));
        assert_eq!("BA", next_alpha_run("AZ"));
    }

    #[test]
    fn alpha_run_requires_all_a() {
        assert!(split_trailing_alpha_run("data").is_none());
        assert!(split_trailing_alpha_run("imga").is_none());
        assert_eq!(Some(("img", "aa")), split_trailing_alpha_run("imgaa"));
        assert_eq!(Some(("img", "aaa")), split_trailing_alpha_run("imgaaa"));
        assert_eq!(Some(("img", "AA")), split_trailing_alpha_run("imgAA"));
    }

    #[test]
    fn candidate_specificity() {
        // `.N.raw` is preferred over `.raw` for probing order
        let cands = candidates("disk.0.raw");
        assert!(matches!(cands[0], Scheme::NumericDotRaw { .. }));
        assert!(matches!(cands[1], Scheme::DotRaw { .. }));

        // `.raw.NNN` wins over the plain `.NNN` interpretation
        let cands = candidates("img.raw.001");
        assert_eq!(1, cands.len());
        assert!(matches!(cands[0], Scheme::RawNumeric { .. }));
    }

    #[test]
    fn scheme_base_strips_suffix() {
        assert_eq!("img", candidates("img.raw.001")[0].base());
        assert_eq!("sample", candidates("sample.raw")[0].base());
        assert_eq!("out", candidates("out.001")[0].base());
        assert_eq!("disk", candidates("disk.0.raw")[0].base());
        assert_eq!("img", candidates("imgaa")[0].base());
    }
}
