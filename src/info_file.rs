// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::error::MalformedKind;
use crate::vfs::{OpenMode, Vfs};
use crate::{Error, Result};

/// Section name of the user-supplied media description values.
pub const INFORMATION_VALUES_SECTION: &str = "information_values";

/// Section name of the integrity hash values.
pub const INTEGRITY_HASH_VALUES_SECTION: &str = "integrity_hash_values";

fn is_identifier(s: &str) -> bool {
    let mut bytes = s.bytes();

    let Some(first) = bytes.next() else {
        return false;
    };

    (first.is_ascii_alphabetic() || first == b'_')
        && bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

#[derive(Clone, Debug, Eq, PartialEq)]
struct Section {
    name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }
}

/// The sidecar information file, in memory.
///
/// Sections map keys to values; both levels keep insertion order so that
/// two runs writing the same data emit byte-identical text.
///
/// Keys and section names are ASCII identifiers (`[A-Za-z_][A-Za-z0-9_]*`);
/// values are arbitrary UTF-8, possibly multi-line. Leading whitespace on
/// non-first value lines is not representable in the text format and is
/// stripped on a parse round trip.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct InformationFile {
    sections: Vec<Section>,
}

impl InformationFile {
    /// Creates an empty information file.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no values are stored at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.iter().all(|s| s.entries.is_empty())
    }

    fn section_index_or_insert(&mut self, name: &str) -> usize {
        if let Some(index) = self.sections.iter().position(|s| s.name == name) {
            return index;
        }

        self.sections.push(Section {
            name: name.to_string(),
            entries: Vec::new(),
        });

        self.sections.len() - 1
    }

    /// Sets `section.key` to `value`, replacing any previous value while
    /// keeping the key's original position.
    pub fn set_value(&mut self, section: &str, key: &str, value: &str) -> Result<()> {
        if !is_identifier(section) {
            return Err(Error::invalid_argument("section name is not an identifier"));
        }
        if !is_identifier(key) {
            return Err(Error::invalid_argument("key is not an identifier"));
        }

        let index = self.section_index_or_insert(section);
        let section = &mut self.sections[index];

        if let Some(pos) = section.position(key) {
            section.entries[pos].1 = value.to_string();
        } else {
            section.entries.push((key.to_string(), value.to_string()));
        }

        Ok(())
    }

    /// The value of `section.key`, if present.
    #[must_use]
    pub fn value(&self, section: &str, key: &str) -> Option<&str> {
        let section = self.sections.iter().find(|s| s.name == section)?;
        let pos = section.position(key)?;
        Some(&section.entries[pos].1)
    }

    /// Removes `section.key`, returning the previous value.
    pub fn remove_value(&mut self, section: &str, key: &str) -> Option<String> {
        let section = self.sections.iter_mut().find(|s| s.name == section)?;
        let pos = section.position(key)?;
        Some(section.entries.remove(pos).1)
    }

    /// Section names, in insertion order.
    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.name.as_str())
    }

    /// Keys of `section`, in insertion order.
    pub fn keys<'a>(&'a self, section: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.sections
            .iter()
            .filter(move |s| s.name == section)
            .flat_map(|s| s.entries.iter().map(|(k, _)| k.as_str()))
    }

    /// Parses the text format.
    ///
    /// With `lenient` set, a duplicate key within a section keeps the last
    /// value instead of failing.
    pub fn parse(text: &str, lenient: bool) -> Result<Self> {
        let mut info = Self::new();

        let mut current_section: Option<usize> = None;
        let mut last_entry: Option<(usize, usize)> = None;

        for (index, line) in text.lines().enumerate() {
            let line_number = index + 1;

            // str::lines already strips \n; tolerate \r\n input
            let line = line.strip_suffix('\r').unwrap_or(line);

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with(' ') || line.starts_with('\t') {
                let Some((section, entry)) = last_entry else {
                    return Err(Error::malformed(
                        MalformedKind::ContinuationWithoutKey,
                        line_number,
                    ));
                };

                let content = line.trim_start_matches([' ', '\t']);
                let value = &mut info.sections[section].entries[entry].1;
                value.push('\n');
                value.push_str(content);
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let name = rest
                    .strip_suffix(']')
                    .filter(|name| is_identifier(name))
                    .ok_or_else(|| Error::malformed(MalformedKind::Section, line_number))?;

                current_section = Some(info.section_index_or_insert(name));
                last_entry = None;
                continue;
            }

            let colon = line
                .find(':')
                .ok_or_else(|| Error::malformed(MalformedKind::Key, line_number))?;

            let key = &line[..colon];
            if !is_identifier(key) {
                return Err(Error::malformed(MalformedKind::Key, line_number));
            }

            let rest = &line[colon + 1..];
            let value = if rest.is_empty() {
                ""
            } else {
                rest.strip_prefix(' ')
                    .ok_or_else(|| Error::malformed(MalformedKind::Key, line_number))?
            };

            let Some(section) = current_section else {
                // the format has no anonymous section
                return Err(Error::malformed(MalformedKind::Key, line_number));
            };

            if let Some(pos) = info.sections[section].position(key) {
                if !lenient {
                    return Err(Error::malformed(MalformedKind::DuplicateKey, line_number));
                }

                log::warn!("Duplicate key {key:?} at line {line_number}, keeping the last value");
                info.sections[section].entries[pos].1 = value.to_string();
                last_entry = Some((section, pos));
            } else {
                info.sections[section]
                    .entries
                    .push((key.to_string(), value.to_string()));
                last_entry = Some((section, info.sections[section].entries.len() - 1));
            }
        }

        Ok(info)
    }

    /// Emits the text format: deterministic, `\n`-terminated lines, blank
    /// line between sections, two-space continuation indent.
    #[must_use]
    pub fn emit(&self) -> String {
        let mut out = String::new();

        for (index, section) in self.sections.iter().enumerate() {
            if index > 0 {
                out.push('\n');
            }

            out.push('[');
            out.push_str(&section.name);
            out.push_str("]\n");

            for (key, value) in &section.entries {
                out.push_str(key);

                let mut lines = value.split('\n');

                match lines.next() {
                    Some("") if value.is_empty() => out.push_str(":\n"),
                    Some(first) => {
                        out.push_str(": ");
                        out.push_str(first);
                        out.push('\n');
                    }
                    None => out.push_str(":\n"),
                }

                for line in lines {
                    out.push_str("  ");
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }

        out
    }

    /// Reads and parses the file `name` through the capability.
    pub fn read_from(vfs: &dyn Vfs, name: &str, lenient: bool) -> Result<Self> {
        let mut file = vfs
            .open(name, OpenMode::Read)
            .map_err(|e| Error::from(e).during("information file read"))?;

        let mut raw = Vec::new();
        let mut chunk = [0u8; 8 << 10];

        loop {
            let n = match file.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::from(e).during("information file read")),
            };
            raw.extend_from_slice(&chunk[..n]);
        }

        let text = String::from_utf8_lossy(&raw);
        Self::parse(&text, lenient).map_err(|e| e.during("information file read"))
    }

    /// Writes the emitted text to `name`, replacing any previous file
    /// atomically where the capability supports it.
    pub fn write_to(&self, vfs: &dyn Vfs, name: &str) -> Result<()> {
        log::debug!("Writing information file {name:?}");

        vfs.rewrite_atomic(name, self.emit().as_bytes())
            .map_err(|e| Error::from(e).during("information file write"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn info_set_get_remove() -> crate::Result<()> {
        let mut info = InformationFile::new();
        assert!(info.is_empty());

        info.set_value("imaging", "case_number", "CASE-42")?;
        info.set_value("imaging", "description", "Left disk")?;
        assert!(!info.is_empty());

        assert_eq!(Some("CASE-42"), info.value("imaging", "case_number"));
        assert_eq!(None, info.value("imaging", "examiner"));
        assert_eq!(None, info.value("other", "case_number"));

        info.set_value("imaging", "case_number", "CASE-43")?;
        assert_eq!(Some("CASE-43"), info.value("imaging", "case_number"));

        assert_eq!(
            Some("CASE-43".to_string()),
            info.remove_value("imaging", "case_number")
        );
        assert_eq!(None, info.value("imaging", "case_number"));

        Ok(())
    }

    #[test]
    fn info_rejects_bad_identifiers() {
        let mut info = InformationFile::new();

        assert!(info.set_value("1bad", "key", "v").is_err());
        assert!(info.set_value("section", "bad key", "v").is_err());
        assert!(info.set_value("section", "", "v").is_err());
        assert!(info.set_value("", "key", "v").is_err());
        assert!(info.set_value("ok_section", "ok_key_2", "v").is_ok());
    }

    #[test]
    fn info_scenario_round_trip() -> crate::Result<()> {
        let text = "[imaging]\ncase_number: CASE-42\ndescription: Left-disk\n  of laptop\n";

        let info = InformationFile::parse(text, false)?;
        assert_eq!(Some("CASE-42"), info.value("imaging", "case_number"));
        assert_eq!(
            Some("Left-disk\nof laptop"),
            info.value("imaging", "description")
        );

        assert_eq!(text, info.emit());
        Ok(())
    }

    #[test]
    fn info_parse_emit_stability() -> crate::Result<()> {
        let mut info = InformationFile::new();
        info.set_value("information_values", "description", "drive 2\nbay 4")?;
        info.set_value("information_values", "examiner_name", "jdoe")?;
        info.set_value("integrity_hash_values", "md5", "d41d8cd98f00b204e9800998ecf8427e")?;

        let emitted = info.emit();
        let reparsed = InformationFile::parse(&emitted, false)?;

        assert_eq!(info, reparsed);
        assert_eq!(emitted, reparsed.emit());

        Ok(())
    }

    #[test]
    fn info_section_and_key_order_is_insertion_order() -> crate::Result<()> {
        let mut info = InformationFile::new();
        info.set_value("zeta", "z_key", "1")?;
        info.set_value("alpha", "b_key", "2")?;
        info.set_value("alpha", "a_key", "3")?;

        assert_eq!(vec!["zeta", "alpha"], info.sections().collect::<Vec<_>>());
        assert_eq!(
            vec!["b_key", "a_key"],
            info.keys("alpha").collect::<Vec<_>>()
        );

        assert_eq!(
            "[zeta]\nz_key: 1\n\n[alpha]\nb_key: 2\na_key: 3\n",
            info.emit()
        );

        Ok(())
    }

    #[test]
    fn info_parse_ignores_comments_and_blank_lines() -> crate::Result<()> {
        let text = "# a comment\n\n[media]\n# another\nsize: 10\n\n";

        let info = InformationFile::parse(text, false)?;
        assert_eq!(Some("10"), info.value("media", "size"));

        // comments are not preserved
        assert_eq!("[media]\nsize: 10\n", info.emit());
        Ok(())
    }

    #[test]
    fn info_parse_tolerates_crlf() -> crate::Result<()> {
        let text = "[media]\r\nsize: 10\r\nnotes: a\r\n  b\r\n";

        let info = InformationFile::parse(text, false)?;
        assert_eq!(Some("10"), info.value("media", "size"));
        assert_eq!(Some("a\nb"), info.value("media", "notes"));
        Ok(())
    }

    #[test]
    fn info_parse_failure_modes() {
        use crate::ErrorKind;

        let check = |text: &str, expected: MalformedKind, expected_line: usize| {
            let err = InformationFile::parse(text, false).unwrap_err();
            match err.kind() {
                ErrorKind::Malformed { kind, line } => {
                    assert_eq!(expected, *kind, "for {text:?}");
                    assert_eq!(expected_line, *line, "for {text:?}");
                }
                other => panic!("expected Malformed, got {other:?}"),
            }
        };

        check("[bad section]\n", MalformedKind::Section, 1);
        check("[imaging\n", MalformedKind::Section, 1);
        check("[]\n", MalformedKind::Section, 1);
        check("[imaging]\nno separator\n", MalformedKind::Key, 2);
        check("[imaging]\nbad key: x\n", MalformedKind::Key, 2);
        check("[imaging]\nkey:x\n", MalformedKind::Key, 2);
        check("key: before any section\n", MalformedKind::Key, 1);
        check(
            "[imaging]\n  floating continuation\n",
            MalformedKind::ContinuationWithoutKey,
            2,
        );
        check(
            "[imaging]\nkey: a\nkey: b\n",
            MalformedKind::DuplicateKey,
            3,
        );
    }

    #[test]
    fn info_lenient_duplicate_keeps_last_value() -> crate::Result<()> {
        let text = "[imaging]\nkey: a\nother: x\nkey: b\n  c\n";

        let info = InformationFile::parse(text, true)?;
        assert_eq!(Some("b\nc"), info.value("imaging", "key"));
        assert_eq!(Some("x"), info.value("imaging", "other"));
        Ok(())
    }

    #[test]
    fn info_empty_value_round_trips() -> crate::Result<()> {
        let mut info = InformationFile::new();
        info.set_value("media", "notes", "")?;

        let emitted = info.emit();
        assert_eq!("[media]\nnotes:\n", emitted);
        assert_eq!(info, InformationFile::parse(&emitted, false)?);
        Ok(())
    }

    #[test]
    fn info_multi_line_value_with_blank_line() -> crate::Result<()> {
        let mut info = InformationFile::new();
        info.set_value("media", "notes", "first\n\nthird")?;

        let emitted = info.emit();
        assert_eq!(info, InformationFile::parse(&emitted, false)?);
        Ok(())
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn info_read_write_file() -> crate::Result<()> {
        use crate::vfs::OsVfs;

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("image.raw.info");
        let name = path.to_str().unwrap();

        let mut info = InformationFile::new();
        info.set_value(INFORMATION_VALUES_SECTION, "case_number", "CASE-42")?;
        info.set_value(INTEGRITY_HASH_VALUES_SECTION, "md5", "abcdef")?;

        info.write_to(&OsVfs, name)?;

        let loaded = InformationFile::read_from(&OsVfs, name, false)?;
        assert_eq!(info, loaded);

        Ok(())
    }
}
