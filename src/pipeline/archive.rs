//! Archive packaging: collect generated documents into a single ZIP.
//!
//! One [`ArchiveBuilder`] is owned exclusively by the batch layer for the
//! lifetime of one job — inserts are strictly sequential, in roster order,
//! so the archive's internal listing is reproducible run-to-run. Entry
//! names come from student identifiers via the sanitisation rule (anything
//! outside `[A-Za-z0-9_-]` becomes `_`) with a numeric suffix on collisions,
//! keeping the entry-count == success-count invariant even when two
//! students share a roll number.

use crate::error::GenerationError;
use crate::pipeline::format::sanitize_component;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// In-memory ZIP writer with deterministic entry naming.
pub struct ArchiveBuilder {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    name_counts: HashMap<String, usize>,
    entries: usize,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            name_counts: HashMap::new(),
            entries: 0,
        }
    }

    /// Derive the archive entry name for a student identifier:
    /// `<sanitised-id>_<suffix>.pdf`, deduplicated with `_2`, `_3`, … when
    /// the same name was already taken this job.
    pub fn entry_name(&mut self, raw_id: &str, suffix: &str) -> String {
        let id = sanitize_component(raw_id);
        let id = if id.is_empty() { "student".to_string() } else { id };
        let base = format!("{id}_{suffix}");

        let count = self.name_counts.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            format!("{base}.pdf")
        } else {
            format!("{base}_{count}.pdf")
        }
    }

    /// Append one document under the given entry name.
    pub fn insert(&mut self, name: &str, bytes: &[u8]) -> Result<(), GenerationError> {
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.writer
            .start_file(name, options)
            .map_err(|e| GenerationError::ArchiveWrite(e.to_string()))?;
        self.writer
            .write_all(bytes)
            .map_err(|e| GenerationError::ArchiveWrite(e.to_string()))?;
        self.entries += 1;
        Ok(())
    }

    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Serialise the container and return its bytes.
    pub fn finish(self) -> Result<Vec<u8>, GenerationError> {
        let cursor = self
            .writer
            .finish()
            .map_err(|e| GenerationError::ArchiveWrite(e.to_string()))?;
        Ok(cursor.into_inner())
    }
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_names_are_sanitised_and_deterministic() {
        let mut a = ArchiveBuilder::new();
        assert_eq!(a.entry_name("12/A", "card"), "12_A_card.pdf");
        let mut b = ArchiveBuilder::new();
        assert_eq!(b.entry_name("12/A", "card"), "12_A_card.pdf");
    }

    #[test]
    fn empty_identifier_falls_back_to_generic_label() {
        let mut a = ArchiveBuilder::new();
        assert_eq!(a.entry_name("", "card"), "student_card.pdf");
        assert_eq!(a.entry_name("///", "form"), "__form.pdf");
    }

    #[test]
    fn duplicate_names_get_numeric_suffixes() {
        let mut a = ArchiveBuilder::new();
        assert_eq!(a.entry_name("14", "card"), "14_card.pdf");
        assert_eq!(a.entry_name("14", "card"), "14_card_2.pdf");
        assert_eq!(a.entry_name("14", "card"), "14_card_3.pdf");
    }

    #[test]
    fn archive_round_trips_through_a_zip_reader() {
        let mut a = ArchiveBuilder::new();
        let n1 = a.entry_name("14", "card");
        a.insert(&n1, b"first document").unwrap();
        let n2 = a.entry_name("19", "card");
        a.insert(&n2, b"second document").unwrap();
        assert_eq!(a.entries(), 2);

        let bytes = a.finish().unwrap();
        assert_eq!(&bytes[..4], b"PK\x03\x04");

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
        // Insertion order is preserved in the listing.
        assert_eq!(archive.by_index(0).unwrap().name(), "14_card.pdf");
        assert_eq!(archive.by_index(1).unwrap().name(), "19_card.pdf");
        let mut content = String::new();
        std::io::Read::read_to_string(&mut archive.by_name("14_card.pdf").unwrap(), &mut content)
            .unwrap();
        assert_eq!(content, "first document");
    }
}
