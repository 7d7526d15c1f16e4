//! Line-oriented record cursor over a fixed-column text file.

use std::sync::Arc;

use tracing::warn;

use cdm_core::{
    CdmError, CdmResult, RandomSource, RecordCursor, StructureData, StructureMembers,
};

use crate::table::RecordSpec;

/// Streams one [`StructureData`] per data line. Blank lines and `#` comments
/// are skipped; malformed lines are logged and skipped rather than aborting
/// the scan. Each cursor owns its file handle, so concurrent cursors over
/// the same file never disturb each other's position.
#[derive(Debug)]
pub struct LineCursor {
    source: RandomSource,
    members: Arc<StructureMembers>,
    spec: Arc<RecordSpec>,
    line: String,
    pending: Option<StructureData>,
    records_seen: u64,
    realized_count: Option<u64>,
}

impl LineCursor {
    pub fn new(
        source: RandomSource,
        members: Arc<StructureMembers>,
        spec: Arc<RecordSpec>,
    ) -> Self {
        LineCursor {
            source,
            members,
            spec,
            line: String::new(),
            pending: None,
            records_seen: 0,
            realized_count: None,
        }
    }
}

impl RecordCursor for LineCursor {
    fn reset(&mut self) -> CdmResult<()> {
        self.source.seek(0)?;
        self.pending = None;
        self.records_seen = 0;
        self.realized_count = None;
        Ok(())
    }

    fn has_next(&mut self) -> CdmResult<bool> {
        if self.pending.is_some() {
            return Ok(true);
        }
        loop {
            self.line.clear();
            if self.source.read_line(&mut self.line)? == 0 {
                self.realized_count = Some(self.records_seen);
                return Ok(false);
            }
            let text = self.line.trim_end_matches(|c| c == '\n' || c == '\r');
            if text.trim().is_empty() || text.starts_with('#') {
                continue;
            }
            match self.spec.parse_line(text) {
                Ok(values) => {
                    self.pending = Some(StructureData::new(self.members.clone(), values));
                    self.records_seen += 1;
                    return Ok(true);
                }
                Err(err) => {
                    warn!(
                        file = %self.source.path().display(),
                        error = %err,
                        "skipping malformed line"
                    );
                }
            }
        }
    }

    fn next_record(&mut self) -> CdmResult<StructureData> {
        self.pending.take().ok_or_else(|| {
            CdmError::IllegalState("next_record called without a pending record".to_string())
        })
    }

    fn record_count(&self) -> Option<u64> {
        self.realized_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdm_core::{DataType, FieldValue, Member};
    use std::io::Write;

    fn cursor_over(content: &str) -> (tempfile::TempDir, LineCursor) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lines.dat");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(content.as_bytes())
            .unwrap();
        let source = RandomSource::open(&path).unwrap();
        let members = Arc::new(StructureMembers::new(vec![
            Member::new("stnid", DataType::I64),
            Member::new("year", DataType::I32),
            Member::new("element", DataType::String),
        ]));
        let spec = Arc::new(RecordSpec::from_spec("11L,15i,19").unwrap());
        (dir, LineCursor::new(source, members, spec))
    }

    #[test]
    fn test_iterates_and_counts() {
        let (_dir, mut cursor) = cursor_over(
            "# header comment\n101603550001989TAVG\n\n101603550001990TAVG\n",
        );
        assert_eq!(cursor.record_count(), None);

        assert!(cursor.has_next().unwrap());
        let first = cursor.next_record().unwrap();
        assert_eq!(first.get("year"), Some(&FieldValue::I32(1989)));

        assert!(cursor.has_next().unwrap());
        let second = cursor.next_record().unwrap();
        assert_eq!(second.get("year"), Some(&FieldValue::I32(1990)));

        assert!(!cursor.has_next().unwrap());
        assert_eq!(cursor.record_count(), Some(2));
    }

    #[test]
    fn test_has_next_is_idempotent() {
        let (_dir, mut cursor) = cursor_over("101603550001989TAVG\n");
        assert!(cursor.has_next().unwrap());
        assert!(cursor.has_next().unwrap());
        let record = cursor.next_record().unwrap();
        assert_eq!(record.get("year"), Some(&FieldValue::I32(1989)));
        assert!(!cursor.has_next().unwrap());
    }

    #[test]
    fn test_next_without_has_next_is_illegal() {
        let (_dir, mut cursor) = cursor_over("101603550001989TAVG\n");
        let err = cursor.next_record().unwrap_err();
        assert!(matches!(err, CdmError::IllegalState(_)));
    }

    #[test]
    fn test_malformed_line_skipped() {
        let (_dir, mut cursor) =
            cursor_over("101603550001989TAVG\nshort\n101603550001991TAVG\n");
        assert!(cursor.has_next().unwrap());
        cursor.next_record().unwrap();
        assert!(cursor.has_next().unwrap());
        let record = cursor.next_record().unwrap();
        assert_eq!(record.get("year"), Some(&FieldValue::I32(1991)));
        assert!(!cursor.has_next().unwrap());
        assert_eq!(cursor.record_count(), Some(2));
    }

    #[test]
    fn test_reset_restarts_stream() {
        let (_dir, mut cursor) = cursor_over("101603550001989TAVG\n101603550001990TAVG\n");
        while cursor.has_next().unwrap() {
            cursor.next_record().unwrap();
        }
        assert_eq!(cursor.record_count(), Some(2));

        cursor.reset().unwrap();
        assert_eq!(cursor.record_count(), None);
        assert!(cursor.has_next().unwrap());
        let record = cursor.next_record().unwrap();
        assert_eq!(record.get("stnid").unwrap().as_i64(), Some(10160355000));
    }
}
