//! Fixed-column line parsing driven by a column-specification string.
//!
//! A spec like `"11L,15i,19,24i,25,26,27"` declares contiguous fields by
//! their exclusive end column: `L` parses a 64-bit integer, `i` a 32-bit
//! integer, `d` a float, and a bare number a trimmed string. Fields are
//! then tuned individually: a scale factor turns an integer column into a
//! float value, a missing sentinel passes through unscaled, and a repeat
//! count reads the same column group again at a fixed stride (the twelve
//! monthly value/flag groups of an observation line).

use cdm_core::{CdmError, CdmResult, FieldValue};

/// How a field's column span is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// 64-bit integer.
    Long,
    /// 32-bit integer; with a scale factor it decodes to a float.
    Int,
    /// Float.
    Double,
    /// Whitespace-trimmed string.
    Str,
    /// Raw fixed-width characters, blanks preserved.
    Char,
}

/// One parsed column span of a record line.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    /// Inclusive start column (0-based).
    pub start: usize,
    /// Exclusive end column.
    pub end: usize,
    pub kind: FieldKind,
    /// Multiplier applied to integer columns; sentinel values bypass it.
    pub scale: Option<f64>,
    /// Raw integer value meaning "missing"; passed through unscaled.
    pub missing: Option<i64>,
    /// Occurrences of this column span per line (1 = scalar).
    pub repeat: usize,
    /// Column stride between occurrences.
    pub stride: usize,
}

impl Field {
    fn new(name: String, start: usize, end: usize, kind: FieldKind) -> Self {
        Field {
            name,
            start,
            end,
            kind,
            scale: None,
            missing: None,
            repeat: 1,
            stride: 0,
        }
    }

    /// Declare `count` occurrences at `stride` columns apart.
    pub fn set_repeat(&mut self, count: usize, stride: usize) {
        self.repeat = count;
        self.stride = stride;
    }

    fn slice<'a>(&self, line: &'a str, shift: usize) -> Option<&'a str> {
        let start = self.start + shift;
        if start >= line.len() {
            return None;
        }
        let end = (self.end + shift).min(line.len());
        line.get(start..end)
    }

    fn parse_i64(&self, line: &str, shift: usize) -> CdmResult<i64> {
        let raw = self.slice(line, shift).ok_or_else(|| self.too_short(line))?;
        raw.trim().parse::<i64>().map_err(|_| {
            CdmError::format(
                "GHCNM",
                format!("field '{}': not an integer: '{}'", self.name, raw.trim()),
            )
        })
    }

    fn parse_f64(&self, line: &str, shift: usize) -> CdmResult<f64> {
        let raw = self.slice(line, shift).ok_or_else(|| self.too_short(line))?;
        raw.trim().parse::<f64>().map_err(|_| {
            CdmError::format(
                "GHCNM",
                format!("field '{}': not a number: '{}'", self.name, raw.trim()),
            )
        })
    }

    fn too_short(&self, line: &str) -> CdmError {
        CdmError::format(
            "GHCNM",
            format!(
                "line too short for field '{}' (need column {}, line has {})",
                self.name,
                self.start,
                line.len()
            ),
        )
    }

    /// Integer column with optional scale and sentinel passthrough.
    fn numeric_value(&self, line: &str, shift: usize) -> CdmResult<f64> {
        match self.kind {
            FieldKind::Double => self.parse_f64(line, shift),
            _ => {
                let raw = self.parse_i64(line, shift)?;
                if self.missing == Some(raw) {
                    return Ok(raw as f64);
                }
                match self.scale {
                    Some(scale) => Ok(raw as f64 * scale),
                    None => Ok(raw as f64),
                }
            }
        }
    }

    /// Raw characters of one occurrence, space-padded to the field width.
    fn char_value(&self, line: &str, shift: usize) -> String {
        let width = self.end - self.start;
        let mut out = String::with_capacity(width);
        if let Some(raw) = self.slice(line, shift) {
            out.push_str(raw);
        }
        while out.len() < width {
            out.push(' ');
        }
        out
    }

    /// Decode this field from a line, honoring kind, scale, sentinel, and
    /// repetition.
    pub fn parse(&self, line: &str) -> CdmResult<FieldValue> {
        if self.repeat > 1 {
            return match self.kind {
                FieldKind::Char | FieldKind::Str => {
                    let mut out = String::new();
                    for k in 0..self.repeat {
                        out.push_str(&self.char_value(line, k * self.stride));
                    }
                    Ok(FieldValue::Str(out))
                }
                _ => {
                    let mut out = Vec::with_capacity(self.repeat);
                    for k in 0..self.repeat {
                        out.push(self.numeric_value(line, k * self.stride)?);
                    }
                    Ok(FieldValue::F64Array(out))
                }
            };
        }

        match self.kind {
            FieldKind::Long => Ok(FieldValue::I64(self.parse_i64(line, 0)?)),
            FieldKind::Int => {
                if self.scale.is_some() {
                    Ok(FieldValue::F64(self.numeric_value(line, 0)?))
                } else {
                    let raw = self.parse_i64(line, 0)?;
                    Ok(FieldValue::I32(raw as i32))
                }
            }
            FieldKind::Double => Ok(FieldValue::F64(self.parse_f64(line, 0)?)),
            FieldKind::Str => {
                let raw = self.slice(line, 0).unwrap_or("");
                Ok(FieldValue::Str(raw.trim().to_string()))
            }
            FieldKind::Char => Ok(FieldValue::Str(self.char_value(line, 0))),
        }
    }
}

/// The declared column layout of one record line.
#[derive(Debug, Clone)]
pub struct RecordSpec {
    fields: Vec<Field>,
}

impl RecordSpec {
    /// Parse a column-specification string. Each comma-separated token is
    /// an exclusive end column with an optional type suffix; fields are
    /// contiguous, each starting where the previous one ended.
    pub fn from_spec(spec: &str) -> CdmResult<Self> {
        let mut fields = Vec::new();
        let mut start = 0usize;
        for (i, token) in spec.split(',').map(str::trim).enumerate() {
            let (digits, kind) = match token.chars().last() {
                Some('L') => (&token[..token.len() - 1], FieldKind::Long),
                Some('i') => (&token[..token.len() - 1], FieldKind::Int),
                Some('d') => (&token[..token.len() - 1], FieldKind::Double),
                Some(c) if c.is_ascii_digit() => (token, FieldKind::Str),
                _ => {
                    return Err(CdmError::format(
                        "GHCNM",
                        format!("bad column spec token '{}'", token),
                    ))
                }
            };
            let end: usize = digits.parse().map_err(|_| {
                CdmError::format("GHCNM", format!("bad column spec token '{}'", token))
            })?;
            if end <= start {
                return Err(CdmError::format(
                    "GHCNM",
                    format!("column spec not increasing at token '{}'", token),
                ));
            }
            fields.push(Field::new(format!("field{}", i), start, end, kind));
            start = end;
        }
        if fields.is_empty() {
            return Err(CdmError::format("GHCNM", "empty column spec"));
        }
        Ok(RecordSpec { fields })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, index: usize) -> &Field {
        &self.fields[index]
    }

    pub fn field_mut(&mut self, index: usize) -> &mut Field {
        &mut self.fields[index]
    }

    /// Decode every field of a line, in declaration order.
    pub fn parse_line(&self, line: &str) -> CdmResult<Vec<FieldValue>> {
        self.fields.iter().map(|f| f.parse(line)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_spec_contiguous_bounds() {
        let spec = RecordSpec::from_spec("11L,15i,19,24i").unwrap();
        assert_eq!(spec.len(), 4);
        assert_eq!((spec.field(0).start, spec.field(0).end), (0, 11));
        assert_eq!(spec.field(0).kind, FieldKind::Long);
        assert_eq!((spec.field(1).start, spec.field(1).end), (11, 15));
        assert_eq!(spec.field(1).kind, FieldKind::Int);
        assert_eq!((spec.field(2).start, spec.field(2).end), (15, 19));
        assert_eq!(spec.field(2).kind, FieldKind::Str);
        assert_eq!((spec.field(3).start, spec.field(3).end), (19, 24));
    }

    #[test]
    fn test_from_spec_rejects_non_increasing() {
        assert!(RecordSpec::from_spec("11L,9i").is_err());
        assert!(RecordSpec::from_spec("11L,11i").is_err());
    }

    #[test]
    fn test_from_spec_rejects_garbage() {
        assert!(RecordSpec::from_spec("abc").is_err());
        assert!(RecordSpec::from_spec("").is_err());
    }

    #[test]
    fn test_scalar_fields() {
        let spec = RecordSpec::from_spec("11L,15i,19").unwrap();
        let values = spec.parse_line("101603550001989TAVG").unwrap();
        assert_eq!(values[0], FieldValue::I64(10160355000));
        assert_eq!(values[1], FieldValue::I32(1989));
        assert_eq!(values[2], FieldValue::Str("TAVG".to_string()));
    }

    #[test]
    fn test_double_field_trims_leading_space() {
        let mut spec = RecordSpec::from_spec("11L,20d").unwrap();
        spec.field_mut(1).name = "lat".to_string();
        let values = spec.parse_line("10160355000    36.93").unwrap();
        assert_eq!(values[1], FieldValue::F64(36.93));
    }

    #[test]
    fn test_scale_applies_to_int_field() {
        let mut spec = RecordSpec::from_spec("11L,16i").unwrap();
        spec.field_mut(1).scale = Some(0.01);
        let values = spec.parse_line("10160355000  890").unwrap();
        assert_eq!(values[1], FieldValue::F64(8.9));
    }

    #[test]
    fn test_missing_sentinel_bypasses_scale() {
        let mut spec = RecordSpec::from_spec("11L,16i").unwrap();
        spec.field_mut(1).scale = Some(0.01);
        spec.field_mut(1).missing = Some(-9999);
        let values = spec.parse_line("10160355000-9999").unwrap();
        assert_eq!(values[1], FieldValue::F64(-9999.0));
    }

    #[test]
    fn test_repeated_numeric_group() {
        let mut spec = RecordSpec::from_spec("5i").unwrap();
        let f = spec.field_mut(0);
        f.scale = Some(0.01);
        f.missing = Some(-9999);
        f.set_repeat(3, 8);
        // three value columns 8 apart; flag columns between are ignored
        let values = spec.parse_line("  890abc-9999def 1210xyz").unwrap();
        assert_eq!(
            values[0],
            FieldValue::F64Array(vec![8.9, -9999.0, 12.1])
        );
    }

    #[test]
    fn test_repeated_char_group_preserves_blanks() {
        let mut spec = RecordSpec::from_spec("5i,6,7,8").unwrap();
        for i in 1..4 {
            spec.field_mut(i).kind = FieldKind::Char;
            spec.field_mut(i).set_repeat(3, 8);
        }
        // groups of 8 columns: value[0,5) dm[5,6) qc[6,7) ds[7,8)
        let line = "  890a C-9999 M  1210 W ";
        let values = spec.parse_line(line).unwrap();
        assert_eq!(values[1], FieldValue::Str("a  ".to_string()));
        assert_eq!(values[2], FieldValue::Str(" MW".to_string()));
        assert_eq!(values[3], FieldValue::Str("C  ".to_string()));
    }

    #[test]
    fn test_char_scalar_keeps_width() {
        let mut spec = RecordSpec::from_spec("2").unwrap();
        spec.field_mut(0).kind = FieldKind::Char;
        assert_eq!(
            spec.parse_line("FL").unwrap()[0],
            FieldValue::Str("FL".to_string())
        );
        // short line pads to width
        assert_eq!(
            spec.parse_line("F").unwrap()[0],
            FieldValue::Str("F ".to_string())
        );
    }

    #[test]
    fn test_short_line_fails_numeric_field() {
        let spec = RecordSpec::from_spec("11L,15i").unwrap();
        let err = spec.parse_line("10160355000").unwrap_err();
        assert!(err.to_string().contains("too short"));
    }

    #[test]
    fn test_non_numeric_fails() {
        let spec = RecordSpec::from_spec("4i").unwrap();
        assert!(spec.parse_line("abcd").is_err());
    }
}
