//! Text `{OVL ...}` overlap records: reader, writer and the repair output
//! filter.

use std::io::{BufRead, Write};

use crate::classify::{Orientation, RawOverlap};
use crate::error::{GraphError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapType {
    Dovetail,
    Containment,
    Other(char),
}

impl OverlapType {
    pub fn from_code(code: char) -> Self {
        match code.to_ascii_uppercase() {
            'D' => OverlapType::Dovetail,
            'C' => OverlapType::Containment,
            _ => OverlapType::Other(code),
        }
    }

    pub fn code(self) -> char {
        match self {
            OverlapType::Dovetail => 'D',
            OverlapType::Containment => 'C',
            OverlapType::Other(c) => c,
        }
    }

    /// Record types that become graph edges.
    pub fn is_graph_edge(self) -> bool {
        matches!(self, OverlapType::Dovetail | OverlapType::Containment)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlapMessage {
    pub a_iid: u32,
    pub b_iid: u32,
    pub orientation: Orientation,
    pub overlap_type: OverlapType,
    pub a_hang: i32,
    pub b_hang: i32,
    pub quality: f32,
    pub min_offset: i32,
    pub max_offset: i32,
    pub polymorphism_count: i32,
    pub delta: Vec<i32>,
}

impl OverlapMessage {
    pub fn to_raw(&self) -> RawOverlap {
        RawOverlap {
            quality: self.quality,
            ..RawOverlap::new(
                self.a_iid,
                self.b_iid,
                self.a_hang,
                self.b_hang,
                self.orientation,
            )
        }
    }

    /// Kept by the repair output writer: dovetail or containment, a known
    /// orientation, and an error rate in `[0, 1)`.
    pub fn passes_output_filter(&self) -> bool {
        self.overlap_type.is_graph_edge()
            && self.orientation != Orientation::Unknown
            && (0.0..1.0).contains(&self.quality)
    }
}

/// Write one record in the `{OVL ...}` layout.
pub fn write_message<W: Write>(out: &mut W, message: &OverlapMessage) -> std::io::Result<()> {
    writeln!(out, "{{OVL")?;
    writeln!(out, "afr:{}", message.a_iid)?;
    writeln!(out, "bfr:{}", message.b_iid)?;
    writeln!(out, "ori:{}", message.orientation.code())?;
    writeln!(out, "olt:{}", message.overlap_type.code())?;
    writeln!(out, "ahg:{}", message.a_hang)?;
    writeln!(out, "bhg:{}", message.b_hang)?;
    writeln!(out, "qua:{:.6}", message.quality)?;
    writeln!(out, "mno:{}", message.min_offset)?;
    writeln!(out, "mxo:{}", message.max_offset)?;
    writeln!(out, "pct:{}", message.polymorphism_count)?;
    writeln!(out, "del:")?;
    for (i, d) in message.delta.iter().enumerate() {
        let sep = if i % 15 == 14 { '\n' } else { ' ' };
        write!(out, "{d:4}{sep}")?;
    }
    writeln!(out)?;
    writeln!(out, ".")?;
    writeln!(out, "}}")
}

/// Streaming reader over a file of `{OVL ...}` records.
pub struct MessageReader<R: BufRead> {
    lines: std::io::Lines<R>,
    line_no: usize,
    source_name: String,
}

impl<R: BufRead> MessageReader<R> {
    pub fn new(reader: R, source_name: impl Into<String>) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            source_name: source_name.into(),
        }
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        match self.lines.next() {
            Some(line) => {
                self.line_no += 1;
                Ok(Some(line?))
            }
            None => Ok(None),
        }
    }

    fn error(&self, reason: impl Into<String>) -> GraphError {
        GraphError::parse(&self.source_name, self.line_no, reason)
    }

    fn field<T: std::str::FromStr>(&self, key: &str, value: &str) -> Result<T> {
        value
            .trim()
            .parse()
            .map_err(|_| self.error(format!("bad {key} value {value:?}")))
    }

    fn single_char(&self, key: &str, value: &str) -> Result<char> {
        let mut chars = value.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(self.error(format!("bad {key} value {value:?}"))),
        }
    }

    fn read_body(&mut self) -> Result<OverlapMessage> {
        let mut a_iid = None;
        let mut b_iid = None;
        let mut orientation = None;
        let mut overlap_type = None;
        let mut a_hang = None;
        let mut b_hang = None;
        let mut quality = None;
        let mut message_tail = (0, 0, 0);
        let mut delta = Vec::new();

        loop {
            let Some(line) = self.next_line()? else {
                return Err(self.error("unterminated OVL record"));
            };
            let line = line.trim();
            if line == "}" {
                break;
            }
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once(':') else {
                return Err(self.error(format!("expected key:value, found {line:?}")));
            };
            match key {
                "afr" => a_iid = Some(self.field(key, value)?),
                "bfr" => b_iid = Some(self.field(key, value)?),
                "ori" => orientation = Some(Orientation::from_code(self.single_char(key, value)?)),
                "olt" => overlap_type = Some(OverlapType::from_code(self.single_char(key, value)?)),
                "ahg" => a_hang = Some(self.field(key, value)?),
                "bhg" => b_hang = Some(self.field(key, value)?),
                "qua" => quality = Some(self.field(key, value)?),
                "mno" => message_tail.0 = self.field(key, value)?,
                "mxo" => message_tail.1 = self.field(key, value)?,
                "pct" => message_tail.2 = self.field(key, value)?,
                "del" => loop {
                    let Some(line) = self.next_line()? else {
                        return Err(self.error("unterminated delta"));
                    };
                    if line.trim() == "." {
                        break;
                    }
                    for token in line.split_whitespace() {
                        delta.push(self.field("delta", token)?);
                    }
                },
                _ => return Err(self.error(format!("unexpected field {key:?}"))),
            }
        }

        let missing = |name: &str| self.error(format!("OVL record missing {name}"));
        Ok(OverlapMessage {
            a_iid: a_iid.ok_or_else(|| missing("afr"))?,
            b_iid: b_iid.ok_or_else(|| missing("bfr"))?,
            orientation: orientation.ok_or_else(|| missing("ori"))?,
            overlap_type: overlap_type.ok_or_else(|| missing("olt"))?,
            a_hang: a_hang.ok_or_else(|| missing("ahg"))?,
            b_hang: b_hang.ok_or_else(|| missing("bhg"))?,
            quality: quality.ok_or_else(|| missing("qua"))?,
            min_offset: message_tail.0,
            max_offset: message_tail.1,
            polymorphism_count: message_tail.2,
            delta,
        })
    }
}

impl<R: BufRead> Iterator for MessageReader<R> {
    type Item = Result<OverlapMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.next_line() {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if line == "{OVL" {
                return Some(self.read_body());
            }
            let reason = match line.strip_prefix('{') {
                Some(kind) => format!("unsupported message type {kind:?}"),
                None => format!("expected message start, found {line:?}"),
            };
            return Some(Err(self.error(reason)));
        }
    }
}

/// Read every record from `reader`.
pub fn read_messages<R: BufRead>(reader: R, source_name: &str) -> Result<Vec<OverlapMessage>> {
    MessageReader::new(reader, source_name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> OverlapMessage {
        OverlapMessage {
            a_iid: 12,
            b_iid: 40,
            orientation: Orientation::Innie,
            overlap_type: OverlapType::Dovetail,
            a_hang: 85,
            b_hang: 112,
            quality: 0.0125,
            min_offset: 85,
            max_offset: 85,
            polymorphism_count: 0,
            delta: vec![3, -17],
        }
    }

    #[test]
    fn written_record_reads_back() {
        let mut buf = Vec::new();
        write_message(&mut buf, &sample()).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("{OVL\nafr:12\nbfr:40\nori:I\nolt:D\n"));
        let messages = read_messages(Cursor::new(buf), "mem").unwrap();
        assert_eq!(messages, vec![sample()]);
    }

    #[test]
    fn other_message_types_are_errors() {
        let input = "{UOM\nck1:1\n}\n";
        let err = read_messages(Cursor::new(input), "in.ovl").unwrap_err();
        match err {
            GraphError::Parse { line, reason, .. } => {
                assert_eq!(line, 1);
                assert!(reason.contains("UOM"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_field_reported() {
        let input = "{OVL\nafr:1\nbfr:2\nori:N\nolt:D\nahg:5\n}\n";
        assert!(read_messages(Cursor::new(input), "in.ovl").is_err());
    }

    #[test]
    fn output_filter() {
        let mut message = sample();
        assert!(message.passes_output_filter());
        message.quality = 1.0;
        assert!(!message.passes_output_filter());
        message.quality = 0.02;
        message.overlap_type = OverlapType::Other('S');
        assert!(!message.passes_output_filter());
        message.overlap_type = OverlapType::Containment;
        message.orientation = Orientation::Unknown;
        assert!(!message.passes_output_filter());
    }

    #[test]
    fn to_raw_carries_quality() {
        let raw = sample().to_raw();
        assert_eq!(raw.a_iid, 12);
        assert_eq!(raw.orientation, Orientation::Innie);
        assert!((raw.quality - 0.0125).abs() < 1e-6);
    }
}
