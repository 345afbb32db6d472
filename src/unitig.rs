//! Unitig (chunk) layout records, read as JSON lines.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};

/// Placement of one fragment inside a unitig.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentPlacement {
    pub ident: u32,
    /// Iid of the containing fragment, 0 when not contained.
    #[serde(default)]
    pub contained: u32,
    pub bgn: i64,
    pub end: i64,
}

impl FragmentPlacement {
    pub fn is_contained(&self) -> bool {
        self.contained != 0
    }

    pub fn is_forward(&self) -> bool {
        self.end > self.bgn
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitigLayout {
    pub iid: u32,
    #[serde(default)]
    pub consensus: String,
    #[serde(default)]
    pub quality: String,
    pub fragments: Vec<FragmentPlacement>,
}

/// Streaming reader over one JSON layout per line.
pub struct UnitigReader<R: BufRead> {
    lines: std::io::Lines<R>,
    line_no: usize,
    source_name: String,
}

impl<R: BufRead> UnitigReader<R> {
    pub fn new(reader: R, source_name: impl Into<String>) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            source_name: source_name.into(),
        }
    }
}

impl<R: BufRead> Iterator for UnitigReader<R> {
    type Item = Result<UnitigLayout>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            return Some(serde_json::from_str(&line).map_err(|e| {
                GraphError::parse(&self.source_name, self.line_no, e.to_string())
            }));
        }
    }
}

/// Open a layout file, transparently decompressing `.gz`.
pub fn open_unitig_file<P: AsRef<Path>>(path: P) -> Result<UnitigReader<Box<dyn BufRead>>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let gz = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);
    let inner: Box<dyn Read> = if gz {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };
    let reader: Box<dyn BufRead> = Box::new(BufReader::new(inner));
    Ok(UnitigReader::new(reader, path.display().to_string()))
}
