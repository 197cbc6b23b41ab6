//! Minimal CSV writer
//!
//! RFC-4180-style quoting: a field is quoted when it contains a comma,
//! quote, or line break, and embedded quotes are doubled. Rows end with
//! `\n`. Small enough that a full CSV dependency is not warranted.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

fn escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_owned()
    }
}

fn write_row(out: &mut impl Write, fields: &[String]) -> std::io::Result<()> {
    let line = fields.iter().map(|f| escape(f)).collect::<Vec<_>>().join(",");
    writeln!(out, "{line}")
}

/// Write a header plus rows to `path`.
pub fn write_csv(path: &Path, header: &[&str], rows: &[Vec<String>]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    let mut out = std::io::BufWriter::new(file);

    let header: Vec<String> = header.iter().map(|h| h.to_string()).collect();
    write_row(&mut out, &header).with_context(|| format!("writing {}", path.display()))?;
    for row in rows {
        write_row(&mut out, row).with_context(|| format!("writing {}", path.display()))?;
    }
    out.flush()
        .with_context(|| format!("flushing {}", path.display()))?;
    Ok(())
}
