use std::io::Write;
use std::path::Path;

use anyhow::Context;

use crate::models::ReportLine;

fn single_line(text: &str) -> String {
    text.replace(['\t', '\r', '\n'], " ")
}

/// Writes `number<TAB>assignment` rows, one per line, no header and no quoting.
pub fn write_lines<W: Write>(writer: W, lines: &[ReportLine]) -> anyhow::Result<()> {
    let mut out = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Never)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    for line in lines {
        out.serialize(ReportLine {
            student_number: line.student_number,
            assignment: single_line(&line.assignment),
        })?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_report(path: &Path, lines: &[ReportLine]) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    write_lines(std::io::BufWriter::new(file), lines)
        .with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Vec<ReportLine> {
        vec![
            ReportLine {
                student_number: 229003,
                assignment: "Okafor, A - 3(A)".to_string(),
            },
            ReportLine::blank(229002),
            ReportLine {
                student_number: 229001,
                assignment: "Haddad, R - 2(B)".to_string(),
            },
        ]
    }

    #[test]
    fn renders_tab_separated_lines() {
        let mut buffer = Vec::new();
        write_lines(&mut buffer, &sample()).unwrap();
        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "229003\tOkafor, A - 3(A)\n229002\t\n229001\tHaddad, R - 2(B)\n"
        );
    }

    #[test]
    fn each_line_has_exactly_one_tab() {
        let lines = vec![ReportLine {
            student_number: 1,
            assignment: "Odd\tName, X - 1\n(A)".to_string(),
        }];
        let mut buffer = Vec::new();
        write_lines(&mut buffer, &lines).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text, "1\tOdd Name, X - 1 (A)\n");
        assert!(text.lines().all(|l| l.matches('\t').count() == 1));
    }

    #[test]
    fn empty_report_is_empty_file() {
        let mut buffer = Vec::new();
        write_lines(&mut buffer, &[]).unwrap();
        assert!(buffer.is_empty());
    }

    #[test]
    fn rewriting_the_same_lines_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("studyhalls.txt");

        write_report(&path, &sample()).unwrap();
        let first = std::fs::read(&path).unwrap();
        write_report(&path, &sample()).unwrap();
        let second = std::fs::read(&path).unwrap();

        assert_eq!(first, second);
        assert_eq!(String::from_utf8(first).unwrap().lines().count(), 3);
    }
}
