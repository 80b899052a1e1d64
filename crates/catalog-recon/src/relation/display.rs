use super::Relation;
use std::fmt;

impl fmt::Display for Relation {
    /// Renders a boxed table with right-aligned cells, `NULL` for nulls.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers = self.schema.names();
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(ToString::to_string).collect())
            .collect();

        let widths: Vec<usize> = headers
            .iter()
            .enumerate()
            .map(|(index, header)| {
                cells
                    .iter()
                    .map(|row| row[index].chars().count())
                    .chain(std::iter::once(header.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let border = widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("+");
        let border = format!("+{border}+");

        writeln!(f, "{border}")?;
        write_line(f, headers.iter().copied(), &widths)?;
        writeln!(f, "{border}")?;
        for row in &cells {
            write_line(f, row.iter().map(String::as_str), &widths)?;
        }
        writeln!(f, "{border}")
    }
}

fn write_line<'a>(
    f: &mut fmt::Formatter<'_>,
    cells: impl Iterator<Item = &'a str>,
    widths: &[usize],
) -> fmt::Result {
    f.write_str("|")?;
    for (cell, width) in cells.zip(widths) {
        write!(f, "{cell:>width$}|", width = *width)?;
    }
    writeln!(f)
}
