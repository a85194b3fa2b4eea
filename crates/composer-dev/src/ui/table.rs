use console::{measure_text_width, pad_str, style, Alignment};

/// Column-aligned table with a bold header and a rule under it
#[derive(Debug, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Cells may contain ANSI styling; widths ignore escape codes
    pub fn add_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| measure_text_width(h)).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                let width = measure_text_width(cell);
                match widths.get_mut(i) {
                    Some(w) => *w = (*w).max(width),
                    None => widths.push(width),
                }
            }
        }
        widths
    }

    pub fn render(&self) -> String {
        let widths = self.column_widths();
        let format_row = |cells: &[String], bold: bool| {
            let padded: Vec<String> = cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| {
                    let cell = pad_str(cell, *width, Alignment::Left, None).to_string();
                    if bold {
                        style(cell).bold().to_string()
                    } else {
                        cell
                    }
                })
                .collect();
            format!(" {} ", padded.join(" │ ")).trim_end().to_string()
        };

        let mut lines = vec![format_row(&self.headers, true)];
        let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
        lines.push(format!("─{}─", rule.join("─┼─")));
        for row in &self.rows {
            lines.push(format_row(row, false));
        }
        lines.join("\n")
    }
}
