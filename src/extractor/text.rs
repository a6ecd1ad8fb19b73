//! Text cleanup shared by the word-processor extractors

/// Paragraphs and table rows of a word-processing document, in order
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct WordText {
    /// Body paragraphs and table rows (cells joined by tabs)
    pub blocks: Vec<String>,
    pub paragraphs: usize,
    pub tables: usize,
}

impl WordText {
    pub fn push_paragraph(&mut self, raw: &str) {
        if let Some(paragraph) = normalize_block(raw) {
            self.blocks.push(paragraph);
            self.paragraphs += 1;
        }
    }

    pub fn push_row(&mut self, cells: &[String]) {
        let cells: Vec<String> = cells
            .iter()
            .map(|cell| normalize_block(cell).unwrap_or_default().replace('\n', " "))
            .collect();

        if cells.iter().any(|cell| !cell.is_empty()) {
            self.blocks.push(cells.join("\t"));
        }
    }

    pub fn into_text(self) -> String {
        self.blocks.join("\n")
    }
}

/// Collapses runs of spaces, trims each line, and drops blank results
pub(crate) fn normalize_block(raw: &str) -> Option<String> {
    let lines: Vec<String> = raw
        .lines()
        .map(|line| {
            line.replace('\u{a0}', " ")
                .split(' ')
                .filter(|word| !word.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();

    let text = lines.join("\n");
    let text = text.trim_matches('\n');
    (!text.trim().is_empty()).then(|| text.to_string())
}
