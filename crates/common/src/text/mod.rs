pub mod span;


/// Source text of a compilation unit, used to map byte offsets back to lines
pub struct SourceText {
    text: String,
}

impl SourceText {
    pub fn new(text: String) -> Self {
        Self { text }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Zero-based line index of the line containing `position`
    pub fn line_index(&self, position: usize) -> usize {
        let position = position.min(self.text.len());
        self.text[..position].matches('\n').count()
    }

    pub fn fetch_line(&self, index: usize) -> &str {
        self.text.split('\n').nth(index).unwrap_or("")
    }

    pub fn line_start(&self, index: usize) -> usize {
        self.text.split('\n')
            .take(index)
            .map(|line| line.len() + 1)
            .sum()
    }
}
