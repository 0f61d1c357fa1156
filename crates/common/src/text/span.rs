/// Byte range into the source together with the text it covers
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
    pub literal: String,
}

impl TextSpan {
    pub fn new(start: usize, end: usize, literal: String) -> Self {
        Self { start, end, literal }
    }

    pub fn length(&self) -> usize {
        self.end - self.start
    }

    /// Smallest span covering every span given, with gaps padded by spaces
    pub fn merge(spans: &[&TextSpan]) -> TextSpan {
        let mut ordered = spans.to_vec();
        ordered.sort_by_key(|span| span.start);

        let (Some(first), Some(end)) = (ordered.first(), ordered.iter().map(|span| span.end).max()) else {
            return TextSpan::default();
        };

        let mut literal = String::new();
        let mut cursor = first.start;
        for span in ordered.iter() {
            if span.start > cursor {
                literal.push_str(&" ".repeat(span.start - cursor));
            }
            if span.end > cursor {
                let skip = cursor.saturating_sub(span.start);
                literal.extend(span.literal.chars().skip(skip));
                cursor = span.end;
            }
        }

        TextSpan::new(first.start, end, literal)
    }

    pub fn to(&self, other: &TextSpan) -> TextSpan {
        Self::merge(&[self, other])
    }
}
