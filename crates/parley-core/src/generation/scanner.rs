//! Marker-aware stream scanner.
//!
//! The provider is instructed to end a fresh conversation's answer with
//! `CONVERSATION_TITLE: <title>`. `TitleScanner` consumes the token stream one
//! increment at a time, forwards the visible answer, suppresses the marker and
//! everything after it, and reports the title once.
//!
//! Text that might be the start of the marker (and trailing whitespace, which
//! would be trimmed if a marker follows) is held back until the next increment
//! disambiguates it, so the visible output is identical however the provider
//! splits its tokens. Without a marker the visible output is the raw response,
//! leading whitespace included.

/// Literal that separates the visible answer from the embedded title.
pub const TITLE_MARKER: &str = "CONVERSATION_TITLE:";

/// Result of feeding one increment (or the end of stream) to the scanner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStep {
    /// Text to forward to the caller, if any.
    pub visible: Option<String>,
    /// The extracted title, reported at most once per stream.
    pub title: Option<String>,
}

/// Incremental decomposition of a provider response into visible content and title.
#[derive(Debug, Default)]
pub struct TitleScanner {
    raw: String,
    /// Byte offset in `raw` up to which visible text has been forwarded.
    emitted: usize,
    marker_at: Option<usize>,
    title: Option<String>,
    title_done: bool,
}

impl TitleScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `delta` and return what became visible.
    pub fn consume(&mut self, delta: &str) -> ScanStep {
        self.raw.push_str(delta);

        if self.marker_at.is_some() {
            return ScanStep {
                visible: None,
                title: self.settle_title(false),
            };
        }

        // Nothing before `emitted` can start a marker: a marker prefix at the
        // end of the buffer is never forwarded.
        match self.raw[self.emitted..].find(TITLE_MARKER) {
            Some(offset) => {
                let marker_at = self.emitted + offset;
                self.marker_at = Some(marker_at);
                let end = self.raw[..marker_at].trim_end().len();
                ScanStep {
                    visible: self.advance_to(end),
                    title: self.settle_title(false),
                }
            }
            None => {
                let end = self.safe_end();
                ScanStep {
                    visible: self.advance_to(end),
                    title: None,
                }
            }
        }
    }

    /// Flush held-back text at end of stream and settle the title.
    pub fn finish(&mut self) -> ScanStep {
        if self.marker_at.is_some() {
            return ScanStep {
                visible: None,
                title: self.settle_title(true),
            };
        }
        let end = self.raw.len();
        ScanStep {
            visible: self.advance_to(end),
            title: None,
        }
    }

    /// Everything received from the provider so far.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The content to store: the text before the marker, trimmed, or the
    /// whole response when no marker appeared.
    pub fn visible_content(&self) -> String {
        match self.marker_at {
            Some(at) => self.raw[..at].trim().to_string(),
            None => self.raw.clone(),
        }
    }

    /// The extracted title. `None` until it is settled, and when the text after
    /// the marker is blank.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Whether the marker has been seen.
    pub fn marker_seen(&self) -> bool {
        self.marker_at.is_some()
    }

    /// Forward `raw[emitted..end]`.
    fn advance_to(&mut self, end: usize) -> Option<String> {
        if end <= self.emitted {
            return None;
        }
        let start = self.emitted;
        self.emitted = end;
        Some(self.raw[start..end].to_string())
    }

    /// End of the text that can be forwarded without risking a marker leak.
    fn safe_end(&self) -> usize {
        let mut end = self.raw.len();
        for len in (1..TITLE_MARKER.len()).rev() {
            if self.raw.ends_with(&TITLE_MARKER[..len]) {
                end -= len;
                break;
            }
        }
        self.raw[..end].trim_end().len().max(self.emitted)
    }

    /// Extract the title line once it is terminated (or the stream ended).
    fn settle_title(&mut self, at_end: bool) -> Option<String> {
        if self.title_done {
            return None;
        }
        let marker_at = self.marker_at?;
        let after = &self.raw[marker_at + TITLE_MARKER.len()..];

        let line_end = [after.find('\n'), after.find(TITLE_MARKER)]
            .into_iter()
            .flatten()
            .min();
        let line = match (line_end, at_end) {
            (Some(end), _) => &after[..end],
            (None, true) => after,
            (None, false) => return None,
        };

        self.title_done = true;
        let title = line.trim();
        if title.is_empty() {
            return None;
        }
        self.title = Some(title.to_string());
        self.title.clone()
    }
}
