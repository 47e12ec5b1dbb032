/// A single data line from a Prometheus text exposition body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricLine {
    /// Everything before the first space, i.e. the metric name with its labels.
    pub key: String,
    /// The whole trimmed line.
    pub value: String,
}

/// Classifies one line of exposition text. Comments and blank lines yield `None`.
pub fn parse_line(raw: &str) -> Option<MetricLine> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let key = match line.split_once(' ') {
        Some((key, _)) => key,
        None => line,
    };

    Some(MetricLine {
        key: key.to_string(),
        value: line.to_string(),
    })
}

/// Reassembles newline-terminated lines from arbitrarily split body chunks.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.pending[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            lines.push(String::from_utf8_lossy(&self.pending[start..end]).into_owned());
            start = end + 1;
        }
        self.pending.drain(..start);

        lines
    }

    /// Returns the trailing line left without a terminating newline, if any.
    pub fn finish(self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.pending).into_owned())
        }
    }
}
