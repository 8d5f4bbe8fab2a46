use anyhow::Result;

/// Reassembly buffer for the line-oriented event framing.
///
/// Byte increments may split a record anywhere, including mid-character.
/// `next_line` yields each record as soon as its `\n` terminator has
/// arrived; the unterminated remainder stays buffered and is never emitted
/// early. Only the terminator (and a preceding `\r`) is stripped -- leading
/// whitespace is significant to the framing and is preserved.
pub struct LineBuffer {
    pending: Vec<u8>,
    // Bytes already scanned for a terminator, so repeated partial
    // increments do not rescan the whole remainder
    scanned: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            scanned: 0,
        }
    }

    /// Append one byte increment.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Next complete line, without its terminator.
    ///
    /// Returns None while the buffer holds only an unterminated remainder.
    /// A line that is not valid UTF-8 is reported as an error; the buffer
    /// stays usable for the lines after it.
    pub fn next_line(&mut self) -> Option<Result<String>> {
        let pos = match self.pending[self.scanned..].iter().position(|&b| b == b'\n') {
            Some(offset) => self.scanned + offset,
            None => {
                self.scanned = self.pending.len();
                return None;
            }
        };

        let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
        self.scanned = 0;

        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }

        Some(match String::from_utf8(line) {
            Ok(text) => Ok(text),
            Err(e) => Err(anyhow::anyhow!("Line is not valid UTF-8: {}", e)),
        })
    }

    /// Size of the unterminated remainder.
    pub fn remainder_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}
