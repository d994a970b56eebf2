/// Incremental byte-stream to protocol-line decoder.
///
/// Chunks may split anywhere, including inside a multi-byte UTF-8 scalar or
/// mid-line. Undecoded trailing bytes and the trailing partial line are both
/// retained between calls, so feeding a stream whole or byte-by-byte yields
/// the same line sequence.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Bytes that did not yet form a complete UTF-8 scalar.
    pending_bytes: Vec<u8>,
    /// Decoded text that did not yet end in a newline.
    pending_text: String,
}

impl FrameDecoder {
    /// Feed one raw chunk and drain every line it completes.
    ///
    /// A line is the text up to and excluding `\n`; a trailing `\r` is
    /// stripped so CRLF streams decode identically.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending_bytes.extend_from_slice(chunk);
        self.decode_pending();
        self.drain_lines()
    }

    /// Flush at end of input.
    ///
    /// A non-empty residual line is yielded once, treating EOF as an
    /// implicit terminator. An incomplete UTF-8 tail decodes lossily at this
    /// point since no further bytes can complete it.
    pub fn finish(&mut self) -> Option<String> {
        if !self.pending_bytes.is_empty() {
            let tail = String::from_utf8_lossy(&self.pending_bytes).into_owned();
            self.pending_text.push_str(&tail);
            self.pending_bytes.clear();
        }

        let residual = std::mem::take(&mut self.pending_text);
        let residual = residual.strip_suffix('\r').unwrap_or(&residual);
        if residual.is_empty() {
            None
        } else {
            Some(residual.to_string())
        }
    }

    /// True when no partial line or partial scalar is buffered.
    pub fn is_empty(&self) -> bool {
        self.pending_bytes.is_empty() && self.pending_text.is_empty()
    }

    /// Move every complete scalar from the byte residual into the text
    /// residual, keeping at most one incomplete trailing sequence buffered.
    fn decode_pending(&mut self) {
        let mut consumed = 0;
        loop {
            match std::str::from_utf8(&self.pending_bytes[consumed..]) {
                Ok(valid) => {
                    self.pending_text.push_str(valid);
                    consumed = self.pending_bytes.len();
                    break;
                }
                Err(error) => {
                    let valid_up_to = error.valid_up_to();
                    let valid = &self.pending_bytes[consumed..consumed + valid_up_to];
                    self.pending_text
                        .push_str(std::str::from_utf8(valid).unwrap_or_default());
                    consumed += valid_up_to;

                    match error.error_len() {
                        // Invalid sequence: substitute and keep going.
                        Some(len) => {
                            self.pending_text.push(char::REPLACEMENT_CHARACTER);
                            consumed += len;
                        }
                        // Incomplete trailing scalar: wait for more bytes.
                        None => break,
                    }
                }
            }
        }
        self.pending_bytes.drain(..consumed);
    }

    fn drain_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(split) = self.pending_text.find('\n') {
            let line: String = self.pending_text.drain(..=split).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            lines.push(line.to_string());
        }
        lines
    }
}
