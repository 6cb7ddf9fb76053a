//! Incremental decoder for `text/event-stream` bodies
//!
//! Bytes arrive in arbitrary slices; complete events are only emitted once
//! their terminating blank line has been seen, so multi-byte characters split
//! across network reads are never cut.

#[derive(Debug, Default)]
pub struct SseDecoder {
  buffer: Vec<u8>,
}

impl SseDecoder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Feed raw bytes; returns the `data` payload of every event completed by them
  pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
    self.buffer.extend(bytes.iter().copied().filter(|b| *b != b'\r'));

    let mut events = Vec::new();
    while let Some(end) = find_event_end(&self.buffer) {
      let raw: Vec<u8> = self.buffer.drain(..end + 2).collect();
      if let Some(data) = event_data(&raw[..end]) {
        events.push(data);
      }
    }
    events
  }

  /// Flush a trailing event that was not followed by a blank line
  pub fn finish(&mut self) -> Option<String> {
    let raw = std::mem::take(&mut self.buffer);
    event_data(&raw)
  }
}

fn find_event_end(buffer: &[u8]) -> Option<usize> {
  buffer.windows(2).position(|window| window == b"\n\n")
}

fn event_data(raw: &[u8]) -> Option<String> {
  let text = String::from_utf8_lossy(raw);
  let lines: Vec<&str> = text
    .lines()
    .filter_map(|line| line.strip_prefix("data:"))
    .map(|data| data.strip_prefix(' ').unwrap_or(data))
    .collect();

  if lines.is_empty() {
    None
  } else {
    Some(lines.join("\n"))
  }
}
