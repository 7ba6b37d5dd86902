// Copyright 2025-Present Floodgate, Inc. https://www.floodgate.dev/
// SPDX-License-Identifier: Apache-2.0

//! Per-stream accumulation of events between flushes.

use std::collections::HashMap;

use floodgate_core::event::Event;

/// Events buffered per stream since the last flush, plus the running
/// total the size trigger is checked against.
///
/// Owned exclusively by the collector's coordinator task; the total is
/// always the sum of the per-stream sequence lengths.
#[derive(Debug, Default)]
pub(crate) struct BatchBuffer {
    streams: HashMap<String, Vec<Event>>,
    total: usize,
}

impl BatchBuffer {
    /// Appends `events` to `stream`, preserving enqueue order.
    pub(crate) fn append(&mut self, stream: String, events: Vec<Event>) {
        self.total += events.len();
        self.streams.entry(stream).or_default().extend(events);
    }

    /// Aggregate event count across all streams.
    pub(crate) fn len(&self) -> usize {
        self.total
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Hands out the accumulated batch and leaves this buffer empty.
    ///
    /// The snapshot shares no storage with the live buffer, so in-flight
    /// flush tasks never alias events still being accumulated.
    pub(crate) fn take(&mut self) -> HashMap<String, Vec<Event>> {
        self.total = 0;
        std::mem::take(&mut self.streams)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(n: i64) -> Event {
        let mut event = Event::new();
        event.insert("n".to_string(), json!(n));
        event
    }

    #[test]
    fn append_preserves_order_within_a_stream() {
        let mut buffer = BatchBuffer::default();
        buffer.append("s0".to_string(), vec![event(1), event(2)]);
        buffer.append("s0".to_string(), vec![event(3)]);

        let batch = buffer.take();
        assert_eq!(batch["s0"], vec![event(1), event(2), event(3)]);
    }

    #[test]
    fn total_tracks_all_streams() {
        let mut buffer = BatchBuffer::default();
        assert!(buffer.is_empty());

        buffer.append("s0".to_string(), vec![event(1), event(2)]);
        buffer.append("s1".to_string(), vec![event(3)]);

        assert_eq!(buffer.len(), 3);

        let batch = buffer.take();
        assert_eq!(batch.values().map(Vec::len).sum::<usize>(), 3);
    }

    #[test]
    fn take_resets_to_empty() {
        let mut buffer = BatchBuffer::default();
        buffer.append("s0".to_string(), vec![event(1)]);

        let batch = buffer.take();
        assert_eq!(batch.len(), 1);
        assert!(buffer.is_empty());
        assert_eq!(buffer.len(), 0);
        assert!(buffer.take().is_empty());
    }
}
