// Copyright 2025-Present Floodgate, Inc. https://www.floodgate.dev/
// SPDX-License-Identifier: Apache-2.0

//! CRLF frame splitting for subscription byte streams.

use bytes::{Buf, Bytes, BytesMut};

/// Two-byte delimiter terminating each frame on the wire.
pub(crate) const DELIMITER: &[u8] = b"\r\n";

/// Scans the next frame out of `buf`.
///
/// Yields the bytes before the first delimiter, consuming the delimiter
/// as well. At end of stream the trailing bytes form one final frame,
/// with leading line feeds stripped. Returns `None` either because more
/// input is needed (`at_eof == false`) or because the buffer is
/// exhausted (`at_eof == true`). A yielded zero-length frame is a
/// keep-alive, not an event.
pub(crate) fn next_frame(buf: &mut BytesMut, at_eof: bool) -> Option<Bytes> {
    if at_eof && buf.is_empty() {
        return None;
    }

    if let Some(i) = find_delimiter(buf) {
        let frame = buf.split_to(i).freeze();
        buf.advance(DELIMITER.len());
        return Some(frame);
    }

    if at_eof {
        while buf.first() == Some(&b'\n') {
            buf.advance(1);
        }
        let len = buf.len();
        return Some(buf.split_to(len).freeze());
    }

    None
}

fn find_delimiter(buf: &[u8]) -> Option<usize> {
    buf.windows(DELIMITER.len()).position(|w| w == DELIMITER)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(input: &[u8]) -> Vec<Bytes> {
        let mut buf = BytesMut::from(input);
        let mut frames = Vec::new();
        while let Some(frame) = next_frame(&mut buf, true) {
            frames.push(frame);
        }
        assert!(buf.is_empty());
        frames
    }

    #[test]
    fn splits_delimited_frames_and_trailing_remainder() {
        assert_eq!(drain(b"A\r\nB\r\nC"), vec!["A", "B", "C"]);
    }

    #[test]
    fn yields_zero_length_keepalive_frames() {
        assert_eq!(drain(b"\r\n\r\n"), vec!["", ""]);
    }

    #[test]
    fn empty_input_at_eof_means_no_more_frames() {
        let mut buf = BytesMut::new();
        assert_eq!(next_frame(&mut buf, true), None);
    }

    #[test]
    fn requests_more_input_mid_stream() {
        let mut buf = BytesMut::from(&b"partial"[..]);
        assert_eq!(next_frame(&mut buf, false), None);
        assert_eq!(&buf[..], b"partial");
    }

    #[test]
    fn handles_delimiter_split_across_reads() {
        let mut buf = BytesMut::from(&b"A\r"[..]);
        assert_eq!(next_frame(&mut buf, false), None);

        buf.extend_from_slice(b"\nB");
        assert_eq!(next_frame(&mut buf, false), Some(Bytes::from_static(b"A")));
        assert_eq!(next_frame(&mut buf, false), None);
        assert_eq!(next_frame(&mut buf, true), Some(Bytes::from_static(b"B")));
    }

    #[test]
    fn strips_leading_linefeeds_from_final_frame() {
        assert_eq!(drain(b"A\r\n\nB"), vec!["A", "B"]);
    }
}
