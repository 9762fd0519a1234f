use std::sync::Arc;

use shipyard_model::{INITIAL_PHASE, LogEvent, LogStream, TaskIds};
use tokio::sync::Mutex;
use tracing::{trace, warn};

use crate::{BusError, EventBus};

/// Line-oriented adapter from raw output bytes to [`LogEvent`]s.
///
/// Every complete line is published as soon as its terminator arrives; unterminated bytes stay
/// buffered until more input or [`LogWriter::flush`]. One lock guards buffer, sequence and phase
/// and is held across the publish, so events leave in sequence order even with concurrent callers.
///
/// stdout and stderr use separate writers with independent sequence counters.
pub struct LogWriter {
    ids: TaskIds,
    stream: LogStream,
    bus: Arc<dyn EventBus>,
    state: Mutex<WriterState>,
}

struct WriterState {
    buf: Vec<u8>,
    sequence: u64,
    phase: String,
}

impl LogWriter {
    pub fn new(bus: Arc<dyn EventBus>, ids: TaskIds, stream: LogStream) -> Self {
        Self {
            ids,
            stream,
            bus,
            state: Mutex::new(WriterState {
                buf: Vec::new(),
                sequence: 0,
                phase: INITIAL_PHASE.to_string(),
            }),
        }
    }

    #[inline]
    pub fn stream(&self) -> LogStream {
        self.stream
    }

    #[inline]
    pub fn ids(&self) -> &TaskIds {
        &self.ids
    }

    /// Consume `bytes`, publishing every line they complete.
    ///
    /// Always reports the full input length. Publish failures are logged and dropped so broken
    /// logging never aborts the work being observed.
    pub async fn write(&self, bytes: &[u8]) -> usize {
        let mut state = self.state.lock().await;
        state.buf.extend_from_slice(bytes);

        let mut scanned = 0;
        while let Some(offset) = state.buf[scanned..].iter().position(|b| *b == b'\n') {
            let end = scanned + offset + 1;
            let line = String::from_utf8_lossy(&state.buf[scanned..end]).into_owned();
            scanned = end;

            if let Err(e) = self.emit(&mut state, line).await {
                warn!(
                    target: "shipyard.logbus",
                    stream = %self.stream,
                    sequence = state.sequence,
                    error = %e,
                    "dropping log line"
                );
            }
        }
        state.buf.drain(..scanned);

        bytes.len()
    }

    /// Switch the phase attached to events emitted from now on.
    ///
    /// A partially buffered line is tagged with the phase in effect when it is emitted, so flush
    /// first when the boundary matters.
    pub async fn set_phase(&self, phase: impl Into<String>) {
        let phase = phase.into();
        let mut state = self.state.lock().await;
        trace!(target: "shipyard.logbus", stream = %self.stream, from = %state.phase, to = %phase, "phase change");
        state.phase = phase;
    }

    pub async fn phase(&self) -> String {
        self.state.lock().await.phase.clone()
    }

    /// Last sequence number handed out (0 before the first event).
    pub async fn sequence(&self) -> u64 {
        self.state.lock().await.sequence
    }

    /// Publish whatever is buffered as one final event, terminator or not.
    pub async fn flush(&self) -> Result<(), BusError> {
        let mut state = self.state.lock().await;
        if state.buf.is_empty() {
            return Ok(());
        }
        let rest = std::mem::take(&mut state.buf);
        let line = String::from_utf8_lossy(&rest).into_owned();
        self.emit(&mut state, line).await
    }

    /// Same as [`LogWriter::flush`]; calling it again on an empty buffer does nothing.
    pub async fn close(&self) -> Result<(), BusError> {
        self.flush().await
    }

    async fn emit(&self, state: &mut WriterState, message: String) -> Result<(), BusError> {
        state.sequence += 1;
        let event = LogEvent::new(
            &self.ids,
            self.stream,
            message,
            state.sequence,
            state.phase.clone(),
        );
        self.bus.publish_log(&event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBus;

    fn writer(stream: LogStream) -> (Arc<MemoryBus>, LogWriter) {
        let bus = Arc::new(MemoryBus::new());
        let ids = TaskIds::new("dep-1", "job-1", "svc-1", "own-1");
        let writer = LogWriter::new(bus.clone(), ids, stream);
        (bus, writer)
    }

    fn sequences(bus: &MemoryBus) -> Vec<u64> {
        bus.logs().iter().map(|e| e.sequence).collect()
    }

    #[tokio::test]
    async fn docker_steps_get_their_own_phase() {
        let (bus, w) = writer(LogStream::Stdout);

        w.set_phase("build").await;
        w.write(b"Step 1/5: FROM node:18-alpine\n").await;
        w.set_phase("registry").await;
        w.write(b"Step 2/5: WORKDIR /app\n").await;

        let logs = bus.logs();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].message, "Step 1/5: FROM node:18-alpine\n");
        assert_eq!(logs[0].sequence, 1);
        assert_eq!(logs[0].phase, "build");
        assert_eq!(logs[1].message, "Step 2/5: WORKDIR /app\n");
        assert_eq!(logs[1].sequence, 2);
        assert_eq!(logs[1].phase, "registry");
        assert!(logs.iter().all(|e| e.stream == LogStream::Stdout));
    }

    #[tokio::test]
    async fn partial_line_is_emitted_on_close() {
        let (bus, w) = writer(LogStream::Stderr);

        assert_eq!(w.write(b"partial").await, 7);
        assert!(bus.logs().is_empty());

        w.close().await.unwrap();
        let logs = bus.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].message, "partial");
        assert_eq!(logs[0].sequence, 1);

        w.close().await.unwrap();
        assert_eq!(bus.logs().len(), 1);
    }

    #[tokio::test]
    async fn lines_and_tail_counts_hold_for_any_split() {
        let input = b"one\ntwo\n\nthree\nfour\ntail-without-newline";
        let newlines = input.iter().filter(|b| **b == b'\n').count();

        for chunk in [1usize, 2, 3, 5, 8, input.len()] {
            let (bus, w) = writer(LogStream::Stdout);
            for part in input.chunks(chunk) {
                assert_eq!(w.write(part).await, part.len());
            }
            assert_eq!(bus.logs().len(), newlines, "chunk size {chunk}");

            w.flush().await.unwrap();
            let logs = bus.logs();
            assert_eq!(logs.len(), newlines + 1);
            assert_eq!(logs.last().unwrap().message, "tail-without-newline");
            assert_eq!(sequences(&bus), (1..=logs.len() as u64).collect::<Vec<_>>());

            let joined: String = logs.iter().map(|e| e.message.as_str()).collect();
            assert_eq!(joined.as_bytes(), input);
        }
    }

    #[tokio::test]
    async fn terminated_input_adds_nothing_on_flush() {
        let (bus, w) = writer(LogStream::Stdout);
        w.write(b"a\nb\n").await;
        w.flush().await.unwrap();
        assert_eq!(bus.logs().len(), 2);
    }

    #[tokio::test]
    async fn write_reports_full_length_for_edge_inputs() {
        let (bus, w) = writer(LogStream::Stdout);
        assert_eq!(w.write(b"").await, 0);
        assert_eq!(w.write(b"x").await, 1);
        assert_eq!(w.write(b"no newline at all").await, 17);
        assert!(bus.logs().is_empty());
        assert_eq!(w.sequence().await, 0);
    }

    #[tokio::test]
    async fn phase_is_taken_at_emission_time() {
        let (bus, w) = writer(LogStream::Stdout);
        assert_eq!(w.phase().await, INITIAL_PHASE);

        w.write(b"started in clone").await;
        w.set_phase("build").await;
        w.write(b" ...done\n").await;

        let logs = bus.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].message, "started in clone ...done\n");
        assert_eq!(logs[0].phase, "build");
    }

    #[tokio::test]
    async fn publish_failure_is_swallowed_on_write_but_reported_on_flush() {
        let (bus, w) = writer(LogStream::Stdout);
        bus.set_failing(true);

        assert_eq!(w.write(b"lost\nbuffered").await, 13);
        assert!(w.flush().await.is_err());
        assert_eq!(bus.attempts(), 2);

        bus.set_failing(false);
        w.write(b"kept\n").await;
        let logs = bus.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].sequence, 3);
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced() {
        let (bus, w) = writer(LogStream::Stdout);
        w.write(&[0x66, 0xff, 0x6f, b'\n']).await;
        assert_eq!(bus.logs()[0].message, "f\u{fffd}o\n");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_never_tear_lines() {
        let (bus, w) = writer(LogStream::Stdout);
        let w = Arc::new(w);

        let mut tasks = Vec::new();
        for id in 0..8 {
            let w = Arc::clone(&w);
            tasks.push(tokio::spawn(async move {
                for n in 0..50 {
                    w.write(format!("writer-{id} line-{n}\n").as_bytes()).await;
                }
            }));
        }
        for t in tasks {
            t.await.unwrap();
        }

        let logs = bus.logs();
        assert_eq!(logs.len(), 8 * 50);
        assert!(logs.iter().all(|e| {
            e.message.starts_with("writer-") && e.message.ends_with('\n') && e.message.matches('\n').count() == 1
        }));
        assert_eq!(sequences(&bus), (1..=400).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn sibling_streams_sequence_independently() {
        let bus = Arc::new(MemoryBus::new());
        let ids = TaskIds::new("dep", "job", "svc", "own");
        let out = LogWriter::new(bus.clone(), ids.clone(), LogStream::Stdout);
        let err = LogWriter::new(bus.clone(), ids, LogStream::Stderr);

        out.write(b"o1\n").await;
        err.write(b"e1\n").await;
        out.write(b"o2\n").await;

        let logs = bus.logs();
        let per_stream = |s: LogStream| -> Vec<u64> {
            logs.iter().filter(|e| e.stream == s).map(|e| e.sequence).collect()
        };
        assert_eq!(per_stream(LogStream::Stdout), vec![1, 2]);
        assert_eq!(per_stream(LogStream::Stderr), vec![1]);
    }
}
