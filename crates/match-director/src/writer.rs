//! Writer (§4.5): deterministic frame pacing to a fixed-duration output.
//!
//! Stopping is governed purely by a frame count computed once at
//! construction — wall-clock processing speed never influences it, so
//! output length is decoupled from how fast the rest of the pipeline runs.

use match_models::{Frame, FrameSink, SinkError};

/// What the caller should do after handing a frame to the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Frame accepted; keep ticking.
    Continue,
    /// `N_target` frames have now been written; the run should stop.
    Done,
}

pub struct Writer {
    sink: Option<Box<dyn FrameSink>>,
    f_out: f64,
    n_target: u64,
    written: u64,
    initialized: bool,
}

impl Writer {
    /// `f_out` is the output FPS (the initial active stream's FPS, or
    /// `f_out_fallback` if that's unavailable/zero); `n_target =
    /// floor(duration_secs * f_out)` (§4.5).
    pub fn new(sink: Box<dyn FrameSink>, duration_secs: f64, f_out: f64) -> Self {
        let n_target = (duration_secs * f_out).floor().max(0.0) as u64;
        Self {
            sink: Some(sink),
            f_out,
            n_target,
            written: 0,
            initialized: false,
        }
    }

    pub fn n_target(&self) -> u64 {
        self.n_target
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Lazily initializes the sink on the first call (so resolution/pixel
    /// format match the source, §4.5), writes the frame if the target frame
    /// count hasn't been reached yet, and reports whether the run should
    /// continue.
    pub fn accept(&mut self, frame: &Frame) -> Result<WriteOutcome, SinkError> {
        if self.written >= self.n_target {
            return Ok(WriteOutcome::Done);
        }
        let sink = self.sink.as_mut().ok_or(SinkError::NotInitialized)?;
        if !self.initialized {
            sink.init(frame.pixels.width, frame.pixels.height, self.f_out)?;
            self.initialized = true;
        }
        sink.write(frame)?;
        self.written += 1;
        if self.written >= self.n_target {
            Ok(WriteOutcome::Done)
        } else {
            Ok(WriteOutcome::Continue)
        }
    }

    /// Finalize the sink and report how much was actually written.
    pub fn finalize(mut self) -> Result<(u64, u64, f64), SinkError> {
        if let Some(sink) = self.sink.take() {
            sink.finalize()?;
        }
        let duration_written = if self.f_out > 0.0 { self.written as f64 / self.f_out } else { 0.0 };
        Ok((self.written, self.n_target, duration_written))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use match_models::FramePixels;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct RecordingSink {
        inits: u32,
        writes: u32,
        finalized: bool,
    }

    struct SharedSink(Rc<RefCell<RecordingSink>>);

    impl FrameSink for SharedSink {
        fn init(&mut self, _w: u32, _h: u32, _fps: f64) -> Result<(), SinkError> {
            self.0.borrow_mut().inits += 1;
            Ok(())
        }
        fn write(&mut self, _frame: &Frame) -> Result<(), SinkError> {
            self.0.borrow_mut().writes += 1;
            Ok(())
        }
        fn finalize(self: Box<Self>) -> Result<(), SinkError> {
            self.0.borrow_mut().finalized = true;
            Ok(())
        }
    }

    fn frame(i: u64) -> Frame {
        Frame::new(0, i, FramePixels::new(4, 4, vec![0u8; 48]))
    }

    #[test]
    fn n_target_is_duration_times_fps_floored() {
        let shared = Rc::new(RefCell::new(RecordingSink::default()));
        let writer = Writer::new(Box::new(SharedSink(shared)), 2.5, 10.0);
        assert_eq!(writer.n_target(), 25);
    }

    #[test]
    fn stops_exactly_at_n_target_regardless_of_more_frames_offered() {
        let shared = Rc::new(RefCell::new(RecordingSink::default()));
        let mut writer = Writer::new(Box::new(SharedSink(shared.clone())), 0.3, 10.0);
        assert_eq!(writer.n_target(), 3);
        for i in 0..10u64 {
            let outcome = writer.accept(&frame(i)).unwrap();
            if i < 2 {
                assert_eq!(outcome, WriteOutcome::Continue);
            } else if i == 2 {
                assert_eq!(outcome, WriteOutcome::Done);
            } else {
                assert_eq!(outcome, WriteOutcome::Done);
            }
        }
        assert_eq!(shared.borrow().writes, 3);
        assert_eq!(shared.borrow().inits, 1);
    }

    #[test]
    fn finalize_reports_written_target_and_duration() {
        let shared = Rc::new(RefCell::new(RecordingSink::default()));
        let mut writer = Writer::new(Box::new(SharedSink(shared.clone())), 1.0, 5.0);
        for i in 0..5u64 {
            writer.accept(&frame(i)).unwrap();
        }
        let (written, n_target, duration) = writer.finalize().unwrap();
        assert_eq!(written, 5);
        assert_eq!(n_target, 5);
        assert!((duration - 1.0).abs() < 1e-9);
        assert!(shared.borrow().finalized);
    }
}
