//! Keyboard macro recording and playback.
//!
//! Recording captures every key the dispatcher reads; playback substitutes
//! the recorded codes for the keyboard until exhausted, repeating for the
//! requested count. A replay bound caps runaway loops.

use core_keymap::KeyCode;
use core_status::{Outcome, Status};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KbdState {
    #[default]
    Stop,
    Record,
    Play,
}

#[derive(Debug, Default)]
pub struct KbdMacro {
    pub state: KbdState,
    keys: Vec<KeyCode>,
    play_at: usize,
    /// Remaining repetitions, `None` for "until the bound trips".
    repeat: Option<u32>,
    played_rounds: u32,
}

impl KbdMacro {
    /// Start recording. Fails while playing or already recording.
    pub fn begin_record(&mut self) -> Outcome<()> {
        if self.state != KbdState::Stop {
            self.state = KbdState::Stop;
            return Err(Status::failure("Keyboard macro already active, cancelled"));
        }
        self.keys.clear();
        self.state = KbdState::Record;
        Ok(())
    }

    /// Stop recording, dropping the trailing keys that invoked the stop
    /// command itself.
    pub fn end_record(&mut self, trailing: usize) -> Outcome<()> {
        if self.state != KbdState::Record {
            return Err(Status::failure("Keyboard macro not being recorded"));
        }
        let keep = self.keys.len().saturating_sub(trailing);
        self.keys.truncate(keep);
        self.state = KbdState::Stop;
        Ok(())
    }

    /// Note one key read while recording.
    pub fn record(&mut self, key: KeyCode) {
        if self.state == KbdState::Record {
            self.keys.push(key);
        }
    }

    /// Begin playback: `n` repetitions; non-positive means unbounded
    /// (stopped by the replay cap).
    pub fn begin_play(&mut self, n: i64) -> Outcome<()> {
        if self.state != KbdState::Stop {
            self.state = KbdState::Stop;
            return Err(Status::failure("Keyboard macro already active, cancelled"));
        }
        if self.keys.is_empty() {
            return Err(Status::failure("No keyboard macro defined"));
        }
        self.repeat = if n <= 0 { None } else { Some(n as u32) };
        self.play_at = 0;
        self.played_rounds = 0;
        self.state = KbdState::Play;
        Ok(())
    }

    /// Next key of the playback, advancing rounds; `None` when playback
    /// completed. The replay cap converts runaway repetition into an error.
    pub fn next_play_key(&mut self, max_rounds: u32) -> Outcome<Option<KeyCode>> {
        if self.state != KbdState::Play {
            return Ok(None);
        }
        if self.play_at >= self.keys.len() {
            self.play_at = 0;
            self.played_rounds += 1;
            let done = match self.repeat {
                Some(rounds) => self.played_rounds >= rounds,
                None => false,
            };
            if done {
                self.state = KbdState::Stop;
                return Ok(None);
            }
            if self.played_rounds >= max_rounds {
                self.state = KbdState::Stop;
                return Err(Status::failure(format!(
                    "Maximum keyboard macro iterations ({max_rounds}) exceeded"
                )));
            }
        }
        let key = self.keys[self.play_at];
        self.play_at += 1;
        Ok(Some(key))
    }

    /// Abort: cancel recording or playback.
    pub fn cancel(&mut self) {
        if self.state == KbdState::Record {
            self.keys.clear();
        }
        self.state = KbdState::Stop;
    }

    pub fn is_recording(&self) -> bool {
        self.state == KbdState::Record
    }

    pub fn is_playing(&self) -> bool {
        self.state == KbdState::Play
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(c: u8) -> KeyCode {
        KeyCode::plain(c)
    }

    #[test]
    fn record_and_play_repeats() {
        let mut m = KbdMacro::default();
        m.begin_record().unwrap();
        m.record(key(b'a'));
        m.record(key(b'b'));
        m.record(key(b'x')); // the stop key itself
        m.end_record(1).unwrap();
        assert_eq!(m.len(), 2);

        m.begin_play(3).unwrap();
        let mut seen = Vec::new();
        while let Some(k) = m.next_play_key(100).unwrap() {
            seen.push(k.char7());
        }
        assert_eq!(seen, b"ababab");
        assert_eq!(m.state, KbdState::Stop);
    }

    #[test]
    fn unbounded_play_hits_cap() {
        let mut m = KbdMacro::default();
        m.begin_record().unwrap();
        m.record(key(b'a'));
        m.end_record(0).unwrap();
        m.begin_play(-1).unwrap();
        let mut count = 0;
        let err = loop {
            match m.next_play_key(5) {
                Ok(Some(_)) => count += 1,
                Ok(None) => panic!("unbounded playback ended quietly"),
                Err(err) => break err,
            }
        };
        assert_eq!(count, 5);
        assert!(err.message().unwrap().contains("keyboard macro iterations"));
    }

    #[test]
    fn empty_macro_refuses_playback() {
        let mut m = KbdMacro::default();
        assert!(m.begin_play(1).is_err());
    }

    #[test]
    fn nested_activation_cancels() {
        let mut m = KbdMacro::default();
        m.begin_record().unwrap();
        assert!(m.begin_record().is_err());
        assert_eq!(m.state, KbdState::Stop);
    }

    #[test]
    fn cancel_clears_partial_recording() {
        let mut m = KbdMacro::default();
        m.begin_record().unwrap();
        m.record(key(b'q'));
        m.cancel();
        assert!(m.is_empty());
    }
}
