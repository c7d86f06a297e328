//! Motion primitives over the text store.
//!
//! All motions move the point as far as they can and report `NotFound` when
//! the requested count could not be satisfied at a buffer boundary. Vertical
//! motion takes the caller's goal column; the caller (dispatcher) owns the
//! "was the last command a line move" bookkeeping.

use crate::width::{col_offset, line_col};
use crate::{Point, TextCore};
use core_status::{Outcome, Status};

/// Word-character classification table.
#[derive(Debug, Clone)]
pub struct WordChars([bool; 256]);

impl Default for WordChars {
    fn default() -> Self {
        WordChars::from_spec(b"A-Za-z0-9_")
    }
}

impl WordChars {
    /// Build from a spec string of characters and `a-z` ranges.
    pub fn from_spec(spec: &[u8]) -> Self {
        let mut table = [false; 256];
        let mut i = 0;
        while i < spec.len() {
            if i + 2 < spec.len() && spec[i + 1] == b'-' && spec[i] <= spec[i + 2] {
                for c in spec[i]..=spec[i + 2] {
                    table[c as usize] = true;
                }
                i += 3;
            } else {
                table[spec[i] as usize] = true;
                i += 1;
            }
        }
        WordChars(table)
    }

    pub fn is_word(&self, c: u8) -> bool {
        self.0[c as usize]
    }
}

impl TextCore {
    /// Whether the character at the point is a word character.
    pub fn in_word(&self, words: &WordChars) -> bool {
        self.char_at(self.point()).is_some_and(|c| words.is_word(c))
    }

    fn step_forward(&mut self) -> bool {
        let pt = self.point();
        if pt.offset < self.line_used(pt.line) {
            self.set_point(Point::new(pt.line, pt.offset + 1));
            true
        } else if let Some(next) = self.next_line(pt.line) {
            self.set_point(Point::new(next, 0));
            true
        } else {
            false
        }
    }

    fn step_backward(&mut self) -> bool {
        let pt = self.point();
        if pt.offset > 0 {
            self.set_point(Point::new(pt.line, pt.offset - 1));
            true
        } else if let Some(prev) = self.prev_line(pt.line) {
            self.set_point(Point::new(prev, self.line_used(prev)));
            true
        } else {
            false
        }
    }

    /// Character-wise motion; crossing an end-of-line counts the newline as
    /// one character.
    pub fn point_move(&mut self, n: i64) -> Outcome<()> {
        let mut left = n.unsigned_abs();
        let forward = n >= 0;
        while left > 0 {
            let stepped = if forward { self.step_forward() } else { self.step_backward() };
            if !stepped {
                return Err(Status::not_found());
            }
            left -= 1;
        }
        Ok(())
    }

    /// Vertical motion preserving `target_col`. The landing offset is the
    /// largest whose visual column fits the goal. Fails outright when
    /// already on the edge line; a partial move still lands and reports
    /// `NotFound`.
    pub fn line_move(&mut self, n: i64, target_col: usize, tab_width: usize) -> Outcome<()> {
        if n == 0 {
            return Ok(());
        }
        let forward = n > 0;
        let at_edge = if forward {
            self.is_last(self.point().line)
        } else {
            self.is_first(self.point().line)
        };
        if at_edge {
            return Err(Status::not_found());
        }
        let mut line = self.point().line;
        let mut left = n.unsigned_abs();
        let mut complete = true;
        while left > 0 {
            let step = if forward { self.next_line(line) } else { self.prev_line(line) };
            match step {
                Some(next) => line = next,
                None => {
                    complete = false;
                    break;
                }
            }
            left -= 1;
        }
        let offset = col_offset(self.line_text(line), target_col, tab_width);
        self.set_point(Point::new(line, offset));
        if complete { Ok(()) } else { Err(Status::not_found()) }
    }

    /// Visual column of the point.
    pub fn point_col(&self, tab_width: usize) -> usize {
        let pt = self.point();
        line_col(self.line_text(pt.line), pt.offset, tab_width)
    }

    pub fn to_line_start(&mut self) {
        let pt = self.point();
        self.set_point(Point::new(pt.line, 0));
    }

    pub fn to_line_end(&mut self) {
        let pt = self.point();
        self.set_point(Point::new(pt.line, self.line_used(pt.line)));
    }

    pub fn to_buffer_start(&mut self) {
        let first = self.first_line();
        self.set_point(Point::new(first, 0));
    }

    pub fn to_buffer_end(&mut self) {
        let last = self.last_line();
        self.set_point(Point::new(last, self.line_used(last)));
    }

    /// Move to the start of the `n`th next word.
    pub fn forw_word(&mut self, n: u64, words: &WordChars) -> Outcome<()> {
        for _ in 0..n {
            while self.in_word(words) {
                if !self.step_forward() {
                    return Err(Status::not_found());
                }
            }
            loop {
                if self.in_word(words) {
                    break;
                }
                if !self.step_forward() {
                    return Err(Status::not_found());
                }
            }
        }
        Ok(())
    }

    /// Move just past the end of the `n`th next word.
    pub fn end_word(&mut self, n: u64, words: &WordChars) -> Outcome<()> {
        for _ in 0..n {
            loop {
                if self.in_word(words) {
                    break;
                }
                if !self.step_forward() {
                    return Err(Status::not_found());
                }
            }
            while self.in_word(words) {
                if !self.step_forward() {
                    return Ok(()); // word ended at the buffer edge
                }
            }
        }
        Ok(())
    }

    /// Move to the start of the `n`th previous word.
    pub fn back_word(&mut self, n: u64, words: &WordChars) -> Outcome<()> {
        for _ in 0..n {
            if !self.step_backward() {
                return Err(Status::not_found());
            }
            while !self.in_word(words) {
                if !self.step_backward() {
                    return Err(Status::not_found());
                }
            }
            loop {
                let pt = self.point();
                if !self.step_backward() {
                    return Ok(()); // word starts the buffer
                }
                if !self.in_word(words) {
                    self.set_point(pt);
                    break;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(text: &str) -> TextCore {
        TextCore::from_bytes(text.as_bytes())
    }

    #[test]
    fn point_move_round_trip() {
        let mut core = store("ab\ncd");
        core.point_move(4).unwrap();
        assert_eq!(core.point().offset, 1);
        core.point_move(-4).unwrap();
        assert_eq!(core.point(), Point::new(core.first_line(), 0));
    }

    #[test]
    fn point_move_hits_boundaries() {
        let mut core = store("ab");
        assert!(core.point_move(3).unwrap_err().is_not_found());
        // Partial move applied: landed at the very end.
        assert_eq!(core.point().offset, 2);
        assert!(core.point_move(-3).unwrap_err().is_not_found());
        assert_eq!(core.point().offset, 0);
    }

    #[test]
    fn newline_counts_as_one_character() {
        let mut core = store("a\nb");
        core.point_move(1).unwrap();
        assert_eq!(core.char_at(core.point()), Some(b'\n'));
        core.point_move(1).unwrap();
        assert_eq!(core.char_at(core.point()), Some(b'b'));
    }

    #[test]
    fn line_move_keeps_goal_column() {
        let mut core = store("abcdef\nxy\nlongline");
        core.set_point(Point::new(core.first_line(), 5));
        let goal = core.point_col(8);
        core.line_move(1, goal, 8).unwrap();
        // Second line is short: clamp to its end.
        assert_eq!(core.point().offset, 2);
        core.line_move(1, goal, 8).unwrap();
        // Third line is long enough to honor the goal again.
        assert_eq!(core.point().offset, 5);
    }

    #[test]
    fn line_move_on_edge_line_fails() {
        let mut core = store("ab\ncd");
        assert!(core.line_move(-1, 0, 8).unwrap_err().is_not_found());
        core.to_buffer_end();
        assert!(core.line_move(1, 0, 8).unwrap_err().is_not_found());
    }

    #[test]
    fn line_move_partial_lands_and_reports() {
        let mut core = store("ab\ncd\nef");
        assert!(core.line_move(5, 1, 8).unwrap_err().is_not_found());
        assert_eq!(core.point().line, core.last_line());
        assert_eq!(core.point().offset, 1);
    }

    #[test]
    fn word_motion_forward_and_back() {
        let mut core = store("one two\nthree");
        let words = WordChars::default();
        core.forw_word(1, &words).unwrap();
        assert_eq!(core.point().offset, 4); // start of "two"
        core.forw_word(1, &words).unwrap();
        assert_eq!(core.point().line, core.last_line()); // start of "three"
        core.back_word(1, &words).unwrap();
        assert_eq!(core.point().offset, 4);
        core.back_word(1, &words).unwrap();
        assert_eq!(core.point().offset, 0);
        assert!(core.back_word(1, &words).unwrap_err().is_not_found());
    }

    #[test]
    fn end_word_stops_after_word() {
        let mut core = store("  one two");
        let words = WordChars::default();
        core.end_word(1, &words).unwrap();
        assert_eq!(core.point().offset, 5);
        core.end_word(1, &words).unwrap();
        assert_eq!(core.point().offset, 9);
    }

    #[test]
    fn word_chars_spec_ranges() {
        let words = WordChars::from_spec(b"a-c_");
        assert!(words.is_word(b'a'));
        assert!(words.is_word(b'c'));
        assert!(words.is_word(b'_'));
        assert!(!words.is_word(b'd'));
        assert!(!words.is_word(b'-'));
    }
}
