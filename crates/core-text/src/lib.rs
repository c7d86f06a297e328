//! core-text: the text store.
//!
//! A buffer's text is a doubly-linked cycle of byte lines threaded through a
//! header sentinel, held in an arena so a [`LineId`] stays valid for the
//! lifetime of the line no matter how its neighbors churn. Line bytes exclude
//! the terminator; the newline between two lines is a synthetic character
//! that motion and delete primitives count as one.
//!
//! Core invariants (must hold after every public call):
//! * The link cycle `header → first → … → last → header` is intact in both
//!   directions and visits exactly `line_count` live lines.
//! * The store always contains at least one live line.
//! * The point and every mark reference a live line with
//!   `offset <= line.used`.
//! * Inserting a newline never changes the identity of the line the point
//!   was on: the head of the split moves to a freshly allocated line.
//!
//! Logical failures (motion hitting a boundary, nothing left to delete)
//! report `NotFound` and never carry a message. Structural corruption is a
//! panic, not a status.

use core_status::{Outcome, Status};
use tracing::trace;

pub mod motion;
pub mod width;

/// Stable identity of one line in the arena. Index 0 is the header sentinel
/// and never appears in a `Point`, a `Mark`, or an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineId(u32);

const HEADER: u32 = 0;

/// The editing cursor, or any saved position: a live line plus a byte offset
/// in `[0, used]`. `offset == used` is "after the last character"; when the
/// line is not the last, the character at that position reads as newline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub line: LineId,
    pub offset: usize,
}

impl Point {
    pub fn new(line: LineId, offset: usize) -> Self {
        Self { line, offset }
    }
}

/// A named position that survives edits. `reframe_row` remembers the screen
/// row the mark's line occupied so a later return can restore the framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    pub id: u8,
    pub point: Point,
    pub reframe_row: i16,
}

/// Mark set by the default mark-set command.
pub const RMARK: u8 = b' ';
/// Work mark written by search/replace and long-jump navigation.
pub const WMARK: u8 = b'.';

/// A directed run of bytes. `size` is signed: negative means the region
/// extends backward from `start`. [`TextCore::region_between`] always
/// normalizes to a forward region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub start: Point,
    pub size: i64,
    pub line_count: usize,
}

/// Result of a bounded delete: the bytes removed (when requested), how many
/// characters actually went away, and whether the full count was satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deleted {
    pub text: Option<Vec<u8>>,
    pub count: u64,
    pub complete: bool,
}

#[derive(Debug)]
struct LineCell {
    prev: u32,
    next: u32,
    text: Vec<u8>,
    live: bool,
}

/// The text store proper: line arena, point, marks, and the changed flag.
#[derive(Debug)]
pub struct TextCore {
    cells: Vec<LineCell>,
    free: Vec<u32>,
    line_count: usize,
    point: Point,
    marks: Vec<Mark>,
    changed: bool,
}

impl Default for TextCore {
    fn default() -> Self {
        Self::new()
    }
}

impl TextCore {
    /// An empty store: one empty line, point at its start.
    pub fn new() -> Self {
        let header = LineCell { prev: 1, next: 1, text: Vec::new(), live: false };
        let first = LineCell { prev: HEADER, next: HEADER, text: Vec::new(), live: true };
        TextCore {
            cells: vec![header, first],
            free: Vec::new(),
            line_count: 1,
            point: Point::new(LineId(1), 0),
            marks: Vec::new(),
            changed: false,
        }
    }

    /// Build a store from decoded file lines. An empty input still yields one
    /// empty line. Does not set the changed flag.
    pub fn from_lines(lines: Vec<Vec<u8>>) -> Self {
        let mut core = TextCore::new();
        if lines.is_empty() {
            return core;
        }
        let mut iter = lines.into_iter();
        if let Some(first) = iter.next() {
            core.cells[1].text = first;
        }
        let mut tail = 1u32;
        for text in iter {
            let id = core.alloc(text);
            core.link_after(tail, id);
            tail = id;
        }
        core.point = Point::new(LineId(1), 0);
        core
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut lines: Vec<Vec<u8>> = bytes.split(|&b| b == b'\n').map(<[u8]>::to_vec).collect();
        // A trailing newline produces a phantom empty tail; the caller tracks
        // the final delimiter separately.
        if lines.len() > 1 && lines.last().is_some_and(Vec::is_empty) {
            lines.pop();
        }
        TextCore::from_lines(lines)
    }

    // ---------------------------------------------------------------------
    // Arena plumbing
    // ---------------------------------------------------------------------

    fn alloc(&mut self, text: Vec<u8>) -> u32 {
        let idx = match self.free.pop() {
            Some(idx) => {
                let cell = &mut self.cells[idx as usize];
                cell.text = text;
                cell.live = true;
                idx
            }
            None => {
                self.cells.push(LineCell { prev: HEADER, next: HEADER, text, live: true });
                (self.cells.len() - 1) as u32
            }
        };
        self.line_count += 1;
        idx
    }

    fn link_after(&mut self, prev: u32, id: u32) {
        let next = self.cells[prev as usize].next;
        self.cells[id as usize].prev = prev;
        self.cells[id as usize].next = next;
        self.cells[prev as usize].next = id;
        self.cells[next as usize].prev = id;
    }

    fn link_before(&mut self, next: u32, id: u32) {
        let prev = self.cells[next as usize].prev;
        self.link_after(prev, id);
    }

    fn unlink(&mut self, id: u32) {
        debug_assert_ne!(id, HEADER, "header sentinel is permanent");
        let (prev, next) = {
            let cell = &self.cells[id as usize];
            (cell.prev, cell.next)
        };
        self.cells[prev as usize].next = next;
        self.cells[next as usize].prev = prev;
        let cell = &mut self.cells[id as usize];
        cell.live = false;
        cell.text = Vec::new();
        self.free.push(id);
        self.line_count -= 1;
    }

    fn cell(&self, id: LineId) -> &LineCell {
        let cell = &self.cells[id.0 as usize];
        debug_assert!(cell.live, "dead line reference {id:?}");
        cell
    }

    // ---------------------------------------------------------------------
    // Read access
    // ---------------------------------------------------------------------

    pub fn first_line(&self) -> LineId {
        LineId(self.cells[HEADER as usize].next)
    }

    pub fn last_line(&self) -> LineId {
        LineId(self.cells[HEADER as usize].prev)
    }

    pub fn next_line(&self, id: LineId) -> Option<LineId> {
        let next = self.cell(id).next;
        (next != HEADER).then_some(LineId(next))
    }

    pub fn prev_line(&self, id: LineId) -> Option<LineId> {
        let prev = self.cell(id).prev;
        (prev != HEADER).then_some(LineId(prev))
    }

    pub fn line_text(&self, id: LineId) -> &[u8] {
        &self.cell(id).text
    }

    pub fn line_used(&self, id: LineId) -> usize {
        self.cell(id).text.len()
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    pub fn is_last(&self, id: LineId) -> bool {
        self.cell(id).next == HEADER
    }

    pub fn is_first(&self, id: LineId) -> bool {
        self.cell(id).prev == HEADER
    }

    /// Iterate live lines first to last.
    pub fn lines(&self) -> impl Iterator<Item = LineId> + '_ {
        let mut cursor = self.cells[HEADER as usize].next;
        std::iter::from_fn(move || {
            if cursor == HEADER {
                None
            } else {
                let id = LineId(cursor);
                cursor = self.cells[cursor as usize].next;
                Some(id)
            }
        })
    }

    /// 1-based ordinal of a line, by walking from the top.
    pub fn line_number(&self, id: LineId) -> usize {
        let mut n = 1;
        for candidate in self.lines() {
            if candidate == id {
                return n;
            }
            n += 1;
        }
        panic!("line {id:?} not reachable from header");
    }

    /// Line at a 1-based ordinal, clamped to the last line.
    pub fn line_at(&self, number: usize) -> LineId {
        let mut id = self.first_line();
        for _ in 1..number {
            match self.next_line(id) {
                Some(next) => id = next,
                None => break,
            }
        }
        id
    }

    pub fn point(&self) -> Point {
        self.point
    }

    pub fn set_point(&mut self, pt: Point) {
        debug_assert!(self.cell(pt.line).live);
        debug_assert!(pt.offset <= self.line_used(pt.line));
        self.point = pt;
    }

    /// The character at a position: a line byte, the synthetic newline at the
    /// end of a non-last line, or `None` at the very end of the buffer.
    pub fn char_at(&self, pt: Point) -> Option<u8> {
        let text = self.line_text(pt.line);
        if pt.offset < text.len() {
            Some(text[pt.offset])
        } else if self.is_last(pt.line) {
            None
        } else {
            Some(b'\n')
        }
    }

    /// Total character count: line bytes plus one per inter-line newline.
    pub fn length(&self) -> u64 {
        let mut total = 0u64;
        for id in self.lines() {
            total += self.line_used(id) as u64 + 1;
        }
        total.saturating_sub(1)
    }

    /// Absolute character offset of a point from the top of the buffer.
    pub fn point_offset(&self, pt: Point) -> u64 {
        let mut total = 0u64;
        for id in self.lines() {
            if id == pt.line {
                return total + pt.offset as u64;
            }
            total += self.line_used(id) as u64 + 1;
        }
        panic!("point line {:?} not reachable from header", pt.line);
    }

    /// Order two points by buffer position.
    pub fn cmp_points(&self, a: Point, b: Point) -> std::cmp::Ordering {
        if a.line == b.line {
            return a.offset.cmp(&b.offset);
        }
        for id in self.lines() {
            if id == a.line {
                return std::cmp::Ordering::Less;
            }
            if id == b.line {
                return std::cmp::Ordering::Greater;
            }
        }
        panic!("points reference unreachable lines");
    }

    pub fn changed(&self) -> bool {
        self.changed
    }

    pub fn set_changed(&mut self, changed: bool) {
        self.changed = changed;
    }

    /// Serialize line bytes joined by `delim`, with a trailing delimiter when
    /// `final_delim` is set (mirrors what was found on read).
    pub fn to_bytes(&self, delim: &[u8], final_delim: bool) -> Vec<u8> {
        let mut out = Vec::new();
        let mut first = true;
        for id in self.lines() {
            if !first {
                out.extend_from_slice(delim);
            }
            out.extend_from_slice(self.line_text(id));
            first = false;
        }
        if final_delim {
            out.extend_from_slice(delim);
        }
        out
    }

    // ---------------------------------------------------------------------
    // Marks
    // ---------------------------------------------------------------------

    pub fn set_mark(&mut self, id: u8, reframe_row: i16) {
        let point = self.point;
        match self.marks.iter_mut().find(|m| m.id == id) {
            Some(mark) => {
                mark.point = point;
                mark.reframe_row = reframe_row;
            }
            None => self.marks.push(Mark { id, point, reframe_row }),
        }
    }

    pub fn find_mark(&self, id: u8) -> Option<&Mark> {
        self.marks.iter().find(|m| m.id == id)
    }

    /// Move the point to a mark, returning its reframe row. `NotFound` when
    /// the mark is not set.
    pub fn goto_mark(&mut self, id: u8) -> Outcome<i16> {
        match self.find_mark(id) {
            Some(mark) => {
                let (pt, row) = (mark.point, mark.reframe_row);
                self.point = pt;
                Ok(row)
            }
            None => Err(Status::not_found()),
        }
    }

    pub fn delete_mark(&mut self, id: u8) -> Outcome<()> {
        let before = self.marks.len();
        self.marks.retain(|m| m.id != id);
        if self.marks.len() == before { Err(Status::not_found()) } else { Ok(()) }
    }

    /// Exchange the point with a mark, leaving the mark at the old point.
    pub fn swap_mark(&mut self, id: u8) -> Outcome<()> {
        let old = self.point;
        self.goto_mark(id)?;
        if let Some(mark) = self.marks.iter_mut().find(|m| m.id == id) {
            mark.point = old;
        }
        Ok(())
    }

    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    pub fn clear_marks(&mut self) {
        self.marks.clear();
    }

    // ---------------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------------

    fn touch(&mut self) {
        self.changed = true;
    }

    /// Insert `n` copies of a byte at the point; the point ends after the
    /// run. Newline bytes split the line.
    pub fn insert_char(&mut self, n: usize, c: u8) -> Outcome<()> {
        if c == b'\n' {
            for _ in 0..n {
                self.insert_newline()?;
            }
            return Ok(());
        }
        if n == 0 {
            return Ok(());
        }
        let Point { line, offset } = self.point;
        let cell = &mut self.cells[line.0 as usize];
        cell.text.splice(offset..offset, std::iter::repeat_n(c, n));
        for mark in &mut self.marks {
            if mark.point.line == line && mark.point.offset > offset {
                mark.point.offset += n;
            }
        }
        self.point.offset += n;
        self.touch();
        Ok(())
    }

    /// Split the line at the point. The head of the split moves to a new
    /// line inserted above; the point's line keeps the tail, so the point
    /// lands at column zero of the same line identity.
    pub fn insert_newline(&mut self) -> Outcome<()> {
        let Point { line, offset } = self.point;
        let head: Vec<u8> = self.cells[line.0 as usize].text.drain(..offset).collect();
        let new = self.alloc(head);
        self.link_before(line.0, new);
        for mark in &mut self.marks {
            if mark.point.line == line {
                if mark.point.offset < offset {
                    mark.point.line = LineId(new);
                } else {
                    mark.point.offset -= offset;
                }
            }
        }
        self.point.offset = 0;
        self.touch();
        trace!(target: "text.store", line = line.0, at = offset, "newline");
        Ok(())
    }

    /// Insert a byte string at the point, honoring embedded newlines.
    pub fn insert_str(&mut self, bytes: &[u8]) -> Outcome<()> {
        let mut rest = bytes;
        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.insert_slice(&rest[..pos]);
            self.insert_newline()?;
            rest = &rest[pos + 1..];
        }
        self.insert_slice(rest);
        Ok(())
    }

    fn insert_slice(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let Point { line, offset } = self.point;
        let cell = &mut self.cells[line.0 as usize];
        cell.text.splice(offset..offset, bytes.iter().copied());
        for mark in &mut self.marks {
            if mark.point.line == line && mark.point.offset > offset {
                mark.point.offset += bytes.len();
            }
        }
        self.point.offset += bytes.len();
        self.touch();
    }

    /// Join the point's line with the one after it, removing the synthetic
    /// newline. `NotFound` on the last line.
    fn merge_next(&mut self) -> Outcome<()> {
        let line = self.point.line;
        let next = self.cell(line).next;
        if next == HEADER {
            return Err(Status::not_found());
        }
        let tail = std::mem::take(&mut self.cells[next as usize].text);
        let base = self.cells[line.0 as usize].text.len();
        self.cells[line.0 as usize].text.extend_from_slice(&tail);
        for mark in &mut self.marks {
            if mark.point.line == LineId(next) {
                mark.point.line = line;
                mark.point.offset += base;
            }
        }
        self.unlink(next);
        self.touch();
        Ok(())
    }

    /// Delete `n` characters: forward when positive, backward when negative.
    /// The removed text is collected when `want_text` is set. Deletion stops
    /// at the buffer boundary; `complete` reports whether the full count was
    /// honored. The point ends at the start of the removed run.
    pub fn delete(&mut self, n: i64, want_text: bool) -> Outcome<Deleted> {
        if n == 0 {
            return Ok(Deleted { text: want_text.then(Vec::new), count: 0, complete: true });
        }
        if n < 0 {
            let want = n.unsigned_abs();
            let moved = self.step_back(want);
            let mut out = self.delete_forward(moved, want_text)?;
            out.complete = moved == want;
            return Ok(out);
        }
        self.delete_forward(n as u64, want_text)
    }

    fn delete_forward(&mut self, n: u64, want_text: bool) -> Outcome<Deleted> {
        let mut removed: Vec<u8> = Vec::new();
        let mut left = n;
        while left > 0 {
            let Point { line, offset } = self.point;
            let used = self.line_used(line);
            let chunk = ((used - offset) as u64).min(left) as usize;
            if chunk > 0 {
                let drained: Vec<u8> =
                    self.cells[line.0 as usize].text.drain(offset..offset + chunk).collect();
                if want_text {
                    removed.extend_from_slice(&drained);
                }
                let end = offset + chunk;
                for mark in &mut self.marks {
                    if mark.point.line == line && mark.point.offset > offset {
                        mark.point.offset =
                            if mark.point.offset <= end { offset } else { mark.point.offset - chunk };
                    }
                }
                left -= chunk as u64;
                self.touch();
            }
            if left > 0 {
                if self.merge_next().is_err() {
                    let count = n - left;
                    trace!(target: "text.store", wanted = n, count, "delete hit buffer end");
                    return Ok(Deleted { text: want_text.then_some(removed), count, complete: false });
                }
                if want_text {
                    removed.push(b'\n');
                }
                left -= 1;
            }
        }
        Ok(Deleted { text: want_text.then_some(removed), count: n, complete: true })
    }

    /// Move the point back up to `want` characters, returning how far it got.
    fn step_back(&mut self, want: u64) -> u64 {
        let mut moved = 0;
        while moved < want {
            if self.point.offset > 0 {
                self.point.offset -= 1;
            } else if let Some(prev) = self.prev_line(self.point.line) {
                self.point = Point::new(prev, self.line_used(prev));
            } else {
                break;
            }
            moved += 1;
        }
        moved
    }

    // ---------------------------------------------------------------------
    // Regions
    // ---------------------------------------------------------------------

    /// Region between two points; `start` is the earlier, size positive.
    pub fn region_between(&self, a: Point, b: Point) -> Region {
        let (start, end) = if self.cmp_points(a, b) == std::cmp::Ordering::Greater {
            (b, a)
        } else {
            (a, b)
        };
        let size = (self.point_offset(end) - self.point_offset(start)) as i64;
        let mut line_count = 1;
        let mut cursor = start.line;
        while cursor != end.line {
            line_count += 1;
            cursor = self.next_line(cursor).expect("end point after start point");
        }
        Region { start, size, line_count }
    }

    /// Region spanning whole lines: the point's line plus `n - 1` more in the
    /// given direction (`n == 0` means "to end of buffer"). The trailing
    /// newline of the last spanned line is included when one exists.
    pub fn region_lines(&self, n: i64) -> Region {
        let bol = Point::new(self.point.line, 0);
        if n == 0 {
            let last = self.last_line();
            return self.region_between(bol, Point::new(last, self.line_used(last)));
        }
        let mut count = n.unsigned_abs();
        let mut edge = self.point.line;
        let forward = n > 0;
        while count > 1 {
            let step = if forward { self.next_line(edge) } else { self.prev_line(edge) };
            match step {
                Some(id) => edge = id,
                None => break,
            }
            count -= 1;
        }
        if forward {
            match self.next_line(edge) {
                Some(after) => self.region_between(bol, Point::new(after, 0)),
                None => self.region_between(bol, Point::new(edge, self.line_used(edge))),
            }
        } else {
            let from = Point::new(edge, 0);
            let to = match self.next_line(self.point.line) {
                Some(after) => Point::new(after, 0),
                None => Point::new(self.point.line, self.line_used(self.point.line)),
            };
            self.region_between(from, to)
        }
    }

    /// Copy a region's bytes without disturbing the store.
    pub fn extract_region(&self, region: &Region) -> Vec<u8> {
        let mut out = Vec::with_capacity(region.size.unsigned_abs() as usize);
        let mut left = region.size.unsigned_abs();
        let mut line = region.start.line;
        let mut offset = region.start.offset;
        while left > 0 {
            let text = self.line_text(line);
            let chunk = ((text.len() - offset) as u64).min(left) as usize;
            out.extend_from_slice(&text[offset..offset + chunk]);
            left -= chunk as u64;
            if left > 0 {
                out.push(b'\n');
                left -= 1;
                line = self.next_line(line).expect("region within buffer");
                offset = 0;
            }
        }
        out
    }

    // ---------------------------------------------------------------------
    // Consistency (exercised by tests and debug assertions)
    // ---------------------------------------------------------------------

    /// Walk the cycle both ways and cross-check the live-line bookkeeping.
    /// Panics on corruption.
    pub fn validate(&self) {
        let mut forward = 0usize;
        let mut cursor = self.cells[HEADER as usize].next;
        while cursor != HEADER {
            let cell = &self.cells[cursor as usize];
            assert!(cell.live, "dead line {cursor} linked into cycle");
            assert_eq!(
                self.cells[cell.next as usize].prev, cursor,
                "asymmetric link at line {cursor}"
            );
            forward += 1;
            assert!(forward <= self.cells.len(), "cycle does not close");
            cursor = cell.next;
        }
        assert_eq!(forward, self.line_count, "line_count drift");
        assert!(self.line_count >= 1, "store must keep one line");
        assert!(self.cell(self.point.line).live);
        assert!(self.point.offset <= self.line_used(self.point.line));
        for mark in &self.marks {
            assert!(self.cell(mark.point.line).live, "mark on dead line");
            assert!(mark.point.offset <= self.line_used(mark.point.line));
        }
    }
}
