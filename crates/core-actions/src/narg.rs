//! The universal-argument automaton.
//!
//! Pure state machine over the inputs `^U`, `^_`, `-`, digits, and anything
//! else. The dispatcher feeds keys; the machine answers with "keep going"
//! or the finalized signed argument plus the key that terminated it. The
//! `^U` value sequence is 2, 0, 3, 4, …; `^_` counts -1, -2, ….
//!
//! The machine is total: every (state, input) pair is covered, which the
//! exhaustive table test below pins down.

use core_keymap::KeyCode;

/// Classified input to the automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NargInput {
    Univ,
    Neg,
    Minus,
    Digit(u8),
    Other,
}

impl NargInput {
    /// Classify a key against the configured `universalArg` and
    /// `negativeArg` bindings.
    pub fn classify(key: KeyCode, univ: KeyCode, neg: KeyCode) -> NargInput {
        if key == univ {
            NargInput::Univ
        } else if key == neg {
            NargInput::Neg
        } else if key == KeyCode::plain(b'-') {
            NargInput::Minus
        } else if let Some(c) = key.literal_char().filter(u8::is_ascii_digit) {
            NargInput::Digit(c - b'0')
        } else {
            NargInput::Other
        }
    }
}

/// Result of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NargStep {
    /// Still collecting; the current provisional value is shown to the
    /// user.
    Pending(i64),
    /// Finalized: the argument and the key to execute next.
    Done(i64),
}

// States 1-5 of the decision table; state 0 is "machine not entered".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    UnivOnce,
    UnivTwice,
    Signed,
    Digits,
    Adjust,
}

#[derive(Debug)]
pub struct NargMachine {
    state: State,
    /// Magnitude; the sign lives in `neg`.
    n: i64,
    neg: bool,
}

impl NargMachine {
    /// Enter the machine on `^U`.
    pub fn universal() -> NargMachine {
        NargMachine { state: State::UnivOnce, n: 2, neg: false }
    }

    /// Enter the machine on `^_`.
    pub fn negative() -> NargMachine {
        NargMachine { state: State::Signed, n: 1, neg: true }
    }

    pub fn value(&self) -> i64 {
        if self.neg { -self.n } else { self.n }
    }

    /// Feed one classified input.
    pub fn step(&mut self, input: NargInput) -> NargStep {
        match (self.state, input) {
            (State::UnivOnce, NargInput::Univ) => {
                self.n = 0;
                self.state = State::UnivTwice;
            }
            (State::UnivTwice, NargInput::Univ) => {
                self.n = 3;
                self.state = State::Adjust;
            }
            (State::UnivOnce | State::UnivTwice, NargInput::Minus) => {
                self.neg = true;
                self.n = 1;
                self.state = State::Signed;
            }
            (State::UnivOnce | State::UnivTwice | State::Signed, NargInput::Digit(d)) => {
                self.n = i64::from(d);
                self.state = State::Digits;
            }
            (State::Digits, NargInput::Digit(d)) => {
                self.n = self.n.saturating_mul(10).saturating_add(i64::from(d));
            }
            (State::Signed | State::Digits | State::Adjust, NargInput::Univ) => {
                self.increment();
                self.state = State::Adjust;
            }
            (_, NargInput::Neg) => {
                self.decrement();
                self.state = State::Adjust;
            }
            // '-' and digits in the adjust states terminate and the key
            // self-inserts; any other key executes.
            (State::Signed | State::Digits | State::Adjust, NargInput::Minus)
            | (State::Adjust, NargInput::Digit(_))
            | (_, NargInput::Other) => return NargStep::Done(self.value()),
        }
        NargStep::Pending(self.value())
    }

    fn increment(&mut self) {
        if !self.neg {
            self.n += 1;
        } else {
            self.n -= 1;
            if self.n == 0 {
                self.neg = false;
            }
        }
    }

    fn decrement(&mut self) {
        if self.neg {
            self.n += 1;
        } else {
            self.n -= 1;
            if self.n < 0 {
                self.n = 1;
                self.neg = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use NargInput as I;

    fn feed(start: NargMachine, inputs: &[I]) -> (NargMachine, Option<i64>) {
        let mut machine = start;
        for input in inputs {
            if let NargStep::Done(n) = machine.step(*input) {
                return (machine, Some(n));
            }
        }
        (machine, None)
    }

    #[test]
    fn universal_sequence_is_2_0_3_4() {
        let mut m = NargMachine::universal();
        assert_eq!(m.value(), 2);
        assert_eq!(m.step(I::Univ), NargStep::Pending(0));
        assert_eq!(m.step(I::Univ), NargStep::Pending(3));
        assert_eq!(m.step(I::Univ), NargStep::Pending(4));
        assert_eq!(m.step(I::Univ), NargStep::Pending(5));
    }

    #[test]
    fn negative_counts_down() {
        let mut m = NargMachine::negative();
        assert_eq!(m.value(), -1);
        assert_eq!(m.step(I::Neg), NargStep::Pending(-2));
        assert_eq!(m.step(I::Neg), NargStep::Pending(-3));
        assert_eq!(m.step(I::Univ), NargStep::Pending(-2));
    }

    #[test]
    fn digits_build_numbers() {
        let (_, done) = feed(NargMachine::universal(), &[I::Digit(4), I::Digit(2), I::Other]);
        assert_eq!(done, Some(42));
        // Sign then digits.
        let (_, done) =
            feed(NargMachine::universal(), &[I::Minus, I::Digit(7), I::Other]);
        assert_eq!(done, Some(-7));
    }

    #[test]
    fn other_key_terminates_immediately() {
        let (_, done) = feed(NargMachine::universal(), &[I::Other]);
        assert_eq!(done, Some(2));
        let (_, done) = feed(NargMachine::negative(), &[I::Other]);
        assert_eq!(done, Some(-1));
    }

    #[test]
    fn minus_in_late_states_terminates() {
        let (_, done) = feed(NargMachine::universal(), &[I::Digit(3), I::Minus]);
        assert_eq!(done, Some(3));
        let (_, done) = feed(NargMachine::negative(), &[I::Minus]);
        assert_eq!(done, Some(-1));
    }

    #[test]
    fn digit_after_adjust_terminates() {
        // ^U ^U ^U puts the machine in the adjust state; a digit then
        // terminates with the built value.
        let (_, done) =
            feed(NargMachine::universal(), &[I::Univ, I::Univ, I::Digit(9)]);
        assert_eq!(done, Some(3));
    }

    #[test]
    fn neg_crossing_zero_flips_sign() {
        let mut m = NargMachine::universal();
        // n=2; ^_ -> 1, ^_ -> 0... the table decrements through zero to -1.
        assert_eq!(m.step(I::Neg), NargStep::Pending(1));
        assert_eq!(m.step(I::Neg), NargStep::Pending(0));
        assert_eq!(m.step(I::Neg), NargStep::Pending(-1));
        assert_eq!(m.step(I::Univ), NargStep::Pending(0));
        assert_eq!(m.step(I::Univ), NargStep::Pending(1));
    }

    #[test]
    fn machine_is_total() {
        // Every state reachable, every input defined: walk all pairs.
        let reach: Vec<(&str, fn() -> NargMachine, Vec<I>)> = vec![
            ("univ-once", NargMachine::universal, vec![]),
            ("univ-twice", NargMachine::universal, vec![I::Univ]),
            ("signed", NargMachine::negative, vec![]),
            ("digits", NargMachine::universal, vec![I::Digit(5)]),
            ("adjust", NargMachine::universal, vec![I::Univ, I::Univ]),
        ];
        let inputs = [I::Univ, I::Neg, I::Minus, I::Digit(5), I::Other];
        for (name, enter, prefix) in reach {
            for input in inputs {
                let (mut machine, done) = feed(enter(), &prefix);
                assert!(done.is_none(), "{name} prefix terminated early");
                // Must not panic, and must produce a defined step.
                let _ = machine.step(input);
            }
        }
    }

    #[test]
    fn classify_inputs() {
        let univ = KeyCode::ctrl(b'U');
        let neg = KeyCode::ctrl(b'_');
        assert_eq!(I::classify(univ, univ, neg), I::Univ);
        assert_eq!(I::classify(neg, univ, neg), I::Neg);
        assert_eq!(I::classify(KeyCode::plain(b'-'), univ, neg), I::Minus);
        assert_eq!(I::classify(KeyCode::plain(b'7'), univ, neg), I::Digit(7));
        assert_eq!(I::classify(KeyCode::plain(b'x'), univ, neg), I::Other);
    }
}
