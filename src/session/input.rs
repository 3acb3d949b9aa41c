/// What a change to the typed buffer amounted to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputStatus {
    /// Change was dropped (leading space before a text that has none).
    Ignored,
    /// Buffer is still a prefix of the text.
    Typing,
    /// Buffer diverged from the text.
    Wrong,
    /// Text was reproduced, but a mistake was made on the way.
    Retry,
    /// Text was reproduced cleanly and is ready to be evaluated.
    Complete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputUpdate {
    pub status: InputStatus,
    /// Character index newly confirmed as correct, if any.
    pub confirmed: Option<usize>,
}

impl InputUpdate {
    fn ignored() -> Self {
        Self {
            status: InputStatus::Ignored,
            confirmed: None,
        }
    }
}

/// Typed text for the current exercise.
#[derive(Clone, Debug, Default)]
pub struct InputBuffer {
    target: String,
    value: String,
    had_error: bool,
}

impl InputBuffer {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            value: String::new(),
            had_error: false,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn is_wrong(&self) -> bool {
        !self.target.starts_with(&self.value)
    }

    pub fn reset(&mut self) {
        self.value.clear();
        self.had_error = false;
    }

    /// Replace the whole buffer, as a text field would on change.
    pub fn set_value(&mut self, value: &str) -> InputUpdate {
        if value == " " && !self.target.starts_with(' ') {
            return InputUpdate::ignored();
        }

        let wrong = !self.target.starts_with(value);
        let len = value.chars().count();
        let grew = len > self.value.chars().count();
        let confirmed = (!wrong && grew).then(|| len - 1);

        if value == self.target {
            self.value.clear();
            let status = if self.had_error {
                self.had_error = false;
                InputStatus::Retry
            } else {
                InputStatus::Complete
            };
            return InputUpdate { status, confirmed };
        }

        if value.is_empty() {
            self.had_error = false;
        }
        self.value = value.to_string();
        if wrong {
            self.had_error = true;
        }
        InputUpdate {
            status: if wrong {
                InputStatus::Wrong
            } else {
                InputStatus::Typing
            },
            confirmed,
        }
    }

    pub fn process_char(&mut self, ch: char) -> InputUpdate {
        let mut next = self.value.clone();
        next.push(ch);
        self.set_value(&next)
    }

    pub fn process_backspace(&mut self) -> InputUpdate {
        let mut next = self.value.clone();
        if next.pop().is_none() {
            return InputUpdate::ignored();
        }
        self.set_value(&next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_str(buf: &mut InputBuffer, s: &str) -> Vec<InputUpdate> {
        s.chars().map(|c| buf.process_char(c)).collect()
    }

    #[test]
    fn leading_space_is_ignored() {
        let mut buf = InputBuffer::new("the cat");
        assert_eq!(buf.process_char(' ').status, InputStatus::Ignored);
        assert_eq!(buf.value(), "");

        let mut spaced = InputBuffer::new(" the");
        assert_eq!(spaced.process_char(' ').status, InputStatus::Typing);
    }

    #[test]
    fn correct_prefix_confirms_last_index() {
        let mut buf = InputBuffer::new("ab");
        let updates = type_str(&mut buf, "a");
        assert_eq!(updates[0].confirmed, Some(0));
        assert_eq!(updates[0].status, InputStatus::Typing);

        let done = buf.process_char('b');
        assert_eq!(done.status, InputStatus::Complete);
        assert_eq!(done.confirmed, Some(1));
        assert_eq!(buf.value(), "");
    }

    #[test]
    fn mistake_forces_retry() {
        let mut buf = InputBuffer::new("abc");
        type_str(&mut buf, "ax");
        assert!(buf.had_error());
        assert!(buf.is_wrong());

        let fixed = buf.process_backspace();
        assert_eq!(fixed.status, InputStatus::Typing);
        assert_eq!(fixed.confirmed, None);
        assert!(buf.had_error(), "error sticks until the buffer empties");

        buf.process_char('b');
        assert_eq!(buf.process_char('c').status, InputStatus::Retry);
        assert!(!buf.had_error());
    }

    #[test]
    fn clearing_buffer_forgives_error() {
        let mut buf = InputBuffer::new("ab");
        buf.process_char('z');
        buf.process_backspace();
        assert!(!buf.had_error());
        type_str(&mut buf, "a");
        assert_eq!(buf.process_char('b').status, InputStatus::Complete);
    }

    #[test]
    fn reset_clears_everything() {
        let mut buf = InputBuffer::new("abc");
        type_str(&mut buf, "ax");
        buf.reset();
        assert_eq!(buf.value(), "");
        assert!(!buf.had_error());
        assert_eq!(buf.process_backspace().status, InputStatus::Ignored);
    }
}
