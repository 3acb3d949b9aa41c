use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Widget};

use crate::ui::theme::Theme;

/// Cursor over the lesson list shown in the sidebar.
#[derive(Clone, Debug, Default)]
pub struct LessonMenuState {
    pub selected: usize,
}

impl LessonMenuState {
    pub fn next(&mut self, len: usize) {
        if len > 0 {
            self.selected = (self.selected + 1) % len;
        }
    }

    pub fn prev(&mut self, len: usize) {
        if len == 0 {
            return;
        }
        if self.selected > 0 {
            self.selected -= 1;
        } else {
            self.selected = len - 1;
        }
    }

    pub fn clamp(&mut self, len: usize) {
        self.selected = self.selected.min(len.saturating_sub(1));
    }
}

pub struct LessonMenu<'a> {
    titles: Vec<(&'a str, bool)>,
    selected: usize,
    active: Option<usize>,
    theme: &'a Theme,
}

impl<'a> LessonMenu<'a> {
    /// `titles` pairs each lesson title with whether it is a custom lesson.
    pub fn new(
        titles: Vec<(&'a str, bool)>,
        state: &LessonMenuState,
        active: Option<usize>,
        theme: &'a Theme,
    ) -> Self {
        Self {
            titles,
            selected: state.selected,
            active,
            theme,
        }
    }
}

impl Widget for LessonMenu<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;

        let block = Block::bordered()
            .title(" Lessons ")
            .border_style(Style::default().fg(colors.border_focused()))
            .style(Style::default().bg(colors.bg()));
        let inner = block.inner(area);
        block.render(area, buf);

        let visible = inner.height as usize;
        let offset = (self.selected + 1).saturating_sub(visible);

        let lines: Vec<Line> = self
            .titles
            .iter()
            .enumerate()
            .skip(offset)
            .take(visible)
            .map(|(i, (title, custom))| {
                let is_selected = i == self.selected;
                let indicator = if is_selected { ">" } else { " " };
                let marker = if Some(i) == self.active { "*" } else { " " };
                let suffix = if *custom { " (custom)" } else { "" };
                let style = if is_selected {
                    Style::default()
                        .fg(colors.accent())
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(colors.fg())
                };
                Line::from(Span::styled(format!("{indicator}{marker}{title}{suffix}"), style))
            })
            .collect();

        Paragraph::new(lines).render(inner, buf);
    }
}
