use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Widget, Wrap};

use crate::ui::theme::Theme;

pub const PLACEHOLDER: &str = "Re-type if failed, press <TAB> or <ESC> to reset";

pub struct TypingArea<'a> {
    text: &'a str,
    input: &'a str,
    is_wrong: bool,
    theme: &'a Theme,
}

impl<'a> TypingArea<'a> {
    pub fn new(text: &'a str, input: &'a str, is_wrong: bool, theme: &'a Theme) -> Self {
        Self {
            text,
            input,
            is_wrong,
            theme,
        }
    }
}

/// Number of leading characters of `text` that `input` reproduces.
fn matched_prefix(text: &str, input: &str) -> usize {
    text.chars()
        .zip(input.chars())
        .take_while(|(a, b)| a == b)
        .count()
}

impl Widget for TypingArea<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(3), Constraint::Length(3)])
            .split(area);

        let matched = matched_prefix(self.text, self.input);
        let typed = self.input.chars().count();
        let spans: Vec<Span> = self
            .text
            .chars()
            .enumerate()
            .map(|(i, ch)| {
                let style = if i < matched {
                    Style::default().fg(colors.text_correct())
                } else if i < typed {
                    Style::default()
                        .fg(colors.text_incorrect())
                        .add_modifier(Modifier::UNDERLINED)
                } else {
                    Style::default().fg(colors.text_pending())
                };
                Span::styled(ch.to_string(), style)
            })
            .collect();

        let text_block = Block::bordered()
            .border_style(Style::default().fg(colors.border()))
            .style(Style::default().bg(colors.bg()));
        Paragraph::new(Line::from(spans))
            .block(text_block)
            .wrap(Wrap { trim: false })
            .render(layout[0], buf);

        let mut input_style = Style::default().fg(colors.input_fg()).bg(colors.bg());
        if self.is_wrong {
            input_style = input_style.bg(colors.input_wrong_bg());
        }
        let content = if self.input.is_empty() {
            Line::from(Span::styled(
                PLACEHOLDER,
                Style::default().fg(colors.placeholder()),
            ))
        } else {
            Line::from(Span::raw(self.input))
        };
        let border = if self.is_wrong {
            colors.error()
        } else {
            colors.border_focused()
        };
        Paragraph::new(content)
            .style(input_style)
            .block(Block::bordered().border_style(Style::default().fg(border)))
            .render(layout[1], buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width)
            .map(|x| buf[(x, y)].symbol().to_string())
            .collect()
    }

    #[test]
    fn prefix_matching() {
        assert_eq!(matched_prefix("the cat", "the"), 3);
        assert_eq!(matched_prefix("the cat", "tha"), 2);
        assert_eq!(matched_prefix("the", ""), 0);
    }

    #[test]
    fn renders_placeholder_when_empty() {
        let theme = Theme::default();
        let area = Rect::new(0, 0, 60, 6);
        let mut buf = Buffer::empty(area);
        TypingArea::new("the cat", "", false, &theme).render(area, &mut buf);
        assert!(row(&buf, 1).contains("the cat"));
        assert!(row(&buf, 4).contains("Re-type if failed"));
    }

    #[test]
    fn wrong_input_marks_background() {
        let theme = Theme::default();
        let area = Rect::new(0, 0, 40, 6);
        let mut buf = Buffer::empty(area);
        TypingArea::new("the", "tx", true, &theme).render(area, &mut buf);
        assert!(row(&buf, 4).contains("tx"));
        assert_eq!(buf[(1, 4)].bg, theme.colors.input_wrong_bg());
        assert_eq!(buf[(1, 1)].fg, theme.colors.text_correct());
        assert_eq!(buf[(2, 1)].fg, theme.colors.text_incorrect());
    }
}
