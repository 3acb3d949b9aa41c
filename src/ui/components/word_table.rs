use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::widgets::{Block, Cell, Row, Table, Widget};

use wordpace::model::exercise::PreviousExercise;
use crate::ui::theme::Theme;

/// One unique word of the batch being typed.
pub struct CurrentWord<'a> {
    pub word: &'a str,
    pub wpm: f64,
    pub target_wpm: f64,
}

/// Side-by-side speeds for the finished batch and the current one.
pub struct WordTable<'a> {
    previous: &'a PreviousExercise,
    current: Vec<CurrentWord<'a>>,
    theme: &'a Theme,
}

impl<'a> WordTable<'a> {
    pub fn new(previous: &'a PreviousExercise, current: Vec<CurrentWord<'a>>, theme: &'a Theme) -> Self {
        Self {
            previous,
            current,
            theme,
        }
    }
}

impl Widget for WordTable<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let colors = &self.theme.colors;
        let halves = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);

        let header = |label: &'static str| {
            Row::new(vec![Cell::from(label), Cell::from("WPM"), Cell::from("Target")]).style(
                Style::default()
                    .fg(colors.accent())
                    .add_modifier(Modifier::BOLD),
            )
        };
        let widths = [
            Constraint::Min(10),
            Constraint::Length(8),
            Constraint::Length(8),
        ];

        let previous_rows: Vec<Row> = self
            .previous
            .words
            .iter()
            .map(|w| {
                let word = if w.is_highscore {
                    format!("{} *", w.word)
                } else {
                    w.word.clone()
                };
                Row::new(vec![
                    Cell::from(word),
                    Cell::from(format!("{:.1}", w.wpm))
                        .style(Style::default().fg(colors.wpm_color(w.wpm, w.target_wpm))),
                    Cell::from(format!("{:.1}", w.target_wpm)),
                ])
            })
            .collect();
        let title = if self.previous.words.is_empty() {
            " Previous ".to_string()
        } else {
            format!(" Previous ({}) ", self.previous.elapsed_time)
        };
        Table::new(previous_rows, widths)
            .header(header("Word"))
            .style(Style::default().fg(colors.fg()).bg(colors.bg()))
            .block(
                Block::bordered()
                    .title(title)
                    .border_style(Style::default().fg(colors.border())),
            )
            .column_spacing(1)
            .render(halves[0], buf);

        let current_rows: Vec<Row> = self
            .current
            .iter()
            .map(|w| {
                Row::new(vec![
                    Cell::from(w.word.to_string()),
                    Cell::from(format!("{:.1}", w.wpm))
                        .style(Style::default().fg(colors.wpm_color(w.wpm, w.target_wpm))),
                    Cell::from(format!("{:.1}", w.target_wpm)),
                ])
            })
            .collect();
        Table::new(current_rows, widths)
            .header(header("Word"))
            .style(Style::default().fg(colors.fg()).bg(colors.bg()))
            .block(
                Block::bordered()
                    .title(" Current ")
                    .border_style(Style::default().fg(colors.border())),
            )
            .column_spacing(1)
            .render(halves[1], buf);
    }
}
