use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Widget, Wrap},
};

use crate::session::SessionProgress;
use crate::util::format_clock;

const HORIZONTAL_MARGIN: u16 = 5;

/// Live view of a running capture session
pub struct CaptureView<'a> {
    pub progress: &'a SessionProgress,
}

impl Widget for &CaptureView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let progress = self.progress;

        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let dim_style = Style::default().add_modifier(Modifier::DIM);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);
        let warning_style = Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD);

        let content_height = 9;
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .constraints(
                [
                    Constraint::Length(area.height.saturating_sub(content_height) / 2),
                    Constraint::Length(2),
                    Constraint::Length(2),
                    Constraint::Length(3),
                    Constraint::Length(2),
                    Constraint::Min(0),
                ]
                .as_ref(),
            )
            .split(area);

        Paragraph::new(Span::styled(
            "⌨️  KEYSTROKE DYNAMICS ANALYZER",
            bold_style.fg(Color::Magenta),
        ))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

        let mut counter = vec![
            Span::styled(format!("{}", progress.keystrokes), bold_style.fg(Color::Green)),
            Span::raw(" keystrokes recorded"),
        ];
        if let Some(key) = progress.last_key.as_deref().filter(|k| !k.is_empty()) {
            counter.push(Span::styled(format!("   last: {key}"), dim_style));
        }
        Paragraph::new(Line::from(counter))
            .alignment(Alignment::Center)
            .render(chunks[2], buf);

        let label = format!(
            "{} elapsed / {} left",
            format_clock(progress.elapsed.as_secs_f64()),
            format_clock(progress.remaining().as_secs_f64())
        );
        Gauge::default()
            .block(Block::default().borders(Borders::ALL).title(" session "))
            .gauge_style(Style::default().fg(Color::Cyan))
            .ratio(progress.ratio())
            .label(label)
            .render(chunks[3], buf);

        let mut help = vec![Line::from(Span::styled(
            "press ESC to stop early / ctrl+c to cancel",
            italic_style,
        ))];
        if progress.log_actual_keys {
            help.push(Line::from(Span::styled(
                "actual keys are being logged",
                warning_style,
            )));
        }
        Paragraph::new(help)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(chunks[4], buf);
    }
}
