//! Rendering for both selector phases.

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Position, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::tui::app::{App, Phase, ResolveMode, ResolveState};
use crate::tui::styles::Styles;
use crate::vars::is_var_char;

pub fn draw(frame: &mut Frame, app: &App) {
    match app.phase {
        Phase::Pick => draw_pick(frame, app),
        Phase::Resolve => draw_resolve(frame, app),
    }
}

// ----------------------------------------------------------------------
// Phase 1: snippet list
// ----------------------------------------------------------------------

fn draw_pick(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6), // preview
            Constraint::Length(1), // divider
            Constraint::Min(1),    // list
            Constraint::Length(1), // divider
            Constraint::Length(1), // info
            Constraint::Length(1), // input
        ])
        .split(frame.area());

    draw_preview(frame, app, chunks[0]);
    draw_divider(frame, &app.styles, chunks[1]);
    draw_snippet_list(frame, app, chunks[2]);
    draw_divider(frame, &app.styles, chunks[3]);

    let info = Line::from(vec![
        Span::styled(
            format!("  {}/{}", app.filtered().len(), app.snippets().len()),
            app.styles.dim,
        ),
        Span::styled(" \u{2022} Ctrl+O open \u{2022} ESC exit", app.styles.dim),
    ]);
    frame.render_widget(Paragraph::new(info), chunks[4]);

    draw_input(frame, app, &app.query, chunks[5]);
}

fn draw_preview(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines: Vec<Line> = Vec::new();
    if let Some(snippet) = app.snippet_at_cursor() {
        let row_idx = app.filtered()[app.cursor];
        let location = format!(
            "{}/{}",
            app.row_folder(row_idx),
            app.row_stem(row_idx)
        );
        lines.push(Line::from(Span::styled(location, app.styles.path)));
        lines.push(Line::from(Span::styled(
            snippet.header.clone(),
            app.styles.preview_header,
        )));
        if !snippet.description.is_empty() {
            lines.push(Line::from(Span::styled(
                first_line(&snippet.description).to_string(),
                app.styles.desc,
            )));
        }
        lines.push(Line::default());
        let remaining = (area.height as usize).saturating_sub(lines.len());
        for cmd_line in snippet.command.lines().take(remaining) {
            lines.push(Line::from(Span::styled(
                cmd_line.to_string(),
                app.styles.command,
            )));
        }
    }
    frame.render_widget(Paragraph::new(lines), area);
}

fn draw_snippet_list(frame: &mut Frame, app: &App, area: Rect) {
    let total = app.filtered().len();
    let (start, end) = scroll_window(app.cursor, total, area.height as usize, app.offset);

    let gap = " ".repeat(app.columns.gap);
    let mut lines: Vec<Line> = Vec::with_capacity(end - start);
    for pos in start..end {
        let row_idx = app.filtered()[pos];
        let snippet = &app.snippets()[row_idx];
        let selected = pos == app.cursor;

        let location = format!("{}/{}", app.row_folder(row_idx), app.row_stem(row_idx));
        let head = truncate(
            &format!("{} {}", location, snippet.header),
            app.columns.header,
        );
        let head = format!("{head:<width$}", width = app.columns.header);
        let desc = truncate(first_line(&snippet.description), app.columns.desc);
        let desc = format!("{desc:<width$}", width = app.columns.desc);
        let cmd_width = command_width(app, area.width as usize);
        let cmd = truncate(first_line(&snippet.command), cmd_width);

        let style = |s| {
            if selected {
                app.styles.selected(s)
            } else {
                s
            }
        };
        let marker = if selected {
            Span::styled("\u{25b6} ", app.styles.cursor)
        } else {
            Span::raw("  ")
        };
        lines.push(Line::from(vec![
            marker,
            Span::styled(head, style(app.styles.header)),
            Span::styled(gap.clone(), style(ratatui::style::Style::default())),
            Span::styled(desc, style(app.styles.desc)),
            Span::styled(gap.clone(), style(ratatui::style::Style::default())),
            Span::styled(cmd, style(app.styles.command)),
        ]));
    }
    frame.render_widget(Paragraph::new(lines), area);
}

fn command_width(app: &App, total_width: usize) -> usize {
    let used = app.columns.header + app.columns.gap * 2 + app.columns.desc + 4;
    let available = total_width.saturating_sub(used);
    if available > 0 && available < app.columns.command {
        available
    } else {
        app.columns.command
    }
}

// ----------------------------------------------------------------------
// Phase 2: variable resolution
// ----------------------------------------------------------------------

fn draw_resolve(frame: &mut Frame, app: &App) {
    let Some(rs) = app.resolve.as_ref() else {
        return;
    };

    let header_lines = resolve_header_lines(rs, &app.styles);
    let header_height = header_lines.len() as u16;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(header_height),
            Constraint::Length(1), // divider
            Constraint::Min(1),    // candidates
            Constraint::Length(1), // divider
            Constraint::Length(1), // info
            Constraint::Length(1), // input
        ])
        .split(frame.area());

    frame.render_widget(Paragraph::new(header_lines), chunks[0]);
    draw_divider(frame, &app.styles, chunks[1]);
    draw_candidates(frame, app, rs, chunks[2]);
    draw_divider(frame, &app.styles, chunks[3]);

    let mut info_spans = Vec::new();
    if rs.mode == ResolveMode::Select {
        info_spans.push(Span::styled(
            format!("  {} options \u{2022} ", rs.filtered.len()),
            app.styles.dim,
        ));
    } else {
        info_spans.push(Span::styled("  ", app.styles.dim));
    }
    info_spans.push(Span::styled(
        "Tab fill \u{2022} ESC back \u{2022} Enter accept",
        app.styles.dim,
    ));
    frame.render_widget(Paragraph::new(Line::from(info_spans)), chunks[4]);

    draw_input(frame, app, &rs.input, chunks[5]);
}

/// Progress header: the command with resolved values substituted and
/// the current variable highlighted, then one status line per variable.
fn resolve_header_lines<'a>(rs: &'a ResolveState, styles: &Styles) -> Vec<Line<'a>> {
    let slots = rs.resolution.slots();
    let current = rs.resolution.current_index();

    let mut lines = highlight_template(&rs.snippet.command, rs, styles);

    for (i, slot) in slots.iter().enumerate() {
        let line = if slot.resolved {
            Line::from(vec![
                Span::styled("\u{2713} ", styles.command),
                Span::styled(format!("${}", slot.name), styles.dim),
                Span::raw(" = "),
                Span::styled(slot.value.clone(), styles.header),
            ])
        } else if i == current {
            Line::from(Span::styled(format!("\u{25b6} ${}", slot.name), styles.cursor))
        } else {
            Line::from(Span::styled(format!("\u{25cb} ${}", slot.name), styles.dim))
        };
        lines.push(line);
    }

    if let Some(ctx) = &rs.ctx {
        if let Some(custom) = &ctx.custom_header {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(custom.clone(), styles.header)));
        }
    }
    if let Some(err) = &rs.shell_error {
        lines.push(Line::from(Span::styled(
            format!("source command failed: {err}"),
            styles.dim,
        )));
    }

    lines
}

/// Style `$name` occurrences in the template: resolved names show their
/// value, the current one is highlighted, the rest stay as-is.
fn highlight_template<'a>(template: &'a str, rs: &ResolveState, styles: &Styles) -> Vec<Line<'a>> {
    let slots = rs.resolution.slots();
    let current = rs.resolution.current_index();

    let mut lines = Vec::new();
    for text_line in template.lines() {
        let bytes = text_line.as_bytes();
        let mut spans: Vec<Span> = Vec::new();
        let mut seg = 0;
        let mut i = 0;
        while i < bytes.len() {
            let escaped = i > 0 && bytes[i - 1] == b'\\';
            if bytes[i] != b'$' || escaped || i + 1 >= bytes.len() {
                i += 1;
                continue;
            }
            let mut j = i + 1;
            while j < bytes.len() && is_var_char(bytes[j], j == i + 1) {
                j += 1;
            }
            if j > i + 1 {
                let name = &text_line[i + 1..j];
                if let Some(pos) = slots.iter().position(|slot| slot.name == name) {
                    let slot = &slots[pos];
                    let replacement = if slot.resolved {
                        Some(Span::styled(slot.value.clone(), styles.header))
                    } else if pos == current {
                        Some(Span::styled(format!("${name}"), styles.cursor))
                    } else {
                        None
                    };
                    if let Some(span) = replacement {
                        spans.push(Span::raw(&text_line[seg..i]));
                        spans.push(span);
                        seg = j;
                    }
                }
            }
            i = j.max(i + 1);
        }
        spans.push(Span::raw(&text_line[seg..]));
        lines.push(Line::from(spans));
    }
    lines
}

fn draw_candidates(frame: &mut Frame, app: &App, rs: &ResolveState, area: Rect) {
    match rs.mode {
        ResolveMode::Waiting => {
            frame.render_widget(
                Paragraph::new(Line::from(Span::styled(
                    "  running source command\u{2026}",
                    app.styles.dim,
                ))),
                area,
            );
        }
        ResolveMode::Input => {}
        ResolveMode::Select => {
            let total = rs.filtered.len();
            let height = (area.height as usize).min(10).max(1);
            let (start, end) = scroll_window(rs.cursor, total, height, rs.offset);
            let mut lines = Vec::with_capacity(end - start);
            for pos in start..end {
                let choice = &rs.choices[rs.filtered[pos]];
                if pos == rs.cursor {
                    lines.push(Line::from(vec![
                        Span::styled("\u{25b6} ", app.styles.cursor),
                        Span::styled(
                            choice.display.clone(),
                            app.styles.selected(app.styles.command),
                        ),
                    ]));
                } else {
                    lines.push(Line::from(vec![
                        Span::raw("  "),
                        Span::styled(choice.display.clone(), app.styles.command),
                    ]));
                }
            }
            frame.render_widget(Paragraph::new(lines), area);
        }
    }
}

// ----------------------------------------------------------------------
// Shared pieces
// ----------------------------------------------------------------------

fn draw_divider(frame: &mut Frame, styles: &Styles, area: Rect) {
    let line = "\u{2500}".repeat(area.width as usize);
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(line, styles.divider))),
        area,
    );
}

fn draw_input(frame: &mut Frame, app: &App, value: &str, area: Rect) {
    let prompt = Line::from(vec![
        Span::styled("\u{276f} ", app.styles.cursor),
        Span::raw(value.to_string()),
    ]);
    frame.render_widget(Paragraph::new(prompt), area);
    let cursor_x = area.x + 2 + value.chars().count() as u16;
    frame.set_cursor_position(Position::new(cursor_x.min(area.right()), area.y));
}

/// Visible range of a scrollable list, keeping the cursor inside.
fn scroll_window(cursor: usize, total: usize, height: usize, offset: usize) -> (usize, usize) {
    if total == 0 || height == 0 {
        return (0, 0);
    }
    let mut offset = offset;
    if cursor < offset {
        offset = cursor;
    }
    if cursor >= offset + height {
        offset = cursor + 1 - height;
    }
    offset = offset.min(total.saturating_sub(height));
    let start = offset;
    let end = (start + height).min(total);
    (start, end)
}

/// Truncate with an ellipsis, byte-safe for ASCII-heavy command text.
fn truncate(text: &str, max: usize) -> String {
    if max <= 3 || text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max - 3).collect();
    format!("{kept}...")
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}
