use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthChar;

use crate::workspace::trim_repo_prefix;

use super::app::App;
use super::picker::Picker;
use super::Mode;

const WORKSPACE_PALETTE: [u8; 7] = [81, 112, 178, 203, 75, 141, 214];

fn selected_style() -> Style {
    Style::default()
        .fg(Color::Black)
        .bg(Color::Cyan)
        .add_modifier(Modifier::BOLD)
}

fn dim() -> Style {
    Style::default().fg(Color::DarkGray)
}

/// Stable per-workspace header color.
fn workspace_color(name: &str) -> Color {
    let h: usize = name.chars().map(|c| c as usize).sum();
    Color::Indexed(WORKSPACE_PALETTE[h % WORKSPACE_PALETTE.len()])
}

/// Clip `s` to `width` terminal columns, marking the cut with `…`.
fn truncate_to_width(s: &str, width: usize) -> String {
    let total: usize = s.chars().filter_map(UnicodeWidthChar::width).sum();
    if total <= width {
        return s.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in s.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        used += w;
        out.push(ch);
    }
    out.push('…');
    out
}

/// Main render function
pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Min(0),    // Content
            Constraint::Length(4), // Status and help
        ])
        .split(f.area());

    render_title(f, chunks[0], app);
    render_main(f, chunks[1], app);
    render_status_bar(f, chunks[2], app);

    match app.mode() {
        Mode::Browse => {}
        Mode::Targets => render_targets_popup(f, f.area(), app),
        Mode::AddTarget => render_add_target_popup(f, f.area(), app),
        Mode::Templates => render_templates_popup(f, f.area(), app),
        Mode::Quick => render_quick_popup(f, f.area(), app),
    }
}

fn render_title(f: &mut Frame, area: Rect, app: &App) {
    let title = Paragraph::new(Line::from(vec![
        Span::styled(
            "echoshell",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("   remote: {}", app.target()), dim()),
    ]))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL));

    f.render_widget(title, area);
}

fn render_main(f: &mut Frame, area: Rect, app: &App) {
    let picker = app.picker();
    if picker.groups().is_empty() {
        let empty = Paragraph::new(if app.is_loading() {
            "Loading sessions..."
        } else {
            "No sessions"
        })
        .style(dim())
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
        f.render_widget(empty, area);
        return;
    }

    let left_width = (area.width / 3).clamp(34.min(area.width), 60);
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(left_width), Constraint::Min(0)])
        .split(area);

    render_workspaces(f, cols[0], picker);
    render_preview(f, cols[1], app);
}

/// Workspace headers, repo rows and session rows, plus the index of the
/// highlighted row.
fn workspace_lines(picker: &Picker) -> (Vec<Line<'static>>, usize) {
    let mut lines = Vec::new();
    let mut selected_line = 0;
    let active_ws = picker.current_workspace().to_string();
    let workspaces = picker.workspaces();

    for (wi, ws) in workspaces.iter().enumerate() {
        let header = format!("== {} == ({})", ws, picker.workspace_total(ws));
        let style = if *ws == active_ws {
            selected_style()
        } else {
            Style::default()
                .fg(workspace_color(ws))
                .add_modifier(Modifier::BOLD)
        };
        lines.push(Line::from(Span::styled(header, style)));

        for idx in picker.repo_indexes(ws) {
            let g = &picker.groups()[idx];
            let is_current = idx == picker.group_index();
            let repo_line = format!(" {} ({})", g.repo, g.sessions.len());
            if is_current && picker.selected_session().is_none() {
                selected_line = lines.len();
            }
            lines.push(Line::from(Span::styled(
                repo_line,
                if is_current {
                    selected_style()
                } else {
                    Style::default().fg(Color::Gray)
                },
            )));

            for (si, s) in g.sessions.iter().enumerate() {
                let mark = if s.attached { "*" } else { " " };
                let line = format!("   {} {}", mark, trim_repo_prefix(&g.repo, &s.name));
                let selected = is_current && si == picker.session_index();
                if selected {
                    selected_line = lines.len();
                }
                lines.push(Line::from(Span::styled(
                    line,
                    if selected {
                        selected_style()
                    } else {
                        Style::default().fg(Color::Gray)
                    },
                )));
            }
        }

        if wi + 1 != workspaces.len() {
            lines.push(Line::from(""));
        }
    }

    (lines, selected_line)
}

fn render_workspaces(f: &mut Frame, area: Rect, picker: &Picker) {
    let (lines, selected_line) = workspace_lines(picker);

    // Keep the highlighted row on screen.
    let visible = area.height.saturating_sub(2) as usize;
    let scroll = if visible > 0 && selected_line >= visible {
        selected_line + 1 - visible
    } else {
        0
    };

    let p = Paragraph::new(lines)
        .scroll((scroll as u16, 0))
        .block(Block::default().borders(Borders::ALL).title("Workspaces"));
    f.render_widget(p, area);
}

fn render_preview(f: &mut Frame, area: Rect, app: &App) {
    let picker = app.picker();
    let (Some(group), Some(session)) = (picker.current_group(), picker.selected_session()) else {
        let p = Paragraph::new("(no sessions)")
            .style(dim())
            .block(Block::default().borders(Borders::ALL).title("Preview"));
        f.render_widget(p, area);
        return;
    };

    let title = format!(
        "Preview: {} / {}",
        group.name,
        trim_repo_prefix(&group.repo, &session.name)
    );
    let block = Block::default().borders(Borders::ALL).title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(inner);

    let width = rows[0].width as usize;
    let details = vec![
        Line::from(truncate_to_width(&format!("workdir: {}", session.workdir), width)),
        Line::from(format!(
            "windows: {}  attached: {}",
            session.windows,
            if session.attached { "yes" } else { "no" }
        )),
    ];
    f.render_widget(Paragraph::new(details), rows[0]);

    let text = match app.preview_text() {
        t if t.trim().is_empty() => "(select a session)",
        t => t,
    };
    // The newest output is at the bottom, so keep the tail when clipping.
    let height = rows[1].height.saturating_sub(2) as usize;
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(height.max(1));
    let width = rows[1].width.saturating_sub(2) as usize;
    let lines: Vec<Line> = all[start..]
        .iter()
        .map(|l| Line::from(truncate_to_width(l, width)))
        .collect();

    let p = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(dim())
            .title(Span::styled("terminal preview", dim())),
    );
    f.render_widget(p, rows[1]);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status = vec![
        Span::styled("status: ", Style::default().fg(Color::Blue)),
        Span::raw(app.status().to_string()),
    ];
    if let Some(at) = app.last_refresh() {
        status.push(Span::styled(
            format!("   (updated {})", at.format("%H:%M:%S")),
            dim(),
        ));
    }

    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Cyan));
    let help = match app.mode() {
        Mode::Browse => vec![
            key("tab/h/l"),
            Span::raw(":repo  "),
            key("1-9"),
            Span::raw(":jump  "),
            key("j/k"),
            Span::raw(":session  "),
            key("enter"),
            Span::raw(":attach  "),
            key("n"),
            Span::raw(":new  "),
            key("d"),
            Span::raw(":destroy  "),
            key("t"),
            Span::raw(":target  "),
            key("r/R"),
            Span::raw(":refresh  "),
            key("u"),
            Span::raw(":update  "),
            key("q"),
            Span::raw(":quit"),
        ],
        Mode::AddTarget => vec![
            key("enter"),
            Span::raw(":confirm  "),
            key("esc"),
            Span::raw(":cancel"),
        ],
        Mode::Targets | Mode::Templates | Mode::Quick => vec![
            key("j/k"),
            Span::raw(":navigate  "),
            key("enter"),
            Span::raw(":select  "),
            key("esc"),
            Span::raw(":back  "),
            key("q"),
            Span::raw(":quit"),
        ],
    };

    let p = Paragraph::new(vec![Line::from(status), Line::from(help)])
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(p, area);
}

/// Heading, one row per item, and a highlighted selection.
fn list_popup(f: &mut Frame, area: Rect, title: &str, heading: String, items: &[String], selected: usize) {
    let popup_area = centered_rect(70, 60, area);
    f.render_widget(Clear, popup_area);

    let mut lines: Vec<Line> = vec![
        Line::from(Span::styled(
            heading,
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    for (i, item) in items.iter().enumerate() {
        let style = if i == selected {
            selected_style()
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(format!(" {item} "), style)));
    }
    if items.is_empty() {
        lines.push(Line::from(Span::styled("(nothing to pick)", dim())));
    }

    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(title.to_string()));
    f.render_widget(p, popup_area);
}

fn render_targets_popup(f: &mut Frame, area: Rect, app: &App) {
    list_popup(
        f,
        area,
        "Targets",
        "Select Remote Target:".to_string(),
        app.targets(),
        app.target_idx(),
    );
}

fn render_templates_popup(f: &mut Frame, area: Rect, app: &App) {
    let labels: Vec<String> = app.templates().iter().map(|t| t.label.clone()).collect();
    list_popup(
        f,
        area,
        "New Session",
        "New Session Command:".to_string(),
        &labels,
        app.template_idx(),
    );
}

fn render_quick_popup(f: &mut Frame, area: Rect, app: &App) {
    let rows: Vec<String> = app
        .quick()
        .iter()
        .map(|c| format!("{}  ({}/{})", c.session.name, c.workspace, c.repo))
        .collect();
    list_popup(
        f,
        area,
        "Quick Attach",
        format!("Quick Attach: {}", app.quick_query()),
        &rows,
        app.quick_idx(),
    );
}

fn render_add_target_popup(f: &mut Frame, area: Rect, app: &App) {
    let popup_area = centered_rect(60, 25, area);
    f.render_widget(Clear, popup_area);

    let lines = vec![
        Line::from(Span::styled(
            "Enter new remote (e.g., user@host):",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled(app.target_input().to_string(), Style::default().fg(Color::LightBlue)),
            Span::styled("▊", Style::default().fg(Color::White)),
        ]),
    ];

    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Add Target"));
    f.render_widget(p, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    let vertical = popup_layout[1];

    let popup_layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical);

    popup_layout[1]
}
