use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Tabs, Wrap};
use ratatui::Frame;
use strum::IntoEnumIterator;

use crate::app::state::{
    AppState, CheckoutField, CheckoutOverlay, EditFieldOverlay, FormOverlay, OverlayState,
    StatusLevel,
};
use crate::app::table::{truncate, RowMarks, TableSnapshot};
use crate::config::Palette;
use crate::highlight::{highlight_spans, search_regex};
use crate::model::ResourceKind;
use crate::view::ALL;

const KEY_HINTS: &str =
    "j/k rows  h/l column  [/] page  / search  f/F filter  o sort  e edit  s save  d delete  a add  c checkout  ? help  q quit";

pub fn draw_app(frame: &mut Frame, state: &AppState, palette: &Palette, in_flight: usize) {
    let inventory = state.tab() == ResourceKind::Inventory;
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(if inventory { 2 } else { 1 }),
            Constraint::Min(5),
            Constraint::Length(2),
        ])
        .split(frame.size());

    render_tabs(frame, vertical[0], state, palette, in_flight);
    render_filter_bar(frame, vertical[1], state, palette);

    let snapshot = state.snapshot();
    render_table(frame, vertical[2], state, &snapshot, palette);
    render_status(frame, vertical[3], state, &snapshot, palette);

    render_overlay(frame, state, palette);
}

fn render_tabs(frame: &mut Frame, area: Rect, state: &AppState, palette: &Palette, in_flight: usize) {
    let kinds: Vec<ResourceKind> = ResourceKind::iter().collect();
    let titles: Vec<Line> = kinds
        .iter()
        .enumerate()
        .map(|(index, kind)| Line::from(format!("{} {}", index + 1, tab_label(*kind))))
        .collect();
    let selected = kinds.iter().position(|kind| *kind == state.tab()).unwrap_or(0);
    let title = if in_flight > 0 {
        format!("StockOverflow · {in_flight} request(s) in flight")
    } else {
        "StockOverflow".to_string()
    };
    let tabs = Tabs::new(titles)
        .select(selected)
        .block(Block::default().title(title).borders(Borders::ALL))
        .style(Style::default().fg(palette.muted))
        .highlight_style(
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(tabs, area);
}

fn tab_label(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Inventory => "Inventory",
        ResourceKind::Users => "Users",
        ResourceKind::Cars => "Cars",
        ResourceKind::Logs => "Logs",
    }
}

fn render_filter_bar(frame: &mut Frame, area: Rect, state: &AppState, palette: &Palette) {
    let mut lines = vec![filter_line(state, palette)];
    if state.tab() == ResourceKind::Inventory {
        let stats = state.inventory_stats();
        lines.push(Line::from(vec![
            Span::raw(format!("Items: {}", stats.total)),
            Span::raw("  Low stock: "),
            Span::styled(stats.low_stock.to_string(), Style::default().fg(palette.warning)),
            Span::raw("  With parts: "),
            Span::raw(stats.with_children.to_string()),
            Span::raw("  Empty: "),
            Span::styled(stats.empty_stock.to_string(), Style::default().fg(palette.error)),
        ]));
    }
    frame.render_widget(Paragraph::new(lines), area);
}

fn filter_line(state: &AppState, palette: &Palette) -> Line<'static> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let filter = state.table().filter();
    let mut spans = vec![Span::raw("Search: ")];
    if state.is_search_active() {
        let mut query = state.search_input().to_string();
        query.push('▌');
        spans.push(Span::styled(query, Style::default().fg(palette.highlight)));
    } else if filter.search.trim().is_empty() {
        spans.push(Span::styled("-", Style::default().fg(palette.muted)));
    } else {
        spans.push(Span::styled(filter.search.clone(), bold));
    }

    let focused = state.focused_selector();
    for selector in state.table().schema().selectors {
        let value = filter.selector(selector.field).unwrap_or(ALL).to_string();
        let label_style = if focused == Some(selector.field) {
            Style::default().fg(palette.accent)
        } else {
            Style::default()
        };
        spans.push(Span::raw("  "));
        spans.push(Span::styled(format!("{}: ", selector.label), label_style));
        spans.push(Span::styled(value, bold));
    }

    if state.tab() == ResourceKind::Inventory {
        spans.push(Span::raw("  Stock: "));
        spans.push(Span::styled(filter.quick.to_string(), bold));
    }

    if let Some(sort) = &filter.sort {
        let label = state
            .table()
            .schema()
            .field(&sort.field)
            .map(|spec| spec.label)
            .unwrap_or("?");
        spans.push(Span::raw("  Sort: "));
        spans.push(Span::styled(format!("{label} {}", sort.direction.arrow()), bold));
    }
    Line::from(spans)
}

fn render_table(
    frame: &mut Frame,
    area: Rect,
    state: &AppState,
    snapshot: &TableSnapshot,
    palette: &Palette,
) {
    let title = format!(
        " {} · page {}/{} · {} shown of {} ",
        tab_label(state.tab()),
        snapshot.page + 1,
        snapshot.page_count,
        snapshot.total,
        snapshot.loaded
    );
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.accent));

    if snapshot.rows.is_empty() {
        let message = if !state.table().is_loaded() {
            "Loading..."
        } else if state.table().filter().is_filtered() {
            "No rows match the current filters (x clears them)"
        } else {
            "Nothing here yet"
        };
        let paragraph = Paragraph::new(Span::styled(message, Style::default().fg(palette.muted)))
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let regex = search_regex(state.search_query());
    let highlight_style = Style::default()
        .fg(palette.highlight)
        .add_modifier(Modifier::BOLD);

    let header_cells = std::iter::once(Cell::from(" ")).chain(snapshot.columns.iter().enumerate().map(
        |(index, spec)| {
            let mut style = Style::default().add_modifier(Modifier::BOLD);
            if index == state.column {
                style = style.fg(palette.accent).add_modifier(Modifier::UNDERLINED);
            }
            Cell::from(Span::styled(spec.label, style))
        },
    ));
    let header = Row::new(header_cells);

    let rows = snapshot.rows.iter().map(|row| {
        let base = row_style(row.marks, palette);
        let gutter = Cell::from(Span::styled(row.marks.glyph(), base));
        let cells = row.cells.iter().zip(&snapshot.columns).map(|(text, spec)| {
            let text = truncate(text, spec.width as usize);
            Cell::from(Line::from(highlight_spans(
                &text,
                regex.as_ref(),
                highlight_style,
                base,
            )))
        });
        Row::new(std::iter::once(gutter).chain(cells))
    });

    let widths: Vec<Constraint> = std::iter::once(Constraint::Length(1))
        .chain(
            snapshot
                .columns
                .iter()
                .map(|spec| Constraint::Length(spec.width)),
        )
        .collect();

    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .column_spacing(1)
        .highlight_style(
            Style::default()
                .bg(palette.selection_bg)
                .fg(palette.selection_fg)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut table_state = TableState::default();
    table_state.select(Some(state.selected.min(snapshot.rows.len() - 1)));
    frame.render_stateful_widget(table, area, &mut table_state);
}

fn row_style(marks: RowMarks, palette: &Palette) -> Style {
    if marks.is_busy() {
        Style::default()
            .fg(palette.busy)
            .add_modifier(Modifier::ITALIC)
    } else if marks.contains(RowMarks::FAILED) {
        Style::default().fg(palette.error)
    } else if marks.contains(RowMarks::DIRTY) {
        Style::default().fg(palette.dirty)
    } else if marks.contains(RowMarks::EMPTY) {
        Style::default().fg(palette.error).add_modifier(Modifier::DIM)
    } else if marks.contains(RowMarks::LOW_STOCK) {
        Style::default().fg(palette.warning)
    } else {
        Style::default()
    }
}

fn render_status(
    frame: &mut Frame,
    area: Rect,
    state: &AppState,
    snapshot: &TableSnapshot,
    palette: &Palette,
) {
    let selected = snapshot.rows.get(state.selected);
    let mut first = Vec::new();
    match state.status_message() {
        Some(message) => {
            let color = match message.level {
                StatusLevel::Info => palette.muted,
                StatusLevel::Success => palette.success,
                StatusLevel::Error => palette.error,
            };
            first.push(Span::styled(message.text.clone(), Style::default().fg(color)));
        }
        None => first.push(Span::styled(KEY_HINTS, Style::default().fg(palette.muted))),
    }
    if snapshot.dirty > 0 {
        first.push(Span::styled(
            format!("  [{} unsaved]", snapshot.dirty),
            Style::default().fg(palette.dirty),
        ));
    }

    let second = match selected {
        Some(row) => {
            let mut spans = vec![
                Span::raw(format!("{} ", row.key)),
                Span::styled(row.title.clone(), Style::default().add_modifier(Modifier::BOLD)),
            ];
            if let Some(error) = &row.error {
                spans.push(Span::styled(format!("  {error}"), Style::default().fg(palette.error)));
            }
            Line::from(spans)
        }
        None => Line::from(""),
    };

    let paragraph = Paragraph::new(Text::from(vec![Line::from(first), second]));
    frame.render_widget(paragraph, area);
}

fn render_overlay(frame: &mut Frame, state: &AppState, palette: &Palette) {
    match state.overlay() {
        Some(OverlayState::EditField(edit)) => render_edit(frame, edit, palette),
        Some(OverlayState::ConfirmDelete(target)) => {
            let area = centered_rect(50, 25, frame.size());
            frame.render_widget(Clear, area);
            let paragraph = Paragraph::new(vec![
                Line::from(Span::styled(
                    format!("Delete {} {}?", target.kind.noun(), target.key),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(target.title.clone()),
                Line::from(""),
                Line::from(Span::styled(
                    "y to delete • n to keep",
                    Style::default().fg(palette.muted),
                )),
            ])
            .block(
                Block::default()
                    .title("Confirm Delete")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(palette.error)),
            )
            .wrap(Wrap { trim: false });
            frame.render_widget(paragraph, area);
        }
        Some(OverlayState::Create(form)) => render_form(frame, form, palette),
        Some(OverlayState::Checkout(checkout)) => render_checkout(frame, checkout, palette),
        Some(OverlayState::Help) => render_help(frame, palette),
        None => {}
    }
}

fn render_edit(frame: &mut Frame, edit: &EditFieldOverlay, palette: &Palette) {
    let area = centered_rect(60, 30, frame.size());
    frame.render_widget(Clear, area);
    let mut input = edit.input.clone();
    input.push('▌');
    let mut lines = vec![
        Line::from(Span::styled(
            format!("{} · {}", edit.title, edit.label),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(input),
    ];
    if !edit.choices.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("Tab cycles: {}", edit.choices.join(", ")),
            Style::default().fg(palette.muted),
        )));
    }
    if let Some(error) = &edit.error {
        lines.push(Line::from(Span::styled(error.clone(), Style::default().fg(palette.error))));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Enter to buffer the change • Esc to cancel",
        Style::default().fg(palette.muted),
    )));
    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title(format!("Edit {}", edit.key))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.accent)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_form(frame: &mut Frame, form: &FormOverlay, palette: &Palette) {
    let area = centered_rect(70, 70, frame.size());
    frame.render_widget(Clear, area);
    let mut lines = Vec::new();
    for (index, field) in form.fields.iter().enumerate() {
        let focused = index == form.focus;
        let mut value = if field.secret {
            "*".repeat(field.value.chars().count())
        } else {
            field.value.clone()
        };
        if focused {
            value.push('▌');
        }
        let label_style = if focused {
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        let mut spans = vec![
            Span::styled(format!("{:>12}: ", field.label), label_style),
            Span::raw(value),
        ];
        if !field.hint.is_empty() {
            spans.push(Span::styled(
                format!("  ({})", field.hint),
                Style::default().fg(palette.muted),
            ));
        }
        lines.push(Line::from(spans));
    }
    if let Some(error) = &form.error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(error.clone(), Style::default().fg(palette.error))));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Tab/↑↓ move • Enter to create • Esc to cancel",
        Style::default().fg(palette.muted),
    )));
    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title(format!("New {}", form.kind.noun()))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.accent)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_checkout(frame: &mut Frame, checkout: &CheckoutOverlay, palette: &Palette) {
    let area = centered_rect(70, 70, frame.size());
    frame.render_widget(Clear, area);
    let focus = checkout.focused();
    let field_line = |label: &str, value: &str, focused: bool| {
        let mut value = value.to_string();
        let style = if focused {
            value.push('▌');
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        Line::from(vec![Span::styled(format!("{label:>12}: "), style), Span::raw(value)])
    };

    let draft = &checkout.draft;
    let mut lines = vec![
        field_line("User code", &draft.user_code, focus == CheckoutField::User),
        field_line("VIN", &draft.vin, focus == CheckoutField::Vin),
        field_line("Order", &draft.order_number, focus == CheckoutField::Order),
        Line::from(""),
    ];
    for (index, part) in draft.parts.iter().enumerate() {
        let mut line = field_line(
            &format!("Part {}", index + 1),
            &part.value,
            focus == CheckoutField::Part(index),
        );
        if part.damaged {
            line.spans.push(Span::styled(
                "  [damaged]",
                Style::default().fg(palette.warning),
            ));
        }
        lines.push(line);
    }
    if let Some(error) = &checkout.error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(error.clone(), Style::default().fg(palette.error))));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Tab move • Ctrl-n add part • Ctrl-x remove part • Ctrl-d damaged • Enter submit • Esc cancel",
        Style::default().fg(palette.muted),
    )));
    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .title("Parts Checkout")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.accent)),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn render_help(frame: &mut Frame, palette: &Palette) {
    let area = centered_rect(60, 70, frame.size());
    frame.render_widget(Clear, area);
    let rows = [
        ("Tab / 1-4", "switch table"),
        ("j k / ↑ ↓", "move selection"),
        ("h l / ← →", "choose column"),
        ("[ ] / PgUp PgDn", "previous / next page"),
        ("/", "search"),
        ("f F / v", "cycle filter value / next filter"),
        ("L", "stock filter (inventory)"),
        ("o", "sort by column, again to reverse"),
        ("x", "clear filters"),
        ("e / Enter", "edit cell"),
        ("s / S", "save row / save all"),
        ("u", "discard row changes"),
        ("d", "delete row"),
        ("a", "add"),
        ("c", "parts checkout"),
        ("r / Ctrl-r", "reload from server"),
        ("q", "quit"),
    ];
    let lines: Vec<Line> = rows
        .iter()
        .map(|(keys, what)| {
            Line::from(vec![
                Span::styled(format!("{keys:>16}  "), Style::default().fg(palette.accent)),
                Span::raw(*what),
            ])
        })
        .collect();
    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .title("Keys")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(palette.accent)),
    );
    frame.render_widget(paragraph, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThemeName;
    use crate::model::item::sample;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn render(state: &AppState) -> String {
        let backend = TestBackend::new(140, 30);
        let mut terminal = Terminal::new(backend).unwrap();
        let palette = Palette::for_theme(&ThemeName::Dark);
        terminal
            .draw(|frame| draw_app(frame, state, &palette, 1))
            .unwrap();
        let buffer = terminal.backend().buffer().clone();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer.get(x, y).symbol());
            }
            out.push('\n');
        }
        out
    }

    #[test]
    fn inventory_tab_shows_rows_and_stats() {
        let mut state = AppState::new(10, ResourceKind::Inventory);
        state
            .views
            .inventory
            .load(vec![sample(1, "Hex Bolt", 5, 10), sample(2, "Axle", 0, 0)]);
        let screen = render(&state);
        assert!(screen.contains("Hex Bolt"));
        assert!(screen.contains("Low stock: 1"));
        assert!(screen.contains("Empty: 1"));
        assert!(screen.contains("1 request(s) in flight"));
        assert!(screen.contains("page 1/1"));
    }

    #[test]
    fn unloaded_table_says_loading() {
        let state = AppState::new(10, ResourceKind::Cars);
        assert!(render(&state).contains("Loading..."));
    }

    #[test]
    fn help_overlay_lists_keys() {
        let mut state = AppState::new(10, ResourceKind::Users);
        state.show_help();
        assert!(render(&state).contains("parts checkout"));
    }

    #[test]
    fn centered_rect_stays_inside_area() {
        let area = Rect::new(0, 0, 100, 40);
        let inner = centered_rect(60, 50, area);
        assert_eq!(inner.width, 60);
        assert_eq!(inner.height, 20);
        assert!(inner.x >= area.x && inner.y >= area.y);
    }
}
