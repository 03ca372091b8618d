use chrono::{DateTime, Utc};
use comfy_table::{
    modifiers::UTF8_ROUND_CORNERS, presets::UTF8_BORDERS_ONLY, Attribute, Cell, CellAlignment,
    Color, ContentArrangement, Table,
};

use crate::pipeline::Screening;
use crate::ranker::ScoreKind;
use crate::report::{format_timestamp, format_volume};
use crate::scorer::ScoredRow;

fn get_visibility_ratio(score: u8, top_score: u8) -> f64 {
    if top_score == 0 {
        return 0.4;
    }
    (0.4 + 0.6 * (score as f64 / top_score as f64)).max(0.4)
}

fn section_title(kind: ScoreKind) -> &'static str {
    match kind {
        ScoreKind::Bullish => "Top Bullish",
        ScoreKind::Bearish => "Top Bearish",
        ScoreKind::Trap => "Top Trap Candidates",
    }
}

fn header_cell(text: &str) -> Cell {
    Cell::new(text).add_attribute(Attribute::Bold)
}

fn right_header_cell(text: &str) -> Cell {
    header_cell(text).set_alignment(CellAlignment::Right)
}

fn number_cell(text: String, shade: u8) -> Cell {
    Cell::new(text)
        .fg(Color::Rgb { r: shade, g: shade, b: shade })
        .set_alignment(CellAlignment::Right)
}

/// One ranked section as a terminal table. Rows fade as their score drops
/// relative to the leader.
pub fn render_section(rows: &[&ScoredRow], kind: ScoreKind) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header = match kind {
        ScoreKind::Bullish | ScoreKind::Bearish => vec![
            header_cell("Rank"),
            header_cell("Asset"),
            right_header_cell("24h (%)"),
            right_header_cell("RSI"),
            right_header_cell("Volume"),
            right_header_cell("Score"),
            header_cell("Tags"),
        ],
        ScoreKind::Trap => vec![
            header_cell("Rank"),
            header_cell("Asset"),
            right_header_cell("7d (%)"),
            right_header_cell("24h (%)"),
            right_header_cell("RSI"),
            right_header_cell("CCI"),
            right_header_cell("Score"),
        ],
    };
    table.set_header(header);

    let top_score = rows.first().map_or(0, |r| kind.of(r));

    for (i, scored) in rows.iter().enumerate() {
        let score = kind.of(scored);
        let ratio = get_visibility_ratio(score, top_score);
        let bright = (255.0 * ratio) as u8;
        let gray = (150.0 * ratio) as u8;
        let row = &scored.row;

        let score_color = match kind {
            ScoreKind::Bullish => Color::Rgb { r: 0, g: bright, b: 0 },
            ScoreKind::Bearish | ScoreKind::Trap => Color::Rgb { r: bright, g: 0, b: 0 },
        };

        let mut cells = vec![
            Cell::new(i + 1).fg(Color::DarkGrey),
            Cell::new(&row.symbol).fg(Color::Rgb { r: 0, g: bright, b: bright }),
        ];

        match kind {
            ScoreKind::Bullish | ScoreKind::Bearish => {
                cells.push(number_cell(format!("{:+.2}", row.price_change_24h), gray));
                cells.push(number_cell(format!("{:.1}", row.rsi), gray));
                cells.push(number_cell(format_volume(row.volume_for_bullish()), gray));
                cells.push(
                    Cell::new(score)
                        .fg(score_color)
                        .set_alignment(CellAlignment::Right),
                );
                cells.push(Cell::new(scored.tags.labels().join(" ")));
            }
            ScoreKind::Trap => {
                let change_7d = row
                    .price_change_7d
                    .map_or_else(|| "n/a".to_string(), |c| format!("{:+.1}", c));
                cells.push(number_cell(change_7d, gray));
                cells.push(number_cell(format!("{:+.1}", row.price_change_24h), gray));
                cells.push(number_cell(format!("{:.1}", row.rsi), gray));
                cells.push(number_cell(format!("{:.1}", row.cci), gray));
                cells.push(
                    Cell::new(score)
                        .fg(score_color)
                        .set_alignment(CellAlignment::Right),
                );
            }
        }

        table.add_row(cells);
    }

    table
}

/// Prints every section the screening's mode reports on.
pub fn print_preview(screening: &Screening, top_n: usize, generated_at: DateTime<Utc>) {
    println!(
        "\n(Data taken at {} UTC, {} assets scored)",
        format_timestamp(generated_at),
        screening.rows.len()
    );

    for kind in screening.mode.sections() {
        let top = screening.top(*kind, top_n);
        if top.is_empty() {
            println!("\n{}: no candidates", section_title(*kind));
            continue;
        }
        println!("\n{}\n{}", section_title(*kind), render_section(&top, *kind));
    }
}
