use tabula::{Cell, Section, Table};

/// A 3×3 grid where every cell is an image `img-{row}-{col}.png`.
pub fn image_grid() -> Section {
    let rows = (0..3)
        .map(|row| {
            (0..3)
                .map(|col| Cell::image(format!("img-{}-{}.png", row, col)))
                .collect()
        })
        .collect();
    Section {
        title: Some("Gallery".to_string()),
        paragraphs: vec![],
        table: Some(Table::new(rows)),
    }
}

/// A 3×3 grid with an image `item-{row}.png` in the first column and text
/// in the other two.
pub fn mixed_grid() -> Section {
    let rows = (0..3)
        .map(|row| {
            vec![
                Cell::image(format!("item-{}.png", row)),
                Cell::text(format!("Item {}", row)).bold(),
                Cell::text("Unlocked at level 10"),
            ]
        })
        .collect();
    Section {
        title: Some("Inventory".to_string()),
        paragraphs: vec![],
        table: Some(Table::new(rows)),
    }
}

/// Title, one paragraph and a small text table with a rowspan.
pub fn text_section() -> Section {
    Section {
        title: Some("Season pass".to_string()),
        paragraphs: vec!["Rewards unlock as you level up.".to_string()],
        table: Some(Table::new(vec![
            vec![Cell::text("Tier").bold(), Cell::text("Reward").bold()],
            vec![Cell::text("1-10").with_span(2, 1), Cell::text("Emblem")],
            vec![Cell::text("Banner")],
        ])),
    }
}

/// Importer JSON for [`text_section`]-like content.
pub fn page_json() -> &'static str {
    r#"{
        "sections": [
            {
                "title": "Rewards",
                "paragraphs": ["Collect them all."],
                "table": {
                    "rows": [
                        [{"value": "Item", "bold": true}, {"value": "Icon", "bold": true}],
                        [{"value": "Crown"}, {"value": "crown.png", "is_image": true}],
                        [{"value": "Gem", "rowspan": 2}, {"value": "gem.png", "is_image": true}]
                    ]
                }
            }
        ]
    }"#
}
