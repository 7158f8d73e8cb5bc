//! Order documents: the printable order sheet (PDF), the tabular export and
//! the notification body. All three are pure functions of the order and
//! settings.

use crate::{
    entities::{order_item, settings},
    errors::ServiceError,
    pricing::{format_money, format_rate_percent},
    services::orders::OrderDetails,
    sizes::Size,
};
use html_escape::{decode_html_entities, encode_text};
use once_cell::sync::Lazy;
use printpdf::{BuiltinFont, Line, Mm, PdfDocument, Point};
use regex::Regex;

pub const DOCUMENT_CONTENT_TYPE: &str = "application/pdf";
pub const TABLE_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

static TAG: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").ok());

pub fn document_filename(order_number: &str) -> String {
    format!("order-{}.pdf", order_number)
}

pub fn table_filename(order_number: &str) -> String {
    format!("order-{}.csv", order_number)
}

/// Plain text of an HTML fragment: tags removed, entities decoded.
pub fn strip_tags(html: &str) -> String {
    let text = match TAG.as_ref() {
        Some(tag) => tag.replace_all(html, " ").into_owned(),
        None => html.to_string(),
    };
    decode_html_entities(&text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn quantity_cell(quantity: u32) -> String {
    if quantity == 0 {
        "-".to_string()
    } else {
        quantity.to_string()
    }
}

fn vat_flag(item: &order_item::Model) -> &'static str {
    if item.price_includes_vat {
        "Yes"
    } else {
        "No"
    }
}

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 15.0;
const TERMS_WIDTH: usize = 110;

// Item table columns, in millimetres from the left edge.
const COL_SKU: f32 = MARGIN;
const COL_NAME: f32 = 40.0;
const COL_COLOR: f32 = 80.0;
const COL_PRICE: f32 = 102.0;
const COL_SIZES: [f32; 5] = [124.0, 134.0, 144.0, 154.0, 164.0];
const COL_QTY: f32 = 174.0;
const COL_TOTAL: f32 = 184.0;
const COL_AMOUNT: f32 = 160.0;

/// One vertical slice of the printable document.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// A line of text cells, each at an x offset in millimetres.
    Text { size: f32, cells: Vec<(f32, String)> },
    /// A horizontal rule across the text area.
    Rule,
    /// Vertical space in millimetres.
    Gap(f32),
}

impl Block {
    fn line(size: f32, text: impl Into<String>) -> Self {
        Block::Text {
            size,
            cells: vec![(MARGIN, text.into())],
        }
    }

    fn amount(size: f32, label: String, amount: String) -> Self {
        Block::Text {
            size,
            cells: vec![(COL_AMOUNT - 45.0, label), (COL_AMOUNT, amount)],
        }
    }

    /// Height in millimetres, including leading.
    fn height(&self) -> f32 {
        match self {
            Block::Text { size, .. } => size * 0.5,
            Block::Rule => 2.0,
            Block::Gap(mm) => *mm,
        }
    }
}

fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut clipped: String = text.chars().take(max_chars.saturating_sub(1)).collect();
        clipped.push('~');
        clipped
    }
}

/// Greedy word wrap at `width` characters.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Text the built-in PDF fonts can encode; anything else prints as `?`.
pub fn latin1(text: &str) -> String {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c,
            _ => '?',
        })
        .collect()
}

/// Lays out the order sheet: header, retailer details, item table, totals
/// and the business terms.
pub fn document_blocks(details: &OrderDetails, settings: &settings::Model) -> Vec<Block> {
    let order = &details.order;
    let mut blocks = vec![
        Block::line(18.0, format!("Wholesale order {}", order.order_number)),
        Block::line(10.0, order.created_at.format("%Y-%m-%d %H:%M UTC").to_string()),
        Block::Gap(4.0),
    ];

    let mut fields = vec![
        ("Retailer", order.retailer_name.clone()),
        ("VAT number", order.vat_number.clone().unwrap_or_default()),
        ("Contact", order.contact_name.clone()),
        ("Phone", order.phone.clone()),
        ("Email", order.email.clone()),
        ("Shipping address", order.shipping_address.clone()),
    ];
    if let Some(date) = order.requested_date {
        fields.push(("Requested date", date.format("%Y-%m-%d").to_string()));
    }
    if let Some(notes) = order.notes.as_deref() {
        fields.push(("Notes", notes.to_string()));
    }
    blocks.extend(
        fields
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(label, value)| Block::line(10.0, format!("{}: {}", label, value))),
    );
    blocks.push(Block::Gap(4.0));

    let mut header = vec![
        (COL_SKU, "SKU".to_string()),
        (COL_NAME, "Name".to_string()),
        (COL_COLOR, "Color".to_string()),
        (COL_PRICE, "Unit price".to_string()),
    ];
    header.extend(COL_SIZES.iter().zip(Size::ALL).map(|(x, s)| (*x, s.to_string())));
    header.push((COL_QTY, "Qty".to_string()));
    header.push((COL_TOTAL, "Total".to_string()));
    blocks.push(Block::Text {
        size: 9.0,
        cells: header,
    });
    blocks.push(Block::Rule);

    for item in &details.items {
        let quantities = item.quantities();
        let price = if item.price_includes_vat {
            format!("{} incl.", format_money(item.unit_price))
        } else {
            format_money(item.unit_price)
        };
        let mut cells = vec![
            (COL_SKU, clip(&item.sku, 14)),
            (COL_NAME, clip(&item.name, 22)),
            (COL_COLOR, clip(&item.color, 12)),
            (COL_PRICE, price),
        ];
        cells.extend(
            COL_SIZES
                .iter()
                .zip(Size::ALL)
                .map(|(x, s)| (*x, quantity_cell(quantities.get(s)))),
        );
        cells.push((COL_QTY, quantities.total_quantity().to_string()));
        cells.push((COL_TOTAL, format_money(item.line_total)));
        blocks.push(Block::Text { size: 9.0, cells });
    }
    blocks.push(Block::Rule);

    blocks.push(Block::amount(10.0, "Subtotal".into(), format_money(order.subtotal)));
    blocks.push(Block::amount(
        10.0,
        format!("VAT ({}%)", format_rate_percent(order.vat_rate)),
        format_money(order.vat),
    ));
    blocks.push(Block::amount(12.0, "Total".into(), format_money(order.total)));

    if let Some(terms) = settings.terms_html.as_deref() {
        let terms = strip_tags(terms);
        if !terms.is_empty() {
            blocks.push(Block::Gap(6.0));
            blocks.extend(wrap(&terms, TERMS_WIDTH).into_iter().map(|l| Block::line(8.0, l)));
        }
    }

    blocks
}

/// Renders the printable order sheet as an A4 PDF.
///
/// `font` is a TrueType font to embed. Without one the built-in Helvetica is
/// used, which only covers Latin-1 text.
pub fn render_order_document(
    details: &OrderDetails,
    settings: &settings::Model,
    font: Option<&[u8]>,
) -> Result<Vec<u8>, ServiceError> {
    let pdf_err = |e: printpdf::Error| ServiceError::InternalError(format!("failed to render PDF: {}", e));

    let (doc, page, layer) = PdfDocument::new(
        format!("Order {}", details.order.order_number),
        Mm(PAGE_WIDTH),
        Mm(PAGE_HEIGHT),
        "order",
    );
    let (font_ref, embedded) = match font {
        Some(bytes) => (doc.add_external_font(bytes).map_err(pdf_err)?, true),
        None => (doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?, false),
    };

    let mut layer = doc.get_page(page).get_layer(layer);
    let mut y = PAGE_HEIGHT - MARGIN;

    for block in document_blocks(details, settings) {
        let height = block.height();
        if y - height < MARGIN {
            let (page, next) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "order");
            layer = doc.get_page(page).get_layer(next);
            y = PAGE_HEIGHT - MARGIN;
        }
        y -= height;

        match block {
            Block::Text { size, cells } => {
                for (x, text) in cells {
                    let text = if embedded { text } else { latin1(&text) };
                    layer.use_text(text, size, Mm(x), Mm(y), &font_ref);
                }
            }
            Block::Rule => layer.add_line(Line {
                points: vec![
                    (Point::new(Mm(MARGIN), Mm(y)), false),
                    (Point::new(Mm(PAGE_WIDTH - MARGIN), Mm(y)), false),
                ],
                is_closed: false,
            }),
            Block::Gap(_) => {}
        }
    }

    doc.save_to_bytes().map_err(pdf_err)
}

/// Renders the order as a spreadsheet-friendly CSV: BOM, every field quoted,
/// one row per item and three summary rows.
pub fn render_order_table(details: &OrderDetails) -> Result<Vec<u8>, ServiceError> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_writer(UTF8_BOM.to_vec());

    let mut header = vec![
        "SKU".to_string(),
        "Name".to_string(),
        "Color".to_string(),
        "Unit Price".to_string(),
        "Price Includes VAT".to_string(),
    ];
    header.extend(Size::ALL.iter().map(|s| format!("Size {}", s)));
    header.push("Line Total".to_string());
    let width = header.len();

    let csv_err = |e: csv::Error| ServiceError::InternalError(format!("failed to write CSV: {}", e));

    writer.write_record(&header).map_err(csv_err)?;

    for item in &details.items {
        let quantities = item.quantities();
        let mut record = vec![
            item.sku.clone(),
            item.name.clone(),
            item.color.clone(),
            format_money(item.unit_price),
            vat_flag(item).to_string(),
        ];
        record.extend(Size::ALL.iter().map(|s| quantities.get(*s).to_string()));
        record.push(format_money(item.line_total));
        writer.write_record(&record).map_err(csv_err)?;
    }

    let order = &details.order;
    for (label, amount) in [
        ("Subtotal", order.subtotal),
        ("VAT", order.vat),
        ("Total", order.total),
    ] {
        let mut record = vec![String::new(); width - 2];
        record.push(label.to_string());
        record.push(format_money(amount));
        writer.write_record(&record).map_err(csv_err)?;
    }

    writer
        .into_inner()
        .map_err(|e| ServiceError::InternalError(format!("failed to flush CSV: {}", e)))
}

/// HTML body of the new-order notification.
pub fn render_order_email(details: &OrderDetails, settings: &settings::Model) -> String {
    let order = &details.order;
    let units: u64 = details
        .items
        .iter()
        .map(|i| i.quantities().total_quantity())
        .sum();
    let notes = order
        .notes
        .as_deref()
        .map(|n| format!("<p>Notes: {}</p>\n", encode_text(n)))
        .unwrap_or_default();

    format!(
        "<div dir=\"auto\" style=\"font-family: Arial, Helvetica, sans-serif\">\n\
         <h2>New order #{number}</h2>\n\
         <p><strong>{retailer}</strong><br>{contact}<br>{phone}<br>{email}<br>{address}</p>\n\
         <p>Items: {lines} lines, {units} units</p>\n\
         <p>Subtotal: {subtotal}<br>VAT ({rate}%): {vat}<br><strong>Total: {total}</strong></p>\n\
         <p>Placed on {date}. The order sheet is attached.</p>\n\
         {notes}<p style=\"color:#777\">Sent to {business}</p>\n</div>\n",
        number = encode_text(&order.order_number),
        retailer = encode_text(&order.retailer_name),
        contact = encode_text(&order.contact_name),
        phone = encode_text(&order.phone),
        email = encode_text(&order.email),
        address = encode_text(&order.shipping_address),
        lines = details.items.len(),
        units = units,
        subtotal = format_money(order.subtotal),
        rate = format_rate_percent(order.vat_rate),
        vat = format_money(order.vat),
        total = format_money(order.total),
        date = order.created_at.format("%Y-%m-%d %H:%M UTC"),
        notes = notes,
        business = encode_text(&settings.business_email),
    )
}
