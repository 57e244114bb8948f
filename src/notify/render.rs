//! Message bodies for every channel.
//!
//! Unset dates show as `-`. Optional sections (remark, address, special requirements, equipment)
//! are left out entirely when empty.
use std::fmt::Write;

use chrono::{DateTime, NaiveDate, Utc};

use super::{Event, Notification};
use crate::models::{Aggregate, LineItem};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━";

fn date(value: Option<NaiveDate>) -> String {
    value
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn text(value: Option<&str>) -> &str {
    match value {
        Some(value) if !value.trim().is_empty() => value,
        _ => "-",
    }
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn headline(notification: &Notification) -> String {
    let label = notification.aggregate.kind.label();
    match notification.event {
        Event::Registered => format!("[{label} registered] {}", notification.aggregate.name),
        Event::Stage2Reached => format!("[{label} stage 2] {}", notification.aggregate.name),
    }
}

/// (section title, rows) pairs shared by the email and chat layouts.
fn sections(notification: &Notification) -> Vec<(&'static str, Vec<(&'static str, String)>)> {
    let aggregate = &notification.aggregate;
    let mut sections = vec![
        (
            "Details",
            vec![
                ("ID", aggregate.id.to_string()),
                ("Name", aggregate.name.clone()),
                ("Created", timestamp(aggregate.created_time)),
                ("Status", aggregate.status.to_string()),
            ],
        ),
        ("Contact", contact_rows(aggregate)),
    ];

    if notification.event == Event::Stage2Reached {
        sections.push(("Delivery", delivery_rows(aggregate)));
    }

    sections
}

fn contact_rows(aggregate: &Aggregate) -> Vec<(&'static str, String)> {
    let mut rows = vec![("Name", aggregate.contact.name.clone())];
    for (label, value) in [
        ("Phone", &aggregate.contact.phone),
        ("Email", &aggregate.contact.email),
        ("Owner", &aggregate.owner),
    ] {
        if !value.trim().is_empty() {
            rows.push((label, value.clone()));
        }
    }
    rows
}

fn delivery_rows(aggregate: &Aggregate) -> Vec<(&'static str, String)> {
    let delivery = &aggregate.delivery;
    let mut rows = vec![
        (
            "Expected delivery period",
            text(delivery.expected_delivery_period.as_deref()).to_string(),
        ),
        (
            "Expected delivery date",
            date(delivery.expected_delivery_date),
        ),
        (
            "Expected contract period",
            text(delivery.expected_contract_period.as_deref()).to_string(),
        ),
    ];
    if delivery.contract_start_date.is_some() {
        rows.push(("Contract start", date(delivery.contract_start_date)));
    }
    if delivery.contract_end_date.is_some() {
        rows.push(("Contract end", date(delivery.contract_end_date)));
    }
    rows
}

/// Free-text blocks that only show up when filled in.
fn notes(notification: &Notification) -> Vec<(&'static str, &str)> {
    let aggregate = &notification.aggregate;
    let mut notes = Vec::new();

    if notification.event == Event::Stage2Reached {
        if let Some(address) = aggregate.delivery.delivery_address.as_deref() {
            notes.push(("Delivery address", address));
        }
        if let Some(requirements) = aggregate.delivery.special_requirements.as_deref() {
            notes.push(("Special requirements", requirements));
        }
    }
    if !aggregate.remark.trim().is_empty() {
        notes.push(("Remark", aggregate.remark.as_str()));
    }

    notes
}

fn item_lines(item: &LineItem) -> Vec<String> {
    let mut lines = vec![
        format!("Part: {}", item.part_number),
        format!("Qty: {}", item.quantity),
    ];
    if !item.description.trim().is_empty() {
        lines.push(format!("Note: {}", item.description));
    }
    lines
}

/// Plain text for the team chat.
pub fn chat(notification: &Notification) -> String {
    let mut out = String::new();
    let marker = match notification.event {
        Event::Registered => "📋",
        Event::Stage2Reached => "✅",
    };
    let _ = writeln!(out, "{marker} {}", headline(notification));
    let _ = writeln!(out, "{RULE}");

    for (title, rows) in sections(notification) {
        let _ = writeln!(out, "\n{title}");
        for (label, value) in rows {
            let _ = writeln!(out, "• {label}: {value}");
        }
    }

    if !notification.line_items.is_empty() {
        let _ = writeln!(out, "\nEquipment");
        for (index, item) in notification.line_items.iter().enumerate() {
            let mut lines = item_lines(item).into_iter();
            if let Some(first) = lines.next() {
                let _ = writeln!(out, "{}. {first}", index + 1);
            }
            for line in lines {
                let _ = writeln!(out, "   {line}");
            }
        }
    }

    for (title, body) in notes(notification) {
        let _ = writeln!(out, "\n{title}\n{body}");
    }

    if notification.event == Event::Registered {
        let _ = writeln!(
            out,
            "\n⚠️ Fill in the delivery details once the deal is confirmed"
        );
    }
    let _ = write!(out, "\nSent {}", timestamp(notification.at));

    out
}

pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Subject and HTML body for the stakeholder mailbox.
pub fn email(notification: &Notification) -> (String, String) {
    let subject = headline(notification);
    let mut body = String::new();

    let _ = write!(
        body,
        "<html><body style=\"font-family: sans-serif\"><h2>{}</h2>",
        escape_html(&subject)
    );

    for (title, rows) in sections(notification) {
        let _ = write!(body, "<h3>{title}</h3><table>");
        for (label, value) in rows {
            let _ = write!(
                body,
                "<tr><td><b>{label}</b></td><td>{}</td></tr>",
                escape_html(&value)
            );
        }
        body.push_str("</table>");
    }

    if !notification.line_items.is_empty() {
        body.push_str(
            "<h3>Equipment</h3><table border=\"1\" cellpadding=\"4\" style=\"border-collapse: collapse\">\
             <tr><th>#</th><th>Part number</th><th>Qty</th><th>Note</th></tr>",
        );
        for (index, item) in notification.line_items.iter().enumerate() {
            let _ = write!(
                body,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                index + 1,
                escape_html(&item.part_number),
                item.quantity,
                escape_html(&item.description)
            );
        }
        body.push_str("</table>");
    }

    for (title, text) in notes(notification) {
        let _ = write!(body, "<h3>{title}</h3><p>{}</p>", escape_html(text));
    }

    let _ = write!(
        body,
        "<hr><small>Sent {}</small></body></html>",
        timestamp(notification.at)
    );

    (subject, body)
}

pub fn verification_email(username: &str, code: &str) -> (String, String) {
    let subject = "Your sign-in code".to_string();
    let body = format!(
        "<html><body style=\"font-family: sans-serif\">\
         <p>Hi {},</p>\
         <p>Your sign-in code is</p>\
         <p style=\"font-size: 28px; letter-spacing: 6px\"><b>{code}</b></p>\
         <p>It expires in 5 minutes and works once. If you did not try to sign in, ignore this email.</p>\
         </body></html>",
        escape_html(username)
    );

    (subject, body)
}
