// Routes and tickets - pipe-delimited ticket parsing and route rows
//
// Two ingestion channels feed route discovery. Both are pipe-delimited with
// a header row and carry the route description in the first field:
// `benxe` as a bare `Origin đi Destination`, `nhaxe` tagged with a leading
// `[slug]` and describing endpoints as `District - Province`.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::warn;

use crate::normalize::route_code;
use crate::store::{soft_delete_stamp, KeyedRow};

/// Vietnamese "to" separating origin and destination in route text.
pub const ROUTE_SEPARATOR: &str = " đi ";

/// Minimum field count of a usable ticket row.
const MIN_TICKET_FIELDS: usize = 13;

// ============================================================================
// TICKET CHANNELS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketChannel {
    Benxe,
    Nhaxe,
}

impl TicketChannel {
    pub fn name(&self) -> &'static str {
        match self {
            TicketChannel::Benxe => "benxe",
            TicketChannel::Nhaxe => "nhaxe",
        }
    }

    /// Field positions differ per channel (hour/price columns swapped).
    pub fn departure_idx(&self) -> usize {
        match self {
            TicketChannel::Benxe => 5,
            TicketChannel::Nhaxe => 4,
        }
    }

    pub fn arrival_idx(&self) -> usize {
        match self {
            TicketChannel::Benxe => 7,
            TicketChannel::Nhaxe => 6,
        }
    }

    pub fn price_idx(&self) -> usize {
        match self {
            TicketChannel::Benxe => 2,
            TicketChannel::Nhaxe => 9,
        }
    }

    pub fn date_idx(&self) -> usize {
        11
    }
}

/// One parsed ticket row: the channel-cleaned route text plus the raw
/// fields for the channel-specific column accessors.
#[derive(Debug, Clone)]
pub struct TicketRecord {
    pub channel: TicketChannel,
    pub route_text: String,
    pub fields: Vec<String>,
}

impl TicketRecord {
    pub fn departure_hour(&self) -> &str {
        self.fields[self.channel.departure_idx()].trim()
    }

    pub fn arrival_hour(&self) -> &str {
        self.fields[self.channel.arrival_idx()].trim()
    }

    pub fn price_text(&self) -> &str {
        self.fields[self.channel.price_idx()].trim()
    }

    pub fn date_text(&self) -> &str {
        self.fields[self.channel.date_idx()].trim()
    }
}

/// Strip the `[slug]` tag prefixing nhaxe route text.
fn strip_channel_tag(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            return rest[end + 1..].trim();
        }
    }
    trimmed
}

fn parse_ticket_fields(channel: TicketChannel, fields: Vec<String>) -> Option<TicketRecord> {
    if fields.len() < MIN_TICKET_FIELDS {
        return None;
    }
    let route_text = match channel {
        TicketChannel::Benxe => fields[0].trim().to_string(),
        TicketChannel::Nhaxe => strip_channel_tag(&fields[0]).to_string(),
    };
    if route_text.is_empty() {
        return None;
    }
    Some(TicketRecord { channel, route_text, fields })
}

/// Load one ticket file. Short or unreadable rows are skipped and counted
/// via the returned `(records, skipped)` pair.
pub fn load_tickets(path: &Path, channel: TicketChannel) -> Result<(Vec<TicketRecord>, usize)> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'|')
        .flexible(true)
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("failed to open {} tickets {}", channel.name(), path.display()))?;

    let mut records = Vec::new();
    let mut skipped = 0;
    for result in reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(err) => {
                skipped += 1;
                warn!(path = %path.display(), %err, "unreadable ticket row");
                continue;
            }
        };
        let fields: Vec<String> = record.iter().map(|f| f.to_string()).collect();
        match parse_ticket_fields(channel, fields) {
            Some(ticket) => records.push(ticket),
            None => skipped += 1,
        }
    }
    Ok((records, skipped))
}

// ============================================================================
// ROUTE TEXT SPLITTING
// ============================================================================

/// Split route text into (origin, destination).
///
/// Primary separator is `" đi "`; nhaxe text occasionally omits it, leaving
/// `District - Province - District - Province`, which is split down the
/// middle.
pub fn split_route_text(text: &str) -> Option<(String, String)> {
    if text.contains(ROUTE_SEPARATOR) {
        let parts: Vec<&str> = text.split(ROUTE_SEPARATOR).map(str::trim).collect();
        // Exactly one separator; anything else is too ambiguous to parse
        if let [origin, destination] = parts.as_slice() {
            if !origin.is_empty() && !destination.is_empty() {
                return Some((origin.to_string(), destination.to_string()));
            }
        }
        return None;
    }

    let dash_parts: Vec<&str> = text.split(" - ").map(str::trim).collect();
    if dash_parts.len() >= 4 {
        let origin = format!("{} - {}", dash_parts[0], dash_parts[1]);
        let destination = format!("{} - {}", dash_parts[2], dash_parts[3]);
        return Some((origin, destination));
    }
    None
}

// ============================================================================
// ROUTE ROWS
// ============================================================================

/// A route discovered from ticket text with both endpoints resolved.
/// Logical identity is the station pair: different texts mapping to the
/// same pair collapse into one route, whichever channel produced them.
#[derive(Debug, Clone)]
pub struct RouteCandidate {
    pub origin_text: String,
    pub destination_text: String,
    pub origin_id: i64,
    pub destination_id: i64,
    pub route_code: String,
    pub channel: TicketChannel,
}

impl RouteCandidate {
    pub fn new(
        origin_text: String,
        destination_text: String,
        origin_id: i64,
        destination_id: i64,
        channel: TicketChannel,
    ) -> Self {
        let route_code = route_code(&origin_text, &destination_text);
        RouteCandidate {
            origin_text,
            destination_text,
            origin_id,
            destination_id,
            route_code,
            channel,
        }
    }

    /// Natural key: the resolved station pair.
    pub fn key(&self) -> String {
        route_pair_key(self.origin_id, self.destination_id)
    }
}

pub fn route_pair_key(origin_id: i64, destination_id: i64) -> String {
    format!("{origin_id}|{destination_id}")
}

pub const ROUTE_HEADERS: &[&str] = &[
    "id",
    "route_code",
    "distance_km",
    "created_at",
    "updated_at",
    "is_deleted",
    "deleted_at",
    "deleted_by",
    "origin_id",
    "destination_id",
];

/// Natural key of a persisted route row: origin and destination ids.
pub fn route_key(fields: &[String]) -> Option<String> {
    let origin = fields[8].trim();
    let destination = fields[9].trim();
    if origin.is_empty() || destination.is_empty() {
        None
    } else {
        Some(format!("{origin}|{destination}"))
    }
}

pub fn route_row(id: i64, candidate: &RouteCandidate) -> KeyedRow {
    let stamp = soft_delete_stamp();
    KeyedRow {
        key: candidate.key(),
        record: vec![
            id.to_string(),
            candidate.route_code.clone(),
            String::new(),
            stamp[0].clone(),
            stamp[1].clone(),
            stamp[2].clone(),
            stamp[3].clone(),
            stamp[4].clone(),
            candidate.origin_id.to_string(),
            candidate.destination_id.to_string(),
        ],
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket_fields(first: &str) -> Vec<String> {
        let mut fields = vec![first.to_string()];
        fields.extend((1..14).map(|i| format!("f{i}")));
        fields
    }

    #[test]
    fn test_split_route_text_with_separator() {
        assert_eq!(
            split_route_text("Sài Gòn đi Đà Lạt"),
            Some(("Sài Gòn".to_string(), "Đà Lạt".to_string()))
        );
        assert_eq!(
            split_route_text("Quận 1 - Hồ Chí Minh đi Ninh Kiều - Cần Thơ"),
            Some((
                "Quận 1 - Hồ Chí Minh".to_string(),
                "Ninh Kiều - Cần Thơ".to_string()
            ))
        );
    }

    #[test]
    fn test_split_route_text_dash_fallback() {
        assert_eq!(
            split_route_text("Quận 1 - Hồ Chí Minh - Ninh Kiều - Cần Thơ"),
            Some((
                "Quận 1 - Hồ Chí Minh".to_string(),
                "Ninh Kiều - Cần Thơ".to_string()
            ))
        );
        assert_eq!(split_route_text("Sài Gòn - Đà Lạt"), None); // only 2 parts
        assert_eq!(split_route_text("no separators here"), None);
    }

    #[test]
    fn test_strip_channel_tag() {
        assert_eq!(
            strip_channel_tag("[xe-phuong-trang] Sài Gòn đi Đà Lạt"),
            "Sài Gòn đi Đà Lạt"
        );
        assert_eq!(strip_channel_tag("Sài Gòn đi Đà Lạt"), "Sài Gòn đi Đà Lạt");
        assert_eq!(strip_channel_tag("[unclosed tag"), "[unclosed tag");
    }

    #[test]
    fn test_parse_ticket_fields() {
        let ticket =
            parse_ticket_fields(TicketChannel::Benxe, ticket_fields("Sài Gòn đi Đà Lạt")).unwrap();
        assert_eq!(ticket.route_text, "Sài Gòn đi Đà Lạt");
        assert_eq!(ticket.departure_hour(), "f5");
        assert_eq!(ticket.arrival_hour(), "f7");
        assert_eq!(ticket.price_text(), "f2");
        assert_eq!(ticket.date_text(), "f11");

        let ticket = parse_ticket_fields(
            TicketChannel::Nhaxe,
            ticket_fields("[nha-xe] Trảng Bàng - Tây Ninh đi Sài Gòn"),
        )
        .unwrap();
        assert_eq!(ticket.route_text, "Trảng Bàng - Tây Ninh đi Sài Gòn");
        assert_eq!(ticket.departure_hour(), "f4");
        assert_eq!(ticket.price_text(), "f9");

        // Short rows are rejected
        assert!(parse_ticket_fields(TicketChannel::Benxe, vec!["x".into(); 5]).is_none());
    }

    #[test]
    fn test_route_candidate_key_collapses_by_station_pair() {
        let a = RouteCandidate::new("Sài Gòn".into(), "Đà Lạt".into(), 1500, 1502, TicketChannel::Benxe);
        let b = RouteCandidate::new(
            "Quận 1 - Hồ Chí Minh".into(),
            "Đà Lạt".into(),
            1500,
            1502,
            TicketChannel::Nhaxe,
        );
        // Different text, same resolved pair: same logical route
        assert_eq!(a.key(), b.key());
        // Direction matters
        let c = RouteCandidate::new("Đà Lạt".into(), "Sài Gòn".into(), 1502, 1500, TicketChannel::Benxe);
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn test_route_row_shape() {
        let candidate =
            RouteCandidate::new("Sài Gòn".into(), "Đà Lạt".into(), 1500, 1502, TicketChannel::Benxe);
        let row = route_row(1600, &candidate);
        assert_eq!(row.record.len(), ROUTE_HEADERS.len());
        assert_eq!(row.record[1], "SAIGON_DALAT");
        assert_eq!(route_key(&row.record), Some("1500|1502".to_string()));
    }
}
