//! Terminal rendering of queries, results and account details.

use std::fmt::Write;

use console::style;

use crate::coordinator::{Pagination, SearchState};
use crate::deserializer::fofa_response::{AccountInfo, ResultItem};
use crate::formatter::{self, FormattedQuery, Role, Segment};

const CARET: &str = "│";
const HEADER_PREVIEW_LINES: usize = 8;

fn paint(role: Role, text: &str) -> String {
    match role {
        Role::Key => style(text).cyan().bold().to_string(),
        Role::Operator | Role::Conjunction => style(text).yellow().to_string(),
        Role::Value => style(text).green().to_string(),
    }
}

fn paint_segment(segment: &Segment) -> String {
    match segment.caret {
        Some(caret) => {
            let split = segment
                .text
                .char_indices()
                .nth(caret)
                .map_or(segment.text.len(), |(i, _)| i);
            let (before, after) = segment.text.split_at(split);
            format!(
                "{}{}{}",
                paint(segment.role, before),
                style(CARET).magenta().bold(),
                paint(segment.role, after)
            )
        }
        None => paint(segment.role, &segment.text),
    }
}

pub fn highlight_formatted(formatted: &FormattedQuery) -> String {
    let mut out = String::new();
    for (i, segment) in formatted.segments.iter().enumerate() {
        let after_conjunction = i > 0 && formatted.segments[i - 1].role == Role::Conjunction;
        if segment.role == Role::Conjunction || after_conjunction {
            out.push(' ');
        }
        out.push_str(&paint_segment(segment));
    }
    out
}

/// Highlighted query, or the raw text when it has no `key=value` structure.
pub fn highlight(value: &str, cursor: Option<usize>) -> String {
    match formatter::format_query(value, cursor) {
        Some(formatted) => highlight_formatted(&formatted),
        None => value.to_string(),
    }
}

pub fn summary(state: &SearchState) -> String {
    format!(
        "{} matches   {} unique IPs   {} ms",
        style(state.total_results).cyan().bold(),
        style(state.unique_ip_count).cyan().bold(),
        style(state.elapsed_ms).cyan().bold()
    )
}

fn join_non_empty(parts: &[&str], sep: &str) -> String {
    parts
        .iter()
        .filter(|p| !p.trim().is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(sep)
}

pub fn result_card(item: &ResultItem) -> String {
    let mut out = String::new();
    let port = item
        .port
        .map(|p| format!(" [{}]", style(p).blue().bold()))
        .unwrap_or_default();
    let _ = writeln!(out, "🔗 {}{}", style(item.url()).cyan().underlined(), port);
    if !item.title.is_empty() {
        let _ = writeln!(out, "   {}", style(&item.title).bold());
    }
    if !item.ip.is_empty() {
        let _ = writeln!(out, "   {}", style(&item.ip).dim());
    }

    let country = if item.country_name.is_empty() {
        item.country.as_str()
    } else {
        item.country_name.as_str()
    };
    let geo = join_non_empty(&[country, item.region.as_str(), item.city.as_str()], " / ");
    if !geo.is_empty() {
        let _ = writeln!(out, "   🌐 {geo}");
    }
    for (label, value) in [
        ("ASN", item.asn.as_str()),
        ("Org", item.org.as_str()),
        ("Server", item.server.as_str()),
        ("Date", item.last_update.as_str()),
    ] {
        if !value.is_empty() {
            let _ = writeln!(out, "   {}: {}", style(label).dim(), value);
        }
    }
    if !item.products.is_empty() {
        let badges: Vec<String> = item
            .products
            .iter()
            .map(|p| style(format!("[{p}]")).green().to_string())
            .collect();
        let _ = writeln!(out, "   {}", badges.join(" "));
    }

    let header = if item.header.trim().is_empty() {
        item.banner.as_str()
    } else {
        item.header.as_str()
    };
    if !header.trim().is_empty() {
        let _ = writeln!(out, "   {}", style("── header ──").dim());
        let lines: Vec<&str> = header.lines().collect();
        for line in lines.iter().take(HEADER_PREVIEW_LINES) {
            let _ = writeln!(out, "   {line}");
        }
        if lines.len() > HEADER_PREVIEW_LINES {
            let _ = writeln!(
                out,
                "   {}",
                style(format!("… {} more lines", lines.len() - HEADER_PREVIEW_LINES)).dim()
            );
        }
    }
    if !item.cert_subject.is_empty() {
        let _ = writeln!(out, "   🔒 cert: {}", item.cert_subject);
    }
    out
}

pub fn pagination(p: Pagination) -> String {
    let prev = if p.can_prev() {
        style("‹ prev").cyan().to_string()
    } else {
        style("‹ prev").dim().to_string()
    };
    let next = if p.can_next() {
        style("next ›").cyan().to_string()
    } else {
        style("next ›").dim().to_string()
    };
    let position = match p.total_pages {
        Some(total) if total > 0 => format!("{} / {}", style(p.current).bold(), total),
        _ => style(p.current).bold().to_string(),
    };
    format!("{prev}  {position}  {next}")
}

pub fn account_badge(info: &AccountInfo) -> String {
    if info.error {
        let reason = if info.message.is_empty() {
            String::new()
        } else {
            format!(" ({})", info.message)
        };
        return format!("{}{}", style("unknown account").yellow(), reason);
    }

    let who = join_non_empty(&[info.username.as_str(), info.email.as_str()], " ");
    let vip = if info.isvip {
        style(format!("VIP {}", info.vip_level)).magenta().bold().to_string()
    } else {
        style("free").dim().to_string()
    };
    let mut out = format!(
        "👤 {}  {}  queries left {}  data left {}",
        if who.is_empty() { "-" } else { who.as_str() },
        vip,
        style(info.remain_api_query).cyan(),
        style(info.remain_api_data).cyan()
    );
    if !info.expiration.is_empty() {
        let _ = write!(out, "  expires {}", info.expiration);
    }
    out
}

/// Full results view, in the same precedence as the web results page:
/// loading, then error, then empty, then the list.
pub fn state_view(state: &SearchState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", summary(state));
    let _ = writeln!(out);

    if state.loading {
        let _ = writeln!(out, "⏳ Searching...");
        return out;
    }
    if let Some(error) = &state.error {
        let _ = writeln!(out, "{} {}", style("❌").red(), style(error).red());
        return out;
    }
    if state.results.is_empty() {
        let _ = writeln!(out, "No results found for \"{}\".", state.query);
        return out;
    }
    for item in &state.results {
        let _ = writeln!(out, "{}", result_card(item));
    }
    let _ = writeln!(out, "{}", pagination(state.pagination()));
    out
}
