//! Shutdown summary formatting

use datagrump::SenderSummary;
use datagrump_protocol::message::HEADER_SIZE;
use datagrump_protocol::CongestionStats;
use std::time::Duration;

/// Format bytes in human-readable form
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    match bytes {
        b if b >= GB => format!("{:.2} GB", b as f64 / GB as f64),
        b if b >= MB => format!("{:.2} MB", b as f64 / MB as f64),
        b if b >= KB => format!("{:.2} KB", b as f64 / KB as f64),
        b => format!("{} B", b),
    }
}

/// Format a bit rate in human-readable form
pub fn format_bandwidth(bps: u64) -> String {
    const KBPS: u64 = 1000;
    const MBPS: u64 = KBPS * 1000;

    match bps {
        b if b >= MBPS => format!("{:.2} Mbps", b as f64 / MBPS as f64),
        b if b >= KBPS => format!("{:.2} Kbps", b as f64 / KBPS as f64),
        b => format!("{} bps", b),
    }
}

/// Format a millisecond RTT
pub fn format_rtt(rtt_ms: f64) -> String {
    if rtt_ms >= 1000.0 {
        format!("{:.2}s", rtt_ms / 1000.0)
    } else {
        format!("{:.1}ms", rtt_ms)
    }
}

/// Format duration in human-readable form
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let minutes = secs / 60;
    let seconds = secs % 60;

    if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}.{:03}s", seconds, duration.subsec_millis())
    }
}

/// One-line summary of a finished run
pub fn summary_line(
    summary: &SenderSummary,
    stats: &CongestionStats,
    elapsed: Duration,
    payload_size: usize,
) -> String {
    let bytes = summary.datagrams_sent * (HEADER_SIZE + payload_size) as u64;
    let millis = elapsed.as_millis() as u64;
    let rate = if millis > 0 { bytes * 8 * 1000 / millis } else { 0 };

    let rtt = stats
        .rtt_ms
        .map(format_rtt)
        .unwrap_or_else(|| "N/A".to_string());

    format!(
        "{} over {}: {} datagrams ({}, {}), {} acks, {} timeouts, final window {:.2}, rtt {}",
        stats.strategy,
        format_duration(elapsed),
        summary.datagrams_sent,
        format_bytes(bytes),
        format_bandwidth(rate),
        summary.acks_received,
        summary.timeouts,
        stats.window,
        rtt
    )
}
