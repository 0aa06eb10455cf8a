use chrono::{DateTime, FixedOffset, Offset, Utc};

/// Offset used for human-facing times in progress events (UTC+8).
const DISPLAY_OFFSET_SECS: i32 = 8 * 3600;

fn display_offset() -> FixedOffset {
	FixedOffset::east_opt(DISPLAY_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Format a unix timestamp (seconds) as `YYYY-MM-DD HH:MM:SS` in display time.
///
/// Returns `None` for missing or non-positive timestamps.
pub fn format_display_time(ts_secs: i64) -> Option<String> {
	if ts_secs <= 0 {
		return None;
	}
	DateTime::<Utc>::from_timestamp(ts_secs, 0).map(|dt| format_instant(&dt))
}

/// Format an instant as `YYYY-MM-DD HH:MM:SS` in display time.
pub fn format_instant(instant: &DateTime<Utc>) -> String {
	instant
		.with_timezone(&display_offset())
		.format("%Y-%m-%d %H:%M:%S")
		.to_string()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_format_display_time() {
		// 2024-01-01 00:00:00 UTC
		assert_eq!(
			format_display_time(1704067200).as_deref(),
			Some("2024-01-01 08:00:00")
		);
		assert_eq!(format_display_time(0), None);
	}
}
