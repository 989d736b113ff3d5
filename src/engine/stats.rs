/// Snapshot parsed from one ffmpeg stats line, e.g.
/// `frame= 1234 fps=240 q=-1.0 size=  10240kB time=00:00:51.42 bitrate=1631.3kbits/s speed=9.98x`
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EncodeStats {
    pub frame: Option<u64>,
    pub fps: Option<f64>,
    pub out_time_s: f64,
    pub bitrate_kbps: Option<f64>,
    pub size_kib: Option<u64>,
    pub speed: Option<f64>,
}

impl EncodeStats {
    /// Parse a stats line. Returns `None` for anything without a `time=` field.
    pub fn parse(line: &str) -> Option<Self> {
        let mut stats = EncodeStats::default();
        let mut saw_time = false;

        for (key, value) in pairs(line) {
            match key {
                "frame" => stats.frame = value.parse().ok(),
                "fps" => stats.fps = value.parse().ok(),
                "time" => {
                    if let Some(t) = parse_timestamp(value) {
                        stats.out_time_s = t;
                        saw_time = true;
                    }
                }
                "bitrate" => {
                    // Bitrate is in format "123.4kbits/s", "N/A" before the first packet
                    stats.bitrate_kbps = value.trim_end_matches("kbits/s").parse().ok();
                }
                "size" | "Lsize" => {
                    stats.size_kib = value
                        .trim_end_matches("KiB")
                        .trim_end_matches("kB")
                        .parse()
                        .ok();
                }
                "speed" => {
                    // Speed is in format "1.23x", strip the 'x'
                    stats.speed = value.trim_end_matches('x').parse().ok();
                }
                _ => {}
            }
        }

        saw_time.then_some(stats)
    }

    /// Calculate progress percentage given total duration
    pub fn progress_pct(&self, duration_s: Option<f64>) -> Option<f64> {
        match duration_s {
            Some(dur) if dur > 0.0 => Some((self.out_time_s / dur * 100.0).clamp(0.0, 100.0)),
            _ => None,
        }
    }
}

/// Split `key=value` tokens, tolerating ffmpeg's padding (`frame=  123`).
fn pairs(line: &str) -> Vec<(&str, &str)> {
    let mut out = Vec::new();
    let mut rest = line.trim();
    while let Some(eq) = rest.find('=') {
        let key = rest[..eq].trim();
        let after = rest[eq + 1..].trim_start();
        let end = after.find(char::is_whitespace).unwrap_or(after.len());
        out.push((key, &after[..end]));
        rest = after[end..].trim_start();
    }
    out
}

/// Parse `HH:MM:SS.ms` into seconds. Negative times (seen at stream start) clamp to 0.
fn parse_timestamp(value: &str) -> Option<f64> {
    let negative = value.starts_with('-');
    let mut parts = value.trim_start_matches('-').split(':');
    let h: f64 = parts.next()?.parse().ok()?;
    let m: f64 = parts.next()?.parse().ok()?;
    let s: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    if negative {
        return Some(0.0);
    }
    Some(h * 3600.0 + m * 60.0 + s)
}
