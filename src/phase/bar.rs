/// Title shown when a phase has nothing better to display.
pub const DEFAULT_TITLE: &str = "< Event >";

/// HUD sink receiving the current title once per tick. Pure output: nothing
/// flows back into the phase engine.
pub trait EventBar: Send + Sync {
    /// Replace the title shown to every player.
    fn set_title(&self, title: &str);
}

/// Render a countdown as `m:ss`, or `h:mm:ss` past the hour.
pub fn format_clock(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_formatting() {
        assert_eq!(format_clock(0), "0:00");
        assert_eq!(format_clock(9), "0:09");
        assert_eq!(format_clock(600), "10:00");
        assert_eq!(format_clock(3725), "1:02:05");
    }
}
