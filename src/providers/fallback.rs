//! Local heuristic fallback. Pure computation, no network, cannot fail.

use super::RequestMode;

/// Name reported for fallback responses
pub const FALLBACK_NAME: &str = "local-fallback";

/// Last link of the fallback chain
#[derive(Debug, Clone, Default)]
pub struct LocalFallback;

impl LocalFallback {
    pub fn new() -> Self {
        Self
    }

    pub fn name(&self) -> &'static str {
        FALLBACK_NAME
    }

    /// Deterministic response for `input`
    pub fn respond(&self, input: &str, mode: RequestMode) -> String {
        let subject = summarize(input, 80);

        match mode {
            RequestMode::Action => format!(
                "No AI backend was reachable, so the action \"{}\" was reviewed locally only.",
                subject
            ),
            RequestMode::Chat if input.contains('?') => format!(
                "I can't reach an AI backend right now, so I can't answer \"{}\" properly. \
                 I've kept the question and will come back to it once a backend is available.",
                subject
            ),
            RequestMode::Chat => format!(
                "I can't reach an AI backend right now, but I've noted: \"{}\".",
                subject
            ),
        }
    }
}

/// First line of `input`, whitespace-collapsed and cut at `max_chars`
fn summarize(input: &str, max_chars: usize) -> String {
    let line = input.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let cut: String = collapsed.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let fallback = LocalFallback::new();
        let a = fallback.respond("What time is it?", RequestMode::Chat);
        let b = fallback.respond("What time is it?", RequestMode::Chat);
        assert_eq!(a, b);
        assert!(a.contains("What time is it?"));
    }

    #[test]
    fn test_modes() {
        let fallback = LocalFallback::new();
        assert!(fallback.respond("clean up notes", RequestMode::Action).contains("reviewed locally"));
        assert!(fallback.respond("remember milk", RequestMode::Chat).contains("I've noted"));
    }

    #[test]
    fn test_summarize() {
        assert_eq!(summarize("\n  first   line \nsecond", 80), "first line");
        assert_eq!(summarize("abcdef", 3), "abc...");
        assert_eq!(summarize("", 10), "");
    }
}
