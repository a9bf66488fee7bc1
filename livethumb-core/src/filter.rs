use regex::Regex;

/// Optional allow-list over channel names.
///
/// Patterns are anchored at the start of the channel name but not at the
/// end, so `news` admits `news` and `news-hd` but not `breaking-news`.
#[derive(Debug, Clone, Default)]
pub struct ChannelFilter {
    pattern: Option<Regex>,
}

impl ChannelFilter {
    /// A filter that admits every channel.
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn new(pattern: Option<&str>) -> Result<Self, regex::Error> {
        let pattern = match pattern {
            Some(raw) if !raw.is_empty() => {
                Some(Regex::new(&format!("^(?:{raw})"))?)
            }
            _ => None,
        };
        Ok(Self { pattern })
    }

    pub fn admits(&self, channel: &str) -> bool {
        self.pattern
            .as_ref()
            .is_none_or(|pattern| pattern.is_match(channel))
    }

    pub fn is_restricted(&self) -> bool {
        self.pattern.is_some()
    }
}
